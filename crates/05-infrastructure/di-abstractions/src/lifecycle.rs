//! 组件生命周期回调接口
//!
//! 组件类通过 [`BeanClass`](crate::BeanClass) 构建器声明自己实现了哪些接口,
//! 容器在创建和销毁组件时按约定顺序调用它们。

use crate::class_loader::ClassLoader;
use crate::factory::BeanFactory;
use infrastructure_common::{DependencyError, DependencyResult, Object, Throwable, TypeInfo};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// `InitializingBean` 回调的方法名, 与同名的自定义初始化方法只调用一次
pub const AFTER_PROPERTIES_SET: &str = "after_properties_set";

/// `DisposableBean` 回调的方法名, 与同名的自定义销毁方法只调用一次
pub const DESTROY: &str = "destroy";

/// 推断销毁方法的特殊名称
pub const INFER_METHOD: &str = "(inferred)";

/// 属性注入完成后的初始化回调
pub trait InitializingBean: Send + Sync {
    /// 所有属性注入完成后调用
    fn after_properties_set(&mut self) -> anyhow::Result<()>;
}

/// 销毁回调
pub trait DisposableBean: Send + Sync {
    /// 容器销毁组件时调用
    fn destroy(&self) -> anyhow::Result<()>;
}

/// 接收组件名称
pub trait BeanNameAware: Send + Sync {
    /// 设置组件在容器中的名称
    fn set_bean_name(&mut self, name: &str);
}

/// 接收所属容器
pub trait BeanFactoryAware: Send + Sync {
    /// 设置所属容器, 组件只持有弱引用
    fn set_bean_factory(&mut self, factory: Weak<dyn BeanFactory>) -> anyhow::Result<()>;
}

/// 接收类加载器
pub trait BeanClassLoaderAware: Send + Sync {
    /// 设置加载组件类的类加载器
    fn set_bean_class_loader(&mut self, class_loader: Arc<dyn ClassLoader>);
}

/// 工厂组件: 容器暴露的是它生产的对象, 而不是它本身
///
/// 通过 `&name` 前缀可以获取工厂组件本身。
pub trait FactoryBean: Send + Sync {
    /// 生产对象
    fn get_object(&self) -> anyhow::Result<Object>;

    /// 生产对象的类型, 在生产之前未知时返回 `None`
    fn object_type(&self) -> Option<TypeInfo>;

    /// 生产的对象是否为单例
    fn is_singleton(&self) -> bool {
        true
    }

    /// 预实例化时是否立即生产对象
    fn is_eager_init(&self) -> bool {
        false
    }
}

/// 方法替换器
pub trait MethodReplacer: Send + Sync {
    /// 替换目标组件上指定方法的实现
    fn reimplement(
        &self,
        target: &(dyn Any + Send + Sync),
        method: &str,
        arguments: &[Object],
    ) -> Result<Option<Object>, Throwable>;
}

/// 查找方法注入句柄
///
/// 每次调用 [`BeanLookup::lookup`] 都会向容器重新请求目标组件,
/// 因此单例组件可以持有原型组件的查找方法。
#[derive(Clone)]
pub struct BeanLookup {
    method_name: String,
    bean_name: String,
    factory: Weak<dyn BeanFactory>,
}

impl BeanLookup {
    /// 创建查找句柄
    pub fn new(
        method_name: impl Into<String>,
        bean_name: impl Into<String>,
        factory: Weak<dyn BeanFactory>,
    ) -> Self {
        Self {
            method_name: method_name.into(),
            bean_name: bean_name.into(),
            factory,
        }
    }

    /// 被覆盖的方法名
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// 查找的组件名
    pub fn bean_name(&self) -> &str {
        &self.bean_name
    }

    /// 查找组件
    pub fn lookup(&self) -> DependencyResult<Object> {
        self.factory()?.get_bean(&self.bean_name)
    }

    /// 查找并转换为具体类型
    pub fn lookup_typed<T: Any + Send + Sync>(&self) -> DependencyResult<Arc<T>> {
        let object = self.factory()?.get_bean_of_type(&self.bean_name, &TypeInfo::of::<T>())?;
        object
            .downcast::<T>()
            .map_err(|_| DependencyError::TypeMismatch {
                name: self.bean_name.clone(),
                expected: std::any::type_name::<T>().to_string(),
                actual: "不兼容的组件实例".to_string(),
            })
    }

    fn factory(&self) -> DependencyResult<Arc<dyn BeanFactory>> {
        self.factory.upgrade().ok_or_else(|| {
            DependencyError::illegal_state(format!(
                "查找方法 {} 所属的容器已经关闭",
                self.method_name
            ))
        })
    }
}

impl fmt::Debug for BeanLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanLookup")
            .field("method_name", &self.method_name)
            .field("bean_name", &self.bean_name)
            .finish()
    }
}

/// 替换方法的分派函数
pub type ReplacementDispatch = Arc<
    dyn Fn(&(dyn Any + Send + Sync), &[Object]) -> Result<Option<Object>, Throwable> + Send + Sync,
>;

/// 方法替换句柄
///
/// 组件在被替换的方法中调用 [`MethodReplacement::invoke`],
/// 调用会被转交给容器中的 [`MethodReplacer`] 组件。
#[derive(Clone)]
pub struct MethodReplacement {
    method_name: String,
    replacer_bean_name: String,
    dispatch: ReplacementDispatch,
}

impl MethodReplacement {
    /// 创建方法替换句柄
    pub fn new(
        method_name: impl Into<String>,
        replacer_bean_name: impl Into<String>,
        dispatch: ReplacementDispatch,
    ) -> Self {
        Self {
            method_name: method_name.into(),
            replacer_bean_name: replacer_bean_name.into(),
            dispatch,
        }
    }

    /// 被替换的方法名
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// 替换器组件名
    pub fn replacer_bean_name(&self) -> &str {
        &self.replacer_bean_name
    }

    /// 调用替换实现
    pub fn invoke(
        &self,
        target: &(dyn Any + Send + Sync),
        arguments: &[Object],
    ) -> Result<Option<Object>, Throwable> {
        (self.dispatch)(target, arguments)
    }
}

impl fmt::Debug for MethodReplacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodReplacement")
            .field("method_name", &self.method_name)
            .field("replacer_bean_name", &self.replacer_bean_name)
            .finish()
    }
}
