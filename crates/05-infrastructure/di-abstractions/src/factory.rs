//! 组件容器接口
//!
//! 按能力拆分为多个 trait: 基本查找、层级容器、可配置容器、可列举容器和定义注册表。

use crate::class_loader::ClassLoader;
use crate::definition::BeanDefinition;
use crate::processor::BeanPostProcessor;
use crate::resolver::StringValueResolver;
use crate::scope::Scope;
use infrastructure_common::{
    DependencyError, DependencyResult, Object, TypeConverter, TypeInfo, Value,
};
use std::any::Any;
use std::sync::Arc;

/// 基本组件容器
pub trait BeanFactory: Send + Sync {
    /// 按名称获取组件, `&name` 获取工厂组件本身
    fn get_bean(&self, name: &str) -> DependencyResult<Object>;

    /// 使用显式实参获取组件 (仅原型组件)
    fn get_bean_with_args(&self, name: &str, arguments: Vec<Value>) -> DependencyResult<Object>;

    /// 获取组件并检查类型, 不兼容时尝试类型转换
    fn get_bean_of_type(&self, name: &str, required_type: &TypeInfo) -> DependencyResult<Object>;

    /// 是否包含组件定义或单例
    fn contains_bean(&self, name: &str) -> bool;

    /// 是否为单例
    fn is_singleton(&self, name: &str) -> DependencyResult<bool>;

    /// 是否为原型
    fn is_prototype(&self, name: &str) -> DependencyResult<bool>;

    /// 组件类型是否匹配
    fn is_type_match(&self, name: &str, target: &TypeInfo) -> DependencyResult<bool>;

    /// 组件类型, 无法确定时返回 `None`
    fn get_type(&self, name: &str) -> DependencyResult<Option<TypeInfo>>;

    /// 组件的所有别名
    fn get_aliases(&self, name: &str) -> Vec<String>;
}

/// 类型化查找扩展
pub trait BeanFactoryExt: BeanFactory {
    /// 获取具体类型的组件
    fn get_bean_typed<T: Any + Send + Sync>(&self, name: &str) -> DependencyResult<Arc<T>> {
        let object = self.get_bean_of_type(name, &TypeInfo::of::<T>())?;
        object
            .downcast::<T>()
            .map_err(|original| DependencyError::TypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<T>().to_string(),
                actual: Value::Object(original).describe(),
            })
    }
}

impl<F: BeanFactory + ?Sized> BeanFactoryExt for F {}

/// 层级容器
pub trait HierarchicalBeanFactory: BeanFactory {
    /// 父容器
    fn parent_bean_factory(&self) -> Option<Arc<dyn ConfigurableListableBeanFactory>>;

    /// 本容器是否包含组件 (不查找父容器)
    fn contains_local_bean(&self, name: &str) -> bool;
}

/// 可配置容器
pub trait ConfigurableBeanFactory: HierarchicalBeanFactory {
    /// 合并后的组件定义, 本地没有定义时查找父容器
    fn get_merged_bean_definition(&self, name: &str) -> DependencyResult<Arc<BeanDefinition>>;

    /// 是否为工厂组件
    fn is_factory_bean(&self, name: &str) -> DependencyResult<bool>;

    /// 组件是否正在创建
    fn is_currently_in_creation(&self, name: &str) -> bool;

    /// 注册作用域
    fn register_scope(&self, name: &str, scope: Arc<dyn Scope>) -> DependencyResult<()>;

    /// 获取已注册的作用域
    fn get_registered_scope(&self, name: &str) -> Option<Arc<dyn Scope>>;

    /// 已注册的作用域名称
    fn get_registered_scope_names(&self) -> Vec<String>;

    /// 添加后置处理器, 同名处理器被替换
    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>);

    /// 后置处理器数量
    fn get_bean_post_processor_count(&self) -> usize;

    /// 手动注册单例
    fn register_singleton(&self, name: &str, object: Object) -> DependencyResult<()>;

    /// 是否包含已创建的单例
    fn contains_singleton(&self, name: &str) -> bool;

    /// 已创建的单例名称
    fn get_singleton_names(&self) -> Vec<String>;

    /// 登记依赖关系: `dependent` 依赖 `name`
    fn register_dependent_bean(&self, name: &str, dependent: &str);

    /// 依赖指定组件的组件
    fn get_dependent_beans(&self, name: &str) -> Vec<String>;

    /// 指定组件依赖的组件
    fn get_dependencies_for_bean(&self, name: &str) -> Vec<String>;

    /// 销毁原型组件实例
    fn destroy_bean(&self, name: &str, instance: Object);

    /// 从所属作用域中移除并销毁组件
    fn destroy_scoped_bean(&self, name: &str) -> DependencyResult<()>;

    /// 按注册的逆序销毁所有单例
    fn destroy_singletons(&self);

    /// 添加内嵌值解析器
    fn add_embedded_value_resolver(&self, resolver: Arc<dyn StringValueResolver>);

    /// 解析内嵌值 (占位符)
    fn resolve_embedded_value(&self, value: &str) -> anyhow::Result<String>;

    /// 设置类型转换器
    fn set_type_converter(&self, converter: Arc<dyn TypeConverter>);

    /// 类型转换器
    fn type_converter(&self) -> Arc<dyn TypeConverter>;

    /// 组件类加载器
    fn bean_class_loader(&self) -> Arc<dyn ClassLoader>;
}

/// 可列举容器
pub trait ListableBeanFactory: BeanFactory {
    /// 与类型匹配的组件名
    fn get_bean_names_for_type(
        &self,
        target: &TypeInfo,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> Vec<String>;

    /// 与类型匹配的组件, 按注册顺序
    fn get_beans_of_type(
        &self,
        target: &TypeInfo,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> DependencyResult<Vec<(String, Object)>>;

    /// 预实例化所有非延迟的单例
    fn pre_instantiate_singletons(&self) -> DependencyResult<()>;
}

/// 别名注册表
pub trait AliasRegistry: Send + Sync {
    /// 注册别名
    fn register_alias(&self, name: &str, alias: &str) -> DependencyResult<()>;

    /// 移除别名
    fn remove_alias(&self, alias: &str) -> DependencyResult<()>;

    /// 是否为别名
    fn is_alias(&self, name: &str) -> bool;
}

/// 组件定义注册表
pub trait BeanDefinitionRegistry: AliasRegistry {
    /// 注册组件定义
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> DependencyResult<()>;

    /// 移除组件定义
    fn remove_bean_definition(&self, name: &str) -> DependencyResult<()>;

    /// 获取组件定义
    fn get_bean_definition(&self, name: &str) -> DependencyResult<Arc<BeanDefinition>>;

    /// 是否包含组件定义
    fn contains_bean_definition(&self, name: &str) -> bool;

    /// 按注册顺序返回所有组件名
    fn get_bean_definition_names(&self) -> Vec<String>;

    /// 组件定义数量
    fn get_bean_definition_count(&self) -> usize;

    /// 名称是否已被组件或别名占用
    fn is_bean_name_in_use(&self, name: &str) -> bool;
}

/// 完整容器能力的组合, 用作父容器的类型
pub trait ConfigurableListableBeanFactory:
    ConfigurableBeanFactory + ListableBeanFactory + BeanDefinitionRegistry
{
}

impl<F> ConfigurableListableBeanFactory for F where
    F: ConfigurableBeanFactory + ListableBeanFactory + BeanDefinitionRegistry + ?Sized
{
}
