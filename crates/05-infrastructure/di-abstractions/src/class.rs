//! 运行时类模型
//!
//! [`BeanClass`] 是容器使用的"类引用": 它描述一个组件类型如何被构造、
//! 有哪些可写属性和可调用方法、以及实现了哪些生命周期能力。
//! 容器不依赖语言反射, 所有这些信息都通过构建器显式登记。

use crate::lifecycle::{
    BeanClassLoaderAware, BeanFactoryAware, BeanLookup, BeanNameAware, DisposableBean,
    FactoryBean, InitializingBean, MethodReplacement, MethodReplacer,
};
use infrastructure_common::{
    ConversionResult, FromValue, Object, Throwable, TypeConverter, TypeInfo, Value,
};
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 尚未冻结的组件实例, 在属性注入和初始化期间可变
pub type Instance = Box<dyn Any + Send + Sync>;

/// 构造函数或工厂方法的实参
pub struct Arguments {
    values: Vec<Value>,
    converter: Arc<dyn TypeConverter>,
}

impl Arguments {
    /// 创建实参列表
    pub fn new(values: Vec<Value>, converter: Arc<dyn TypeConverter>) -> Self {
        Self { values, converter }
    }

    /// 实参个数
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否没有实参
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 按位置获取并转换实参, 缺失的位置视为空值
    pub fn get<T: FromValue>(&self, index: usize) -> ConversionResult<T> {
        let value = self.values.get(index).cloned().unwrap_or(Value::Null);
        T::from_value(value, self.converter.as_ref())
    }

    /// 按位置获取原始实参
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// 类型转换器
    pub fn converter(&self) -> &dyn TypeConverter {
        self.converter.as_ref()
    }
}

/// 构造函数
pub type ConstructorFn = Arc<dyn Fn(&Arguments) -> anyhow::Result<Instance> + Send + Sync>;

/// 工厂方法, 实例工厂方法的第一个参数为工厂对象
pub type FactoryMethodFn =
    Arc<dyn Fn(Option<&Object>, &Arguments) -> anyhow::Result<Instance> + Send + Sync>;

/// 属性 setter
pub type PropertySetter = Arc<
    dyn Fn(&mut (dyn Any + Send + Sync), Value, &dyn TypeConverter) -> anyhow::Result<()>
        + Send
        + Sync,
>;

/// 可调用方法
pub type MethodHandle =
    Arc<dyn Fn(&Object, &[Object]) -> Result<Option<Object>, Throwable> + Send + Sync>;

/// 初始化回调
pub type InitMethodFn =
    Arc<dyn Fn(&mut (dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync>;

/// 销毁回调
pub type DestroyMethodFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync>;

/// 方法注入槽位
pub type OverrideSlotFn = Arc<
    dyn Fn(&mut (dyn Any + Send + Sync), MethodOverrideHandle) -> anyhow::Result<()> + Send + Sync,
>;

/// 构造函数描述
#[derive(Clone)]
pub struct ConstructorDescriptor {
    parameter_types: Vec<TypeInfo>,
    invoke: ConstructorFn,
}

impl ConstructorDescriptor {
    /// 参数类型
    pub fn parameter_types(&self) -> &[TypeInfo] {
        &self.parameter_types
    }

    /// 参数个数
    pub fn parameter_count(&self) -> usize {
        self.parameter_types.len()
    }

    /// 调用构造函数
    pub fn instantiate(&self, arguments: &Arguments) -> anyhow::Result<Instance> {
        (self.invoke)(arguments)
    }
}

/// 工厂方法描述
#[derive(Clone)]
pub struct FactoryMethodDescriptor {
    name: String,
    parameter_types: Vec<TypeInfo>,
    is_static: bool,
    return_type: TypeInfo,
    invoke: FactoryMethodFn,
}

impl FactoryMethodDescriptor {
    /// 方法名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 参数类型
    pub fn parameter_types(&self) -> &[TypeInfo] {
        &self.parameter_types
    }

    /// 参数个数
    pub fn parameter_count(&self) -> usize {
        self.parameter_types.len()
    }

    /// 是否为静态工厂方法
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// 声明的返回类型
    pub fn return_type(&self) -> &TypeInfo {
        &self.return_type
    }

    /// 调用工厂方法
    pub fn invoke(&self, factory: Option<&Object>, arguments: &Arguments) -> anyhow::Result<Instance> {
        (self.invoke)(factory, arguments)
    }
}

/// 可写属性描述
#[derive(Clone)]
pub struct PropertyDescriptor {
    name: String,
    declared_type: TypeInfo,
    simple: bool,
    setter: PropertySetter,
}

impl PropertyDescriptor {
    /// 属性名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 声明类型
    pub fn declared_type(&self) -> &TypeInfo {
        &self.declared_type
    }

    /// 是否为简单类型属性
    pub fn is_simple(&self) -> bool {
        self.simple
    }

    /// 写入属性值
    pub fn set(
        &self,
        bean: &mut (dyn Any + Send + Sync),
        value: Value,
        converter: &dyn TypeConverter,
    ) -> anyhow::Result<()> {
        (self.setter)(bean, value, converter)
    }
}

/// 可调用方法描述
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    declaring_class: String,
    handle: MethodHandle,
}

impl MethodDescriptor {
    /// 创建方法描述
    pub fn new(name: impl Into<String>, declaring_class: impl Into<String>, handle: MethodHandle) -> Self {
        Self {
            name: name.into(),
            declaring_class: declaring_class.into(),
            handle,
        }
    }

    /// 方法名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 声明该方法的类或接口
    pub fn declaring_class(&self) -> &str {
        &self.declaring_class
    }

    /// 调用方法
    pub fn invoke(&self, target: &Object, arguments: &[Object]) -> Result<Option<Object>, Throwable> {
        (self.handle)(target, arguments)
    }
}

/// 方法注入种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// 查找方法注入
    Lookup,
    /// 方法替换
    Replace,
}

/// 方法注入时交给组件的句柄
#[derive(Debug, Clone)]
pub enum MethodOverrideHandle {
    /// 每次调用都从容器查找目标组件
    Lookup(BeanLookup),
    /// 把方法调用转交给替换器组件
    Replace(MethodReplacement),
}

/// 方法注入槽位
#[derive(Clone)]
pub struct OverrideSlot {
    kind: OverrideKind,
    inject: OverrideSlotFn,
}

impl OverrideSlot {
    /// 槽位种类
    pub fn kind(&self) -> OverrideKind {
        self.kind
    }

    /// 注入句柄
    pub fn inject(
        &self,
        bean: &mut (dyn Any + Send + Sync),
        handle: MethodOverrideHandle,
    ) -> anyhow::Result<()> {
        (self.inject)(bean, handle)
    }
}

type FactoryBeanCast = fn(&(dyn Any + Send + Sync)) -> Option<&dyn FactoryBean>;
type DisposableCast = fn(&(dyn Any + Send + Sync)) -> Option<&dyn DisposableBean>;
type MethodReplacerCast = fn(&(dyn Any + Send + Sync)) -> Option<&dyn MethodReplacer>;
type InitializingCast = fn(&mut (dyn Any + Send + Sync)) -> Option<&mut dyn InitializingBean>;
type NameAwareCast = fn(&mut (dyn Any + Send + Sync)) -> Option<&mut dyn BeanNameAware>;
type FactoryAwareCast = fn(&mut (dyn Any + Send + Sync)) -> Option<&mut dyn BeanFactoryAware>;
type ClassLoaderAwareCast =
    fn(&mut (dyn Any + Send + Sync)) -> Option<&mut dyn BeanClassLoaderAware>;

/// 组件类实现的生命周期能力
#[derive(Default, Clone, Copy)]
struct Capabilities {
    factory_bean: Option<FactoryBeanCast>,
    disposable: Option<DisposableCast>,
    method_replacer: Option<MethodReplacerCast>,
    initializing: Option<InitializingCast>,
    name_aware: Option<NameAwareCast>,
    factory_aware: Option<FactoryAwareCast>,
    class_loader_aware: Option<ClassLoaderAwareCast>,
}

fn cast_factory_bean<T: FactoryBean + 'static>(
    object: &(dyn Any + Send + Sync),
) -> Option<&dyn FactoryBean> {
    object.downcast_ref::<T>().map(|typed| typed as &dyn FactoryBean)
}

fn cast_disposable<T: DisposableBean + 'static>(
    object: &(dyn Any + Send + Sync),
) -> Option<&dyn DisposableBean> {
    object.downcast_ref::<T>().map(|typed| typed as &dyn DisposableBean)
}

fn cast_method_replacer<T: MethodReplacer + 'static>(
    object: &(dyn Any + Send + Sync),
) -> Option<&dyn MethodReplacer> {
    object.downcast_ref::<T>().map(|typed| typed as &dyn MethodReplacer)
}

fn cast_initializing<T: InitializingBean + 'static>(
    object: &mut (dyn Any + Send + Sync),
) -> Option<&mut dyn InitializingBean> {
    object
        .downcast_mut::<T>()
        .map(|typed| typed as &mut dyn InitializingBean)
}

fn cast_name_aware<T: BeanNameAware + 'static>(
    object: &mut (dyn Any + Send + Sync),
) -> Option<&mut dyn BeanNameAware> {
    object.downcast_mut::<T>().map(|typed| typed as &mut dyn BeanNameAware)
}

fn cast_factory_aware<T: BeanFactoryAware + 'static>(
    object: &mut (dyn Any + Send + Sync),
) -> Option<&mut dyn BeanFactoryAware> {
    object
        .downcast_mut::<T>()
        .map(|typed| typed as &mut dyn BeanFactoryAware)
}

fn cast_class_loader_aware<T: BeanClassLoaderAware + 'static>(
    object: &mut (dyn Any + Send + Sync),
) -> Option<&mut dyn BeanClassLoaderAware> {
    object
        .downcast_mut::<T>()
        .map(|typed| typed as &mut dyn BeanClassLoaderAware)
}

/// 运行时类描述
pub struct BeanClass {
    name: String,
    type_id: Option<TypeId>,
    is_interface: bool,
    is_abstract: bool,
    superclass: Option<Arc<BeanClass>>,
    interfaces: Vec<Arc<BeanClass>>,
    declared_methods: Vec<String>,
    constructors: Vec<ConstructorDescriptor>,
    factory_methods: Vec<FactoryMethodDescriptor>,
    properties: Vec<PropertyDescriptor>,
    methods: Vec<MethodDescriptor>,
    init_methods: HashMap<String, InitMethodFn>,
    destroy_methods: HashMap<String, DestroyMethodFn>,
    override_slots: HashMap<String, OverrideSlot>,
    capabilities: Capabilities,
}

impl BeanClass {
    fn empty(name: String, type_id: Option<TypeId>) -> Self {
        Self {
            name,
            type_id,
            is_interface: false,
            is_abstract: false,
            superclass: None,
            interfaces: Vec::new(),
            declared_methods: Vec::new(),
            constructors: Vec::new(),
            factory_methods: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            init_methods: HashMap::new(),
            destroy_methods: HashMap::new(),
            override_slots: HashMap::new(),
            capabilities: Capabilities::default(),
        }
    }

    /// 为具体类型 `T` 创建类构建器
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> BeanClassBuilder<T> {
        BeanClassBuilder {
            class: Self::empty(name.into(), Some(TypeId::of::<T>())),
            _marker: PhantomData,
        }
    }

    /// 创建接口构建器
    pub fn interface(name: impl Into<String>) -> InterfaceBuilder {
        let mut class = Self::empty(name.into(), None);
        class.is_interface = true;
        class.is_abstract = true;
        InterfaceBuilder { class }
    }

    /// 创建动态类构建器 (实例为 [`DynamicObject`])
    pub fn dynamic(name: impl Into<String>) -> DynamicClassBuilder {
        DynamicClassBuilder {
            class: Self::empty(name.into(), Some(TypeId::of::<DynamicObject>())),
        }
    }

    /// 类名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 实例的 `TypeId`
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// 类型信息
    pub fn type_info(&self) -> TypeInfo {
        TypeInfo {
            name: self.name.clone(),
            id: if self.is_dynamic() { None } else { self.type_id },
            module_path: self.name.clone(),
        }
    }

    /// 是否为接口
    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    /// 是否为抽象类或接口
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// 实例是否为 [`DynamicObject`]
    pub fn is_dynamic(&self) -> bool {
        self.type_id == Some(TypeId::of::<DynamicObject>())
    }

    /// 父类
    pub fn superclass(&self) -> Option<&Arc<BeanClass>> {
        self.superclass.as_ref()
    }

    /// 直接实现 (或继承) 的接口
    pub fn interfaces(&self) -> &[Arc<BeanClass>] {
        &self.interfaces
    }

    /// 所有接口, 包括父类和父接口上的接口, 按首次出现顺序去重
    pub fn all_interfaces(&self) -> Vec<Arc<BeanClass>> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        self.collect_interfaces(&mut seen, &mut result);
        result
    }

    fn collect_interfaces(&self, seen: &mut HashSet<String>, result: &mut Vec<Arc<BeanClass>>) {
        for interface in &self.interfaces {
            if seen.insert(interface.name.clone()) {
                result.push(interface.clone());
            }
            interface.collect_interfaces(seen, result);
        }
        if let Some(superclass) = &self.superclass {
            superclass.collect_interfaces(seen, result);
        }
    }

    /// 是否可赋值给目标类型 (自身、父类或任一接口)
    pub fn is_assignable_to(&self, target: &TypeInfo) -> bool {
        if self.type_info() == *target {
            return true;
        }
        if self
            .superclass
            .as_ref()
            .is_some_and(|superclass| superclass.is_assignable_to(target))
        {
            return true;
        }
        self.interfaces
            .iter()
            .any(|interface| interface.is_assignable_to(target))
    }

    /// 是否可赋值给目标类
    pub fn is_assignable_to_class(&self, target: &BeanClass) -> bool {
        self.is_assignable_to(&target.type_info())
    }

    /// 构造函数
    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    /// 无参构造函数
    pub fn default_constructor(&self) -> Option<&ConstructorDescriptor> {
        self.constructors
            .iter()
            .find(|constructor| constructor.parameter_count() == 0)
    }

    /// 指定名称的工厂方法 (包括父类声明的)
    pub fn factory_methods(&self, name: &str) -> Vec<&FactoryMethodDescriptor> {
        let mut result: Vec<&FactoryMethodDescriptor> = self
            .factory_methods
            .iter()
            .filter(|method| method.name == name)
            .collect();
        if let Some(superclass) = &self.superclass {
            result.extend(superclass.factory_methods(name));
        }
        result
    }

    /// 查找可写属性
    pub fn find_property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties
            .iter()
            .find(|property| property.name == name)
            .or_else(|| {
                self.superclass
                    .as_ref()
                    .and_then(|superclass| superclass.find_property(name))
            })
    }

    /// 所有可写属性, 子类声明覆盖父类声明
    pub fn all_properties(&self) -> Vec<&PropertyDescriptor> {
        let mut result: Vec<&PropertyDescriptor> = self.properties.iter().collect();
        if let Some(superclass) = &self.superclass {
            for inherited in superclass.all_properties() {
                if !result.iter().any(|own| own.name == inherited.name) {
                    result.push(inherited);
                }
            }
        }
        result
    }

    /// 查找可调用方法
    pub fn find_method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|method| method.name == name)
            .or_else(|| {
                self.superclass
                    .as_ref()
                    .and_then(|superclass| superclass.find_method(name))
            })
    }

    /// 所有可调用方法
    pub fn methods(&self) -> Vec<&MethodDescriptor> {
        let mut result: Vec<&MethodDescriptor> = self.methods.iter().collect();
        if let Some(superclass) = &self.superclass {
            for inherited in superclass.methods() {
                if !result.iter().any(|own| own.name == inherited.name) {
                    result.push(inherited);
                }
            }
        }
        result
    }

    /// 方法签名 (方法名, 声明类)
    ///
    /// 接口返回自身及父接口声明的方法; 类返回自身及父类的可调用方法。
    pub fn method_signatures(&self) -> Vec<(String, String)> {
        if self.is_interface {
            let mut result: Vec<(String, String)> = self
                .declared_methods
                .iter()
                .map(|method| (method.clone(), self.name.clone()))
                .collect();
            for parent in &self.interfaces {
                for signature in parent.method_signatures() {
                    if !result.iter().any(|own| own.0 == signature.0) {
                        result.push(signature);
                    }
                }
            }
            result
        } else {
            self.methods()
                .into_iter()
                .map(|method| (method.name.clone(), method.declaring_class.clone()))
                .collect()
        }
    }

    /// 查找初始化回调
    pub fn find_init_method(&self, name: &str) -> Option<&InitMethodFn> {
        self.init_methods.get(name)
    }

    /// 查找销毁回调
    pub fn find_destroy_method(&self, name: &str) -> Option<&DestroyMethodFn> {
        self.destroy_methods.get(name)
    }

    /// 查找方法注入槽位
    pub fn override_slot(&self, method_name: &str) -> Option<&OverrideSlot> {
        self.override_slots.get(method_name)
    }

    /// 是否为工厂组件类
    pub fn is_factory_bean(&self) -> bool {
        self.capabilities.factory_bean.is_some()
    }

    /// 是否实现了销毁回调
    pub fn is_disposable(&self) -> bool {
        self.capabilities.disposable.is_some()
    }

    /// 是否实现了初始化回调
    pub fn is_initializing(&self) -> bool {
        self.capabilities.initializing.is_some()
    }

    /// 视为工厂组件
    pub fn as_factory_bean<'a>(&self, object: &'a (dyn Any + Send + Sync)) -> Option<&'a dyn FactoryBean> {
        self.capabilities.factory_bean.and_then(|cast| cast(object))
    }

    /// 视为可销毁组件
    pub fn as_disposable<'a>(&self, object: &'a (dyn Any + Send + Sync)) -> Option<&'a dyn DisposableBean> {
        self.capabilities.disposable.and_then(|cast| cast(object))
    }

    /// 视为方法替换器
    pub fn as_method_replacer<'a>(&self, object: &'a (dyn Any + Send + Sync)) -> Option<&'a dyn MethodReplacer> {
        self.capabilities.method_replacer.and_then(|cast| cast(object))
    }

    /// 视为初始化组件
    pub fn as_initializing<'a>(
        &self,
        object: &'a mut (dyn Any + Send + Sync),
    ) -> Option<&'a mut dyn InitializingBean> {
        self.capabilities.initializing.and_then(|cast| cast(object))
    }

    /// 视为名称感知组件
    pub fn as_name_aware<'a>(
        &self,
        object: &'a mut (dyn Any + Send + Sync),
    ) -> Option<&'a mut dyn BeanNameAware> {
        self.capabilities.name_aware.and_then(|cast| cast(object))
    }

    /// 视为容器感知组件
    pub fn as_factory_aware<'a>(
        &self,
        object: &'a mut (dyn Any + Send + Sync),
    ) -> Option<&'a mut dyn BeanFactoryAware> {
        self.capabilities.factory_aware.and_then(|cast| cast(object))
    }

    /// 视为类加载器感知组件
    pub fn as_class_loader_aware<'a>(
        &self,
        object: &'a mut (dyn Any + Send + Sync),
    ) -> Option<&'a mut dyn BeanClassLoaderAware> {
        self.capabilities
            .class_loader_aware
            .and_then(|cast| cast(object))
    }

    /// 调用方法
    pub fn invoke(&self, target: &Object, method: &str, arguments: &[Object]) -> Result<Option<Object>, Throwable> {
        let descriptor = self.find_method(method).ok_or_else(|| {
            Throwable::unsupported_operation(format!("类 {} 没有方法 {}", self.name, method))
        })?;
        descriptor.invoke(target, arguments)
    }
}

impl fmt::Debug for BeanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanClass")
            .field("name", &self.name)
            .field("interface", &self.is_interface)
            .field("abstract", &self.is_abstract)
            .field(
                "superclass",
                &self.superclass.as_ref().map(|superclass| superclass.name.clone()),
            )
            .field(
                "interfaces",
                &self
                    .interfaces
                    .iter()
                    .map(|interface| interface.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl fmt::Display for BeanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// 具体类型的类构建器
pub struct BeanClassBuilder<T> {
    class: BeanClass,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> BeanClassBuilder<T> {
    /// 标记为抽象类
    pub fn abstract_class(mut self) -> Self {
        self.class.is_abstract = true;
        self
    }

    /// 设置父类
    pub fn extends(mut self, superclass: Arc<BeanClass>) -> Self {
        self.class.superclass = Some(superclass);
        self
    }

    /// 声明实现的接口
    pub fn implements(mut self, interface: Arc<BeanClass>) -> Self {
        self.class.interfaces.push(interface);
        self
    }

    /// 登记构造函数
    pub fn constructor<F>(mut self, parameter_types: Vec<TypeInfo>, constructor: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let invoke: ConstructorFn = Arc::new(move |arguments: &Arguments| -> anyhow::Result<Instance> {
            constructor(arguments).map(|instance| Box::new(instance) as Instance)
        });
        self.class.constructors.push(ConstructorDescriptor {
            parameter_types,
            invoke,
        });
        self
    }

    /// 登记静态工厂方法
    pub fn static_factory_method<R, F>(
        mut self,
        name: impl Into<String>,
        parameter_types: Vec<TypeInfo>,
        method: F,
    ) -> Self
    where
        R: Any + Send + Sync,
        F: Fn(&Arguments) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let invoke: FactoryMethodFn = Arc::new(
            move |_factory: Option<&Object>, arguments: &Arguments| -> anyhow::Result<Instance> {
                method(arguments).map(|product| Box::new(product) as Instance)
            },
        );
        self.class.factory_methods.push(FactoryMethodDescriptor {
            name: name.into(),
            parameter_types,
            is_static: true,
            return_type: TypeInfo::of::<R>(),
            invoke,
        });
        self
    }

    /// 登记实例工厂方法
    pub fn instance_factory_method<R, F>(
        mut self,
        name: impl Into<String>,
        parameter_types: Vec<TypeInfo>,
        method: F,
    ) -> Self
    where
        R: Any + Send + Sync,
        F: Fn(&T, &Arguments) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let name = name.into();
        let method_name = name.clone();
        let invoke: FactoryMethodFn = Arc::new(
            move |factory: Option<&Object>, arguments: &Arguments| -> anyhow::Result<Instance> {
                let factory = factory
                    .and_then(|factory| factory.downcast_ref::<T>())
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "实例工厂方法 {} 需要类型为 {} 的工厂对象",
                            method_name,
                            std::any::type_name::<T>()
                        )
                    })?;
                method(factory, arguments).map(|product| Box::new(product) as Instance)
            },
        );
        self.class.factory_methods.push(FactoryMethodDescriptor {
            name,
            parameter_types,
            is_static: false,
            return_type: TypeInfo::of::<R>(),
            invoke,
        });
        self
    }

    /// 登记类型化属性
    pub fn property<V, F>(self, name: impl Into<String>, setter: F) -> Self
    where
        V: FromValue + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.raw_property(
            name,
            V::type_info(),
            V::is_simple(),
            move |bean: &mut T, value: Value, converter: &dyn TypeConverter| -> anyhow::Result<()> {
                setter(bean, V::from_value(value, converter)?);
                Ok(())
            },
        )
    }

    /// 登记未类型化的属性
    pub fn raw_property<F>(
        mut self,
        name: impl Into<String>,
        declared_type: TypeInfo,
        simple: bool,
        setter: F,
    ) -> Self
    where
        F: Fn(&mut T, Value, &dyn TypeConverter) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let property_name = name.clone();
        let erased: PropertySetter = Arc::new(
            move |bean: &mut (dyn Any + Send + Sync),
                  value: Value,
                  converter: &dyn TypeConverter|
                  -> anyhow::Result<()> {
                let bean = bean.downcast_mut::<T>().ok_or_else(|| {
                    anyhow::anyhow!(
                        "属性 {} 的目标实例不是 {}",
                        property_name,
                        std::any::type_name::<T>()
                    )
                })?;
                setter(bean, value, converter)
            },
        );
        self.class.properties.push(PropertyDescriptor {
            name,
            declared_type,
            simple,
            setter: erased,
        });
        self
    }

    /// 登记可调用方法
    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&T, &[Object]) -> Result<Option<Object>, Throwable> + Send + Sync + 'static,
    {
        let name = name.into();
        let method_name = name.clone();
        let handle: MethodHandle = Arc::new(
            move |target: &Object, arguments: &[Object]| -> Result<Option<Object>, Throwable> {
                let target = target.downcast_ref::<T>().ok_or_else(|| {
                    Throwable::illegal_argument(format!(
                        "方法 {} 的目标对象不是 {}",
                        method_name,
                        std::any::type_name::<T>()
                    ))
                })?;
                method(target, arguments)
            },
        );
        let declaring_class = self.class.name.clone();
        self.class
            .methods
            .push(MethodDescriptor::new(name, declaring_class, handle));
        self
    }

    /// 登记初始化方法
    pub fn init_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let erased: InitMethodFn = Arc::new(
            move |bean: &mut (dyn Any + Send + Sync)| -> anyhow::Result<()> {
                match bean.downcast_mut::<T>() {
                    Some(bean) => method(bean),
                    None => Err(anyhow::anyhow!(
                        "初始化方法的目标实例不是 {}",
                        std::any::type_name::<T>()
                    )),
                }
            },
        );
        self.class.init_methods.insert(name.into(), erased);
        self
    }

    /// 登记销毁方法
    pub fn destroy_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let erased: DestroyMethodFn = Arc::new(
            move |bean: &(dyn Any + Send + Sync)| -> anyhow::Result<()> {
                match bean.downcast_ref::<T>() {
                    Some(bean) => method(bean),
                    None => Err(anyhow::anyhow!(
                        "销毁方法的目标实例不是 {}",
                        std::any::type_name::<T>()
                    )),
                }
            },
        );
        self.class.destroy_methods.insert(name.into(), erased);
        self
    }

    /// 登记查找方法注入槽位
    pub fn lookup_method<F>(self, method_name: impl Into<String>, inject: F) -> Self
    where
        F: Fn(&mut T, BeanLookup) + Send + Sync + 'static,
    {
        self.override_slot(method_name, OverrideKind::Lookup, move |bean, handle| {
            match handle {
                MethodOverrideHandle::Lookup(lookup) => {
                    inject(bean, lookup);
                    Ok(())
                }
                MethodOverrideHandle::Replace(_) => Err(anyhow::anyhow!("查找方法槽位不接受方法替换")),
            }
        })
    }

    /// 登记方法替换槽位
    pub fn replaced_method<F>(self, method_name: impl Into<String>, inject: F) -> Self
    where
        F: Fn(&mut T, MethodReplacement) + Send + Sync + 'static,
    {
        self.override_slot(method_name, OverrideKind::Replace, move |bean, handle| {
            match handle {
                MethodOverrideHandle::Replace(replacement) => {
                    inject(bean, replacement);
                    Ok(())
                }
                MethodOverrideHandle::Lookup(_) => Err(anyhow::anyhow!("方法替换槽位不接受查找方法")),
            }
        })
    }

    fn override_slot<F>(mut self, method_name: impl Into<String>, kind: OverrideKind, inject: F) -> Self
    where
        F: Fn(&mut T, MethodOverrideHandle) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let erased: OverrideSlotFn = Arc::new(
            move |bean: &mut (dyn Any + Send + Sync), handle: MethodOverrideHandle| -> anyhow::Result<()> {
                let bean = bean.downcast_mut::<T>().ok_or_else(|| {
                    anyhow::anyhow!("方法注入的目标实例不是 {}", std::any::type_name::<T>())
                })?;
                inject(bean, handle)
            },
        );
        self.class.override_slots.insert(
            method_name.into(),
            OverrideSlot {
                kind,
                inject: erased,
            },
        );
        self
    }

    /// 构建类描述
    pub fn build(self) -> Arc<BeanClass> {
        Arc::new(self.class)
    }
}

impl<T: Any + Send + Sync + Default> BeanClassBuilder<T> {
    /// 登记使用 `Default` 的无参构造函数
    pub fn default_constructor(self) -> Self {
        self.constructor(Vec::new(), |_| Ok(T::default()))
    }
}

impl<T: FactoryBean + Any> BeanClassBuilder<T> {
    /// 声明实现了 [`FactoryBean`]
    pub fn factory_bean(mut self) -> Self {
        self.class.capabilities.factory_bean = Some(cast_factory_bean::<T>);
        self
    }
}

impl<T: DisposableBean + Any + Send + Sync> BeanClassBuilder<T> {
    /// 声明实现了 [`DisposableBean`]
    pub fn disposable(mut self) -> Self {
        self.class.capabilities.disposable = Some(cast_disposable::<T>);
        self
    }
}

impl<T: MethodReplacer + Any> BeanClassBuilder<T> {
    /// 声明实现了 [`MethodReplacer`]
    pub fn method_replacer(mut self) -> Self {
        self.class.capabilities.method_replacer = Some(cast_method_replacer::<T>);
        self
    }
}

impl<T: InitializingBean + Any + Send + Sync> BeanClassBuilder<T> {
    /// 声明实现了 [`InitializingBean`]
    pub fn initializing(mut self) -> Self {
        self.class.capabilities.initializing = Some(cast_initializing::<T>);
        self
    }
}

impl<T: BeanNameAware + Any + Send + Sync> BeanClassBuilder<T> {
    /// 声明实现了 [`BeanNameAware`]
    pub fn bean_name_aware(mut self) -> Self {
        self.class.capabilities.name_aware = Some(cast_name_aware::<T>);
        self
    }
}

impl<T: BeanFactoryAware + Any + Send + Sync> BeanClassBuilder<T> {
    /// 声明实现了 [`BeanFactoryAware`]
    pub fn bean_factory_aware(mut self) -> Self {
        self.class.capabilities.factory_aware = Some(cast_factory_aware::<T>);
        self
    }
}

impl<T: BeanClassLoaderAware + Any + Send + Sync> BeanClassBuilder<T> {
    /// 声明实现了 [`BeanClassLoaderAware`]
    pub fn class_loader_aware(mut self) -> Self {
        self.class.capabilities.class_loader_aware = Some(cast_class_loader_aware::<T>);
        self
    }
}

/// 接口构建器
pub struct InterfaceBuilder {
    class: BeanClass,
}

impl InterfaceBuilder {
    /// 继承父接口
    pub fn extends(mut self, parent: Arc<BeanClass>) -> Self {
        self.class.interfaces.push(parent);
        self
    }

    /// 声明方法
    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.class.declared_methods.push(name.into());
        self
    }

    /// 构建接口描述
    pub fn build(self) -> Arc<BeanClass> {
        Arc::new(self.class)
    }
}

/// 动态类构建器
pub struct DynamicClassBuilder {
    class: BeanClass,
}

impl DynamicClassBuilder {
    /// 设置父类
    pub fn extends(mut self, superclass: Arc<BeanClass>) -> Self {
        self.class.superclass = Some(superclass);
        self
    }

    /// 声明实现的接口
    pub fn implements(mut self, interface: Arc<BeanClass>) -> Self {
        self.class.interfaces.push(interface);
        self
    }

    /// 登记方法句柄
    pub fn method(mut self, descriptor: MethodDescriptor) -> Self {
        self.class.methods.retain(|method| method.name != descriptor.name);
        self.class.methods.push(descriptor);
        self
    }

    /// 构建动态类描述
    pub fn build(self) -> Arc<BeanClass> {
        Arc::new(self.class)
    }
}

/// 携带自身类描述的对象 (例如代理)
pub struct DynamicObject {
    class: Arc<BeanClass>,
    state: Object,
}

impl DynamicObject {
    /// 创建动态对象
    pub fn new(class: Arc<BeanClass>, state: Object) -> Self {
        Self { class, state }
    }

    /// 类描述
    pub fn class(&self) -> &Arc<BeanClass> {
        &self.class
    }

    /// 内部状态
    pub fn state(&self) -> &Object {
        &self.state
    }
}

impl fmt::Debug for DynamicObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicObject")
            .field("class", &self.class.name)
            .finish()
    }
}

/// 调用动态对象上的方法
pub fn invoke_dynamic(object: &Object, method: &str, arguments: &[Object]) -> Result<Option<Object>, Throwable> {
    let dynamic = object.downcast_ref::<DynamicObject>().ok_or_else(|| {
        Throwable::illegal_argument(format!("对象不是动态对象, 无法调用方法 {}", method))
    })?;
    let class = dynamic.class.clone();
    class.invoke(object, method, arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use infrastructure_common::SimpleTypeConverter;

    #[derive(Default)]
    struct Greeter {
        greeting: String,
        initialized: bool,
    }

    fn greeter_class() -> Arc<BeanClass> {
        let contract = BeanClass::interface("Greeting").method("greet").build();
        BeanClass::builder::<Greeter>("Greeter")
            .implements(contract)
            .default_constructor()
            .property("greeting", |bean: &mut Greeter, value: String| bean.greeting = value)
            .init_method("init", |bean: &mut Greeter| {
                bean.initialized = true;
                Ok(())
            })
            .method("greet", |bean: &Greeter, _args| {
                Ok(Some(Arc::new(format!("{}!", bean.greeting)) as Object))
            })
            .build()
    }

    #[test]
    fn test_construct_populate_and_invoke() {
        let class = greeter_class();
        let converter: Arc<dyn TypeConverter> = Arc::new(SimpleTypeConverter::new());

        let constructor = class.default_constructor().unwrap();
        let mut instance = constructor
            .instantiate(&Arguments::new(Vec::new(), converter.clone()))
            .unwrap();
        class
            .find_property("greeting")
            .unwrap()
            .set(instance.as_mut(), Value::text("hello"), converter.as_ref())
            .unwrap();
        (class.find_init_method("init").unwrap())(instance.as_mut()).unwrap();

        let object: Object = Arc::from(instance);
        assert!(object.downcast_ref::<Greeter>().unwrap().initialized);

        let result = class.invoke(&object, "greet", &[]).unwrap().unwrap();
        assert_eq!(result.downcast_ref::<String>().map(String::as_str), Some("hello!"));
    }

    #[test]
    fn test_assignability_through_interfaces() {
        let class = greeter_class();
        assert!(class.is_assignable_to(&TypeInfo::named("Greeting")));
        assert!(class.is_assignable_to(&TypeInfo::of::<Greeter>()));
        assert!(!class.is_assignable_to(&TypeInfo::named("Other")));
        assert_eq!(class.all_interfaces().len(), 1);
    }

    #[test]
    fn test_missing_method_is_unsupported() {
        let class = greeter_class();
        let object: Object = Arc::new(Greeter::default());
        let error = class.invoke(&object, "wave", &[]).unwrap_err();
        assert!(error.is_a("UnsupportedOperationException"));
    }
}
