//! 默认组件容器
//!
//! [`DefaultBeanFactory`] 是组件查找的入口: 解析名称和别名, 按作用域分派创建,
//! 处理工厂组件间接层, 并在需要时委托给父容器。

use crate::merge::MergedDefinitionCache;
use crate::registry::DefinitionRegistry;
use crate::singleton::DefaultSingletonRegistry;
use crate::tracking;
use dashmap::{DashMap, DashSet};
use di_abstractions::{
    AliasRegistry, BeanClass, BeanDefinition, BeanDefinitionRegistry, BeanFactory,
    BeanPostProcessor, ClassLoader, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    ContainerConfig, ContainerStats, DynamicObject, ExpressionResolver, HierarchicalBeanFactory,
    ListableBeanFactory, Scope, StringValueResolver, FACTORY_BEAN_PREFIX, SCOPE_PROTOTYPE,
    SCOPE_SINGLETON,
};
use infrastructure_common::{
    sort_by_order, DependencyError, DependencyResult, Object, ScopeError, TypeConverter, TypeInfo,
    Value,
};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// 默认组件容器
pub struct DefaultBeanFactory {
    /// 容器标识, 用作线程内创建跟踪的键
    pub(crate) id: Uuid,
    /// 指向自身的弱引用
    pub(crate) self_ref: Weak<DefaultBeanFactory>,
    /// 容器配置
    pub(crate) config: ContainerConfig,
    /// 父容器
    pub(crate) parent: Option<Arc<dyn ConfigurableListableBeanFactory>>,
    /// 组件定义与别名
    pub(crate) registry: DefinitionRegistry,
    /// 合并定义缓存
    pub(crate) merged: MergedDefinitionCache,
    /// 单例注册表
    pub(crate) singletons: DefaultSingletonRegistry,
    /// 单例工厂组件的产品缓存
    pub(crate) factory_bean_objects: DashMap<String, Object>,
    /// 已解析的组件类, 按类名
    pub(crate) resolved_classes: DashMap<String, Arc<BeanClass>>,
    /// 已创建实例的类, 按运行时类型
    pub(crate) instance_classes: DashMap<TypeId, Arc<BeanClass>>,
    /// 自定义作用域
    pub(crate) scopes: DashMap<String, Arc<dyn Scope>>,
    /// 按顺序排列的后置处理器
    pub(crate) post_processors: RwLock<Vec<Arc<dyn BeanPostProcessor>>>,
    /// 内嵌值解析器
    pub(crate) embedded_value_resolvers: RwLock<Vec<Arc<dyn StringValueResolver>>>,
    /// 表达式解析器
    pub(crate) expression_resolver: RwLock<Option<Arc<dyn ExpressionResolver>>>,
    /// 类型转换器
    pub(crate) type_converter: RwLock<Arc<dyn TypeConverter>>,
    /// 组件类加载器
    pub(crate) class_loader: Arc<dyn ClassLoader>,
    /// 类型探测使用的临时类加载器
    pub(crate) temp_class_loader: RwLock<Option<Arc<dyn ClassLoader>>>,
    /// 至少创建过一次的组件名
    pub(crate) already_created: DashSet<String>,
}

/// 名称是否带有工厂组件解引用前缀
pub fn is_factory_dereference(name: &str) -> bool {
    name.starts_with(FACTORY_BEAN_PREFIX)
}

fn factory_dereference(bean_name: &str) -> String {
    format!("{}{}", FACTORY_BEAN_PREFIX, bean_name)
}

impl DefaultBeanFactory {
    pub(crate) fn with_parts(
        self_ref: Weak<DefaultBeanFactory>,
        config: ContainerConfig,
        parent: Option<Arc<dyn ConfigurableListableBeanFactory>>,
        class_loader: Arc<dyn ClassLoader>,
        type_converter: Arc<dyn TypeConverter>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            self_ref,
            registry: DefinitionRegistry::new(config.allow_bean_definition_overriding),
            config,
            parent,
            merged: MergedDefinitionCache::new(),
            singletons: DefaultSingletonRegistry::new(id),
            factory_bean_objects: DashMap::new(),
            resolved_classes: DashMap::new(),
            instance_classes: DashMap::new(),
            scopes: DashMap::new(),
            post_processors: RwLock::new(Vec::new()),
            embedded_value_resolvers: RwLock::new(Vec::new()),
            expression_resolver: RwLock::new(None),
            type_converter: RwLock::new(type_converter),
            class_loader,
            temp_class_loader: RwLock::new(None),
            already_created: DashSet::new(),
        }
    }

    /// 容器标识
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 以 `BeanFactory` 形式暴露的自身弱引用
    pub(crate) fn weak_factory(&self) -> Weak<dyn BeanFactory> {
        let weak: Weak<dyn BeanFactory> = self.self_ref.clone();
        weak
    }

    /// 去掉解引用前缀并解析别名
    pub(crate) fn transformed_bean_name(&self, name: &str) -> String {
        let stripped = name.trim_start_matches(FACTORY_BEAN_PREFIX);
        self.registry.canonical_name(stripped)
    }

    fn original_bean_name(&self, name: &str) -> String {
        let bean_name = self.transformed_bean_name(name);
        if is_factory_dereference(name) {
            factory_dereference(&bean_name)
        } else {
            bean_name
        }
    }

    /// 标记组件至少创建过一次
    pub(crate) fn mark_bean_as_created(&self, bean_name: &str) {
        if self.already_created.insert(bean_name.to_string()) {
            // 之后的合并结果才进入缓存
            self.merged.remove(bean_name);
        }
    }

    /// 当前的后置处理器快照
    pub(crate) fn post_processors(&self) -> Vec<Arc<dyn BeanPostProcessor>> {
        self.post_processors.read().clone()
    }

    /// 查找组件, 允许返回正在创建中的单例的提前引用
    pub fn get_bean_ref(&self, name: &str) -> DependencyResult<Value> {
        self.do_get_bean(name, None, None, false)
    }

    /// 组件查找的核心流程
    pub(crate) fn do_get_bean(
        &self,
        name: &str,
        required_type: Option<&TypeInfo>,
        arguments: Option<Vec<Value>>,
        type_check_only: bool,
    ) -> DependencyResult<Value> {
        let bean_name = self.transformed_bean_name(name);
        let arguments = arguments.filter(|values| !values.is_empty());

        if arguments.is_none() {
            if let Some(shared) = self.singletons.get_singleton(&bean_name, true) {
                let value = match shared {
                    Value::Early(reference) => {
                        if !is_factory_dereference(name) && self.is_factory_bean(&bean_name).unwrap_or(false) {
                            return Err(DependencyError::CircularDependency {
                                name: bean_name.clone(),
                                dependency_chain: tracking::describe_cycle(self.id, &bean_name),
                            });
                        }
                        trace!("返回正在创建中的单例组件的提前引用: {}", bean_name);
                        Value::Early(reference)
                    }
                    Value::Object(object) => {
                        trace!("返回缓存的单例组件实例: {}", bean_name);
                        self.get_object_for_bean_instance(object, name, &bean_name, None)?
                    }
                    other => other,
                };
                return self.adapt_bean_instance(&bean_name, value, required_type);
            }
        }

        if tracking::is_prototype_in_creation(self.id, &bean_name) {
            return Err(DependencyError::CircularDependency {
                name: bean_name.clone(),
                dependency_chain: tracking::describe_cycle(self.id, &bean_name),
            });
        }

        if let Some(parent) = &self.parent {
            if !self.registry.contains(&bean_name) {
                let original = self.original_bean_name(name);
                debug!("本容器没有组件定义, 委托父容器查找: {}", original);
                let object = match (arguments, required_type) {
                    (Some(arguments), _) => parent.get_bean_with_args(&original, arguments)?,
                    (None, Some(required)) => parent.get_bean_of_type(&original, required)?,
                    (None, None) => parent.get_bean(&original)?,
                };
                return Ok(Value::Object(object));
            }
        }

        if !type_check_only {
            self.mark_bean_as_created(&bean_name);
        }

        let result = self.create_by_scope(name, &bean_name, arguments.as_deref());
        match result {
            Ok(value) => self.adapt_bean_instance(&bean_name, value, required_type),
            Err(error) => {
                self.already_created.remove(&bean_name);
                Err(error)
            }
        }
    }

    fn create_by_scope(
        &self,
        name: &str,
        bean_name: &str,
        arguments: Option<&[Value]>,
    ) -> DependencyResult<Value> {
        let mbd = self.get_merged_local_bean_definition(bean_name)?;
        if mbd.is_abstract {
            return Err(DependencyError::ComponentIsAbstract {
                name: bean_name.to_string(),
            });
        }
        if arguments.is_some() && !mbd.is_prototype() {
            return Err(DependencyError::invalid_definition(
                bean_name,
                "只有原型组件可以使用显式构造参数",
            ));
        }

        for dependency in &mbd.depends_on {
            let dependency = self.transformed_bean_name(dependency);
            if self.singletons.is_dependent(bean_name, &dependency) {
                return Err(DependencyError::CircularDependency {
                    name: bean_name.to_string(),
                    dependency_chain: format!("{} -> {} -> {}", bean_name, dependency, bean_name),
                });
            }
            self.singletons.register_dependent_bean(&dependency, bean_name);
            if let Err(error) = self.get_bean(&dependency) {
                return Err(if error.is_circular() {
                    error
                } else {
                    DependencyError::creation_failed(bean_name, error)
                });
            }
        }

        let object = match mbd.effective_scope() {
            SCOPE_SINGLETON => {
                let created = self
                    .singletons
                    .get_or_create(bean_name, || self.create_bean(bean_name, &mbd, None));
                match created {
                    Ok(object) => object,
                    Err(error) => {
                        self.singletons.destroy_singleton(bean_name);
                        return Err(error);
                    }
                }
            }
            SCOPE_PROTOTYPE => {
                let _guard = tracking::begin_prototype(self.id, bean_name);
                debug!("创建原型组件: {}", bean_name);
                self.create_bean(bean_name, &mbd, arguments)?
            }
            scope_name => {
                let scope = self
                    .scopes
                    .get(scope_name)
                    .map(|entry| entry.value().clone())
                    .ok_or_else(|| DependencyError::NoSuchScope {
                        scope: scope_name.to_string(),
                    })?;
                debug!("委托作用域 '{}' 获取组件: {}", scope_name, bean_name);
                let object_factory = || -> DependencyResult<Object> {
                    let _guard = tracking::begin_prototype(self.id, bean_name);
                    self.create_bean(bean_name, &mbd, None)
                };
                scope
                    .get(bean_name, &object_factory)
                    .map_err(|error| self.scope_error(bean_name, error))?
            }
        };

        self.get_object_for_bean_instance(object, name, bean_name, Some(&mbd))
    }

    pub(crate) fn scope_error(&self, bean_name: &str, error: ScopeError) -> DependencyError {
        match error {
            ScopeError::NotActive { scope, message } => DependencyError::ScopeNotActive {
                name: bean_name.to_string(),
                scope,
                message: format!(
                    "{}; 如需在单例中引用该组件, 请改用 Deferred 延迟引用或为其配置作用域代理",
                    message
                ),
            },
            ScopeError::Creation(error) => error,
        }
    }

    /// 按所需类型检查组件实例, 不兼容时尝试类型转换
    fn adapt_bean_instance(
        &self,
        bean_name: &str,
        value: Value,
        required_type: Option<&TypeInfo>,
    ) -> DependencyResult<Value> {
        let (Some(required), Value::Object(object)) = (required_type, &value) else {
            return Ok(value);
        };
        if self.object_matches(object, required) {
            return Ok(value);
        }
        if let Some(converted) = self.type_converter().convert_object(object, required) {
            debug!("组件 {} 已转换为所需类型 {}", bean_name, required);
            return Ok(Value::Object(converted));
        }
        Err(DependencyError::TypeMismatch {
            name: bean_name.to_string(),
            expected: required.name.clone(),
            actual: self.describe_object_type(object),
        })
    }

    /// 把公开查找的结果转换为组件实例
    fn expose(&self, value: Value) -> DependencyResult<Object> {
        match value {
            Value::Object(object) => Ok(object),
            Value::Early(reference) => Err(DependencyError::CircularDependency {
                name: reference.name().to_string(),
                dependency_chain: tracking::describe_cycle(self.id, reference.name()),
            }),
            other => Err(DependencyError::illegal_state(format!(
                "组件查找返回了非对象值: {}",
                other.describe()
            ))),
        }
    }

    /// 对象的运行时类
    pub(crate) fn class_for_instance(&self, instance: &(dyn Any + Send + Sync)) -> Option<Arc<BeanClass>> {
        if let Some(dynamic) = instance.downcast_ref::<DynamicObject>() {
            return Some(dynamic.class().clone());
        }
        let type_id = (*instance).type_id();
        self.instance_classes
            .get(&type_id)
            .map(|entry| entry.value().clone())
            .or_else(|| self.class_loader.class_for_type_id(type_id))
    }

    /// 组件实例的运行时类
    pub fn class_of_object(&self, object: &Object) -> Option<Arc<BeanClass>> {
        self.class_for_instance(object.as_ref())
    }

    /// 类型信息对应的组件类
    fn class_for_type(&self, target: &TypeInfo) -> Option<Arc<BeanClass>> {
        match target.id {
            Some(type_id) => self
                .instance_classes
                .get(&type_id)
                .map(|entry| entry.value().clone())
                .or_else(|| self.class_loader.class_for_type_id(type_id)),
            None => self.class_loader.load_class(&target.name),
        }
    }

    /// 实例是否与目标类型兼容
    pub(crate) fn object_matches(&self, object: &Object, target: &TypeInfo) -> bool {
        if target.id == Some((**object).type_id()) {
            return true;
        }
        self.class_of_object(object)
            .is_some_and(|class| class.is_assignable_to(target))
    }

    fn type_matches(&self, actual: &TypeInfo, target: &TypeInfo) -> bool {
        actual == target
            || self
                .class_for_type(actual)
                .is_some_and(|class| class.is_assignable_to(target))
    }

    fn type_info_of_object(&self, object: &Object) -> TypeInfo {
        match self.class_of_object(object) {
            Some(class) => class.type_info(),
            None => TypeInfo::new((**object).type_id(), "<未登记的类型>"),
        }
    }

    fn describe_object_type(&self, object: &Object) -> String {
        self.type_info_of_object(object).name
    }

    /// 把组件实例转换为对外暴露的对象: 解引用返回工厂本身, 否则返回工厂的产品
    pub(crate) fn get_object_for_bean_instance(
        &self,
        instance: Object,
        name: &str,
        bean_name: &str,
        mbd: Option<&BeanDefinition>,
    ) -> DependencyResult<Value> {
        let factory_class = self
            .class_of_object(&instance)
            .filter(|class| class.is_factory_bean());

        if is_factory_dereference(name) {
            if factory_class.is_none() {
                return Err(DependencyError::NotAFactory {
                    name: bean_name.to_string(),
                    actual: self.describe_object_type(&instance),
                });
            }
            return Ok(Value::Object(instance));
        }

        let Some(class) = factory_class else {
            return Ok(Value::Object(instance));
        };
        let Some(factory) = class.as_factory_bean(instance.as_ref()) else {
            return Ok(Value::Object(instance));
        };
        let synthetic = match mbd {
            Some(definition) => definition.synthetic,
            None => self
                .registry
                .get(bean_name)
                .is_some_and(|definition| definition.synthetic),
        };
        self.get_object_from_factory_bean(factory, bean_name, !synthetic)
            .map(Value::Object)
    }

    /// 获取工厂组件的产品, 单例工厂的产品只创建并后置处理一次
    pub(crate) fn get_object_from_factory_bean(
        &self,
        factory: &dyn di_abstractions::FactoryBean,
        bean_name: &str,
        should_post_process: bool,
    ) -> DependencyResult<Object> {
        if factory.is_singleton() && self.singletons.contains(bean_name) {
            if let Some(cached) = self.factory_bean_objects.get(bean_name) {
                return Ok(cached.value().clone());
            }
            let _lock = self.singletons.lock_creation();
            if let Some(cached) = self.factory_bean_objects.get(bean_name) {
                return Ok(cached.value().clone());
            }
            let mut object = self.do_get_object_from_factory_bean(factory, bean_name)?;
            if should_post_process {
                if self.singletons.is_in_creation(bean_name) {
                    // 工厂仍在创建中, 暂时返回未经后置处理的产品
                    return Ok(object);
                }
                object = self.apply_after_initialization(object, bean_name)?;
            }
            if self.singletons.contains(bean_name) {
                self.factory_bean_objects
                    .insert(bean_name.to_string(), object.clone());
                debug!("缓存工厂组件的单例产品: {}", bean_name);
            }
            return Ok(object);
        }

        let object = self.do_get_object_from_factory_bean(factory, bean_name)?;
        if should_post_process {
            return self.apply_after_initialization(object, bean_name);
        }
        Ok(object)
    }

    fn do_get_object_from_factory_bean(
        &self,
        factory: &dyn di_abstractions::FactoryBean,
        bean_name: &str,
    ) -> DependencyResult<Object> {
        trace!("从工厂组件获取产品: {}", bean_name);
        factory
            .get_object()
            .map_err(|error| self.wrap_callback_error(bean_name, error))
    }

    /// 预测组件的类, 不创建实例
    pub(crate) fn predict_bean_class(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
    ) -> Option<Arc<BeanClass>> {
        let class = match mbd.factory_method_name.as_deref() {
            Some(method_name) => self.predict_factory_method_class(bean_name, mbd, method_name),
            None => self.resolve_bean_class(mbd, bean_name, true).ok().flatten(),
        }?;
        if !mbd.synthetic {
            for processor in self.post_processors() {
                if let Some(predicted) = processor.predict_bean_type(&class, bean_name) {
                    return Some(predicted);
                }
            }
        }
        Some(class)
    }

    fn predict_factory_method_class(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        method_name: &str,
    ) -> Option<Arc<BeanClass>> {
        let factory_class = match mbd.factory_bean_name.as_deref() {
            Some(factory_bean_name) => {
                let factory_bean_name = self.transformed_bean_name(factory_bean_name);
                match self.singletons.get_object(&factory_bean_name) {
                    Some(object) => self.class_of_object(&object),
                    None => {
                        let factory_mbd = self.merged_definition_anywhere(&factory_bean_name).ok()?;
                        self.resolve_bean_class(&factory_mbd, &factory_bean_name, true)
                            .ok()
                            .flatten()
                    }
                }
            }
            None => self.resolve_bean_class(mbd, bean_name, true).ok().flatten(),
        }?;
        let methods = factory_class.factory_methods(method_name);
        let return_type = methods.first()?.return_type();
        self.class_for_type(return_type)
    }

    fn predicted_factory_method_type(&self, bean_name: &str, mbd: &BeanDefinition) -> Option<TypeInfo> {
        let method_name = mbd.factory_method_name.as_deref()?;
        let factory_class = match mbd.factory_bean_name.as_deref() {
            Some(factory_bean_name) => {
                let factory_bean_name = self.transformed_bean_name(factory_bean_name);
                let factory_mbd = self.merged_definition_anywhere(&factory_bean_name).ok()?;
                self.resolve_bean_class(&factory_mbd, &factory_bean_name, true)
                    .ok()
                    .flatten()
            }
            None => self.resolve_bean_class(mbd, bean_name, true).ok().flatten(),
        }?;
        let methods = factory_class.factory_methods(method_name);
        methods.first().map(|method| method.return_type().clone())
    }

    /// 探测工厂组件的产品类型, 失败时记录并抑制错误
    fn get_type_for_factory_bean(&self, bean_name: &str) -> Option<TypeInfo> {
        if self.singletons.is_in_creation(bean_name) {
            return None;
        }
        match self.do_get_bean(&factory_dereference(bean_name), None, None, true) {
            Ok(Value::Object(factory)) => self
                .class_of_object(&factory)
                .and_then(|class| class.as_factory_bean(factory.as_ref()).and_then(|bean| bean.object_type())),
            Ok(_) => None,
            Err(error) => {
                warn!("探测工厂组件 {} 的产品类型失败: {}", bean_name, error);
                self.singletons
                    .on_suppressed_error(format!("{}: {}", bean_name, error));
                None
            }
        }
    }

    /// 设置表达式解析器
    pub fn set_expression_resolver(&self, resolver: Arc<dyn ExpressionResolver>) {
        *self.expression_resolver.write() = Some(resolver);
    }

    /// 设置类型探测使用的临时类加载器
    pub fn set_temp_class_loader(&self, class_loader: Option<Arc<dyn ClassLoader>>) {
        *self.temp_class_loader.write() = class_loader;
    }

    /// 销毁单个单例及依赖它的组件
    pub fn destroy_singleton(&self, name: &str) {
        let bean_name = self.transformed_bean_name(name);
        self.factory_bean_objects.remove(&bean_name);
        self.singletons.destroy_singleton(&bean_name);
    }

    /// 被抑制的错误
    pub fn suppressed_errors(&self) -> Vec<String> {
        self.singletons.suppressed_errors()
    }

    /// 容器统计信息
    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            registered_definitions: self.registry.len(),
            merged_definitions: self.merged.len(),
            active_singletons: self.singletons.len(),
            registered_scopes: self.scopes.len(),
            post_processors: self.post_processors.read().len(),
            suppressed_errors: self.singletons.suppressed_errors().len(),
        }
    }
}

impl std::fmt::Debug for DefaultBeanFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultBeanFactory")
            .field("id", &self.id)
            .field("definitions", &self.registry.names())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl BeanFactory for DefaultBeanFactory {
    fn get_bean(&self, name: &str) -> DependencyResult<Object> {
        let value = self.do_get_bean(name, None, None, false)?;
        self.expose(value)
    }

    fn get_bean_with_args(&self, name: &str, arguments: Vec<Value>) -> DependencyResult<Object> {
        let value = self.do_get_bean(name, None, Some(arguments), false)?;
        self.expose(value)
    }

    fn get_bean_of_type(&self, name: &str, required_type: &TypeInfo) -> DependencyResult<Object> {
        let value = self.do_get_bean(name, Some(required_type), None, false)?;
        self.expose(value)
    }

    fn contains_bean(&self, name: &str) -> bool {
        let bean_name = self.transformed_bean_name(name);
        if self.singletons.contains(&bean_name) || self.registry.contains(&bean_name) {
            return !is_factory_dereference(name) || self.is_factory_bean(name).unwrap_or(false);
        }
        self.parent
            .as_ref()
            .is_some_and(|parent| parent.contains_bean(&self.original_bean_name(name)))
    }

    fn is_singleton(&self, name: &str) -> DependencyResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        let dereference = is_factory_dereference(name);

        if let Some(object) = self.singletons.get_object(&bean_name) {
            return Ok(match self.class_of_object(&object) {
                Some(class) if class.is_factory_bean() => {
                    dereference
                        || class
                            .as_factory_bean(object.as_ref())
                            .is_some_and(|factory| factory.is_singleton())
                }
                _ => !dereference,
            });
        }
        if !self.registry.contains(&bean_name) {
            if let Some(parent) = &self.parent {
                return parent.is_singleton(&self.original_bean_name(name));
            }
        }

        let mbd = self.get_merged_local_bean_definition(&bean_name)?;
        if !mbd.is_singleton() {
            return Ok(false);
        }
        if self.is_factory_bean(&bean_name)? {
            if dereference {
                return Ok(true);
            }
            let factory = self.get_bean(&factory_dereference(&bean_name))?;
            return Ok(self
                .class_of_object(&factory)
                .and_then(|class| class.as_factory_bean(factory.as_ref()).map(|bean| bean.is_singleton()))
                .unwrap_or(true));
        }
        Ok(!dereference)
    }

    fn is_prototype(&self, name: &str) -> DependencyResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        let dereference = is_factory_dereference(name);

        if !self.registry.contains(&bean_name) {
            if let Some(parent) = &self.parent {
                if !self.singletons.contains(&bean_name) {
                    return parent.is_prototype(&self.original_bean_name(name));
                }
            }
            if self.singletons.contains(&bean_name) {
                return Ok(false);
            }
        }

        let mbd = self.get_merged_local_bean_definition(&bean_name)?;
        if mbd.is_prototype() {
            return Ok(!dereference || self.is_factory_bean(&bean_name)?);
        }
        if dereference {
            return Ok(false);
        }
        if self.is_factory_bean(&bean_name)? {
            let factory = self.get_bean(&factory_dereference(&bean_name))?;
            return Ok(self
                .class_of_object(&factory)
                .and_then(|class| class.as_factory_bean(factory.as_ref()).map(|bean| !bean.is_singleton()))
                .unwrap_or(false));
        }
        Ok(false)
    }

    fn is_type_match(&self, name: &str, target: &TypeInfo) -> DependencyResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        let dereference = is_factory_dereference(name);

        if let Some(object) = self.singletons.get_object(&bean_name) {
            if let Some(class) = self.class_of_object(&object).filter(|class| class.is_factory_bean()) {
                if !dereference {
                    let product_type = class
                        .as_factory_bean(object.as_ref())
                        .and_then(|factory| factory.object_type());
                    return Ok(product_type.is_some_and(|product| self.type_matches(&product, target)));
                }
            }
            return Ok(self.object_matches(&object, target));
        }
        if !self.registry.contains(&bean_name) {
            if let Some(parent) = &self.parent {
                return parent.is_type_match(&self.original_bean_name(name), target);
            }
        }
        Ok(self
            .get_type(name)?
            .is_some_and(|actual| self.type_matches(&actual, target)))
    }

    fn get_type(&self, name: &str) -> DependencyResult<Option<TypeInfo>> {
        let bean_name = self.transformed_bean_name(name);
        let dereference = is_factory_dereference(name);

        if let Some(object) = self.singletons.get_object(&bean_name) {
            if !dereference {
                if let Some(class) = self.class_of_object(&object).filter(|class| class.is_factory_bean()) {
                    return Ok(class
                        .as_factory_bean(object.as_ref())
                        .and_then(|factory| factory.object_type()));
                }
            }
            return Ok(Some(self.type_info_of_object(&object)));
        }
        if !self.registry.contains(&bean_name) {
            if let Some(parent) = &self.parent {
                return parent.get_type(&self.original_bean_name(name));
            }
        }

        let mbd = self.get_merged_local_bean_definition(&bean_name)?;
        match self.predict_bean_class(&bean_name, &mbd) {
            Some(class) if class.is_factory_bean() && !dereference => {
                Ok(self.get_type_for_factory_bean(&bean_name))
            }
            Some(class) => Ok(Some(class.type_info())),
            None => Ok(self.predicted_factory_method_type(&bean_name, &mbd)),
        }
    }

    fn get_aliases(&self, name: &str) -> Vec<String> {
        let bean_name = self.transformed_bean_name(name);
        let prefix = if is_factory_dereference(name) {
            FACTORY_BEAN_PREFIX
        } else {
            ""
        };
        let full_name = format!("{}{}", prefix, bean_name);

        let mut aliases = Vec::new();
        if full_name != name {
            aliases.push(full_name.clone());
        }
        for alias in self.registry.aliases().aliases_of(&bean_name) {
            let alias = format!("{}{}", prefix, alias);
            if alias != name {
                aliases.push(alias);
            }
        }
        if !self.singletons.contains(&bean_name) && !self.registry.contains(&bean_name) {
            if let Some(parent) = &self.parent {
                aliases.extend(parent.get_aliases(&full_name));
            }
        }
        aliases
    }
}

impl HierarchicalBeanFactory for DefaultBeanFactory {
    fn parent_bean_factory(&self) -> Option<Arc<dyn ConfigurableListableBeanFactory>> {
        self.parent.clone()
    }

    fn contains_local_bean(&self, name: &str) -> bool {
        let bean_name = self.transformed_bean_name(name);
        (self.singletons.contains(&bean_name) || self.registry.contains(&bean_name))
            && (!is_factory_dereference(name) || self.is_factory_bean(&bean_name).unwrap_or(false))
    }
}

impl ConfigurableBeanFactory for DefaultBeanFactory {
    fn get_merged_bean_definition(&self, name: &str) -> DependencyResult<Arc<BeanDefinition>> {
        let bean_name = self.transformed_bean_name(name);
        self.merged_definition_anywhere(&bean_name)
    }

    fn is_factory_bean(&self, name: &str) -> DependencyResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        if let Some(object) = self.singletons.get_object(&bean_name) {
            return Ok(self
                .class_of_object(&object)
                .is_some_and(|class| class.is_factory_bean()));
        }
        if !self.registry.contains(&bean_name) {
            return match &self.parent {
                Some(parent) => parent.is_factory_bean(name),
                None => Err(DependencyError::not_registered(bean_name)),
            };
        }
        let mbd = self.get_merged_local_bean_definition(&bean_name)?;
        Ok(self
            .predict_bean_class(&bean_name, &mbd)
            .is_some_and(|class| class.is_factory_bean()))
    }

    fn is_currently_in_creation(&self, name: &str) -> bool {
        let bean_name = self.transformed_bean_name(name);
        self.singletons.is_in_creation(&bean_name)
            || tracking::is_prototype_in_creation(self.id, &bean_name)
    }

    fn register_scope(&self, name: &str, scope: Arc<dyn Scope>) -> DependencyResult<()> {
        if name == SCOPE_SINGLETON || name == SCOPE_PROTOTYPE {
            return Err(DependencyError::RegistrationError {
                name: name.to_string(),
                message: "不能替换内置的 singleton 和 prototype 作用域".to_string(),
            });
        }
        if self.scopes.insert(name.to_string(), scope).is_some() {
            info!("替换已注册的作用域: {}", name);
        } else {
            info!("注册作用域: {}", name);
        }
        Ok(())
    }

    fn get_registered_scope(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes.get(name).map(|entry| entry.value().clone())
    }

    fn get_registered_scope_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scopes.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        let mut processors = self.post_processors.write();
        processors.retain(|existing| existing.name() != processor.name());
        info!("添加组件后置处理器: {}", processor.name());
        processors.push(processor);
        sort_by_order(processors.as_mut_slice());
    }

    fn get_bean_post_processor_count(&self) -> usize {
        self.post_processors.read().len()
    }

    fn register_singleton(&self, name: &str, object: Object) -> DependencyResult<()> {
        self.singletons.register_singleton(name, object)?;
        info!("手动注册单例组件: {}", name);
        Ok(())
    }

    fn contains_singleton(&self, name: &str) -> bool {
        self.singletons.contains(name)
    }

    fn get_singleton_names(&self) -> Vec<String> {
        self.singletons.names()
    }

    fn register_dependent_bean(&self, name: &str, dependent: &str) {
        let bean_name = self.transformed_bean_name(name);
        self.singletons.register_dependent_bean(&bean_name, dependent);
    }

    fn get_dependent_beans(&self, name: &str) -> Vec<String> {
        self.singletons.dependent_beans(name)
    }

    fn get_dependencies_for_bean(&self, name: &str) -> Vec<String> {
        self.singletons.dependencies_for_bean(name)
    }

    fn destroy_bean(&self, name: &str, instance: Object) {
        let bean_name = self.transformed_bean_name(name);
        let Ok(mbd) = self.merged_definition_anywhere(&bean_name) else {
            warn!("销毁组件时找不到定义: {}", bean_name);
            return;
        };
        let class = self.class_of_object(&instance);
        match crate::disposable::DisposableBeanAdapter::new(
            &bean_name,
            instance,
            class,
            &mbd,
            self.post_processors(),
        ) {
            Ok(adapter) => adapter.destroy(),
            Err(error) => warn!("无法销毁组件 {}: {}", bean_name, error),
        }
    }

    fn destroy_scoped_bean(&self, name: &str) -> DependencyResult<()> {
        let bean_name = self.transformed_bean_name(name);
        let mbd = self.get_merged_local_bean_definition(&bean_name)?;
        if mbd.is_singleton() || mbd.is_prototype() {
            return Err(DependencyError::invalid_definition(
                &bean_name,
                "组件不属于自定义作用域, 不能作为作用域组件销毁",
            ));
        }
        let scope_name = mbd.effective_scope();
        let scope = self
            .get_registered_scope(scope_name)
            .ok_or_else(|| DependencyError::NoSuchScope {
                scope: scope_name.to_string(),
            })?;
        if let Some(instance) = scope.remove(&bean_name) {
            debug!("从作用域 '{}' 中移除并销毁组件: {}", scope_name, bean_name);
            self.destroy_bean(&bean_name, instance);
        }
        Ok(())
    }

    fn destroy_singletons(&self) {
        self.singletons.destroy_singletons();
        self.factory_bean_objects.clear();
    }

    fn add_embedded_value_resolver(&self, resolver: Arc<dyn StringValueResolver>) {
        self.embedded_value_resolvers.write().push(resolver);
    }

    fn resolve_embedded_value(&self, value: &str) -> anyhow::Result<String> {
        let resolvers = self.embedded_value_resolvers.read().clone();
        let mut result = value.to_string();
        for resolver in resolvers {
            result = resolver.resolve_string_value(&result)?;
        }
        Ok(result)
    }

    fn set_type_converter(&self, converter: Arc<dyn TypeConverter>) {
        *self.type_converter.write() = converter;
    }

    fn type_converter(&self) -> Arc<dyn TypeConverter> {
        self.type_converter.read().clone()
    }

    fn bean_class_loader(&self) -> Arc<dyn ClassLoader> {
        self.class_loader.clone()
    }
}

impl ListableBeanFactory for DefaultBeanFactory {
    fn get_bean_names_for_type(
        &self,
        target: &TypeInfo,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> Vec<String> {
        let mut result = Vec::new();

        for bean_name in self.registry.names() {
            let Ok(mbd) = self.get_merged_local_bean_definition(&bean_name) else {
                continue;
            };
            if mbd.is_abstract {
                continue;
            }
            if !allow_eager_init {
                let factory_pending = mbd.factory_bean_name.as_deref().is_some_and(|factory| {
                    !self.singletons.contains(&self.transformed_bean_name(factory))
                });
                if factory_pending {
                    continue;
                }
            }

            let class = self.predict_bean_class(&bean_name, &mbd);
            let is_factory = class.as_ref().is_some_and(|class| class.is_factory_bean());
            if is_factory {
                let product_matches = (allow_eager_init || self.singletons.contains(&bean_name))
                    && (include_non_singletons || self.is_singleton(&bean_name).unwrap_or(false))
                    && self.is_type_match(&bean_name, target).unwrap_or(false);
                if product_matches {
                    result.push(bean_name);
                    continue;
                }
                let factory_matches = (include_non_singletons || mbd.is_singleton())
                    && class.is_some_and(|class| class.is_assignable_to(target));
                if factory_matches {
                    result.push(factory_dereference(&bean_name));
                }
                continue;
            }

            if (include_non_singletons || mbd.is_singleton())
                && self.is_type_match(&bean_name, target).unwrap_or(false)
            {
                result.push(bean_name);
            }
        }

        for bean_name in self.singletons.names() {
            if self.registry.contains(&bean_name) || result.contains(&bean_name) {
                continue;
            }
            let Some(object) = self.singletons.get_object(&bean_name) else {
                continue;
            };
            match self.class_of_object(&object).filter(|class| class.is_factory_bean()) {
                Some(class) => {
                    if self.is_type_match(&bean_name, target).unwrap_or(false) {
                        result.push(bean_name);
                    } else if class.is_assignable_to(target) {
                        result.push(factory_dereference(&bean_name));
                    }
                }
                None => {
                    if self.object_matches(&object, target) {
                        result.push(bean_name);
                    }
                }
            }
        }
        result
    }

    fn get_beans_of_type(
        &self,
        target: &TypeInfo,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> DependencyResult<Vec<(String, Object)>> {
        let mut beans = Vec::new();
        for name in self.get_bean_names_for_type(target, include_non_singletons, allow_eager_init) {
            match self.get_bean(&name) {
                Ok(object) => beans.push((name, object)),
                Err(error) if error.is_circular() && self.is_currently_in_creation(&name) => {
                    debug!("跳过正在创建中的组件: {}", name);
                }
                Err(error) => return Err(error),
            }
        }
        Ok(beans)
    }

    fn pre_instantiate_singletons(&self) -> DependencyResult<()> {
        info!("预实例化单例组件");
        for bean_name in self.registry.names() {
            let mbd = self.get_merged_local_bean_definition(&bean_name)?;
            if mbd.is_abstract || !mbd.is_singleton() || mbd.lazy_init {
                continue;
            }
            if self.is_factory_bean(&bean_name)? {
                let factory = self.get_bean(&factory_dereference(&bean_name))?;
                let eager = self
                    .class_of_object(&factory)
                    .and_then(|class| class.as_factory_bean(factory.as_ref()).map(|bean| bean.is_eager_init()))
                    .unwrap_or(false);
                if eager {
                    self.get_bean(&bean_name)?;
                }
            } else {
                self.get_bean(&bean_name)?;
            }
        }
        debug!("单例组件预实例化完成, 共 {} 个", self.singletons.len());
        Ok(())
    }
}

impl AliasRegistry for DefaultBeanFactory {
    fn register_alias(&self, name: &str, alias: &str) -> DependencyResult<()> {
        self.registry.register_alias(name, alias)
    }

    fn remove_alias(&self, alias: &str) -> DependencyResult<()> {
        self.registry.remove_alias(alias)
    }

    fn is_alias(&self, name: &str) -> bool {
        self.registry.is_alias(name)
    }
}

impl BeanDefinitionRegistry for DefaultBeanFactory {
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> DependencyResult<()> {
        let previous = self.registry.insert(name, definition)?;
        if previous.is_some() || self.singletons.contains(name) {
            self.reset_bean_definition(name);
        }
        Ok(())
    }

    fn remove_bean_definition(&self, name: &str) -> DependencyResult<()> {
        self.registry.remove(name)?;
        self.reset_bean_definition(name);
        Ok(())
    }

    fn get_bean_definition(&self, name: &str) -> DependencyResult<Arc<BeanDefinition>> {
        self.registry.get_bean_definition(name)
    }

    fn contains_bean_definition(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    fn get_bean_definition_names(&self) -> Vec<String> {
        self.registry.names()
    }

    fn get_bean_definition_count(&self) -> usize {
        self.registry.len()
    }

    fn is_bean_name_in_use(&self, name: &str) -> bool {
        self.registry.is_bean_name_in_use(name) || self.singletons.has_dependent_bean(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BeanFactoryBuilder;
    use di_abstractions::{BeanFactoryExt, ClassRegistry, FactoryBean};

    #[derive(Debug, Default)]
    struct Greeter {
        greeting: String,
    }

    #[derive(Debug, Default)]
    struct GreeterFactory;

    impl FactoryBean for GreeterFactory {
        fn get_object(&self) -> anyhow::Result<Object> {
            Ok(Arc::new(Greeter {
                greeting: "你好".to_string(),
            }))
        }

        fn object_type(&self) -> Option<TypeInfo> {
            Some(TypeInfo::of::<Greeter>())
        }
    }

    fn factory() -> Arc<DefaultBeanFactory> {
        let classes = Arc::new(ClassRegistry::new());
        classes.register(
            BeanClass::builder::<Greeter>("Greeter")
                .default_constructor()
                .property("greeting", |greeter: &mut Greeter, value: String| greeter.greeting = value)
                .build(),
        );
        classes.register(
            BeanClass::builder::<GreeterFactory>("GreeterFactory")
                .default_constructor()
                .factory_bean()
                .build(),
        );
        BeanFactoryBuilder::new().with_class_loader(classes).build()
    }

    #[test]
    fn test_singleton_is_cached_and_reachable_by_alias() {
        let factory = factory();
        factory
            .register_bean_definition(
                "greeter",
                BeanDefinition::for_class_name("Greeter")
                    .with_property("greeting", di_abstractions::DefinitionValue::literal("hello")),
            )
            .unwrap();
        factory.register_alias("greeter", "welcome").unwrap();

        let first = factory.get_bean_typed::<Greeter>("greeter").unwrap();
        let second = factory.get_bean_typed::<Greeter>("welcome").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.greeting, "hello");
        assert_eq!(factory.get_aliases("greeter"), vec!["welcome".to_string()]);
    }

    #[test]
    fn test_unregistered_class_is_remembered_for_instances() {
        #[derive(Debug, Default)]
        struct Clock;

        let factory = BeanFactoryBuilder::new().build();
        let class = BeanClass::builder::<Clock>("Clock").default_constructor().build();
        factory
            .register_bean_definition("clock", BeanDefinition::for_class(class.clone()))
            .unwrap();

        let clock = factory.get_bean("clock").unwrap();
        let resolved = factory.class_of_object(&clock).unwrap();
        assert!(Arc::ptr_eq(&resolved, &class));
    }

    #[test]
    fn test_prototype_creates_new_instances() {
        let factory = factory();
        factory
            .register_bean_definition(
                "greeter",
                BeanDefinition::for_class_name("Greeter").with_scope(SCOPE_PROTOTYPE),
            )
            .unwrap();

        let first = factory.get_bean("greeter").unwrap();
        let second = factory.get_bean("greeter").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(factory.is_prototype("greeter").unwrap());
        assert!(!factory.contains_singleton("greeter"));
    }

    #[test]
    fn test_factory_bean_dereference() {
        let factory = factory();
        factory
            .register_bean_definition("greeter", BeanDefinition::for_class_name("GreeterFactory"))
            .unwrap();

        assert!(factory.is_factory_bean("greeter").unwrap());
        assert_eq!(
            factory.get_type("greeter").unwrap(),
            Some(TypeInfo::of::<Greeter>())
        );

        let product = factory.get_bean_typed::<Greeter>("greeter").unwrap();
        assert_eq!(product.greeting, "你好");
        let again = factory.get_bean_typed::<Greeter>("greeter").unwrap();
        assert!(Arc::ptr_eq(&product, &again));

        let raw = factory.get_bean("&greeter").unwrap();
        assert!(raw.downcast_ref::<GreeterFactory>().is_some());
        assert!(factory.contains_bean("&greeter"));
    }

    #[test]
    fn test_dereference_of_plain_bean_fails() {
        let factory = factory();
        factory
            .register_bean_definition("greeter", BeanDefinition::for_class_name("Greeter"))
            .unwrap();
        let error = factory.get_bean("&greeter").unwrap_err();
        assert!(matches!(error, DependencyError::NotAFactory { .. }));
    }

    #[test]
    fn test_abstract_definition_cannot_be_created() {
        let factory = factory();
        factory
            .register_bean_definition(
                "template",
                BeanDefinition::for_class_name("Greeter").with_abstract(true),
            )
            .unwrap();
        let error = factory.get_bean("template").unwrap_err();
        assert!(matches!(error, DependencyError::ComponentIsAbstract { .. }));
    }

    #[test]
    fn test_unknown_bean_is_not_registered() {
        let factory = factory();
        let error = factory.get_bean("missing").unwrap_err();
        assert!(error.is_not_found());
        assert!(!factory.contains_bean("missing"));
    }

    #[test]
    fn test_builtin_scopes_cannot_be_replaced() {
        let factory = factory();
        let scope: Arc<dyn Scope> = Arc::new(crate::scope::ThreadScope::new());
        assert!(factory.register_scope(SCOPE_SINGLETON, scope.clone()).is_err());
        assert!(factory.register_scope("thread", scope).is_ok());
        assert_eq!(factory.get_registered_scope_names(), vec!["thread".to_string()]);
    }

    #[test]
    fn test_get_bean_names_for_type() {
        let factory = factory();
        factory
            .register_bean_definition("plain", BeanDefinition::for_class_name("Greeter"))
            .unwrap();
        factory
            .register_bean_definition("produced", BeanDefinition::for_class_name("GreeterFactory"))
            .unwrap();

        let names = factory.get_bean_names_for_type(&TypeInfo::of::<Greeter>(), true, true);
        assert_eq!(names, vec!["plain".to_string(), "produced".to_string()]);
        let factories = factory.get_bean_names_for_type(&TypeInfo::of::<GreeterFactory>(), true, true);
        assert_eq!(factories, vec!["&produced".to_string()]);
    }
}
