//! 组件实例创建
//!
//! 按固定顺序执行: 解析类, 实例化前回调, 实例化, 方法注入, 提前暴露,
//! 属性注入, 初始化, 登记销毁回调。

use crate::disposable::DisposableBeanAdapter;
use crate::factory::DefaultBeanFactory;
use crate::tracking;
use di_abstractions::{
    Arguments, AutowireMode, BeanClass, BeanDefinition, BeanFactory, BeanLookup, ClassReference,
    ConstructorDescriptor, FactoryMethodDescriptor, Instance, MethodOverride, MethodOverrideHandle,
    MethodReplacement, OverrideKind, ReplacementDispatch, AFTER_PROPERTIES_SET,
};
use infrastructure_common::{
    ConversionError, DependencyError, DependencyResult, Object, Throwable, TypeInfo, Value,
};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, trace};

impl DefaultBeanFactory {
    /// 把回调返回的错误转换为容器错误
    ///
    /// 循环依赖保持原样向上传播; 转换到提前引用的失败视为循环依赖。
    pub(crate) fn wrap_callback_error(&self, bean_name: &str, error: anyhow::Error) -> DependencyError {
        let error = match error.downcast::<DependencyError>() {
            Ok(dependency) => return self.nested_error(bean_name, dependency),
            Err(error) => error,
        };
        match error.downcast::<ConversionError>() {
            Ok(ConversionError::EarlyReference { name }) => DependencyError::CircularDependency {
                dependency_chain: tracking::describe_cycle(self.id, &name),
                name,
            },
            Ok(source) => DependencyError::Conversion {
                name: bean_name.to_string(),
                source,
            },
            Err(error) => DependencyError::creation_failed(bean_name, error),
        }
    }

    /// 包装依赖组件的错误, 循环依赖保持原样
    pub(crate) fn nested_error(&self, bean_name: &str, error: DependencyError) -> DependencyError {
        if error.is_circular() {
            error
        } else {
            DependencyError::creation_failed(bean_name, error)
        }
    }

    fn arguments(&self, values: Vec<Value>) -> Arguments {
        Arguments::new(values, self.type_converter.read().clone())
    }

    /// 解析定义中的类
    ///
    /// `type_match_only` 时优先使用临时类加载器, 解析结果不进入缓存。
    pub(crate) fn resolve_bean_class(
        &self,
        mbd: &BeanDefinition,
        bean_name: &str,
        type_match_only: bool,
    ) -> DependencyResult<Option<Arc<BeanClass>>> {
        let class_name = match &mbd.bean_class {
            None => return Ok(None),
            Some(ClassReference::Resolved(class)) => return Ok(Some(class.clone())),
            Some(ClassReference::Named(class_name)) => class_name,
        };
        if let Some(class) = self.resolved_classes.get(class_name) {
            return Ok(Some(class.value().clone()));
        }
        if type_match_only {
            let temp_loader = self.temp_class_loader.read().clone();
            if let Some(loader) = temp_loader {
                trace!("使用临时类加载器解析类 {}", class_name);
                return Ok(loader.load_class(class_name));
            }
        }
        match self.class_loader.load_class(class_name) {
            Some(class) => {
                self.resolved_classes
                    .insert(class_name.clone(), class.clone());
                Ok(Some(class))
            }
            None => Err(DependencyError::ClassNotFound {
                name: bean_name.to_string(),
                class_name: class_name.clone(),
                message: format!("类加载器 {} 中没有登记该类", self.class_loader.loader_name()),
            }),
        }
    }

    /// 创建组件实例
    pub(crate) fn create_bean(
        &self,
        bean_name: &str,
        mbd: &Arc<BeanDefinition>,
        arguments: Option<&[Value]>,
    ) -> DependencyResult<Object> {
        let _guard = tracking::enter_creation(self.id, bean_name);
        trace!("开始创建组件实例: {}", bean_name);

        let class = self.resolve_bean_class(mbd, bean_name, false)?;

        if !mbd.synthetic {
            if let Some(class) = &class {
                if let Some(object) = self.apply_before_instantiation(class, bean_name)? {
                    debug!("后置处理器在实例化之前返回了组件: {}", bean_name);
                    return self.apply_after_initialization(object, bean_name);
                }
            }
        }

        let (mut instance, instance_class) =
            self.create_bean_instance(bean_name, mbd, class.as_ref(), arguments)?;

        if !mbd.method_overrides.is_empty() {
            let class = instance_class.as_ref().ok_or_else(|| {
                DependencyError::invalid_definition(bean_name, "无法确定组件的类, 不能应用方法注入")
            })?;
            self.apply_method_overrides(bean_name, mbd, class, instance.as_mut())?;
        }

        if mbd.is_singleton()
            && self.config.allow_circular_references
            && self.singletons.is_in_creation(bean_name)
        {
            self.singletons.add_early_reference(bean_name);
        }

        self.populate_bean(bean_name, mbd, instance_class.as_ref(), instance.as_mut())?;
        let (raw, exposed) = self.initialize_bean(bean_name, mbd, instance_class.as_ref(), instance)?;

        self.register_disposable_bean_if_necessary(bean_name, &raw, instance_class.as_ref(), mbd)?;
        trace!("组件实例创建完成: {}", bean_name);
        Ok(exposed)
    }

    fn apply_before_instantiation(
        &self,
        class: &Arc<BeanClass>,
        bean_name: &str,
    ) -> DependencyResult<Option<Object>> {
        for processor in self.post_processors() {
            let object = processor
                .post_process_before_instantiation(class, bean_name)
                .map_err(|error| self.wrap_callback_error(bean_name, error))?;
            if object.is_some() {
                return Ok(object);
            }
        }
        Ok(None)
    }

    /// 依次应用初始化后回调
    pub(crate) fn apply_after_initialization(
        &self,
        bean: Object,
        bean_name: &str,
    ) -> DependencyResult<Object> {
        let mut current = bean;
        for processor in self.post_processors() {
            current = processor
                .post_process_after_initialization(current, bean_name)
                .map_err(|error| self.wrap_callback_error(bean_name, error))?;
        }
        Ok(current)
    }

    fn create_bean_instance(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        class: Option<&Arc<BeanClass>>,
        explicit: Option<&[Value]>,
    ) -> DependencyResult<(Instance, Option<Arc<BeanClass>>)> {
        if let Some(method_name) = mbd.factory_method_name.as_deref() {
            let instance =
                self.instantiate_using_factory_method(bean_name, mbd, class, method_name, explicit)?;
            let product_class = self.class_for_instance(instance.as_ref());
            return Ok((instance, product_class));
        }

        let class = class.ok_or_else(|| {
            DependencyError::invalid_definition(bean_name, "组件定义既没有指定类, 也没有指定工厂方法")
        })?;
        if class.is_abstract() || class.is_interface() {
            return Err(DependencyError::invalid_definition(
                bean_name,
                format!("类 {} 是抽象类或接口, 不能实例化", class.name()),
            ));
        }

        let autowire_constructor = match mbd.autowire_mode {
            AutowireMode::Constructor => true,
            AutowireMode::AutoDetect => class.default_constructor().is_none(),
            _ => false,
        } || mbd.has_constructor_arguments()
            || explicit.is_some();

        let instance = if autowire_constructor {
            self.autowire_constructor(bean_name, mbd, class, explicit)?
        } else {
            let constructor = class.default_constructor().ok_or_else(|| {
                DependencyError::invalid_definition(
                    bean_name,
                    format!("类 {} 没有无参构造函数", class.name()),
                )
            })?;
            constructor
                .instantiate(&self.arguments(Vec::new()))
                .map_err(|error| self.wrap_callback_error(bean_name, error))?
        };

        let instance_type = (*instance).type_id();
        if BeanClass::type_id(&class) == Some(instance_type) {
            self.instance_classes.insert(instance_type, class.clone());
        }
        Ok((instance, Some(class.clone())))
    }

    fn autowire_constructor(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        class: &Arc<BeanClass>,
        explicit: Option<&[Value]>,
    ) -> DependencyResult<Instance> {
        let mut candidates: Vec<&ConstructorDescriptor> = class.constructors().iter().collect();
        candidates.sort_by(|left, right| right.parameter_count().cmp(&left.parameter_count()));

        let mut last_error = None;
        for constructor in candidates {
            match self.resolve_arguments(bean_name, mbd, constructor.parameter_types(), explicit) {
                Ok(Some(values)) => {
                    debug!(
                        "使用 {} 个参数的构造函数创建组件: {}",
                        constructor.parameter_count(),
                        bean_name
                    );
                    return constructor
                        .instantiate(&self.arguments(values))
                        .map_err(|error| self.wrap_callback_error(bean_name, error));
                }
                Ok(None) => {}
                Err(error) if error.is_circular() => return Err(error),
                Err(error) => last_error = Some(error),
            }
        }
        Err(last_error.unwrap_or_else(|| DependencyError::UnsatisfiedDependency {
            name: bean_name.to_string(),
            property: "<构造函数>".to_string(),
            message: format!("类 {} 没有可以满足的构造函数", class.name()),
        }))
    }

    fn instantiate_using_factory_method(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        class: Option<&Arc<BeanClass>>,
        method_name: &str,
        explicit: Option<&[Value]>,
    ) -> DependencyResult<Instance> {
        let (factory, factory_class, is_static) = match mbd.factory_bean_name.as_deref() {
            Some(factory_bean_name) => {
                let factory_bean_name = self.transformed_bean_name(factory_bean_name);
                if factory_bean_name == bean_name {
                    return Err(DependencyError::invalid_definition(
                        bean_name,
                        "工厂组件引用指向了组件自身",
                    ));
                }
                let factory = self
                    .get_bean(&factory_bean_name)
                    .map_err(|error| self.nested_error(bean_name, error))?;
                self.singletons
                    .register_dependent_bean(&factory_bean_name, bean_name);
                let factory_class = self.class_of_object(&factory).ok_or_else(|| {
                    DependencyError::invalid_definition(
                        bean_name,
                        format!("无法确定工厂组件 {} 的类", factory_bean_name),
                    )
                })?;
                (Some(factory), factory_class, false)
            }
            None => {
                let class = class.cloned().ok_or_else(|| {
                    DependencyError::invalid_definition(bean_name, "静态工厂方法需要指定组件类")
                })?;
                (None, class, true)
            }
        };

        let mut candidates: Vec<&FactoryMethodDescriptor> = factory_class
            .factory_methods(method_name)
            .into_iter()
            .filter(|method| method.is_static() == is_static)
            .collect();
        if candidates.is_empty() {
            return Err(DependencyError::invalid_definition(
                bean_name,
                format!(
                    "类 {} 没有名为 '{}' 的{}工厂方法",
                    factory_class.name(),
                    method_name,
                    if is_static { "静态" } else { "实例" }
                ),
            ));
        }
        candidates.sort_by(|left, right| right.parameter_count().cmp(&left.parameter_count()));

        let mut last_error = None;
        for method in candidates {
            match self.resolve_arguments(bean_name, mbd, method.parameter_types(), explicit) {
                Ok(Some(values)) => {
                    debug!("调用工厂方法 {}::{} 创建组件: {}", factory_class.name(), method_name, bean_name);
                    return method
                        .invoke(factory.as_ref(), &self.arguments(values))
                        .map_err(|error| self.wrap_callback_error(bean_name, error));
                }
                Ok(None) => {}
                Err(error) if error.is_circular() => return Err(error),
                Err(error) => last_error = Some(error),
            }
        }
        Err(last_error.unwrap_or_else(|| DependencyError::UnsatisfiedDependency {
            name: bean_name.to_string(),
            property: format!("<工厂方法 {}>", method_name),
            message: "没有参数个数匹配的工厂方法".to_string(),
        }))
    }

    /// 为参数列表解析实参, 无法满足时返回 `None`
    ///
    /// 显式实参必须与参数个数一致; 否则依次使用按位置声明的实参、通用实参,
    /// 剩余参数在构造函数装配模式下按类型自动装配。
    pub(crate) fn resolve_arguments(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        parameter_types: &[TypeInfo],
        explicit: Option<&[Value]>,
    ) -> DependencyResult<Option<Vec<Value>>> {
        let count = parameter_types.len();
        if let Some(explicit) = explicit {
            return Ok((explicit.len() == count).then(|| explicit.to_vec()));
        }

        let declared = &mbd.constructor_arguments;
        let autowiring = matches!(
            mbd.autowire_mode,
            AutowireMode::Constructor | AutowireMode::AutoDetect
        );
        if declared.argument_count() > count
            || (!autowiring && declared.argument_count() != count)
            || declared.indexed().keys().any(|index| *index >= count)
        {
            return Ok(None);
        }

        let mut generic = declared.generic().iter();
        let mut values = Vec::with_capacity(count);
        for (index, parameter_type) in parameter_types.iter().enumerate() {
            let argument_name = format!("构造参数[{}]", index);
            let holder = declared.get_indexed(index).or_else(|| generic.next());
            match holder {
                Some(holder) => {
                    values.push(self.resolve_value_if_necessary(bean_name, mbd, &argument_name, &holder.value)?);
                }
                None if autowiring => {
                    match self.find_autowire_candidate(bean_name, parameter_type, None)? {
                        Some(reference) => values.push(self.resolve_reference(bean_name, &reference)?),
                        None => {
                            trace!("组件 {} 的{}没有可装配的候选组件", bean_name, argument_name);
                            return Ok(None);
                        }
                    }
                }
                None => return Ok(None),
            }
        }
        Ok(Some(values))
    }

    fn apply_method_overrides(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        class: &Arc<BeanClass>,
        bean: &mut (dyn Any + Send + Sync),
    ) -> DependencyResult<()> {
        for method_override in mbd.method_overrides.iter() {
            let method_name = method_override.method_name();
            let slot = class.override_slot(method_name).ok_or_else(|| {
                DependencyError::invalid_definition(
                    bean_name,
                    format!("类 {} 没有可注入的方法 '{}'", class.name(), method_name),
                )
            })?;

            let handle = match method_override {
                MethodOverride::Lookup {
                    method_name,
                    bean_name: target,
                } => {
                    if slot.kind() != OverrideKind::Lookup {
                        return Err(DependencyError::invalid_definition(
                            bean_name,
                            format!("方法 '{}' 不是查找方法槽位", method_name),
                        ));
                    }
                    trace!("为组件 {} 注入查找方法 {} -> {}", bean_name, method_name, target);
                    MethodOverrideHandle::Lookup(BeanLookup::new(
                        method_name.clone(),
                        target.clone(),
                        self.weak_factory(),
                    ))
                }
                MethodOverride::Replace {
                    method_name,
                    replacer_bean_name,
                } => {
                    if slot.kind() != OverrideKind::Replace {
                        return Err(DependencyError::invalid_definition(
                            bean_name,
                            format!("方法 '{}' 不是方法替换槽位", method_name),
                        ));
                    }
                    trace!("为组件 {} 注入方法替换 {} -> {}", bean_name, method_name, replacer_bean_name);
                    MethodOverrideHandle::Replace(MethodReplacement::new(
                        method_name.clone(),
                        replacer_bean_name.clone(),
                        self.replacement_dispatch(method_name, replacer_bean_name),
                    ))
                }
            };
            slot.inject(bean, handle)
                .map_err(|error| self.wrap_callback_error(bean_name, error))?;
        }
        Ok(())
    }

    fn replacement_dispatch(&self, method_name: &str, replacer_bean_name: &str) -> ReplacementDispatch {
        let factory = self.self_ref.clone();
        let method = method_name.to_string();
        let replacer = replacer_bean_name.to_string();
        Arc::new(
            move |target: &(dyn Any + Send + Sync), arguments: &[Object]| -> Result<Option<Object>, Throwable> {
                let factory = factory.upgrade().ok_or_else(|| {
                    Throwable::illegal_state(format!("方法 {} 的替换器所属的容器已经关闭", method))
                })?;
                let replacer_object = factory.get_bean(&replacer).map_err(|error| {
                    Throwable::illegal_state(format!("获取方法替换器 {} 失败: {}", replacer, error))
                })?;
                let replacer_class = factory.class_of_object(&replacer_object);
                let replacer_impl = replacer_class
                    .as_ref()
                    .and_then(|class| class.as_method_replacer(replacer_object.as_ref()))
                    .ok_or_else(|| {
                        Throwable::illegal_state(format!("组件 {} 没有实现 MethodReplacer", replacer))
                    })?;
                replacer_impl.reimplement(target, &method, arguments)
            },
        )
    }

    fn initialize_bean(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        class: Option<&Arc<BeanClass>>,
        mut instance: Instance,
    ) -> DependencyResult<(Object, Object)> {
        if let Some(class) = class {
            self.invoke_aware_methods(bean_name, class, instance.as_mut())?;
        }

        if !mbd.synthetic {
            for processor in self.post_processors() {
                processor
                    .post_process_before_initialization(instance.as_mut(), bean_name)
                    .map_err(|error| self.wrap_callback_error(bean_name, error))?;
            }
        }

        self.invoke_init_methods(bean_name, mbd, class, instance.as_mut())?;

        let raw: Object = Arc::from(instance);
        let exposed = if mbd.synthetic {
            raw.clone()
        } else {
            self.apply_after_initialization(raw.clone(), bean_name)?
        };
        Ok((raw, exposed))
    }

    fn invoke_aware_methods(
        &self,
        bean_name: &str,
        class: &Arc<BeanClass>,
        bean: &mut (dyn Any + Send + Sync),
    ) -> DependencyResult<()> {
        if let Some(aware) = class.as_name_aware(bean) {
            aware.set_bean_name(bean_name);
        }
        if let Some(aware) = class.as_class_loader_aware(bean) {
            aware.set_bean_class_loader(self.class_loader.clone());
        }
        if let Some(aware) = class.as_factory_aware(bean) {
            aware
                .set_bean_factory(self.weak_factory())
                .map_err(|error| self.wrap_callback_error(bean_name, error))?;
        }
        Ok(())
    }

    fn invoke_init_methods(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        class: Option<&Arc<BeanClass>>,
        bean: &mut (dyn Any + Send + Sync),
    ) -> DependencyResult<()> {
        let is_initializing = class.is_some_and(|class| class.is_initializing());
        if let Some(class) = class {
            if let Some(initializing) = class.as_initializing(bean) {
                debug!("调用组件 {} 的 after_properties_set", bean_name);
                initializing
                    .after_properties_set()
                    .map_err(|error| self.wrap_callback_error(bean_name, error))?;
            }
        }

        let Some(init_name) = mbd.init_method_name.as_deref() else {
            return Ok(());
        };
        if is_initializing && init_name == AFTER_PROPERTIES_SET {
            return Ok(());
        }
        match class.and_then(|class| class.find_init_method(init_name)) {
            Some(method) => {
                debug!("调用组件 {} 的初始化方法 '{}'", bean_name, init_name);
                method(bean).map_err(|error| self.wrap_callback_error(bean_name, error))
            }
            None if mbd.enforce_init_method => Err(DependencyError::invalid_definition(
                bean_name,
                format!("找不到初始化方法 '{}'", init_name),
            )),
            None => {
                debug!("组件 {} 没有可选的初始化方法 '{}'", bean_name, init_name);
                Ok(())
            }
        }
    }

    fn register_disposable_bean_if_necessary(
        &self,
        bean_name: &str,
        bean: &Object,
        class: Option<&Arc<BeanClass>>,
        mbd: &BeanDefinition,
    ) -> DependencyResult<()> {
        if mbd.is_prototype() {
            return Ok(());
        }
        let processors = self.post_processors();
        if !DisposableBeanAdapter::requires_destruction(bean, class, mbd, &processors) {
            return Ok(());
        }
        let adapter = DisposableBeanAdapter::new(bean_name, bean.clone(), class.cloned(), mbd, processors)?;
        if mbd.is_singleton() {
            self.singletons
                .register_disposable(bean_name, adapter.into_callback());
            return Ok(());
        }

        let scope_name = mbd.effective_scope();
        let scope = self
            .scopes
            .get(scope_name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DependencyError::NoSuchScope {
                scope: scope_name.to_string(),
            })?;
        scope
            .register_destruction_callback(bean_name, adapter.into_callback())
            .map_err(|error| self.scope_error(bean_name, error))
    }
}
