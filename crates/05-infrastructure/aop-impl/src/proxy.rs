//! 代理策略选择与代理创建
//!
//! 代理是携带合成类的 [`DynamicObject`]。接口代理的合成类实现被代理的接口,
//! 只暴露接口上的方法; 类代理的合成类继承目标类, 暴露目标类的全部方法。
//! 两种代理都实现框架标记接口以及引入的接口, 方法调用都经过同一条拦截器链。

use crate::invocation::{invoke_target, ReflectiveMethodInvocation};
use crate::support::AdvisedSupport;
use aop_abstractions::{
    container_proxy_interface, Advice, Advisor, AopProxy, InvocationResult, Method,
    MethodInterceptor, MethodInvocation, ProxyConfig, ProxyKind, CONTAINER_PROXY,
};
use di_abstractions::{BeanClass, DynamicObject, MethodDescriptor, MethodHandle};
use infrastructure_common::{AopError, AopResult, Object, Throwable};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

static PROXY_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// 代理对象的内部状态
pub struct ProxyState {
    support: Arc<AdvisedSupport>,
    kind: ProxyKind,
}

impl ProxyState {
    /// 代理种类
    pub fn kind(&self) -> ProxyKind {
        self.kind
    }
}

fn proxy_state(object: &Object) -> Option<&ProxyState> {
    object
        .downcast_ref::<DynamicObject>()?
        .state()
        .downcast_ref::<ProxyState>()
}

/// 对象是否为本模块创建的代理
pub fn is_aop_proxy(object: &Object) -> bool {
    proxy_state(object).is_some()
}

/// 代理种类, 非代理对象返回 `None`
pub fn proxy_kind_of(object: &Object) -> Option<ProxyKind> {
    proxy_state(object).map(ProxyState::kind)
}

/// 代理背后的通知配置, 不透明的代理返回 `None`
pub fn advised_of(object: &Object) -> Option<Arc<AdvisedSupport>> {
    let state = proxy_state(object)?;
    if state.support.config().opaque {
        return None;
    }
    Some(state.support.clone())
}

/// 代理的目标对象
pub fn target_of(object: &Object) -> Option<Object> {
    proxy_state(object)?.support.target()
}

/// 经过拦截器链调用代理方法
fn dispatch(support: &AdvisedSupport, proxy: &Object, method: &Method, arguments: &[Object]) -> InvocationResult {
    let target_class = support
        .target_class()
        .ok_or_else(|| Throwable::illegal_state(format!("代理配置缺少目标类, 无法调用 {}", method)))?;
    let chain = support.chain_for(method, &target_class).map_err(|error| {
        Throwable::illegal_state(format!("构建方法 {} 的拦截器链失败: {}", method, error))
    })?;
    let target = support.target();
    if chain.is_empty() {
        let target = target.ok_or_else(|| {
            Throwable::unsupported_operation(format!("方法 {} 没有可调用的目标对象", method))
        })?;
        return invoke_target(&target, &target_class, method.name(), arguments);
    }
    ReflectiveMethodInvocation::new(
        Some(proxy),
        target.as_ref(),
        &target_class,
        method,
        arguments.to_vec(),
        &chain,
    )
    .proceed()
}

fn dispatch_handle(support: Arc<AdvisedSupport>, method: Method) -> MethodHandle {
    Arc::new(move |proxy: &Object, arguments: &[Object]| dispatch(&support, proxy, &method, arguments))
}

fn dispatch_descriptor(support: &Arc<AdvisedSupport>, name: &str, declaring_class: &str) -> MethodDescriptor {
    MethodDescriptor::new(
        name,
        declaring_class,
        dispatch_handle(support.clone(), Method::new(name, declaring_class)),
    )
}

/// 代理实现的全部接口: 配置中的接口加上框架标记接口
fn complete_proxied_interfaces(support: &AdvisedSupport) -> Vec<Arc<BeanClass>> {
    let mut interfaces = support.interfaces();
    if !interfaces
        .iter()
        .any(|interface| interface.name() == CONTAINER_PROXY)
    {
        interfaces.push(container_proxy_interface());
    }
    interfaces
}

fn wrap_proxy(class: Arc<BeanClass>, support: &Arc<AdvisedSupport>, kind: ProxyKind) -> Object {
    let state = ProxyState {
        support: support.clone(),
        kind,
    };
    Arc::new(DynamicObject::new(class, Arc::new(state) as Object))
}

/// 基于接口的代理
pub struct InterfaceProxy {
    support: Arc<AdvisedSupport>,
}

impl InterfaceProxy {
    /// 为配置创建接口代理
    pub fn new(support: Arc<AdvisedSupport>) -> Self {
        Self { support }
    }
}

impl AopProxy for InterfaceProxy {
    fn kind(&self) -> ProxyKind {
        ProxyKind::Interface
    }

    fn get_proxy(&self) -> AopResult<Object> {
        let interfaces = complete_proxied_interfaces(&self.support);
        let name = format!("$Proxy{}", PROXY_COUNTER.fetch_add(1, Ordering::Relaxed));
        let mut builder = BeanClass::dynamic(name.clone());
        let mut seen = HashSet::new();
        for interface in &interfaces {
            for (method, declaring_class) in interface.method_signatures() {
                if seen.insert(method.clone()) {
                    builder = builder.method(dispatch_descriptor(&self.support, &method, &declaring_class));
                }
            }
            builder = builder.implements(interface.clone());
        }
        debug!(
            "创建接口代理 {}: 接口 {:?}",
            name,
            interfaces.iter().map(|interface| interface.name()).collect::<Vec<_>>()
        );
        Ok(wrap_proxy(builder.build(), &self.support, ProxyKind::Interface))
    }
}

/// 基于类的代理
pub struct ClassProxy {
    support: Arc<AdvisedSupport>,
}

impl ClassProxy {
    /// 为配置创建类代理
    pub fn new(support: Arc<AdvisedSupport>) -> Self {
        Self { support }
    }
}

impl AopProxy for ClassProxy {
    fn kind(&self) -> ProxyKind {
        ProxyKind::Class
    }

    fn get_proxy(&self) -> AopResult<Object> {
        let target_class = self
            .support
            .target_class()
            .ok_or_else(|| AopError::config("类代理需要目标类"))?;
        let name = format!(
            "{}$$Proxy{}",
            target_class.name(),
            PROXY_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let mut builder = BeanClass::dynamic(name.clone()).extends(target_class.clone());
        for (method, declaring_class) in target_class.method_signatures() {
            builder = builder.method(dispatch_descriptor(&self.support, &method, &declaring_class));
        }
        for interface in complete_proxied_interfaces(&self.support) {
            if target_class.is_assignable_to_class(&interface) {
                continue;
            }
            for (method, declaring_class) in interface.method_signatures() {
                builder = builder.method(dispatch_descriptor(&self.support, &method, &declaring_class));
            }
            builder = builder.implements(interface);
        }
        debug!("创建类代理 {}: 目标类 {}", name, target_class.name());
        Ok(wrap_proxy(builder.build(), &self.support, ProxyKind::Class))
    }
}

/// 默认的代理策略选择器
///
/// 请求优化、要求代理目标类, 或者除框架标记接口外没有代理接口时使用类代理,
/// 否则使用接口代理。
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAopProxyFactory;

impl DefaultAopProxyFactory {
    /// 选择代理种类
    pub fn choose(
        &self,
        config: &ProxyConfig,
        target_class: Option<&BeanClass>,
        interfaces: &[Arc<BeanClass>],
    ) -> AopResult<ProxyKind> {
        let no_user_interfaces = interfaces
            .iter()
            .all(|interface| interface.name() == CONTAINER_PROXY);
        if !(config.optimize || config.proxy_target_class || no_user_interfaces) {
            return Ok(ProxyKind::Interface);
        }
        let target_class = target_class.ok_or_else(|| {
            AopError::config("无法确定目标类: 创建代理需要代理接口或目标对象")
        })?;
        if target_class.is_interface() {
            return Err(AopError::config(format!(
                "目标类 {} 是接口, 没有可以继承的具体类, 无法创建类代理",
                target_class.name()
            )));
        }
        if !config.class_proxy_available {
            return Err(AopError::config(format!(
                "无法代理目标类 {}: 当前运行时不支持类代理。请启用类代理能力 (class_proxy_available) 或指定代理接口",
                target_class.name()
            )));
        }
        Ok(ProxyKind::Class)
    }

    /// 为配置创建代理
    pub fn create_aop_proxy(&self, support: Arc<AdvisedSupport>) -> AopResult<Box<dyn AopProxy>> {
        let target_class = support.target_class();
        let kind = self.choose(&support.config(), target_class.as_deref(), &support.interfaces())?;
        debug!(
            "为 {} 选择{}",
            target_class
                .as_ref()
                .map_or("<无目标类>", |class| class.name()),
            kind
        );
        Ok(match kind {
            ProxyKind::Interface => Box::new(InterfaceProxy::new(support)),
            ProxyKind::Class => Box::new(ClassProxy::new(support)),
        })
    }
}

/// 编程式创建代理
///
/// ```rust,ignore
/// let factory = ProxyFactory::for_target(target, target_class)?;
/// factory.add_advice(Advice::interceptor(Timing))?;
/// let proxy = factory.get_proxy()?;
/// invoke_dynamic(&proxy, "placeOrder", &[])?;
/// ```
pub struct ProxyFactory {
    support: Arc<AdvisedSupport>,
    proxy_factory: DefaultAopProxyFactory,
}

impl ProxyFactory {
    /// 创建空的代理工厂
    pub fn new() -> Self {
        Self {
            support: Arc::new(AdvisedSupport::new()),
            proxy_factory: DefaultAopProxyFactory,
        }
    }

    /// 为目标对象创建代理工厂, 代理目标类实现的全部接口
    pub fn for_target(target: Object, target_class: Arc<BeanClass>) -> AopResult<Self> {
        let factory = Self::new();
        for interface in target_class.all_interfaces() {
            if interface.is_interface() {
                factory.support.add_interface(interface)?;
            }
        }
        factory.support.set_target(target, target_class);
        Ok(factory)
    }

    /// 为没有目标对象的接口创建代理工厂, 所有调用都交给拦截器处理
    pub fn for_interface(interface: Arc<BeanClass>, interceptor: Arc<dyn MethodInterceptor>) -> AopResult<Self> {
        let factory = Self::new();
        factory.support.add_interface(interface.clone())?;
        factory.support.set_target_class(interface);
        factory.support.add_advice(Advice::Interceptor(interceptor))?;
        Ok(factory)
    }

    /// 设置代理配置
    pub fn with_config(self, config: ProxyConfig) -> Self {
        self.support.set_config(config);
        self
    }

    /// 通知配置
    pub fn advised(&self) -> &Arc<AdvisedSupport> {
        &self.support
    }

    /// 增加代理接口
    pub fn add_interface(&self, interface: Arc<BeanClass>) -> AopResult<()> {
        self.support.add_interface(interface)
    }

    /// 增加通知
    pub fn add_advice(&self, advice: Advice) -> AopResult<()> {
        self.support.add_advice(advice)
    }

    /// 增加通知器
    pub fn add_advisor(&self, advisor: Advisor) -> AopResult<()> {
        self.support.add_advisor(advisor)
    }

    /// 将要创建的代理种类
    pub fn proxy_kind(&self) -> AopResult<ProxyKind> {
        let target_class = self.support.target_class();
        self.proxy_factory.choose(
            &self.support.config(),
            target_class.as_deref(),
            &self.support.interfaces(),
        )
    }

    /// 创建代理
    pub fn get_proxy(&self) -> AopResult<Object> {
        let proxy = self
            .proxy_factory
            .create_aop_proxy(self.support.clone())?
            .get_proxy()?;
        debug!(
            "代理已创建: {} 个通知器, {}",
            self.support.advisor_count(),
            proxy_kind_of(&proxy).map_or_else(|| "未知".to_string(), |kind| kind.to_string())
        );
        Ok(proxy)
    }
}

impl Default for ProxyFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introduction::{DefaultIntroductionAdvisor, DelegatingIntroductionInterceptor};
    use aop_abstractions::{is_container_proxy, MethodInvocation};
    use di_abstractions::invoke_dynamic;
    use infrastructure_common::TypeInfo;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Greeter {
        name: String,
    }

    #[derive(Default)]
    struct Stamp;

    struct Exclaim;

    impl MethodInterceptor for Exclaim {
        fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult {
            let value = invocation.proceed()?;
            Ok(value
                .and_then(|value| value.downcast_ref::<String>().cloned())
                .map(|text| Arc::new(format!("{}!", text)) as Object))
        }
    }

    fn greeting_interface() -> Arc<BeanClass> {
        BeanClass::interface("Greeting").method("greet").build()
    }

    fn greeter_class() -> Arc<BeanClass> {
        BeanClass::builder::<Greeter>("Greeter")
            .implements(greeting_interface())
            .method("greet", |greeter: &Greeter, _args| {
                Ok(Some(Arc::new(format!("你好, {}", greeter.name)) as Object))
            })
            .method("whisper", |greeter: &Greeter, _args| {
                Ok(Some(Arc::new(greeter.name.to_lowercase()) as Object))
            })
            .build()
    }

    fn plain_class() -> Arc<BeanClass> {
        BeanClass::builder::<Greeter>("PlainGreeter")
            .method("greet", |greeter: &Greeter, _args| {
                Ok(Some(Arc::new(format!("hi {}", greeter.name)) as Object))
            })
            .build()
    }

    fn greeter(name: &str) -> Object {
        Arc::new(Greeter {
            name: name.to_string(),
        })
    }

    fn text(result: Option<Object>) -> String {
        result
            .and_then(|value| value.downcast_ref::<String>().cloned())
            .unwrap_or_default()
    }

    #[test]
    fn test_interface_proxy_exposes_only_interface_methods() {
        let factory = ProxyFactory::for_target(greeter("Lorn"), greeter_class()).unwrap();
        factory.add_advice(Advice::interceptor(Exclaim)).unwrap();
        assert_eq!(factory.proxy_kind().unwrap(), ProxyKind::Interface);

        let proxy = factory.get_proxy().unwrap();
        assert_eq!(text(invoke_dynamic(&proxy, "greet", &[]).unwrap()), "你好, Lorn!");
        let error = invoke_dynamic(&proxy, "whisper", &[]).unwrap_err();
        assert!(error.is_a("UnsupportedOperationException"));

        let class = proxy.downcast_ref::<DynamicObject>().unwrap().class().clone();
        assert!(class.is_assignable_to(&TypeInfo::named("Greeting")));
        assert!(!class.is_assignable_to(&TypeInfo::of::<Greeter>()));
        assert!(is_container_proxy(&proxy));
        assert_eq!(proxy_kind_of(&proxy), Some(ProxyKind::Interface));
    }

    #[test]
    fn test_target_interfaces_are_registered() {
        let factory = ProxyFactory::for_target(greeter("Lorn"), greeter_class()).unwrap();
        let names: Vec<String> = factory
            .advised()
            .interfaces()
            .iter()
            .map(|interface| interface.name().to_string())
            .collect();
        assert_eq!(names, vec!["Greeting".to_string()]);
        assert!(!factory.advised().has_no_user_supplied_interfaces());

        let plain = ProxyFactory::for_target(greeter("Lorn"), plain_class()).unwrap();
        assert!(plain.advised().interfaces().is_empty());
    }

    #[test]
    fn test_class_proxy_when_no_interfaces() {
        let factory = ProxyFactory::for_target(greeter("Lorn"), plain_class()).unwrap();
        factory.add_advice(Advice::interceptor(Exclaim)).unwrap();
        assert_eq!(factory.proxy_kind().unwrap(), ProxyKind::Class);

        let proxy = factory.get_proxy().unwrap();
        assert_eq!(text(invoke_dynamic(&proxy, "greet", &[]).unwrap()), "hi Lorn!");
        let class = proxy.downcast_ref::<DynamicObject>().unwrap().class().clone();
        assert!(class.is_assignable_to(&TypeInfo::of::<Greeter>()));
        assert!(Arc::ptr_eq(&target_of(&proxy).unwrap(), &factory.advised().target().unwrap()));
    }

    #[test]
    fn test_proxy_target_class_exposes_all_methods() {
        let factory = ProxyFactory::for_target(greeter("Lorn"), greeter_class()).unwrap().with_config(ProxyConfig {
            proxy_target_class: true,
            ..ProxyConfig::default()
        });
        let proxy = factory.get_proxy().unwrap();
        assert_eq!(proxy_kind_of(&proxy), Some(ProxyKind::Class));
        assert_eq!(text(invoke_dynamic(&proxy, "whisper", &[]).unwrap()), "lorn");

        let class = proxy.downcast_ref::<DynamicObject>().unwrap().class().clone();
        assert!(class.is_assignable_to(&TypeInfo::named("Greeting")));
    }

    #[test]
    fn test_strategy_selection() {
        let selector = DefaultAopProxyFactory;
        let class = greeter_class();
        let interfaces = vec![greeting_interface()];
        let defaults = ProxyConfig::default();

        assert_eq!(selector.choose(&defaults, Some(&class), &interfaces).unwrap(), ProxyKind::Interface);
        assert_eq!(selector.choose(&defaults, Some(&class), &[]).unwrap(), ProxyKind::Class);
        assert_eq!(
            selector
                .choose(&defaults, Some(&class), &[container_proxy_interface()])
                .unwrap(),
            ProxyKind::Class
        );
        let optimized = ProxyConfig {
            optimize: true,
            ..ProxyConfig::default()
        };
        assert_eq!(selector.choose(&optimized, Some(&class), &interfaces).unwrap(), ProxyKind::Class);
    }

    #[test]
    fn test_class_proxy_failures() {
        let selector = DefaultAopProxyFactory;
        let defaults = ProxyConfig::default();

        let error = selector
            .choose(&defaults, Some(&greeting_interface()), &[])
            .unwrap_err();
        assert!(matches!(error, AopError::Config { .. }));

        let unavailable = ProxyConfig {
            class_proxy_available: false,
            ..ProxyConfig::default()
        };
        let error = selector.choose(&unavailable, Some(&plain_class()), &[]).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("class_proxy_available"));
        assert!(message.contains("代理接口"));

        assert!(selector.choose(&defaults, None, &[]).is_err());
        assert_eq!(
            selector
                .choose(&unavailable, Some(&plain_class()), &[greeting_interface()])
                .unwrap(),
            ProxyKind::Interface
        );
    }

    #[test]
    fn test_interface_proxy_without_target() {
        let answer = |_invocation: &mut dyn MethodInvocation| -> InvocationResult {
            Ok(Some(Arc::new("由拦截器应答".to_string()) as Object))
        };
        let factory = ProxyFactory::for_interface(greeting_interface(), Arc::new(answer)).unwrap();
        let proxy = factory.get_proxy().unwrap();
        assert_eq!(text(invoke_dynamic(&proxy, "greet", &[]).unwrap()), "由拦截器应答");
        assert!(target_of(&proxy).is_none());
    }

    #[test]
    fn test_introduced_interface_is_delegated() {
        let stamped = BeanClass::interface("Stamped").method("stamp").build();
        let stamp_class = BeanClass::builder::<Stamp>("Stamp")
            .implements(stamped)
            .method("stamp", |_stamp: &Stamp, _args| Ok(Some(Arc::new("已盖章".to_string()) as Object)))
            .build();
        let introduction = DefaultIntroductionAdvisor::for_delegate(DelegatingIntroductionInterceptor::new(
            Arc::new(Stamp) as Object,
            stamp_class,
        ));

        let factory = ProxyFactory::for_target(greeter("Lorn"), plain_class()).unwrap();
        factory.add_advisor(introduction.into_advisor()).unwrap();
        assert!(factory.advised().is_interface_proxied("Stamped"));

        let proxy = factory.get_proxy().unwrap();
        assert_eq!(proxy_kind_of(&proxy), Some(ProxyKind::Interface));
        assert_eq!(text(invoke_dynamic(&proxy, "stamp", &[]).unwrap()), "已盖章");
    }

    #[test]
    fn test_live_proxy_sees_advisor_changes_until_frozen() {
        let calls = Arc::new(Mutex::new(0usize));
        let counter = calls.clone();
        let counting = move |invocation: &mut dyn MethodInvocation| -> InvocationResult {
            *counter.lock() += 1;
            invocation.proceed()
        };

        let factory = ProxyFactory::for_target(greeter("Lorn"), greeter_class()).unwrap();
        let proxy = factory.get_proxy().unwrap();
        invoke_dynamic(&proxy, "greet", &[]).unwrap();
        assert_eq!(*calls.lock(), 0);

        let advised = advised_of(&proxy).unwrap();
        advised.add_advice(Advice::interceptor(counting)).unwrap();
        invoke_dynamic(&proxy, "greet", &[]).unwrap();
        assert_eq!(*calls.lock(), 1);

        advised.set_frozen(true);
        assert!(advised.add_advice(Advice::interceptor(Exclaim)).is_err());
    }

    #[test]
    fn test_opaque_proxy_hides_configuration() {
        let factory = ProxyFactory::for_target(greeter("Lorn"), greeter_class()).unwrap().with_config(ProxyConfig {
            opaque: true,
            ..ProxyConfig::default()
        });
        let proxy = factory.get_proxy().unwrap();
        assert!(is_aop_proxy(&proxy));
        assert!(advised_of(&proxy).is_none());
    }
}
