//! # AOP Implementation
//!
//! 拦截器链与代理的实现。
//!
//! ## 核心组件
//!
//! - [`DefaultAdvisorAdapterRegistry`] - 把通知包装成通知器, 把通知器转换成拦截器
//! - [`DefaultAdvisorChainFactory`] - 按方法构建拦截器链
//! - [`ReflectiveMethodInvocation`] - 沿拦截器链推进的方法调用
//! - [`DefaultAopProxyFactory`] - 在接口代理和类代理之间选择
//! - [`ProxyFactory`] - 编程式创建代理
//! - [`AutoProxyCreator`] - 在容器中自动为组件创建代理
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let factory = ProxyFactory::for_target(Arc::new(OrderService::default()), order_service_class)?;
//! factory.add_advisor(DefaultPointcutAdvisor::for_methods(["place*"], Advice::interceptor(Timing)).into_advisor())?;
//! let proxy = factory.get_proxy()?;
//! invoke_dynamic(&proxy, "placeOrder", &[])?;
//! ```

pub mod adapter;
pub mod advisor;
pub mod auto_proxy;
pub mod chain;
pub mod interceptor;
pub mod introduction;
pub mod invocation;
pub mod pointcut;
pub mod proxy;
pub mod support;
pub mod utils;

pub use adapter::{
    global_adapter_registry, AfterReturningAdviceAdapter, DefaultAdvisorAdapterRegistry,
    MethodBeforeAdviceAdapter, ThrowsAdviceAdapter,
};
pub use advisor::DefaultPointcutAdvisor;
pub use auto_proxy::{AutoProxyCreator, AUTO_PROXY_CREATOR_NAME};
pub use chain::{has_matching_introductions, DefaultAdvisorChainFactory};
pub use interceptor::{
    AfterReturningAdviceInterceptor, MethodBeforeAdviceInterceptor, ThrowsAdviceInterceptor,
};
pub use introduction::{DefaultIntroductionAdvisor, DelegatingIntroductionInterceptor};
pub use invocation::{invoke_target, ReflectiveMethodInvocation};
pub use pointcut::{
    simple_match, ComposablePointcut, NameMatchMethodMatcher, NameMatchMethodPointcut,
    NamePatternClassFilter, RuntimeMethodMatcher, TrueClassFilter, TrueMethodMatcher, TruePointcut,
    TypeClassFilter,
};
pub use proxy::{
    advised_of, is_aop_proxy, proxy_kind_of, target_of, ClassProxy, DefaultAopProxyFactory,
    InterfaceProxy, ProxyFactory, ProxyState,
};
pub use support::AdvisedSupport;
pub use utils::{can_apply, can_apply_pointcut, candidate_methods, find_advisors_that_can_apply};
