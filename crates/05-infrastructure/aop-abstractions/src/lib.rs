//! # AOP Abstractions
//!
//! 方法拦截的抽象层: 通知、通知器、切点、拦截器链和代理配置。
//!
//! ## 核心接口
//!
//! - [`MethodInterceptor`] / [`MethodInvocation`] - 环绕拦截与调用链
//! - [`Advice`] - 通知种类 (环绕、前置、返回后、异常、自定义)
//! - [`Advisor`] - 通知与适用规则的组合, 包括引入
//! - [`Pointcut`] / [`ClassFilter`] / [`MethodMatcher`] - 适用规则
//! - [`ChainEntry`] / [`AdvisorChainFactory`] - 按方法构建的拦截器链
//! - [`ProxyConfig`] / [`ProxyKind`] / [`AopProxy`] - 代理配置与策略

pub mod advice;
pub mod advisor;
pub mod chain;
pub mod invocation;
pub mod pointcut;
pub mod proxy;

pub use advice::*;
pub use advisor::*;
pub use chain::*;
pub use invocation::*;
pub use pointcut::*;
pub use proxy::*;
