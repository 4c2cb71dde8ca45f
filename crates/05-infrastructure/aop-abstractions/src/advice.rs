//! 通知
//!
//! 通知描述"在连接点做什么"。环绕拦截器以外的通知种类 (前置、返回后、异常)
//! 由适配器统一转换为 [`MethodInterceptor`]。

use crate::invocation::{Method, MethodInterceptor};
use infrastructure_common::{Object, Throwable};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 前置通知
pub trait MethodBeforeAdvice: Send + Sync {
    /// 在目标方法执行之前调用, 返回错误时目标方法不会执行
    fn before(&self, method: &Method, arguments: &[Object], target: Option<&Object>) -> Result<(), Throwable>;
}

/// 返回后通知
pub trait AfterReturningAdvice: Send + Sync {
    /// 在目标方法正常返回之后调用
    fn after_returning(
        &self,
        return_value: Option<&Object>,
        method: &Method,
        arguments: &[Object],
        target: Option<&Object>,
    ) -> Result<(), Throwable>;
}

/// 异常处理方法看到的调用信息
pub struct ThrowsContext<'a> {
    /// 被调用的方法
    pub method: &'a Method,
    /// 调用参数
    pub arguments: &'a [Object],
    /// 目标对象
    pub target: Option<&'a Object>,
    /// 抛出的异常
    pub exception: &'a Throwable,
}

/// 异常处理方法
pub type ThrowsHandler = Arc<dyn Fn(&ThrowsContext<'_>) -> Result<(), Throwable> + Send + Sync>;

/// 异常通知
///
/// 按异常种类登记处理方法。调用抛出异常时, 选择与异常种类最接近的处理方法。
/// 处理方法只能观察异常, 原始异常总是会被重新抛出。
#[derive(Clone)]
pub struct ThrowsAdvice {
    name: String,
    handlers: HashMap<String, ThrowsHandler>,
}

impl ThrowsAdvice {
    /// 创建没有处理方法的异常通知
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: HashMap::new(),
        }
    }

    /// 为给定异常种类 (及其子种类) 登记处理方法
    pub fn on<F>(mut self, kind_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ThrowsContext<'_>) -> Result<(), Throwable> + Send + Sync + 'static,
    {
        self.handlers.insert(kind_name.into(), Arc::new(handler));
        self
    }

    /// 通知名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 指定异常种类上直接登记的处理方法
    pub fn handler(&self, kind_name: &str) -> Option<&ThrowsHandler> {
        self.handlers.get(kind_name)
    }

    /// 处理方法数量
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl fmt::Debug for ThrowsAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("ThrowsAdvice")
            .field("name", &self.name)
            .field("handlers", &kinds)
            .finish()
    }
}

/// 通知
#[derive(Clone)]
pub enum Advice {
    /// 环绕拦截器
    Interceptor(Arc<dyn MethodInterceptor>),
    /// 前置通知
    Before(Arc<dyn MethodBeforeAdvice>),
    /// 返回后通知
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    /// 异常通知
    Throws(Arc<ThrowsAdvice>),
    /// 需要自定义适配器才能转换的通知
    Custom {
        /// 通知种类名称, 适配器据此识别
        kind: String,
        /// 通知对象
        advice: Object,
    },
}

impl Advice {
    /// 以环绕拦截器创建通知
    pub fn interceptor<I: MethodInterceptor + 'static>(interceptor: I) -> Self {
        Self::Interceptor(Arc::new(interceptor))
    }

    /// 以前置通知创建通知
    pub fn before<B: MethodBeforeAdvice + 'static>(advice: B) -> Self {
        Self::Before(Arc::new(advice))
    }

    /// 以返回后通知创建通知
    pub fn after_returning<A: AfterReturningAdvice + 'static>(advice: A) -> Self {
        Self::AfterReturning(Arc::new(advice))
    }

    /// 以异常通知创建通知
    pub fn throws(advice: ThrowsAdvice) -> Self {
        Self::Throws(Arc::new(advice))
    }

    /// 通知种类名称
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Interceptor(_) => "MethodInterceptor",
            Self::Before(_) => "MethodBeforeAdvice",
            Self::AfterReturning(_) => "AfterReturningAdvice",
            Self::Throws(_) => "ThrowsAdvice",
            Self::Custom { kind, .. } => kind,
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interceptor(interceptor) => write!(f, "Interceptor({})", interceptor.name()),
            Self::Throws(advice) => write!(f, "Throws({})", advice.name()),
            other => f.write_str(other.kind_name()),
        }
    }
}

impl<F> MethodBeforeAdvice for F
where
    F: Fn(&Method, &[Object], Option<&Object>) -> Result<(), Throwable> + Send + Sync,
{
    fn before(&self, method: &Method, arguments: &[Object], target: Option<&Object>) -> Result<(), Throwable> {
        self(method, arguments, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throws_advice_registers_handlers_by_kind() {
        let advice = ThrowsAdvice::new("auditing")
            .on("IOException", |_context| Ok(()))
            .on("IllegalStateException", |_context| Ok(()));

        assert_eq!(advice.handler_count(), 2);
        assert!(advice.handler("IOException").is_some());
        assert!(advice.handler("FileNotFoundException").is_none());
        assert_eq!(Advice::throws(advice).kind_name(), "ThrowsAdvice");
    }

    #[test]
    fn test_custom_advice_reports_its_kind() {
        let advice = Advice::Custom {
            kind: "RetryAdvice".to_string(),
            advice: Arc::new(3u32) as Object,
        };
        assert_eq!(advice.kind_name(), "RetryAdvice");
        assert_eq!(format!("{:?}", advice), "RetryAdvice");
    }
}
