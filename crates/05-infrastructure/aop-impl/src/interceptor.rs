//! 内置通知的拦截器形式

use aop_abstractions::{
    AfterReturningAdvice, InvocationResult, MethodBeforeAdvice, MethodInterceptor,
    MethodInvocation, ThrowsAdvice, ThrowsContext, ThrowsHandler,
};
use infrastructure_common::{AopError, AopResult, Throwable};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// 前置通知拦截器
pub struct MethodBeforeAdviceInterceptor {
    advice: Arc<dyn MethodBeforeAdvice>,
}

impl MethodBeforeAdviceInterceptor {
    /// 包装前置通知
    pub fn new(advice: Arc<dyn MethodBeforeAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for MethodBeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult {
        self.advice
            .before(invocation.method(), invocation.arguments(), invocation.this())?;
        invocation.proceed()
    }

    fn name(&self) -> &str {
        "MethodBeforeAdviceInterceptor"
    }
}

/// 返回后通知拦截器
///
/// 只在目标方法正常返回时调用通知, 异常直接向外传播。
pub struct AfterReturningAdviceInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl AfterReturningAdviceInterceptor {
    /// 包装返回后通知
    pub fn new(advice: Arc<dyn AfterReturningAdvice>) -> Self {
        Self { advice }
    }
}

impl MethodInterceptor for AfterReturningAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult {
        let value = invocation.proceed()?;
        self.advice.after_returning(
            value.as_ref(),
            invocation.method(),
            invocation.arguments(),
            invocation.this(),
        )?;
        Ok(value)
    }

    fn name(&self) -> &str {
        "AfterReturningAdviceInterceptor"
    }
}

/// 异常通知拦截器
///
/// 调用失败时沿异常种类的父链查找最接近的处理方法并调用, 然后重新抛出原始异常。
/// 处理方法自身失败只记录警告, 不会替换原始异常。
pub struct ThrowsAdviceInterceptor {
    advice: Arc<ThrowsAdvice>,
}

impl ThrowsAdviceInterceptor {
    /// 包装异常通知, 通知至少要有一个处理方法
    pub fn new(advice: Arc<ThrowsAdvice>) -> AopResult<Self> {
        if advice.handler_count() == 0 {
            return Err(AopError::illegal_argument(format!(
                "异常通知 {} 至少需要一个处理方法",
                advice.name()
            )));
        }
        debug!(
            "创建异常通知拦截器: {} ({} 个处理方法)",
            advice.name(),
            advice.handler_count()
        );
        Ok(Self { advice })
    }

    /// 处理方法数量
    pub fn handler_method_count(&self) -> usize {
        self.advice.handler_count()
    }

    /// 为异常查找处理方法, 返回匹配的异常种类名称和处理方法
    pub fn exception_handler<'a>(&'a self, exception: &'a Throwable) -> Option<(&'a str, &'a ThrowsHandler)> {
        trace!("查找异常 {} 的处理方法", exception.kind());
        let found = exception
            .kind()
            .lineage()
            .find_map(|kind| self.advice.handler(kind.name()).map(|handler| (kind.name(), handler)));
        if let Some((kind, _)) = found {
            debug!("异常 {} 由 {} 的处理方法处理", exception.kind(), kind);
        }
        found
    }
}

impl MethodInterceptor for ThrowsAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult {
        let exception = match invocation.proceed() {
            Ok(value) => return Ok(value),
            Err(exception) => exception,
        };
        if let Some((kind, handler)) = self.exception_handler(&exception) {
            let context = ThrowsContext {
                method: invocation.method(),
                arguments: invocation.arguments(),
                target: invocation.this(),
                exception: &exception,
            };
            if let Err(handler_error) = handler(&context) {
                warn!(
                    "异常通知 {} 处理 {} 时失败, 继续抛出原始异常: {}",
                    self.advice.name(),
                    kind,
                    handler_error
                );
            }
        }
        Err(exception)
    }

    fn name(&self) -> &str {
        "ThrowsAdviceInterceptor"
    }
}
