//! 通知适配器与适配器注册表

use crate::advisor::DefaultPointcutAdvisor;
use crate::interceptor::{
    AfterReturningAdviceInterceptor, MethodBeforeAdviceInterceptor, ThrowsAdviceInterceptor,
};
use aop_abstractions::{Advice, Advisor, AdvisorAdapter, AdvisorAdapterRegistry, MethodInterceptor};
use infrastructure_common::{AopError, AopResult};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// 前置通知适配器
#[derive(Debug, Default)]
pub struct MethodBeforeAdviceAdapter;

impl AdvisorAdapter for MethodBeforeAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Before(_))
    }

    fn interceptor(&self, advice: &Advice) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advice {
            Advice::Before(advice) => Ok(Arc::new(MethodBeforeAdviceInterceptor::new(advice.clone()))),
            other => Err(unsupported(other)),
        }
    }
}

/// 返回后通知适配器
#[derive(Debug, Default)]
pub struct AfterReturningAdviceAdapter;

impl AdvisorAdapter for AfterReturningAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::AfterReturning(_))
    }

    fn interceptor(&self, advice: &Advice) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advice {
            Advice::AfterReturning(advice) => {
                Ok(Arc::new(AfterReturningAdviceInterceptor::new(advice.clone())))
            }
            other => Err(unsupported(other)),
        }
    }
}

/// 异常通知适配器
#[derive(Debug, Default)]
pub struct ThrowsAdviceAdapter;

impl AdvisorAdapter for ThrowsAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Throws(_))
    }

    fn interceptor(&self, advice: &Advice) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advice {
            Advice::Throws(advice) => Ok(Arc::new(ThrowsAdviceInterceptor::new(advice.clone())?)),
            other => Err(unsupported(other)),
        }
    }
}

fn unsupported(advice: &Advice) -> AopError {
    AopError::illegal_argument(format!("适配器不支持通知 {}", advice.kind_name()))
}

/// 默认的适配器注册表
///
/// 内置前置、返回后和异常通知的适配器, 可以注册自定义适配器。
pub struct DefaultAdvisorAdapterRegistry {
    adapters: RwLock<Vec<Arc<dyn AdvisorAdapter>>>,
}

impl DefaultAdvisorAdapterRegistry {
    /// 创建带内置适配器的注册表
    pub fn new() -> Self {
        Self {
            adapters: RwLock::new(vec![
                Arc::new(MethodBeforeAdviceAdapter),
                Arc::new(AfterReturningAdviceAdapter),
                Arc::new(ThrowsAdviceAdapter),
            ]),
        }
    }

    /// 已注册的适配器数量
    pub fn adapter_count(&self) -> usize {
        self.adapters.read().len()
    }
}

impl Default for DefaultAdvisorAdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisorAdapterRegistry for DefaultAdvisorAdapterRegistry {
    fn wrap(&self, advice: Advice) -> AopResult<Advisor> {
        let supported = matches!(advice, Advice::Interceptor(_))
            || self
                .adapters
                .read()
                .iter()
                .any(|adapter| adapter.supports_advice(&advice));
        if !supported {
            return Err(AopError::UnknownAdviceType {
                advice: advice.kind_name().to_string(),
            });
        }
        Ok(DefaultPointcutAdvisor::always(advice).into_advisor())
    }

    fn interceptors(&self, advisor: &Advisor) -> AopResult<Vec<Arc<dyn MethodInterceptor>>> {
        let advice = advisor.advice();
        let mut interceptors = Vec::with_capacity(1);
        if let Advice::Interceptor(interceptor) = &advice {
            interceptors.push(interceptor.clone());
        }
        for adapter in self.adapters.read().iter() {
            if adapter.supports_advice(&advice) {
                interceptors.push(adapter.interceptor(&advice)?);
            }
        }
        if interceptors.is_empty() {
            return Err(AopError::UnknownAdviceType {
                advice: advice.kind_name().to_string(),
            });
        }
        Ok(interceptors)
    }

    fn register_adapter(&self, adapter: Arc<dyn AdvisorAdapter>) {
        self.adapters.write().push(adapter);
        debug!("注册通知适配器, 当前共 {} 个", self.adapter_count());
    }
}

static GLOBAL_REGISTRY: Lazy<Arc<DefaultAdvisorAdapterRegistry>> =
    Lazy::new(|| Arc::new(DefaultAdvisorAdapterRegistry::new()));

/// 进程内共享的适配器注册表
pub fn global_adapter_registry() -> Arc<DefaultAdvisorAdapterRegistry> {
    GLOBAL_REGISTRY.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aop_abstractions::{InvocationResult, Method, MethodBeforeAdvice, MethodInvocation, ThrowsAdvice};
    use infrastructure_common::{Object, Throwable};

    struct NoopBefore;

    impl MethodBeforeAdvice for NoopBefore {
        fn before(&self, _method: &Method, _arguments: &[Object], _target: Option<&Object>) -> Result<(), Throwable> {
            Ok(())
        }
    }

    struct Retry;

    struct RetryInterceptor;

    impl MethodInterceptor for RetryInterceptor {
        fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult {
            invocation.proceed().or_else(|_| invocation.proceed())
        }
    }

    struct RetryAdapter;

    impl AdvisorAdapter for RetryAdapter {
        fn supports_advice(&self, advice: &Advice) -> bool {
            matches!(advice, Advice::Custom { advice, .. } if advice.is::<Retry>())
        }

        fn interceptor(&self, _advice: &Advice) -> AopResult<Arc<dyn MethodInterceptor>> {
            Ok(Arc::new(RetryInterceptor))
        }
    }

    fn retry_advice() -> Advice {
        Advice::Custom {
            kind: "Retry".to_string(),
            advice: Arc::new(Retry),
        }
    }

    #[test]
    fn test_wrap_known_advice() {
        let registry = DefaultAdvisorAdapterRegistry::new();
        let advisor = registry.wrap(Advice::before(NoopBefore)).unwrap();
        assert!(matches!(advisor, Advisor::Pointcut(_)));

        let interceptors = registry.interceptors(&advisor).unwrap();
        assert_eq!(interceptors.len(), 1);
        assert_eq!(interceptors[0].name(), "MethodBeforeAdviceInterceptor");
    }

    #[test]
    fn test_unknown_advice_is_rejected() {
        let registry = DefaultAdvisorAdapterRegistry::new();
        let error = registry.wrap(retry_advice()).unwrap_err();
        assert!(matches!(error, AopError::UnknownAdviceType { ref advice } if advice == "Retry"));

        let error = registry
            .interceptors(&Advisor::Generic(retry_advice()))
            .err()
            .expect("未知通知应当被拒绝");
        assert!(matches!(error, AopError::UnknownAdviceType { .. }));
    }

    #[test]
    fn test_custom_adapter() {
        let registry = DefaultAdvisorAdapterRegistry::new();
        registry.register_adapter(Arc::new(RetryAdapter));
        assert_eq!(registry.adapter_count(), 4);

        let advisor = registry.wrap(retry_advice()).unwrap();
        assert_eq!(registry.interceptors(&advisor).unwrap().len(), 1);
    }

    #[test]
    fn test_throws_advice_without_handlers_is_illegal() {
        let registry = DefaultAdvisorAdapterRegistry::new();
        let advisor = Advisor::Generic(Advice::throws(ThrowsAdvice::new("empty")));
        let error = registry.interceptors(&advisor).err().expect("没有处理方法的异常通知应当被拒绝");
        assert!(matches!(error, AopError::IllegalArgument { .. }));
    }
}
