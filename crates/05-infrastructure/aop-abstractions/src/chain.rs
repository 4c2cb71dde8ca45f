//! 拦截器链

use crate::advisor::Advisor;
use crate::invocation::{Method, MethodInterceptor};
use crate::pointcut::MethodMatcher;
use di_abstractions::BeanClass;
use infrastructure_common::AopResult;
use std::fmt;
use std::sync::Arc;

/// 拦截器链中的一个元素
#[derive(Clone)]
pub enum ChainEntry {
    /// 无条件执行的拦截器
    Interceptor(Arc<dyn MethodInterceptor>),
    /// 调用时根据参数决定是否执行的拦截器, 不执行时直接跳到下一个元素
    Dynamic {
        /// 拦截器
        interceptor: Arc<dyn MethodInterceptor>,
        /// 运行时方法匹配器
        matcher: Arc<dyn MethodMatcher>,
    },
}

impl ChainEntry {
    /// 元素中的拦截器
    pub fn interceptor(&self) -> &Arc<dyn MethodInterceptor> {
        match self {
            Self::Interceptor(interceptor) | Self::Dynamic { interceptor, .. } => interceptor,
        }
    }

    /// 是否为运行时匹配的元素
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }
}

impl fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interceptor(interceptor) => write!(f, "Interceptor({})", interceptor.name()),
            Self::Dynamic { interceptor, .. } => write!(f, "Dynamic({})", interceptor.name()),
        }
    }
}

/// 拦截器链工厂
pub trait AdvisorChainFactory: Send + Sync {
    /// 为目标类上的方法构建拦截器链, 顺序与通知器的注册顺序一致
    ///
    /// `pre_filtered` 为 `true` 时通知器已经按目标类筛选过, 不再检查类过滤器。
    fn interceptors_and_dynamic_advice(
        &self,
        advisors: &[Advisor],
        pre_filtered: bool,
        method: &Method,
        target_class: &BeanClass,
    ) -> AopResult<Vec<ChainEntry>>;
}
