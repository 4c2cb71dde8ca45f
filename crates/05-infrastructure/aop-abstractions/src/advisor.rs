//! 通知器
//!
//! 通知器把一个通知和它的适用规则组合在一起:
//!
//! - [`Advisor::Pointcut`]: 由切点 (类过滤器 + 方法匹配器) 决定是否适用
//! - [`Advisor::Introduction`]: 为匹配的类引入新接口, 对整条链生效
//! - [`Advisor::Generic`]: 无条件适用

use crate::advice::Advice;
use crate::invocation::MethodInterceptor;
use crate::pointcut::{ClassFilter, Pointcut};
use di_abstractions::BeanClass;
use infrastructure_common::AopResult;
use std::fmt;
use std::sync::Arc;

/// 切点通知器
pub trait PointcutAdvisor: Send + Sync {
    /// 切点
    fn pointcut(&self) -> Arc<dyn Pointcut>;

    /// 通知
    fn advice(&self) -> Advice;
}

/// 引入通知器
pub trait IntroductionAdvisor: Send + Sync {
    /// 类过滤器, 引入没有方法匹配器
    fn class_filter(&self) -> Arc<dyn ClassFilter>;

    /// 引入的接口
    fn interfaces(&self) -> Vec<Arc<BeanClass>>;

    /// 通知
    fn advice(&self) -> Advice;

    /// 校验引入的每个类都是接口, 并且由通知实现
    fn validate_interfaces(&self) -> AopResult<()>;
}

/// 通知器
#[derive(Clone)]
pub enum Advisor {
    /// 切点通知器
    Pointcut(Arc<dyn PointcutAdvisor>),
    /// 引入通知器
    Introduction(Arc<dyn IntroductionAdvisor>),
    /// 无条件适用的通知
    Generic(Advice),
}

impl Advisor {
    /// 通知器携带的通知
    pub fn advice(&self) -> Advice {
        match self {
            Self::Pointcut(advisor) => advisor.advice(),
            Self::Introduction(advisor) => advisor.advice(),
            Self::Generic(advice) => advice.clone(),
        }
    }

    /// 是否为引入通知器
    pub fn is_introduction(&self) -> bool {
        matches!(self, Self::Introduction(_))
    }

    /// 通知器种类名称
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Pointcut(_) => "PointcutAdvisor",
            Self::Introduction(_) => "IntroductionAdvisor",
            Self::Generic(_) => "Advisor",
        }
    }
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind_name(), self.advice())
    }
}

/// 通知适配器
///
/// 把某一种通知转换为环绕拦截器。
pub trait AdvisorAdapter: Send + Sync {
    /// 是否支持给定通知
    fn supports_advice(&self, advice: &Advice) -> bool;

    /// 为通知创建拦截器
    fn interceptor(&self, advice: &Advice) -> AopResult<Arc<dyn MethodInterceptor>>;
}

/// 通知适配器注册表
pub trait AdvisorAdapterRegistry: Send + Sync {
    /// 把通知包装成无条件适用的通知器
    fn wrap(&self, advice: Advice) -> AopResult<Advisor>;

    /// 通知器对应的拦截器
    fn interceptors(&self, advisor: &Advisor) -> AopResult<Vec<Arc<dyn MethodInterceptor>>>;

    /// 注册自定义适配器
    fn register_adapter(&self, adapter: Arc<dyn AdvisorAdapter>);
}
