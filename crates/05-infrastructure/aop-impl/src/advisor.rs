//! 切点通知器

use crate::pointcut::{NameMatchMethodPointcut, TruePointcut};
use aop_abstractions::{Advice, Advisor, Pointcut, PointcutAdvisor};
use std::sync::Arc;

/// 由切点和通知组成的通知器
#[derive(Clone)]
pub struct DefaultPointcutAdvisor {
    pointcut: Arc<dyn Pointcut>,
    advice: Advice,
}

impl DefaultPointcutAdvisor {
    /// 创建通知器
    pub fn new(pointcut: Arc<dyn Pointcut>, advice: Advice) -> Self {
        Self { pointcut, advice }
    }

    /// 适用于所有方法的通知器
    pub fn always(advice: Advice) -> Self {
        Self::new(Arc::new(TruePointcut), advice)
    }

    /// 按方法名模式适用的通知器
    pub fn for_methods<I, S>(patterns: I, advice: Advice) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Arc::new(NameMatchMethodPointcut::new(patterns)), advice)
    }

    /// 转换为 [`Advisor`]
    pub fn into_advisor(self) -> Advisor {
        Advisor::Pointcut(Arc::new(self))
    }
}

impl PointcutAdvisor for DefaultPointcutAdvisor {
    fn pointcut(&self) -> Arc<dyn Pointcut> {
        self.pointcut.clone()
    }

    fn advice(&self) -> Advice {
        self.advice.clone()
    }
}
