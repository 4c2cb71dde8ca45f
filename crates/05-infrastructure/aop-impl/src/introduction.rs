//! 引入支持
//!
//! [`DelegatingIntroductionInterceptor`] 把引入接口上的方法转发给委托对象,
//! [`DefaultIntroductionAdvisor`] 把它和引入的接口、类过滤器组合成通知器。

use crate::invocation::invoke_target;
use crate::pointcut::TrueClassFilter;
use aop_abstractions::{
    Advice, Advisor, ClassFilter, IntroductionAdvisor,
    IntroductionInterceptor, InvocationResult, Method, MethodInterceptor, MethodInvocation,
    CONTAINER_PROXY,
};
use di_abstractions::BeanClass;
use infrastructure_common::{AopError, AopResult, Object, TypeInfo};
use std::sync::Arc;
use tracing::trace;

/// 委托式引入拦截器
///
/// 默认引入委托类实现的全部接口 (框架标记接口除外)。
/// 引入方法返回委托对象自身时, 改为返回代理对象。
pub struct DelegatingIntroductionInterceptor {
    delegate: Object,
    delegate_class: Arc<BeanClass>,
    interfaces: Vec<Arc<BeanClass>>,
}

impl DelegatingIntroductionInterceptor {
    /// 创建拦截器
    pub fn new(delegate: Object, delegate_class: Arc<BeanClass>) -> Self {
        let interfaces = delegate_class
            .all_interfaces()
            .into_iter()
            .filter(|interface| interface.name() != CONTAINER_PROXY)
            .collect();
        Self {
            delegate,
            delegate_class,
            interfaces,
        }
    }

    /// 不再引入给定接口
    pub fn suppress_interface(mut self, interface_name: &str) -> Self {
        self.interfaces
            .retain(|interface| interface.name() != interface_name);
        self
    }

    /// 引入的接口
    pub fn interfaces(&self) -> Vec<Arc<BeanClass>> {
        self.interfaces.clone()
    }

    fn is_introduced_method(&self, method: &Method) -> bool {
        self.interfaces.iter().any(|interface| {
            interface
                .method_signatures()
                .iter()
                .any(|(name, declaring)| name == method.name() && declaring == method.declaring_class())
        })
    }
}

impl MethodInterceptor for DelegatingIntroductionInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult {
        if !self.is_introduced_method(invocation.method()) {
            return invocation.proceed();
        }
        trace!("引入方法 {} 转发给委托对象", invocation.method());
        let result = invoke_target(
            &self.delegate,
            &self.delegate_class,
            invocation.method().name(),
            invocation.arguments(),
        )?;
        match (result, invocation.proxy()) {
            (Some(value), Some(proxy)) if Arc::ptr_eq(&value, &self.delegate) => Ok(Some(proxy.clone())),
            (result, _) => Ok(result),
        }
    }

    fn name(&self) -> &str {
        "DelegatingIntroductionInterceptor"
    }
}

impl IntroductionInterceptor for DelegatingIntroductionInterceptor {
    fn implements_interface(&self, interface_name: &str) -> bool {
        let target = TypeInfo::named(interface_name);
        self.interfaces
            .iter()
            .any(|interface| interface.is_assignable_to(&target))
    }
}

/// 默认的引入通知器
pub struct DefaultIntroductionAdvisor {
    interceptor: Arc<dyn MethodInterceptor>,
    introduction: Arc<dyn IntroductionInterceptor>,
    interfaces: Vec<Arc<BeanClass>>,
    class_filter: Arc<dyn ClassFilter>,
}

impl DefaultIntroductionAdvisor {
    /// 为引入拦截器创建通知器, 引入给定接口
    pub fn new<I>(interceptor: Arc<I>, interfaces: Vec<Arc<BeanClass>>) -> Self
    where
        I: IntroductionInterceptor + 'static,
    {
        Self {
            interceptor: interceptor.clone(),
            introduction: interceptor,
            interfaces,
            class_filter: Arc::new(TrueClassFilter),
        }
    }

    /// 为委托式引入拦截器创建通知器, 引入它的全部接口
    pub fn for_delegate(interceptor: DelegatingIntroductionInterceptor) -> Self {
        let interfaces = interceptor.interfaces();
        Self::new(Arc::new(interceptor), interfaces)
    }

    /// 限定适用的类
    pub fn with_class_filter(mut self, class_filter: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = class_filter;
        self
    }

    /// 增加引入的接口
    pub fn with_interface(mut self, interface: Arc<BeanClass>) -> Self {
        if !self
            .interfaces
            .iter()
            .any(|existing| existing.name() == interface.name())
        {
            self.interfaces.push(interface);
        }
        self
    }

    /// 转换为 [`Advisor`]
    pub fn into_advisor(self) -> Advisor {
        Advisor::Introduction(Arc::new(self))
    }
}

impl IntroductionAdvisor for DefaultIntroductionAdvisor {
    fn class_filter(&self) -> Arc<dyn ClassFilter> {
        self.class_filter.clone()
    }

    fn interfaces(&self) -> Vec<Arc<BeanClass>> {
        self.interfaces
            .iter()
            .filter(|interface| interface.name() != CONTAINER_PROXY)
            .cloned()
            .collect()
    }

    fn advice(&self) -> Advice {
        Advice::Interceptor(self.interceptor.clone())
    }

    fn validate_interfaces(&self) -> AopResult<()> {
        for interface in &self.interfaces {
            if !interface.is_interface() {
                return Err(AopError::illegal_argument(format!(
                    "{} 不是接口, 不能被引入",
                    interface.name()
                )));
            }
            if !self.introduction.implements_interface(interface.name()) {
                return Err(AopError::illegal_argument(format!(
                    "引入通知没有实现接口 {}",
                    interface.name()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter;

    fn counter_delegate() -> DelegatingIntroductionInterceptor {
        let countable = BeanClass::interface("Countable").method("count").build();
        let resettable = BeanClass::interface("Resettable").method("reset").build();
        let class = BeanClass::builder::<Counter>("Counter")
            .implements(countable)
            .implements(resettable)
            .method("count", |_counter: &Counter, _args| Ok(Some(Arc::new(1usize) as Object)))
            .method("reset", |_counter: &Counter, _args| Ok(None))
            .build();
        DelegatingIntroductionInterceptor::new(Arc::new(Counter) as Object, class)
    }

    #[test]
    fn test_delegate_interfaces_are_introduced() {
        let interceptor = counter_delegate();
        assert!(interceptor.implements_interface("Countable"));
        assert!(interceptor.implements_interface("Resettable"));
        assert!(!interceptor.implements_interface("Closeable"));

        let suppressed = counter_delegate().suppress_interface("Resettable");
        assert!(!suppressed.implements_interface("Resettable"));
        assert_eq!(suppressed.interfaces().len(), 1);
    }

    #[test]
    fn test_validate_rejects_foreign_interface() {
        let closeable = BeanClass::interface("Closeable").method("close").build();
        let advisor = DefaultIntroductionAdvisor::for_delegate(counter_delegate()).with_interface(closeable);
        let error = advisor.validate_interfaces().unwrap_err();
        assert!(matches!(error, AopError::IllegalArgument { .. }));
    }

    #[test]
    fn test_validate_rejects_concrete_class() {
        let advisor = DefaultIntroductionAdvisor::for_delegate(counter_delegate())
            .with_interface(BeanClass::builder::<Counter>("Counter").build());
        assert!(advisor.validate_interfaces().is_err());
    }

    #[test]
    fn test_valid_advisor() {
        let advisor = DefaultIntroductionAdvisor::for_delegate(counter_delegate());
        advisor.validate_interfaces().unwrap();
        assert_eq!(advisor.interfaces().len(), 2);
        assert!(matches!(advisor.advice(), Advice::Interceptor(_)));
    }
}
