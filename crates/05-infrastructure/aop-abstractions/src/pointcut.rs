//! 切点: 类过滤器与方法匹配器

use crate::invocation::Method;
use di_abstractions::BeanClass;
use infrastructure_common::Object;
use std::sync::Arc;

/// 类过滤器
pub trait ClassFilter: Send + Sync {
    /// 通知是否适用于目标类
    fn matches(&self, class: &BeanClass) -> bool;
}

/// 方法匹配器
///
/// 静态匹配只看方法和目标类, 在构建拦截器链时求值。
/// [`MethodMatcher::is_runtime`] 为 `true` 的匹配器在静态匹配通过后,
/// 每次调用还要根据实际参数再求值一次。
pub trait MethodMatcher: Send + Sync {
    /// 静态匹配
    fn matches(&self, method: &Method, target_class: &BeanClass) -> bool;

    /// 是否需要在调用时根据参数求值
    fn is_runtime(&self) -> bool {
        false
    }

    /// 运行时匹配, 仅当 [`MethodMatcher::is_runtime`] 为 `true` 时调用
    fn matches_with_arguments(&self, method: &Method, target_class: &BeanClass, _arguments: &[Object]) -> bool {
        self.matches(method, target_class)
    }

    /// 考虑引入的静态匹配
    ///
    /// 目标类上存在匹配的引入时, 引入的接口可能让原本不适用的方法变得可匹配。
    /// 默认忽略引入。
    fn matches_with_introductions(&self, method: &Method, target_class: &BeanClass, _has_introductions: bool) -> bool {
        self.matches(method, target_class)
    }
}

/// 切点
pub trait Pointcut: Send + Sync {
    /// 类过滤器
    fn class_filter(&self) -> Arc<dyn ClassFilter>;

    /// 方法匹配器
    fn method_matcher(&self) -> Arc<dyn MethodMatcher>;
}

impl<F> ClassFilter for F
where
    F: Fn(&BeanClass) -> bool + Send + Sync,
{
    fn matches(&self, class: &BeanClass) -> bool {
        self(class)
    }
}
