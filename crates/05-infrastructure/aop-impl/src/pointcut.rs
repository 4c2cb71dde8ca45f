//! 切点实现
//!
//! - [`TruePointcut`]: 匹配所有类的所有方法
//! - [`NameMatchMethodPointcut`]: 按方法名模式 (`*` 通配) 匹配
//! - [`RuntimeMethodMatcher`]: 方法名静态匹配后再按调用参数求值
//! - [`TypeClassFilter`] / [`NamePatternClassFilter`]: 按类型或类名过滤
//! - [`ComposablePointcut`]: 类过滤器与方法匹配器的并集、交集组合

use aop_abstractions::{ClassFilter, Method, MethodMatcher, Pointcut};
use di_abstractions::BeanClass;
use infrastructure_common::{Object, TypeInfo};
use std::sync::Arc;

/// 简单通配匹配, `*` 匹配任意长度的字符串
pub fn simple_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == text;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let (Some(first), Some(last)) = (parts.first(), parts.last()) else {
        return false;
    };
    if text.len() < first.len() + last.len() || !text.starts_with(first) || !text.ends_with(last) {
        return false;
    }
    let mut middle = &text[first.len()..text.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match middle.find(part) {
            Some(position) => middle = &middle[position + part.len()..],
            None => return false,
        }
    }
    true
}

/// 匹配所有类
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueClassFilter;

impl ClassFilter for TrueClassFilter {
    fn matches(&self, _class: &BeanClass) -> bool {
        true
    }
}

/// 匹配所有方法
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueMethodMatcher;

impl MethodMatcher for TrueMethodMatcher {
    fn matches(&self, _method: &Method, _target_class: &BeanClass) -> bool {
        true
    }
}

/// 匹配所有类的所有方法
#[derive(Debug, Clone, Copy, Default)]
pub struct TruePointcut;

impl Pointcut for TruePointcut {
    fn class_filter(&self) -> Arc<dyn ClassFilter> {
        Arc::new(TrueClassFilter)
    }

    fn method_matcher(&self) -> Arc<dyn MethodMatcher> {
        Arc::new(TrueMethodMatcher)
    }
}

/// 按方法名模式匹配
#[derive(Debug, Clone, Default)]
pub struct NameMatchMethodMatcher {
    patterns: Vec<String>,
}

impl NameMatchMethodMatcher {
    /// 创建匹配器
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// 方法名模式
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl MethodMatcher for NameMatchMethodMatcher {
    fn matches(&self, method: &Method, _target_class: &BeanClass) -> bool {
        self.patterns
            .iter()
            .any(|pattern| simple_match(pattern, method.name()))
    }
}

/// 按方法名模式匹配的切点, 适用于所有类
#[derive(Debug, Clone, Default)]
pub struct NameMatchMethodPointcut {
    matcher: Arc<NameMatchMethodMatcher>,
}

impl NameMatchMethodPointcut {
    /// 创建切点
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            matcher: Arc::new(NameMatchMethodMatcher::new(patterns)),
        }
    }
}

impl Pointcut for NameMatchMethodPointcut {
    fn class_filter(&self) -> Arc<dyn ClassFilter> {
        Arc::new(TrueClassFilter)
    }

    fn method_matcher(&self) -> Arc<dyn MethodMatcher> {
        self.matcher.clone()
    }
}

type ArgumentPredicate = Arc<dyn Fn(&Method, &[Object]) -> bool + Send + Sync>;

/// 运行时方法匹配器
///
/// 方法名匹配模式后, 每次调用再用实际参数求值谓词。
#[derive(Clone)]
pub struct RuntimeMethodMatcher {
    names: NameMatchMethodMatcher,
    predicate: ArgumentPredicate,
}

impl RuntimeMethodMatcher {
    /// 创建匹配器
    pub fn new<F>(pattern: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Method, &[Object]) -> bool + Send + Sync + 'static,
    {
        let pattern: String = pattern.into();
        Self {
            names: NameMatchMethodMatcher::new([pattern]),
            predicate: Arc::new(predicate),
        }
    }
}

impl MethodMatcher for RuntimeMethodMatcher {
    fn matches(&self, method: &Method, target_class: &BeanClass) -> bool {
        self.names.matches(method, target_class)
    }

    fn is_runtime(&self) -> bool {
        true
    }

    fn matches_with_arguments(&self, method: &Method, _target_class: &BeanClass, arguments: &[Object]) -> bool {
        (self.predicate)(method, arguments)
    }
}

/// 按类型过滤: 目标类可以赋值给给定类型时匹配
#[derive(Debug, Clone)]
pub struct TypeClassFilter {
    target: TypeInfo,
}

impl TypeClassFilter {
    /// 创建过滤器
    pub fn new(target: TypeInfo) -> Self {
        Self { target }
    }
}

impl ClassFilter for TypeClassFilter {
    fn matches(&self, class: &BeanClass) -> bool {
        class.is_assignable_to(&self.target)
    }
}

/// 按类名模式过滤
#[derive(Debug, Clone)]
pub struct NamePatternClassFilter {
    pattern: String,
}

impl NamePatternClassFilter {
    /// 创建过滤器
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl ClassFilter for NamePatternClassFilter {
    fn matches(&self, class: &BeanClass) -> bool {
        simple_match(&self.pattern, class.name())
    }
}

struct UnionClassFilter(Arc<dyn ClassFilter>, Arc<dyn ClassFilter>);

impl ClassFilter for UnionClassFilter {
    fn matches(&self, class: &BeanClass) -> bool {
        self.0.matches(class) || self.1.matches(class)
    }
}

struct IntersectionClassFilter(Arc<dyn ClassFilter>, Arc<dyn ClassFilter>);

impl ClassFilter for IntersectionClassFilter {
    fn matches(&self, class: &BeanClass) -> bool {
        self.0.matches(class) && self.1.matches(class)
    }
}

/// 并集匹配器, 每一侧可以带上自己的类过滤器
struct UnionMethodMatcher {
    first: Arc<dyn MethodMatcher>,
    first_filter: Option<Arc<dyn ClassFilter>>,
    second: Arc<dyn MethodMatcher>,
    second_filter: Option<Arc<dyn ClassFilter>>,
}

impl UnionMethodMatcher {
    fn side_applies(filter: &Option<Arc<dyn ClassFilter>>, class: &BeanClass) -> bool {
        filter.as_ref().map_or(true, |filter| filter.matches(class))
    }
}

impl MethodMatcher for UnionMethodMatcher {
    fn matches(&self, method: &Method, target_class: &BeanClass) -> bool {
        (Self::side_applies(&self.first_filter, target_class) && self.first.matches(method, target_class))
            || (Self::side_applies(&self.second_filter, target_class)
                && self.second.matches(method, target_class))
    }

    fn is_runtime(&self) -> bool {
        self.first.is_runtime() || self.second.is_runtime()
    }

    fn matches_with_arguments(&self, method: &Method, target_class: &BeanClass, arguments: &[Object]) -> bool {
        self.first.matches_with_arguments(method, target_class, arguments)
            || self.second.matches_with_arguments(method, target_class, arguments)
    }

    fn matches_with_introductions(&self, method: &Method, target_class: &BeanClass, has_introductions: bool) -> bool {
        (Self::side_applies(&self.first_filter, target_class)
            && self
                .first
                .matches_with_introductions(method, target_class, has_introductions))
            || (Self::side_applies(&self.second_filter, target_class)
                && self
                    .second
                    .matches_with_introductions(method, target_class, has_introductions))
    }
}

struct IntersectionMethodMatcher(Arc<dyn MethodMatcher>, Arc<dyn MethodMatcher>);

impl MethodMatcher for IntersectionMethodMatcher {
    fn matches(&self, method: &Method, target_class: &BeanClass) -> bool {
        self.0.matches(method, target_class) && self.1.matches(method, target_class)
    }

    fn is_runtime(&self) -> bool {
        self.0.is_runtime() || self.1.is_runtime()
    }

    fn matches_with_arguments(&self, method: &Method, target_class: &BeanClass, arguments: &[Object]) -> bool {
        self.0.matches_with_arguments(method, target_class, arguments)
            && self.1.matches_with_arguments(method, target_class, arguments)
    }

    fn matches_with_introductions(&self, method: &Method, target_class: &BeanClass, has_introductions: bool) -> bool {
        self.0
            .matches_with_introductions(method, target_class, has_introductions)
            && self
                .1
                .matches_with_introductions(method, target_class, has_introductions)
    }
}

/// 可组合的切点
#[derive(Clone)]
pub struct ComposablePointcut {
    class_filter: Arc<dyn ClassFilter>,
    method_matcher: Arc<dyn MethodMatcher>,
}

impl ComposablePointcut {
    /// 由类过滤器和方法匹配器创建
    pub fn new(class_filter: Arc<dyn ClassFilter>, method_matcher: Arc<dyn MethodMatcher>) -> Self {
        Self {
            class_filter,
            method_matcher,
        }
    }

    /// 只限定类的切点
    pub fn for_class_filter(class_filter: Arc<dyn ClassFilter>) -> Self {
        Self::new(class_filter, Arc::new(TrueMethodMatcher))
    }

    /// 只限定方法的切点
    pub fn for_method_matcher(method_matcher: Arc<dyn MethodMatcher>) -> Self {
        Self::new(Arc::new(TrueClassFilter), method_matcher)
    }

    /// 类过滤器取并集
    pub fn union_class_filter(self, other: Arc<dyn ClassFilter>) -> Self {
        Self {
            class_filter: Arc::new(UnionClassFilter(self.class_filter, other)),
            method_matcher: self.method_matcher,
        }
    }

    /// 类过滤器取交集
    pub fn intersection_class_filter(self, other: Arc<dyn ClassFilter>) -> Self {
        Self {
            class_filter: Arc::new(IntersectionClassFilter(self.class_filter, other)),
            method_matcher: self.method_matcher,
        }
    }

    /// 方法匹配器取并集
    pub fn union_method_matcher(self, other: Arc<dyn MethodMatcher>) -> Self {
        Self {
            method_matcher: Arc::new(UnionMethodMatcher {
                first: self.method_matcher,
                first_filter: None,
                second: other,
                second_filter: None,
            }),
            class_filter: self.class_filter,
        }
    }

    /// 方法匹配器取交集
    pub fn intersection_method_matcher(self, other: Arc<dyn MethodMatcher>) -> Self {
        Self {
            method_matcher: Arc::new(IntersectionMethodMatcher(self.method_matcher, other)),
            class_filter: self.class_filter,
        }
    }

    /// 与另一个切点取并集
    ///
    /// 每一侧的方法匹配器只在该侧的类过滤器匹配时生效。
    pub fn union(self, other: &dyn Pointcut) -> Self {
        let other_filter = other.class_filter();
        Self {
            method_matcher: Arc::new(UnionMethodMatcher {
                first: self.method_matcher,
                first_filter: Some(self.class_filter.clone()),
                second: other.method_matcher(),
                second_filter: Some(other_filter.clone()),
            }),
            class_filter: Arc::new(UnionClassFilter(self.class_filter, other_filter)),
        }
    }

    /// 与另一个切点取交集
    pub fn intersection(self, other: &dyn Pointcut) -> Self {
        self.intersection_class_filter(other.class_filter())
            .intersection_method_matcher(other.method_matcher())
    }
}

impl Pointcut for ComposablePointcut {
    fn class_filter(&self) -> Arc<dyn ClassFilter> {
        self.class_filter.clone()
    }

    fn method_matcher(&self) -> Arc<dyn MethodMatcher> {
        self.method_matcher.clone()
    }
}
