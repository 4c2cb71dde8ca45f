//! 通知器适用性判断

use crate::chain::has_matching_introductions;
use aop_abstractions::{Advisor, Method, Pointcut};
use di_abstractions::BeanClass;
use std::collections::HashSet;

/// 类上可被通知的方法: 类自身的方法加上它实现的全部接口的方法
pub fn candidate_methods(target_class: &BeanClass) -> Vec<Method> {
    let mut seen = HashSet::new();
    let mut methods = Vec::new();
    let interface_methods = target_class
        .all_interfaces()
        .into_iter()
        .flat_map(|interface| interface.method_signatures());
    for (name, declaring_class) in target_class.method_signatures().into_iter().chain(interface_methods) {
        let method = Method::new(name, declaring_class);
        if seen.insert(method.clone()) {
            methods.push(method);
        }
    }
    methods
}

/// 切点是否可能适用于类: 类过滤器通过, 并且至少有一个方法匹配
pub fn can_apply_pointcut(pointcut: &dyn Pointcut, target_class: &BeanClass, has_introductions: bool) -> bool {
    if !pointcut.class_filter().matches(target_class) {
        return false;
    }
    let matcher = pointcut.method_matcher();
    candidate_methods(target_class)
        .iter()
        .any(|method| matcher.matches_with_introductions(method, target_class, has_introductions))
}

/// 通知器是否可能适用于类
pub fn can_apply(advisor: &Advisor, target_class: &BeanClass, has_introductions: bool) -> bool {
    match advisor {
        Advisor::Introduction(introduction) => introduction.class_filter().matches(target_class),
        Advisor::Pointcut(pointcut_advisor) => {
            can_apply_pointcut(pointcut_advisor.pointcut().as_ref(), target_class, has_introductions)
        }
        Advisor::Generic(_) => true,
    }
}

/// 筛选出可能适用于类的通知器, 保持原有顺序
///
/// 先确定匹配的引入通知器, 再带着"存在引入"的信息判断其余通知器。
pub fn find_advisors_that_can_apply(candidates: &[Advisor], target_class: &BeanClass) -> Vec<Advisor> {
    let has_introductions = has_matching_introductions(candidates, target_class);
    candidates
        .iter()
        .filter(|advisor| can_apply(advisor, target_class, has_introductions))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::DefaultPointcutAdvisor;
    use crate::introduction::{DefaultIntroductionAdvisor, DelegatingIntroductionInterceptor};
    use crate::pointcut::{ComposablePointcut, NamePatternClassFilter, NameMatchMethodMatcher};
    use aop_abstractions::{Advice, InvocationResult, MethodInvocation};
    use infrastructure_common::Object;
    use std::sync::Arc;

    #[derive(Default)]
    struct Ledger;

    #[derive(Default)]
    struct Audit;

    fn passthrough(invocation: &mut dyn MethodInvocation) -> InvocationResult {
        invocation.proceed()
    }

    fn ledger_class() -> Arc<BeanClass> {
        let auditable = BeanClass::interface("Auditable").method("audit").build();
        BeanClass::builder::<Ledger>("Ledger")
            .implements(auditable)
            .method("post", |_ledger: &Ledger, _args| Ok(None))
            .method("audit", |_ledger: &Ledger, _args| Ok(None))
            .build()
    }

    #[test]
    fn test_candidate_methods_include_interface_methods_once() {
        let methods = candidate_methods(&ledger_class());
        let names: Vec<String> = methods.iter().map(ToString::to_string).collect();
        assert!(names.contains(&"Ledger.post".to_string()));
        assert!(names.contains(&"Ledger.audit".to_string()));
        assert!(names.contains(&"Auditable.audit".to_string()));
        assert_eq!(methods.len(), 3);
    }

    #[test]
    fn test_pointcut_advisor_requires_matching_method() {
        let class = ledger_class();
        let matching = DefaultPointcutAdvisor::for_methods(["post"], Advice::interceptor(passthrough)).into_advisor();
        let missing = DefaultPointcutAdvisor::for_methods(["transfer*"], Advice::interceptor(passthrough)).into_advisor();
        assert!(can_apply(&matching, &class, false));
        assert!(!can_apply(&missing, &class, false));

        let other_class = ComposablePointcut::new(
            Arc::new(NamePatternClassFilter::new("Invoice*")),
            Arc::new(NameMatchMethodMatcher::new(["post"])),
        );
        let filtered = DefaultPointcutAdvisor::new(Arc::new(other_class), Advice::interceptor(passthrough)).into_advisor();
        assert!(!can_apply(&filtered, &class, false));
    }

    #[test]
    fn test_find_advisors_keeps_order() {
        let class = ledger_class();
        let stamped = BeanClass::interface("Stamped").method("stamp").build();
        let audit_class = BeanClass::builder::<Audit>("Audit").implements(stamped).build();
        let introduction = DefaultIntroductionAdvisor::for_delegate(DelegatingIntroductionInterceptor::new(
            Arc::new(Audit) as Object,
            audit_class,
        ))
        .with_class_filter(Arc::new(NamePatternClassFilter::new("Led*")))
        .into_advisor();

        let candidates = vec![
            DefaultPointcutAdvisor::for_methods(["nothing"], Advice::interceptor(passthrough)).into_advisor(),
            Advisor::Generic(Advice::interceptor(passthrough)),
            introduction,
            DefaultPointcutAdvisor::always(Advice::interceptor(passthrough)).into_advisor(),
        ];
        let applicable = find_advisors_that_can_apply(&candidates, &class);
        let kinds: Vec<&str> = applicable.iter().map(Advisor::kind_name).collect();
        assert_eq!(kinds, vec!["Advisor", "IntroductionAdvisor", "PointcutAdvisor"]);
    }
}
