//! 沿拦截器链推进的方法调用

use aop_abstractions::{ChainEntry, InvocationResult, Method, MethodInvocation};
use di_abstractions::{BeanClass, DynamicObject};
use infrastructure_common::{Object, Throwable};
use tracing::trace;

/// 在目标对象上调用方法
///
/// 动态对象使用自身携带的类描述, 其他对象使用给定的目标类。
pub fn invoke_target(
    target: &Object,
    target_class: &BeanClass,
    method: &str,
    arguments: &[Object],
) -> InvocationResult {
    match target.downcast_ref::<DynamicObject>() {
        Some(dynamic) => dynamic.class().invoke(target, method, arguments),
        None => target_class.invoke(target, method, arguments),
    }
}

/// 反射式方法调用
///
/// 按下标依次执行链上的元素, 链走完后调用目标方法。
/// 运行时匹配的元素在自己的位置上求值, 不匹配时直接跳过。
pub struct ReflectiveMethodInvocation<'a> {
    proxy: Option<&'a Object>,
    target: Option<&'a Object>,
    target_class: &'a BeanClass,
    method: &'a Method,
    arguments: Vec<Object>,
    chain: &'a [ChainEntry],
    current: usize,
}

impl<'a> ReflectiveMethodInvocation<'a> {
    /// 创建调用
    pub fn new(
        proxy: Option<&'a Object>,
        target: Option<&'a Object>,
        target_class: &'a BeanClass,
        method: &'a Method,
        arguments: Vec<Object>,
        chain: &'a [ChainEntry],
    ) -> Self {
        Self {
            proxy,
            target,
            target_class,
            method,
            arguments,
            chain,
            current: 0,
        }
    }

    /// 目标类
    pub fn target_class(&self) -> &BeanClass {
        self.target_class
    }

    fn invoke_joinpoint(&self) -> InvocationResult {
        let target = self.target.ok_or_else(|| {
            Throwable::unsupported_operation(format!("方法 {} 没有可调用的目标对象", self.method))
        })?;
        trace!("调用目标方法: {}", self.method);
        invoke_target(target, self.target_class, self.method.name(), &self.arguments)
    }
}

impl MethodInvocation for ReflectiveMethodInvocation<'_> {
    fn method(&self) -> &Method {
        self.method
    }

    fn arguments(&self) -> &[Object] {
        &self.arguments
    }

    fn set_arguments(&mut self, arguments: Vec<Object>) {
        self.arguments = arguments;
    }

    fn this(&self) -> Option<&Object> {
        self.target
    }

    fn proxy(&self) -> Option<&Object> {
        self.proxy
    }

    fn proceed(&mut self) -> InvocationResult {
        let chain = self.chain;
        let Some(entry) = chain.get(self.current) else {
            return self.invoke_joinpoint();
        };
        self.current += 1;
        match entry {
            ChainEntry::Interceptor(interceptor) => interceptor.invoke(self),
            ChainEntry::Dynamic {
                interceptor,
                matcher,
            } => {
                if matcher.matches_with_arguments(self.method, self.target_class, &self.arguments) {
                    interceptor.invoke(self)
                } else {
                    trace!(
                        "运行时匹配未通过, 跳过拦截器 {} (方法 {})",
                        interceptor.name(),
                        self.method
                    );
                    self.proceed()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::{
        AfterReturningAdviceInterceptor, MethodBeforeAdviceInterceptor, ThrowsAdviceInterceptor,
    };
    use crate::pointcut::RuntimeMethodMatcher;
    use aop_abstractions::{
        AfterReturningAdvice, MethodBeforeAdvice, MethodInterceptor, ThrowsAdvice,
    };
    use infrastructure_common::ExceptionKind;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct FileStore;

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Around {
        label: &'static str,
        journal: Journal,
    }

    impl MethodInterceptor for Around {
        fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult {
            self.journal.lock().push(format!("{}:before", self.label));
            let result = invocation.proceed();
            self.journal.lock().push(format!("{}:after", self.label));
            result
        }
    }

    struct Recorder(Journal);

    impl MethodBeforeAdvice for Recorder {
        fn before(&self, method: &Method, _arguments: &[Object], _target: Option<&Object>) -> Result<(), Throwable> {
            self.0.lock().push(format!("before {}", method.name()));
            Ok(())
        }
    }

    impl AfterReturningAdvice for Recorder {
        fn after_returning(
            &self,
            return_value: Option<&Object>,
            method: &Method,
            _arguments: &[Object],
            _target: Option<&Object>,
        ) -> Result<(), Throwable> {
            let value = return_value
                .and_then(|value| value.downcast_ref::<String>())
                .cloned()
                .unwrap_or_default();
            self.0.lock().push(format!("returned {} from {}", value, method.name()));
            Ok(())
        }
    }

    fn io_kinds() -> (Arc<ExceptionKind>, Arc<ExceptionKind>) {
        let io = ExceptionKind::new("IOException", &ExceptionKind::exception());
        let not_found = ExceptionKind::new("FileNotFoundException", &io);
        (io, not_found)
    }

    fn file_store_class(not_found: Arc<ExceptionKind>) -> Arc<BeanClass> {
        BeanClass::builder::<FileStore>("FileStore")
            .method("read", |_store: &FileStore, arguments| {
                let name = arguments
                    .first()
                    .and_then(|argument| argument.downcast_ref::<String>())
                    .cloned()
                    .unwrap_or_default();
                Ok(Some(Arc::new(format!("contents of {}", name)) as Object))
            })
            .method("open", move |_store: &FileStore, _arguments| {
                Err(Throwable::new(not_found.clone(), "missing.txt"))
            })
            .build()
    }

    fn invoke(
        class: &BeanClass,
        target: &Object,
        method: &Method,
        arguments: Vec<Object>,
        chain: &[ChainEntry],
    ) -> InvocationResult {
        ReflectiveMethodInvocation::new(None, Some(target), class, method, arguments, chain).proceed()
    }

    #[test]
    fn test_interceptors_nest_in_chain_order() {
        let (_, not_found) = io_kinds();
        let class = file_store_class(not_found);
        let target: Object = Arc::new(FileStore);
        let journal = Journal::default();
        let chain = vec![
            ChainEntry::Interceptor(Arc::new(Around { label: "outer", journal: journal.clone() })),
            ChainEntry::Interceptor(Arc::new(MethodBeforeAdviceInterceptor::new(Arc::new(Recorder(journal.clone()))))),
            ChainEntry::Interceptor(Arc::new(AfterReturningAdviceInterceptor::new(Arc::new(Recorder(journal.clone()))))),
            ChainEntry::Interceptor(Arc::new(Around { label: "inner", journal: journal.clone() })),
        ];

        let method = Method::new("read", "FileStore");
        let result = invoke(&class, &target, &method, vec![Arc::new("a.txt".to_string()) as Object], &chain)
            .unwrap()
            .unwrap();

        assert_eq!(result.downcast_ref::<String>().unwrap(), "contents of a.txt");
        assert_eq!(
            *journal.lock(),
            vec![
                "outer:before",
                "before read",
                "inner:before",
                "inner:after",
                "returned contents of a.txt from read",
                "outer:after",
            ]
        );
    }

    #[test]
    fn test_dynamic_entry_is_skipped_when_arguments_do_not_match() {
        let (_, not_found) = io_kinds();
        let class = file_store_class(not_found);
        let target: Object = Arc::new(FileStore);
        let journal = Journal::default();
        let matcher = RuntimeMethodMatcher::new("read", |_method, arguments| {
            arguments
                .first()
                .and_then(|argument| argument.downcast_ref::<String>())
                .is_some_and(|name| name.ends_with(".secret"))
        });
        let chain = vec![
            ChainEntry::Dynamic {
                interceptor: Arc::new(Around { label: "guard", journal: journal.clone() }),
                matcher: Arc::new(matcher),
            },
            ChainEntry::Interceptor(Arc::new(Around { label: "log", journal: journal.clone() })),
        ];
        let method = Method::new("read", "FileStore");

        invoke(&class, &target, &method, vec![Arc::new("a.txt".to_string()) as Object], &chain).unwrap();
        assert_eq!(*journal.lock(), vec!["log:before", "log:after"]);

        journal.lock().clear();
        invoke(&class, &target, &method, vec![Arc::new("keys.secret".to_string()) as Object], &chain).unwrap();
        assert_eq!(
            *journal.lock(),
            vec!["guard:before", "log:before", "log:after", "guard:after"]
        );
    }

    #[test]
    fn test_throws_handler_matches_superclass_and_rethrows() {
        let (_, not_found) = io_kinds();
        let class = file_store_class(not_found);
        let target: Object = Arc::new(FileStore);
        let handled = Journal::default();
        let handled_clone = handled.clone();
        let advice = ThrowsAdvice::new("ioAudit")
            .on("IOException", move |context| {
                handled_clone.lock().push(format!(
                    "{} in {}",
                    context.exception.kind().name(),
                    context.method.name()
                ));
                Ok(())
            })
            .on("Throwable", |_context| Ok(()));
        let interceptor = ThrowsAdviceInterceptor::new(Arc::new(advice)).unwrap();
        let chain = vec![ChainEntry::Interceptor(Arc::new(interceptor))];

        let error = invoke(&class, &target, &Method::new("open", "FileStore"), Vec::new(), &chain).unwrap_err();
        assert!(error.is_a("FileNotFoundException"));
        assert_eq!(error.message(), "missing.txt");
        assert_eq!(*handled.lock(), vec!["FileNotFoundException in open"]);
    }

    #[test]
    fn test_failing_handler_does_not_replace_original_exception() {
        let (_, not_found) = io_kinds();
        let class = file_store_class(not_found);
        let target: Object = Arc::new(FileStore);
        let advice = ThrowsAdvice::new("broken")
            .on("IOException", |_context| Err(Throwable::illegal_state("处理方法失败")));
        let chain = vec![ChainEntry::Interceptor(Arc::new(
            ThrowsAdviceInterceptor::new(Arc::new(advice)).unwrap(),
        ))];

        let error = invoke(&class, &target, &Method::new("open", "FileStore"), Vec::new(), &chain).unwrap_err();
        assert!(error.is_a("FileNotFoundException"));
        assert!(!error.is_a("IllegalStateException"));
    }

    #[test]
    fn test_most_specific_handler_wins() {
        let (io, not_found) = io_kinds();
        let advice = ThrowsAdvice::new("layered")
            .on("IOException", |_context| Ok(()))
            .on("FileNotFoundException", |_context| Ok(()))
            .on("Exception", |_context| Ok(()));
        let interceptor = ThrowsAdviceInterceptor::new(Arc::new(advice)).unwrap();

        let specific = Throwable::new(not_found, "a");
        assert_eq!(interceptor.exception_handler(&specific).map(|(kind, _)| kind), Some("FileNotFoundException"));
        let general = Throwable::new(io, "b");
        assert_eq!(interceptor.exception_handler(&general).map(|(kind, _)| kind), Some("IOException"));
        let unrelated = Throwable::new(ExceptionKind::throwable(), "c");
        assert!(interceptor.exception_handler(&unrelated).is_none());
    }

    #[test]
    fn test_missing_target_is_unsupported() {
        let class = BeanClass::interface("Reader").method("read").build();
        let method = Method::new("read", "Reader");
        let error = ReflectiveMethodInvocation::new(None, None, &class, &method, Vec::new(), &[])
            .proceed()
            .unwrap_err();
        assert!(error.is_a("UnsupportedOperationException"));
    }
}
