//! 组件容器、AOP 与应用上下文的跨 crate 集成测试

use aop_abstractions::{
    Advice, AfterReturningAdvice, InvocationResult, Method, MethodBeforeAdvice, MethodInvocation,
    ProxyKind, ThrowsAdvice,
};
use aop_impl::{
    advised_of, is_aop_proxy, proxy_kind_of, target_of, AutoProxyCreator, DefaultIntroductionAdvisor,
    DefaultPointcutAdvisor, DelegatingIntroductionInterceptor, ProxyFactory,
};
use di_abstractions::{
    class_of, invoke_dynamic, BeanClass, BeanDefinition, BeanDefinitionHolder, BeanDefinitionRegistry,
    BeanFactory, ClassRegistry, ConfigurableBeanFactory,
};
use di_impl::{BeanFactoryBuilder, DefaultBeanFactory, ThreadScope, SCOPE_THREAD};
use infrastructure_common::{ExceptionKind, Object, Throwable};
use infrastructure_composition::{ContextBuilder, DefinitionDocument};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Default)]
struct PaymentService {
    limit: i64,
}

#[derive(Debug, Default)]
struct Inventory {
    reserved: Mutex<usize>,
}

#[derive(Debug, Default)]
struct AuditTrail;

fn declined_kind() -> Arc<ExceptionKind> {
    ExceptionKind::new("PaymentDeclinedException", &ExceptionKind::illegal_argument())
}

fn amount(arguments: &[Object]) -> Result<i64, Throwable> {
    arguments
        .first()
        .and_then(|argument| argument.downcast_ref::<i64>())
        .copied()
        .ok_or_else(|| Throwable::illegal_argument("缺少金额参数"))
}

fn classes() -> Arc<ClassRegistry> {
    let classes = Arc::new(ClassRegistry::new());
    let payments = BeanClass::interface("Payments").method("charge").build();
    classes.register(
        BeanClass::builder::<PaymentService>("PaymentService")
            .implements(payments)
            .default_constructor()
            .property("limit", |service: &mut PaymentService, limit: i64| service.limit = limit)
            .method("charge", |service: &PaymentService, arguments| {
                let amount = amount(arguments)?;
                if amount < 0 {
                    return Err(Throwable::illegal_state(format!("金额不能为负: {}", amount)));
                }
                if amount > service.limit {
                    return Err(Throwable::new(declined_kind(), format!("超出限额: {}", amount)));
                }
                Ok(Some(Arc::new(format!("charged {}", amount)) as Object))
            })
            .method("refund", |_service: &PaymentService, _arguments| Ok(None))
            .build(),
    );
    classes.register(
        BeanClass::builder::<Inventory>("Inventory")
            .default_constructor()
            .method("reserve", |inventory: &Inventory, _arguments| {
                let mut reserved = inventory.reserved.lock();
                *reserved += 1;
                Ok(Some(Arc::new(*reserved) as Object))
            })
            .build(),
    );
    classes
}

fn factory_with(classes: Arc<ClassRegistry>, creator: Option<Arc<AutoProxyCreator>>) -> Arc<DefaultBeanFactory> {
    let factory = BeanFactoryBuilder::new().with_class_loader(classes).build();
    if let Some(creator) = creator {
        factory.add_bean_post_processor(creator);
    }
    factory
        .register_bean_definition(
            "payments",
            BeanDefinition::for_class_name("PaymentService")
                .with_property("limit", di_abstractions::DefinitionValue::literal("100")),
        )
        .unwrap();
    factory
        .register_bean_definition("inventory", BeanDefinition::for_class_name("Inventory"))
        .unwrap();
    factory
}

fn text(result: Option<Object>) -> String {
    result
        .and_then(|value| value.downcast_ref::<String>().cloned())
        .unwrap_or_default()
}

struct RecordBefore(Journal);

impl MethodBeforeAdvice for RecordBefore {
    fn before(&self, method: &Method, _arguments: &[Object], _target: Option<&Object>) -> Result<(), Throwable> {
        self.0.lock().push(format!("before {}", method.name()));
        Ok(())
    }
}

struct RecordAfter(Journal);

impl AfterReturningAdvice for RecordAfter {
    fn after_returning(
        &self,
        return_value: Option<&Object>,
        method: &Method,
        _arguments: &[Object],
        _target: Option<&Object>,
    ) -> Result<(), Throwable> {
        let value = return_value
            .and_then(|value| value.downcast_ref::<String>().cloned())
            .unwrap_or_default();
        self.0.lock().push(format!("after {} -> {}", method.name(), value));
        Ok(())
    }
}

#[test]
fn test_advice_kinds_run_in_chain_order_around_container_bean() {
    let classes = classes();
    let factory = factory_with(classes.clone(), None);
    let target = factory.get_bean("payments").unwrap();
    let target_class = class_of(&target, classes.as_ref()).unwrap();

    let journal = Journal::default();
    let around = journal.clone();
    let proxy_factory = ProxyFactory::for_target(target.clone(), target_class).unwrap();
    proxy_factory
        .add_advice(Advice::interceptor(move |invocation: &mut dyn MethodInvocation| -> InvocationResult {
            around.lock().push("around in".to_string());
            let result = invocation.proceed();
            around.lock().push("around out".to_string());
            result
        }))
        .unwrap();
    proxy_factory.add_advice(Advice::before(RecordBefore(journal.clone()))).unwrap();
    proxy_factory.add_advice(Advice::after_returning(RecordAfter(journal.clone()))).unwrap();

    let proxy = proxy_factory.get_proxy().unwrap();
    assert_eq!(proxy_kind_of(&proxy), Some(ProxyKind::Interface));
    assert!(Arc::ptr_eq(&target_of(&proxy).unwrap(), &target));

    let charged = invoke_dynamic(&proxy, "charge", &[Arc::new(40i64) as Object]).unwrap();
    assert_eq!(text(charged), "charged 40");
    assert_eq!(
        *journal.lock(),
        vec![
            "around in".to_string(),
            "before charge".to_string(),
            "after charge -> charged 40".to_string(),
            "around out".to_string(),
        ]
    );

    let error = invoke_dynamic(&proxy, "refund", &[]).unwrap_err();
    assert!(error.is_a("UnsupportedOperationException"));
}

#[test]
fn test_throws_advice_uses_closest_handler_and_rethrows() {
    let classes = classes();
    let handled = Journal::default();
    let on_argument = handled.clone();
    let on_runtime = handled.clone();
    let throws = ThrowsAdvice::new("payment-audit")
        .on("IllegalArgumentException", move |context| {
            on_argument
                .lock()
                .push(format!("argument {}: {}", context.method.name(), context.exception.message()));
            Ok(())
        })
        .on("RuntimeException", move |context| {
            on_runtime.lock().push(format!("runtime {}", context.exception.kind()));
            Err(Throwable::illegal_state("审计存储不可用"))
        });
    let creator = Arc::new(
        AutoProxyCreator::new(classes.clone())
            .with_advisor(DefaultPointcutAdvisor::for_methods(["charge"], Advice::throws(throws)).into_advisor()),
    );
    let factory = factory_with(classes, Some(creator));

    let payments = factory.get_bean("payments").unwrap();
    assert!(is_aop_proxy(&payments));

    let declined = invoke_dynamic(&payments, "charge", &[Arc::new(500i64) as Object]).unwrap_err();
    assert!(declined.is_a("PaymentDeclinedException"));
    assert!(declined.is_a("IllegalArgumentException"));
    assert_eq!(declined.message(), "超出限额: 500");

    let negative = invoke_dynamic(&payments, "charge", &[Arc::new(-1i64) as Object]).unwrap_err();
    assert!(negative.is_a("IllegalStateException"));
    assert_eq!(negative.message(), "金额不能为负: -1");

    assert_eq!(text(invoke_dynamic(&payments, "charge", &[Arc::new(5i64) as Object]).unwrap()), "charged 5");
    assert_eq!(
        *handled.lock(),
        vec![
            "argument charge: 超出限额: 500".to_string(),
            "runtime IllegalStateException".to_string(),
        ]
    );
}

#[test]
fn test_throws_advice_without_handlers_fails_at_invocation() {
    let classes = classes();
    let target = Arc::new(PaymentService { limit: 1 }) as Object;
    let target_class = class_of(&target, classes.as_ref()).unwrap();
    let proxy_factory = ProxyFactory::for_target(target, target_class).unwrap();
    proxy_factory
        .add_advice(Advice::throws(ThrowsAdvice::new("empty")))
        .unwrap();

    let proxy = proxy_factory.get_proxy().unwrap();
    let error = invoke_dynamic(&proxy, "charge", &[Arc::new(0i64) as Object]).unwrap_err();
    assert!(error.is_a("IllegalStateException"));
    assert!(error.message().contains("empty"));
}

#[test]
fn test_introduction_through_auto_proxy() {
    let classes = classes();
    let auditable = BeanClass::interface("Auditable").method("trail").build();
    let trail_class = BeanClass::builder::<AuditTrail>("AuditTrail")
        .implements(auditable)
        .method("trail", |_trail: &AuditTrail, _arguments| {
            Ok(Some(Arc::new("已审计".to_string()) as Object))
        })
        .build();
    let introduction = DefaultIntroductionAdvisor::for_delegate(DelegatingIntroductionInterceptor::new(
        Arc::new(AuditTrail) as Object,
        trail_class,
    ));
    let creator = Arc::new(AutoProxyCreator::new(classes.clone()).with_advisor(introduction.into_advisor()));
    let factory = factory_with(classes, Some(creator.clone()));

    let inventory = factory.get_bean("inventory").unwrap();
    assert!(is_aop_proxy(&inventory));
    assert_eq!(proxy_kind_of(&inventory), Some(ProxyKind::Interface));
    assert_eq!(text(invoke_dynamic(&inventory, "trail", &[]).unwrap()), "已审计");
    assert!(advised_of(&inventory).unwrap().is_interface_proxied("Auditable"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_share_one_proxied_singleton() {
    let classes = classes();
    let calls = Journal::default();
    let recorder = calls.clone();
    let advice = move |invocation: &mut dyn MethodInvocation| -> InvocationResult {
        recorder.lock().push(invocation.method().name().to_string());
        invocation.proceed()
    };
    let creator = Arc::new(
        AutoProxyCreator::new(classes.clone())
            .with_advisor(DefaultPointcutAdvisor::for_methods(["reserve"], Advice::interceptor(advice)).into_advisor()),
    );
    let factory = factory_with(classes, Some(creator));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let factory = factory.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let inventory = factory.get_bean("inventory").unwrap();
            invoke_dynamic(&inventory, "reserve", &[]).unwrap();
            inventory
        }));
    }

    let mut proxies = Vec::new();
    for handle in handles {
        proxies.push(handle.await.unwrap());
    }
    assert!(proxies.iter().all(|proxy| Arc::ptr_eq(proxy, &proxies[0])));
    assert_eq!(calls.lock().len(), 16);

    let target = target_of(&proxies[0]).unwrap();
    assert_eq!(*target.downcast_ref::<Inventory>().unwrap().reserved.lock(), 16);
}

#[test]
fn test_context_applies_class_proxy_setting_from_aop_section() -> anyhow::Result<()> {
    let document = DefinitionDocument::from_json_str(
        &json!({
            "beans": [
                { "name": "payments", "class": "PaymentService", "aliases": ["billing"],
                  "properties": { "limit": "${payments.limit:10}" } }
            ]
        })
        .to_string(),
    )?;
    let advice = |invocation: &mut dyn MethodInvocation| -> InvocationResult { invocation.proceed() };

    let context = ContextBuilder::new()
        .with_env_prefix(None)
        .with_property("aop.proxy_target_class", "true")
        .with_property("payments.limit", "250")
        .with_class_loader(classes())
        .add_document(document)
        .add_advisor(DefaultPointcutAdvisor::for_methods(["charge"], Advice::interceptor(advice)).into_advisor())
        .build()?;

    let payments = context.get_bean("billing")?;
    assert_eq!(proxy_kind_of(&payments), Some(ProxyKind::Class));
    assert_eq!(
        text(invoke_dynamic(&payments, "charge", &[Arc::new(200i64) as Object])?),
        "charged 200"
    );
    assert!(invoke_dynamic(&payments, "refund", &[])?.is_none());
    let target = target_of(&payments).ok_or_else(|| anyhow::anyhow!("代理缺少目标对象"))?;
    assert_eq!(target.downcast_ref::<PaymentService>().map(|service| service.limit), Some(250));
    context.close()?;
    Ok(())
}

#[test]
fn test_context_with_thread_scope_and_prototypes() -> anyhow::Result<()> {
    let context = ContextBuilder::new()
        .with_env_prefix(None)
        .with_class_loader(classes())
        .add_scope(SCOPE_THREAD, Arc::new(ThreadScope::new()))
        .add_definition(BeanDefinitionHolder::new(
            "inventory",
            BeanDefinition::for_class_name("Inventory").with_scope(SCOPE_THREAD),
        ))
        .add_definition(BeanDefinitionHolder::new(
            "scratch",
            BeanDefinition::for_class_name("Inventory").with_scope("prototype"),
        ))
        .build()?;
    let context = Arc::new(context);

    let first = context.get_bean("inventory")?;
    let again = context.get_bean("inventory")?;
    assert!(Arc::ptr_eq(&first, &again));
    assert!(!context.bean_factory().contains_singleton("inventory"));

    let other_thread = {
        let context = context.clone();
        std::thread::spawn(move || context.get_bean("inventory"))
            .join()
            .map_err(|_| anyhow::anyhow!("取组件的线程异常退出"))??
    };
    assert!(!Arc::ptr_eq(&first, &other_thread));

    let scratch = context.get_bean("scratch")?;
    assert!(!Arc::ptr_eq(&scratch, &context.get_bean("scratch")?));
    assert!(context.bean_factory().is_prototype("scratch")?);
    Ok(())
}
