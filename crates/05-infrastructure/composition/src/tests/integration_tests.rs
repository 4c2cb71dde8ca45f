//! 应用上下文集成测试

use crate::builder::ContextBuilder;
use crate::document::DefinitionDocument;
use aop_abstractions::{Advice, InvocationResult, MethodInvocation};
use aop_impl::{is_aop_proxy, DefaultPointcutAdvisor};
use di_abstractions::{
    invoke_dynamic, BeanClass, BeanDefinition, BeanDefinitionHolder, ClassRegistry,
    ConfigurableBeanFactory, DefinitionValue,
};
use infrastructure_common::{InfrastructureError, Object};
use parking_lot::Mutex;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Repository {
    url: String,
}

#[derive(Debug, Default)]
struct OrderService {
    repository: Option<Arc<Repository>>,
}

#[derive(Debug, Default)]
struct Broken;

type Journal = Arc<Mutex<Vec<String>>>;

fn classes(journal: Journal) -> Arc<ClassRegistry> {
    let classes = Arc::new(ClassRegistry::new());
    classes.register(
        BeanClass::builder::<Repository>("Repository")
            .default_constructor()
            .property("url", |repository: &mut Repository, url: String| repository.url = url)
            .destroy_method("close", move |repository: &Repository| {
                journal.lock().push(format!("close {}", repository.url));
                Ok(())
            })
            .build(),
    );
    classes.register(
        BeanClass::builder::<OrderService>("OrderService")
            .default_constructor()
            .property("repository", |service: &mut OrderService, repository: Arc<Repository>| {
                service.repository = Some(repository);
            })
            .method("describe", |service: &OrderService, _args| {
                let url = service
                    .repository
                    .as_ref()
                    .map(|repository| repository.url.clone())
                    .unwrap_or_default();
                Ok(Some(Arc::new(format!("orders@{}", url)) as Object))
            })
            .build(),
    );
    classes.register(
        BeanClass::builder::<Broken>("Broken")
            .default_constructor()
            .init_method("start", |_broken: &mut Broken| Err(anyhow::anyhow!("启动失败")))
            .build(),
    );
    classes
}

fn temp_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_context_resolves_placeholders_from_config_file() {
    let journal = Journal::default();
    let config = temp_file(".toml", "[db]\nurl = \"postgres://orders\"\n");
    let document = temp_file(
        ".json",
        &json!({
            "beans": [
                { "name": "repository", "class": "Repository",
                  "destroy_method": "close",
                  "properties": { "url": "${db.url}" } },
                { "name": "orderService", "class": "OrderService", "aliases": ["orders"],
                  "properties": { "repository": { "ref": "repository" } } }
            ]
        })
        .to_string(),
    );

    let context = ContextBuilder::new()
        .with_env_prefix(None)
        .add_config_toml(config.path())
        .with_class_loader(classes(journal.clone()))
        .add_document_file(document.path())
        .build()
        .unwrap();

    assert!(context.bean_factory().contains_singleton("repository"));
    let repository = context.get_bean_typed::<Repository>("repository").unwrap();
    assert_eq!(repository.url, "postgres://orders");
    let service = context.get_bean_typed::<OrderService>("orders").unwrap();
    assert!(Arc::ptr_eq(service.repository.as_ref().unwrap(), &repository));
    assert_eq!(context.get_property::<String>("db.url").unwrap(), "postgres://orders");

    context.close().unwrap();
    assert!(!context.is_active());
    assert_eq!(*journal.lock(), vec!["close postgres://orders".to_string()]);
    context.close().unwrap();
    assert_eq!(journal.lock().len(), 1);
}

#[test]
fn test_placeholder_default_and_overrides() {
    let context = ContextBuilder::new()
        .with_env_prefix(None)
        .with_property("container.pre_instantiate_singletons", "false")
        .with_class_loader(classes(Journal::default()))
        .add_definition(BeanDefinitionHolder::new(
            "repository",
            BeanDefinition::for_class_name("Repository")
                .with_property("url", DefinitionValue::literal("${db.url:memory://}")),
        ))
        .build()
        .unwrap();

    assert!(!context.container_config().pre_instantiate_singletons);
    assert!(!context.bean_factory().contains_singleton("repository"));
    let repository = context.get_bean_typed::<Repository>("repository").unwrap();
    assert_eq!(repository.url, "memory://");
    assert_eq!(context.resolve_placeholders("${missing:x}").unwrap(), "x");
}

#[test]
fn test_unresolvable_placeholder_fails_creation() {
    let result = ContextBuilder::new()
        .with_env_prefix(None)
        .with_class_loader(classes(Journal::default()))
        .add_definition(BeanDefinitionHolder::new(
            "repository",
            BeanDefinition::for_class_name("Repository")
                .with_property("url", DefinitionValue::literal("${db.url}")),
        ))
        .build();
    assert!(matches!(result, Err(InfrastructureError::DependencyError { .. })));
}

#[test]
fn test_advisors_are_applied_by_auto_proxy() {
    let calls = Journal::default();
    let recorder = calls.clone();
    let advice = move |invocation: &mut dyn MethodInvocation| -> InvocationResult {
        recorder.lock().push(invocation.method().to_string());
        invocation.proceed()
    };
    let document = DefinitionDocument::from_json_str(
        r#"{ "beans": [
            { "name": "repository", "class": "Repository", "properties": { "url": "mem" } },
            { "name": "orderService", "class": "OrderService",
              "properties": { "repository": { "ref": "repository" } } }
        ] }"#,
    )
    .unwrap();

    let context = ContextBuilder::new()
        .with_env_prefix(None)
        .with_class_loader(classes(Journal::default()))
        .add_document(document)
        .add_advisor(DefaultPointcutAdvisor::for_methods(["describe"], Advice::interceptor(advice)).into_advisor())
        .build()
        .unwrap();

    let service = context.get_bean("orderService").unwrap();
    assert!(is_aop_proxy(&service));
    let description = invoke_dynamic(&service, "describe", &[]).unwrap().unwrap();
    assert_eq!(description.downcast_ref::<String>().unwrap(), "orders@mem");
    assert_eq!(*calls.lock(), vec!["OrderService.describe".to_string()]);

    let repository = context.get_bean("repository").unwrap();
    assert!(!is_aop_proxy(&repository));
    assert_eq!(
        context.auto_proxy_creator().unwrap().proxied_bean_names(),
        vec!["orderService".to_string()]
    );
}

#[test]
fn test_failed_pre_instantiation_destroys_created_singletons() {
    let journal = Journal::default();
    let result = ContextBuilder::new()
        .with_env_prefix(None)
        .with_class_loader(classes(journal.clone()))
        .add_definition(BeanDefinitionHolder::new(
            "repository",
            BeanDefinition::for_class_name("Repository")
                .with_property("url", DefinitionValue::literal("mem"))
                .with_destroy_method("close"),
        ))
        .add_definition(BeanDefinitionHolder::new(
            "broken",
            BeanDefinition::for_class_name("Broken").with_init_method("start"),
        ))
        .build();

    assert!(matches!(result, Err(InfrastructureError::DependencyError { .. })));
    assert_eq!(*journal.lock(), vec!["close mem".to_string()]);
}

#[test]
fn test_child_context_sees_parent_beans() {
    let classes = classes(Journal::default());
    let parent = ContextBuilder::new()
        .with_env_prefix(None)
        .with_class_loader(classes.clone())
        .add_definition(BeanDefinitionHolder::new(
            "repository",
            BeanDefinition::for_class_name("Repository").with_property("url", DefinitionValue::literal("shared")),
        ))
        .build()
        .unwrap();
    let child = ContextBuilder::new()
        .with_env_prefix(None)
        .with_class_loader(classes)
        .with_parent(&parent)
        .add_definition(BeanDefinitionHolder::new(
            "orderService",
            BeanDefinition::for_class_name("OrderService")
                .with_property("repository", DefinitionValue::reference("repository")),
        ))
        .build()
        .unwrap();

    let service = child.get_bean_typed::<OrderService>("orderService").unwrap();
    assert_eq!(service.repository.as_ref().unwrap().url, "shared");
    assert!(child.contains_bean("repository"));
    assert!(!child.bean_factory().contains_singleton("repository"));
    assert_ne!(child.id(), parent.id());
}
