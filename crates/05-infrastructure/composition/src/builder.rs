//! 应用上下文构建器

use crate::config_sources::{self, ConfigSourceManager, DEFAULT_ENV_PREFIX};
use crate::context::ApplicationContext;
use crate::document::DefinitionDocument;
use crate::logging::LoggingConfig;
use crate::placeholder::PlaceholderResolver;
use aop_abstractions::Advisor;
use aop_impl::AutoProxyCreator;
use di_abstractions::{
    BeanDefinitionHolder, BeanPostProcessor, ClassLoader, ClassRegistry, ConfigurableBeanFactory,
    ConfigurableListableBeanFactory, ContainerConfig, ListableBeanFactory, Scope,
};
use di_impl::{register_bean_definition, BeanFactoryBuilder};
use infrastructure_common::{InfrastructureResult, Object};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

/// 应用上下文构建器
///
/// ```rust,ignore
/// let context = ContextBuilder::new()
///     .add_config_toml("config/app.toml")
///     .with_class_loader(classes)
///     .add_document(DefinitionDocument::from_path("config/beans.json")?)
///     .add_advisor(DefaultPointcutAdvisor::for_methods(["place*"], Advice::interceptor(Timing)).into_advisor())
///     .build()?;
/// ```
pub struct ContextBuilder {
    config_sources: ConfigSourceManager,
    env_prefix: Option<String>,
    container_config: Option<ContainerConfig>,
    logging_config: Option<LoggingConfig>,
    ignore_unresolvable_placeholders: bool,
    class_loader: Option<Arc<dyn ClassLoader>>,
    parent: Option<Arc<dyn ConfigurableListableBeanFactory>>,
    definitions: Vec<BeanDefinitionHolder>,
    documents: Vec<DefinitionDocument>,
    document_paths: Vec<PathBuf>,
    singletons: Vec<(String, Object)>,
    scopes: Vec<(String, Arc<dyn Scope>)>,
    post_processors: Vec<Arc<dyn BeanPostProcessor>>,
    advisors: Vec<Advisor>,
}

impl ContextBuilder {
    /// 创建新的构建器, 默认读取 `LORN_IOC` 前缀的环境变量
    pub fn new() -> Self {
        Self {
            config_sources: ConfigSourceManager::new(),
            env_prefix: Some(DEFAULT_ENV_PREFIX.to_string()),
            container_config: None,
            logging_config: None,
            ignore_unresolvable_placeholders: false,
            class_loader: None,
            parent: None,
            definitions: Vec::new(),
            documents: Vec::new(),
            document_paths: Vec::new(),
            singletons: Vec::new(),
            scopes: Vec::new(),
            post_processors: Vec::new(),
            advisors: Vec::new(),
        }
    }

    /// 添加 TOML 配置文件, 文件必须存在
    pub fn add_config_toml<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_sources = self.config_sources.add_toml_file(path, true);
        self
    }

    /// 添加 JSON 配置文件, 文件必须存在
    pub fn add_config_json<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_sources = self.config_sources.add_json_file(path, true);
        self
    }

    /// 添加可选的 TOML 配置文件
    pub fn add_optional_config_toml<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_sources = self.config_sources.add_toml_file(path, false);
        self
    }

    /// 设置环境变量前缀, `None` 表示不读取环境变量
    pub fn with_env_prefix(mut self, prefix: Option<&str>) -> Self {
        self.env_prefix = prefix.map(str::to_string);
        self
    }

    /// 设置配置值, 优先级高于所有配置源
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config_sources = self.config_sources.set_override(key, value);
        self
    }

    /// 显式指定容器配置, 忽略配置源中的 `container` 节
    pub fn with_container_config(mut self, config: ContainerConfig) -> Self {
        self.container_config = Some(config);
        self
    }

    /// 构建时初始化日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = Some(config);
        self
    }

    /// 无法解析的占位符是否原样保留
    pub fn ignore_unresolvable_placeholders(mut self, ignore: bool) -> Self {
        self.ignore_unresolvable_placeholders = ignore;
        self
    }

    /// 设置类加载器
    pub fn with_class_loader(mut self, class_loader: Arc<dyn ClassLoader>) -> Self {
        self.class_loader = Some(class_loader);
        self
    }

    /// 设置父上下文
    pub fn with_parent(mut self, parent: &ApplicationContext) -> Self {
        self.parent = Some(parent.bean_factory().clone());
        self
    }

    /// 添加组件定义
    pub fn add_definition(mut self, holder: BeanDefinitionHolder) -> Self {
        self.definitions.push(holder);
        self
    }

    /// 添加定义文档
    pub fn add_document(mut self, document: DefinitionDocument) -> Self {
        self.documents.push(document);
        self
    }

    /// 添加定义文档文件, 构建时读取
    pub fn add_document_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.document_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// 注册现成的单例
    pub fn add_singleton(mut self, name: impl Into<String>, object: Object) -> Self {
        self.singletons.push((name.into(), object));
        self
    }

    /// 注册自定义作用域
    pub fn add_scope(mut self, name: impl Into<String>, scope: Arc<dyn Scope>) -> Self {
        self.scopes.push((name.into(), scope));
        self
    }

    /// 添加后置处理器
    pub fn add_post_processor(mut self, processor: Arc<dyn BeanPostProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    /// 添加通知器, 由自动代理创建器应用到匹配的组件
    pub fn add_advisor(mut self, advisor: Advisor) -> Self {
        self.advisors.push(advisor);
        self
    }

    /// 构建应用上下文
    pub fn build(self) -> InfrastructureResult<ApplicationContext> {
        if let Some(logging) = &self.logging_config {
            logging.init()?;
        }
        info!("开始构建应用上下文");

        let sources = match &self.env_prefix {
            Some(prefix) => self.config_sources.clone().add_environment(prefix.clone()),
            None => self.config_sources.clone(),
        };
        let settings = Arc::new(sources.load()?);
        let container_config = match self.container_config {
            Some(config) => config,
            None => config_sources::container_config(&settings)?,
        };
        let proxy_config = config_sources::proxy_config(&settings, &container_config)?;
        debug!("容器配置: {:?}", container_config);

        let class_loader = self
            .class_loader
            .unwrap_or_else(|| Arc::new(ClassRegistry::new()));
        let mut factory_builder = BeanFactoryBuilder::new()
            .with_config(container_config.clone())
            .with_class_loader(class_loader.clone());
        if let Some(parent) = self.parent {
            factory_builder = factory_builder.with_parent(parent);
        }
        let bean_factory = factory_builder.build();

        let placeholders = PlaceholderResolver::new(settings.clone())
            .with_ignore_unresolvable(self.ignore_unresolvable_placeholders);
        bean_factory.add_embedded_value_resolver(Arc::new(placeholders.clone()));

        for (name, scope) in self.scopes {
            bean_factory.register_scope(&name, scope)?;
        }
        for processor in self.post_processors {
            bean_factory.add_bean_post_processor(processor);
        }
        let auto_proxy_creator = if self.advisors.is_empty() {
            None
        } else {
            let creator = self
                .advisors
                .into_iter()
                .fold(AutoProxyCreator::new(class_loader).with_config(proxy_config), |creator, advisor| {
                    creator.with_advisor(advisor)
                });
            let creator = Arc::new(creator);
            bean_factory.add_bean_post_processor(creator.clone());
            Some(creator)
        };

        for (name, object) in self.singletons {
            bean_factory.register_singleton(&name, object)?;
        }
        for holder in self.definitions {
            register_bean_definition(holder, bean_factory.as_ref())?;
        }
        let mut documents = self.documents;
        for path in &self.document_paths {
            documents.push(DefinitionDocument::from_path(path)?);
        }
        for document in &documents {
            document.register_into(bean_factory.as_ref())?;
        }

        if container_config.pre_instantiate_singletons {
            if let Err(e) = bean_factory.pre_instantiate_singletons() {
                error!("预实例化单例失败, 销毁已创建的单例: {}", e);
                bean_factory.destroy_singletons();
                return Err(e.into());
            }
        }

        let context = ApplicationContext::new(
            settings,
            container_config,
            bean_factory,
            placeholders,
            auto_proxy_creator,
        );
        info!("应用上下文构建完成: {}", context.id());
        Ok(context)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
