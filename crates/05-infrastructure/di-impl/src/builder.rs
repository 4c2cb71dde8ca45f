//! 容器构建器

use crate::factory::DefaultBeanFactory;
use di_abstractions::{
    ClassLoader, ClassRegistry, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    ContainerConfig,
};
use infrastructure_common::{SimpleTypeConverter, TypeConverter};
use std::sync::Arc;
use tracing::info;

/// [`DefaultBeanFactory`] 构建器
#[derive(Default)]
pub struct BeanFactoryBuilder {
    config: ContainerConfig,
    parent: Option<Arc<dyn ConfigurableListableBeanFactory>>,
    class_loader: Option<Arc<dyn ClassLoader>>,
    type_converter: Option<Arc<dyn TypeConverter>>,
}

impl BeanFactoryBuilder {
    /// 使用默认配置创建构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置容器配置
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置父容器
    pub fn with_parent(mut self, parent: Arc<dyn ConfigurableListableBeanFactory>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// 设置类加载器, 默认为空的 [`ClassRegistry`]
    pub fn with_class_loader(mut self, class_loader: Arc<dyn ClassLoader>) -> Self {
        self.class_loader = Some(class_loader);
        self
    }

    /// 设置类型转换器, 默认为 [`SimpleTypeConverter`]
    pub fn with_type_converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.type_converter = Some(converter);
        self
    }

    /// 构建容器
    pub fn build(self) -> Arc<DefaultBeanFactory> {
        let Self {
            config,
            parent,
            class_loader,
            type_converter,
        } = self;
        let class_loader = class_loader.unwrap_or_else(|| Arc::new(ClassRegistry::new()));
        let type_converter = type_converter.unwrap_or_else(|| Arc::new(SimpleTypeConverter::new()));
        let has_parent = parent.is_some();

        let factory = Arc::new_cyclic(|self_ref| {
            DefaultBeanFactory::with_parts(
                self_ref.clone(),
                config,
                parent,
                class_loader,
                type_converter,
            )
        });
        info!(
            "组件容器已创建: {} (类加载器: {}, 父容器: {})",
            factory.id(),
            factory.bean_class_loader().loader_name(),
            if has_parent { "有" } else { "无" }
        );
        factory
    }
}

impl std::fmt::Debug for BeanFactoryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanFactoryBuilder")
            .field("config", &self.config)
            .field("has_parent", &self.parent.is_some())
            .field("has_class_loader", &self.class_loader.is_some())
            .finish()
    }
}

impl DefaultBeanFactory {
    /// 使用默认配置创建独立容器
    pub fn new() -> Arc<Self> {
        BeanFactoryBuilder::new().build()
    }
}
