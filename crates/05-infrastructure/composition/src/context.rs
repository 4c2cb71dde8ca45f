//! 应用上下文

use crate::builder::ContextBuilder;
use crate::placeholder::PlaceholderResolver;
use aop_impl::AutoProxyCreator;
use chrono::{DateTime, Utc};
use di_abstractions::{BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ContainerConfig};
use di_impl::DefaultBeanFactory;
use infrastructure_common::{
    ConfigError, ConfigResult, DependencyResult, InfrastructureError, InfrastructureResult, Object,
};
use serde::de::DeserializeOwned;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 应用上下文
///
/// 持有加载好的配置和组件容器。关闭上下文时销毁全部单例;
/// 丢弃上下文不会触发销毁, 需要显式调用 [`ApplicationContext::close`]。
pub struct ApplicationContext {
    id: Uuid,
    started_at: DateTime<Utc>,
    settings: Arc<config::Config>,
    container_config: ContainerConfig,
    bean_factory: Arc<DefaultBeanFactory>,
    placeholders: PlaceholderResolver,
    auto_proxy_creator: Option<Arc<AutoProxyCreator>>,
    active: AtomicBool,
}

impl ApplicationContext {
    /// 创建上下文构建器
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    pub(crate) fn new(
        settings: Arc<config::Config>,
        container_config: ContainerConfig,
        bean_factory: Arc<DefaultBeanFactory>,
        placeholders: PlaceholderResolver,
        auto_proxy_creator: Option<Arc<AutoProxyCreator>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            settings,
            container_config,
            bean_factory,
            placeholders,
            auto_proxy_creator,
            active: AtomicBool::new(true),
        }
    }

    /// 上下文标识
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 启动时间
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// 是否尚未关闭
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// 组件容器
    pub fn bean_factory(&self) -> &Arc<DefaultBeanFactory> {
        &self.bean_factory
    }

    /// 生效的容器配置
    pub fn container_config(&self) -> &ContainerConfig {
        &self.container_config
    }

    /// 加载的配置
    pub fn settings(&self) -> &config::Config {
        &self.settings
    }

    /// 自动代理创建器, 没有配置通知器时为 `None`
    pub fn auto_proxy_creator(&self) -> Option<&Arc<AutoProxyCreator>> {
        self.auto_proxy_creator.as_ref()
    }

    /// 读取配置值
    pub fn get_property<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<T> {
        self.settings.get::<T>(key).map_err(|e| match e {
            config::ConfigError::NotFound(_) => ConfigError::KeyNotFound { key: key.to_string() },
            other => ConfigError::TypeConversionError {
                message: format!("配置键 {} 无法转换为 {}: {}", key, std::any::type_name::<T>(), other),
            },
        })
    }

    /// 解析文本中的占位符
    pub fn resolve_placeholders(&self, text: &str) -> ConfigResult<String> {
        self.placeholders.resolve(text)
    }

    /// 按名称获取组件
    pub fn get_bean(&self, name: &str) -> DependencyResult<Object> {
        self.bean_factory.get_bean(name)
    }

    /// 按名称获取组件并转换为具体类型
    pub fn get_bean_typed<T: Any + Send + Sync>(&self, name: &str) -> DependencyResult<Arc<T>> {
        self.bean_factory.get_bean_typed::<T>(name)
    }

    /// 是否包含组件
    pub fn contains_bean(&self, name: &str) -> bool {
        self.bean_factory.contains_bean(name)
    }

    /// 关闭上下文, 销毁全部单例。重复关闭没有效果。
    pub fn close(&self) -> InfrastructureResult<()> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        info!("关闭应用上下文: {}", self.id);
        self.bean_factory.destroy_singletons();

        if !self.bean_factory.get_singleton_names().is_empty() {
            return Err(InfrastructureError::ShutdownFailed {
                message: format!("应用上下文 {} 关闭后仍有单例未销毁", self.id),
            });
        }
        info!("应用上下文已关闭: {}", self.id);
        Ok(())
    }
}
