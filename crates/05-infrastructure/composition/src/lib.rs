//! # 基础设施组合层
//!
//! 把配置、组件容器和 AOP 组合成可运行的应用上下文。
//!
//! ## 主要功能
//!
//! - **配置源管理**: 叠加 TOML / JSON 文件和环境变量 ([`ConfigSourceManager`])
//! - **占位符解析**: 定义中的 `${key:default}` 由配置解析 ([`PlaceholderResolver`])
//! - **定义文档**: 用 JSON / TOML 描述组件定义 ([`DefinitionDocument`])
//! - **日志初始化**: [`LoggingConfig`]
//! - **上下文生命周期**: [`ContextBuilder`] 构建, [`ApplicationContext::close`] 销毁单例
//!
//! ## 基本使用
//!
//! ```rust,ignore
//! use infrastructure_composition::ContextBuilder;
//!
//! let context = ContextBuilder::new()
//!     .add_config_toml("config/app.toml")
//!     .with_class_loader(classes)
//!     .add_document_file("config/beans.json")
//!     .build()?;
//!
//! let service = context.get_bean("orderService")?;
//! context.close()?;
//! ```

pub mod builder;
pub mod config_sources;
pub mod context;
pub mod document;
pub mod logging;
pub mod placeholder;

#[cfg(test)]
mod tests;

pub use builder::ContextBuilder;
pub use config_sources::{
    ConfigSourceDescriptor, ConfigSourceManager, ConfigSourceType, DEFAULT_ENV_PREFIX, ENV_SEPARATOR,
};
pub use context::ApplicationContext;
pub use document::{BeanSpec, DefinitionDocument, ValueSpec};
pub use logging::LoggingConfig;
pub use placeholder::PlaceholderResolver;

// 重新导出错误类型
pub use infrastructure_common::{ConfigError, InfrastructureError};
