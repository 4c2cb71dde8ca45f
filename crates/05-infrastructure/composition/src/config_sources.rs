//! 配置源管理
//!
//! 按登记顺序叠加 TOML / JSON 文件和环境变量, 后登记的配置源覆盖先登记的。
//! 容器配置位于 `container` 节, 代理配置位于 `aop` 节。

use aop_abstractions::ProxyConfig;
use di_abstractions::ContainerConfig;
use infrastructure_common::{ConfigError, ConfigResult};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 默认的环境变量前缀
pub const DEFAULT_ENV_PREFIX: &str = "LORN_IOC";

/// 环境变量层级分隔符
pub const ENV_SEPARATOR: &str = "__";

/// 容器配置所在的节
pub const CONTAINER_SECTION: &str = "container";

/// 代理配置所在的节
pub const AOP_SECTION: &str = "aop";

/// 配置源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSourceType {
    /// TOML 文件
    Toml,
    /// JSON 文件
    Json,
    /// 环境变量
    Environment,
}

/// 配置源描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSourceDescriptor {
    /// 配置源类型
    pub source_type: ConfigSourceType,
    /// 文件路径或环境变量前缀
    pub location: String,
    /// 文件不存在时是否报错
    pub required: bool,
}

/// 配置源管理器
#[derive(Debug, Clone, Default)]
pub struct ConfigSourceManager {
    sources: Vec<ConfigSourceDescriptor>,
    overrides: Vec<(String, String)>,
}

impl ConfigSourceManager {
    /// 创建空的配置源管理器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加 TOML 文件配置源
    pub fn add_toml_file<P: AsRef<Path>>(self, path: P, required: bool) -> Self {
        self.add_file(ConfigSourceType::Toml, path.as_ref(), required)
    }

    /// 添加 JSON 文件配置源
    pub fn add_json_file<P: AsRef<Path>>(self, path: P, required: bool) -> Self {
        self.add_file(ConfigSourceType::Json, path.as_ref(), required)
    }

    fn add_file(mut self, source_type: ConfigSourceType, path: &Path, required: bool) -> Self {
        debug!("添加 {:?} 配置源: {}", source_type, path.display());
        self.sources.push(ConfigSourceDescriptor {
            source_type,
            location: path.to_string_lossy().to_string(),
            required,
        });
        self
    }

    /// 添加环境变量配置源
    ///
    /// `LORN_IOC__CONTAINER__PROXY_TARGET_CLASS=true` 对应键 `container.proxy_target_class`。
    pub fn add_environment(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        debug!("添加环境变量配置源: {}{}*", prefix, ENV_SEPARATOR);
        self.sources.push(ConfigSourceDescriptor {
            source_type: ConfigSourceType::Environment,
            location: prefix,
            required: false,
        });
        self
    }

    /// 设置覆盖值, 优先级高于所有配置源
    pub fn set_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// 已登记的配置源
    pub fn sources(&self) -> &[ConfigSourceDescriptor] {
        &self.sources
    }

    /// 加载全部配置源
    pub fn load(&self) -> ConfigResult<config::Config> {
        let mut builder = config::Config::builder();
        for source in &self.sources {
            match source.source_type {
                ConfigSourceType::Toml | ConfigSourceType::Json => {
                    let path = PathBuf::from(&source.location);
                    if !path.exists() {
                        if source.required {
                            return Err(ConfigError::FileNotFound {
                                path: source.location.clone(),
                            });
                        }
                        debug!("可选配置文件不存在, 跳过: {}", source.location);
                        continue;
                    }
                    let format = if source.source_type == ConfigSourceType::Toml {
                        config::FileFormat::Toml
                    } else {
                        config::FileFormat::Json
                    };
                    builder = builder.add_source(config::File::from(path).format(format));
                }
                ConfigSourceType::Environment => {
                    builder = builder.add_source(
                        config::Environment::with_prefix(&source.location)
                            .separator(ENV_SEPARATOR)
                            .try_parsing(true),
                    );
                }
            }
        }
        for (key, value) in &self.overrides {
            builder = builder
                .set_override(key.as_str(), value.as_str())
                .map_err(ConfigError::parse)?;
        }
        let settings = builder.build().map_err(ConfigError::parse)?;
        info!("配置加载完成: {} 个配置源", self.sources.len());
        Ok(settings)
    }
}

/// 读取配置节, 节不存在时返回 `None`
pub fn section<T: DeserializeOwned>(settings: &config::Config, key: &str) -> ConfigResult<Option<T>> {
    match settings.get::<T>(key) {
        Ok(value) => Ok(Some(value)),
        Err(config::ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(ConfigError::TypeConversionError {
            message: format!("配置节 {} 无法绑定到 {}: {}", key, std::any::type_name::<T>(), e),
        }),
    }
}

/// 读取容器配置, 未配置时使用默认值
pub fn container_config(settings: &config::Config) -> ConfigResult<ContainerConfig> {
    Ok(section(settings, CONTAINER_SECTION)?.unwrap_or_default())
}

/// 读取代理配置, 未配置时由容器配置推导
pub fn proxy_config(settings: &config::Config, container: &ContainerConfig) -> ConfigResult<ProxyConfig> {
    Ok(section(settings, AOP_SECTION)?.unwrap_or_else(|| ProxyConfig::from(container)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_later_sources_override_earlier_ones() {
        let toml = write_file(
            ".toml",
            "[container]\nallow_circular_references = false\n\n[app]\nname = \"orders\"\nport = 8080\n",
        );
        let json = write_file(".json", r#"{ "app": { "port": 9090 } }"#);

        let settings = ConfigSourceManager::new()
            .add_toml_file(toml.path(), true)
            .add_json_file(json.path(), true)
            .load()
            .unwrap();

        assert_eq!(settings.get_string("app.name").unwrap(), "orders");
        assert_eq!(settings.get_int("app.port").unwrap(), 9090);
        let container = container_config(&settings).unwrap();
        assert!(!container.allow_circular_references);
        assert!(container.pre_instantiate_singletons);
    }

    #[test]
    fn test_missing_required_file() {
        let error = ConfigSourceManager::new()
            .add_toml_file("/nonexistent/lorn-ioc.toml", true)
            .load()
            .unwrap_err();
        assert!(matches!(error, ConfigError::FileNotFound { .. }));

        let settings = ConfigSourceManager::new()
            .add_toml_file("/nonexistent/lorn-ioc.toml", false)
            .load()
            .unwrap();
        assert_eq!(container_config(&settings).unwrap(), ContainerConfig::default());
    }

    #[test]
    fn test_environment_source() {
        std::env::set_var("LORN_IOC_SOURCES_TEST__CONTAINER__PROXY_TARGET_CLASS", "true");
        let settings = ConfigSourceManager::new()
            .add_environment("LORN_IOC_SOURCES_TEST")
            .load()
            .unwrap();
        std::env::remove_var("LORN_IOC_SOURCES_TEST__CONTAINER__PROXY_TARGET_CLASS");

        let container = container_config(&settings).unwrap();
        assert!(container.proxy_target_class);
        assert!(proxy_config(&settings, &container).unwrap().proxy_target_class);
    }

    #[test]
    fn test_aop_section_takes_precedence() {
        let settings = ConfigSourceManager::new()
            .set_override("container.optimize", "false")
            .set_override("aop.optimize", "true")
            .load()
            .unwrap();
        let container = container_config(&settings).unwrap();
        let proxy = proxy_config(&settings, &container).unwrap();
        assert!(!container.optimize);
        assert!(proxy.optimize);
        assert!(proxy.class_proxy_available);
    }
}
