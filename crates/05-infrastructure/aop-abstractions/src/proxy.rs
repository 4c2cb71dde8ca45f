//! 代理配置与代理策略

use di_abstractions::{BeanClass, ContainerConfig, DynamicObject};
use infrastructure_common::{AopResult, Object, TypeInfo};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 框架标记接口名称, 所有代理都实现该接口
pub const CONTAINER_PROXY: &str = "ContainerProxy";

static CONTAINER_PROXY_INTERFACE: Lazy<Arc<BeanClass>> =
    Lazy::new(|| BeanClass::interface(CONTAINER_PROXY).build());

/// 框架标记接口
///
/// 判断"是否存在用户提供的代理接口"时不计入该接口。
pub fn container_proxy_interface() -> Arc<BeanClass> {
    CONTAINER_PROXY_INTERFACE.clone()
}

/// 对象是否为框架创建的代理
pub fn is_container_proxy(object: &Object) -> bool {
    object
        .downcast_ref::<DynamicObject>()
        .is_some_and(|dynamic| dynamic.class().is_assignable_to(&TypeInfo::named(CONTAINER_PROXY)))
}

/// 代理种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyKind {
    /// 基于接口的代理, 只暴露被代理接口上的方法
    Interface,
    /// 基于类的代理, 暴露目标类的全部方法
    Class,
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interface => f.write_str("接口代理"),
            Self::Class => f.write_str("类代理"),
        }
    }
}

/// 代理配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// 总是代理目标类
    pub proxy_target_class: bool,
    /// 启用代理优化 (使用类代理)
    pub optimize: bool,
    /// 代理创建后不能再通过代理查询配置
    pub opaque: bool,
    /// 配置冻结后不能再修改通知器
    pub frozen: bool,
    /// 运行时是否支持基于类的代理
    pub class_proxy_available: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            proxy_target_class: false,
            optimize: false,
            opaque: false,
            frozen: false,
            class_proxy_available: true,
        }
    }
}

impl From<&ContainerConfig> for ProxyConfig {
    fn from(config: &ContainerConfig) -> Self {
        Self {
            proxy_target_class: config.proxy_target_class,
            optimize: config.optimize,
            class_proxy_available: config.class_proxy_available,
            ..Self::default()
        }
    }
}

/// 已选定策略的代理
pub trait AopProxy: Send + Sync {
    /// 代理种类
    fn kind(&self) -> ProxyKind;

    /// 创建代理对象
    fn get_proxy(&self) -> AopResult<Object>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_config_from_container_config() {
        let container = ContainerConfig {
            proxy_target_class: true,
            class_proxy_available: false,
            ..ContainerConfig::default()
        };
        let config = ProxyConfig::from(&container);
        assert!(config.proxy_target_class);
        assert!(!config.class_proxy_available);
        assert!(!config.frozen);
    }

    #[test]
    fn test_partial_proxy_config_uses_defaults() {
        let config: ProxyConfig = serde_json::from_str(r#"{ "optimize": true }"#).unwrap();
        assert!(config.optimize);
        assert!(config.class_proxy_available);
    }

    #[test]
    fn test_marker_interface_identifies_proxies() {
        let class = BeanClass::dynamic("Service$$Proxy")
            .implements(container_proxy_interface())
            .build();
        let proxy: Object = Arc::new(DynamicObject::new(class, Arc::new(()) as Object));
        assert!(is_container_proxy(&proxy));
        assert!(!is_container_proxy(&(Arc::new(1u8) as Object)));
    }
}
