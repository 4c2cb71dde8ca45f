//! 容器配置与统计

use serde::{Deserialize, Serialize};

/// 容器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 是否允许通过提前暴露的引用解决单例循环依赖
    pub allow_circular_references: bool,
    /// 是否允许同名定义覆盖
    pub allow_bean_definition_overriding: bool,
    /// 是否缓存合并后的定义
    pub cache_bean_metadata: bool,
    /// 构建上下文时是否预实例化单例
    pub pre_instantiate_singletons: bool,
    /// 运行时是否支持基于类的代理
    pub class_proxy_available: bool,
    /// 是否总是代理目标类
    pub proxy_target_class: bool,
    /// 是否启用代理优化
    pub optimize: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            allow_circular_references: true,
            allow_bean_definition_overriding: true,
            cache_bean_metadata: true,
            pre_instantiate_singletons: true,
            class_proxy_available: true,
            proxy_target_class: false,
            optimize: false,
        }
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerStats {
    /// 已注册定义数量
    pub registered_definitions: usize,
    /// 已缓存的合并定义数量
    pub merged_definitions: usize,
    /// 活跃单例数量
    pub active_singletons: usize,
    /// 已注册作用域数量
    pub registered_scopes: usize,
    /// 后置处理器数量
    pub post_processors: usize,
    /// 已记录的被抑制错误数量
    pub suppressed_errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ContainerConfig =
            serde_json::from_str(r#"{ "allow_circular_references": false }"#).unwrap();
        assert!(!config.allow_circular_references);
        assert!(config.allow_bean_definition_overriding);
        assert!(!config.proxy_target_class);
    }
}
