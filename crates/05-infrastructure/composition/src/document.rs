//! 组件定义文档
//!
//! 用 JSON 或 TOML 描述组件定义, 由 serde 反序列化后转换成 [`BeanDefinition`]。
//! 文档只做反序列化, 不做额外的模式校验。
//!
//! ```json
//! {
//!   "beans": [
//!     { "name": "repository", "class": "OrderRepository", "properties": { "url": "${db.url}" } },
//!     { "name": "service", "class": "OrderService", "aliases": ["orders"],
//!       "properties": { "repository": { "ref": "repository" } } }
//!   ]
//! }
//! ```

use di_abstractions::{
    AutowireMode, BeanDefinition, BeanDefinitionHolder, BeanDefinitionRegistry, BeanReference,
    DefinitionValue, DependencyCheck,
};
use di_impl::{register_bean_definition, register_with_generated_name};
use infrastructure_common::{ConfigError, ConfigResult, DependencyResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// 定义文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefinitionDocument {
    /// 组件定义
    pub beans: Vec<BeanSpec>,
    /// 额外的别名: 组件名 -> 别名列表
    pub aliases: BTreeMap<String, Vec<String>>,
}

/// 文档中的单个组件定义
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeanSpec {
    /// 组件名, 为空时自动生成
    pub name: String,
    /// 别名
    pub aliases: Vec<String>,
    /// 类名
    pub class: Option<String>,
    /// 父定义名
    pub parent: Option<String>,
    /// 作用域
    pub scope: Option<String>,
    /// 是否为抽象定义
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    /// 是否延迟初始化
    pub lazy_init: bool,
    /// 是否为首选候选
    pub primary: bool,
    /// 是否参与自动装配
    pub autowire_candidate: Option<bool>,
    /// 自动装配模式
    pub autowire: AutowireMode,
    /// 依赖检查模式
    pub dependency_check: DependencyCheck,
    /// 显式依赖
    pub depends_on: Vec<String>,
    /// 初始化方法
    pub init_method: Option<String>,
    /// 销毁方法
    pub destroy_method: Option<String>,
    /// 工厂组件名
    pub factory_bean: Option<String>,
    /// 工厂方法名
    pub factory_method: Option<String>,
    /// 构造参数, 按位置
    pub constructor_args: Vec<ValueSpec>,
    /// 属性值
    pub properties: BTreeMap<String, ValueSpec>,
    /// 查找方法: 方法名 -> 组件名
    pub lookup_methods: BTreeMap<String, String>,
    /// 方法替换: 方法名 -> 替换器组件名
    pub replaced_methods: BTreeMap<String, String>,
    /// 描述
    pub description: Option<String>,
    /// 元数据属性
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// 文档中的值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    /// 组件引用: `{ "ref": "name" }`
    Reference {
        /// 引用的组件名
        #[serde(rename = "ref")]
        bean_name: String,
        /// 是否只在父容器中查找
        #[serde(default)]
        to_parent: bool,
    },
    /// 内部组件: `{ "bean": { ... } }`
    Inner {
        /// 内部组件定义
        bean: Box<BeanSpec>,
    },
    /// 空值
    Null,
    /// 布尔字面量
    Bool(bool),
    /// 整数字面量
    Integer(i64),
    /// 浮点字面量
    Float(f64),
    /// 文本字面量, 可以包含占位符
    Text(String),
    /// 列表
    List(Vec<ValueSpec>),
    /// 映射
    Map(BTreeMap<String, ValueSpec>),
}

impl ValueSpec {
    /// 转换为定义中的值
    pub fn to_definition_value(&self) -> DefinitionValue {
        match self {
            Self::Reference {
                bean_name,
                to_parent,
            } => {
                if *to_parent {
                    DefinitionValue::Reference(BeanReference::to_parent(bean_name.clone()))
                } else {
                    DefinitionValue::reference(bean_name.clone())
                }
            }
            Self::Inner { bean } => {
                let name = if bean.name.is_empty() {
                    "(inner bean)".to_string()
                } else {
                    bean.name.clone()
                };
                DefinitionValue::inner(name, bean.to_definition())
            }
            Self::Null => DefinitionValue::Null,
            Self::Bool(value) => DefinitionValue::literal(value.to_string()),
            Self::Integer(value) => DefinitionValue::literal(value.to_string()),
            Self::Float(value) => DefinitionValue::literal(value.to_string()),
            Self::Text(value) => DefinitionValue::literal(value.clone()),
            Self::List(values) => DefinitionValue::List(values.iter().map(Self::to_definition_value).collect()),
            Self::Map(entries) => DefinitionValue::Map(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_definition_value()))
                    .collect(),
            ),
        }
    }
}

impl BeanSpec {
    /// 转换为组件定义
    pub fn to_definition(&self) -> BeanDefinition {
        let mut definition = match &self.class {
            Some(class) => BeanDefinition::for_class_name(class.clone()),
            None => BeanDefinition::new(),
        };
        if let Some(parent) = &self.parent {
            definition = definition.with_parent(parent.clone());
        }
        if let Some(scope) = &self.scope {
            definition = definition.with_scope(scope.clone());
        }
        definition = definition
            .with_abstract(self.is_abstract)
            .with_lazy_init(self.lazy_init)
            .with_primary(self.primary)
            .with_autowire_mode(self.autowire)
            .with_dependency_check(self.dependency_check);
        if let Some(candidate) = self.autowire_candidate {
            definition = definition.with_autowire_candidate(candidate);
        }
        for dependency in &self.depends_on {
            definition = definition.with_depends_on(dependency.clone());
        }
        if let Some(init_method) = &self.init_method {
            definition = definition.with_init_method(init_method.clone());
        }
        if let Some(destroy_method) = &self.destroy_method {
            definition = definition.with_destroy_method(destroy_method.clone());
        }
        if let Some(factory_bean) = &self.factory_bean {
            definition = definition.with_factory_bean(factory_bean.clone());
        }
        if let Some(factory_method) = &self.factory_method {
            definition = definition.with_factory_method(factory_method.clone());
        }
        for (index, argument) in self.constructor_args.iter().enumerate() {
            definition = definition.with_constructor_arg(index, argument.to_definition_value());
        }
        for (name, value) in &self.properties {
            definition = definition.with_property(name.clone(), value.to_definition_value());
        }
        for (method, bean) in &self.lookup_methods {
            definition = definition.with_lookup_method(method.clone(), bean.clone());
        }
        for (method, replacer) in &self.replaced_methods {
            definition = definition.with_replaced_method(method.clone(), replacer.clone());
        }
        if let Some(description) = &self.description {
            definition = definition.with_description(description.clone());
        }
        for (key, value) in &self.attributes {
            definition = definition.with_attribute(key.clone(), value.clone());
        }
        definition
    }
}

impl DefinitionDocument {
    /// 解析 JSON 文档
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// 解析 TOML 文档
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        toml::from_str(text).map_err(ConfigError::parse)
    }

    /// 按扩展名读取文档文件
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|extension| extension.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            other => Err(ConfigError::ValidationError {
                message: format!("不支持的定义文档格式: {:?} ({})", other, path.display()),
            }),
        }
    }

    /// 把文档中的定义注册到注册表, 返回注册的组件名
    pub fn register_into(&self, registry: &dyn BeanDefinitionRegistry) -> DependencyResult<Vec<String>> {
        let mut names = Vec::with_capacity(self.beans.len());
        for spec in &self.beans {
            let definition = spec.to_definition();
            let name = if spec.name.is_empty() {
                register_with_generated_name(definition, registry)?
            } else {
                let holder = spec
                    .aliases
                    .iter()
                    .fold(BeanDefinitionHolder::new(spec.name.clone(), definition), |holder, alias| {
                        holder.with_alias(alias.clone())
                    });
                register_bean_definition(holder, registry)?;
                spec.name.clone()
            };
            names.push(name);
        }
        for (name, aliases) in &self.aliases {
            for alias in aliases {
                registry.register_alias(name, alias)?;
            }
        }
        debug!("定义文档注册了 {} 个组件", names.len());
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_document_to_definitions() {
        let document: DefinitionDocument = serde_json::from_value(json!({
            "beans": [
                {
                    "name": "service",
                    "class": "OrderService",
                    "scope": "prototype",
                    "depends_on": ["audit"],
                    "constructor_args": [{ "ref": "repository" }, 3],
                    "properties": {
                        "url": "${db.url:memory}",
                        "enabled": true,
                        "tags": ["a", "b"],
                        "helper": { "bean": { "class": "Helper" } },
                        "nothing": null
                    }
                }
            ]
        }))
        .unwrap();

        let definition = document.beans[0].to_definition();
        assert_eq!(definition.bean_class_name(), Some("OrderService"));
        assert!(definition.is_prototype());
        assert_eq!(definition.depends_on, vec!["audit".to_string()]);
        assert_eq!(
            definition.constructor_arguments.get_indexed(0).map(|holder| holder.value.is_reference()),
            Some(true)
        );
        assert_eq!(
            definition.property_values.get("url"),
            Some(&DefinitionValue::literal("${db.url:memory}"))
        );
        assert_eq!(definition.property_values.get("enabled"), Some(&DefinitionValue::literal("true")));
        assert!(matches!(definition.property_values.get("tags"), Some(DefinitionValue::List(values)) if values.len() == 2));
        assert!(matches!(definition.property_values.get("helper"), Some(DefinitionValue::Inner(_))));
        assert_eq!(definition.property_values.get("nothing"), Some(&DefinitionValue::Null));
    }

    #[test]
    fn test_toml_document() {
        let document = DefinitionDocument::from_toml_str(
            r#"
            [[beans]]
            name = "repository"
            class = "OrderRepository"
            lazy_init = true
            aliases = ["repo"]

            [beans.properties]
            pool_size = 8
            "#,
        )
        .unwrap();
        let spec = &document.beans[0];
        assert_eq!(spec.aliases, vec!["repo".to_string()]);
        assert!(spec.lazy_init);
        assert_eq!(spec.properties.get("pool_size"), Some(&ValueSpec::Integer(8)));
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let error = DefinitionDocument::from_path(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            DefinitionDocument::from_json_str("{ beans: ").unwrap_err(),
            ConfigError::SerializationError { .. }
        ));
    }
}
