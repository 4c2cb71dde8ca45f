//! 组件定义合并
//!
//! 子定义与父定义链合并为自包含的有效定义。合并在缓存级别的可重入锁下进行,
//! 同一名称的并发首次访问只会得到一个规范的合并结果; 命中缓存的读取不加锁。

use crate::factory::DefaultBeanFactory;
use dashmap::DashMap;
use di_abstractions::{BeanDefinition, SCOPE_SINGLETON};
use infrastructure_common::{DependencyError, DependencyResult};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::sync::Arc;
use tracing::{debug, trace};

/// 合并定义缓存
#[derive(Debug, Default)]
pub struct MergedDefinitionCache {
    merged: DashMap<String, Arc<BeanDefinition>>,
    lock: ReentrantMutex<()>,
}

impl MergedDefinitionCache {
    /// 创建空缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取合并锁
    pub fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// 读取缓存的合并定义
    pub fn get(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        self.merged.get(name).map(|entry| entry.value().clone())
    }

    /// 缓存合并定义
    pub fn insert(&self, name: &str, definition: Arc<BeanDefinition>) {
        self.merged.insert(name.to_string(), definition);
    }

    /// 使缓存失效
    pub fn remove(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        self.merged.remove(name).map(|(_, definition)| definition)
    }

    /// 是否已缓存
    pub fn contains(&self, name: &str) -> bool {
        self.merged.contains_key(name)
    }

    /// 已缓存的合并定义数量
    pub fn len(&self) -> usize {
        self.merged.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }
}

impl DefaultBeanFactory {
    /// 本容器中定义的合并结果
    pub(crate) fn get_merged_local_bean_definition(
        &self,
        bean_name: &str,
    ) -> DependencyResult<Arc<BeanDefinition>> {
        if let Some(merged) = self.merged.get(bean_name) {
            return Ok(merged);
        }
        let definition = self
            .registry
            .get(bean_name)
            .ok_or_else(|| DependencyError::not_registered(bean_name))?;
        self.merge_bean_definition(bean_name, &definition, None)
    }

    /// 合并定义, 本地没有定义时查找父容器
    pub(crate) fn merged_definition_anywhere(
        &self,
        bean_name: &str,
    ) -> DependencyResult<Arc<BeanDefinition>> {
        if self.registry.contains(bean_name) {
            return self.get_merged_local_bean_definition(bean_name);
        }
        match &self.parent {
            Some(parent) => parent.get_merged_bean_definition(bean_name),
            None => Err(DependencyError::not_registered(bean_name)),
        }
    }

    /// 合并定义
    ///
    /// `containing` 为外部组件的定义时, 结果不进入缓存, 并且非单例的外部组件会
    /// 把自己的作用域强加给单例的内部组件。
    pub(crate) fn merge_bean_definition(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        containing: Option<&BeanDefinition>,
    ) -> DependencyResult<Arc<BeanDefinition>> {
        let _lock = self.merged.lock();
        if containing.is_none() {
            if let Some(merged) = self.merged.get(bean_name) {
                return Ok(merged);
            }
        }

        let mut merged = match definition.parent_name.as_deref() {
            None => definition.clone(),
            Some(parent_name) => {
                let parent = self.resolve_parent_definition(bean_name, parent_name)?;
                trace!("合并组件定义 {} 与父定义 {}", bean_name, parent_name);
                let mut merged = (*parent).clone();
                merged.override_from(definition);
                merged
            }
        };
        merged.parent_name = None;

        if merged.scope.as_deref().map_or(true, str::is_empty) {
            merged.scope = Some(SCOPE_SINGLETON.to_string());
        }
        if let Some(containing) = containing {
            if !containing.is_singleton() && merged.is_singleton() {
                debug!(
                    "内部组件 {} 继承外部组件的作用域: {}",
                    bean_name,
                    containing.effective_scope()
                );
                merged.scope = containing.scope.clone();
            }
        }

        let merged = Arc::new(merged);
        if containing.is_none()
            && self.config.cache_bean_metadata
            && self.already_created.contains(bean_name)
        {
            self.merged.insert(bean_name, merged.clone());
            debug!("缓存合并后的组件定义: {}", bean_name);
        }
        Ok(merged)
    }

    fn resolve_parent_definition(
        &self,
        bean_name: &str,
        parent_name: &str,
    ) -> DependencyResult<Arc<BeanDefinition>> {
        let parent_bean_name = self.transformed_bean_name(parent_name);
        let result = if parent_bean_name != bean_name {
            self.merged_definition_anywhere(&parent_bean_name)
        } else {
            // 与自身同名的父定义位于父容器中
            match &self.parent {
                Some(parent) => parent.get_merged_bean_definition(&parent_bean_name),
                None => {
                    return Err(DependencyError::invalid_definition(
                        bean_name,
                        format!(
                            "父定义名 '{}' 与组件名相同, 但当前容器没有父容器",
                            parent_name
                        ),
                    ))
                }
            }
        };
        result.map_err(|error| {
            if error.is_not_found() {
                DependencyError::invalid_definition(
                    bean_name,
                    format!("找不到父定义 '{}'", parent_name),
                )
            } else {
                error
            }
        })
    }

    /// 使合并定义失效, 并销毁该名称及其子定义对应的单例
    pub(crate) fn reset_bean_definition(&self, bean_name: &str) {
        self.merged.remove(bean_name);
        self.factory_bean_objects.remove(bean_name);
        self.singletons.destroy_singleton(bean_name);
        debug!("重置组件定义: {}", bean_name);

        for child in self.registry.children_of(bean_name) {
            if child != bean_name {
                self.reset_bean_definition(&child);
            }
        }
    }

    /// 合并定义是否已缓存
    pub fn is_merged_definition_cached(&self, name: &str) -> bool {
        self.merged.contains(&self.transformed_bean_name(name))
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::BeanFactoryBuilder;
    use di_abstractions::{
        BeanDefinition, BeanDefinitionRegistry, ConfigurableBeanFactory, DefinitionValue,
        SCOPE_PROTOTYPE, SCOPE_SINGLETON,
    };

    #[test]
    fn test_root_definition_is_independent_copy() {
        let factory = BeanFactoryBuilder::new().build();
        let definition = BeanDefinition::for_class_name("Base")
            .with_property("host", DefinitionValue::literal("localhost"));
        factory
            .register_bean_definition("base", definition.clone())
            .unwrap();

        let merged = factory.get_merged_bean_definition("base").unwrap();
        assert_eq!(merged.bean_class_name(), Some("Base"));
        assert_eq!(merged.scope.as_deref(), Some(SCOPE_SINGLETON));

        let mut copy = (*merged).clone();
        copy.property_values
            .add("host", DefinitionValue::literal("changed"));
        let original = factory.get_bean_definition("base").unwrap();
        assert_eq!(
            original.property_values.get("host"),
            Some(&DefinitionValue::literal("localhost"))
        );
        assert!(original.scope.is_none());
    }

    #[test]
    fn test_child_overrides_parent() {
        let factory = BeanFactoryBuilder::new().build();
        factory
            .register_bean_definition("parent", BeanDefinition::for_class_name("Base"))
            .unwrap();
        factory
            .register_bean_definition(
                "child",
                BeanDefinition::for_class_name("Derived").with_parent("parent"),
            )
            .unwrap();

        let merged = factory.get_merged_bean_definition("child").unwrap();
        assert_eq!(merged.bean_class_name(), Some("Derived"));
        assert_eq!(merged.scope.as_deref(), Some(SCOPE_SINGLETON));
        assert!(merged.parent_name.is_none());
    }

    #[test]
    fn test_child_inherits_resolved_parent_scope() {
        let factory = BeanFactoryBuilder::new().build();
        factory
            .register_bean_definition(
                "template",
                BeanDefinition::for_class_name("Base")
                    .with_scope(SCOPE_PROTOTYPE)
                    .with_abstract(true),
            )
            .unwrap();
        factory
            .register_bean_definition("concrete", BeanDefinition::child("template"))
            .unwrap();

        let merged = factory.get_merged_bean_definition("concrete").unwrap();
        assert_eq!(merged.scope.as_deref(), Some(SCOPE_PROTOTYPE));
        assert!(!merged.is_abstract);
    }

    #[test]
    fn test_missing_parent_is_invalid_definition() {
        let factory = BeanFactoryBuilder::new().build();
        factory
            .register_bean_definition("orphan", BeanDefinition::child("missing"))
            .unwrap();
        let error = factory.get_merged_bean_definition("orphan").unwrap_err();
        assert!(matches!(
            error,
            infrastructure_common::DependencyError::InvalidDefinition { .. }
        ));
    }

    #[test]
    fn test_cache_deferred_until_created() {
        let factory = BeanFactoryBuilder::new().build();
        factory
            .register_bean_definition("lazy", BeanDefinition::for_class_name("Lazy"))
            .unwrap();
        factory.get_merged_bean_definition("lazy").unwrap();
        assert!(!factory.is_merged_definition_cached("lazy"));

        factory.mark_bean_as_created("lazy");
        factory.get_merged_bean_definition("lazy").unwrap();
        assert!(factory.is_merged_definition_cached("lazy"));

        factory
            .register_bean_definition("lazy", BeanDefinition::for_class_name("Other"))
            .unwrap();
        assert!(!factory.is_merged_definition_cached("lazy"));
    }
}
