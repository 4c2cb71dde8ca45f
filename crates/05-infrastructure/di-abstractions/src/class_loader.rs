//! 类加载
//!
//! 组件定义可以只记录类名, 容器在需要时通过 [`ClassLoader`] 解析出 [`BeanClass`]。

use crate::class::{BeanClass, DynamicObject};
use dashmap::{DashMap, DashSet};
use infrastructure_common::Object;
use std::any::TypeId;
use std::sync::Arc;
use tracing::{debug, trace};

/// 类加载器
pub trait ClassLoader: Send + Sync {
    /// 按名称加载类
    fn load_class(&self, name: &str) -> Option<Arc<BeanClass>>;

    /// 按实例类型查找类
    fn class_for_type_id(&self, type_id: TypeId) -> Option<Arc<BeanClass>>;

    /// 加载器名称, 用于日志
    fn loader_name(&self) -> &str {
        "ClassLoader"
    }
}

/// 默认类加载器: 显式登记的类表
#[derive(Debug, Default)]
pub struct ClassRegistry {
    by_name: DashMap<String, Arc<BeanClass>>,
    by_type: DashMap<TypeId, Arc<BeanClass>>,
}

impl ClassRegistry {
    /// 创建新的类表
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记类, 同名的类会被替换
    pub fn register(&self, class: Arc<BeanClass>) -> Arc<BeanClass> {
        debug!("登记组件类: {}", class.name());
        if let Some(type_id) = class.type_id().filter(|_| !class.is_dynamic()) {
            self.by_type.insert(type_id, class.clone());
        }
        self.by_name.insert(class.name().to_string(), class.clone());
        class
    }

    /// 已登记的类名
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// 已登记的类数量
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// 是否没有登记任何类
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl ClassLoader for ClassRegistry {
    fn load_class(&self, name: &str) -> Option<Arc<BeanClass>> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }

    fn class_for_type_id(&self, type_id: TypeId) -> Option<Arc<BeanClass>> {
        self.by_type.get(&type_id).map(|entry| entry.value().clone())
    }

    fn loader_name(&self) -> &str {
        "ClassRegistry"
    }
}

/// 临时类加载器
///
/// 仅用于类型探测: 通过它解析的类只缓存在它自己的表里,
/// 不会写回组件定义, 容器丢弃它时所有探测结果一并丢弃。
pub struct TemporaryClassLoader {
    parent: Arc<dyn ClassLoader>,
    excluded: DashSet<String>,
    loaded: DashMap<String, Arc<BeanClass>>,
}

impl TemporaryClassLoader {
    /// 创建委托给父加载器的临时加载器
    pub fn new(parent: Arc<dyn ClassLoader>) -> Self {
        Self {
            parent,
            excluded: DashSet::new(),
            loaded: DashMap::new(),
        }
    }

    /// 排除的类总是直接委托给父加载器, 不进入临时缓存
    pub fn exclude_class(&self, name: impl Into<String>) {
        self.excluded.insert(name.into());
    }

    /// 临时缓存中的类数量
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// 清空临时缓存
    pub fn clear(&self) {
        self.loaded.clear();
    }
}

impl ClassLoader for TemporaryClassLoader {
    fn load_class(&self, name: &str) -> Option<Arc<BeanClass>> {
        if self.excluded.contains(name) {
            return self.parent.load_class(name);
        }
        if let Some(class) = self.loaded.get(name) {
            return Some(class.value().clone());
        }
        let class = self.parent.load_class(name)?;
        trace!("临时类加载器解析类: {}", name);
        self.loaded.insert(name.to_string(), class.clone());
        Some(class)
    }

    fn class_for_type_id(&self, type_id: TypeId) -> Option<Arc<BeanClass>> {
        self.parent.class_for_type_id(type_id)
    }

    fn loader_name(&self) -> &str {
        "TemporaryClassLoader"
    }
}

/// 解析任意对象的运行时类
pub fn class_of(object: &Object, class_loader: &dyn ClassLoader) -> Option<Arc<BeanClass>> {
    if let Some(dynamic) = object.downcast_ref::<DynamicObject>() {
        return Some(dynamic.class().clone());
    }
    class_loader.class_for_type_id((**object).type_id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Repository;

    #[test]
    fn test_registry_lookup_by_name_and_type() {
        let registry = ClassRegistry::new();
        registry.register(
            BeanClass::builder::<Repository>("Repository")
                .default_constructor()
                .build(),
        );

        assert!(registry.load_class("Repository").is_some());
        assert!(registry.load_class("Missing").is_none());

        let object: Object = Arc::new(Repository);
        let class = class_of(&object, &registry).unwrap();
        assert_eq!(class.name(), "Repository");
    }

    #[test]
    fn test_temporary_loader_does_not_touch_parent() {
        let registry = Arc::new(ClassRegistry::new());
        registry.register(BeanClass::builder::<Repository>("Repository").build());

        let temporary = TemporaryClassLoader::new(registry.clone());
        assert!(temporary.load_class("Repository").is_some());
        assert_eq!(temporary.loaded_count(), 1);

        temporary.exclude_class("Other");
        assert!(temporary.load_class("Other").is_none());
        assert_eq!(temporary.loaded_count(), 1);

        temporary.clear();
        assert_eq!(temporary.loaded_count(), 0);
        assert_eq!(registry.len(), 1);
    }
}
