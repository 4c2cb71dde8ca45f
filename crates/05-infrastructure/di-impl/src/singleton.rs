//! 单例注册表
//!
//! 保存完全创建好的单例、提前暴露的引用、依赖关系和销毁回调。
//! 已创建的单例通过无锁的快速路径读取; 单例创建在一把可重入锁下串行进行,
//! 同一线程上的嵌套创建可以重入, 其他线程等待创建完成后直接读到结果。

use crate::tracking;
use dashmap::{DashMap, DashSet};
use di_abstractions::DestructionCallback;
use infrastructure_common::{DependencyError, DependencyResult, EarlyReference, Object, Value};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// 保留的被抑制错误数量上限
const SUPPRESSED_ERRORS_LIMIT: usize = 100;

/// 单例注册表
pub struct DefaultSingletonRegistry {
    owner: Uuid,
    singletons: DashMap<String, Object>,
    early_references: DashMap<String, EarlyReference>,
    registration_order: Mutex<Vec<String>>,
    in_creation: DashSet<String>,
    in_creation_check_exclusions: DashSet<String>,
    creation_lock: ReentrantMutex<()>,
    disposables: Mutex<Vec<(String, DestructionCallback)>>,
    contained_beans: DashMap<String, Vec<String>>,
    dependent_beans: DashMap<String, Vec<String>>,
    dependencies_for_bean: DashMap<String, Vec<String>>,
    suppressed_errors: Mutex<Vec<String>>,
    in_destruction: AtomicBool,
}

impl DefaultSingletonRegistry {
    /// 创建属于指定容器的单例注册表
    pub fn new(owner: Uuid) -> Self {
        Self {
            owner,
            singletons: DashMap::new(),
            early_references: DashMap::new(),
            registration_order: Mutex::new(Vec::new()),
            in_creation: DashSet::new(),
            in_creation_check_exclusions: DashSet::new(),
            creation_lock: ReentrantMutex::new(()),
            disposables: Mutex::new(Vec::new()),
            contained_beans: DashMap::new(),
            dependent_beans: DashMap::new(),
            dependencies_for_bean: DashMap::new(),
            suppressed_errors: Mutex::new(Vec::new()),
            in_destruction: AtomicBool::new(false),
        }
    }

    /// 获取单例创建锁, 同一线程可重入
    pub fn lock_creation(&self) -> ReentrantMutexGuard<'_, ()> {
        self.creation_lock.lock()
    }

    /// 手动注册单例
    pub fn register_singleton(&self, name: &str, object: Object) -> DependencyResult<()> {
        let _lock = self.creation_lock.lock();
        if self.singletons.contains_key(name) {
            return Err(DependencyError::RegistrationError {
                name: name.to_string(),
                message: "已存在同名单例".to_string(),
            });
        }
        self.add_singleton(name, object);
        Ok(())
    }

    /// 保存完全创建好的单例, 并填充提前暴露的引用
    pub fn add_singleton(&self, name: &str, object: Object) {
        self.singletons.insert(name.to_string(), object.clone());
        if let Some((_, reference)) = self.early_references.remove(name) {
            reference.resolve(object);
            trace!("填充提前暴露的单例引用: {}", name);
        }
        let mut order = self.registration_order.lock();
        if !order.iter().any(|existing| existing == name) {
            order.push(name.to_string());
        }
    }

    /// 为正在创建的单例登记提前暴露的引用
    pub fn add_early_reference(&self, name: &str) {
        if self.singletons.contains_key(name) {
            return;
        }
        self.early_references
            .entry(name.to_string())
            .or_insert_with(|| EarlyReference::new(name));
        debug!("提前暴露单例组件引用以解决潜在的循环依赖: {}", name);
    }

    /// 获取已创建的单例
    ///
    /// `allow_early` 时, 若当前线程正在创建该单例, 返回提前暴露的引用。
    pub fn get_singleton(&self, name: &str, allow_early: bool) -> Option<Value> {
        if let Some(object) = self.singletons.get(name) {
            return Some(Value::Object(object.value().clone()));
        }
        if allow_early && tracking::is_in_creation_chain(self.owner, name) {
            return self
                .early_references
                .get(name)
                .map(|reference| Value::Early(reference.value().clone()));
        }
        None
    }

    /// 获取已创建的单例对象
    pub fn get_object(&self, name: &str) -> Option<Object> {
        self.singletons.get(name).map(|object| object.value().clone())
    }

    /// 获取单例, 不存在时在创建锁下调用 `factory` 创建
    pub fn get_or_create<F>(&self, name: &str, factory: F) -> DependencyResult<Object>
    where
        F: FnOnce() -> DependencyResult<Object>,
    {
        let _lock = self.creation_lock.lock();
        if let Some(object) = self.get_object(name) {
            return Ok(object);
        }
        if self.in_destruction.load(Ordering::Acquire) {
            return Err(DependencyError::illegal_state(format!(
                "容器正在销毁单例, 不允许创建单例组件: {}",
                name
            )));
        }
        self.before_singleton_creation(name)?;
        debug!("创建单例组件: {}", name);

        let result = factory();
        self.after_singleton_creation(name);

        match result {
            Ok(object) => {
                self.add_singleton(name, object.clone());
                info!("单例组件创建完成: {}", name);
                Ok(object)
            }
            Err(error) => {
                self.early_references.remove(name);
                Err(error)
            }
        }
    }

    /// 标记单例开始创建, 已在创建中时报告循环依赖
    pub fn before_singleton_creation(&self, name: &str) -> DependencyResult<()> {
        if !self.in_creation_check_exclusions.contains(name) && !self.in_creation.insert(name.to_string()) {
            return Err(DependencyError::CircularDependency {
                name: name.to_string(),
                dependency_chain: tracking::describe_cycle(self.owner, name),
            });
        }
        Ok(())
    }

    /// 清除单例创建标记
    pub fn after_singleton_creation(&self, name: &str) {
        if !self.in_creation_check_exclusions.contains(name) && self.in_creation.remove(name).is_none() {
            warn!("单例组件没有处于创建状态: {}", name);
        }
    }

    /// 排除或恢复创建状态检查
    pub fn set_currently_in_creation(&self, name: &str, in_creation: bool) {
        if in_creation {
            self.in_creation_check_exclusions.remove(name);
        } else {
            self.in_creation_check_exclusions.insert(name.to_string());
        }
    }

    /// 单例是否正在创建 (对所有线程可见)
    pub fn is_in_creation(&self, name: &str) -> bool {
        self.in_creation.contains(name)
    }

    /// 是否包含已创建的单例
    pub fn contains(&self, name: &str) -> bool {
        self.singletons.contains_key(name)
    }

    /// 按注册顺序的单例名
    pub fn names(&self) -> Vec<String> {
        self.registration_order.lock().clone()
    }

    /// 单例数量
    pub fn len(&self) -> usize {
        self.singletons.len()
    }

    /// 是否没有单例
    pub fn is_empty(&self) -> bool {
        self.singletons.is_empty()
    }

    /// 登记销毁回调
    pub fn register_disposable(&self, name: &str, callback: DestructionCallback) {
        let mut disposables = self.disposables.lock();
        disposables.retain(|(existing, _)| existing != name);
        disposables.push((name.to_string(), callback));
    }

    /// 是否登记了销毁回调
    pub fn has_disposable(&self, name: &str) -> bool {
        self.disposables
            .lock()
            .iter()
            .any(|(existing, _)| existing == name)
    }

    /// 登记内部组件: 销毁外部组件时一并销毁
    pub fn register_contained_bean(&self, contained: &str, containing: &str) {
        let mut entry = self.contained_beans.entry(containing.to_string()).or_default();
        if !entry.iter().any(|existing| existing == contained) {
            entry.push(contained.to_string());
        }
        drop(entry);
        self.register_dependent_bean(contained, containing);
    }

    /// 登记依赖关系: `dependent` 依赖 `name`
    pub fn register_dependent_bean(&self, name: &str, dependent: &str) {
        {
            let mut dependents = self.dependent_beans.entry(name.to_string()).or_default();
            if dependents.iter().any(|existing| existing == dependent) {
                return;
            }
            dependents.push(dependent.to_string());
        }
        let mut dependencies = self
            .dependencies_for_bean
            .entry(dependent.to_string())
            .or_default();
        if !dependencies.iter().any(|existing| existing == name) {
            dependencies.push(name.to_string());
        }
        trace!("登记依赖关系: {} 依赖 {}", dependent, name);
    }

    /// `dependent` 是否 (传递地) 依赖 `name`
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let mut seen = HashSet::new();
        self.is_dependent_inner(name, dependent, &mut seen)
    }

    fn is_dependent_inner(&self, name: &str, dependent: &str, seen: &mut HashSet<String>) -> bool {
        if !seen.insert(name.to_string()) {
            return false;
        }
        let dependents = match self.dependent_beans.get(name) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };
        if dependents.iter().any(|existing| existing == dependent) {
            return true;
        }
        dependents
            .iter()
            .any(|transitive| self.is_dependent_inner(transitive, dependent, seen))
    }

    /// 是否有组件依赖该组件
    pub fn has_dependent_bean(&self, name: &str) -> bool {
        self.dependent_beans.contains_key(name)
    }

    /// 依赖该组件的组件
    pub fn dependent_beans(&self, name: &str) -> Vec<String> {
        self.dependent_beans
            .get(name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// 该组件依赖的组件
    pub fn dependencies_for_bean(&self, name: &str) -> Vec<String> {
        self.dependencies_for_bean
            .get(name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// 记录被抑制的错误
    pub fn on_suppressed_error(&self, message: impl Into<String>) {
        let mut suppressed = self.suppressed_errors.lock();
        if suppressed.len() < SUPPRESSED_ERRORS_LIMIT {
            suppressed.push(message.into());
        }
    }

    /// 被抑制的错误
    pub fn suppressed_errors(&self) -> Vec<String> {
        self.suppressed_errors.lock().clone()
    }

    /// 移除单例但不执行销毁回调
    pub fn remove_singleton(&self, name: &str) {
        self.singletons.remove(name);
        self.early_references.remove(name);
        self.registration_order
            .lock()
            .retain(|existing| existing != name);
    }

    /// 销毁单例: 先销毁依赖它的组件, 再执行销毁回调, 最后销毁它包含的内部组件
    pub fn destroy_singleton(&self, name: &str) {
        self.remove_singleton(name);
        let callback = {
            let mut disposables = self.disposables.lock();
            disposables
                .iter()
                .position(|(existing, _)| existing == name)
                .map(|position| disposables.remove(position).1)
        };
        self.destroy_bean(name, callback);
    }

    fn destroy_bean(&self, name: &str, callback: Option<DestructionCallback>) {
        if let Some((_, dependents)) = self.dependent_beans.remove(name) {
            debug!("销毁组件 {} 之前先销毁依赖它的组件: {:?}", name, dependents);
            for dependent in dependents {
                self.destroy_singleton(&dependent);
            }
        }

        if let Some(callback) = callback {
            debug!("执行组件销毁回调: {}", name);
            callback();
        }

        if let Some((_, contained)) = self.contained_beans.remove(name) {
            for inner in contained {
                self.destroy_singleton(&inner);
            }
        }

        let mut emptied = Vec::new();
        for mut entry in self.dependent_beans.iter_mut() {
            entry.value_mut().retain(|dependent| dependent != name);
            if entry.value().is_empty() {
                emptied.push(entry.key().clone());
            }
        }
        for key in emptied {
            self.dependent_beans.remove_if(&key, |_, dependents| dependents.is_empty());
        }
        self.dependencies_for_bean.remove(name);
    }

    /// 按注册的逆序销毁所有单例
    pub fn destroy_singletons(&self) {
        info!("开始销毁所有单例组件");
        self.in_destruction.store(true, Ordering::Release);

        let names: Vec<String> = self
            .disposables
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        for name in names.iter().rev() {
            self.destroy_singleton(name);
        }

        self.contained_beans.clear();
        self.dependent_beans.clear();
        self.dependencies_for_bean.clear();
        self.singletons.clear();
        self.early_references.clear();
        self.registration_order.lock().clear();
        if !self.disposables.lock().is_empty() {
            error!("销毁完成后仍有未执行的销毁回调");
        }
        self.in_destruction.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for DefaultSingletonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultSingletonRegistry")
            .field("singletons", &self.names())
            .field("in_creation", &self.in_creation.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    fn recorder() -> (Arc<StdMutex<Vec<String>>>, impl Fn(&str) -> DestructionCallback) {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &str| -> DestructionCallback {
            let sink = sink.clone();
            let name = name.to_string();
            Box::new(move || sink.lock().unwrap().push(name))
        };
        (log, make)
    }

    #[test]
    fn test_get_or_create_caches() {
        let registry = DefaultSingletonRegistry::new(Uuid::new_v4());
        let first = registry
            .get_or_create("service", || Ok(Arc::new(1u8) as Object))
            .unwrap();
        let second = registry
            .get_or_create("service", || panic!("不应再次创建"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.names(), vec!["service"]);
    }

    #[test]
    fn test_reentrant_creation_is_circular() {
        let registry = DefaultSingletonRegistry::new(Uuid::new_v4());
        let error = registry
            .get_or_create("a", || registry.get_or_create("a", || Ok(Arc::new(()) as Object)))
            .unwrap_err();
        assert!(error.is_circular());
        assert!(!registry.is_in_creation("a"));
        assert!(!registry.contains("a"));
    }

    #[test]
    fn test_early_reference_resolved_on_completion() {
        let owner = Uuid::new_v4();
        let registry = DefaultSingletonRegistry::new(owner);
        let _chain = tracking::enter_creation(owner, "a");
        registry.add_early_reference("a");

        let early = match registry.get_singleton("a", true) {
            Some(Value::Early(reference)) => reference,
            other => panic!("期望提前引用, 实际 {:?}", other),
        };
        assert!(registry.get_singleton("a", false).is_none());

        registry.add_singleton("a", Arc::new(7u32));
        assert_eq!(early.get().and_then(|object| object.downcast_ref::<u32>()), Some(&7));
    }

    #[test]
    fn test_destroy_cascades_to_dependents_first() {
        let registry = DefaultSingletonRegistry::new(Uuid::new_v4());
        let (log, callback) = recorder();
        for name in ["db", "repo", "service"] {
            registry.add_singleton(name, Arc::new(()));
            registry.register_disposable(name, callback(name));
        }
        registry.register_dependent_bean("db", "repo");
        registry.register_dependent_bean("repo", "service");
        assert!(registry.is_dependent("db", "service"));

        registry.destroy_singleton("db");
        assert_eq!(*log.lock().unwrap(), vec!["service", "repo", "db"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_destroy_singletons_in_reverse_order() {
        let registry = DefaultSingletonRegistry::new(Uuid::new_v4());
        let (log, callback) = recorder();
        for name in ["first", "second", "third"] {
            registry.add_singleton(name, Arc::new(()));
            registry.register_disposable(name, callback(name));
        }
        registry.destroy_singletons();
        assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
        assert!(registry.names().is_empty());
    }
}
