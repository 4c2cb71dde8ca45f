//! 内置的自定义作用域
//!
//! - [`ThreadScope`]: 每个线程一份实例
//! - [`ContextScope`]: 显式开启和结束的上下文 (例如一次请求), 结束时执行销毁回调

use di_abstractions::{DestructionCallback, Scope};
use infrastructure_common::{DependencyResult, Object, ScopeContext, ScopeError, ScopeGuard};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// 线程作用域的常用注册名
pub const SCOPE_THREAD: &str = "thread";

thread_local! {
    static THREAD_OBJECTS: RefCell<HashMap<(Uuid, String), Object>> = RefCell::new(HashMap::new());
    static ACTIVE_CONTEXTS: RefCell<Vec<ActiveContext>> = RefCell::new(Vec::new());
}

/// 线程作用域
///
/// 不支持销毁回调: 线程结束时实例随线程局部存储一起释放。
#[derive(Debug)]
pub struct ThreadScope {
    id: Uuid,
}

impl ThreadScope {
    /// 创建线程作用域
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Default for ThreadScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for ThreadScope {
    fn get(
        &self,
        name: &str,
        object_factory: &dyn Fn() -> DependencyResult<Object>,
    ) -> Result<Object, ScopeError> {
        let key = (self.id, name.to_string());
        let cached = THREAD_OBJECTS.with(|objects| objects.borrow().get(&key).cloned());
        if let Some(object) = cached {
            return Ok(object);
        }
        let object = object_factory()?;
        trace!("线程作用域保存组件: {}", name);
        THREAD_OBJECTS.with(|objects| objects.borrow_mut().insert(key, object.clone()));
        Ok(object)
    }

    fn remove(&self, name: &str) -> Option<Object> {
        THREAD_OBJECTS.with(|objects| objects.borrow_mut().remove(&(self.id, name.to_string())))
    }

    fn register_destruction_callback(
        &self,
        name: &str,
        _callback: DestructionCallback,
    ) -> Result<(), ScopeError> {
        warn!("线程作用域不支持销毁回调, 组件 {} 的销毁回调不会被执行", name);
        Ok(())
    }

    fn conversation_id(&self) -> Option<String> {
        Some(format!("{:?}", std::thread::current().id()))
    }
}

struct ActiveContext {
    scope_id: Uuid,
    context: ScopeContext,
    objects: HashMap<String, Object>,
    callbacks: Vec<(String, DestructionCallback)>,
}

/// 上下文作用域
///
/// 通过 [`ContextScope::begin`] 在当前线程上开启上下文, 守卫被丢弃时结束上下文,
/// 按登记的逆序执行销毁回调。没有活动上下文时获取组件会报告作用域未激活。
#[derive(Debug, Clone)]
pub struct ContextScope {
    name: String,
    id: Uuid,
}

impl ContextScope {
    /// 创建上下文作用域
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
        }
    }

    /// 作用域名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 在当前线程上开启新的上下文
    pub fn begin(&self) -> ScopeGuard {
        let context = match self.current_context() {
            Some(outer) => outer.child(&self.name),
            None => ScopeContext::new(self.name.clone()),
        };
        debug!("开启作用域上下文 '{}': {}", context.name, context.id);
        ACTIVE_CONTEXTS.with(|stack| {
            stack.borrow_mut().push(ActiveContext {
                scope_id: self.id,
                context: context.clone(),
                objects: HashMap::new(),
                callbacks: Vec::new(),
            })
        });
        let (scope_id, context_id) = (self.id, context.id);
        ScopeGuard::new(context, Box::new(move || end_context(scope_id, context_id)))
    }

    /// 当前线程上是否有活动的上下文
    pub fn is_active(&self) -> bool {
        self.with_active(|_| ()).is_some()
    }

    /// 当前线程上最内层的活动上下文
    pub fn current_context(&self) -> Option<ScopeContext> {
        self.with_active(|active| active.context.clone())
    }

    fn with_active<R>(&self, f: impl FnOnce(&mut ActiveContext) -> R) -> Option<R> {
        ACTIVE_CONTEXTS.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack
                .iter_mut()
                .rev()
                .find(|active| active.scope_id == self.id)
                .map(f)
        })
    }

    fn not_active(&self) -> ScopeError {
        ScopeError::NotActive {
            scope: self.name.clone(),
            message: "当前线程上没有活动的作用域上下文".to_string(),
        }
    }
}

fn end_context(scope_id: Uuid, context_id: Uuid) {
    let ended = ACTIVE_CONTEXTS.with(|stack| {
        let mut stack = stack.borrow_mut();
        let position = stack
            .iter()
            .rposition(|active| active.scope_id == scope_id && active.context.id == context_id)?;
        Some(stack.remove(position))
    });
    let Some(ended) = ended else {
        return;
    };
    debug!(
        "结束作用域上下文 '{}': {}, 共 {} 个组件",
        ended.context.name,
        ended.context.id,
        ended.objects.len()
    );
    for (name, callback) in ended.callbacks.into_iter().rev() {
        trace!("执行作用域组件的销毁回调: {}", name);
        callback();
    }
}

impl Scope for ContextScope {
    fn get(
        &self,
        name: &str,
        object_factory: &dyn Fn() -> DependencyResult<Object>,
    ) -> Result<Object, ScopeError> {
        let cached = self
            .with_active(|active| active.objects.get(name).cloned())
            .ok_or_else(|| self.not_active())?;
        if let Some(object) = cached {
            return Ok(object);
        }
        let object = object_factory()?;
        self.with_active(|active| {
            active
                .objects
                .entry(name.to_string())
                .or_insert(object)
                .clone()
        })
        .ok_or_else(|| self.not_active())
    }

    fn remove(&self, name: &str) -> Option<Object> {
        self.with_active(|active| {
            active.callbacks.retain(|(registered, _)| registered != name);
            active.objects.remove(name)
        })
        .flatten()
    }

    fn register_destruction_callback(
        &self,
        name: &str,
        callback: DestructionCallback,
    ) -> Result<(), ScopeError> {
        self.with_active(|active| {
            active.callbacks.retain(|(registered, _)| registered != name);
            active.callbacks.push((name.to_string(), callback));
        })
        .ok_or_else(|| self.not_active())
    }

    fn resolve_contextual_object(&self, key: &str) -> Option<Object> {
        let context = self.current_context()?;
        match key {
            "context" => Some(Arc::new(context) as Object),
            "context_id" => Some(Arc::new(context.id.to_string()) as Object),
            _ => None,
        }
    }

    fn conversation_id(&self) -> Option<String> {
        self.current_context().map(|context| context.id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_factory(counter: &Arc<AtomicUsize>) -> impl Fn() -> DependencyResult<Object> {
        let counter = counter.clone();
        move || {
            let value = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(value) as Object)
        }
    }

    #[test]
    fn test_thread_scope_is_per_thread() {
        let scope = Arc::new(ThreadScope::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(&counter);

        let first = scope.get("session", &factory).unwrap();
        let second = scope.get("session", &factory).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other_scope = scope.clone();
        let other_counter = counter.clone();
        std::thread::spawn(move || {
            let factory = counting_factory(&other_counter);
            other_scope.get("session", &factory).unwrap();
        })
        .join()
        .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_context_scope_requires_active_context() {
        let scope = ContextScope::new("request");
        let counter = Arc::new(AtomicUsize::new(0));
        let error = scope.get("handler", &counting_factory(&counter)).unwrap_err();
        assert!(matches!(error, ScopeError::NotActive { .. }));
        assert!(!scope.is_active());
    }

    #[test]
    fn test_context_end_runs_callbacks_in_reverse() {
        let scope = ContextScope::new("request");
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let guard = scope.begin();
            assert!(scope.is_active());
            assert_eq!(
                scope.conversation_id(),
                Some(guard.context().id.to_string())
            );
            scope.get("first", &counting_factory(&counter)).unwrap();
            scope.get("second", &counting_factory(&counter)).unwrap();
            for name in ["first", "second"] {
                let order = order.clone();
                scope
                    .register_destruction_callback(name, Box::new(move || order.lock().push(name)))
                    .unwrap();
            }
        }

        assert!(!scope.is_active());
        assert_eq!(*order.lock(), vec!["second", "first"]);
    }

    #[test]
    fn test_remove_drops_callback() {
        let scope = ContextScope::new("request");
        let fired = Arc::new(AtomicUsize::new(0));
        let guard = scope.begin();
        let counter = Arc::new(AtomicUsize::new(0));
        scope.get("handler", &counting_factory(&counter)).unwrap();
        let fired_clone = fired.clone();
        scope
            .register_destruction_callback(
                "handler",
                Box::new(move || {
                    fired_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert!(scope.remove("handler").is_some());
        drop(guard);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
