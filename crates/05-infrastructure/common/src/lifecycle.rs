//! 作用域上下文生命周期

use serde::Serialize;

/// 作用域上下文
///
/// 描述一次被显式激活的作用域 (例如一次请求或一次会话)。
#[derive(Debug, Clone, Serialize)]
pub struct ScopeContext {
    /// 上下文标识
    pub id: uuid::Uuid,
    /// 上下文名称
    pub name: String,
    /// 激活时间
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ScopeContext {
    /// 创建新作用域上下文
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            created_at: chrono::Utc::now(),
        }
    }

    /// 创建子作用域上下文
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self::new(format!("{}.{}", self.name, name.into()))
    }

    /// 上下文已存活的时长
    pub fn age(&self) -> chrono::Duration {
        chrono::Utc::now() - self.created_at
    }
}

/// 作用域守卫
///
/// 离开作用域时执行清理回调。守卫不能跨线程移动,
/// 清理回调总是在激活该作用域的线程上执行。
pub struct ScopeGuard {
    context: ScopeContext,
    cleanup: Option<Box<dyn FnOnce()>>,
}

impl ScopeGuard {
    /// 创建新的作用域守卫
    pub fn new(context: ScopeContext, cleanup: Box<dyn FnOnce()>) -> Self {
        Self {
            context,
            cleanup: Some(cleanup),
        }
    }

    /// 获取作用域上下文
    pub fn context(&self) -> &ScopeContext {
        &self.context
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl std::fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_guard_runs_cleanup_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        {
            let guard = ScopeGuard::new(
                ScopeContext::new("request"),
                Box::new(move || counter.set(counter.get() + 1)),
            );
            assert_eq!(guard.context().name, "request");
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_child_context_name() {
        let root = ScopeContext::new("session");
        let child = root.child("request");
        assert_eq!(child.name, "session.request");
        assert_ne!(root.id, child.id);
    }
}
