//! 自定义作用域接口

use infrastructure_common::{DependencyResult, Object, ScopeError};

/// 销毁回调
pub type DestructionCallback = Box<dyn FnOnce() + Send>;

/// 作用域: 单例和原型之外的实例存储策略
pub trait Scope: Send + Sync {
    /// 从作用域获取对象, 不存在时调用 `object_factory` 创建并保存
    fn get(
        &self,
        name: &str,
        object_factory: &dyn Fn() -> DependencyResult<Object>,
    ) -> Result<Object, ScopeError>;

    /// 移除对象, 同时丢弃它的销毁回调
    fn remove(&self, name: &str) -> Option<Object>;

    /// 登记对象的销毁回调, 作用域结束时执行
    fn register_destruction_callback(
        &self,
        name: &str,
        callback: DestructionCallback,
    ) -> Result<(), ScopeError>;

    /// 解析上下文对象
    fn resolve_contextual_object(&self, _key: &str) -> Option<Object> {
        None
    }

    /// 当前会话标识
    fn conversation_id(&self) -> Option<String> {
        None
    }
}
