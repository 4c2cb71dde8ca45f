//! # Infrastructure Common
//!
//! Lorn IoC 容器各层共享的基础类型。
//!
//! ## 核心组件
//!
//! - [`DependencyError`] 等错误体系
//! - [`TypeInfo`] - 类型信息
//! - [`Object`] / [`Value`] - 组件实例句柄与注入值
//! - [`EarlyReference`] / [`Deferred`] - 循环依赖中的提前引用与延迟访问
//! - [`TypeConverter`] - 注入值类型转换
//! - [`Throwable`] - 代理方法调用的异常模型
//! - [`ScopeContext`] / [`ScopeGuard`] - 作用域上下文

pub mod conversion;
pub mod errors;
pub mod exception;
pub mod lifecycle;
pub mod metadata;
pub mod ordering;
pub mod value;

pub use conversion::*;
pub use errors::*;
pub use exception::*;
pub use lifecycle::*;
pub use metadata::*;
pub use ordering::*;
pub use value::*;
