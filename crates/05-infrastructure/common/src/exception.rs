//! 方法调用异常模型
//!
//! 代理方法调用失败时抛出 [`Throwable`]。每个异常都属于一个 [`ExceptionKind`],
//! 异常种类通过显式的父种类链组织成层级结构, 根种类固定为 `Throwable`。

use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 根异常种类名称
pub const THROWABLE: &str = "Throwable";

static THROWABLE_KIND: Lazy<Arc<ExceptionKind>> = Lazy::new(|| {
    Arc::new(ExceptionKind {
        name: THROWABLE.to_string(),
        parent: None,
    })
});

static EXCEPTION_KIND: Lazy<Arc<ExceptionKind>> =
    Lazy::new(|| ExceptionKind::new("Exception", &THROWABLE_KIND));

static RUNTIME_EXCEPTION_KIND: Lazy<Arc<ExceptionKind>> =
    Lazy::new(|| ExceptionKind::new("RuntimeException", &EXCEPTION_KIND));

static ILLEGAL_ARGUMENT_KIND: Lazy<Arc<ExceptionKind>> =
    Lazy::new(|| ExceptionKind::new("IllegalArgumentException", &RUNTIME_EXCEPTION_KIND));

static ILLEGAL_STATE_KIND: Lazy<Arc<ExceptionKind>> =
    Lazy::new(|| ExceptionKind::new("IllegalStateException", &RUNTIME_EXCEPTION_KIND));

static UNSUPPORTED_OPERATION_KIND: Lazy<Arc<ExceptionKind>> =
    Lazy::new(|| ExceptionKind::new("UnsupportedOperationException", &RUNTIME_EXCEPTION_KIND));

/// 异常种类
#[derive(Debug, PartialEq, Eq)]
pub struct ExceptionKind {
    name: String,
    parent: Option<Arc<ExceptionKind>>,
}

impl ExceptionKind {
    /// 在给定父种类下创建新的异常种类
    pub fn new(name: impl Into<String>, parent: &Arc<ExceptionKind>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: Some(parent.clone()),
        })
    }

    /// 根种类 `Throwable`
    pub fn throwable() -> Arc<Self> {
        THROWABLE_KIND.clone()
    }

    /// `Exception`
    pub fn exception() -> Arc<Self> {
        EXCEPTION_KIND.clone()
    }

    /// `RuntimeException`
    pub fn runtime_exception() -> Arc<Self> {
        RUNTIME_EXCEPTION_KIND.clone()
    }

    /// `IllegalArgumentException`
    pub fn illegal_argument() -> Arc<Self> {
        ILLEGAL_ARGUMENT_KIND.clone()
    }

    /// `IllegalStateException`
    pub fn illegal_state() -> Arc<Self> {
        ILLEGAL_STATE_KIND.clone()
    }

    /// `UnsupportedOperationException`
    pub fn unsupported_operation() -> Arc<Self> {
        UNSUPPORTED_OPERATION_KIND.clone()
    }

    /// 种类名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 父种类
    pub fn parent(&self) -> Option<&Arc<ExceptionKind>> {
        self.parent.as_ref()
    }

    /// 是否为根种类
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// 从自身开始沿父链向上遍历, 直到根种类
    pub fn lineage(&self) -> Lineage<'_> {
        Lineage {
            current: Some(self),
        }
    }

    /// 是否为给定种类或其子种类
    pub fn is_a(&self, name: &str) -> bool {
        self.lineage().any(|kind| kind.name == name)
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// 异常种类父链迭代器
pub struct Lineage<'a> {
    current: Option<&'a ExceptionKind>,
}

impl<'a> Iterator for Lineage<'a> {
    type Item = &'a ExceptionKind;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.parent.as_deref();
        Some(current)
    }
}

/// 方法调用抛出的异常
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct Throwable {
    kind: Arc<ExceptionKind>,
    message: String,
    #[source]
    cause: Option<Box<Throwable>>,
}

impl Throwable {
    /// 创建新的异常
    pub fn new(kind: Arc<ExceptionKind>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// `IllegalArgumentException`
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::illegal_argument(), message)
    }

    /// `IllegalStateException`
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::illegal_state(), message)
    }

    /// `UnsupportedOperationException`
    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::unsupported_operation(), message)
    }

    /// 附加原因
    pub fn with_cause(mut self, cause: Throwable) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 异常种类
    pub fn kind(&self) -> &Arc<ExceptionKind> {
        &self.kind
    }

    /// 异常消息
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 原因
    pub fn cause(&self) -> Option<&Throwable> {
        self.cause.as_deref()
    }

    /// 是否为给定种类或其子种类
    pub fn is_a(&self, kind_name: &str) -> bool {
        self.kind.is_a(kind_name)
    }
}
