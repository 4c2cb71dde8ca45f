//! 错误类型定义

use thiserror::Error;

/// 装箱的底层错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {source}")]
    ParseError { source: BoxError },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },

    #[error("配置序列化失败: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("配置键不存在: {key}")]
    KeyNotFound { key: String },

    #[error("配置类型转换失败: {message}")]
    TypeConversionError { message: String },

    #[error("无法解析占位符 '{placeholder}' (值: \"{value}\")")]
    UnresolvablePlaceholder { placeholder: String, value: String },
}

impl ConfigError {
    /// 创建解析错误
    pub fn parse(source: impl Into<BoxError>) -> Self {
        Self::ParseError {
            source: source.into(),
        }
    }
}

/// 值转换错误类型
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("无法将值 '{value}' 转换为类型 {target}: {message}")]
    Failed {
        value: String,
        target: String,
        message: String,
    },

    #[error("空值不能转换为类型 {target}")]
    NullValue { target: String },

    #[error("组件 '{name}' 尚未完成初始化, 只能通过延迟引用 (Deferred) 访问")]
    EarlyReference { name: String },

    #[error("值类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("没有为类型 {target} 注册转换器")]
    Unsupported { target: String },
}

impl ConversionError {
    /// 创建转换失败错误
    pub fn failed(
        value: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Failed {
            value: value.into(),
            target: target.into(),
            message: message.into(),
        }
    }

    /// 创建类型不匹配错误
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// 依赖注入错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("组件未注册: {name}")]
    ComponentNotRegistered { name: String },

    #[error("组件定义是抽象的, 不能直接实例化: {name}")]
    ComponentIsAbstract { name: String },

    #[error("检测到循环依赖: {name}, 依赖链: {dependency_chain}")]
    CircularDependency {
        name: String,
        dependency_chain: String,
    },

    #[error("组件创建失败: {name}, 原因: {source}")]
    ComponentCreationFailed { name: String, source: BoxError },

    #[error("组件类型不匹配: {name}, 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("作用域 '{scope}' 在当前执行上下文中未激活: {name}, {message}")]
    ScopeNotActive {
        name: String,
        scope: String,
        message: String,
    },

    #[error("组件定义无效: {name}, 原因: {message}")]
    InvalidDefinition { name: String, message: String },

    #[error("组件不是工厂组件: {name}, 实际类型: {actual}")]
    NotAFactory { name: String, actual: String },

    #[error("无法解析组件类: {name}, 类名: {class_name}, 原因: {message}")]
    ClassNotFound {
        name: String,
        class_name: String,
        message: String,
    },

    #[error("未注册的作用域: {scope}")]
    NoSuchScope { scope: String },

    #[error("依赖未满足: {name}, 属性: {property}, 原因: {message}")]
    UnsatisfiedDependency {
        name: String,
        property: String,
        message: String,
    },

    #[error("找到多个候选组件: 类型 {type_name}, 候选: {candidates:?}")]
    NoUniqueComponent {
        type_name: String,
        candidates: Vec<String>,
    },

    #[error("组件注册失败: {name}, 原因: {message}")]
    RegistrationError { name: String, message: String },

    #[error("组件 '{name}' 的值转换失败: {source}")]
    Conversion {
        name: String,
        source: ConversionError,
    },

    #[error("容器状态非法: {message}")]
    IllegalState { message: String },
}

impl DependencyError {
    /// 创建组件未注册错误
    pub fn not_registered(name: impl Into<String>) -> Self {
        Self::ComponentNotRegistered { name: name.into() }
    }

    /// 创建组件定义无效错误
    pub fn invalid_definition(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.into(),
            message: message.into(),
        }
    }

    /// 创建组件创建失败错误
    pub fn creation_failed(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::ComponentCreationFailed {
            name: name.into(),
            source: source.into(),
        }
    }

    /// 创建状态非法错误
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// 错误链中是否包含"组件未注册"
    pub fn is_not_found(&self) -> bool {
        self.find(|e| matches!(e, Self::ComponentNotRegistered { .. }))
            .is_some()
    }

    /// 错误链中是否包含循环依赖
    pub fn is_circular(&self) -> bool {
        self.find(|e| matches!(e, Self::CircularDependency { .. }))
            .is_some()
    }

    /// 错误链中第一个循环依赖的依赖链描述
    pub fn circular_chain(&self) -> Option<&str> {
        match self.find(|e| matches!(e, Self::CircularDependency { .. })) {
            Some(Self::CircularDependency {
                dependency_chain, ..
            }) => Some(dependency_chain.as_str()),
            _ => None,
        }
    }

    /// 最底层的错误原因
    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        let mut current: &(dyn std::error::Error + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    fn find(&self, predicate: impl Fn(&Self) -> bool) -> Option<&Self> {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(error) = current {
            if let Some(dependency) = error.downcast_ref::<Self>() {
                if predicate(dependency) {
                    return Some(dependency);
                }
            }
            current = error.source();
        }
        None
    }
}

/// 作用域错误类型
#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("作用域 '{scope}' 未激活: {message}")]
    NotActive { scope: String, message: String },

    #[error("作用域对象创建失败: {0}")]
    Creation(#[from] DependencyError),
}

/// AOP 错误类型
#[derive(Error, Debug)]
pub enum AopError {
    #[error("AOP 配置错误: {message}")]
    Config { message: String },

    #[error("未知的通知类型: {advice}")]
    UnknownAdviceType { advice: String },

    #[error("参数非法: {message}")]
    IllegalArgument { message: String },
}

impl AopError {
    /// 创建 AOP 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 创建参数非法错误
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            message: message.into(),
        }
    }
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("依赖注入错误: {source}")]
    DependencyError {
        #[from]
        source: DependencyError,
    },

    #[error("AOP 错误: {source}")]
    AopError {
        #[from]
        source: AopError,
    },

    #[error("基础设施启动失败: {message}")]
    BootstrapFailed { message: String },

    #[error("基础设施关闭失败: {message}")]
    ShutdownFailed { message: String },
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type ConversionResult<T> = Result<T, ConversionError>;
pub type AopResult<T> = Result<T, AopError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
