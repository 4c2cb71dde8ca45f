//! 值解析器接口
//!
//! 字面量在注入前依次经过内嵌值解析器 (占位符) 和表达式解析器处理。

use infrastructure_common::Value;

/// 字符串值解析器
pub trait StringValueResolver: Send + Sync {
    /// 解析字符串中的内嵌值
    fn resolve_string_value(&self, value: &str) -> anyhow::Result<String>;
}

impl<F> StringValueResolver for F
where
    F: Fn(&str) -> anyhow::Result<String> + Send + Sync,
{
    fn resolve_string_value(&self, value: &str) -> anyhow::Result<String> {
        self(value)
    }
}

/// 表达式解析上下文
#[derive(Debug, Clone)]
pub struct ExpressionContext {
    /// 正在创建的组件名
    pub bean_name: String,
    /// 组件的作用域
    pub scope: String,
}

/// 表达式解析器
pub trait ExpressionResolver: Send + Sync {
    /// 计算字面量, 不是表达式时原样返回文本值
    fn evaluate(&self, value: &str, context: &ExpressionContext) -> anyhow::Result<Value>;
}
