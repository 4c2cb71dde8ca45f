//! 元数据定义
//!
//! 提供类型的元数据信息

use std::any::TypeId;
use std::hash::{Hash, Hasher};

/// 类型信息
///
/// 既可以描述一个具体的 Rust 类型 (带 `TypeId`),
/// 也可以只通过名称描述一个运行时类 (例如接口或动态类)。
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// 类型名称
    pub name: String,
    /// 类型ID
    pub id: Option<TypeId>,
    /// 模块路径
    pub module_path: String,
}

impl TypeInfo {
    /// 创建新的类型信息
    pub fn new(type_id: TypeId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            module_path: name.clone(),
            name,
            id: Some(type_id),
        }
    }

    /// 从类型获取类型信息
    pub fn of<T: ?Sized + 'static>() -> Self {
        let full_name = std::any::type_name::<T>();
        Self {
            name: short_type_name(full_name).to_string(),
            id: Some(TypeId::of::<T>()),
            module_path: full_name.to_string(),
        }
    }

    /// 仅通过名称创建类型信息 (用于配置或接口)
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            module_path: name.clone(),
            name,
            id: None,
        }
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &str {
        short_type_name(&self.name)
    }

    /// 是否描述了类型 `T`
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == Some(TypeId::of::<T>())
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        match (self.id, other.id) {
            (Some(left), Some(right)) => left == right,
            _ => self.name == other.name,
        }
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// 去掉模块路径的类型名称, 泛型参数保留短名称
fn short_type_name(full_name: &str) -> &str {
    let head = full_name.split('<').next().unwrap_or(full_name);
    match head.rfind("::") {
        Some(index) => &full_name[index + 2..],
        None => full_name,
    }
}
