//! 注入值模型
//!
//! [`Object`] 是容器管理的组件实例的统一句柄, [`Value`] 是解析后的注入值。
//! 单例在循环依赖解析期间以 [`EarlyReference`] 的形式提前暴露,
//! 只有通过 [`Deferred`] 声明延迟访问的使用方才能接收它。

use crate::conversion::TypeConverter;
use crate::errors::{ConversionError, ConversionResult};
use crate::metadata::TypeInfo;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 组件实例句柄
pub type Object = Arc<dyn Any + Send + Sync>;

/// 提前暴露的单例引用
///
/// 目标单例完成初始化后, 引用被填充一次, 之后保持不变。
#[derive(Clone)]
pub struct EarlyReference {
    name: String,
    cell: Arc<OnceCell<Object>>,
}

impl EarlyReference {
    /// 为正在创建的组件创建尚未填充的引用
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// 组件名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 填充最终实例, 已填充时返回 `false`
    pub fn resolve(&self, object: Object) -> bool {
        self.cell.set(object).is_ok()
    }

    /// 是否已填充
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    /// 获取最终实例
    pub fn get(&self) -> Option<&Object> {
        self.cell.get()
    }
}

impl fmt::Debug for EarlyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EarlyReference")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// 解析后的注入值
#[derive(Clone, Debug)]
pub enum Value {
    /// 空值
    Null,
    /// 尚未转换的字面量
    Text(String),
    /// 组件实例或任意对象
    Object(Object),
    /// 尚未完成初始化的单例
    Early(EarlyReference),
    /// 列表
    List(Vec<Value>),
    /// 有序映射
    Map(Vec<(String, Value)>),
}

impl Value {
    /// 包装任意对象
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Arc::new(value))
    }

    /// 字面量
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// 是否为空值
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 值种类描述, 用于错误信息
    pub fn describe(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Text(text) => format!("文本 \"{}\"", text),
            Self::Object(object) => format!("对象 {:?}", (**object).type_id()),
            Self::Early(reference) => format!("提前引用 '{}'", reference.name()),
            Self::List(items) => format!("列表[{}]", items.len()),
            Self::Map(entries) => format!("映射[{}]", entries.len()),
        }
    }

    /// 转换为目标类型
    pub fn convert<T: FromValue>(self, converter: &dyn TypeConverter) -> ConversionResult<T> {
        T::from_value(self, converter)
    }
}

/// 延迟访问的组件引用
///
/// 允许在循环依赖中引用尚未完成初始化的单例。目标完成初始化之前,
/// [`Deferred::get`] 返回 `None`。
pub struct Deferred<T> {
    name: Option<String>,
    cell: Arc<OnceCell<Object>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Deferred<T> {
    /// 已就绪的引用
    pub fn ready(object: Object) -> Self {
        Self {
            name: None,
            cell: Arc::new(OnceCell::with_value(object)),
            _marker: PhantomData,
        }
    }

    /// 指向提前暴露单例的引用
    pub fn early(reference: &EarlyReference) -> Self {
        Self {
            name: Some(reference.name.clone()),
            cell: reference.cell.clone(),
            _marker: PhantomData,
        }
    }

    /// 目标是否已完成初始化
    pub fn is_ready(&self) -> bool {
        self.cell.get().is_some()
    }

    /// 引用的组件名称 (仅提前引用有名称)
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 获取类型化的目标实例
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell
            .get()
            .and_then(|object| object.clone().downcast::<T>().ok())
    }

    /// 获取未类型化的目标实例 (目标可能被代理包装)
    pub fn object(&self) -> Option<Object> {
        self.cell.get().cloned()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            cell: self.cell.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("name", &self.name)
            .field("ready", &self.cell.get().is_some())
            .finish()
    }
}

/// 从注入值构造类型化的值
pub trait FromValue: Sized {
    /// 注入点声明的类型, 用于按类型自动装配
    fn type_info() -> TypeInfo;

    /// 是否为简单类型 (基础类型、字符串)
    fn is_simple() -> bool {
        false
    }

    /// 执行转换
    fn from_value(value: Value, converter: &dyn TypeConverter) -> ConversionResult<Self>;
}

fn downcast_or_convert<T: Any + Send + Sync>(
    object: Object,
    target: &TypeInfo,
    converter: &dyn TypeConverter,
) -> ConversionResult<Arc<T>> {
    match object.downcast::<T>() {
        Ok(typed) => Ok(typed),
        Err(original) => converter
            .convert_object(&original, target)
            .and_then(|converted| converted.downcast::<T>().ok())
            .ok_or_else(|| {
                ConversionError::mismatch(target.name.clone(), Value::Object(original).describe())
            }),
    }
}

fn object_for<T: Any + Send + Sync>(
    value: Value,
    target: &TypeInfo,
    converter: &dyn TypeConverter,
) -> ConversionResult<Arc<T>> {
    let object = match value {
        Value::Object(object) => object,
        Value::Text(text) => converter.convert_text(&text, target)?,
        Value::Null => {
            return Err(ConversionError::NullValue {
                target: target.name.clone(),
            })
        }
        Value::Early(reference) => {
            return Err(ConversionError::EarlyReference {
                name: reference.name().to_string(),
            })
        }
        other => return Err(ConversionError::mismatch(target.name.clone(), other.describe())),
    };
    downcast_or_convert::<T>(object, target, converter)
}

macro_rules! impl_from_value_for_simple {
    ($($ty:ty),*) => {
        $(impl FromValue for $ty {
            fn type_info() -> TypeInfo {
                TypeInfo::of::<$ty>()
            }

            fn is_simple() -> bool {
                true
            }

            fn from_value(value: Value, converter: &dyn TypeConverter) -> ConversionResult<Self> {
                object_for::<$ty>(value, &Self::type_info(), converter).map(|typed| (*typed).clone())
            }
        })*
    };
}

impl_from_value_for_simple!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, String
);

impl<T: Any + Send + Sync> FromValue for Arc<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn from_value(value: Value, converter: &dyn TypeConverter) -> ConversionResult<Self> {
        object_for::<T>(value, &Self::type_info(), converter)
    }
}

impl<T: Any + Send + Sync> FromValue for Deferred<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn from_value(value: Value, converter: &dyn TypeConverter) -> ConversionResult<Self> {
        match value {
            Value::Early(reference) => Ok(Self::early(&reference)),
            other => {
                let typed = object_for::<T>(other, &Self::type_info(), converter)?;
                Ok(Self::ready(typed))
            }
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn type_info() -> TypeInfo {
        T::type_info()
    }

    fn is_simple() -> bool {
        T::is_simple()
    }

    fn from_value(value: Value, converter: &dyn TypeConverter) -> ConversionResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, converter).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Vec<Value>>()
    }

    fn is_simple() -> bool {
        T::is_simple()
    }

    fn from_value(value: Value, converter: &dyn TypeConverter) -> ConversionResult<Self> {
        match value {
            Value::List(items) => items
                .into_iter()
                .map(|item| T::from_value(item, converter))
                .collect(),
            // 逗号分隔的字面量
            Value::Text(text) => text
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| T::from_value(Value::text(item), converter))
                .collect(),
            other => Err(ConversionError::mismatch("列表", other.describe())),
        }
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<HashMap<String, Value>>()
    }

    fn from_value(value: Value, converter: &dyn TypeConverter) -> ConversionResult<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, item)| T::from_value(item, converter).map(|typed| (key, typed)))
                .collect(),
            other => Err(ConversionError::mismatch("映射", other.describe())),
        }
    }
}

impl FromValue for Value {
    fn type_info() -> TypeInfo {
        TypeInfo::of::<Value>()
    }

    fn from_value(value: Value, _converter: &dyn TypeConverter) -> ConversionResult<Self> {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::SimpleTypeConverter;

    #[derive(Debug, PartialEq)]
    struct Engine {
        cylinders: u8,
    }

    #[test]
    fn test_simple_values() {
        let converter = SimpleTypeConverter::new();
        let port: u16 = Value::text("8080").convert(&converter).unwrap();
        assert_eq!(port, 8080);

        let hosts: Vec<String> = Value::text("a, b ,c").convert(&converter).unwrap();
        assert_eq!(hosts, vec!["a", "b", "c"]);

        let missing: Option<String> = Value::Null.convert(&converter).unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_early_reference_requires_deferred() {
        let converter = SimpleTypeConverter::new();
        let reference = EarlyReference::new("engine");

        let error = Value::Early(reference.clone())
            .convert::<Arc<Engine>>(&converter)
            .unwrap_err();
        assert!(matches!(error, ConversionError::EarlyReference { ref name } if name == "engine"));

        let deferred: Deferred<Engine> = Value::Early(reference.clone())
            .convert(&converter)
            .unwrap();
        assert!(!deferred.is_ready());
        assert_eq!(deferred.name(), Some("engine"));

        assert!(reference.resolve(Arc::new(Engine { cylinders: 6 })));
        assert!(!reference.resolve(Arc::new(Engine { cylinders: 8 })));
        assert_eq!(deferred.get().map(|engine| engine.cylinders), Some(6));
    }

    #[test]
    fn test_object_downcast() {
        let converter = SimpleTypeConverter::new();
        let engine: Arc<Engine> = Value::object(Engine { cylinders: 4 })
            .convert(&converter)
            .unwrap();
        assert_eq!(engine.cylinders, 4);

        let error = Value::object(1u8).convert::<Arc<Engine>>(&converter).unwrap_err();
        assert!(matches!(error, ConversionError::TypeMismatch { .. }));
    }
}
