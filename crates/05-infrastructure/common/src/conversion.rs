//! 类型转换
//!
//! 容器本身不实现字面量到目标类型的转换规则, 而是委托给注入的 [`TypeConverter`]。
//! [`SimpleTypeConverter`] 是默认实现, 内置基础类型的文本编辑器,
//! 并允许注册自定义编辑器和对象转换器。

use crate::errors::{ConversionError, ConversionResult};
use crate::metadata::TypeInfo;
use crate::value::Object;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::debug;

/// 类型转换器
pub trait TypeConverter: Send + Sync {
    /// 将文本转换为目标类型的对象
    fn convert_text(&self, text: &str, target: &TypeInfo) -> ConversionResult<Object>;

    /// 将对象转换为目标类型, 无法转换时返回 `None`
    fn convert_object(&self, value: &Object, target: &TypeInfo) -> Option<Object>;
}

/// 文本编辑器
pub type TextEditor = Arc<dyn Fn(&str) -> Result<Object, String> + Send + Sync>;

/// 对象转换函数
pub type ObjectConverter = Arc<dyn Fn(&Object) -> Option<Object> + Send + Sync>;

/// 默认类型转换器
pub struct SimpleTypeConverter {
    editors: DashMap<TypeId, TextEditor>,
    object_converters: DashMap<(TypeId, TypeId), ObjectConverter>,
}

impl SimpleTypeConverter {
    /// 创建带有默认编辑器的转换器
    pub fn new() -> Self {
        let converter = Self::empty();
        converter.register_default_editors();
        converter
    }

    /// 创建不带任何编辑器的转换器
    pub fn empty() -> Self {
        Self {
            editors: DashMap::new(),
            object_converters: DashMap::new(),
        }
    }

    /// 注册文本编辑器
    pub fn register_editor<T, F>(&self, editor: F)
    where
        T: Any + Send + Sync,
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        debug!("注册类型编辑器: {}", std::any::type_name::<T>());
        let erased: TextEditor = Arc::new(move |text: &str| -> Result<Object, String> {
            editor(text).map(|value| Arc::new(value) as Object)
        });
        self.editors.insert(TypeId::of::<T>(), erased);
    }

    /// 注册对象转换器
    pub fn register_object_converter<S, T, F>(&self, converter: F)
    where
        S: Any + Send + Sync,
        T: Any + Send + Sync,
        F: Fn(&S) -> Option<T> + Send + Sync + 'static,
    {
        debug!(
            "注册对象转换器: {} -> {}",
            std::any::type_name::<S>(),
            std::any::type_name::<T>()
        );
        let erased: ObjectConverter = Arc::new(move |object: &Object| -> Option<Object> {
            object
                .downcast_ref::<S>()
                .and_then(&converter)
                .map(|value| Arc::new(value) as Object)
        });
        self.object_converters
            .insert((TypeId::of::<S>(), TypeId::of::<T>()), erased);
    }

    /// 是否存在目标类型的文本编辑器
    pub fn has_editor(&self, target: &TypeInfo) -> bool {
        target.id.is_some_and(|id| self.editors.contains_key(&id))
    }

    fn register_default_editors(&self) {
        macro_rules! parse_editor {
            ($converter:expr; $($ty:ty),*) => {
                $($converter.register_editor::<$ty, _>(|text| {
                    text.trim().parse::<$ty>().map_err(|e| e.to_string())
                });)*
            };
        }

        parse_editor!(self; i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

        self.register_editor::<String, _>(|text| Ok(text.to_string()));
        self.register_editor::<bool, _>(parse_bool);
        self.register_editor::<char, _>(|text| {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err("需要恰好一个字符".to_string()),
            }
        });
    }
}

impl Default for SimpleTypeConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimpleTypeConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleTypeConverter")
            .field("editors", &self.editors.len())
            .field("object_converters", &self.object_converters.len())
            .finish()
    }
}

impl TypeConverter for SimpleTypeConverter {
    fn convert_text(&self, text: &str, target: &TypeInfo) -> ConversionResult<Object> {
        let editor = target
            .id
            .and_then(|id| self.editors.get(&id).map(|entry| entry.value().clone()))
            .ok_or_else(|| ConversionError::Unsupported {
                target: target.name.clone(),
            })?;

        editor(text).map_err(|message| ConversionError::failed(text, target.name.clone(), message))
    }

    fn convert_object(&self, value: &Object, target: &TypeInfo) -> Option<Object> {
        let target_id = target.id?;
        let source_id = (**value).type_id();
        if source_id == target_id {
            return Some(value.clone());
        }

        let converter = self
            .object_converters
            .get(&(source_id, target_id))
            .map(|entry| entry.value().clone());
        if let Some(converter) = converter {
            return converter(value);
        }

        value
            .downcast_ref::<String>()
            .and_then(|text| self.convert_text(text, target).ok())
    }
}

fn parse_bool(text: &str) -> Result<bool, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(format!("无效的布尔值: {}", other)),
    }
}
