//! `${...}` 占位符解析
//!
//! 支持 `${key}`、带默认值的 `${key:default}` 以及嵌套占位符 `${${env}.url}`。
//! 解析出的值会继续解析其中的占位符, 循环引用视为错误。

use di_abstractions::StringValueResolver;
use infrastructure_common::{ConfigError, ConfigResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

const PREFIX: &str = "${";
const SUFFIX: &str = "}";
const VALUE_SEPARATOR: char = ':';

/// 由配置支撑的占位符解析器
#[derive(Debug, Clone)]
pub struct PlaceholderResolver {
    settings: Arc<config::Config>,
    ignore_unresolvable: bool,
}

impl PlaceholderResolver {
    /// 创建解析器
    pub fn new(settings: Arc<config::Config>) -> Self {
        Self {
            settings,
            ignore_unresolvable: false,
        }
    }

    /// 无法解析的占位符是否原样保留
    pub fn with_ignore_unresolvable(mut self, ignore: bool) -> Self {
        self.ignore_unresolvable = ignore;
        self
    }

    /// 解析文本中的全部占位符
    pub fn resolve(&self, text: &str) -> ConfigResult<String> {
        self.parse(text, &mut HashSet::new())
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.settings.get_string(key).ok()
    }

    fn parse(&self, text: &str, visiting: &mut HashSet<String>) -> ConfigResult<String> {
        let mut result = text.to_string();
        let mut search_from = 0;
        while let Some(offset) = result[search_from..].find(PREFIX) {
            let start = search_from + offset;
            let Some(end) = find_placeholder_end(&result, start) else {
                break;
            };
            let raw = result[start + PREFIX.len()..end].to_string();
            if !visiting.insert(raw.clone()) {
                return Err(ConfigError::ValidationError {
                    message: format!("占位符 '{}' 存在循环引用", raw),
                });
            }

            let placeholder = self.parse(&raw, visiting)?;
            let mut value = self.lookup(&placeholder);
            if value.is_none() {
                if let Some((key, default)) = placeholder.split_once(VALUE_SEPARATOR) {
                    value = self.lookup(key).or_else(|| Some(default.to_string()));
                }
            }

            match value {
                Some(value) => {
                    let value = self.parse(&value, visiting)?;
                    trace!("占位符 '{}' 解析为 '{}'", placeholder, value);
                    result.replace_range(start..end + SUFFIX.len(), &value);
                    search_from = start + value.len();
                }
                None if self.ignore_unresolvable => {
                    search_from = end + SUFFIX.len();
                }
                None => {
                    return Err(ConfigError::UnresolvablePlaceholder {
                        placeholder,
                        value: text.to_string(),
                    });
                }
            }
            visiting.remove(&raw);
        }
        Ok(result)
    }
}

/// 与 `start` 处前缀配对的后缀位置, 跳过嵌套的占位符
fn find_placeholder_end(text: &str, start: usize) -> Option<usize> {
    let mut index = start + PREFIX.len();
    let mut nested = 0usize;
    while index < text.len() {
        let rest = &text[index..];
        if rest.starts_with(SUFFIX) {
            if nested == 0 {
                return Some(index);
            }
            nested -= 1;
            index += SUFFIX.len();
        } else if rest.starts_with(PREFIX) {
            nested += 1;
            index += PREFIX.len();
        } else {
            index += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}

impl StringValueResolver for PlaceholderResolver {
    fn resolve_string_value(&self, value: &str) -> anyhow::Result<String> {
        Ok(self.resolve(value)?)
    }
}
