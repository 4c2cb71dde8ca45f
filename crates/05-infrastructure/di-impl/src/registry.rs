//! 组件定义注册表与别名注册表

use dashmap::DashMap;
use di_abstractions::{AliasRegistry, BeanDefinition, BeanDefinitionRegistry};
use infrastructure_common::{DependencyError, DependencyResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 别名注册表
///
/// 别名可以指向另一个别名, 解析时传递到规范名称。
#[derive(Debug)]
pub struct SimpleAliasRegistry {
    aliases: DashMap<String, String>,
    write_lock: Mutex<()>,
    allow_overriding: bool,
}

impl SimpleAliasRegistry {
    /// 创建新的别名注册表
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            aliases: DashMap::new(),
            write_lock: Mutex::new(()),
            allow_overriding,
        }
    }

    /// 解析到规范名称
    pub fn canonical_name(&self, name: &str) -> String {
        let mut canonical = name.to_string();
        let mut seen = HashSet::new();
        while let Some(target) = self.aliases.get(&canonical).map(|entry| entry.value().clone()) {
            if !seen.insert(canonical.clone()) {
                break;
            }
            canonical = target;
        }
        canonical
    }

    /// 指向某个名称的所有别名 (传递)
    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        let snapshot: Vec<(String, String)> = self
            .aliases
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let mut result = Vec::new();
        collect_aliases(&snapshot, name, &mut result);
        result.sort();
        result
    }

    /// `alias` 是否 (传递地) 是 `name` 的别名
    pub fn has_alias(&self, name: &str, alias: &str) -> bool {
        let snapshot: Vec<(String, String)> = self
            .aliases
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let mut result = Vec::new();
        collect_aliases(&snapshot, name, &mut result);
        result.iter().any(|registered| registered == alias)
    }

    /// 已注册的别名数量
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// 是否没有任何别名
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

fn collect_aliases(snapshot: &[(String, String)], name: &str, result: &mut Vec<String>) {
    for (alias, target) in snapshot {
        if target == name && !result.contains(alias) {
            result.push(alias.clone());
            collect_aliases(snapshot, alias, result);
        }
    }
}

impl AliasRegistry for SimpleAliasRegistry {
    fn register_alias(&self, name: &str, alias: &str) -> DependencyResult<()> {
        if name.is_empty() || alias.is_empty() {
            return Err(DependencyError::RegistrationError {
                name: name.to_string(),
                message: "名称和别名都不能为空".to_string(),
            });
        }
        let _guard = self.write_lock.lock();
        if alias == name {
            self.aliases.remove(alias);
            debug!("别名与组件名相同, 移除别名: {}", alias);
            return Ok(());
        }
        if let Some(registered) = self.aliases.get(alias).map(|entry| entry.value().clone()) {
            if registered == name {
                return Ok(());
            }
            if !self.allow_overriding {
                return Err(DependencyError::RegistrationError {
                    name: name.to_string(),
                    message: format!(
                        "无法注册别名 '{}': 它已经指向组件 '{}'",
                        alias, registered
                    ),
                });
            }
            info!("覆盖别名 '{}': '{}' -> '{}'", alias, registered, name);
        }
        if self.has_alias(alias, name) {
            return Err(DependencyError::RegistrationError {
                name: name.to_string(),
                message: format!("无法注册别名 '{}': 会形成别名循环", alias),
            });
        }
        self.aliases.insert(alias.to_string(), name.to_string());
        debug!("注册别名: {} -> {}", alias, name);
        Ok(())
    }

    fn remove_alias(&self, alias: &str) -> DependencyResult<()> {
        let _guard = self.write_lock.lock();
        match self.aliases.remove(alias) {
            Some(_) => Ok(()),
            None => Err(DependencyError::RegistrationError {
                name: alias.to_string(),
                message: "别名未注册".to_string(),
            }),
        }
    }

    fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }
}

/// 组件定义注册表
///
/// 定义按注册顺序保存, 读取无锁, 写入串行化。
#[derive(Debug)]
pub struct DefinitionRegistry {
    definitions: DashMap<String, Arc<BeanDefinition>>,
    names: RwLock<Vec<String>>,
    aliases: SimpleAliasRegistry,
    allow_overriding: bool,
}

impl DefinitionRegistry {
    /// 创建新的定义注册表
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            definitions: DashMap::new(),
            names: RwLock::new(Vec::new()),
            aliases: SimpleAliasRegistry::new(allow_overriding),
            allow_overriding,
        }
    }

    /// 别名注册表
    pub fn aliases(&self) -> &SimpleAliasRegistry {
        &self.aliases
    }

    /// 解析到规范名称
    pub fn canonical_name(&self, name: &str) -> String {
        self.aliases.canonical_name(name)
    }

    /// 注册定义, 返回被替换的旧定义
    pub fn insert(
        &self,
        name: &str,
        definition: BeanDefinition,
    ) -> DependencyResult<Option<Arc<BeanDefinition>>> {
        if name.is_empty() {
            return Err(DependencyError::RegistrationError {
                name: name.to_string(),
                message: "组件名不能为空".to_string(),
            });
        }
        definition.validate(name)?;

        let mut names = self.names.write();
        let existing = self.definitions.get(name).map(|entry| entry.value().clone());
        match &existing {
            Some(previous) => {
                if !self.allow_overriding {
                    return Err(DependencyError::RegistrationError {
                        name: name.to_string(),
                        message: "已存在同名定义且不允许覆盖".to_string(),
                    });
                }
                if previous.as_ref() != &definition {
                    info!("覆盖组件定义: {}", name);
                } else {
                    debug!("用等价的定义覆盖组件定义: {}", name);
                }
            }
            None => {
                if self.aliases.is_alias(name) {
                    if !self.allow_overriding {
                        return Err(DependencyError::RegistrationError {
                            name: name.to_string(),
                            message: format!(
                                "名称已被用作组件 '{}' 的别名",
                                self.aliases.canonical_name(name)
                            ),
                        });
                    }
                    warn!("组件定义覆盖了同名别名: {}", name);
                    self.aliases.remove_alias(name)?;
                }
                names.push(name.to_string());
            }
        }
        self.definitions
            .insert(name.to_string(), Arc::new(definition));
        debug!("注册组件定义: {}", name);
        Ok(existing)
    }

    /// 移除定义
    pub fn remove(&self, name: &str) -> DependencyResult<Arc<BeanDefinition>> {
        let mut names = self.names.write();
        let (_, removed) = self
            .definitions
            .remove(name)
            .ok_or_else(|| DependencyError::not_registered(name))?;
        names.retain(|existing| existing != name);
        debug!("移除组件定义: {}", name);
        Ok(removed)
    }

    /// 获取定义
    pub fn get(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        self.definitions.get(name).map(|entry| entry.value().clone())
    }

    /// 是否包含定义
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// 按注册顺序的组件名
    pub fn names(&self) -> Vec<String> {
        self.names.read().clone()
    }

    /// 定义数量
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// 以指定名称为父定义的所有定义名
    pub fn children_of(&self, parent_name: &str) -> Vec<String> {
        self.names()
            .into_iter()
            .filter(|name| {
                self.get(name)
                    .is_some_and(|definition| definition.parent_name.as_deref() == Some(parent_name))
            })
            .collect()
    }
}

impl AliasRegistry for DefinitionRegistry {
    fn register_alias(&self, name: &str, alias: &str) -> DependencyResult<()> {
        self.aliases.register_alias(name, alias)
    }

    fn remove_alias(&self, alias: &str) -> DependencyResult<()> {
        self.aliases.remove_alias(alias)
    }

    fn is_alias(&self, name: &str) -> bool {
        self.aliases.is_alias(name)
    }
}

impl BeanDefinitionRegistry for DefinitionRegistry {
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> DependencyResult<()> {
        self.insert(name, definition).map(|_| ())
    }

    fn remove_bean_definition(&self, name: &str) -> DependencyResult<()> {
        self.remove(name).map(|_| ())
    }

    fn get_bean_definition(&self, name: &str) -> DependencyResult<Arc<BeanDefinition>> {
        self.get(name)
            .ok_or_else(|| DependencyError::not_registered(name))
    }

    fn contains_bean_definition(&self, name: &str) -> bool {
        self.contains(name)
    }

    fn get_bean_definition_names(&self) -> Vec<String> {
        self.names()
    }

    fn get_bean_definition_count(&self) -> usize {
        self.len()
    }

    fn is_bean_name_in_use(&self, name: &str) -> bool {
        self.aliases.is_alias(name) || self.contains(name)
    }
}
