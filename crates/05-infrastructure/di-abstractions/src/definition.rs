//! 组件定义数据模型
//!
//! [`BeanDefinition`] 是声明式的组件描述, 由外部元数据源创建并注册到容器。
//! 子定义通过 `parent_name` 继承父定义, 合并由 [`BeanDefinition::override_from`] 完成。

use crate::class::BeanClass;
use infrastructure_common::{DependencyError, DependencyResult, Object};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 单例作用域
pub const SCOPE_SINGLETON: &str = "singleton";

/// 原型作用域
pub const SCOPE_PROTOTYPE: &str = "prototype";

/// 工厂组件解引用前缀
pub const FACTORY_BEAN_PREFIX: &str = "&";

/// 自动装配模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutowireMode {
    /// 不自动装配
    #[default]
    No,
    /// 按属性名装配
    ByName,
    /// 按属性类型装配
    ByType,
    /// 构造函数装配
    Constructor,
    /// 有无参构造函数时按类型装配, 否则构造函数装配
    AutoDetect,
}

/// 依赖检查模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyCheck {
    /// 不检查
    #[default]
    None,
    /// 检查组件引用类型的属性
    Objects,
    /// 检查简单类型的属性
    Simple,
    /// 检查所有属性
    All,
}

/// 类引用: 已解析的类或尚待解析的类名
#[derive(Clone)]
pub enum ClassReference {
    /// 已解析的类
    Resolved(Arc<BeanClass>),
    /// 延迟解析的类名
    Named(String),
}

impl ClassReference {
    /// 类名
    pub fn name(&self) -> &str {
        match self {
            Self::Resolved(class) => class.name(),
            Self::Named(name) => name,
        }
    }

    /// 已解析的类
    pub fn resolved(&self) -> Option<&Arc<BeanClass>> {
        match self {
            Self::Resolved(class) => Some(class),
            Self::Named(_) => None,
        }
    }
}

impl PartialEq for ClassReference {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl fmt::Debug for ClassReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(class) => write!(f, "Resolved({})", class.name()),
            Self::Named(name) => write!(f, "Named({})", name),
        }
    }
}

/// 对容器中其他组件的引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanReference {
    /// 目标组件名
    pub bean_name: String,
    /// 是否直接从父容器解析
    pub to_parent: bool,
}

impl BeanReference {
    /// 创建组件引用
    pub fn new(bean_name: impl Into<String>) -> Self {
        Self {
            bean_name: bean_name.into(),
            to_parent: false,
        }
    }

    /// 创建指向父容器的引用
    pub fn to_parent(bean_name: impl Into<String>) -> Self {
        Self {
            bean_name: bean_name.into(),
            to_parent: true,
        }
    }
}

/// 定义中的值
#[derive(Debug, Clone)]
pub enum DefinitionValue {
    /// 空值
    Null,
    /// 字面量, 可以包含 `${...}` 占位符
    Literal(String),
    /// 组件引用
    Reference(BeanReference),
    /// 内部组件定义
    Inner(Box<BeanDefinitionHolder>),
    /// 列表
    List(Vec<DefinitionValue>),
    /// 有序映射
    Map(Vec<(String, DefinitionValue)>),
    /// 预先构造好的对象
    Object(Object),
}

impl DefinitionValue {
    /// 字面量
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// 组件引用
    pub fn reference(bean_name: impl Into<String>) -> Self {
        Self::Reference(BeanReference::new(bean_name))
    }

    /// 内部组件
    pub fn inner(name: impl Into<String>, definition: BeanDefinition) -> Self {
        Self::Inner(Box::new(BeanDefinitionHolder::new(name, definition)))
    }

    /// 是否为组件引用
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }
}

impl PartialEq for DefinitionValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Literal(left), Self::Literal(right)) => left == right,
            (Self::Reference(left), Self::Reference(right)) => left == right,
            (Self::Inner(left), Self::Inner(right)) => left == right,
            (Self::List(left), Self::List(right)) => left == right,
            (Self::Map(left), Self::Map(right)) => left == right,
            (Self::Object(left), Self::Object(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}

/// 构造函数实参
#[derive(Debug, Clone, PartialEq)]
pub struct ValueHolder {
    /// 值
    pub value: DefinitionValue,
    /// 声明的类型名
    pub type_name: Option<String>,
    /// 参数名
    pub name: Option<String>,
}

impl ValueHolder {
    /// 包装值
    pub fn new(value: DefinitionValue) -> Self {
        Self {
            value,
            type_name: None,
            name: None,
        }
    }
}

/// 构造函数实参集合: 按位置的实参和未指定位置的通用实参
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstructorArgumentValues {
    indexed: BTreeMap<usize, ValueHolder>,
    generic: Vec<ValueHolder>,
}

impl ConstructorArgumentValues {
    /// 创建空的实参集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加按位置的实参, 同一位置的旧值被替换
    pub fn add_indexed(&mut self, index: usize, value: DefinitionValue) {
        self.indexed.insert(index, ValueHolder::new(value));
    }

    /// 添加通用实参
    pub fn add_generic(&mut self, value: DefinitionValue) {
        let holder = ValueHolder::new(value);
        if !self.generic.contains(&holder) {
            self.generic.push(holder);
        }
    }

    /// 按位置的实参
    pub fn indexed(&self) -> &BTreeMap<usize, ValueHolder> {
        &self.indexed
    }

    /// 通用实参
    pub fn generic(&self) -> &[ValueHolder] {
        &self.generic
    }

    /// 获取指定位置的实参
    pub fn get_indexed(&self, index: usize) -> Option<&ValueHolder> {
        self.indexed.get(&index)
    }

    /// 构造函数至少需要的参数个数
    pub fn argument_count(&self) -> usize {
        let highest = self.indexed.keys().next_back().map_or(0, |index| index + 1);
        highest.max(self.indexed.len() + self.generic.len())
    }

    /// 是否没有任何实参
    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    /// 按位置展开为实参列表: 先放按位置的实参, 通用实参按顺序填充空位
    pub fn to_ordered(&self, count: usize) -> Option<Vec<DefinitionValue>> {
        let mut generic = self.generic.iter();
        let mut result = Vec::with_capacity(count);
        for index in 0..count {
            match self.indexed.get(&index) {
                Some(holder) => result.push(holder.value.clone()),
                None => result.push(generic.next()?.value.clone()),
            }
        }
        if generic.next().is_some() || self.indexed.keys().any(|index| *index >= count) {
            return None;
        }
        Some(result)
    }

    /// 合并另一个实参集合, 对方的值优先
    pub fn add_all(&mut self, other: &ConstructorArgumentValues) {
        for (index, holder) in &other.indexed {
            self.indexed.insert(*index, holder.clone());
        }
        for holder in &other.generic {
            if !self.generic.contains(holder) {
                self.generic.push(holder.clone());
            }
        }
    }
}

/// 属性值
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    /// 属性名
    pub name: String,
    /// 值
    pub value: DefinitionValue,
}

/// 有序且名称唯一的属性值集合
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyValues {
    values: Vec<PropertyValue>,
}

impl PropertyValues {
    /// 创建空的属性值集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加属性值, 同名的旧值被替换且保持原位置
    pub fn add(&mut self, name: impl Into<String>, value: DefinitionValue) {
        let name = name.into();
        match self.values.iter_mut().find(|existing| existing.name == name) {
            Some(existing) => existing.value = value,
            None => self.values.push(PropertyValue { name, value }),
        }
    }

    /// 获取属性值
    pub fn get(&self, name: &str) -> Option<&DefinitionValue> {
        self.values
            .iter()
            .find(|value| value.name == name)
            .map(|value| &value.value)
    }

    /// 是否包含属性
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 移除属性值
    pub fn remove(&mut self, name: &str) -> Option<DefinitionValue> {
        let position = self.values.iter().position(|value| value.name == name)?;
        Some(self.values.remove(position).value)
    }

    /// 遍历属性值
    pub fn iter(&self) -> impl Iterator<Item = &PropertyValue> {
        self.values.iter()
    }

    /// 属性值个数
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 合并另一个集合, 对方的值优先
    pub fn add_all(&mut self, other: &PropertyValues) {
        for value in &other.values {
            self.add(value.name.clone(), value.value.clone());
        }
    }
}

/// 方法注入声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodOverride {
    /// 查找方法: 每次调用返回容器中的目标组件
    Lookup {
        /// 被覆盖的方法名
        method_name: String,
        /// 查找的组件名
        bean_name: String,
    },
    /// 方法替换: 调用转交给替换器组件
    Replace {
        /// 被替换的方法名
        method_name: String,
        /// 替换器组件名
        replacer_bean_name: String,
    },
}

impl MethodOverride {
    /// 被覆盖的方法名
    pub fn method_name(&self) -> &str {
        match self {
            Self::Lookup { method_name, .. } | Self::Replace { method_name, .. } => method_name,
        }
    }
}

/// 方法注入声明集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodOverrides {
    overrides: Vec<MethodOverride>,
}

impl MethodOverrides {
    /// 添加声明, 同一方法的旧声明被替换
    pub fn add(&mut self, method_override: MethodOverride) {
        self.overrides
            .retain(|existing| existing.method_name() != method_override.method_name());
        self.overrides.push(method_override);
    }

    /// 查找方法的注入声明
    pub fn get(&self, method_name: &str) -> Option<&MethodOverride> {
        self.overrides
            .iter()
            .find(|method_override| method_override.method_name() == method_name)
    }

    /// 遍历声明
    pub fn iter(&self) -> impl Iterator<Item = &MethodOverride> {
        self.overrides.iter()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// 合并另一个集合, 对方的声明优先
    pub fn add_all(&mut self, other: &MethodOverrides) {
        for method_override in &other.overrides {
            self.add(method_override.clone());
        }
    }
}

/// 元数据属性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeanMetadataAttribute {
    /// 属性值
    pub value: serde_json::Value,
    /// 来源描述
    pub source: Option<String>,
}

/// 带名称和别名的组件定义
#[derive(Debug, Clone, PartialEq)]
pub struct BeanDefinitionHolder {
    /// 组件定义
    pub definition: BeanDefinition,
    /// 组件名
    pub name: String,
    /// 别名
    pub aliases: Vec<String>,
}

impl BeanDefinitionHolder {
    /// 创建定义持有者
    pub fn new(name: impl Into<String>, definition: BeanDefinition) -> Self {
        Self {
            definition,
            name: name.into(),
            aliases: Vec::new(),
        }
    }

    /// 添加别名
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// 名称或别名是否匹配
    pub fn matches_name(&self, candidate: &str) -> bool {
        self.name == candidate || self.aliases.iter().any(|alias| alias == candidate)
    }
}

/// 组件定义
#[derive(Debug, Clone, PartialEq)]
pub struct BeanDefinition {
    /// 组件类
    pub bean_class: Option<ClassReference>,
    /// 父定义名
    pub parent_name: Option<String>,
    /// 作用域, 未设置时合并后默认为单例
    pub scope: Option<String>,
    /// 是否为抽象定义
    pub is_abstract: bool,
    /// 是否延迟初始化
    pub lazy_init: bool,
    /// 按类型装配时是否为首选
    pub primary: bool,
    /// 是否可以作为自动装配候选
    pub autowire_candidate: bool,
    /// 自动装配模式
    pub autowire_mode: AutowireMode,
    /// 依赖检查模式
    pub dependency_check: DependencyCheck,
    /// 必须先于本组件创建的组件
    pub depends_on: Vec<String>,
    /// 初始化方法名
    pub init_method_name: Option<String>,
    /// 初始化方法不存在时是否报错
    pub enforce_init_method: bool,
    /// 销毁方法名
    pub destroy_method_name: Option<String>,
    /// 销毁方法不存在时是否报错
    pub enforce_destroy_method: bool,
    /// 工厂组件名
    pub factory_bean_name: Option<String>,
    /// 工厂方法名
    pub factory_method_name: Option<String>,
    /// 构造函数实参
    pub constructor_arguments: ConstructorArgumentValues,
    /// 属性值
    pub property_values: PropertyValues,
    /// 方法注入声明
    pub method_overrides: MethodOverrides,
    /// 被装饰的内部定义
    pub decorated_definition: Option<Box<BeanDefinitionHolder>>,
    /// 是否由框架合成
    pub synthetic: bool,
    /// 定义来源描述
    pub resource_description: Option<String>,
    /// 元数据属性
    pub attributes: BTreeMap<String, BeanMetadataAttribute>,
}

impl Default for BeanDefinition {
    fn default() -> Self {
        Self {
            bean_class: None,
            parent_name: None,
            scope: None,
            is_abstract: false,
            lazy_init: false,
            primary: false,
            autowire_candidate: true,
            autowire_mode: AutowireMode::No,
            dependency_check: DependencyCheck::None,
            depends_on: Vec::new(),
            init_method_name: None,
            enforce_init_method: true,
            destroy_method_name: None,
            enforce_destroy_method: true,
            factory_bean_name: None,
            factory_method_name: None,
            constructor_arguments: ConstructorArgumentValues::default(),
            property_values: PropertyValues::default(),
            method_overrides: MethodOverrides::default(),
            decorated_definition: None,
            synthetic: false,
            resource_description: None,
            attributes: BTreeMap::new(),
        }
    }
}

impl BeanDefinition {
    /// 创建空定义
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建指定类的定义
    pub fn for_class(class: Arc<BeanClass>) -> Self {
        Self {
            bean_class: Some(ClassReference::Resolved(class)),
            ..Self::default()
        }
    }

    /// 创建只记录类名的定义
    pub fn for_class_name(class_name: impl Into<String>) -> Self {
        Self {
            bean_class: Some(ClassReference::Named(class_name.into())),
            ..Self::default()
        }
    }

    /// 创建继承父定义的子定义
    pub fn child(parent_name: impl Into<String>) -> Self {
        Self {
            parent_name: Some(parent_name.into()),
            ..Self::default()
        }
    }

    /// 设置作用域
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// 设置父定义
    pub fn with_parent(mut self, parent_name: impl Into<String>) -> Self {
        self.parent_name = Some(parent_name.into());
        self
    }

    /// 标记为抽象定义
    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    /// 设置延迟初始化
    pub fn with_lazy_init(mut self, lazy_init: bool) -> Self {
        self.lazy_init = lazy_init;
        self
    }

    /// 设置首选标记
    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    /// 设置是否为自动装配候选
    pub fn with_autowire_candidate(mut self, candidate: bool) -> Self {
        self.autowire_candidate = candidate;
        self
    }

    /// 设置自动装配模式
    pub fn with_autowire_mode(mut self, mode: AutowireMode) -> Self {
        self.autowire_mode = mode;
        self
    }

    /// 设置依赖检查模式
    pub fn with_dependency_check(mut self, check: DependencyCheck) -> Self {
        self.dependency_check = check;
        self
    }

    /// 添加前置依赖
    pub fn with_depends_on(mut self, bean_name: impl Into<String>) -> Self {
        self.depends_on.push(bean_name.into());
        self
    }

    /// 设置初始化方法
    pub fn with_init_method(mut self, method_name: impl Into<String>) -> Self {
        self.init_method_name = Some(method_name.into());
        self
    }

    /// 设置销毁方法
    pub fn with_destroy_method(mut self, method_name: impl Into<String>) -> Self {
        self.destroy_method_name = Some(method_name.into());
        self
    }

    /// 设置工厂组件
    pub fn with_factory_bean(mut self, factory_bean_name: impl Into<String>) -> Self {
        self.factory_bean_name = Some(factory_bean_name.into());
        self
    }

    /// 设置工厂方法
    pub fn with_factory_method(mut self, factory_method_name: impl Into<String>) -> Self {
        self.factory_method_name = Some(factory_method_name.into());
        self
    }

    /// 添加按位置的构造函数实参
    pub fn with_constructor_arg(mut self, index: usize, value: DefinitionValue) -> Self {
        self.constructor_arguments.add_indexed(index, value);
        self
    }

    /// 添加通用构造函数实参
    pub fn with_generic_arg(mut self, value: DefinitionValue) -> Self {
        self.constructor_arguments.add_generic(value);
        self
    }

    /// 添加属性值
    pub fn with_property(mut self, name: impl Into<String>, value: DefinitionValue) -> Self {
        self.property_values.add(name, value);
        self
    }

    /// 声明查找方法
    pub fn with_lookup_method(
        mut self,
        method_name: impl Into<String>,
        bean_name: impl Into<String>,
    ) -> Self {
        self.method_overrides.add(MethodOverride::Lookup {
            method_name: method_name.into(),
            bean_name: bean_name.into(),
        });
        self
    }

    /// 声明方法替换
    pub fn with_replaced_method(
        mut self,
        method_name: impl Into<String>,
        replacer_bean_name: impl Into<String>,
    ) -> Self {
        self.method_overrides.add(MethodOverride::Replace {
            method_name: method_name.into(),
            replacer_bean_name: replacer_bean_name.into(),
        });
        self
    }

    /// 添加元数据属性
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(
            key.into(),
            BeanMetadataAttribute {
                value,
                source: None,
            },
        );
        self
    }

    /// 标记为合成定义
    pub fn with_synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    /// 设置来源描述
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.resource_description = Some(description.into());
        self
    }

    /// 类名
    pub fn bean_class_name(&self) -> Option<&str> {
        self.bean_class.as_ref().map(ClassReference::name)
    }

    /// 已解析的类
    pub fn resolved_class(&self) -> Option<&Arc<BeanClass>> {
        self.bean_class.as_ref().and_then(ClassReference::resolved)
    }

    /// 实际作用域 (未设置视为单例)
    pub fn effective_scope(&self) -> &str {
        match self.scope.as_deref() {
            None | Some("") => SCOPE_SINGLETON,
            Some(scope) => scope,
        }
    }

    /// 是否为单例
    pub fn is_singleton(&self) -> bool {
        self.effective_scope() == SCOPE_SINGLETON
    }

    /// 是否为原型
    pub fn is_prototype(&self) -> bool {
        self.effective_scope() == SCOPE_PROTOTYPE
    }

    /// 是否声明了构造函数实参
    pub fn has_constructor_arguments(&self) -> bool {
        !self.constructor_arguments.is_empty()
    }

    /// 用另一个定义中显式设置的属性覆盖本定义
    pub fn override_from(&mut self, other: &BeanDefinition) {
        if other.bean_class.is_some() {
            self.bean_class = other.bean_class.clone();
        }
        if other.scope.as_deref().is_some_and(|scope| !scope.is_empty()) {
            self.scope = other.scope.clone();
        }
        self.is_abstract = other.is_abstract;
        self.lazy_init = other.lazy_init;
        if other.factory_bean_name.is_some() {
            self.factory_bean_name = other.factory_bean_name.clone();
        }
        if other.factory_method_name.is_some() {
            self.factory_method_name = other.factory_method_name.clone();
        }
        self.autowire_mode = other.autowire_mode;
        self.dependency_check = other.dependency_check;
        self.depends_on = other.depends_on.clone();
        self.autowire_candidate = other.autowire_candidate;
        self.primary = other.primary;
        self.constructor_arguments.add_all(&other.constructor_arguments);
        self.property_values.add_all(&other.property_values);
        self.method_overrides.add_all(&other.method_overrides);
        if other.init_method_name.is_some() {
            self.init_method_name = other.init_method_name.clone();
            self.enforce_init_method = other.enforce_init_method;
        }
        if other.destroy_method_name.is_some() {
            self.destroy_method_name = other.destroy_method_name.clone();
            self.enforce_destroy_method = other.enforce_destroy_method;
        }
        self.synthetic = other.synthetic;
        if other.resource_description.is_some() {
            self.resource_description = other.resource_description.clone();
        }
        for (key, attribute) in &other.attributes {
            self.attributes.insert(key.clone(), attribute.clone());
        }
    }

    /// 校验定义
    pub fn validate(&self, name: &str) -> DependencyResult<()> {
        if !self.method_overrides.is_empty() && self.factory_method_name.is_some() {
            return Err(DependencyError::invalid_definition(
                name,
                "方法注入不能与工厂方法同时使用: 工厂方法返回的实例无法被容器改写",
            ));
        }
        if self.factory_bean_name.is_some() && self.factory_method_name.is_none() {
            return Err(DependencyError::invalid_definition(
                name,
                "指定了工厂组件但没有指定工厂方法",
            ));
        }
        Ok(())
    }
}
