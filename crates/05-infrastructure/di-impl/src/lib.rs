//! # 组件容器实现
//!
//! 提供 [`DefaultBeanFactory`] 及其组成部分:
//!
//! - [`DefinitionRegistry`] / [`SimpleAliasRegistry`] - 定义与别名注册表
//! - [`MergedDefinitionCache`] - 父子定义合并结果缓存
//! - [`DefaultSingletonRegistry`] - 单例缓存、提前引用与依赖关系
//! - [`DisposableBeanAdapter`] - 销毁回调适配
//! - [`ThreadScope`] / [`ContextScope`] - 内置的自定义作用域
//! - [`BeanFactoryBuilder`] - 容器构建器
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let classes = Arc::new(ClassRegistry::new());
//! classes.register(BeanClass::builder::<OrderService>("OrderService").default_constructor().build());
//!
//! let factory = BeanFactoryBuilder::new().with_class_loader(classes).build();
//! factory.register_bean_definition("orderService", BeanDefinition::for_class_name("OrderService"))?;
//! let service = factory.get_bean_typed::<OrderService>("orderService")?;
//! ```

pub mod builder;
pub mod disposable;
pub mod factory;
pub mod merge;
pub mod registry;
pub mod scope;
pub mod singleton;
pub mod support;

mod create;
mod populate;
mod tracking;
mod value_resolver;

pub use builder::BeanFactoryBuilder;
pub use disposable::DisposableBeanAdapter;
pub use factory::{is_factory_dereference, DefaultBeanFactory};
pub use merge::MergedDefinitionCache;
pub use registry::{DefinitionRegistry, SimpleAliasRegistry};
pub use scope::{ContextScope, ThreadScope, SCOPE_THREAD};
pub use singleton::DefaultSingletonRegistry;
pub use support::{generate_bean_name, register_bean_definition, register_with_generated_name};
