//! # Dependency Injection Abstractions
//!
//! 组件容器抽象层, 定义组件定义模型和容器的核心接口。
//!
//! ## 核心接口
//!
//! - [`BeanClass`] / [`ClassLoader`] - 运行时类模型
//! - [`BeanDefinition`] - 组件定义与合并规则
//! - [`BeanFactory`] / [`ConfigurableBeanFactory`] / [`ListableBeanFactory`] - 容器接口
//! - [`BeanDefinitionRegistry`] - 定义注册表
//! - [`Scope`] - 自定义作用域
//! - [`BeanPostProcessor`] - 创建流程扩展点
//! - [`FactoryBean`] 等生命周期回调

pub mod class;
pub mod class_loader;
pub mod container;
pub mod definition;
pub mod factory;
pub mod lifecycle;
pub mod processor;
pub mod resolver;
pub mod scope;

pub use class::*;
pub use class_loader::*;
pub use container::*;
pub use definition::*;
pub use factory::*;
pub use lifecycle::*;
pub use processor::*;
pub use resolver::*;
pub use scope::*;
