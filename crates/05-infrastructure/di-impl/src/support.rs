//! 组件定义注册辅助函数

use di_abstractions::{BeanDefinition, BeanDefinitionHolder, BeanDefinitionRegistry};
use infrastructure_common::{DependencyError, DependencyResult};
use tracing::debug;
use uuid::Uuid;

/// 生成名称的分隔符
pub const GENERATED_BEAN_NAME_SEPARATOR: &str = "#";

/// 为没有名称的定义生成组件名
///
/// 名称取自类名; 没有类名时取 `父定义名$child` 或 `工厂组件名$created`。
/// 内部组件追加随机标识, 其他组件追加从 0 开始的第一个未被占用的序号。
pub fn generate_bean_name(
    definition: &BeanDefinition,
    registry: &dyn BeanDefinitionRegistry,
    is_inner_bean: bool,
) -> DependencyResult<String> {
    let base = match (
        definition.bean_class_name(),
        definition.parent_name.as_deref(),
        definition.factory_bean_name.as_deref(),
    ) {
        (Some(class_name), _, _) => class_name.to_string(),
        (None, Some(parent_name), _) => format!("{}$child", parent_name),
        (None, None, Some(factory_bean_name)) => format!("{}$created", factory_bean_name),
        (None, None, None) => {
            return Err(DependencyError::invalid_definition(
                "<未命名>",
                "定义既没有类名, 也没有父定义或工厂组件, 无法生成组件名",
            ))
        }
    };

    if is_inner_bean {
        let id = Uuid::new_v4().simple().to_string();
        return Ok(format!("{}{}{}", base, GENERATED_BEAN_NAME_SEPARATOR, &id[..8]));
    }

    let mut counter = 0usize;
    loop {
        let candidate = format!("{}{}{}", base, GENERATED_BEAN_NAME_SEPARATOR, counter);
        if !registry.is_bean_name_in_use(&candidate) {
            return Ok(candidate);
        }
        counter += 1;
    }
}

/// 注册定义及其别名
pub fn register_bean_definition(
    holder: BeanDefinitionHolder,
    registry: &dyn BeanDefinitionRegistry,
) -> DependencyResult<()> {
    let BeanDefinitionHolder {
        definition,
        name,
        aliases,
    } = holder;
    registry.register_bean_definition(&name, definition)?;
    for alias in aliases {
        registry.register_alias(&name, &alias)?;
    }
    debug!("注册组件定义及别名: {}", name);
    Ok(())
}

/// 以生成的名称注册定义, 返回生成的名称
pub fn register_with_generated_name(
    definition: BeanDefinition,
    registry: &dyn BeanDefinitionRegistry,
) -> DependencyResult<String> {
    let name = generate_bean_name(&definition, registry, false)?;
    registry.register_bean_definition(&name, definition)?;
    Ok(name)
}
