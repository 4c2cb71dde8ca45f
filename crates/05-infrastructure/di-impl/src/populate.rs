//! 属性注入与自动装配

use crate::factory::{is_factory_dereference, DefaultBeanFactory};
use di_abstractions::{
    AutowireMode, BeanClass, BeanDefinition, BeanFactory, BeanReference, DefinitionValue,
    DependencyCheck, HierarchicalBeanFactory, ListableBeanFactory, PropertyValues,
};
use infrastructure_common::{DependencyError, DependencyResult, TypeInfo};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, trace};

impl DefaultBeanFactory {
    /// 为实例注入属性
    pub(crate) fn populate_bean(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        class: Option<&Arc<BeanClass>>,
        bean: &mut (dyn Any + Send + Sync),
    ) -> DependencyResult<()> {
        let processors = if mbd.synthetic {
            Vec::new()
        } else {
            self.post_processors()
        };
        for processor in &processors {
            let proceed = processor
                .post_process_after_instantiation(bean, bean_name)
                .map_err(|error| self.wrap_callback_error(bean_name, error))?;
            if !proceed {
                debug!("后置处理器 {} 跳过了组件 {} 的属性注入", processor.name(), bean_name);
                return Ok(());
            }
        }

        let Some(class) = class else {
            if !mbd.property_values.is_empty() {
                return Err(DependencyError::invalid_definition(
                    bean_name,
                    "无法确定组件的类, 不能注入属性",
                ));
            }
            return Ok(());
        };

        let mut values = mbd.property_values.clone();
        match mbd.autowire_mode {
            AutowireMode::ByName => self.autowire_by_name(bean_name, class, &mut values),
            AutowireMode::ByType => self.autowire_by_type(bean_name, class, &mut values)?,
            AutowireMode::AutoDetect if class.default_constructor().is_some() => {
                self.autowire_by_type(bean_name, class, &mut values)?
            }
            _ => {}
        }

        for processor in &processors {
            match processor
                .post_process_property_values(values, class, bean_name)
                .map_err(|error| self.wrap_callback_error(bean_name, error))?
            {
                Some(adjusted) => values = adjusted,
                None => {
                    debug!("后置处理器 {} 取消了组件 {} 的属性注入", processor.name(), bean_name);
                    return Ok(());
                }
            }
        }

        self.check_dependencies(bean_name, mbd, class, &values)?;
        self.apply_property_values(bean_name, mbd, class, bean, &values)
    }

    fn autowire_by_name(&self, bean_name: &str, class: &Arc<BeanClass>, values: &mut PropertyValues) {
        for property in class.all_properties() {
            let name = property.name();
            if property.is_simple() || values.contains(name) || name == bean_name {
                continue;
            }
            if self.contains_bean(name) {
                trace!("按名称自动装配属性 {}.{}", bean_name, name);
                values.add(name, DefinitionValue::reference(name));
            } else {
                trace!("按名称自动装配: 找不到与属性 {}.{} 同名的组件", bean_name, name);
            }
        }
    }

    fn autowire_by_type(
        &self,
        bean_name: &str,
        class: &Arc<BeanClass>,
        values: &mut PropertyValues,
    ) -> DependencyResult<()> {
        for property in class.all_properties() {
            let name = property.name();
            if property.is_simple() || values.contains(name) {
                continue;
            }
            if let Some(reference) =
                self.find_autowire_candidate(bean_name, property.declared_type(), Some(name))?
            {
                trace!(
                    "按类型自动装配属性 {}.{} -> {}",
                    bean_name,
                    name,
                    reference.bean_name
                );
                values.add(name, DefinitionValue::Reference(reference));
            }
        }
        Ok(())
    }

    /// 为类型选择唯一的装配候选
    ///
    /// 只有一个候选时直接使用; 多个候选时依次取唯一的首选组件、与 `fallback_name` 同名的组件,
    /// 仍无法确定时报告不唯一。组件不会装配自己。
    pub(crate) fn find_autowire_candidate(
        &self,
        bean_name: &str,
        target: &TypeInfo,
        fallback_name: Option<&str>,
    ) -> DependencyResult<Option<BeanReference>> {
        let mut candidates: Vec<(String, bool)> = Vec::new();
        for name in self.get_bean_names_for_type(target, true, true) {
            let canonical = self.transformed_bean_name(&name);
            if canonical == bean_name || !self.is_autowire_candidate(&canonical) {
                continue;
            }
            candidates.push((name, false));
        }
        if let Some(parent) = &self.parent {
            for name in parent.get_bean_names_for_type(target, true, true) {
                let shadowed = candidates.iter().any(|(existing, _)| existing == &name)
                    || self.contains_local_bean(&name);
                if shadowed {
                    continue;
                }
                let candidate = is_factory_dereference(&name)
                    || !parent.contains_bean_definition(&name)
                    || parent
                        .get_merged_bean_definition(&name)
                        .map_or(true, |definition| definition.autowire_candidate);
                if candidate {
                    candidates.push((name, true));
                }
            }
        }

        let chosen = match candidates.len() {
            0 => return Ok(None),
            1 => 0,
            _ => self.determine_autowire_candidate(target, &candidates, fallback_name)?,
        };
        let (name, from_parent) = &candidates[chosen];
        Ok(Some(if *from_parent {
            BeanReference::to_parent(name.clone())
        } else {
            BeanReference::new(name.clone())
        }))
    }

    fn determine_autowire_candidate(
        &self,
        target: &TypeInfo,
        candidates: &[(String, bool)],
        fallback_name: Option<&str>,
    ) -> DependencyResult<usize> {
        let primaries: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, (name, from_parent))| self.is_primary(name, *from_parent))
            .map(|(index, _)| index)
            .collect();
        match primaries.as_slice() {
            [index] => return Ok(*index),
            [] => {}
            _ => {
                return Err(DependencyError::NoUniqueComponent {
                    type_name: target.name.clone(),
                    candidates: primaries
                        .iter()
                        .map(|index| candidates[*index].0.clone())
                        .collect(),
                })
            }
        }

        if let Some(fallback) = fallback_name {
            let matched = candidates.iter().position(|(name, from_parent)| {
                name == fallback
                    || (!*from_parent && self.get_aliases(name).iter().any(|alias| alias == fallback))
            });
            if let Some(index) = matched {
                return Ok(index);
            }
        }

        Err(DependencyError::NoUniqueComponent {
            type_name: target.name.clone(),
            candidates: candidates.iter().map(|(name, _)| name.clone()).collect(),
        })
    }

    fn is_autowire_candidate(&self, bean_name: &str) -> bool {
        if !self.registry.contains(bean_name) {
            return true;
        }
        self.get_merged_local_bean_definition(bean_name)
            .map_or(true, |definition| definition.autowire_candidate)
    }

    fn is_primary(&self, name: &str, from_parent: bool) -> bool {
        let bean_name = self.transformed_bean_name(name);
        if from_parent {
            return self.parent.as_ref().is_some_and(|parent| {
                parent.contains_bean_definition(&bean_name)
                    && parent
                        .get_merged_bean_definition(&bean_name)
                        .is_ok_and(|definition| definition.primary)
            });
        }
        self.registry.contains(&bean_name)
            && self
                .get_merged_local_bean_definition(&bean_name)
                .is_ok_and(|definition| definition.primary)
    }

    fn check_dependencies(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        class: &Arc<BeanClass>,
        values: &PropertyValues,
    ) -> DependencyResult<()> {
        if matches!(mbd.dependency_check, DependencyCheck::None) {
            return Ok(());
        }
        for property in class.all_properties() {
            if values.contains(property.name()) {
                continue;
            }
            let unsatisfied = match mbd.dependency_check {
                DependencyCheck::All => true,
                DependencyCheck::Simple => property.is_simple(),
                DependencyCheck::Objects => !property.is_simple(),
                DependencyCheck::None => false,
            };
            if unsatisfied {
                return Err(DependencyError::UnsatisfiedDependency {
                    name: bean_name.to_string(),
                    property: property.name().to_string(),
                    message: format!(
                        "依赖检查模式 {:?} 要求设置该属性",
                        mbd.dependency_check
                    ),
                });
            }
        }
        Ok(())
    }

    fn apply_property_values(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        class: &Arc<BeanClass>,
        bean: &mut (dyn Any + Send + Sync),
        values: &PropertyValues,
    ) -> DependencyResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        let converter = self.type_converter.read().clone();
        for property_value in values.iter() {
            let descriptor = class.find_property(&property_value.name).ok_or_else(|| {
                DependencyError::invalid_definition(
                    bean_name,
                    format!("类 {} 没有可写属性 '{}'", class.name(), property_value.name),
                )
            })?;
            let value = self.resolve_value_if_necessary(
                bean_name,
                mbd,
                &property_value.name,
                &property_value.value,
            )?;
            descriptor
                .set(bean, value, converter.as_ref())
                .map_err(|error| self.wrap_callback_error(bean_name, error))?;
            trace!("已注入属性 {}.{}", bean_name, property_value.name);
        }
        Ok(())
    }
}
