//! 定义值解析
//!
//! 把 [`DefinitionValue`] 解析为注入用的 [`Value`]: 字面量经过内嵌值和表达式解析,
//! 组件引用转换为组件实例, 内部组件就地创建。

use crate::factory::DefaultBeanFactory;
use di_abstractions::{
    BeanDefinition, BeanDefinitionHolder, BeanDefinitionRegistry, BeanFactory, BeanReference,
    ConfigurableBeanFactory, DefinitionValue, ExpressionContext,
};
use infrastructure_common::{DependencyError, DependencyResult, Value};
use tracing::{debug, trace};

impl DefaultBeanFactory {
    /// 解析定义中的值
    pub(crate) fn resolve_value_if_necessary(
        &self,
        bean_name: &str,
        mbd: &BeanDefinition,
        argument_name: &str,
        value: &DefinitionValue,
    ) -> DependencyResult<Value> {
        match value {
            DefinitionValue::Null => Ok(Value::Null),
            DefinitionValue::Literal(text) => self.resolve_literal(bean_name, mbd, text),
            DefinitionValue::Reference(reference) => self.resolve_reference(bean_name, reference),
            DefinitionValue::Inner(holder) => self.resolve_inner_bean(bean_name, mbd, argument_name, holder),
            DefinitionValue::List(items) => items
                .iter()
                .map(|item| self.resolve_value_if_necessary(bean_name, mbd, argument_name, item))
                .collect::<DependencyResult<Vec<_>>>()
                .map(Value::List),
            DefinitionValue::Map(entries) => entries
                .iter()
                .map(|(key, item)| {
                    self.resolve_value_if_necessary(bean_name, mbd, argument_name, item)
                        .map(|resolved| (key.clone(), resolved))
                })
                .collect::<DependencyResult<Vec<_>>>()
                .map(Value::Map),
            DefinitionValue::Object(object) => Ok(Value::Object(object.clone())),
        }
    }

    fn resolve_literal(&self, bean_name: &str, mbd: &BeanDefinition, text: &str) -> DependencyResult<Value> {
        let resolved = self
            .resolve_embedded_value(text)
            .map_err(|error| self.wrap_callback_error(bean_name, error))?;
        let evaluator = self.expression_resolver.read().clone();
        match evaluator {
            Some(evaluator) => {
                let context = ExpressionContext {
                    bean_name: bean_name.to_string(),
                    scope: mbd.effective_scope().to_string(),
                };
                evaluator
                    .evaluate(&resolved, &context)
                    .map_err(|error| self.wrap_callback_error(bean_name, error))
            }
            None => Ok(Value::Text(resolved)),
        }
    }

    /// 解析组件引用, 并登记 `bean_name` 对目标的依赖
    pub(crate) fn resolve_reference(
        &self,
        bean_name: &str,
        reference: &BeanReference,
    ) -> DependencyResult<Value> {
        if reference.to_parent {
            let parent = self.parent.as_ref().ok_or_else(|| {
                DependencyError::invalid_definition(
                    bean_name,
                    format!("引用了父容器中的组件 '{}', 但当前容器没有父容器", reference.bean_name),
                )
            })?;
            trace!("组件 {} 引用父容器中的组件 {}", bean_name, reference.bean_name);
            return parent
                .get_bean(&reference.bean_name)
                .map(Value::Object)
                .map_err(|error| self.nested_error(bean_name, error));
        }

        let value = self
            .do_get_bean(&reference.bean_name, None, None, false)
            .map_err(|error| self.nested_error(bean_name, error))?;
        let target = self.transformed_bean_name(&reference.bean_name);
        self.singletons.register_dependent_bean(&target, bean_name);
        Ok(value)
    }

    fn resolve_inner_bean(
        &self,
        outer_name: &str,
        outer: &BeanDefinition,
        argument_name: &str,
        holder: &BeanDefinitionHolder,
    ) -> DependencyResult<Value> {
        let mbd = self.merge_bean_definition(&holder.name, &holder.definition, Some(outer))?;
        let inner_name = if mbd.is_singleton() {
            self.adapt_inner_bean_name(&holder.name)
        } else {
            holder.name.clone()
        };
        debug!("为组件 {} 的 {} 创建内部组件 {}", outer_name, argument_name, inner_name);
        self.singletons.register_contained_bean(&inner_name, outer_name);

        for dependency in &mbd.depends_on {
            let dependency = self.transformed_bean_name(dependency);
            self.singletons.register_dependent_bean(&dependency, &inner_name);
            self.get_bean(&dependency)
                .map_err(|error| self.nested_error(outer_name, error))?;
        }

        let object = self
            .create_bean(&inner_name, &mbd, None)
            .map_err(|error| self.nested_error(outer_name, error))?;

        let class = self
            .class_of_object(&object)
            .filter(|class| class.is_factory_bean());
        if let Some(factory) = class
            .as_ref()
            .and_then(|class| class.as_factory_bean(object.as_ref()))
        {
            return self
                .get_object_from_factory_bean(factory, &inner_name, !mbd.synthetic)
                .map(Value::Object);
        }
        Ok(Value::Object(object))
    }

    /// 为单例内部组件生成未被占用的名称
    fn adapt_inner_bean_name(&self, inner_name: &str) -> String {
        let mut candidate = inner_name.to_string();
        let mut counter = 0;
        while self.is_bean_name_in_use(&candidate)
            || self.singletons.has_disposable(&candidate)
            || self.singletons.contains(&candidate)
        {
            counter += 1;
            candidate = format!("{}#{}", inner_name, counter);
        }
        candidate
    }
}
