//! 组件后置处理器
//!
//! 容器在组件创建的各个扩展点调用已注册的后置处理器。
//! 所有回调都有默认的空实现, 处理器只需覆盖关心的扩展点。

use crate::class::BeanClass;
use crate::definition::PropertyValues;
use infrastructure_common::{Object, Ordered, LOWEST_PRECEDENCE};
use std::any::Any;
use std::sync::Arc;

/// 组件后置处理器
pub trait BeanPostProcessor: Send + Sync {
    /// 处理器名称, 同名处理器重复添加时会替换旧的
    fn name(&self) -> &str;

    /// 执行顺序, 数值越小越先执行
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }

    /// 实例化之前调用, 返回对象时跳过默认的创建流程
    fn post_process_before_instantiation(
        &self,
        _bean_class: &Arc<BeanClass>,
        _bean_name: &str,
    ) -> anyhow::Result<Option<Object>> {
        Ok(None)
    }

    /// 实例化之后、属性注入之前调用, 返回 `false` 时跳过属性注入
    fn post_process_after_instantiation(
        &self,
        _bean: &mut (dyn Any + Send + Sync),
        _bean_name: &str,
    ) -> anyhow::Result<bool> {
        Ok(true)
    }

    /// 属性注入之前调整属性值, 返回 `None` 时跳过属性注入
    fn post_process_property_values(
        &self,
        values: PropertyValues,
        _bean_class: &Arc<BeanClass>,
        _bean_name: &str,
    ) -> anyhow::Result<Option<PropertyValues>> {
        Ok(Some(values))
    }

    /// 初始化回调之前调用
    fn post_process_before_initialization(
        &self,
        _bean: &mut (dyn Any + Send + Sync),
        _bean_name: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// 初始化回调之后调用, 可以返回包装后的对象 (例如代理)
    fn post_process_after_initialization(
        &self,
        bean: Object,
        _bean_name: &str,
    ) -> anyhow::Result<Object> {
        Ok(bean)
    }

    /// 预测处理器最终暴露的组件类
    fn predict_bean_type(
        &self,
        _bean_class: &Arc<BeanClass>,
        _bean_name: &str,
    ) -> Option<Arc<BeanClass>> {
        None
    }

    /// 是否需要在组件销毁时收到通知
    fn requires_destruction(&self, _bean: &Object) -> bool {
        false
    }

    /// 组件销毁之前调用
    fn post_process_before_destruction(&self, _bean: &Object, _bean_name: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

impl Ordered for dyn BeanPostProcessor {
    fn order(&self) -> i32 {
        BeanPostProcessor::order(self)
    }
}
