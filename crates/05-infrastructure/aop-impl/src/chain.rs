//! 拦截器链构建

use crate::adapter::global_adapter_registry;
use aop_abstractions::{Advisor, AdvisorAdapterRegistry, AdvisorChainFactory, ChainEntry, Method};
use di_abstractions::BeanClass;
use infrastructure_common::AopResult;
use std::sync::Arc;
use tracing::debug;

/// 默认的拦截器链工厂
///
/// 按通知器的注册顺序遍历:
/// 切点通知器在类过滤器和方法匹配器都通过时加入, 运行时匹配器包装成 [`ChainEntry::Dynamic`];
/// 引入通知器在类过滤器通过时无条件加入; 其他通知器总是加入。
pub struct DefaultAdvisorChainFactory {
    registry: Arc<dyn AdvisorAdapterRegistry>,
}

impl DefaultAdvisorChainFactory {
    /// 使用进程内共享的适配器注册表
    pub fn new() -> Self {
        Self {
            registry: global_adapter_registry(),
        }
    }

    /// 使用指定的适配器注册表
    pub fn with_registry(registry: Arc<dyn AdvisorAdapterRegistry>) -> Self {
        Self { registry }
    }
}

impl Default for DefaultAdvisorChainFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// 通知器中是否有与目标类匹配的引入
pub fn has_matching_introductions(advisors: &[Advisor], target_class: &BeanClass) -> bool {
    advisors.iter().any(|advisor| match advisor {
        Advisor::Introduction(introduction) => introduction.class_filter().matches(target_class),
        _ => false,
    })
}

impl AdvisorChainFactory for DefaultAdvisorChainFactory {
    fn interceptors_and_dynamic_advice(
        &self,
        advisors: &[Advisor],
        pre_filtered: bool,
        method: &Method,
        target_class: &BeanClass,
    ) -> AopResult<Vec<ChainEntry>> {
        let has_introductions = has_matching_introductions(advisors, target_class);
        let mut chain = Vec::with_capacity(advisors.len());

        for advisor in advisors {
            match advisor {
                Advisor::Pointcut(pointcut_advisor) => {
                    let pointcut = pointcut_advisor.pointcut();
                    if !pre_filtered && !pointcut.class_filter().matches(target_class) {
                        continue;
                    }
                    let matcher = pointcut.method_matcher();
                    if !matcher.matches_with_introductions(method, target_class, has_introductions) {
                        continue;
                    }
                    let interceptors = self.registry.interceptors(advisor)?;
                    if matcher.is_runtime() {
                        chain.extend(interceptors.into_iter().map(|interceptor| ChainEntry::Dynamic {
                            interceptor,
                            matcher: matcher.clone(),
                        }));
                    } else {
                        chain.extend(interceptors.into_iter().map(ChainEntry::Interceptor));
                    }
                }
                Advisor::Introduction(introduction) => {
                    if pre_filtered || introduction.class_filter().matches(target_class) {
                        let interceptors = self.registry.interceptors(advisor)?;
                        chain.extend(interceptors.into_iter().map(ChainEntry::Interceptor));
                    }
                }
                Advisor::Generic(_) => {
                    let interceptors = self.registry.interceptors(advisor)?;
                    chain.extend(interceptors.into_iter().map(ChainEntry::Interceptor));
                }
            }
        }

        debug!(
            "为 {} 上的方法 {} 构建拦截器链: {} 个元素",
            target_class.name(),
            method,
            chain.len()
        );
        Ok(chain)
    }
}
