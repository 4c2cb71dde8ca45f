//! 代理配置的运行时状态

use crate::adapter::global_adapter_registry;
use crate::chain::DefaultAdvisorChainFactory;
use aop_abstractions::{
    Advice, Advisor, AdvisorAdapterRegistry, AdvisorChainFactory, ChainEntry, Method, ProxyConfig,
    CONTAINER_PROXY,
};
use dashmap::DashMap;
use di_abstractions::BeanClass;
use infrastructure_common::{AopError, AopResult, Object, TypeInfo};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// 被代理对象的通知配置
///
/// 保存目标对象、代理接口和通知器, 并按方法缓存拦截器链。
/// 通知器或目标变化时缓存失效; 配置冻结后拒绝修改通知器。
/// 已创建的代理与配置共享同一份状态。
pub struct AdvisedSupport {
    config: RwLock<ProxyConfig>,
    pre_filtered: AtomicBool,
    target: RwLock<Option<Object>>,
    target_class: RwLock<Option<Arc<BeanClass>>>,
    interfaces: RwLock<Vec<Arc<BeanClass>>>,
    advisors: RwLock<Vec<Advisor>>,
    chain_factory: Arc<dyn AdvisorChainFactory>,
    adapter_registry: Arc<dyn AdvisorAdapterRegistry>,
    method_cache: DashMap<Method, Arc<Vec<ChainEntry>>>,
    chain_generation: AtomicU64,
}

impl AdvisedSupport {
    /// 使用默认的链工厂和共享的适配器注册表创建空配置
    pub fn new() -> Self {
        Self::with_factories(
            Arc::new(DefaultAdvisorChainFactory::new()),
            global_adapter_registry(),
        )
    }

    /// 使用指定的链工厂和适配器注册表创建空配置
    pub fn with_factories(
        chain_factory: Arc<dyn AdvisorChainFactory>,
        adapter_registry: Arc<dyn AdvisorAdapterRegistry>,
    ) -> Self {
        Self {
            config: RwLock::new(ProxyConfig::default()),
            pre_filtered: AtomicBool::new(false),
            target: RwLock::new(None),
            target_class: RwLock::new(None),
            interfaces: RwLock::new(Vec::new()),
            advisors: RwLock::new(Vec::new()),
            chain_factory,
            adapter_registry,
            method_cache: DashMap::new(),
            chain_generation: AtomicU64::new(0),
        }
    }

    /// 代理配置
    pub fn config(&self) -> ProxyConfig {
        self.config.read().clone()
    }

    /// 替换代理配置
    pub fn set_config(&self, config: ProxyConfig) {
        *self.config.write() = config;
    }

    /// 冻结或解冻配置
    pub fn set_frozen(&self, frozen: bool) {
        self.config.write().frozen = frozen;
    }

    /// 配置是否已冻结
    pub fn is_frozen(&self) -> bool {
        self.config.read().frozen
    }

    /// 标记通知器已按目标类筛选过
    pub fn set_pre_filtered(&self, pre_filtered: bool) {
        self.pre_filtered.store(pre_filtered, Ordering::Release);
        self.advice_changed();
    }

    /// 通知器是否已按目标类筛选过
    pub fn is_pre_filtered(&self) -> bool {
        self.pre_filtered.load(Ordering::Acquire)
    }

    /// 设置目标对象及其类
    pub fn set_target(&self, target: Object, target_class: Arc<BeanClass>) {
        *self.target.write() = Some(target);
        *self.target_class.write() = Some(target_class);
        self.advice_changed();
    }

    /// 只设置目标类 (没有目标对象的接口代理)
    pub fn set_target_class(&self, target_class: Arc<BeanClass>) {
        *self.target_class.write() = Some(target_class);
        self.advice_changed();
    }

    /// 目标对象
    pub fn target(&self) -> Option<Object> {
        self.target.read().clone()
    }

    /// 目标类
    pub fn target_class(&self) -> Option<Arc<BeanClass>> {
        self.target_class.read().clone()
    }

    /// 增加代理接口
    pub fn add_interface(&self, interface: Arc<BeanClass>) -> AopResult<()> {
        if !interface.is_interface() {
            return Err(AopError::illegal_argument(format!(
                "{} 不是接口, 不能作为代理接口",
                interface.name()
            )));
        }
        let mut interfaces = self.interfaces.write();
        if !interfaces
            .iter()
            .any(|existing| existing.name() == interface.name())
        {
            trace!("增加代理接口: {}", interface.name());
            interfaces.push(interface);
        }
        drop(interfaces);
        self.advice_changed();
        Ok(())
    }

    /// 移除代理接口
    pub fn remove_interface(&self, interface_name: &str) -> bool {
        let mut interfaces = self.interfaces.write();
        let before = interfaces.len();
        interfaces.retain(|interface| interface.name() != interface_name);
        let removed = interfaces.len() != before;
        drop(interfaces);
        if removed {
            self.advice_changed();
        }
        removed
    }

    /// 代理接口
    pub fn interfaces(&self) -> Vec<Arc<BeanClass>> {
        self.interfaces.read().clone()
    }

    /// 是否代理了给定接口 (包括其子接口)
    pub fn is_interface_proxied(&self, interface_name: &str) -> bool {
        let target = TypeInfo::named(interface_name);
        self.interfaces
            .read()
            .iter()
            .any(|interface| interface.is_assignable_to(&target))
    }

    /// 除框架标记接口以外是否没有代理接口
    pub fn has_no_user_supplied_interfaces(&self) -> bool {
        self.interfaces
            .read()
            .iter()
            .all(|interface| interface.name() == CONTAINER_PROXY)
    }

    /// 增加通知, 通知会被包装成适用于所有方法的通知器
    pub fn add_advice(&self, advice: Advice) -> AopResult<()> {
        let advisor = self.adapter_registry.wrap(advice)?;
        self.add_advisor(advisor)
    }

    /// 在末尾增加通知器
    pub fn add_advisor(&self, advisor: Advisor) -> AopResult<()> {
        let position = self.advisor_count();
        self.add_advisor_at(position, advisor)
    }

    /// 在指定位置增加通知器
    ///
    /// 引入通知器会先校验引入的接口, 然后把这些接口加入代理接口。
    pub fn add_advisor_at(&self, position: usize, advisor: Advisor) -> AopResult<()> {
        self.check_not_frozen()?;
        if let Advisor::Introduction(introduction) = &advisor {
            introduction.validate_interfaces()?;
            for interface in introduction.interfaces() {
                self.add_interface(interface)?;
            }
        }
        let mut advisors = self.advisors.write();
        if position > advisors.len() {
            return Err(AopError::illegal_argument(format!(
                "通知器位置 {} 超出范围, 当前共 {} 个通知器",
                position,
                advisors.len()
            )));
        }
        debug!("在位置 {} 增加通知器: {:?}", position, advisor);
        advisors.insert(position, advisor);
        drop(advisors);
        self.advice_changed();
        Ok(())
    }

    /// 移除指定位置的通知器
    pub fn remove_advisor(&self, index: usize) -> AopResult<Advisor> {
        self.check_not_frozen()?;
        let mut advisors = self.advisors.write();
        if index >= advisors.len() {
            return Err(AopError::illegal_argument(format!(
                "通知器下标 {} 超出范围, 当前共 {} 个通知器",
                index,
                advisors.len()
            )));
        }
        let removed = advisors.remove(index);
        drop(advisors);
        self.advice_changed();
        Ok(removed)
    }

    /// 通知器快照
    pub fn advisors(&self) -> Vec<Advisor> {
        self.advisors.read().clone()
    }

    /// 通知器数量
    pub fn advisor_count(&self) -> usize {
        self.advisors.read().len()
    }

    /// 适配器注册表
    pub fn adapter_registry(&self) -> &Arc<dyn AdvisorAdapterRegistry> {
        &self.adapter_registry
    }

    /// 方法的拦截器链, 首次请求时构建并缓存
    pub fn chain_for(&self, method: &Method, target_class: &BeanClass) -> AopResult<Arc<Vec<ChainEntry>>> {
        if let Some(cached) = self.method_cache.get(method) {
            return Ok(cached.clone());
        }
        let generation = self.chain_generation.load(Ordering::Acquire);
        let advisors = self.advisors();
        let chain = Arc::new(self.chain_factory.interceptors_and_dynamic_advice(
            &advisors,
            self.is_pre_filtered(),
            method,
            target_class,
        )?);
        self.method_cache.insert(method.clone(), chain.clone());
        // 构建期间通知配置变化时, 链可能来自旧的通知器, 不能留在缓存里
        if self.chain_generation.load(Ordering::Acquire) != generation {
            trace!("构建拦截器链期间通知配置变化, 丢弃缓存: {}", method);
            self.method_cache
                .remove_if(method, |_, cached| Arc::ptr_eq(cached, &chain));
        }
        Ok(chain)
    }

    /// 已缓存拦截器链的方法数量
    pub fn cached_chain_count(&self) -> usize {
        self.method_cache.len()
    }

    /// 通知配置变化, 清空拦截器链缓存
    pub fn advice_changed(&self) {
        self.chain_generation.fetch_add(1, Ordering::AcqRel);
        if !self.method_cache.is_empty() {
            trace!("通知配置变化, 清空 {} 条拦截器链缓存", self.method_cache.len());
        }
        self.method_cache.clear();
    }

    fn check_not_frozen(&self) -> AopResult<()> {
        if self.is_frozen() {
            return Err(AopError::config("代理配置已冻结, 不能修改通知器"));
        }
        Ok(())
    }
}

impl Default for AdvisedSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AdvisedSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisedSupport")
            .field("config", &*self.config.read())
            .field(
                "target_class",
                &self.target_class.read().as_ref().map(|class| class.name().to_string()),
            )
            .field(
                "interfaces",
                &self
                    .interfaces
                    .read()
                    .iter()
                    .map(|interface| interface.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .field("advisors", &self.advisor_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::DefaultPointcutAdvisor;
    use aop_abstractions::{InvocationResult, MethodInterceptor, MethodInvocation};
    use parking_lot::Mutex;
    use std::sync::Weak;

    struct PassThrough;

    impl MethodInterceptor for PassThrough {
        fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult {
            invocation.proceed()
        }
    }

    #[derive(Default)]
    struct Mailer;

    fn mailer_class() -> Arc<BeanClass> {
        BeanClass::builder::<Mailer>("Mailer")
            .method("send", |_mailer: &Mailer, _args| Ok(None))
            .build()
    }

    #[test]
    fn test_chain_cache_invalidated_on_advisor_change() {
        let support = AdvisedSupport::new();
        let class = mailer_class();
        support.set_target(Arc::new(Mailer), class.clone());
        let send = Method::new("send", "Mailer");

        support.add_advice(Advice::interceptor(PassThrough)).unwrap();
        assert_eq!(support.chain_for(&send, &class).unwrap().len(), 1);
        assert_eq!(support.cached_chain_count(), 1);

        support
            .add_advisor(DefaultPointcutAdvisor::for_methods(["send"], Advice::interceptor(PassThrough)).into_advisor())
            .unwrap();
        assert_eq!(support.cached_chain_count(), 0);
        assert_eq!(support.chain_for(&send, &class).unwrap().len(), 2);

        support.remove_advisor(0).unwrap();
        assert_eq!(support.chain_for(&send, &class).unwrap().len(), 1);
    }

    /// 构建链的同时修改通知配置
    struct ChangingChainFactory {
        support: Mutex<Option<Weak<AdvisedSupport>>>,
        inner: DefaultAdvisorChainFactory,
    }

    impl AdvisorChainFactory for ChangingChainFactory {
        fn interceptors_and_dynamic_advice(
            &self,
            advisors: &[Advisor],
            pre_filtered: bool,
            method: &Method,
            target_class: &BeanClass,
        ) -> AopResult<Vec<ChainEntry>> {
            let chain = self
                .inner
                .interceptors_and_dynamic_advice(advisors, pre_filtered, method, target_class)?;
            if let Some(support) = self.support.lock().take().and_then(|support| support.upgrade()) {
                support
                    .add_advisor(DefaultPointcutAdvisor::always(Advice::interceptor(PassThrough)).into_advisor())
                    .unwrap();
            }
            Ok(chain)
        }
    }

    #[test]
    fn test_chain_built_during_change_is_not_cached() {
        let chain_factory = Arc::new(ChangingChainFactory {
            support: Mutex::new(None),
            inner: DefaultAdvisorChainFactory::new(),
        });
        let support = Arc::new(AdvisedSupport::with_factories(
            chain_factory.clone(),
            global_adapter_registry(),
        ));
        *chain_factory.support.lock() = Some(Arc::downgrade(&support));
        let class = mailer_class();
        support.set_target(Arc::new(Mailer), class.clone());
        let send = Method::new("send", "Mailer");
        support.add_advice(Advice::interceptor(PassThrough)).unwrap();

        assert_eq!(support.chain_for(&send, &class).unwrap().len(), 1);
        assert_eq!(support.cached_chain_count(), 0);

        assert_eq!(support.chain_for(&send, &class).unwrap().len(), 2);
        assert_eq!(support.cached_chain_count(), 1);
    }

    #[test]
    fn test_frozen_config_rejects_changes() {
        let support = AdvisedSupport::new();
        support.set_frozen(true);
        let error = support.add_advice(Advice::interceptor(PassThrough)).unwrap_err();
        assert!(matches!(error, AopError::Config { .. }));
        assert!(support.remove_advisor(0).is_err());
    }

    #[test]
    fn test_interfaces_must_be_interfaces() {
        let support = AdvisedSupport::new();
        assert!(support.add_interface(mailer_class()).is_err());

        let sender = BeanClass::interface("Sender").method("send").build();
        support.add_interface(sender.clone()).unwrap();
        support.add_interface(sender).unwrap();
        assert_eq!(support.interfaces().len(), 1);
        assert!(support.is_interface_proxied("Sender"));
        assert!(!support.has_no_user_supplied_interfaces());
        assert!(support.remove_interface("Sender"));
        assert!(support.has_no_user_supplied_interfaces());
    }

    #[test]
    fn test_advisor_position_is_checked() {
        let support = AdvisedSupport::new();
        let advisor = DefaultPointcutAdvisor::always(Advice::interceptor(PassThrough)).into_advisor();
        assert!(support.add_advisor_at(3, advisor).is_err());
    }
}
