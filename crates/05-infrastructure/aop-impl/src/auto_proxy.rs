//! 自动代理
//!
//! [`AutoProxyCreator`] 作为组件后置处理器注册到容器中, 在初始化完成后
//! 为能被任一通知器增强的组件创建代理。

use crate::proxy::{is_aop_proxy, ProxyFactory};
use crate::utils::find_advisors_that_can_apply;
use aop_abstractions::{is_container_proxy, Advisor, ProxyConfig};
use di_abstractions::{class_of, BeanClass, BeanPostProcessor, ClassLoader};
use infrastructure_common::{Object, LOWEST_PRECEDENCE};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace};

/// 自动代理创建器在容器中的名称
pub const AUTO_PROXY_CREATOR_NAME: &str = "autoProxyCreator";

/// 自动代理创建器
pub struct AutoProxyCreator {
    class_loader: Arc<dyn ClassLoader>,
    advisors: RwLock<Vec<Advisor>>,
    config: RwLock<ProxyConfig>,
    proxied: RwLock<Vec<String>>,
    order: i32,
}

impl AutoProxyCreator {
    /// 创建自动代理创建器, 通过类加载器解析组件的运行时类
    pub fn new(class_loader: Arc<dyn ClassLoader>) -> Self {
        Self {
            class_loader,
            advisors: RwLock::new(Vec::new()),
            config: RwLock::new(ProxyConfig::default()),
            proxied: RwLock::new(Vec::new()),
            order: LOWEST_PRECEDENCE,
        }
    }

    /// 设置代理配置
    pub fn with_config(self, config: ProxyConfig) -> Self {
        *self.config.write() = config;
        self
    }

    /// 设置执行顺序
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// 增加通知器
    pub fn with_advisor(self, advisor: Advisor) -> Self {
        self.add_advisor(advisor);
        self
    }

    /// 增加通知器, 只影响之后初始化的组件
    pub fn add_advisor(&self, advisor: Advisor) {
        self.advisors.write().push(advisor);
    }

    /// 当前的通知器
    pub fn advisors(&self) -> Vec<Advisor> {
        self.advisors.read().clone()
    }

    /// 代理配置
    pub fn config(&self) -> ProxyConfig {
        self.config.read().clone()
    }

    /// 已被代理的组件名称, 按首次代理的顺序, 不重复
    pub fn proxied_bean_names(&self) -> Vec<String> {
        self.proxied.read().clone()
    }

    fn is_infrastructure(bean: &Object, class: &BeanClass) -> bool {
        bean.downcast_ref::<Advisor>().is_some()
            || bean.downcast_ref::<AutoProxyCreator>().is_some()
            || is_aop_proxy(bean)
            || is_container_proxy(bean)
            || class.is_factory_bean()
    }

    fn wrap_if_necessary(&self, bean: Object, bean_name: &str) -> anyhow::Result<Object> {
        let Some(class) = class_of(&bean, self.class_loader.as_ref()) else {
            trace!("无法解析组件 {} 的运行时类, 不创建代理", bean_name);
            return Ok(bean);
        };
        if Self::is_infrastructure(&bean, &class) {
            trace!("组件 {} 是基础设施组件, 不创建代理", bean_name);
            return Ok(bean);
        }

        let advisors = find_advisors_that_can_apply(&self.advisors.read(), &class);
        if advisors.is_empty() {
            return Ok(bean);
        }

        let factory = ProxyFactory::for_target(bean, class.clone())?.with_config(self.config());
        for advisor in advisors {
            factory.add_advisor(advisor)?;
        }
        factory.advised().set_pre_filtered(true);
        let proxy = factory.get_proxy()?;

        debug!(
            "为组件 {} ({}) 创建自动代理, 应用 {} 个通知器",
            bean_name,
            class.name(),
            factory.advised().advisor_count()
        );
        let mut proxied = self.proxied.write();
        if !proxied.iter().any(|name| name == bean_name) {
            proxied.push(bean_name.to_string());
        }
        Ok(proxy)
    }
}

impl BeanPostProcessor for AutoProxyCreator {
    fn name(&self) -> &str {
        AUTO_PROXY_CREATOR_NAME
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn post_process_after_initialization(&self, bean: Object, bean_name: &str) -> anyhow::Result<Object> {
        self.wrap_if_necessary(bean, bean_name)
    }
}
