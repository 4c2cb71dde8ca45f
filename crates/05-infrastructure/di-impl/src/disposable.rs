//! 组件销毁适配器
//!
//! 把销毁前回调、[`DisposableBean`](di_abstractions::DisposableBean) 和自定义销毁方法
//! 合并为一个销毁回调。销毁过程中的错误只记录日志, 不会中断其他组件的销毁。

use di_abstractions::{
    BeanClass, BeanDefinition, BeanPostProcessor, DestroyMethodFn, DestructionCallback, DESTROY,
    INFER_METHOD,
};
use infrastructure_common::{DependencyError, DependencyResult, Object};
use std::sync::Arc;
use tracing::{debug, warn};

/// 推断销毁方法时依次尝试的方法名
const INFERRED_DESTROY_METHODS: [&str; 2] = ["close", "shutdown"];

/// 组件销毁适配器
pub struct DisposableBeanAdapter {
    bean_name: String,
    bean: Object,
    class: Option<Arc<BeanClass>>,
    invoke_disposable: bool,
    destroy_method: Option<DestroyMethodFn>,
    destroy_method_name: Option<String>,
    processors: Vec<Arc<dyn BeanPostProcessor>>,
}

impl DisposableBeanAdapter {
    /// 创建销毁适配器
    pub fn new(
        bean_name: &str,
        bean: Object,
        class: Option<Arc<BeanClass>>,
        mbd: &BeanDefinition,
        processors: Vec<Arc<dyn BeanPostProcessor>>,
    ) -> DependencyResult<Self> {
        let invoke_disposable = class
            .as_ref()
            .is_some_and(|class| class.as_disposable(bean.as_ref()).is_some());

        let mut destroy_method = None;
        let mut destroy_method_name = None;
        match mbd.destroy_method_name.as_deref() {
            None => {}
            Some(name) if name == DESTROY && invoke_disposable => {}
            Some(INFER_METHOD) => {
                if !invoke_disposable {
                    let inferred = class.as_ref().and_then(|class| {
                        INFERRED_DESTROY_METHODS.iter().find_map(|candidate| {
                            class
                                .find_destroy_method(candidate)
                                .map(|method| (candidate.to_string(), method.clone()))
                        })
                    });
                    if let Some((name, method)) = inferred {
                        debug!("推断出组件 {} 的销毁方法: {}", bean_name, name);
                        destroy_method_name = Some(name);
                        destroy_method = Some(method);
                    }
                }
            }
            Some(name) => match class.as_ref().and_then(|class| class.find_destroy_method(name)) {
                Some(method) => {
                    destroy_method_name = Some(name.to_string());
                    destroy_method = Some(method.clone());
                }
                None if mbd.enforce_destroy_method => {
                    return Err(DependencyError::invalid_definition(
                        bean_name,
                        format!("找不到销毁方法 '{}'", name),
                    ));
                }
                None => debug!("组件 {} 没有可选的销毁方法 '{}'", bean_name, name),
            },
        }

        let processors = processors
            .into_iter()
            .filter(|processor| processor.requires_destruction(&bean))
            .collect();

        Ok(Self {
            bean_name: bean_name.to_string(),
            bean,
            class,
            invoke_disposable,
            destroy_method,
            destroy_method_name,
            processors,
        })
    }

    /// 组件是否需要销毁回调
    pub fn requires_destruction(
        bean: &Object,
        class: Option<&Arc<BeanClass>>,
        mbd: &BeanDefinition,
        processors: &[Arc<dyn BeanPostProcessor>],
    ) -> bool {
        class.is_some_and(|class| class.as_disposable(bean.as_ref()).is_some())
            || mbd.destroy_method_name.is_some()
            || processors
                .iter()
                .any(|processor| processor.requires_destruction(bean))
    }

    /// 组件名
    pub fn bean_name(&self) -> &str {
        &self.bean_name
    }

    /// 执行销毁
    pub fn destroy(&self) {
        for processor in &self.processors {
            if let Err(error) = processor.post_process_before_destruction(&self.bean, &self.bean_name) {
                warn!(
                    "后置处理器 {} 在销毁组件 {} 时失败: {}",
                    processor.name(),
                    self.bean_name,
                    error
                );
            }
        }

        if self.invoke_disposable {
            let disposable = self
                .class
                .as_ref()
                .and_then(|class| class.as_disposable(self.bean.as_ref()));
            if let Some(disposable) = disposable {
                debug!("调用组件 {} 的 destroy", self.bean_name);
                if let Err(error) = disposable.destroy() {
                    warn!("组件 {} 的 destroy 失败: {}", self.bean_name, error);
                }
            }
        }

        if let (Some(method), Some(name)) = (&self.destroy_method, &self.destroy_method_name) {
            debug!("调用组件 {} 的销毁方法 '{}'", self.bean_name, name);
            if let Err(error) = method(self.bean.as_ref()) {
                warn!("组件 {} 的销毁方法 '{}' 失败: {}", self.bean_name, name, error);
            }
        }
    }

    /// 转换为销毁回调
    pub fn into_callback(self) -> DestructionCallback {
        Box::new(move || self.destroy())
    }
}

impl std::fmt::Debug for DisposableBeanAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposableBeanAdapter")
            .field("bean_name", &self.bean_name)
            .field("invoke_disposable", &self.invoke_disposable)
            .field("destroy_method", &self.destroy_method_name)
            .field("processors", &self.processors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::DisposableBean;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Pool {
        destroyed: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    impl DisposableBean for Pool {
        fn destroy(&self) -> anyhow::Result<()> {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn pool_class() -> Arc<BeanClass> {
        BeanClass::builder::<Pool>("Pool")
            .default_constructor()
            .disposable()
            .destroy_method("destroy", |pool: &Pool| {
                pool.destroyed.fetch_add(100, Ordering::SeqCst);
                Ok(())
            })
            .destroy_method("close", |pool: &Pool| {
                pool.closed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
    }

    #[test]
    fn test_destroy_named_like_callback_runs_once() {
        let pool = Pool::default();
        let destroyed = pool.destroyed.clone();
        let bean: Object = Arc::new(pool);
        let mbd = BeanDefinition::new().with_destroy_method(DESTROY);

        let adapter =
            DisposableBeanAdapter::new("pool", bean, Some(pool_class()), &mbd, Vec::new()).unwrap();
        adapter.destroy();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_custom_destroy_method_after_disposable() {
        let pool = Pool::default();
        let (destroyed, closed) = (pool.destroyed.clone(), pool.closed.clone());
        let bean: Object = Arc::new(pool);
        let mbd = BeanDefinition::new().with_destroy_method("close");

        DisposableBeanAdapter::new("pool", bean, Some(pool_class()), &mbd, Vec::new())
            .unwrap()
            .into_callback()();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_enforced_destroy_method() {
        let bean: Object = Arc::new(Pool::default());
        let mbd = BeanDefinition::new().with_destroy_method("release");
        let error =
            DisposableBeanAdapter::new("pool", bean, Some(pool_class()), &mbd, Vec::new()).unwrap_err();
        assert!(matches!(error, DependencyError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_requires_destruction() {
        let bean: Object = Arc::new(String::from("plain"));
        assert!(!DisposableBeanAdapter::requires_destruction(
            &bean,
            None,
            &BeanDefinition::new(),
            &[]
        ));
        assert!(DisposableBeanAdapter::requires_destruction(
            &bean,
            None,
            &BeanDefinition::new().with_destroy_method(INFER_METHOD),
            &[]
        ));
    }
}
