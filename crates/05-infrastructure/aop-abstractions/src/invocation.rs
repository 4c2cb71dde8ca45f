//! 方法调用与环绕拦截

use infrastructure_common::{Object, Throwable};
use std::fmt;

/// 方法调用的返回值, 无返回值的方法返回 `None`
pub type InvocationResult = Result<Option<Object>, Throwable>;

/// 被拦截的方法
///
/// 方法由名称和声明它的类或接口确定。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Method {
    name: String,
    declaring_class: String,
}

impl Method {
    /// 创建方法标识
    pub fn new(name: impl Into<String>, declaring_class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_class: declaring_class.into(),
        }
    }

    /// 方法名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 声明该方法的类或接口
    pub fn declaring_class(&self) -> &str {
        &self.declaring_class
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_class, self.name)
    }
}

/// 一次正在进行的方法调用
///
/// 拦截器通过 [`MethodInvocation::proceed`] 把调用交给链上的下一个元素,
/// 链的末端调用目标对象上的方法。
pub trait MethodInvocation {
    /// 被调用的方法
    fn method(&self) -> &Method;

    /// 调用参数
    fn arguments(&self) -> &[Object];

    /// 替换后续链元素看到的参数
    fn set_arguments(&mut self, arguments: Vec<Object>);

    /// 目标对象
    fn this(&self) -> Option<&Object>;

    /// 代理对象
    fn proxy(&self) -> Option<&Object>;

    /// 继续执行链上的下一个元素
    fn proceed(&mut self) -> InvocationResult;
}

/// 环绕拦截器
pub trait MethodInterceptor: Send + Sync {
    /// 拦截调用, 可以直接返回、抛出异常, 或调用 `invocation.proceed()` 继续
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult;

    /// 拦截器名称, 用于日志
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// 引入拦截器
///
/// 为代理增加目标类本身没有实现的接口。
pub trait IntroductionInterceptor: MethodInterceptor {
    /// 是否实现了给定名称的接口
    fn implements_interface(&self, interface_name: &str) -> bool;
}

impl<F> MethodInterceptor for F
where
    F: Fn(&mut dyn MethodInvocation) -> InvocationResult + Send + Sync,
{
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult {
        self(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FixedInvocation {
        method: Method,
        arguments: Vec<Object>,
    }

    impl MethodInvocation for FixedInvocation {
        fn method(&self) -> &Method {
            &self.method
        }

        fn arguments(&self) -> &[Object] {
            &self.arguments
        }

        fn set_arguments(&mut self, arguments: Vec<Object>) {
            self.arguments = arguments;
        }

        fn this(&self) -> Option<&Object> {
            None
        }

        fn proxy(&self) -> Option<&Object> {
            None
        }

        fn proceed(&mut self) -> InvocationResult {
            Ok(Some(Arc::new(self.arguments.len()) as Object))
        }
    }

    #[test]
    fn test_closure_interceptor_can_rewrite_arguments() {
        let interceptor = |invocation: &mut dyn MethodInvocation| {
            let mut arguments = invocation.arguments().to_vec();
            arguments.push(Arc::new("extra".to_string()) as Object);
            invocation.set_arguments(arguments);
            invocation.proceed()
        };
        let mut invocation = FixedInvocation {
            method: Method::new("save", "Repository"),
            arguments: Vec::new(),
        };

        let result = interceptor.invoke(&mut invocation).unwrap().unwrap();
        assert_eq!(result.downcast_ref::<usize>(), Some(&1));
        assert_eq!(invocation.method().to_string(), "Repository.save");
    }
}
