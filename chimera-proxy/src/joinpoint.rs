//! 连接点（JoinPoint）定义
//!
//! 连接点表示一次具体的方法调用。[`JoinPoint`] 是交给前置/后置类通知的只读快照，
//! [`MethodInvocation`] 是交给环绕通知的可继续执行的调用链游标。

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::chain::ChainEntry;
use crate::error::Result;
use crate::method::{Arguments, Method, ReturnValue, TypeDescriptor};
use crate::target::Target;

/// 连接点信息
///
/// 包含方法调用时的上下文信息
#[derive(Clone)]
pub struct JoinPoint {
    /// 被调用的方法
    pub method: Method,

    /// 目标类型（TargetSource 无法确定时为 None）
    pub target_class: Option<TypeDescriptor>,

    /// 方法参数
    pub args: Arguments,

    /// 调用时间戳
    pub timestamp: Instant,
}

impl JoinPoint {
    pub fn new(method: Method, target_class: Option<TypeDescriptor>, args: Arguments) -> Self {
        Self {
            method,
            target_class,
            args,
            timestamp: Instant::now(),
        }
    }

    /// 获取完整的方法签名
    pub fn signature(&self) -> String {
        match &self.target_class {
            Some(class) => format!("{}.{}", class.name, self.method.name),
            None => self.method.to_string(),
        }
    }

    /// 获取目标类型名称
    pub fn get_target_type(&self) -> Option<&'static str> {
        self.target_class.map(|class| class.name)
    }

    /// 获取方法名称
    pub fn get_method_name(&self) -> &'static str {
        self.method.name
    }

    /// 尝试获取参数
    pub fn get_arg<T: Any>(&self, index: usize) -> Option<&T> {
        self.args.get::<T>(index)
    }
}

impl fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("method", &self.method)
            .field("signature", &self.signature())
            .field("args", &self.args)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// 环绕通知的执行链
///
/// `proceed` 会消耗自身，因此每个通知最多只能继续一次；
/// 不调用 `proceed` 即短路剩余的通知和目标方法。
pub struct MethodInvocation<'a> {
    method: &'a Method,
    arguments: Arguments,
    target: &'a Arc<dyn Target>,
    target_class: Option<TypeDescriptor>,
    chain: &'a [ChainEntry],
    index: usize,
    timestamp: Instant,
}

impl<'a> MethodInvocation<'a> {
    pub(crate) fn new(
        method: &'a Method,
        arguments: Arguments,
        target: &'a Arc<dyn Target>,
        target_class: Option<TypeDescriptor>,
        chain: &'a [ChainEntry],
    ) -> Self {
        Self {
            method,
            arguments,
            target,
            target_class,
            chain,
            index: 0,
            timestamp: Instant::now(),
        }
    }

    pub fn method(&self) -> &Method {
        self.method
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// 修改后续通知和目标方法看到的参数
    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    pub fn set_arguments(&mut self, arguments: Arguments) {
        self.arguments = arguments;
    }

    pub fn target_class(&self) -> Option<&TypeDescriptor> {
        self.target_class.as_ref()
    }

    /// 当前调用的目标对象
    pub fn target(&self) -> &Arc<dyn Target> {
        self.target
    }

    /// 当前调用的快照
    pub fn join_point(&self) -> JoinPoint {
        JoinPoint {
            method: *self.method,
            target_class: self.target_class,
            args: self.arguments.clone(),
            timestamp: self.timestamp,
        }
    }

    /// 继续执行链上的下一个通知，链尾是对目标对象的真实调用
    pub async fn proceed(mut self) -> Result<ReturnValue> {
        let chain = self.chain;
        while let Some(entry) = chain.get(self.index) {
            self.index += 1;
            match entry {
                ChainEntry::Static(interceptor) => return interceptor.invoke(self).await,
                ChainEntry::Dynamic {
                    interceptor,
                    matcher,
                } => {
                    // 动态匹配器每次调用都用实参重新判断，不走缓存
                    let class = TypeDescriptor::effective(self.target_class, self.method);
                    if matcher.matches_with_args(self.method, &class, &self.arguments) {
                        return interceptor.invoke(self).await;
                    }
                    tracing::trace!(
                        method = %self.method,
                        position = self.index - 1,
                        "Dynamic matcher rejected call, skipping interceptor"
                    );
                }
            }
        }

        self.target.invoke(self.method, &self.arguments).await
    }
}

impl fmt::Debug for MethodInvocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvocation")
            .field("method", self.method)
            .field("position", &self.index)
            .field("chain_len", &self.chain.len())
            .finish()
    }
}
