//! 调用分发器
//!
//! 每次经过代理的调用都由 [`InvocationDispatcher::dispatch`] 处理：
//! 获取目标对象 → 取调用链 → 执行调用链 → 归还目标对象。

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::config::AdvisedConfig;
use crate::error::{AopResult, Result};
use crate::joinpoint::MethodInvocation;
use crate::method::{Arguments, Method, ReturnValue};
use crate::target::{Target, TargetSource};

/// 调用分发器
///
/// 与一份冻结配置一一绑定。静态目标源的目标对象只获取一次，之后直接复用。
pub struct InvocationDispatcher {
    config: Arc<AdvisedConfig>,
    static_target: OnceCell<Arc<dyn Target>>,
}

impl InvocationDispatcher {
    pub fn new(config: Arc<AdvisedConfig>) -> Self {
        Self {
            config,
            static_target: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Arc<AdvisedConfig> {
        &self.config
    }

    /// 分发一次调用
    ///
    /// 目标对象和通知抛出的错误原样返回；目标源获取失败时不执行任何通知
    pub async fn dispatch(&self, method: &Method, arguments: Arguments) -> Result<ReturnValue> {
        let lease = self.acquire()?;
        // 目标源声明不了类型时，以取到的目标对象为准
        let target_class = self
            .config
            .target_class()
            .or_else(|| Some(lease.target().type_descriptor()));
        let chain = self.config.chain_for(method, target_class);

        let result = if chain.is_empty() {
            tracing::trace!(method = %method, "No applicable advice, invoking target directly");
            lease.target().invoke(method, &arguments).await
        } else {
            tracing::trace!(method = %method, chain = chain.len(), "Proceeding through interceptor chain");
            MethodInvocation::new(
                method,
                arguments,
                lease.target(),
                target_class,
                &chain,
            )
            .proceed()
            .await
        };

        complete(result, lease.release())
    }

    fn acquire(&self) -> AopResult<TargetLease<'_>> {
        let source = self.config.target_source().as_ref();

        if source.is_static() {
            let target = self.static_target.get_or_try_init(|| {
                tracing::debug!(target_source = source.name(), "Resolving static target");
                source.get_target()
            })?;
            return Ok(TargetLease::borrowed(source, target.clone()));
        }

        let target = source.get_target()?;
        Ok(TargetLease::leased(source, target))
    }
}

/// 合并调用结果和归还结果
///
/// 两者都失败时以调用自身的错误为准，归还错误只记录日志
fn complete(result: Result<ReturnValue>, released: AopResult<()>) -> Result<ReturnValue> {
    match (result, released) {
        (result, Ok(())) => result,
        (Ok(_), Err(release_error)) => Err(release_error.into()),
        (Err(call_error), Err(release_error)) => {
            tracing::error!(
                error = %release_error,
                call_error = %call_error,
                "Failed to release target after failed invocation"
            );
            Err(call_error)
        }
    }
}

/// 一次调用持有的目标对象
///
/// 动态目标源的对象必须恰好归还一次：正常路径调用 `release` 拿到归还结果，
/// 其他退出路径（panic、future 被丢弃）由 `Drop` 兜底归还。
struct TargetLease<'a> {
    source: &'a dyn TargetSource,
    target: Arc<dyn Target>,
    pending_release: bool,
}

impl<'a> TargetLease<'a> {
    /// 来自静态目标源，不需要归还
    fn borrowed(source: &'a dyn TargetSource, target: Arc<dyn Target>) -> Self {
        Self {
            source,
            target,
            pending_release: false,
        }
    }

    fn leased(source: &'a dyn TargetSource, target: Arc<dyn Target>) -> Self {
        Self {
            source,
            target,
            pending_release: true,
        }
    }

    fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    fn release(mut self) -> AopResult<()> {
        if !self.pending_release {
            return Ok(());
        }
        self.pending_release = false;
        self.source.release_target(self.target.clone())
    }
}

impl Drop for TargetLease<'_> {
    fn drop(&mut self) {
        if !self.pending_release {
            return;
        }
        self.pending_release = false;

        tracing::debug!(target_source = self.source.name(), "Invocation abandoned, releasing target");
        if let Err(e) = self.source.release_target(self.target.clone()) {
            tracing::error!(error = %e, "Failed to release target of abandoned invocation");
        }
    }
}
