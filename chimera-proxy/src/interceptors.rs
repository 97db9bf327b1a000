//! 预定义拦截器
//!
//! - [`TraceInterceptor`]：记录方法进入和退出
//! - [`PerformanceMonitorInterceptor`]：调用耗时超过阈值时告警
//! - [`ExceptionLoggingAdvice`]：记录方法抛出的错误及其源链

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::advice::{AfterThrowingAdvice, MethodInterceptor};
use crate::error::Result;
use crate::error_info::ErrorInfo;
use crate::joinpoint::{JoinPoint, MethodInvocation};
use crate::method::ReturnValue;

/// 日志拦截器
#[derive(Debug, Clone, Default)]
pub struct TraceInterceptor {
    log_args: bool,
}

impl TraceInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同时记录参数个数
    pub fn with_args(mut self) -> Self {
        self.log_args = true;
        self
    }
}

#[async_trait]
impl MethodInterceptor for TraceInterceptor {
    async fn invoke(&self, invocation: MethodInvocation<'_>) -> Result<ReturnValue> {
        let join_point = invocation.join_point();
        if self.log_args {
            tracing::info!("→ Entering: {} with {} args", join_point, join_point.args.len());
        } else {
            tracing::info!("→ Entering: {}", join_point);
        }

        let result = invocation.proceed().await;

        let elapsed = join_point.timestamp.elapsed();
        match &result {
            Ok(_) => tracing::info!("← Exiting: {} (took {:?})", join_point, elapsed),
            Err(e) => tracing::info!("← Exiting: {} with error: {} (took {:?})", join_point, e, elapsed),
        }
        result
    }
}

/// 性能监控拦截器
#[derive(Debug, Clone)]
pub struct PerformanceMonitorInterceptor {
    threshold: Duration,
}

impl PerformanceMonitorInterceptor {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}

#[async_trait]
impl MethodInterceptor for PerformanceMonitorInterceptor {
    async fn invoke(&self, invocation: MethodInvocation<'_>) -> Result<ReturnValue> {
        let signature = invocation.join_point().signature();
        let start = Instant::now();

        let result = invocation.proceed().await;

        let elapsed = start.elapsed();
        if elapsed > self.threshold {
            tracing::warn!(
                "⚠️ Slow method detected: {} took {}ms (threshold: {}ms)",
                signature,
                elapsed.as_millis(),
                self.threshold.as_millis()
            );
        } else {
            tracing::debug!(method = %signature, elapsed_us = elapsed.as_micros() as u64, "Method timing");
        }
        result
    }
}

/// 异常日志通知
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionLoggingAdvice;

#[async_trait]
impl AfterThrowingAdvice for ExceptionLoggingAdvice {
    async fn after_throwing(&self, join_point: &JoinPoint, error: &anyhow::Error) {
        let info = ErrorInfo::from_anyhow(error);
        tracing::error!(
            error_type = %info.error_type,
            "❌ Exception in {}: {}",
            join_point.signature(),
            info.full_description()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::Advice;
    use crate::proxy::ProxyFactory;
    use crate::testing::{BankAccount, InsufficientFunds, BALANCE, WITHDRAW};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_builtin_interceptors_are_transparent() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();

        let mut factory = ProxyFactory::new(Arc::new(BankAccount::new(100)));
        factory.add_advice(Advice::around(TraceInterceptor::new().with_args())).unwrap();
        factory
            .add_advice(Advice::around(PerformanceMonitorInterceptor::new(Duration::from_secs(5))))
            .unwrap();
        factory.add_advice(Advice::after_throwing(ExceptionLoggingAdvice)).unwrap();
        let proxy = factory.get_proxy().unwrap();

        let balance = proxy.call(&BALANCE, crate::args![]).await.unwrap();
        assert_eq!(balance.downcast::<u64>().unwrap(), 100);

        let err = proxy.call(&WITHDRAW, crate::args![500u64]).await.unwrap_err();
        assert!(err.downcast_ref::<InsufficientFunds>().is_some());
    }

    #[test]
    fn test_performance_threshold() {
        let interceptor = PerformanceMonitorInterceptor::new(Duration::from_millis(250));
        assert_eq!(interceptor.threshold(), Duration::from_millis(250));
    }
}
