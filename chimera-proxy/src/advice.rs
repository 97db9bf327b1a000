//! 通知（Advice）定义
//!
//! 所有通知类型最终都被适配成同一种环绕形状的 [`MethodInterceptor`]，
//! 嵌套顺序由调用链决定：外层通知先执行前置逻辑、后执行后置逻辑。

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::joinpoint::{JoinPoint, MethodInvocation};
use crate::method::ReturnValue;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdviceType {
    /// 前置通知
    Before,
    /// 后置通知（无论成功还是失败都执行）
    After,
    /// 返回后通知（成功返回时执行）
    AfterReturning,
    /// 异常通知（抛出异常时执行）
    AfterThrowing,
    /// 环绕通知（可以控制方法执行）
    Around,
}

/// 环绕通知 Trait
///
/// 可以完全控制目标方法的执行：不调用 `proceed` 即短路，也可以替换参数和返回值
#[async_trait]
pub trait MethodInterceptor: Send + Sync {
    async fn invoke(&self, invocation: MethodInvocation<'_>) -> Result<ReturnValue>;
}

/// 前置通知 Trait
///
/// 返回错误会中止调用，内层通知和目标方法都不会执行
#[async_trait]
pub trait BeforeAdvice: Send + Sync {
    async fn before(&self, join_point: &JoinPoint) -> Result<()>;
}

/// 后置通知 Trait
///
/// 在目标方法执行后调用（无论成功还是失败），不能改变调用结果
#[async_trait]
pub trait AfterAdvice: Send + Sync {
    async fn after(&self, join_point: &JoinPoint);
}

/// 返回后通知 Trait
///
/// 在目标方法成功返回后调用；返回错误会替换掉成功结果
#[async_trait]
pub trait AfterReturningAdvice: Send + Sync {
    async fn after_returning(&self, join_point: &JoinPoint, value: &ReturnValue) -> Result<()>;
}

/// 异常通知 Trait
///
/// 只观察错误，原错误对象随后继续向外传播
#[async_trait]
pub trait AfterThrowingAdvice: Send + Sync {
    async fn after_throwing(&self, join_point: &JoinPoint, error: &anyhow::Error);
}

/// 通知
///
/// 通知对象不会被复制，多个代理可以共享同一个实例
#[derive(Clone)]
pub enum Advice {
    Around(Arc<dyn MethodInterceptor>),
    Before(Arc<dyn BeforeAdvice>),
    After(Arc<dyn AfterAdvice>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    AfterThrowing(Arc<dyn AfterThrowingAdvice>),
}

impl Advice {
    pub fn around(interceptor: impl MethodInterceptor + 'static) -> Self {
        Advice::Around(Arc::new(interceptor))
    }

    pub fn before(advice: impl BeforeAdvice + 'static) -> Self {
        Advice::Before(Arc::new(advice))
    }

    pub fn after(advice: impl AfterAdvice + 'static) -> Self {
        Advice::After(Arc::new(advice))
    }

    pub fn after_returning(advice: impl AfterReturningAdvice + 'static) -> Self {
        Advice::AfterReturning(Arc::new(advice))
    }

    pub fn after_throwing(advice: impl AfterThrowingAdvice + 'static) -> Self {
        Advice::AfterThrowing(Arc::new(advice))
    }

    /// 获取通知类型
    pub fn advice_type(&self) -> AdviceType {
        match self {
            Advice::Around(_) => AdviceType::Around,
            Advice::Before(_) => AdviceType::Before,
            Advice::After(_) => AdviceType::After,
            Advice::AfterReturning(_) => AdviceType::AfterReturning,
            Advice::AfterThrowing(_) => AdviceType::AfterThrowing,
        }
    }

    /// 适配为环绕形状的拦截器
    pub fn to_interceptor(&self) -> Arc<dyn MethodInterceptor> {
        match self {
            Advice::Around(interceptor) => interceptor.clone(),
            Advice::Before(advice) => Arc::new(BeforeAdviceInterceptor(advice.clone())),
            Advice::After(advice) => Arc::new(AfterAdviceInterceptor(advice.clone())),
            Advice::AfterReturning(advice) => {
                Arc::new(AfterReturningAdviceInterceptor(advice.clone()))
            }
            Advice::AfterThrowing(advice) => {
                Arc::new(AfterThrowingAdviceInterceptor(advice.clone()))
            }
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Advice").field(&self.advice_type()).finish()
    }
}

struct BeforeAdviceInterceptor(Arc<dyn BeforeAdvice>);

#[async_trait]
impl MethodInterceptor for BeforeAdviceInterceptor {
    async fn invoke(&self, invocation: MethodInvocation<'_>) -> Result<ReturnValue> {
        self.0.before(&invocation.join_point()).await?;
        invocation.proceed().await
    }
}

struct AfterAdviceInterceptor(Arc<dyn AfterAdvice>);

#[async_trait]
impl MethodInterceptor for AfterAdviceInterceptor {
    async fn invoke(&self, invocation: MethodInvocation<'_>) -> Result<ReturnValue> {
        let join_point = invocation.join_point();
        let result = invocation.proceed().await;
        self.0.after(&join_point).await;
        result
    }
}

struct AfterReturningAdviceInterceptor(Arc<dyn AfterReturningAdvice>);

#[async_trait]
impl MethodInterceptor for AfterReturningAdviceInterceptor {
    async fn invoke(&self, invocation: MethodInvocation<'_>) -> Result<ReturnValue> {
        let join_point = invocation.join_point();
        let value = invocation.proceed().await?;
        self.0.after_returning(&join_point, &value).await?;
        Ok(value)
    }
}

struct AfterThrowingAdviceInterceptor(Arc<dyn AfterThrowingAdvice>);

#[async_trait]
impl MethodInterceptor for AfterThrowingAdviceInterceptor {
    async fn invoke(&self, invocation: MethodInvocation<'_>) -> Result<ReturnValue> {
        let join_point = invocation.join_point();
        match invocation.proceed().await {
            Ok(value) => Ok(value),
            Err(error) => {
                self.0.after_throwing(&join_point, &error).await;
                Err(error)
            }
        }
    }
}
