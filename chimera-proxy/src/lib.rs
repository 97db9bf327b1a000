//! Chimera Proxy - AOP 代理引擎
//!
//! 为任意目标对象创建透明代理，在方法调用前后织入通知：
//! - 可组合的类型过滤器、方法匹配器和切点（静态匹配结果缓存，运行时匹配每次重算）
//! - 多种通知类型（Before、After、Around、AfterReturning、AfterThrowing），统一适配为环绕形状
//! - 可替换的目标源：单例、原型、热替换、对象池、延迟初始化
//! - 接口代理与子类代理两种策略，由纯决策表选择
//! - 通过 inventory 注册通知器并自动创建代理

pub mod advice;
pub mod advisor;
pub mod auto_proxy;
mod chain;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod error_info;
pub mod interceptors;
pub mod joinpoint;
pub mod matcher;
pub mod method;
pub mod pointcut;
pub mod proxy;
pub mod settings;
pub mod target;

#[cfg(test)]
mod testing;

// 重新导出核心类型
pub use advice::{
    Advice, AdviceType, AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice, BeforeAdvice,
    MethodInterceptor,
};
pub use advisor::{
    Advisor, AdvisorRegistration, DefaultAdvisor, DefaultPointcutAdvisor, HIGHEST_PRECEDENCE,
    LOWEST_PRECEDENCE,
};
pub use auto_proxy::{registered_advisors, AutoProxyCreator};
pub use config::{AdvisedConfig, ProxyConfig};
pub use dispatcher::InvocationDispatcher;
pub use error::{AopError, AopResult, Result};
pub use error_info::ErrorInfo;
pub use interceptors::{ExceptionLoggingAdvice, PerformanceMonitorInterceptor, TraceInterceptor};
pub use joinpoint::{JoinPoint, MethodInvocation};
pub use matcher::{ClassFilter, MethodMatcher};
pub use method::{Arguments, Method, ReturnValue, TypeDescriptor, TypeKind, ADVISED, MANAGED_PROXY};
pub use pointcut::{ExpressionPointcut, Pointcut, PointcutExpression};
pub use proxy::{
    create_proxy, AopContext, AopProxy, AopProxyFactory, DefaultAopProxyFactory, InterfaceProxy,
    ProxyFactory, ProxyStrategy, SubclassProxy,
};
pub use settings::ProxySettings;
pub use target::{Target, TargetSource};

// 导出 inventory 供注册通知器使用
pub use inventory;

/// 预导入模块
pub mod prelude {
    pub use crate::advice::*;
    pub use crate::advisor::{Advisor, AdvisorRegistration, DefaultAdvisor, DefaultPointcutAdvisor};
    pub use crate::args;
    pub use crate::config::ProxyConfig;
    pub use crate::error::{AopError, AopResult, Result};
    pub use crate::joinpoint::{JoinPoint, MethodInvocation};
    pub use crate::matcher::*;
    pub use crate::method::{Arguments, Method, ReturnValue, TypeDescriptor};
    pub use crate::pointcut::*;
    pub use crate::proxy::{create_proxy, AopContext, AopProxy, ProxyFactory};
    pub use crate::target::*;
}

/// 注册通知器，供 [`AutoProxyCreator::from_registry`] 加载
///
/// ```ignore
/// fn audit_advisor() -> Arc<dyn Advisor> {
///     Arc::new(DefaultPointcutAdvisor::for_methods(["withdraw"], Advice::before(AuditLog)))
/// }
///
/// register_advisor!("audit", audit_advisor);
/// ```
#[macro_export]
macro_rules! register_advisor {
    ($name:expr, $creator:path) => {
        $crate::inventory::submit! {
            $crate::AdvisorRegistration::new($name, $creator)
        }
    };
}
