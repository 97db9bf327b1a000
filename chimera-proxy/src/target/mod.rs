//! 目标对象与目标源（TargetSource）
//!
//! 目标源决定每次调用时从哪里取得真实对象、调用结束后如何归还。
//! 静态目标源总是给出同一个对象，分发器可以只取一次并跳过归还；
//! 动态目标源每次调用都要重新获取，并且每次成功获取都必须恰好归还一次。

mod hot_swap;
mod lazy;
mod pool;
mod prototype;
mod singleton;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AopResult, Result};
use crate::method::{Arguments, Method, ReturnValue, TypeDescriptor};

pub use hot_swap::HotSwappableTargetSource;
pub use lazy::LazyInitTargetSource;
pub use pool::PoolingTargetSource;
pub use prototype::PrototypeTargetSource;
pub use singleton::SingletonTargetSource;

/// 被代理的对象
///
/// 按方法签名分派调用，相当于手写的反射入口：
/// ```ignore
/// #[async_trait]
/// impl Target for BankAccount {
///     fn type_descriptor(&self) -> TypeDescriptor { BANK_ACCOUNT }
///
///     async fn invoke(&self, method: &Method, args: &Arguments) -> Result<ReturnValue> {
///         match method.name {
///             "withdraw" => Ok(ReturnValue::new(self.withdraw(*args.require::<u64>(method, 0)?)?)),
///             _ => Err(no_such_method(BANK_ACCOUNT.name, method)),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Target: Send + Sync + 'static {
    fn type_descriptor(&self) -> TypeDescriptor;

    async fn invoke(&self, method: &Method, args: &Arguments) -> Result<ReturnValue>;
}

/// 目标对象不认识该方法时使用的错误
pub fn no_such_method(target_type: &'static str, method: &Method) -> anyhow::Error {
    crate::error::AopError::NoSuchMethod {
        target_type,
        method: method.to_string(),
    }
    .into()
}

/// 创建目标对象的工厂
pub type TargetFactory = Arc<dyn Fn() -> AopResult<Arc<dyn Target>> + Send + Sync>;

/// 目标源 Trait
pub trait TargetSource: Send + Sync {
    /// `get_target` 返回对象的类型，确实无法确定时为 None
    fn target_class(&self) -> Option<TypeDescriptor>;

    /// 是否总是返回同一个对象
    fn is_static(&self) -> bool;

    fn get_target(&self) -> AopResult<Arc<dyn Target>>;

    fn release_target(&self, target: Arc<dyn Target>) -> AopResult<()>;

    /// 用于日志和错误信息
    fn name(&self) -> &str {
        "TargetSource"
    }
}
