//! 错误类型
//!
//! 被拦截的方法调用统一返回 `anyhow::Result`：目标对象或通知抛出的错误原样穿过代理，
//! 调用方仍可 `downcast_ref` 到原始错误类型。代理层自身引入的失败用 [`AopError`] 表示。

use std::error::Error as StdError;

pub use anyhow::Result;

/// 代理层专属结果类型
pub type AopResult<T> = std::result::Result<T, AopError>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// 代理层错误
#[derive(Debug, thiserror::Error)]
pub enum AopError {
    /// 代理配置错误（创建代理时抛出，不重试）
    #[error("AOP configuration error: {0}")]
    Configuration(String),

    /// 配置已冻结，不允许修改
    #[error("Cannot {0}: configuration is frozen")]
    ConfigFrozen(&'static str),

    /// TargetSource 无法提供目标对象
    #[error("Failed to obtain target from '{source_name}': {message}")]
    TargetResolution {
        source_name: String,
        message: String,
        #[source]
        cause: Option<BoxError>,
    },

    /// TargetSource 无法回收目标对象
    #[error("Failed to release target to '{source_name}': {message}")]
    TargetRelease {
        source_name: String,
        message: String,
        #[source]
        cause: Option<BoxError>,
    },

    /// 方法不在代理暴露的接口范围内
    #[error("Method {0} is not exposed by this proxy")]
    MethodNotProxied(String),

    /// 目标对象不提供该方法
    #[error("No such method {method} on target type {target_type}")]
    NoSuchMethod {
        target_type: &'static str,
        method: String,
    },

    /// 参数缺失或类型不符
    #[error("Invalid argument {index} for {method}: expected {expected}")]
    InvalidArgument {
        method: String,
        index: usize,
        expected: &'static str,
    },
}

impl AopError {
    pub fn configuration(message: impl Into<String>) -> Self {
        AopError::Configuration(message.into())
    }

    pub fn resolution(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        AopError::TargetResolution {
            source_name: source_name.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn resolution_caused_by<E>(source_name: impl Into<String>, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        let cause = cause.into();
        AopError::TargetResolution {
            source_name: source_name.into(),
            message: cause.to_string(),
            cause: Some(cause),
        }
    }

    pub fn release(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        AopError::TargetRelease {
            source_name: source_name.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn release_caused_by<E>(source_name: impl Into<String>, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        let cause = cause.into();
        AopError::TargetRelease {
            source_name: source_name.into(),
            message: cause.to_string(),
            cause: Some(cause),
        }
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, AopError::TargetResolution { .. })
    }

    pub fn is_release(&self) -> bool {
        matches!(self, AopError::TargetRelease { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, AopError::Configuration(_))
    }
}

/// 从 `anyhow::Error` 中取出代理层错误（如果是的话）
pub fn as_aop_error(error: &anyhow::Error) -> Option<&AopError> {
    error.downcast_ref::<AopError>()
}
