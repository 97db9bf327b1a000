//! 错误信息结构
//!
//! 把调用链上抛出的错误整理成结构化信息，供异常类通知记录

use std::error::Error;

use crate::error::AopError;

/// 结构化的错误信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// 错误消息
    pub message: String,

    /// 错误来源：代理层错误为 `AopError`，否则为业务错误
    pub error_type: String,

    /// 错误源链（cause chain）
    pub source_chain: Vec<String>,
}

impl ErrorInfo {
    /// 从标准错误创建
    pub fn from_error<E: Error>(error: &E) -> Self {
        let mut source_chain = Vec::new();
        let mut current_source = error.source();
        while let Some(source) = current_source {
            source_chain.push(source.to_string());
            current_source = source.source();
        }

        Self {
            message: error.to_string(),
            error_type: std::any::type_name::<E>().to_string(),
            source_chain,
        }
    }

    /// 从调用结果中的 `anyhow::Error` 创建
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        let error_type = if error.downcast_ref::<AopError>().is_some() {
            "AopError"
        } else {
            "Application"
        };

        Self {
            message: error.to_string(),
            error_type: error_type.to_string(),
            source_chain: error.chain().skip(1).map(ToString::to_string).collect(),
        }
    }

    /// 是否是代理层引入的错误
    pub fn is_framework_error(&self) -> bool {
        self.error_type == "AopError"
    }

    /// 获取完整的错误描述（包含源链）
    pub fn full_description(&self) -> String {
        if self.source_chain.is_empty() {
            self.message.clone()
        } else {
            format!(
                "{}\nCaused by:\n  {}",
                self.message,
                self.source_chain.join("\n  ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_anyhow_chain_is_collected() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let error = Err::<(), _>(io).context("saving ledger").unwrap_err();

        let info = ErrorInfo::from_anyhow(&error);
        assert_eq!(info.message, "saving ledger");
        assert_eq!(info.source_chain, vec!["disk full".to_string()]);
        assert!(!info.is_framework_error());
        assert_eq!(info.full_description(), "saving ledger\nCaused by:\n  disk full");
    }

    #[test]
    fn test_framework_errors_are_flagged() {
        let error: anyhow::Error = AopError::resolution("pool", "exhausted").into();
        let info = ErrorInfo::from_anyhow(&error);
        assert!(info.is_framework_error());
        assert!(info.source_chain.is_empty());
    }

    #[test]
    fn test_from_std_error() {
        let error = AopError::resolution_caused_by(
            "pool",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let info = ErrorInfo::from_error(&error);
        assert!(info.error_type.ends_with("AopError"));
        assert_eq!(info.source_chain, vec!["gone".to_string()]);
    }
}
