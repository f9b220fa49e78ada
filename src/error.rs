//! Supergroup Core 错误工具模块
//!
//! - 统一的错误码与错误类型
//! - 为基础设施层提供便捷的错误转换工具

use std::fmt;

use thiserror::Error;

/// 业务错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidParameter,
    ConfigurationError,
    DatabaseError,
    ServiceUnavailable,
    SerializationError,
    DeserializationError,
    OperationFailed,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::DeserializationError => "DESERIALIZATION_ERROR",
            ErrorCode::OperationFailed => "OPERATION_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 统一错误类型
#[derive(Debug, Clone, Error)]
#[error("[{code}] {reason}{}", format_details(.details))]
pub struct SupergroupError {
    pub code: ErrorCode,
    pub reason: String,
    pub details: Option<String>,
}

fn format_details(details: &Option<String>) -> String {
    details
        .as_ref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

impl SupergroupError {
    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

pub type Result<T> = std::result::Result<T, SupergroupError>;

/// 错误构建器
///
/// ```rust
/// use supergroup_core::error::{ErrorBuilder, ErrorCode};
///
/// let err = ErrorBuilder::new(ErrorCode::DatabaseError, "failed to fetch pending messages")
///     .details("connection reset")
///     .build_error();
/// assert_eq!(err.code(), ErrorCode::DatabaseError);
/// ```
pub struct ErrorBuilder {
    code: ErrorCode,
    reason: String,
    details: Option<String>,
}

impl ErrorBuilder {
    pub fn new(code: ErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            details: None,
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn build_error(self) -> SupergroupError {
        SupergroupError {
            code: self.code,
            reason: self.reason,
            details: self.details,
        }
    }
}

/// 将基础设施错误映射为业务错误
pub fn map_infra_error<E: fmt::Display>(err: E, code: ErrorCode, reason: &str) -> SupergroupError {
    ErrorBuilder::new(code, reason)
        .details(err.to_string())
        .build_error()
}

/// 基础设施结果扩展
pub trait InfraResultExt<T> {
    fn into_supergroup(self, code: ErrorCode, reason: &str) -> Result<T>;
}

impl<T, E: fmt::Display> InfraResultExt<T> for std::result::Result<T, E> {
    fn into_supergroup(self, code: ErrorCode, reason: &str) -> Result<T> {
        self.map_err(|err| map_infra_error(err, code, reason))
    }
}
