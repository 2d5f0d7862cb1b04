//! 应用层错误定义。
//!
//! 鉴权失败、空内容、重复投递都不是错误，它们以 `IngestOutcome::Dropped`
//! 的形式返回；这里只建模真正的存储 / 基础设施故障。

use domain::DomainError;
use thiserror::Error;

use crate::ports::BroadcastError;

/// 仓储错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("resource not found")]
    NotFound,

    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 缓存错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {message}")]
    Backend { message: String },
}

impl CacheError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// 应用层错误类型
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// 应用层结果类型
pub type ApplicationResult<T> = Result<T, ApplicationError>;
