//! 领域模型错误定义。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 参数校验错误
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 业务规则违反
    #[error("business rule violated: {rule}")]
    RuleViolation { rule: String },
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn rule_violation(rule: impl Into<String>) -> Self {
        Self::RuleViolation { rule: rule.into() }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
