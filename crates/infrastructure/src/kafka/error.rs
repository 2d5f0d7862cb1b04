//! Kafka 错误类型定义。

use thiserror::Error;

/// Kafka 操作错误
#[derive(Error, Debug)]
pub enum KafkaError {
    /// 配置错误
    #[error("kafka config error: {message}")]
    ConfigError { message: String },

    /// 消费者错误
    #[error("kafka consumer error: {message}")]
    ConsumerError { message: String },

    /// 反序列化错误
    #[error("kafka payload decode error: {message}")]
    DecodeError { message: String },
}

/// Kafka 结果类型
pub type KafkaResult<T> = Result<T, KafkaError>;

impl From<rdkafka::error::KafkaError> for KafkaError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        match err {
            rdkafka::error::KafkaError::ClientConfig(..) => KafkaError::ConfigError {
                message: err.to_string(),
            },
            _ => KafkaError::ConsumerError {
                message: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for KafkaError {
    fn from(err: serde_json::Error) -> Self {
        KafkaError::DecodeError {
            message: err.to_string(),
        }
    }
}
