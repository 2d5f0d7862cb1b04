//! Kafka 事件日志模块。
//!
//! 消费 `chat.message-requested` 主题上的发送意图记录。

pub mod consumer;
pub mod error;

pub use consumer::EventLogConsumer;
pub use error::{KafkaError, KafkaResult};
