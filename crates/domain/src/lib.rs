//! 领域模型层。
//!
//! 定义聊天与消息的聚合实体、值对象和领域错误，不包含任何 I/O。

pub mod chat;
pub mod errors;
pub mod message;
pub mod value_objects;

pub use chat::{Chat, ChatKind, ChatSummary};
pub use errors::{DomainError, DomainResult};
pub use message::{Message, MessageType};
pub use value_objects::{ChatId, MessageId, Timestamp, UserId};
