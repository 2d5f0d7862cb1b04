//! 房间注册表：chat_id -> 已加入连接的出站通道。
//!
//! 注册表只管投递，不做成员校验；加入前的鉴权发生在 WebSocket 网关。

use std::collections::HashMap;

use application::{BroadcastError, ChatBroadcaster, MessageBroadcast};
use async_trait::async_trait;
use domain::ChatId;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::frames::{MessageNewPayload, ServerFrame};

/// 每条 WebSocket 连接的唯一标识。
pub type ConnectionId = Uuid;

type FrameSender = mpsc::UnboundedSender<ServerFrame>;

#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<ChatId, HashMap<ConnectionId, FrameSender>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn join(&self, chat_id: ChatId, connection_id: ConnectionId, sender: FrameSender) {
        let mut rooms = self.rooms.write().await;
        rooms.entry(chat_id).or_default().insert(connection_id, sender);
    }

    pub async fn leave(&self, chat_id: ChatId, connection_id: ConnectionId) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(&chat_id) {
            room.remove(&connection_id);
            if room.is_empty() {
                rooms.remove(&chat_id);
            }
        }
    }

    /// 连接断开时把它从所有房间移除。
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, room| {
            room.remove(&connection_id);
            !room.is_empty()
        });
    }

    #[cfg(test)]
    async fn connections_in(&self, chat_id: ChatId) -> usize {
        self.rooms
            .read()
            .await
            .get(&chat_id)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl ChatBroadcaster for RoomRegistry {
    async fn broadcast(&self, payload: MessageBroadcast) -> Result<(), BroadcastError> {
        let chat_id = payload.chat_id;
        let frame = ServerFrame::MessageNew(MessageNewPayload::from(payload));

        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(&chat_id) else {
            // 没人加入房间，静默空操作
            return Ok(());
        };
        for sender in room.values() {
            // 接收端已关闭说明连接正在拆除，交给 disconnect 清理
            let _ = sender.send(frame.clone());
        }
        Ok(())
    }
}
