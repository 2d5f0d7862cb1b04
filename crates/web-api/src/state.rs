//! 路由共享状态。

use std::sync::Arc;

use application::{ChatService, IngestionEngine};

use crate::auth::JwtService;
use crate::rooms::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<IngestionEngine>,
    pub chat_service: Arc<ChatService>,
    pub jwt_service: Arc<JwtService>,
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(
        ingestion: Arc<IngestionEngine>,
        chat_service: Arc<ChatService>,
        jwt_service: Arc<JwtService>,
        rooms: Arc<RoomRegistry>,
    ) -> Self {
        Self {
            ingestion,
            chat_service,
            jwt_service,
            rooms,
        }
    }
}
