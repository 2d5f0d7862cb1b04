//! Web API 层：HTTP 路由、WebSocket 网关与实时房间注册表。

pub mod auth;
pub mod error;
pub mod frames;
pub mod rooms;
pub mod routes;
pub mod state;
pub mod websocket;

pub use auth::JwtService;
pub use error::ApiError;
pub use rooms::RoomRegistry;
pub use routes::router;
pub use state::AppState;
