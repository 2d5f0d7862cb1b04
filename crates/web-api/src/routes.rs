//! HTTP 路由。
//!
//! REST 面只覆盖会话创建与两条读路径（最近会话、消息历史）；消息发送
//! 走 WebSocket 或事件日志，不提供 HTTP 入口。

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use domain::{Chat, ChatId, ChatKind, ChatSummary, Message, UserId};

use crate::error::ApiError;
use crate::state::AppState;
use crate::websocket::ws_handler;

#[derive(Debug, Deserialize)]
struct CreateChatPayload {
    kind: ChatKind,
    title: Option<String>,
    members: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    before: Option<Uuid>,
    limit: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chats", get(recent_chats).post(create_chat))
        .route("/chats/{chat_id}/messages", get(message_history))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn create_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateChatPayload>,
) -> Result<(StatusCode, Json<Chat>), ApiError> {
    let claims = state.jwt_service.extract_user_from_headers(&headers)?;
    let members = payload.members.into_iter().map(UserId::from).collect();

    let chat = state
        .chat_service
        .create_chat(
            UserId::from(claims.user_id),
            payload.kind,
            payload.title,
            members,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(chat)))
}

async fn recent_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChatSummary>>, ApiError> {
    let claims = state.jwt_service.extract_user_from_headers(&headers)?;
    let chats = state
        .chat_service
        .recent_chats(UserId::from(claims.user_id))
        .await?;
    Ok(Json(chats))
}

async fn message_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let claims = state.jwt_service.extract_user_from_headers(&headers)?;
    let messages = state
        .chat_service
        .message_history(
            ChatId::from(chat_id),
            UserId::from(claims.user_id),
            query.limit,
            query.before.map(Into::into),
        )
        .await?;
    Ok(Json(messages))
}
