//! WebSocket 网关。
//!
//! 网关只做三件事：握手鉴权、房间进出、把 `message:send` 原样转交
//! 摄入引擎。业务规则（成员鉴权、内容校验、落库与广播）全部在引擎里，
//! 这里不重复实现。

use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use application::{IngestOutcome, IngestRequest};
use domain::{MessageType, UserId};

use crate::frames::{ClientFrame, ServerFrame};
use crate::state::AppState;

/// 握手查询参数：`GET /ws?token=<jwt>`。
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// WebSocket 升级入口。令牌无效直接 401，不进入升级流程。
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Result<Response, StatusCode> {
    let claims = state
        .jwt_service
        .verify_token(&query.token)
        .map_err(|err| {
            warn!(error = %err, "WebSocket 握手令牌无效");
            StatusCode::UNAUTHORIZED
        })?;

    let user_id = UserId::from(claims.user_id);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: UserId) {
    let connection_id = Uuid::new_v4();
    info!(user_id = %user_id, connection_id = %connection_id, "WebSocket 连接已建立");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // 出站通道：房间广播与本连接的回执共用同一条写路径
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<ServerFrame>();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let payload = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "服务端帧序列化失败");
                    continue;
                }
            };
            if ws_sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = {
        let state = state.clone();
        let frame_tx = frame_tx.clone();
        tokio::spawn(async move {
            while let Some(Ok(message)) = ws_receiver.next().await {
                match message {
                    WsMessage::Text(raw) => {
                        handle_client_frame(&state, user_id, connection_id, &frame_tx, &raw).await;
                    }
                    WsMessage::Close(_) => break,
                    // axum 自动回应 Ping，这里只忽略
                    WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Binary(_) => {}
                }
            }
        })
    };

    // 任一任务结束即连接拆除；先中止另一侧任务，半关闭的接收任务
    // 不得在 disconnect 之后继续往注册表里加回发送端。
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.rooms.disconnect(connection_id).await;
    info!(user_id = %user_id, connection_id = %connection_id, "WebSocket 连接已断开");
}

async fn handle_client_frame(
    state: &AppState,
    user_id: UserId,
    connection_id: Uuid,
    frame_tx: &mpsc::UnboundedSender<ServerFrame>,
    raw: &str,
) {
    let frame: ClientFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(err) => {
            debug!(user_id = %user_id, error = %err, "无法解析的客户端帧");
            let _ = frame_tx.send(ServerFrame::Error {
                code: "BAD_FRAME".to_owned(),
                message: "unrecognized frame".to_owned(),
            });
            return;
        }
    };

    match frame {
        ClientFrame::ChatJoin { chat_id } => {
            // 加入前重新校验成员资格，防止拿别人的 chat_id 旁听
            match state
                .ingestion
                .authorizer()
                .is_member(chat_id, user_id)
                .await
            {
                Ok(true) => {
                    state
                        .rooms
                        .join(chat_id, connection_id, frame_tx.clone())
                        .await;
                    let _ = frame_tx.send(ServerFrame::ChatJoined { chat_id });
                }
                Ok(false) => {
                    debug!(user_id = %user_id, chat_id = %chat_id, "非会话成员的加入请求");
                    let _ = frame_tx.send(ServerFrame::Error {
                        code: "NOT_CHAT_MEMBER".to_owned(),
                        message: "not a member of this chat".to_owned(),
                    });
                }
                Err(err) => {
                    error!(user_id = %user_id, chat_id = %chat_id, error = %err, "成员校验失败");
                    let _ = frame_tx.send(ServerFrame::Error {
                        code: "JOIN_FAILED".to_owned(),
                        message: "failed to join chat".to_owned(),
                    });
                }
            }
        }
        ClientFrame::ChatLeave { chat_id } => {
            state.rooms.leave(chat_id, connection_id).await;
            let _ = frame_tx.send(ServerFrame::ChatLeft { chat_id });
        }
        ClientFrame::MessageSend {
            chat_id,
            text,
            image_urls,
            message_type,
        } => {
            // 同步路径不携带 request_id，活连接即是去重边界
            let message_type = message_type.unwrap_or(if image_urls.is_empty() {
                MessageType::Text
            } else {
                MessageType::Image
            });
            let request = IngestRequest {
                chat_id,
                sender_id: user_id,
                message_type,
                text,
                image_urls,
                request_id: None,
            };

            match state.ingestion.ingest(request).await {
                // 丢弃是稳态结果：不回执，客户端不感知
                Ok(IngestOutcome::Stored { .. }) | Ok(IngestOutcome::Dropped(_)) => {}
                Err(err) => {
                    error!(user_id = %user_id, chat_id = %chat_id, error = %err, "消息摄入失败");
                    let _ = frame_tx.send(ServerFrame::Error {
                        code: "SEND_FAILED".to_owned(),
                        message: "failed to send message".to_owned(),
                    });
                }
            }
        }
    }
}
