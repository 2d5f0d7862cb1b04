//! 事件日志消费者。
//!
//! 异步摄入路径：外部生产方把发送意图写入 `chat.message-requested`，
//! 消费者组在这里逐条取出并交给摄入引擎。分区内严格串行，一条记录
//! 完整走完 `ingest` 才读下一条；跨分区由 Kafka 自身的分配并行。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message as KafkaMessage;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use application::{IngestRequest, IngestionEngine};
use config::KafkaConfig;
use domain::{ChatId, MessageType, UserId};

use super::error::{KafkaError, KafkaResult};

/// 日志上的发送意图记录。
///
/// `requestId` 必填：at-least-once 投递下它是去重的唯一依据。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendIntentRecord {
    request_id: String,
    chat_id: Uuid,
    sender_id: Uuid,
    #[serde(rename = "type")]
    message_type: MessageType,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    image_urls: Vec<String>,
}

/// 解码一条日志记录为摄入请求。
fn decode_send_intent(payload: &[u8]) -> KafkaResult<IngestRequest> {
    let record: SendIntentRecord = serde_json::from_slice(payload)?;
    Ok(IngestRequest {
        chat_id: ChatId::from(record.chat_id),
        sender_id: UserId::from(record.sender_id),
        message_type: record.message_type,
        text: record.text,
        image_urls: record.image_urls,
        request_id: Some(record.request_id),
    })
}

/// 发送意图消费者。
///
/// 显式构造、显式启停：进程启动时创建，关停时 `shutdown`，
/// 测试可以完全不触碰它（缺省配置下该路径整体关闭）。
pub struct EventLogConsumer {
    consumer: StreamConsumer,
    topic: String,
    group_id: String,
    engine: Arc<IngestionEngine>,
    shutdown_signal: Arc<AtomicBool>,
}

impl EventLogConsumer {
    pub fn new(config: &KafkaConfig, engine: Arc<IngestionEngine>) -> KafkaResult<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("group.id", &config.consumer_group_id)
            .set("bootstrap.servers", config.brokers.join(","))
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "10000")
            .set("heartbeat.interval.ms", "3000")
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "1000")
            .set("auto.offset.reset", "latest");

        let consumer: StreamConsumer =
            client_config
                .create()
                .map_err(|e| KafkaError::ConfigError {
                    message: format!("failed to create consumer: {}", e),
                })?;

        info!(
            group_id = %config.consumer_group_id,
            topic = %config.topic,
            "事件日志消费者创建成功"
        );

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
            group_id: config.consumer_group_id.clone(),
            engine,
            shutdown_signal: Arc::new(AtomicBool::new(false)),
        })
    }

    /// 订阅主题并在后台任务中运行消费循环。
    pub fn start(self: Arc<Self>) -> KafkaResult<tokio::task::JoinHandle<()>> {
        self.consumer
            .subscribe(&[&self.topic])
            .map_err(|e| KafkaError::ConsumerError {
                message: format!("failed to subscribe: {}", e),
            })?;

        info!(topic = %self.topic, "已订阅发送意图主题");

        Ok(tokio::spawn(async move { self.run().await }))
    }

    /// 消费循环。一条记录完整摄入后才读取下一条。
    async fn run(&self) {
        let mut retry_count: u32 = 0;
        const MAX_RETRIES: u32 = 5;

        while !self.shutdown_signal.load(Ordering::Relaxed) {
            match self.consumer.recv().await {
                Ok(record) => {
                    retry_count = 0;
                    let partition = record.partition();
                    let offset = record.offset();

                    let Some(payload) = record.payload() else {
                        warn!(partition, offset, "记录负载为空，跳过");
                        continue;
                    };

                    let request = match decode_send_intent(payload) {
                        Ok(request) => request,
                        Err(err) => {
                            // 坏记录不阻塞分区：记日志、跳过、继续。
                            warn!(partition, offset, error = %err, "记录解码失败，跳过");
                            continue;
                        }
                    };

                    debug!(
                        partition,
                        offset,
                        chat_id = %request.chat_id,
                        "收到发送意图记录"
                    );

                    // 存储故障：记录视为已消费，不做栈上重试，也没有
                    // 死信主题——这意味着存储不可用期间的队列消息会
                    // 丢失，属于有意保留的取舍。
                    if let Err(err) = self.engine.ingest(request).await {
                        error!(partition, offset, error = %err, "发送意图摄入失败");
                    }
                }
                Err(err) => {
                    error!(error = %err, "接收记录失败");
                    retry_count += 1;
                    if retry_count >= MAX_RETRIES {
                        error!("达到最大重试次数，消费循环退出");
                        break;
                    }
                    let delay = Duration::from_millis(1000 * 2_u64.pow(retry_count - 1));
                    warn!(?delay, "等待后重试");
                    sleep(delay).await;
                }
            }
        }

        // 循环自行退出（连续接收失败）时也要落下标志，
        // is_running 才能如实反映消费者状态。
        self.shutdown_signal.store(true, Ordering::Relaxed);
        info!(group_id = %self.group_id, "消费循环已停止");
    }

    /// 请求停止消费循环。
    pub fn shutdown(&self) {
        info!("正在关闭事件日志消费者");
        self.shutdown_signal.store(true, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown_signal.load(Ordering::Relaxed)
    }
}

impl Drop for EventLogConsumer {
    fn drop(&mut self) {
        self.shutdown_signal.store(true, Ordering::Relaxed);
    }
}
