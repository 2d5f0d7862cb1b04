//! 服务入口：装配存储、缓存、摄入引擎与两条接入路径。

use std::sync::Arc;

use application::{
    ChatService, ChatServiceDependencies, IngestionDependencies, IngestionEngine, SystemClock,
};
use config::AppConfig;
use infrastructure::{
    create_pg_pool, EventLogConsumer, PgChatRepository, PgMessageRepository, PgProfileLookup,
    RedisChatCache,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService, RoomRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;

    tracing::info!(
        database = config.database.url.split('@').next_back().unwrap_or("unknown"),
        "连接数据库"
    );
    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;

    // 运行迁移
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    let redis_cache = Arc::new(RedisChatCache::connect(&config.redis.url).await?);

    let chats = Arc::new(PgChatRepository::new(pg_pool.clone()));
    let messages = Arc::new(PgMessageRepository::new(pg_pool.clone()));
    let profiles = Arc::new(PgProfileLookup::new(pg_pool));
    let clock = Arc::new(SystemClock::default());
    let rooms = Arc::new(RoomRegistry::new());

    let ingestion = Arc::new(IngestionEngine::new(IngestionDependencies {
        chats: chats.clone(),
        messages: messages.clone(),
        idempotency: redis_cache.clone(),
        recent_chats: redis_cache.clone(),
        broadcaster: rooms.clone(),
        profiles,
        clock: clock.clone(),
    }));

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        chats,
        messages,
        recent_chats: redis_cache,
        clock,
    }));

    let jwt_service = Arc::new(JwtService::new(&config.jwt));

    // 可选的事件日志摄入路径
    let consumer = match &config.kafka {
        Some(kafka_config) => {
            let consumer = Arc::new(EventLogConsumer::new(kafka_config, ingestion.clone())?);
            consumer.clone().start()?;
            tracing::info!(topic = %kafka_config.topic, "事件日志消费者已启动");
            Some(consumer)
        }
        None => {
            tracing::info!("未配置 Kafka，事件日志摄入路径关闭");
            None
        }
    };

    let state = AppState::new(ingestion, chat_service, jwt_service, rooms);
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("聊天服务器启动在 http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(consumer) = consumer {
        consumer.shutdown();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "无法监听关停信号");
        return;
    }
    tracing::info!("收到关停信号，开始优雅退出");
}
