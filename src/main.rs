use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};

use trade_sync::cache::{CacheReader, RedisCache};
use trade_sync::config::SyncConfig;
use trade_sync::db::SqliteStore;
use trade_sync::server::{self, ServerConfig};
use trade_sync::sync::{Reconciler, SyncScheduler, TokioClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경 변수 로드 (.env가 없어도 계속 진행)
    dotenv::dotenv().ok();

    // 로깅 초기화
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("trade-sync 시작");
    let config = SyncConfig::from_env();

    // Redis 연결 확인 (실패해도 다음 사이클에서 재시도)
    let cache = Arc::new(RedisCache::new(&config.cache, config.operation_timeout));
    match cache.ping().await {
        Ok(()) => info!("Redis 연결 확인"),
        Err(e) => warn!("Redis 연결 실패: {}", e),
    }

    let store = Arc::new(SqliteStore::new(config.database_url.clone(), config.operation_timeout));
    if config.database_url.is_none() {
        warn!("DATABASE_URL이 설정되지 않음, 저장 작업이 모두 실패합니다");
    }

    // 백그라운드 동기화 루프
    let scheduler = Arc::new(SyncScheduler::new(
        CacheReader::new(cache),
        Reconciler::new(store),
        Arc::new(TokioClock),
        config.sync_interval,
    ));
    scheduler.spawn();

    server::start_server(ServerConfig {
        rest_port: config.http_port,
    })
    .await
    .context("HTTP 서버 실행 실패")?;

    Ok(())
}
