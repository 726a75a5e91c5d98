pub mod memory;
pub mod models;
pub mod repository;

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Error as SqlxError;

pub use memory::MemoryStore;
pub use models::{OrderRecord, OrderSide, OrderStatus, OrderUpdate, TradeRecord};
pub use repository::SqliteStore;

/// 영구 저장소 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("저장소 접속 정보가 설정되지 않음")]
    NotConfigured,
    #[error("저장소 연결 실패: {0}")]
    Connection(String),
    #[error("기본 키 중복: {0}")]
    Constraint(String),
    #[error("저장소 작업 시간 초과 ({0:?})")]
    Timeout(Duration),
    #[error("저장된 레코드 손상: {0}")]
    Corrupt(String),
    #[error("저장소 오류: {0}")]
    Backend(#[from] SqlxError),
}

impl StoreError {
    /// 연결 계열 실패 여부 (다음 사이클에서 재시도됨)
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            StoreError::NotConfigured | StoreError::Connection(_) | StoreError::Timeout(_)
        )
    }
}

/// 영구 저장소 계약
///
/// 기본 키로 존재 여부를 확인한 뒤 삽입(체결) 또는 삽입/갱신(주문)합니다.
/// 동기화 작업이 유일한 기록자이며 레코드를 삭제하지 않습니다.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn find_trade(&self, unique_id: &str) -> Result<Option<TradeRecord>, StoreError>;
    /// 이미 존재하면 `StoreError::Constraint`
    async fn insert_trade(&self, trade: &TradeRecord) -> Result<(), StoreError>;
    async fn find_order(&self, oid: &str) -> Result<Option<OrderRecord>, StoreError>;
    /// 이미 존재하면 `StoreError::Constraint`
    async fn insert_order(&self, order: &OrderRecord) -> Result<(), StoreError>;
    async fn update_order(&self, oid: &str, update: &OrderUpdate) -> Result<(), StoreError>;
}

/// SQLite 데이터베이스 초기화 및 연결
pub async fn init_database(database_url: &str) -> Result<SqlitePool, SqlxError> {
    info!("🗄️  SQLite 데이터베이스 초기화 중...");

    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    // 연결 풀 생성
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // 테이블 생성
    create_tables(&pool).await?;

    info!("✅ 데이터베이스 초기화 완료");

    Ok(pool)
}

/// 필요한 테이블 생성
pub async fn create_tables(pool: &SqlitePool) -> Result<(), SqlxError> {
    // 체결 테이블
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS trades (
            unique_id TEXT PRIMARY KEY,
            execution_timestamp INTEGER NOT NULL,
            price REAL NOT NULL,
            qty REAL NOT NULL,
            bid_order_id TEXT NOT NULL,
            ask_order_id TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )"
    )
    .execute(pool)
    .await?;

    // 주문 테이블
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS orders (
            oid TEXT PRIMARY KEY,
            price REAL NOT NULL,
            quantity REAL NOT NULL,
            filled_quantity REAL NOT NULL DEFAULT 0,
            average_price REAL NOT NULL DEFAULT 0,
            placed_timestamp INTEGER NOT NULL,
            last_updates_timestamp INTEGER NOT NULL,
            side TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'OPEN',
            client_order_id TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_time ON trades(execution_timestamp)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_client ON orders(client_order_id)")
        .execute(pool)
        .await?;

    info!("📋 테이블 생성 완료");

    Ok(())
}

/// 저장소 작업에 제한 시간 적용
pub(crate) async fn bounded<T, F>(limit: Duration, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}
