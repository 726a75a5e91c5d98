use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use sqlx::sqlite::SqlitePool;
use sqlx::Error as SqlxError;
use tokio::sync::Mutex;

use super::models::{OrderRecord, OrderRow, OrderUpdate, TradeRecord};
use super::{bounded, init_database, DurableStore, StoreError};

/// SQLite 기반 영구 저장소
///
/// 연결은 처음 사용할 때 맺고 이후 사이클에서 재사용합니다.
/// 접속 정보가 없거나 연결에 실패하면 해당 작업만 실패하고,
/// 다음 호출에서 다시 연결을 시도합니다.
pub struct SqliteStore {
    database_url: Option<String>,
    pool: Mutex<Option<SqlitePool>>,
    op_timeout: Duration,
}

impl SqliteStore {
    pub fn new(database_url: Option<String>, op_timeout: Duration) -> Self {
        Self {
            database_url,
            pool: Mutex::new(None),
            op_timeout,
        }
    }

    /// 이미 준비된 풀로 생성 (테이블은 호출자가 생성)
    pub fn from_pool(pool: SqlitePool, op_timeout: Duration) -> Self {
        Self {
            database_url: None,
            pool: Mutex::new(Some(pool)),
            op_timeout,
        }
    }

    async fn pool(&self) -> Result<SqlitePool, StoreError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let url = self.database_url.as_deref().ok_or(StoreError::NotConfigured)?;
        let pool = bounded(self.op_timeout, async {
            init_database(url)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))
        })
        .await?;

        info!("저장소 연결 완료");
        *guard = Some(pool.clone());
        Ok(pool)
    }
}

/// 쓰기 에러 변환 (기본 키 중복은 별도 구분)
fn write_error(err: SqlxError, key: &str) -> StoreError {
    match &err {
        SqlxError::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Constraint(key.to_string())
        }
        _ => StoreError::Backend(err),
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn find_trade(&self, unique_id: &str) -> Result<Option<TradeRecord>, StoreError> {
        let pool = self.pool().await?;
        bounded(self.op_timeout, async {
            let trade = sqlx::query_as::<_, TradeRecord>(
                "SELECT unique_id, execution_timestamp, price, qty, bid_order_id, ask_order_id
                 FROM trades
                 WHERE unique_id = ?"
            )
            .bind(unique_id)
            .fetch_optional(&pool)
            .await?;

            Ok::<_, StoreError>(trade)
        })
        .await
    }

    async fn insert_trade(&self, trade: &TradeRecord) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        bounded(self.op_timeout, async {
            sqlx::query(
                "INSERT INTO trades
                 (unique_id, execution_timestamp, price, qty, bid_order_id, ask_order_id)
                 VALUES (?, ?, ?, ?, ?, ?)"
            )
            .bind(&trade.unique_id)
            .bind(trade.execution_timestamp)
            .bind(trade.price)
            .bind(trade.qty)
            .bind(&trade.bid_order_id)
            .bind(&trade.ask_order_id)
            .execute(&pool)
            .await
            .map_err(|e| write_error(e, &trade.unique_id))?;

            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn find_order(&self, oid: &str) -> Result<Option<OrderRecord>, StoreError> {
        let pool = self.pool().await?;
        bounded(self.op_timeout, async {
            let row = sqlx::query_as::<_, OrderRow>(
                "SELECT oid, price, quantity, filled_quantity, average_price, placed_timestamp,
                        last_updates_timestamp, side, status, client_order_id
                 FROM orders
                 WHERE oid = ?"
            )
            .bind(oid)
            .fetch_optional(&pool)
            .await?;

            row.map(OrderRecord::try_from).transpose()
        })
        .await
    }

    async fn insert_order(&self, order: &OrderRecord) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        bounded(self.op_timeout, async {
            sqlx::query(
                "INSERT INTO orders
                 (oid, price, quantity, filled_quantity, average_price, placed_timestamp,
                  last_updates_timestamp, side, status, client_order_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            )
            .bind(&order.oid)
            .bind(order.price)
            .bind(order.quantity)
            .bind(order.filled_quantity)
            .bind(order.average_price)
            .bind(order.placed_timestamp)
            .bind(order.last_updates_timestamp)
            .bind(order.side.as_str())
            .bind(order.status.as_str())
            .bind(&order.client_order_id)
            .execute(&pool)
            .await
            .map_err(|e| write_error(e, &order.oid))?;

            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn update_order(&self, oid: &str, update: &OrderUpdate) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        bounded(self.op_timeout, async {
            let result = sqlx::query(
                "UPDATE orders
                 SET price = ?, quantity = ?, filled_quantity = ?, average_price = ?,
                     last_updates_timestamp = ?, status = ?, side = ?,
                     updated_at = CURRENT_TIMESTAMP
                 WHERE oid = ?"
            )
            .bind(update.price)
            .bind(update.quantity)
            .bind(update.filled_quantity)
            .bind(update.average_price)
            .bind(update.last_updates_timestamp)
            .bind(update.status.as_str())
            .bind(update.side.as_str())
            .bind(oid)
            .execute(&pool)
            .await?;

            if result.rows_affected() == 0 {
                warn!("갱신할 주문이 없음: {}", oid);
            }

            Ok::<_, StoreError>(())
        })
        .await
    }
}
