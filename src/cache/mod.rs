//! 캐시 읽기 모듈
//!
//! Redis에 쌓인 체결 리스트(`tradeData`)와 주문 해시(`order:*`)를 읽어
//! 동기화 사이클에 넘길 스냅샷을 만듭니다. 읽기 전용이며, 캐시 장애는
//! 경고만 남기고 빈 결과로 처리합니다.

pub mod memory;
pub mod redis_cache;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

/// 체결 데이터 리스트 키
pub const TRADE_LIST_KEY: &str = "tradeData";
/// 주문 해시 키 패턴
pub const ORDER_KEY_PATTERN: &str = "order:*";

/// 캐시 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("캐시 접속 정보가 설정되지 않음")]
    NotConfigured,
    #[error("캐시 연결 실패: {0}")]
    Connection(String),
    #[error("캐시 명령 실패: {0}")]
    Command(String),
    #[error("캐시 작업 시간 초과 ({0:?})")]
    Timeout(Duration),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Command(err.to_string())
        }
    }
}

/// 캐시 원본 주문 (필드명 → 문자열 값)
#[derive(Debug, Clone, PartialEq)]
pub struct RawOrder {
    pub key: String,
    pub fields: HashMap<String, String>,
}

/// 한 사이클 동안 읽은 캐시 내용
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    /// 리스트 순서 그대로의 직렬화된 체결 (원본 바이트, 디코딩은 레코드 단위)
    pub trades: Vec<Vec<u8>>,
    pub orders: Vec<RawOrder>,
}

impl CacheSnapshot {
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty() && self.orders.is_empty()
    }
}

/// 캐시 드라이버 계약
#[async_trait]
pub trait CacheSource: Send + Sync {
    /// `tradeData` 리스트 전체 (LRANGE 0 -1), 항목별 원본 바이트
    async fn trade_entries(&self) -> Result<Vec<Vec<u8>>, CacheError>;
    /// `order:*` 패턴에 맞는 키 목록 (원본 바이트)
    async fn order_keys(&self) -> Result<Vec<Vec<u8>>, CacheError>;
    /// 주문 해시 전체 필드 (HGETALL)
    async fn order_fields(&self, key: &str) -> Result<HashMap<String, String>, CacheError>;
}

/// 캐시 리더
///
/// 어떤 실패도 호출자에게 전파하지 않습니다. 체결과 주문은 독립적으로
/// 읽으며, 주문 하나를 읽지 못하면(UTF-8이 아닌 키 포함) 그 키만 건너뜁니다.
pub struct CacheReader {
    source: Arc<dyn CacheSource>,
}

impl CacheReader {
    pub fn new(source: Arc<dyn CacheSource>) -> Self {
        Self { source }
    }

    pub async fn read(&self) -> CacheSnapshot {
        CacheSnapshot {
            trades: self.read_trades().await,
            orders: self.read_orders().await,
        }
    }

    async fn read_trades(&self) -> Vec<Vec<u8>> {
        match self.source.trade_entries().await {
            Ok(entries) => {
                debug!("캐시 체결 {}건 조회", entries.len());
                entries
            }
            Err(e) => {
                warn!("Redis에서 체결 데이터 조회 실패: {}", e);
                Vec::new()
            }
        }
    }

    async fn read_orders(&self) -> Vec<RawOrder> {
        let keys = match self.source.order_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Redis에서 주문 키 조회 실패: {}", e);
                return Vec::new();
            }
        };

        let mut orders = Vec::with_capacity(keys.len());
        for raw_key in keys {
            let key = match String::from_utf8(raw_key) {
                Ok(key) => key,
                Err(e) => {
                    warn!("UTF-8이 아닌 주문 키 건너뜀: {:?}", String::from_utf8_lossy(e.as_bytes()));
                    continue;
                }
            };
            match self.source.order_fields(&key).await {
                // 조회 사이에 만료된 키
                Ok(fields) if fields.is_empty() => {}
                Ok(fields) => orders.push(RawOrder { key, fields }),
                Err(e) => warn!("주문 {} 조회 실패: {}", key, e),
            }
        }

        debug!("캐시 주문 {}건 조회", orders.len());
        orders
    }
}
