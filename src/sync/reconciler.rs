//! 캐시 → 영구 저장소 조정기
//!
//! 레코드마다 파싱, 기본 키 조회, 삽입(체결) 또는 삽입/갱신(주문)을 수행합니다.
//! 한 레코드의 실패는 로그만 남기고 다음 레코드 처리를 막지 않습니다.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};

use super::record::{parse_order, parse_trade, RecordError};
use crate::cache::{CacheSnapshot, RawOrder};
use crate::db::DurableStore;

/// 체결 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeOutcome {
    Inserted,
    /// 이미 저장된 체결 (쓰기 없음)
    AlreadyStored,
}

/// 주문 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOutcome {
    Inserted,
    Updated,
    /// 저장된 값과 동일 (쓰기 없음)
    Unchanged,
}

/// 사이클 처리 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub trades_seen: usize,
    pub trades_inserted: usize,
    pub trades_existing: usize,
    pub trades_skipped: usize,
    pub orders_seen: usize,
    pub orders_inserted: usize,
    pub orders_updated: usize,
    pub orders_unchanged: usize,
    pub orders_skipped: usize,
}

impl CycleReport {
    fn record_trade(&mut self, outcome: &Result<TradeOutcome, RecordError>) {
        self.trades_seen += 1;
        match outcome {
            Ok(TradeOutcome::Inserted) => self.trades_inserted += 1,
            Ok(TradeOutcome::AlreadyStored) => self.trades_existing += 1,
            Err(_) => self.trades_skipped += 1,
        }
    }

    fn record_order(&mut self, outcome: &Result<OrderOutcome, RecordError>) {
        self.orders_seen += 1;
        match outcome {
            Ok(OrderOutcome::Inserted) => self.orders_inserted += 1,
            Ok(OrderOutcome::Updated) => self.orders_updated += 1,
            Ok(OrderOutcome::Unchanged) => self.orders_unchanged += 1,
            Err(_) => self.orders_skipped += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.trades_skipped + self.orders_skipped
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "체결 {}건 (신규 {}, 기존 {}, 건너뜀 {}), 주문 {}건 (신규 {}, 갱신 {}, 변경없음 {}, 건너뜀 {})",
            self.trades_seen,
            self.trades_inserted,
            self.trades_existing,
            self.trades_skipped,
            self.orders_seen,
            self.orders_inserted,
            self.orders_updated,
            self.orders_unchanged,
            self.orders_skipped
        )
    }
}

/// 조정기
pub struct Reconciler {
    store: Arc<dyn DurableStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    /// 스냅샷 전체 처리 (체결 먼저, 다음 주문)
    pub async fn reconcile(&self, snapshot: &CacheSnapshot) -> CycleReport {
        let mut report = CycleReport::default();

        for raw in &snapshot.trades {
            let outcome = self.sync_trade(raw).await;
            if let Err(e) = &outcome {
                warn!("체결 데이터 처리 실패, 건너뜀: {}", e);
                debug!("건너뛴 체결 원본: {}", String::from_utf8_lossy(raw));
            }
            report.record_trade(&outcome);
        }

        for raw in &snapshot.orders {
            let outcome = self.sync_order(raw).await;
            if let Err(e) = &outcome {
                warn!("주문 {} 처리 실패, 건너뜀: {}", raw.key, e);
            }
            report.record_order(&outcome);
        }

        report
    }

    /// 체결 하나 처리 (신규만 삽입, 기존 체결은 변경하지 않음)
    pub async fn sync_trade(&self, raw: &[u8]) -> Result<TradeOutcome, RecordError> {
        let trade = parse_trade(raw)?;

        if self.store.find_trade(&trade.unique_id).await?.is_some() {
            return Ok(TradeOutcome::AlreadyStored);
        }

        self.store.insert_trade(&trade).await?;
        info!("새 체결 저장: {}", trade.unique_id);
        Ok(TradeOutcome::Inserted)
    }

    /// 주문 하나 처리 (없으면 삽입, 있으면 가변 필드만 갱신)
    pub async fn sync_order(&self, raw: &RawOrder) -> Result<OrderOutcome, RecordError> {
        let order = parse_order(raw)?;

        match self.store.find_order(&order.oid).await? {
            Some(existing) => {
                let update = order.mutable_fields();
                if existing.mutable_fields() == update {
                    debug!("주문 변경 없음: {}", order.oid);
                    return Ok(OrderOutcome::Unchanged);
                }

                self.store.update_order(&order.oid, &update).await?;
                info!("주문 갱신: {}", order.oid);
                Ok(OrderOutcome::Updated)
            }
            None => {
                self.store.insert_order(&order).await?;
                info!("새 주문 저장: {}", order.oid);
                Ok(OrderOutcome::Inserted)
            }
        }
    }
}
