//! 동기화 모듈
//!
//! 캐시 스냅샷을 영구 저장소에 반영하는 조정기와, 이를 주기적으로
//! 실행하는 스케줄러를 제공합니다.

pub mod reconciler;
pub mod record;
pub mod scheduler;

pub use reconciler::{CycleReport, OrderOutcome, Reconciler, TradeOutcome};
pub use record::{parse_order, parse_trade, RecordError, REQUIRED_ORDER_FIELDS};
pub use scheduler::{Clock, SyncScheduler, SyncStats, SyncStatsSnapshot, TokioClock};
