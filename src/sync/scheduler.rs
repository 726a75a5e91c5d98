//! 동기화 스케줄러
//!
//! 프로세스 시작 즉시 첫 사이클을 실행하고, 이후에는 이전 사이클이 끝난
//! 시점부터 `interval`만큼 쉰 뒤 다음 사이클을 실행합니다 (고정 주기가 아닌
//! 쿨다운). 사이클 안의 어떤 실패(패닉 포함)도 루프를 멈추지 않습니다.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use log::{error, info};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::reconciler::{CycleReport, Reconciler};
use crate::cache::CacheReader;

/// 사이클 사이 대기 방법
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, period: Duration);
}

/// tokio 타이머 기반 시계
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, period: Duration) {
        tokio::time::sleep(period).await;
    }
}

/// 누적 동기화 통계
#[derive(Debug, Default)]
pub struct SyncStats {
    cycles: AtomicU64,
    failed_cycles: AtomicU64,
    trades_inserted: AtomicU64,
    orders_inserted: AtomicU64,
    orders_updated: AtomicU64,
    records_skipped: AtomicU64,
    last_completed_at: Mutex<Option<DateTime<Utc>>>,
}

impl SyncStats {
    fn record(&self, report: &CycleReport) {
        self.trades_inserted.fetch_add(report.trades_inserted as u64, Ordering::Relaxed);
        self.orders_inserted.fetch_add(report.orders_inserted as u64, Ordering::Relaxed);
        self.orders_updated.fetch_add(report.orders_updated as u64, Ordering::Relaxed);
        self.records_skipped.fetch_add(report.skipped() as u64, Ordering::Relaxed);
    }

    fn complete_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::SeqCst);
        *self.last_completed_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn failed_cycles(&self) -> u64 {
        self.failed_cycles.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            cycles: self.cycles(),
            failed_cycles: self.failed_cycles(),
            trades_inserted: self.trades_inserted.load(Ordering::Relaxed),
            orders_inserted: self.orders_inserted.load(Ordering::Relaxed),
            orders_updated: self.orders_updated.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            last_completed_at: *self.last_completed_at.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }
}

/// 통계 조회 결과
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatsSnapshot {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub trades_inserted: u64,
    pub orders_inserted: u64,
    pub orders_updated: u64,
    pub records_skipped: u64,
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl std::fmt::Display for SyncStatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SyncStats {{ 사이클: {}, 실패 사이클: {}, 체결 저장: {}, 주문 저장: {}, 주문 갱신: {}, 건너뜀: {} }}",
            self.cycles,
            self.failed_cycles,
            self.trades_inserted,
            self.orders_inserted,
            self.orders_updated,
            self.records_skipped
        )
    }
}

/// 동기화 스케줄러
pub struct SyncScheduler {
    reader: CacheReader,
    reconciler: Reconciler,
    clock: Arc<dyn Clock>,
    interval: Duration,
    stats: Arc<SyncStats>,
}

impl SyncScheduler {
    pub fn new(
        reader: CacheReader,
        reconciler: Reconciler,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            reader,
            reconciler,
            clock,
            interval,
            stats: Arc::new(SyncStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SyncStats> {
        self.stats.clone()
    }

    /// 사이클 한 번 실행
    ///
    /// 사이클 수준 실패는 로그를 남기고 빈 사이클로 처리합니다.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        info!("🔄 동기화 사이클 시작 ({})", cycle_id);

        let result = AssertUnwindSafe(async {
            let snapshot = self.reader.read().await;
            self.reconciler.reconcile(&snapshot).await
        })
        .catch_unwind()
        .await;

        let report = match result {
            Ok(report) => {
                self.stats.record(&report);
                info!("✅ 동기화 사이클 완료 ({}): {}", cycle_id, report);
                report
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "알 수 없는 오류".to_string());
                error!("동기화 사이클 중단 ({}): {}", cycle_id, reason);
                self.stats.failed_cycles.fetch_add(1, Ordering::SeqCst);
                CycleReport::default()
            }
        };

        self.stats.complete_cycle();
        report
    }

    /// 메인 루프 (프로세스 종료 시까지 반환하지 않음)
    pub async fn run(self: Arc<Self>) {
        info!("🚀 동기화 루프 시작 (대기 간격: {:?})", self.interval);

        loop {
            self.run_cycle().await;
            self.clock.sleep(self.interval).await;
        }
    }

    /// 백그라운드 태스크로 실행
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
