//! 동기화 통합 테스트
//!
//! 인메모리 캐시/저장소로 전체 사이클(캐시 읽기 → 조정 → 저장)을 검증합니다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use trade_sync::api::LIVENESS_MESSAGE;
use trade_sync::cache::{CacheReader, MemoryCache};
use trade_sync::db::{DurableStore, MemoryStore, OrderRecord, OrderStatus, OrderUpdate, StoreError, TradeRecord};
use trade_sync::server::build_app;
use trade_sync::sync::{Clock, Reconciler, SyncScheduler, SyncStats};

const T1: &str = r#"{"unique_id":"T1","execution_timestamp":1000,"price":10.5,"qty":2,"bid_order_id":"B1","ask_order_id":"A1"}"#;

const O1: [(&str, &str); 10] = [
    ("oid", "O1"),
    ("price", "100.0"),
    ("quantity", "5"),
    ("filledQuantity", "0"),
    ("averagePrice", "0"),
    ("placedTimestamp", "1000"),
    ("lastUpdatesTimestamp", "1000"),
    ("side", "BUY"),
    ("status", "PARTIALLY FILLED"),
    ("clientOrderId", "C1"),
];

/// 대기 요청을 기록하고, 허가가 주어질 때까지 다음 사이클을 막는 시계
struct SteppedClock {
    sleeps: Mutex<Vec<Duration>>,
    gate: Semaphore,
}

impl SteppedClock {
    fn new() -> Self {
        Self {
            sleeps: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
        }
    }

    fn release(&self) {
        self.gate.add_permits(1);
    }

    fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for SteppedClock {
    async fn sleep(&self, period: Duration) {
        self.sleeps.lock().unwrap().push(period);
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
    }
}

async fn wait_for_cycles(stats: &SyncStats, cycles: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while stats.cycles() < cycles {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("사이클이 완료되지 않음");
}

fn scheduler(cache: Arc<MemoryCache>, store: Arc<dyn DurableStore>, clock: Arc<dyn Clock>) -> SyncScheduler {
    SyncScheduler::new(
        CacheReader::new(cache),
        Reconciler::new(store),
        clock,
        Duration::from_secs(30),
    )
}

/// 빈 저장소에 체결 하나 동기화
#[tokio::test]
async fn test_trade_scenario() {
    println!("🧪 체결 동기화 시나리오");
    let cache = Arc::new(MemoryCache::new());
    cache.push_trade(T1);
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler(cache, store.clone(), Arc::new(SteppedClock::new()));

    scheduler.run_cycle().await;

    assert_eq!(store.trade_count(), 1);
    let trade = store.trade("T1").unwrap();
    assert_eq!(trade.execution_timestamp, 1000);
    assert_eq!(trade.price, 10.5);
    assert_eq!(trade.qty, 2.0);
    assert_eq!(trade.bid_order_id, "B1");
    assert_eq!(trade.ask_order_id, "A1");
}

/// 주문 신규 저장 후 재동기화 시 가변 필드만 갱신
#[tokio::test]
async fn test_order_insert_then_update_scenario() {
    println!("🧪 주문 동기화 시나리오");
    let cache = Arc::new(MemoryCache::new());
    cache.set_order("order:O1", &O1);
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler(cache.clone(), store.clone(), Arc::new(SteppedClock::new()));

    scheduler.run_cycle().await;

    let order = store.order("O1").unwrap();
    assert_eq!(order.status, OrderStatus::PartiallyFilled);
    assert_eq!(order.placed_timestamp, 1000);
    assert_eq!(order.client_order_id.as_deref(), Some("C1"));

    cache.set_order_field("order:O1", "filledQuantity", "3");
    cache.set_order_field("order:O1", "lastUpdatesTimestamp", "2000");
    // 이후 값이 바뀌어도 최초 값 유지
    cache.set_order_field("order:O1", "placedTimestamp", "1500");
    cache.set_order_field("order:O1", "clientOrderId", "C2");

    let report = scheduler.run_cycle().await;

    assert_eq!(report.orders_updated, 1);
    let order = store.order("O1").unwrap();
    assert_eq!(order.filled_quantity, 3.0);
    assert_eq!(order.last_updates_timestamp, 2000);
    assert_eq!(order.placed_timestamp, 1000);
    assert_eq!(order.client_order_id.as_deref(), Some("C1"));
    assert_eq!(store.order_count(), 1);
}

/// 캐시가 그대로면 두 번째 사이클은 아무것도 쓰지 않음
#[tokio::test]
async fn test_idempotent_cycles() {
    let cache = Arc::new(MemoryCache::new());
    cache.push_trade(T1);
    cache.push_trade(T1);
    cache.set_order("order:O1", &O1);
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler(cache, store.clone(), Arc::new(SteppedClock::new()));

    let first = scheduler.run_cycle().await;
    let writes_after_first = store.write_count();
    let second = scheduler.run_cycle().await;

    assert_eq!(first.trades_inserted, 1);
    assert_eq!(first.trades_existing, 1);
    assert_eq!(second.trades_inserted, 0);
    assert_eq!(second.trades_existing, 2);
    assert_eq!(second.orders_unchanged, 1);
    assert_eq!(store.write_count(), writes_after_first);
    assert_eq!(store.trade_count(), 1);
    assert_eq!(store.order_count(), 1);
}

/// 필수 필드가 빠진 체결은 건너뛰고 뒤 체결은 계속 처리
#[tokio::test]
async fn test_incomplete_trades_skipped() {
    let cache = Arc::new(MemoryCache::new());
    for missing in ["unique_id", "execution_timestamp", "price", "qty", "bid_order_id", "ask_order_id"] {
        let mut value: serde_json::Value = serde_json::from_str(T1).unwrap();
        value["unique_id"] = serde_json::json!(format!("X-{}", missing));
        value.as_object_mut().unwrap().remove(missing);
        cache.push_trade(&value.to_string());
    }
    cache.push_trade(T1);
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler(cache, store.clone(), Arc::new(SteppedClock::new()));

    let report = scheduler.run_cycle().await;

    assert_eq!(report.trades_skipped, 6);
    assert_eq!(report.trades_inserted, 1);
    assert_eq!(store.trade_count(), 1);
    assert!(store.trade("T1").is_some());
}

/// 인코딩이 깨진 항목/키는 그 항목만 건너뛰고 나머지는 처리
#[tokio::test]
async fn test_non_utf8_entries_skipped_individually() {
    let cache = Arc::new(MemoryCache::new());
    cache.push_raw_trade(&[0xff, 0xfe]);
    cache.push_trade(T1);
    cache.set_raw_order(b"order:\xff\xfe", &O1);
    cache.set_order("order:O1", &O1);
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler(cache, store.clone(), Arc::new(SteppedClock::new()));

    let report = scheduler.run_cycle().await;

    assert_eq!(report.trades_skipped, 1);
    assert_eq!(report.trades_inserted, 1);
    assert!(store.trade("T1").is_some());
    assert_eq!(report.orders_inserted, 1);
    assert!(store.order("O1").is_some());
}

/// 유한하지 않은 숫자는 거부되어 매 사이클 재기록되지 않음
#[tokio::test]
async fn test_non_finite_order_never_written() {
    let cache = Arc::new(MemoryCache::new());
    cache.set_order("order:O1", &O1);
    cache.set_order_field("order:O1", "price", "nan");
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler(cache, store.clone(), Arc::new(SteppedClock::new()));

    let first = scheduler.run_cycle().await;
    let second = scheduler.run_cycle().await;

    assert_eq!(first.orders_skipped, 1);
    assert_eq!(second.orders_skipped, 1);
    assert_eq!(second.orders_updated, 0);
    assert_eq!(store.write_count(), 0);
    assert!(store.order("O1").is_none());
}

/// 알 수 없는 상태/방향 주문은 해당 레코드만 건너뜀
#[tokio::test]
async fn test_unknown_enum_orders_skipped() {
    let cache = Arc::new(MemoryCache::new());
    cache.set_order("order:O1", &O1);
    cache.set_order_field("order:O1", "status", "EXPIRED");
    cache.set_order("order:O2", &O1);
    cache.set_order_field("order:O2", "oid", "O2");
    cache.set_order_field("order:O2", "side", "SHORT");
    cache.set_order("order:O3", &O1);
    cache.set_order_field("order:O3", "oid", "O3");
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler(cache, store.clone(), Arc::new(SteppedClock::new()));

    let report = scheduler.run_cycle().await;

    assert_eq!(report.orders_skipped, 2);
    assert_eq!(report.orders_inserted, 1);
    assert!(store.order("O1").is_none());
    assert!(store.order("O2").is_none());
    assert!(store.order("O3").is_some());
}

/// 조회 후 삽입 사이에 다른 기록자가 끼어든 경우
struct RacyStore {
    inner: MemoryStore,
}

#[async_trait]
impl DurableStore for RacyStore {
    async fn find_trade(&self, _unique_id: &str) -> Result<Option<TradeRecord>, StoreError> {
        Ok(None)
    }

    async fn insert_trade(&self, trade: &TradeRecord) -> Result<(), StoreError> {
        self.inner.insert_trade(trade).await
    }

    async fn find_order(&self, oid: &str) -> Result<Option<OrderRecord>, StoreError> {
        self.inner.find_order(oid).await
    }

    async fn insert_order(&self, order: &OrderRecord) -> Result<(), StoreError> {
        self.inner.insert_order(order).await
    }

    async fn update_order(&self, oid: &str, update: &OrderUpdate) -> Result<(), StoreError> {
        self.inner.update_order(oid, update).await
    }
}

#[tokio::test]
async fn test_constraint_violation_skipped() {
    let cache = Arc::new(MemoryCache::new());
    cache.push_trade(T1);
    cache.push_trade(T1);
    let store = Arc::new(RacyStore { inner: MemoryStore::new() });
    let scheduler = scheduler(cache, store.clone(), Arc::new(SteppedClock::new()));

    let report = scheduler.run_cycle().await;

    assert_eq!(report.trades_inserted, 1);
    assert_eq!(report.trades_skipped, 1);
    assert_eq!(store.inner.trade_count(), 1);
}

/// 캐시 장애 중에도 상태 확인은 즉시 응답하고, 다음 사이클이 독립적으로 재시도
#[tokio::test]
async fn test_cache_outage_then_recovery() {
    println!("🧪 캐시 장애 복구 시나리오");
    let cache = Arc::new(MemoryCache::new());
    cache.set_available(false);
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(SteppedClock::new());
    let scheduler = Arc::new(scheduler(cache.clone(), store.clone(), clock.clone()));
    let stats = scheduler.stats();

    let handle = scheduler.spawn();
    wait_for_cycles(&stats, 1).await;

    let response = build_app()
        .oneshot(
            axum::http::Request::builder()
                .uri("/")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], LIVENESS_MESSAGE.as_bytes());

    assert_eq!(store.trade_count(), 0);
    assert_eq!(stats.failed_cycles(), 0);

    cache.set_available(true);
    cache.push_trade(T1);
    clock.release();
    wait_for_cycles(&stats, 2).await;

    assert_eq!(store.trade_count(), 1);
    assert_eq!(clock.sleeps()[0], Duration::from_secs(30));

    handle.abort();
}

/// 저장소 장애는 루프를 멈추지 않음
#[tokio::test]
async fn test_store_outage_keeps_loop_alive() {
    let cache = Arc::new(MemoryCache::new());
    cache.push_trade(T1);
    cache.set_order("order:O1", &O1);
    let store = Arc::new(MemoryStore::new());
    store.set_available(false);
    let clock = Arc::new(SteppedClock::new());
    let scheduler = Arc::new(scheduler(cache, store.clone(), clock.clone()));
    let stats = scheduler.stats();

    let handle = scheduler.spawn();
    wait_for_cycles(&stats, 1).await;
    assert_eq!(store.trade_count(), 0);
    assert_eq!(stats.snapshot().records_skipped, 2);

    store.set_available(true);
    clock.release();
    wait_for_cycles(&stats, 2).await;

    assert_eq!(store.trade_count(), 1);
    assert_eq!(store.order_count(), 1);

    handle.abort();
}

#[test]
fn test_order_fixture_has_every_field() {
    let fields: HashMap<_, _> = O1.iter().cloned().collect();
    for name in trade_sync::sync::REQUIRED_ORDER_FIELDS {
        assert!(fields.contains_key(name));
    }
}
