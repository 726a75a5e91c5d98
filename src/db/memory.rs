//! 인메모리 저장소
//!
//! `DurableStore` 계약을 그대로 따르는 메모리 구현입니다. 테스트와
//! 로컬 실행에서 실제 데이터베이스 없이 동기화 로직을 검증할 때 사용합니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::models::{OrderRecord, OrderUpdate, TradeRecord};
use super::{DurableStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    trades: Mutex<HashMap<String, TradeRecord>>,
    orders: Mutex<HashMap<String, OrderRecord>>,
    unavailable: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 연결 끊김 흉내 (모든 작업이 연결 실패)
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn trade(&self, unique_id: &str) -> Option<TradeRecord> {
        self.trades.lock().unwrap_or_else(|e| e.into_inner()).get(unique_id).cloned()
    }

    pub fn order(&self, oid: &str) -> Option<OrderRecord> {
        self.orders.lock().unwrap_or_else(|e| e.into_inner()).get(oid).cloned()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 삽입/갱신 누적 횟수
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("메모리 저장소 연결 끊김".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn find_trade(&self, unique_id: &str) -> Result<Option<TradeRecord>, StoreError> {
        self.check_available()?;
        Ok(self.trade(unique_id))
    }

    async fn insert_trade(&self, trade: &TradeRecord) -> Result<(), StoreError> {
        self.check_available()?;
        let mut trades = self.trades.lock().unwrap_or_else(|e| e.into_inner());
        if trades.contains_key(&trade.unique_id) {
            return Err(StoreError::Constraint(trade.unique_id.clone()));
        }
        trades.insert(trade.unique_id.clone(), trade.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_order(&self, oid: &str) -> Result<Option<OrderRecord>, StoreError> {
        self.check_available()?;
        Ok(self.order(oid))
    }

    async fn insert_order(&self, order: &OrderRecord) -> Result<(), StoreError> {
        self.check_available()?;
        let mut orders = self.orders.lock().unwrap_or_else(|e| e.into_inner());
        if orders.contains_key(&order.oid) {
            return Err(StoreError::Constraint(order.oid.clone()));
        }
        orders.insert(order.oid.clone(), order.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_order(&self, oid: &str, update: &OrderUpdate) -> Result<(), StoreError> {
        self.check_available()?;
        let mut orders = self.orders.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(order) = orders.get_mut(oid) {
            order.apply(update);
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
