use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CacheError, CacheSource, ORDER_KEY_PATTERN, TRADE_LIST_KEY};

/// 인메모리 캐시 (Redis 리스트/해시 흉내)
#[derive(Default)]
pub struct MemoryCache {
    trades: Mutex<Vec<Vec<u8>>>,
    hashes: Mutex<BTreeMap<Vec<u8>, HashMap<String, String>>>,
    failing_keys: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `tradeData` 리스트 끝에 추가 (RPUSH)
    pub fn push_trade(&self, entry: &str) {
        self.push_raw_trade(entry.as_bytes());
    }

    /// 임의 바이트 항목 추가 (인코딩이 깨진 항목 재현용)
    pub fn push_raw_trade(&self, entry: &[u8]) {
        self.trades.lock().unwrap_or_else(|e| e.into_inner()).push(entry.to_vec());
    }

    /// 해시 전체 교체
    pub fn set_order(&self, key: &str, fields: &[(&str, &str)]) {
        self.set_raw_order(key.as_bytes(), fields);
    }

    /// 임의 바이트 키로 해시 설정
    pub fn set_raw_order(&self, key: &[u8], fields: &[(&str, &str)]) {
        let fields = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.hashes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_vec(), fields);
    }

    /// 해시 필드 하나 갱신 (HSET)
    pub fn set_order_field(&self, key: &str, field: &str, value: &str) {
        self.hashes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.as_bytes().to_vec())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// 특정 키 조회가 항상 실패하도록 설정
    pub fn fail_key(&self, key: &str) {
        self.failing_keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string());
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Connection("메모리 캐시 연결 끊김".to_string()));
        }
        Ok(())
    }
}

/// `prefix*` 형태의 단순 glob 매칭
fn matches_pattern(pattern: &str, key: &[u8]) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix.as_bytes()),
        None => pattern.as_bytes() == key,
    }
}

#[async_trait]
impl CacheSource for MemoryCache {
    async fn trade_entries(&self) -> Result<Vec<Vec<u8>>, CacheError> {
        self.check_available()?;
        if self.failing_keys.lock().unwrap_or_else(|e| e.into_inner()).contains(TRADE_LIST_KEY) {
            return Err(CacheError::Command(format!("{} 조회 실패", TRADE_LIST_KEY)));
        }
        Ok(self.trades.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn order_keys(&self) -> Result<Vec<Vec<u8>>, CacheError> {
        self.check_available()?;
        Ok(self
            .hashes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .filter(|key| matches_pattern(ORDER_KEY_PATTERN, key))
            .cloned()
            .collect())
    }

    async fn order_fields(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        self.check_available()?;
        if self.failing_keys.lock().unwrap_or_else(|e| e.into_inner()).contains(key) {
            return Err(CacheError::Command(format!("{} 조회 실패", key)));
        }
        Ok(self
            .hashes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key.as_bytes())
            .cloned()
            .unwrap_or_default())
    }
}
