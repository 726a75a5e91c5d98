//! Redis 캐시 드라이버
//!
//! 단일 비동기 연결을 지연 생성해 모든 사이클에서 재사용합니다.
//! 명령이 실패하거나 시간 초과되면 연결을 버리고, 다음 명령에서 다시 연결합니다.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use redis::aio::Connection;
use redis::{AsyncCommands, Client, IntoConnectionInfo, RedisResult};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{error::Elapsed, timeout};

use super::{CacheError, CacheSource, ORDER_KEY_PATTERN, TRADE_LIST_KEY};
use crate::config::CacheSettings;

/// Redis 캐시
pub struct RedisCache {
    client: Option<Client>,
    connection: Mutex<Option<Connection>>,
    op_timeout: Duration,
}

impl RedisCache {
    /// 접속 정보로 생성 (연결은 첫 명령 때 수립)
    pub fn new(settings: &CacheSettings, op_timeout: Duration) -> Self {
        let client = match Self::open_client(settings) {
            Ok(client) => client,
            Err(e) => {
                warn!("Redis 클라이언트 생성 실패: {}", e);
                None
            }
        };

        Self {
            client,
            connection: Mutex::new(None),
            op_timeout,
        }
    }

    fn open_client(settings: &CacheSettings) -> RedisResult<Option<Client>> {
        let (Some(host), Some(port)) = (settings.host.as_deref(), settings.port) else {
            return Ok(None);
        };

        let mut info = (host, port).into_connection_info()?;
        info.redis.password = settings.password.clone();
        Client::open(info).map(Some)
    }

    /// 연결 확인 (PING)
    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut guard = self.connection().await?;
        let result = match guard.as_mut() {
            Some(conn) => timeout(self.op_timeout, redis::cmd("PING").query_async::<_, String>(conn)).await,
            None => return Err(CacheError::Connection("연결 없음".to_string())),
        };
        self.settle(&mut guard, result).map(|_| ())
    }

    /// 연결을 확보한 잠금 가드 반환
    async fn connection(&self) -> Result<MutexGuard<'_, Option<Connection>>, CacheError> {
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            let client = self.client.as_ref().ok_or(CacheError::NotConfigured)?;
            let conn = timeout(self.op_timeout, client.get_async_connection())
                .await
                .map_err(|_| CacheError::Timeout(self.op_timeout))?
                .map_err(|e| CacheError::Connection(e.to_string()))?;

            info!("Redis 연결 완료");
            *guard = Some(conn);
        }
        Ok(guard)
    }

    /// 명령 결과 정리 (실패 시 연결 폐기)
    fn settle<T>(
        &self,
        guard: &mut MutexGuard<'_, Option<Connection>>,
        result: Result<RedisResult<T>, Elapsed>,
    ) -> Result<T, CacheError> {
        let outcome = match result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => CacheError::from(e),
            Err(_) => CacheError::Timeout(self.op_timeout),
        };

        if matches!(outcome, CacheError::Connection(_) | CacheError::Timeout(_)) {
            **guard = None;
        }
        Err(outcome)
    }
}

#[async_trait]
impl CacheSource for RedisCache {
    // 항목 인코딩 검증은 레코드 단위로 호출자가 수행
    async fn trade_entries(&self) -> Result<Vec<Vec<u8>>, CacheError> {
        let mut guard = self.connection().await?;
        let result = match guard.as_mut() {
            Some(conn) => timeout(self.op_timeout, conn.lrange::<_, Vec<Vec<u8>>>(TRADE_LIST_KEY, 0, -1)).await,
            None => return Err(CacheError::Connection("연결 없음".to_string())),
        };
        self.settle(&mut guard, result)
    }

    async fn order_keys(&self) -> Result<Vec<Vec<u8>>, CacheError> {
        let mut guard = self.connection().await?;
        let result = match guard.as_mut() {
            Some(conn) => timeout(self.op_timeout, conn.keys::<_, Vec<Vec<u8>>>(ORDER_KEY_PATTERN)).await,
            None => return Err(CacheError::Connection("연결 없음".to_string())),
        };
        self.settle(&mut guard, result)
    }

    async fn order_fields(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        let mut guard = self.connection().await?;
        let result = match guard.as_mut() {
            Some(conn) => timeout(self.op_timeout, conn.hgetall::<_, HashMap<String, String>>(key)).await,
            None => return Err(CacheError::Connection("연결 없음".to_string())),
        };
        self.settle(&mut guard, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_settings_is_not_configured() {
        let cache = RedisCache::new(&CacheSettings::default(), Duration::from_secs(1));

        assert!(matches!(cache.trade_entries().await, Err(CacheError::NotConfigured)));
        assert!(matches!(cache.ping().await, Err(CacheError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_client_built_from_settings() {
        let settings = CacheSettings {
            host: Some("127.0.0.1".to_string()),
            port: Some(6379),
            password: Some("secret".to_string()),
        };

        let client = RedisCache::open_client(&settings).unwrap().unwrap();
        let info = client.get_connection_info();
        assert_eq!(info.redis.password.as_deref(), Some("secret"));
    }
}
