//! 서비스 설정
//!
//! 프로세스 환경 변수(및 `.env` 파일)에서 캐시/저장소 접속 정보와
//! 동기화 주기를 읽어옵니다. 접속 정보가 없어도 시작은 중단되지 않으며,
//! 동기화 사이클에서 연결 실패로 처리됩니다.

use std::time::Duration;
use log::warn;

/// Redis 접속 정보
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// 비밀번호가 없으면 AUTH 없이 접속
    pub password: Option<String>,
}

/// 동기화 서비스 설정
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub cache: CacheSettings,
    pub database_url: Option<String>,
    pub http_port: u16,
    /// 이전 사이클 종료 후 다음 사이클까지 대기 시간
    pub sync_interval: Duration,
    /// 캐시/저장소 개별 작업 제한 시간
    pub operation_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            database_url: None,
            http_port: 5000,
            sync_interval: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(10),
        }
    }
}

impl SyncConfig {
    /// 프로세스 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 조회 함수로 설정 로드 (빈 문자열은 미설정으로 취급)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        // 기존 배포의 camelCase 이름도 허용 (대문자 이름 우선)
        let get_either = |key: &str, legacy: &str| get(key).or_else(|| get(legacy));
        let defaults = Self::default();

        let port = get_either("REDIS_PORT", "redisPort").and_then(|raw| match raw.parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                warn!("REDIS_PORT 값이 올바르지 않음: {:?}", raw);
                None
            }
        });

        Self {
            cache: CacheSettings {
                host: get_either("REDIS_HOST", "redisHost"),
                port,
                password: get_either("REDIS_PASSWORD", "redisPassword"),
            },
            database_url: get("DATABASE_URL"),
            http_port: parse_or("HTTP_PORT", get("HTTP_PORT"), defaults.http_port),
            sync_interval: Duration::from_secs(parse_or(
                "SYNC_INTERVAL_SECS",
                get("SYNC_INTERVAL_SECS"),
                defaults.sync_interval.as_secs(),
            )),
            operation_timeout: Duration::from_secs(parse_or(
                "OPERATION_TIMEOUT_SECS",
                get("OPERATION_TIMEOUT_SECS"),
                defaults.operation_timeout.as_secs(),
            )),
        }
    }
}

fn parse_or<T: std::str::FromStr + std::fmt::Debug>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} 값이 올바르지 않음: {:?}, 기본값 {:?} 사용", key, raw, default);
            default
        }),
        None => default,
    }
}
