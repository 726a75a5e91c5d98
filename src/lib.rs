//! trade-sync
//!
//! Redis 캐시에 쌓인 체결/주문 데이터를 주기적으로 읽어 영구 저장소에
//! 멱등하게 반영하는 동기화 서비스입니다.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod server;
pub mod sync;
