use axum::{routing::get, Router};

use crate::api::handlers::*;

/// API 라우터 생성
pub fn create_api_router() -> Router {
    Router::new()
        // 상태 확인
        .route("/", get(home))
}
