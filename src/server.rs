use axum::Router;
use log::info;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::api::create_api_router;

/// 서버 설정
#[derive(Clone)]
pub struct ServerConfig {
    pub rest_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { rest_port: 5000 }
    }
}

/// 미들웨어가 적용된 앱 라우터
pub fn build_app() -> Router {
    create_api_router().layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// 서버 시작
pub async fn start_server(config: ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.rest_port)).await?;

    info!("상태 확인 API: http://localhost:{}/", config.rest_port);

    axum::serve(listener, build_app()).await
}
