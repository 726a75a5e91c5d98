/// 상태 확인 응답 문구
pub const LIVENESS_MESSAGE: &str = "Trade and Order Updates Microservice Running";

/// 상태 확인 핸들러
///
/// 공유 상태에 접근하지 않으므로 동기화 사이클과 무관하게 즉시 응답합니다.
pub async fn home() -> &'static str {
    LIVENESS_MESSAGE
}
