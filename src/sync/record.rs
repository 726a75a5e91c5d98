//! 캐시 원본 레코드 파싱/검증
//!
//! 체결은 JSON 바이트열, 주문은 문자열 필드 해시로 캐시에 들어 있습니다.
//! 검증 실패는 예외가 아니라 `RecordError` 값으로 돌려줍니다.

use crate::cache::RawOrder;
use crate::db::{OrderRecord, OrderSide, OrderStatus, StoreError, TradeRecord};

/// 주문 해시 필수 필드 (검증 순서)
///
/// `status`는 정규화 후 `OrderStatus` 이름으로 해석하며, 업스트림이 쓰는
/// `CANCELED` 철자도 `CANCELLED`의 별칭으로 받아들입니다.
pub const REQUIRED_ORDER_FIELDS: [&str; 9] = [
    "oid",
    "price",
    "quantity",
    "filledQuantity",
    "averagePrice",
    "placedTimestamp",
    "lastUpdatesTimestamp",
    "side",
    "status",
];

/// 레코드 단위 실패 (해당 레코드만 건너뜀)
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("체결 데이터 디코딩 실패: {0}")]
    MalformedTrade(#[from] serde_json::Error),
    #[error("주문 데이터 필수 필드 누락: {0}")]
    MissingField(&'static str),
    #[error("주문 필드 {field} 변환 실패: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("알 수 없는 주문 상태: {0}")]
    UnknownStatus(String),
    #[error("알 수 없는 주문 방향: {0}")]
    UnknownSide(String),
    #[error("저장 실패: {0}")]
    Persist(#[from] StoreError),
}

/// 체결 JSON 파싱 (6개 필드 모두 필수)
///
/// UTF-8이 아닌 항목도 디코딩 실패로 처리되어 해당 항목만 건너뜁니다.
pub fn parse_trade(raw: &[u8]) -> Result<TradeRecord, RecordError> {
    Ok(serde_json::from_slice(raw)?)
}

/// 주문 해시 파싱
///
/// 필수 필드 존재 확인 → 숫자 변환 → 상태/방향 해석 순으로 검증합니다.
/// 상태 문자열의 공백은 밑줄로 바꾼 뒤 해석합니다 (`PARTIALLY FILLED`).
/// `CANCELED`는 `CANCELLED`로 저장됩니다. 가격/수량에 `nan`, `inf`는 허용하지 않습니다.
pub fn parse_order(raw: &RawOrder) -> Result<OrderRecord, RecordError> {
    if let Some(missing) = REQUIRED_ORDER_FIELDS
        .iter()
        .find(|name| !raw.fields.contains_key(**name))
    {
        return Err(RecordError::MissingField(*missing));
    }

    let status_text = field(raw, "status")?.replace(' ', "_");
    let side_text = field(raw, "side")?;

    Ok(OrderRecord {
        oid: field(raw, "oid")?.to_string(),
        price: decimal(raw, "price")?,
        quantity: decimal(raw, "quantity")?,
        filled_quantity: decimal(raw, "filledQuantity")?,
        average_price: decimal(raw, "averagePrice")?,
        placed_timestamp: number(raw, "placedTimestamp")?,
        last_updates_timestamp: number(raw, "lastUpdatesTimestamp")?,
        status: status_text
            .parse::<OrderStatus>()
            .map_err(RecordError::UnknownStatus)?,
        side: side_text
            .parse::<OrderSide>()
            .map_err(RecordError::UnknownSide)?,
        client_order_id: raw.fields.get("clientOrderId").cloned(),
    })
}

fn field<'a>(raw: &'a RawOrder, name: &'static str) -> Result<&'a str, RecordError> {
    raw.fields
        .get(name)
        .map(String::as_str)
        .ok_or(RecordError::MissingField(name))
}

fn number<T: std::str::FromStr>(raw: &RawOrder, name: &'static str) -> Result<T, RecordError> {
    let value = field(raw, name)?;
    value.trim().parse().map_err(|_| RecordError::InvalidNumber {
        field: name,
        value: value.to_string(),
    })
}

/// 유한한 실수만 허용
fn decimal(raw: &RawOrder, name: &'static str) -> Result<f64, RecordError> {
    let value: f64 = number(raw, name)?;
    if !value.is_finite() {
        return Err(RecordError::InvalidNumber {
            field: name,
            value: field(raw, name)?.to_string(),
        });
    }
    Ok(value)
}
