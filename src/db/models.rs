use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::StoreError;

/// 체결 DB 모델 (저장 후 변경되지 않음)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TradeRecord {
    pub unique_id: String,
    pub execution_timestamp: i64,
    pub price: f64,
    pub qty: f64,
    pub bid_order_id: String,
    pub ask_order_id: String,
}

/// 매수/매도 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl FromStr for OrderSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 주문 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Open,
    PartiallyCanceled,
    Cancelled,
    Filled,
    PartiallyFilled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::PartiallyCanceled => "PARTIALLY_CANCELED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
        }
    }
}

/// 정규화된(공백 → 밑줄) 상태 문자열 해석
///
/// 업스트림은 취소 상태를 `CANCELED`로 기록하기도 하므로 별칭으로 허용합니다.
impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(OrderStatus::Open),
            "PARTIALLY_CANCELED" => Ok(OrderStatus::PartiallyCanceled),
            "CANCELLED" | "CANCELED" => Ok(OrderStatus::Cancelled),
            "FILLED" => Ok(OrderStatus::Filled),
            "PARTIALLY_FILLED" => Ok(OrderStatus::PartiallyFilled),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 주문 DB 모델
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub oid: String,
    pub price: f64,
    pub quantity: f64,
    pub filled_quantity: f64,
    pub average_price: f64,
    pub placed_timestamp: i64,
    pub last_updates_timestamp: i64,
    pub side: OrderSide,
    pub status: OrderStatus,
    pub client_order_id: Option<String>,
}

impl OrderRecord {
    /// 동기화 때마다 덮어쓰는 필드만 추출
    pub fn mutable_fields(&self) -> OrderUpdate {
        OrderUpdate {
            price: self.price,
            quantity: self.quantity,
            filled_quantity: self.filled_quantity,
            average_price: self.average_price,
            last_updates_timestamp: self.last_updates_timestamp,
            status: self.status,
            side: self.side,
        }
    }

    /// 갱신 적용 (placed_timestamp, client_order_id는 유지)
    pub fn apply(&mut self, update: &OrderUpdate) {
        self.price = update.price;
        self.quantity = update.quantity;
        self.filled_quantity = update.filled_quantity;
        self.average_price = update.average_price;
        self.last_updates_timestamp = update.last_updates_timestamp;
        self.status = update.status;
        self.side = update.side;
    }
}

/// 기존 주문 갱신 내용
#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    pub price: f64,
    pub quantity: f64,
    pub filled_quantity: f64,
    pub average_price: f64,
    pub last_updates_timestamp: i64,
    pub status: OrderStatus,
    pub side: OrderSide,
}

/// `orders` 테이블 행 (side/status는 TEXT로 저장)
#[derive(Debug, FromRow)]
pub(crate) struct OrderRow {
    pub oid: String,
    pub price: f64,
    pub quantity: f64,
    pub filled_quantity: f64,
    pub average_price: f64,
    pub placed_timestamp: i64,
    pub last_updates_timestamp: i64,
    pub side: String,
    pub status: String,
    pub client_order_id: Option<String>,
}

impl TryFrom<OrderRow> for OrderRecord {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let side = row
            .side
            .parse::<OrderSide>()
            .map_err(|value| StoreError::Corrupt(format!("주문 {} side={}", row.oid, value)))?;
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|value| StoreError::Corrupt(format!("주문 {} status={}", row.oid, value)))?;

        Ok(Self {
            oid: row.oid,
            price: row.price,
            quantity: row.quantity,
            filled_quantity: row.filled_quantity,
            average_price: row.average_price,
            placed_timestamp: row.placed_timestamp,
            last_updates_timestamp: row.last_updates_timestamp,
            side,
            status,
            client_order_id: row.client_order_id,
        })
    }
}
