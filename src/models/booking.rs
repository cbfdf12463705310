use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub service_id: String,
    pub service_name: Option<String>,
    pub unit_id: String,
    pub unit_name: Option<String>,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// Local start time, `HH:MM`.
    pub time: String,
    pub price: Option<f64>,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub coupon_code: Option<String>,
    pub status: BookingStatus,
    pub confirmation_code: Option<String>,
    pub history: Vec<HistoryEntry>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    ConfirmedMock,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::ConfirmedMock => "confirmed_mock",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => BookingStatus::Confirmed,
            "confirmed_mock" => BookingStatus::ConfirmedMock,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::ConfirmedMock)
    }
}

/// One append-only record in a booking's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: NaiveDateTime,
    pub actor: String,
    pub action: String,
    pub note: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub service_id: String,
    pub service_name: Option<String>,
    pub unit_id: String,
    pub unit_name: Option<String>,
    pub date: String,
    pub time: String,
    pub price: Option<f64>,
    #[serde(default)]
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub coupon_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_storage_form() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::ConfirmedMock,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&BookingStatus::ConfirmedMock).unwrap();
        assert_eq!(json, r#""confirmed_mock""#);
    }

    #[test]
    fn test_new_booking_accepts_camel_case() {
        let body = r#"{"serviceId":"s1","unitId":"u1","date":"2024-06-01","time":"10:00","customerName":"Ana","couponCode":"save10"}"#;
        let new: NewBooking = serde_json::from_str(body).unwrap();
        assert_eq!(new.service_id, "s1");
        assert_eq!(new.customer_name, "Ana");
        assert_eq!(new.coupon_code.as_deref(), Some("save10"));
        assert!(new.price.is_none());
    }
}
