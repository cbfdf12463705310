use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: CouponKind,
    pub amount: f64,
    /// Stored for reporting; redemption does not consult it.
    pub max_uses: Option<i64>,
    pub used: i64,
    /// Stored for reporting; redemption does not consult it.
    pub expires_at: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    #[default]
    Percent,
    Fixed,
}

impl CouponKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponKind::Percent => "percent",
            CouponKind::Fixed => "fixed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "fixed" => CouponKind::Fixed,
            _ => CouponKind::Percent,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCoupon {
    pub code: String,
    #[serde(rename = "type", default)]
    pub kind: CouponKind,
    pub amount: f64,
    pub max_uses: Option<i64>,
    pub expires_at: Option<String>,
}

/// Codes are compared upper-cased, so `save10` redeems `SAVE10`.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
