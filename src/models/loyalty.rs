use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loyalty {
    /// Loyalty key: customer name, else email, else `guest`.
    #[serde(rename = "customerName")]
    pub customer_key: String,
    pub points: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
