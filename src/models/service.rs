use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: String,
    pub duration_minutes: i64,
    pub price: f64,
    pub is_active: bool,
    pub units: Vec<Unit>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Unit {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i64>,
    pub price: Option<f64>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub units: Vec<NewUnit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUnit {
    pub id: Option<String>,
    pub name: String,
}
