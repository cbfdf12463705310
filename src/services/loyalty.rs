use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Loyalty;

pub const LOYALTY_POINTS_PER_BOOKING: i64 = 100;

const GUEST_KEY: &str = "guest";

/// Account a confirmation is credited to: the customer name, else the email, else `guest`.
pub fn loyalty_key(customer_name: &str, customer_email: Option<&str>) -> String {
    [Some(customer_name), customer_email]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or(GUEST_KEY)
        .to_string()
}

pub fn list_loyalty(conn: &Connection) -> Result<Vec<Loyalty>, AppError> {
    Ok(queries::list_loyalty(conn)?)
}

pub fn get_loyalty(conn: &Connection, customer_key: &str) -> Result<Loyalty, AppError> {
    queries::get_loyalty(conn, customer_key)?
        .ok_or_else(|| AppError::NotFound(format!("no loyalty account for {customer_key}")))
}
