use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::coupon::normalize_code;
use crate::models::{Coupon, NewCoupon};

pub fn list_coupons(conn: &Connection) -> Result<Vec<Coupon>, AppError> {
    Ok(queries::list_coupons(conn)?)
}

pub fn create_coupon(conn: &Connection, new: NewCoupon) -> Result<Coupon, AppError> {
    let code = normalize_code(&new.code);
    if code.is_empty() {
        return Err(AppError::Validation("code is required".to_string()));
    }
    if !new.amount.is_finite() || new.amount < 0.0 {
        return Err(AppError::Validation("amount must be a non-negative number".to_string()));
    }
    if matches!(new.max_uses, Some(n) if n < 0) {
        return Err(AppError::Validation("maxUses must not be negative".to_string()));
    }

    let coupon = Coupon {
        id: Uuid::new_v4().to_string(),
        code,
        kind: new.kind,
        amount: new.amount,
        max_uses: new.max_uses,
        used: 0,
        expires_at: new.expires_at,
        created_at: Utc::now().naive_utc(),
    };

    queries::insert_coupon(conn, &coupon).map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::Conflict(format!("coupon {} already exists", coupon.code))
        } else {
            AppError::Internal(e)
        }
    })?;

    tracing::info!(code = %coupon.code, kind = coupon.kind.as_str(), "coupon created");
    Ok(coupon)
}

/// Counts one use of the coupon matching `code` (case-insensitively) and
/// returns its stored code, or `None` when no such coupon exists.
///
/// `max_uses` and `expires_at` are not checked here.
pub fn redeem(conn: &Connection, code: &str) -> anyhow::Result<Option<String>> {
    let code = normalize_code(code);
    if code.is_empty() || !queries::increment_coupon_used(conn, &code)? {
        return Ok(None);
    }
    Ok(Some(code))
}
