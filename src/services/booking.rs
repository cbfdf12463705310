use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, HistoryEntry, NewBooking};
use crate::services::loyalty::{self, LOYALTY_POINTS_PER_BOOKING};

const SYSTEM_ACTOR: &str = "system";

/// Create, confirm and reschedule bookings.
///
/// Confirmation is the only step with side effects outside the booking row:
/// it redeems the booking's coupon and credits loyalty points, all inside one
/// transaction so a retry never observes half of it.
#[derive(Debug, Clone, Copy)]
pub struct BookingWorkflow {
    mock_mode: bool,
}

impl BookingWorkflow {
    pub fn new(mock_mode: bool) -> Self {
        Self { mock_mode }
    }

    fn confirmed_status(&self) -> BookingStatus {
        if self.mock_mode {
            BookingStatus::ConfirmedMock
        } else {
            BookingStatus::Confirmed
        }
    }

    pub fn create_booking(&self, conn: &mut Connection, new: NewBooking) -> Result<Booking, AppError> {
        let service_id = required("serviceId", &new.service_id)?;
        let unit_id = required("unitId", &new.unit_id)?;
        let date = normalize_date(&new.date)?;
        let time = normalize_time(&new.time)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(holder) = queries::find_slot_holder(&tx, &unit_id, &date, &time, None)? {
            tracing::info!(unit_id = %unit_id, date = %date, time = %time, holder = %holder, "slot already booked");
            return Err(slot_taken());
        }

        let now = Utc::now().naive_utc();
        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            service_id,
            service_name: new.service_name,
            unit_id,
            unit_name: new.unit_name,
            date,
            time,
            price: new.price,
            customer_name: new.customer_name.trim().to_string(),
            customer_email: non_blank(new.customer_email),
            coupon_code: non_blank(new.coupon_code),
            status: BookingStatus::Pending,
            confirmation_code: None,
            history: vec![history("created", "Booking created (pending)")],
            created_at: now,
            updated_at: now,
        };

        queries::insert_booking(&tx, &booking).map_err(conflict_or_internal)?;
        let booking = queries::get_booking_by_id(&tx, &booking.id)?.ok_or_else(not_found)?;
        tx.commit()?;

        tracing::info!(
            booking_id = %booking.id,
            unit_id = %booking.unit_id,
            date = %booking.date,
            time = %booking.time,
            "booking created"
        );
        Ok(booking)
    }

    pub fn list_bookings(&self, conn: &Connection) -> Result<Vec<Booking>, AppError> {
        Ok(queries::list_bookings(conn)?)
    }

    pub fn get_booking(&self, conn: &Connection, id: &str) -> Result<Booking, AppError> {
        queries::get_booking_by_id(conn, id)?.ok_or_else(not_found)
    }

    pub fn confirm_booking(&self, conn: &mut Connection, id: &str) -> Result<Booking, AppError> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let booking = queries::get_booking_by_id(&tx, id)?.ok_or_else(not_found)?;

        match booking.status {
            BookingStatus::Cancelled => {
                return Err(AppError::InvalidState(
                    "Cannot confirm cancelled booking".to_string(),
                ));
            }
            status if status.is_confirmed() => return Ok(booking),
            _ => {}
        }

        let code = confirmation_code();
        let status = self.confirmed_status();
        if !queries::mark_booking_confirmed(&tx, id, status, &code)? {
            return Err(AppError::Internal(anyhow::anyhow!(
                "booking {id} left pending state during confirmation"
            )));
        }
        queries::append_history(
            &tx,
            id,
            &history("confirmed", &format!("Confirmation code {code}")),
        )?;

        if let Some(coupon_code) = booking.coupon_code.as_deref() {
            if let Some(redeemed) = super::coupons::redeem(&tx, coupon_code)? {
                queries::append_history(
                    &tx,
                    id,
                    &history("coupon_applied", &format!("Coupon {redeemed} used")),
                )?;
            }
        }

        let key = loyalty::loyalty_key(&booking.customer_name, booking.customer_email.as_deref());
        let balance = queries::add_loyalty_points(&tx, &key, LOYALTY_POINTS_PER_BOOKING)?;
        queries::append_history(
            &tx,
            id,
            &history(
                "loyalty_added",
                &format!("Added {LOYALTY_POINTS_PER_BOOKING} points to {key}"),
            ),
        )?;

        let confirmed = queries::get_booking_by_id(&tx, id)?.ok_or_else(not_found)?;
        tx.commit()?;

        tracing::info!(
            booking_id = %id,
            status = status.as_str(),
            confirmation_code = %code,
            loyalty_key = %key,
            balance,
            "booking confirmed"
        );
        Ok(confirmed)
    }

    pub fn reschedule_booking(
        &self,
        conn: &mut Connection,
        id: &str,
        new_date: &str,
        new_time: &str,
    ) -> Result<Booking, AppError> {
        let date = normalize_date(new_date)?;
        let time = normalize_time(new_time)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let booking = queries::get_booking_by_id(&tx, id)?.ok_or_else(not_found)?;
        if booking.status == BookingStatus::Cancelled {
            return Err(AppError::InvalidState(
                "Cannot reschedule cancelled booking".to_string(),
            ));
        }

        if let Some(holder) = queries::find_slot_holder(&tx, &booking.unit_id, &date, &time, Some(id))? {
            tracing::info!(booking_id = %id, holder = %holder, date = %date, time = %time, "reschedule conflict");
            return Err(AppError::Conflict("Slot conflict".to_string()));
        }

        queries::update_booking_slot(&tx, id, &date, &time).map_err(conflict_or_internal)?;
        queries::append_history(
            &tx,
            id,
            &history("rescheduled", &format!("Rescheduled to {date} {time}")),
        )?;

        let rescheduled = queries::get_booking_by_id(&tx, id)?.ok_or_else(not_found)?;
        tx.commit()?;

        tracing::info!(booking_id = %id, date = %date, time = %time, "booking rescheduled");
        Ok(rescheduled)
    }
}

fn history(action: &str, note: &str) -> HistoryEntry {
    HistoryEntry {
        timestamp: Utc::now().naive_utc(),
        actor: SYSTEM_ACTOR.to_string(),
        action: action.to_string(),
        note: note.to_string(),
    }
}

/// First block of a v4 uuid, upper-cased: 8 hex characters.
fn confirmation_code() -> String {
    let mut code = Uuid::new_v4().simple().to_string();
    code.truncate(8);
    code.to_uppercase()
}

fn normalize_date(raw: &str) -> Result<String, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| AppError::Validation(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

fn normalize_time(raw: &str) -> Result<String, AppError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| AppError::Validation(format!("invalid time '{raw}', expected HH:MM")))
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn not_found() -> AppError {
    AppError::NotFound("Booking not found".to_string())
}

fn slot_taken() -> AppError {
    AppError::Conflict("Slot already booked".to_string())
}

fn conflict_or_internal(err: anyhow::Error) -> AppError {
    if db::is_unique_violation(&err) {
        slot_taken()
    } else {
        AppError::Internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewCoupon;
    use crate::services::coupons;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn new_booking(unit_id: &str, date: &str, time: &str) -> NewBooking {
        NewBooking {
            service_id: "svc-tennis".to_string(),
            service_name: Some("Tennis Court".to_string()),
            unit_id: unit_id.to_string(),
            unit_name: Some("Court 1".to_string()),
            date: date.to_string(),
            time: time.to_string(),
            price: Some(400.0),
            customer_name: "Ana".to_string(),
            customer_email: Some("ana@example.com".to_string()),
            coupon_code: None,
        }
    }

    #[test]
    fn test_create_booking_is_pending_with_history() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);

        let booking = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "10:00"))
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.confirmation_code.is_none());
        assert_eq!(booking.history.len(), 1);
        assert_eq!(booking.history[0].actor, "system");
        assert_eq!(booking.history[0].action, "created");

        let stored = workflow.get_booking(&conn, &booking.id).unwrap();
        assert_eq!(stored.history, booking.history);
    }

    #[test]
    fn test_create_booking_has_no_side_effects() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);
        coupons::create_coupon(&conn, coupon("SAVE10")).unwrap();

        let mut new = new_booking("u1", "2024-06-01", "10:00");
        new.coupon_code = Some("save10".to_string());
        workflow.create_booking(&mut conn, new).unwrap();

        assert_eq!(coupons::list_coupons(&conn).unwrap()[0].used, 0);
        assert!(queries::get_loyalty(&conn, "Ana").unwrap().is_none());
    }

    #[test]
    fn test_double_booking_conflicts() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);

        workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "10:00"))
            .unwrap();
        let err = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "10:00"))
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Same slot on a different unit is fine
        workflow
            .create_booking(&mut conn, new_booking("u2", "2024-06-01", "10:00"))
            .unwrap();
    }

    #[test]
    fn test_slot_key_is_canonical() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);

        let booking = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "9:05"))
            .unwrap();
        assert_eq!(booking.time, "09:05");

        let err = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "09:05"))
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_create_booking_validates_input() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);

        let err = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-13-01", "10:00"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "25:00"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = workflow
            .create_booking(&mut conn, new_booking("  ", "2024-06-01", "10:00"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_confirm_sets_code_and_status() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);
        let booking = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "10:00"))
            .unwrap();

        let confirmed = workflow.confirm_booking(&mut conn, &booking.id).unwrap();

        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        let code = confirmed.confirmation_code.clone().unwrap();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(code, code.to_uppercase());

        let actions: Vec<_> = confirmed.history.iter().map(|h| h.action.as_str()).collect();
        assert_eq!(actions, vec!["created", "confirmed", "loyalty_added"]);
    }

    #[test]
    fn test_confirm_in_mock_mode() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(true);
        let booking = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "10:00"))
            .unwrap();

        let confirmed = workflow.confirm_booking(&mut conn, &booking.id).unwrap();
        assert_eq!(confirmed.status, BookingStatus::ConfirmedMock);
    }

    #[test]
    fn test_confirm_twice_applies_effects_once() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);
        coupons::create_coupon(&conn, coupon("SAVE10")).unwrap();

        let mut new = new_booking("u1", "2024-06-01", "10:00");
        new.coupon_code = Some("save10".to_string());
        let booking = workflow.create_booking(&mut conn, new).unwrap();

        let first = workflow.confirm_booking(&mut conn, &booking.id).unwrap();
        let second = workflow.confirm_booking(&mut conn, &booking.id).unwrap();

        assert_eq!(first.confirmation_code, second.confirmation_code);
        assert_eq!(first.history, second.history);
        assert_eq!(coupons::list_coupons(&conn).unwrap()[0].used, 1);
        assert_eq!(queries::get_loyalty(&conn, "Ana").unwrap().unwrap().points, 100);
    }

    #[test]
    fn test_confirm_redeems_coupon_case_insensitively() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);
        coupons::create_coupon(&conn, coupon("SAVE10")).unwrap();

        let mut new = new_booking("u1", "2024-06-01", "10:00");
        new.coupon_code = Some("save10".to_string());
        let booking = workflow.create_booking(&mut conn, new).unwrap();

        let confirmed = workflow.confirm_booking(&mut conn, &booking.id).unwrap();

        assert_eq!(coupons::list_coupons(&conn).unwrap()[0].used, 1);
        let applied = confirmed
            .history
            .iter()
            .find(|h| h.action == "coupon_applied")
            .unwrap();
        assert_eq!(applied.note, "Coupon SAVE10 used");
    }

    #[test]
    fn test_confirm_ignores_unknown_coupon() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);

        let mut new = new_booking("u1", "2024-06-01", "10:00");
        new.coupon_code = Some("NOPE".to_string());
        let booking = workflow.create_booking(&mut conn, new).unwrap();

        let confirmed = workflow.confirm_booking(&mut conn, &booking.id).unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert!(confirmed.history.iter().all(|h| h.action != "coupon_applied"));
    }

    #[test]
    fn test_loyalty_accrues_per_confirmation() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);

        for time in ["10:00", "11:00", "12:00"] {
            let booking = workflow
                .create_booking(&mut conn, new_booking("u1", "2024-06-01", time))
                .unwrap();
            workflow.confirm_booking(&mut conn, &booking.id).unwrap();
        }

        assert_eq!(queries::get_loyalty(&conn, "Ana").unwrap().unwrap().points, 300);
    }

    #[test]
    fn test_loyalty_falls_back_to_email_then_guest() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);

        let mut by_email = new_booking("u1", "2024-06-01", "10:00");
        by_email.customer_name = String::new();
        let booking = workflow.create_booking(&mut conn, by_email).unwrap();
        workflow.confirm_booking(&mut conn, &booking.id).unwrap();

        let mut anonymous = new_booking("u1", "2024-06-01", "11:00");
        anonymous.customer_name = String::new();
        anonymous.customer_email = None;
        let booking = workflow.create_booking(&mut conn, anonymous).unwrap();
        let confirmed = workflow.confirm_booking(&mut conn, &booking.id).unwrap();

        assert_eq!(
            queries::get_loyalty(&conn, "ana@example.com").unwrap().unwrap().points,
            100
        );
        assert_eq!(queries::get_loyalty(&conn, "guest").unwrap().unwrap().points, 100);
        assert_eq!(
            confirmed.history.last().unwrap().note,
            "Added 100 points to guest"
        );
    }

    #[test]
    fn test_confirm_missing_booking() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);
        let err = workflow.confirm_booking(&mut conn, "missing").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_confirm_cancelled_booking_fails() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);
        let booking = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "10:00"))
            .unwrap();
        conn.execute(
            "UPDATE bookings SET status = 'cancelled' WHERE id = ?1",
            [&booking.id],
        )
        .unwrap();

        let err = workflow.confirm_booking(&mut conn, &booking.id).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert!(queries::get_loyalty(&conn, "Ana").unwrap().is_none());
    }

    #[test]
    fn test_reschedule_moves_slot() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);
        let booking = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "10:00"))
            .unwrap();

        let moved = workflow
            .reschedule_booking(&mut conn, &booking.id, "2024-06-02", "14:30")
            .unwrap();
        assert_eq!(moved.date, "2024-06-02");
        assert_eq!(moved.time, "14:30");
        assert_eq!(moved.history.last().unwrap().action, "rescheduled");

        // The old slot is free again
        workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "10:00"))
            .unwrap();
    }

    #[test]
    fn test_reschedule_into_taken_slot_conflicts() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);
        let a = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "10:00"))
            .unwrap();
        workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "11:00"))
            .unwrap();

        let err = workflow
            .reschedule_booking(&mut conn, &a.id, "2024-06-01", "11:00")
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let unchanged = workflow.get_booking(&conn, &a.id).unwrap();
        assert_eq!(unchanged.time, "10:00");
    }

    #[test]
    fn test_slot_update_past_app_check_is_conflict() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);
        let a = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "10:00"))
            .unwrap();
        workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "11:00"))
            .unwrap();

        // A writer that skipped find_slot_holder still hits the slot index
        let err = queries::update_booking_slot(&conn, &a.id, "2024-06-01", "11:00")
            .map_err(conflict_or_internal)
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let unchanged = workflow.get_booking(&conn, &a.id).unwrap();
        assert_eq!(unchanged.time, "10:00");
    }

    #[test]
    fn test_reschedule_to_own_slot_succeeds() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);
        let booking = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "10:00"))
            .unwrap();

        let same = workflow
            .reschedule_booking(&mut conn, &booking.id, "2024-06-01", "10:00")
            .unwrap();
        assert_eq!(same.time, "10:00");
    }

    #[test]
    fn test_reschedule_keeps_confirmation() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);
        let booking = workflow
            .create_booking(&mut conn, new_booking("u1", "2024-06-01", "10:00"))
            .unwrap();
        let confirmed = workflow.confirm_booking(&mut conn, &booking.id).unwrap();

        let moved = workflow
            .reschedule_booking(&mut conn, &booking.id, "2024-06-03", "08:00")
            .unwrap();
        assert_eq!(moved.status, BookingStatus::Confirmed);
        assert_eq!(moved.confirmation_code, confirmed.confirmation_code);
        assert_eq!(queries::get_loyalty(&conn, "Ana").unwrap().unwrap().points, 100);
    }

    #[test]
    fn test_reschedule_missing_booking() {
        let mut conn = setup_db();
        let workflow = BookingWorkflow::new(false);
        let err = workflow
            .reschedule_booking(&mut conn, "missing", "2024-06-01", "10:00")
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    fn coupon(code: &str) -> NewCoupon {
        NewCoupon {
            code: code.to_string(),
            kind: crate::models::CouponKind::Fixed,
            amount: 10.0,
            max_uses: None,
            expires_at: None,
        }
    }
}
