use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Booking, BookingStatus, Coupon, CouponKind, HistoryEntry, Loyalty, Service, Unit,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Reads a stored timestamp column; an unparsable value is a row error, not a guess.
fn get_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TS_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn now_str() -> String {
    format_ts(&Utc::now().naive_utc())
}

// ── Services ──

pub fn insert_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, description, duration_minutes, price, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            service.id,
            service.name,
            service.description,
            service.duration_minutes,
            service.price,
            service.is_active as i32,
            format_ts(&service.created_at),
        ],
    )?;

    for (position, unit) in service.units.iter().enumerate() {
        conn.execute(
            "INSERT INTO service_units (id, service_id, name, position) VALUES (?1, ?2, ?3, ?4)",
            params![unit.id, service.id, unit.name, position as i64],
        )?;
    }
    Ok(())
}

pub fn list_services(conn: &Connection) -> anyhow::Result<Vec<Service>> {
    let mut units_by_service: HashMap<String, Vec<Unit>> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT service_id, id, name FROM service_units ORDER BY service_id, position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Unit {
                    id: row.get(1)?,
                    name: row.get(2)?,
                },
            ))
        })?;
        for row in rows {
            let (service_id, unit) = row?;
            units_by_service.entry(service_id).or_default().push(unit);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, description, duration_minutes, price, is_active, created_at
         FROM services ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Service {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            duration_minutes: row.get(3)?,
            price: row.get(4)?,
            is_active: row.get::<_, i32>(5)? != 0,
            units: vec![],
            created_at: get_ts(row, 6)?,
        })
    })?;

    let mut services = vec![];
    for row in rows {
        let mut service = row?;
        service.units = units_by_service.remove(&service.id).unwrap_or_default();
        services.push(service);
    }
    Ok(services)
}

pub fn count_services(conn: &Connection) -> anyhow::Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM services", [], |row| row.get(0))?;
    Ok(count)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, service_id, service_name, unit_id, unit_name, date, time, price, \
     customer_name, customer_email, coupon_code, status, confirmation_code, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            booking.id,
            booking.service_id,
            booking.service_name,
            booking.unit_id,
            booking.unit_name,
            booking.date,
            booking.time,
            booking.price,
            booking.customer_name,
            booking.customer_email,
            booking.coupon_code,
            booking.status.as_str(),
            booking.confirmation_code,
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )?;

    for entry in &booking.history {
        append_history(conn, &booking.id, entry)?;
    }
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            parse_booking_row,
        )
        .optional()?;

    match booking {
        Some(mut booking) => {
            booking.history = get_history(conn, &booking.id)?;
            Ok(Some(booking))
        }
        None => Ok(None),
    }
}

/// All bookings in insertion order, each with its full history.
pub fn list_bookings(conn: &Connection) -> anyhow::Result<Vec<Booking>> {
    let mut history_by_booking: HashMap<String, Vec<HistoryEntry>> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT booking_id, ts, actor, action, note FROM booking_history ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let booking_id: String = row.get(0)?;
            Ok((booking_id, parse_history_row(row, 1)?))
        })?;
        for row in rows {
            let (booking_id, entry) = row?;
            history_by_booking.entry(booking_id).or_default().push(entry);
        }
    }

    let mut stmt =
        conn.prepare(&format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY rowid ASC"))?;
    let rows = stmt.query_map([], parse_booking_row)?;

    let mut bookings = vec![];
    for row in rows {
        let mut booking = row?;
        booking.history = history_by_booking.remove(&booking.id).unwrap_or_default();
        bookings.push(booking);
    }
    Ok(bookings)
}

/// Id of a live booking holding the slot, ignoring `exclude_id`.
pub fn find_slot_holder(
    conn: &Connection,
    unit_id: &str,
    date: &str,
    time: &str,
    exclude_id: Option<&str>,
) -> anyhow::Result<Option<String>> {
    let holder = conn
        .query_row(
            "SELECT id FROM bookings
             WHERE unit_id = ?1 AND date = ?2 AND time = ?3 AND status != 'cancelled'
               AND (?4 IS NULL OR id != ?4)
             LIMIT 1",
            params![unit_id, date, time, exclude_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(holder)
}

/// Moves a booking from `pending` to a confirmed status. Returns false when
/// the booking was not pending, so a second writer cannot confirm twice.
pub fn mark_booking_confirmed(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    confirmation_code: &str,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, confirmation_code = ?2, updated_at = ?3
         WHERE id = ?4 AND status = 'pending'",
        params![status.as_str(), confirmation_code, now_str(), id],
    )?;
    Ok(count > 0)
}

pub fn update_booking_slot(
    conn: &Connection,
    id: &str,
    date: &str,
    time: &str,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET date = ?1, time = ?2, updated_at = ?3 WHERE id = ?4",
        params![date, time, now_str(), id],
    )?;
    Ok(count > 0)
}

pub fn append_history(conn: &Connection, booking_id: &str, entry: &HistoryEntry) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_history (booking_id, ts, actor, action, note) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            booking_id,
            format_ts(&entry.timestamp),
            entry.actor,
            entry.action,
            entry.note,
        ],
    )?;
    Ok(())
}

pub fn get_history(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<HistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT ts, actor, action, note FROM booking_history WHERE booking_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| parse_history_row(row, 0))?;

    let mut history = vec![];
    for row in rows {
        history.push(row?);
    }
    Ok(history)
}

fn parse_booking_row(row: &rusqlite::Row) -> rusqlite::Result<Booking> {
    let status_str: String = row.get(11)?;

    Ok(Booking {
        id: row.get(0)?,
        service_id: row.get(1)?,
        service_name: row.get(2)?,
        unit_id: row.get(3)?,
        unit_name: row.get(4)?,
        date: row.get(5)?,
        time: row.get(6)?,
        price: row.get(7)?,
        customer_name: row.get(8)?,
        customer_email: row.get(9)?,
        coupon_code: row.get(10)?,
        status: BookingStatus::parse(&status_str),
        confirmation_code: row.get(12)?,
        history: vec![],
        created_at: get_ts(row, 13)?,
        updated_at: get_ts(row, 14)?,
    })
}

fn parse_history_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        timestamp: get_ts(row, offset)?,
        actor: row.get(offset + 1)?,
        action: row.get(offset + 2)?,
        note: row.get(offset + 3)?,
    })
}

// ── Coupons ──

const COUPON_COLUMNS: &str = "id, code, kind, amount, max_uses, used, expires_at, created_at";

pub fn insert_coupon(conn: &Connection, coupon: &Coupon) -> anyhow::Result<()> {
    conn.execute(
        &format!("INSERT INTO coupons ({COUPON_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            coupon.id,
            coupon.code,
            coupon.kind.as_str(),
            coupon.amount,
            coupon.max_uses,
            coupon.used,
            coupon.expires_at,
            format_ts(&coupon.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_coupons(conn: &Connection) -> anyhow::Result<Vec<Coupon>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY rowid ASC"))?;
    let rows = stmt.query_map([], parse_coupon_row)?;

    let mut coupons = vec![];
    for row in rows {
        coupons.push(row?);
    }
    Ok(coupons)
}

/// Exact match on the stored (upper-cased) code.
pub fn find_coupon_by_code(conn: &Connection, code: &str) -> anyhow::Result<Option<Coupon>> {
    let coupon = conn
        .query_row(
            &format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = ?1"),
            params![code],
            parse_coupon_row,
        )
        .optional()?;
    Ok(coupon)
}

pub fn increment_coupon_used(conn: &Connection, code: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE coupons SET used = used + 1 WHERE code = ?1",
        params![code],
    )?;
    Ok(count > 0)
}

fn parse_coupon_row(row: &rusqlite::Row) -> rusqlite::Result<Coupon> {
    let kind: String = row.get(2)?;
    Ok(Coupon {
        id: row.get(0)?,
        code: row.get(1)?,
        kind: CouponKind::parse(&kind),
        amount: row.get(3)?,
        max_uses: row.get(4)?,
        used: row.get(5)?,
        expires_at: row.get(6)?,
        created_at: get_ts(row, 7)?,
    })
}

// ── Loyalty ──

/// Creates the account with `points` or adds `points` to it. Returns the new balance.
pub fn add_loyalty_points(conn: &Connection, customer_key: &str, points: i64) -> anyhow::Result<i64> {
    let now = now_str();
    conn.execute(
        "INSERT INTO loyalty (customer_key, points, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(customer_key) DO UPDATE SET
           points = points + excluded.points,
           updated_at = excluded.updated_at",
        params![customer_key, points, now],
    )?;

    let balance: i64 = conn.query_row(
        "SELECT points FROM loyalty WHERE customer_key = ?1",
        params![customer_key],
        |row| row.get(0),
    )?;
    Ok(balance)
}

pub fn get_loyalty(conn: &Connection, customer_key: &str) -> anyhow::Result<Option<Loyalty>> {
    let loyalty = conn
        .query_row(
            "SELECT customer_key, points, created_at, updated_at FROM loyalty WHERE customer_key = ?1",
            params![customer_key],
            parse_loyalty_row,
        )
        .optional()?;
    Ok(loyalty)
}

pub fn list_loyalty(conn: &Connection) -> anyhow::Result<Vec<Loyalty>> {
    let mut stmt = conn.prepare(
        "SELECT customer_key, points, created_at, updated_at FROM loyalty ORDER BY points DESC, customer_key ASC",
    )?;
    let rows = stmt.query_map([], parse_loyalty_row)?;

    let mut accounts = vec![];
    for row in rows {
        accounts.push(row?);
    }
    Ok(accounts)
}

fn parse_loyalty_row(row: &rusqlite::Row) -> rusqlite::Result<Loyalty> {
    Ok(Loyalty {
        customer_key: row.get(0)?,
        points: row.get(1)?,
        created_at: get_ts(row, 2)?,
        updated_at: get_ts(row, 3)?,
    })
}
