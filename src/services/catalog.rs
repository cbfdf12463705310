use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{NewService, NewUnit, Service, Unit};

const DEFAULT_DURATION_MINUTES: i64 = 60;

pub fn list_services(conn: &Connection) -> Result<Vec<Service>, AppError> {
    Ok(queries::list_services(conn)?)
}

pub fn create_service(conn: &mut Connection, new: NewService) -> Result<Service, AppError> {
    let service = build_service(new)?;

    // Service row and its units land together
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    insert_service(&tx, &service)?;
    tx.commit()?;

    tracing::info!(service_id = %service.id, name = %service.name, units = service.units.len(), "service created");
    Ok(service)
}

fn build_service(new: NewService) -> Result<Service, AppError> {
    let name = new.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    let duration_minutes = new.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
    if duration_minutes <= 0 {
        return Err(AppError::Validation("durationMinutes must be positive".to_string()));
    }

    let units = new
        .units
        .into_iter()
        .map(build_unit)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Service {
        id: Uuid::new_v4().to_string(),
        name,
        description: new.description.unwrap_or_default(),
        duration_minutes,
        price: new.price.unwrap_or(0.0),
        is_active: new.is_active.unwrap_or(true),
        units,
        created_at: Utc::now().naive_utc(),
    })
}

fn build_unit(new: NewUnit) -> Result<Unit, AppError> {
    let name = new.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("unit name is required".to_string()));
    }
    let id = new
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    Ok(Unit { id, name })
}

fn insert_service(conn: &Connection, service: &Service) -> Result<(), AppError> {
    queries::insert_service(conn, service).map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::Conflict("unit id already in use".to_string())
        } else {
            AppError::Internal(e)
        }
    })
}

/// Fills an empty catalog with the default courts. Returns how many services were inserted.
///
/// All defaults are written in one transaction; a failure leaves the catalog empty.
pub fn seed_default_services(conn: &mut Connection) -> Result<usize, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if queries::count_services(&tx)? > 0 {
        tracing::info!("catalog already populated, skipping seed");
        return Ok(0);
    }

    let defaults = [
        ("Badminton Court", "Single court", 250.0),
        ("Tennis Court", "Singles", 400.0),
        ("Basketball Court", "Half-court", 600.0),
    ];

    for (name, description, price) in defaults {
        let service = build_service(NewService {
            name: name.to_string(),
            description: Some(description.to_string()),
            duration_minutes: Some(DEFAULT_DURATION_MINUTES),
            price: Some(price),
            is_active: Some(true),
            units: vec![NewUnit {
                id: None,
                name: format!("{name} 1"),
            }],
        })?;
        insert_service(&tx, &service)?;
    }
    tx.commit()?;

    tracing::info!(count = defaults.len(), "seeded default services");
    Ok(defaults.len())
}
