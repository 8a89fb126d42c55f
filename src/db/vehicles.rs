// Vehicles and their service log (events with itemised costs)

use super::{is_unique_violation, now, round2, Changes, DbResult};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const VEHICLE_NOT_FOUND: &str = "Vehicle not found";
const EVENT_NOT_FOUND: &str = "Service event not found";
const ITEM_NOT_FOUND: &str = "Service item not found";
const DUPLICATE_VEHICLE: &str = "Vehicle with this VIN or registration number already exists";

// ============================================================================
// VEHICLES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub user_id: Uuid,
    pub brand: String,
    pub model: String,
    pub production_year: i64,
    pub vin: String,
    pub registration_number: String,
    pub fuel_type: String,
    pub current_mileage: i64,
    pub last_service_date: Option<NaiveDate>,
    pub last_service_mileage: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewVehicle {
    #[validate(length(min = 1, max = 100))]
    pub brand: String,
    #[validate(length(min = 1, max = 100))]
    pub model: String,
    pub production_year: i64,
    #[validate(length(equal = 17))]
    pub vin: String,
    #[validate(length(min = 1, max = 20))]
    pub registration_number: String,
    #[validate(length(min = 1, max = 20))]
    pub fuel_type: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub current_mileage: i64,
    pub last_service_date: Option<NaiveDate>,
    pub last_service_mileage: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct VehicleUpdate {
    #[validate(length(min = 1, max = 100))]
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub model: Option<String>,
    pub production_year: Option<i64>,
    #[validate(length(equal = 17))]
    pub vin: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub registration_number: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub fuel_type: Option<String>,
    #[validate(range(min = 0))]
    pub current_mileage: Option<i64>,
    pub last_service_date: Option<NaiveDate>,
    pub last_service_mileage: Option<i64>,
    pub is_active: Option<bool>,
}

const VEHICLE_COLUMNS: &str = "id, user_id, brand, model, production_year, vin, registration_number,
     fuel_type, current_mileage, last_service_date, last_service_mileage, is_active, created_at, updated_at";

fn vehicle_from_row(row: &Row) -> DbResult<Vehicle> {
    Ok(Vehicle {
        id: row.get(0)?,
        user_id: row.get(1)?,
        brand: row.get(2)?,
        model: row.get(3)?,
        production_year: row.get(4)?,
        vin: row.get(5)?,
        registration_number: row.get(6)?,
        fuel_type: row.get(7)?,
        current_mileage: row.get(8)?,
        last_service_date: row.get(9)?,
        last_service_mileage: row.get(10)?,
        is_active: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn map_duplicate(err: rusqlite::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::bad_request(DUPLICATE_VEHICLE)
    } else {
        err.into()
    }
}

pub fn create_vehicle(conn: &Connection, user_id: Uuid, new: &NewVehicle) -> AppResult<Vehicle> {
    let ts = now();
    let vehicle = Vehicle {
        id: Uuid::new_v4(),
        user_id,
        brand: new.brand.trim().to_string(),
        model: new.model.trim().to_string(),
        production_year: new.production_year,
        vin: new.vin.trim().to_uppercase(),
        registration_number: new.registration_number.trim().to_uppercase(),
        fuel_type: new.fuel_type.trim().to_string(),
        current_mileage: new.current_mileage,
        last_service_date: new.last_service_date,
        last_service_mileage: new.last_service_mileage,
        is_active: true,
        created_at: ts,
        updated_at: ts,
    };

    conn.execute(
        &format!("INSERT INTO vehicles ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)", VEHICLE_COLUMNS),
        params![
            vehicle.id,
            vehicle.user_id,
            vehicle.brand,
            vehicle.model,
            vehicle.production_year,
            vehicle.vin,
            vehicle.registration_number,
            vehicle.fuel_type,
            vehicle.current_mileage,
            vehicle.last_service_date,
            vehicle.last_service_mileage,
            vehicle.is_active,
            vehicle.created_at,
            vehicle.updated_at
        ],
    )
    .map_err(map_duplicate)?;

    tracing::debug!(vehicle_id = %vehicle.id, "vehicle created");
    Ok(vehicle)
}

pub fn list_vehicles(conn: &Connection, user_id: Uuid) -> AppResult<Vec<Vehicle>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM vehicles WHERE user_id = ?1 ORDER BY brand, model",
        VEHICLE_COLUMNS
    ))?;
    let vehicles = stmt
        .query_map([user_id], vehicle_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(vehicles)
}

pub fn get_owned_vehicle(conn: &Connection, user_id: Uuid, vehicle_id: Uuid) -> AppResult<Vehicle> {
    conn.query_row(
        &format!("SELECT {} FROM vehicles WHERE id = ?1 AND user_id = ?2", VEHICLE_COLUMNS),
        params![vehicle_id, user_id],
        vehicle_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found(VEHICLE_NOT_FOUND))
}

pub fn update_vehicle(
    conn: &Connection,
    user_id: Uuid,
    vehicle_id: Uuid,
    update: &VehicleUpdate,
) -> AppResult<Vehicle> {
    get_owned_vehicle(conn, user_id, vehicle_id)?;

    let mut changes = Changes::new();
    changes
        .set("brand", update.brand.as_ref().map(|s| s.trim().to_string()))
        .set("model", update.model.as_ref().map(|s| s.trim().to_string()))
        .set("production_year", update.production_year)
        .set("vin", update.vin.as_ref().map(|s| s.trim().to_uppercase()))
        .set(
            "registration_number",
            update.registration_number.as_ref().map(|s| s.trim().to_uppercase()),
        )
        .set("fuel_type", update.fuel_type.as_ref().map(|s| s.trim().to_string()))
        .set("current_mileage", update.current_mileage)
        .set("last_service_date", update.last_service_date)
        .set("last_service_mileage", update.last_service_mileage)
        .set("is_active", update.is_active);
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }
    changes.apply(conn, "vehicles", vehicle_id, true).map_err(map_duplicate)?;

    get_owned_vehicle(conn, user_id, vehicle_id)
}

/// Service events and their items go with the vehicle
pub fn delete_vehicle(conn: &Connection, user_id: Uuid, vehicle_id: Uuid) -> AppResult<()> {
    get_owned_vehicle(conn, user_id, vehicle_id)?;
    conn.execute("DELETE FROM vehicles WHERE id = ?1", [vehicle_id])?;
    Ok(())
}

// ============================================================================
// SERVICE EVENTS & ITEMS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ServiceItem {
    pub id: Uuid,
    pub service_event_id: Uuid,
    #[serde(rename = "type")]
    pub item_type: String,
    pub description: String,
    pub cost: f64,
    pub is_recurring: bool,
    pub interval_km: Option<i64>,
    pub interval_months: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceEvent {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub service_date: NaiveDate,
    pub mileage_at_service: i64,
    pub total_cost: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<ServiceItem>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewServiceEvent {
    pub vehicle_id: Uuid,
    pub service_date: NaiveDate,
    #[validate(range(min = 0))]
    pub mileage_at_service: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ServiceEventUpdate {
    pub service_date: Option<NaiveDate>,
    #[validate(range(min = 0))]
    pub mileage_at_service: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewServiceItem {
    pub service_event_id: Uuid,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50))]
    pub item_type: String,
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    #[validate(range(min = 0.0))]
    pub cost: f64,
    #[serde(default)]
    pub is_recurring: bool,
    #[validate(range(min = 0))]
    pub interval_km: Option<i64>,
    #[validate(range(min = 0))]
    pub interval_months: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ServiceItemUpdate {
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50))]
    pub item_type: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub cost: Option<f64>,
    pub is_recurring: Option<bool>,
    #[validate(range(min = 0))]
    pub interval_km: Option<i64>,
    #[validate(range(min = 0))]
    pub interval_months: Option<i64>,
}

fn event_from_row(row: &Row) -> DbResult<ServiceEvent> {
    Ok(ServiceEvent {
        id: row.get(0)?,
        vehicle_id: row.get(1)?,
        service_date: row.get(2)?,
        mileage_at_service: row.get(3)?,
        total_cost: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &Row) -> DbResult<ServiceItem> {
    Ok(ServiceItem {
        id: row.get(0)?,
        service_event_id: row.get(1)?,
        item_type: row.get(2)?,
        description: row.get(3)?,
        cost: row.get(4)?,
        is_recurring: row.get(5)?,
        interval_km: row.get(6)?,
        interval_months: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Event id -> vehicle id, only when the vehicle belongs to `user_id`
fn owned_event_vehicle(conn: &Connection, user_id: Uuid, event_id: Uuid) -> AppResult<Uuid> {
    conn.query_row(
        "SELECT e.vehicle_id FROM service_events e JOIN vehicles v ON v.id = e.vehicle_id
         WHERE e.id = ?1 AND v.user_id = ?2",
        params![event_id, user_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| AppError::not_found(EVENT_NOT_FOUND))
}

/// Item id -> (event id, vehicle id), only when the vehicle belongs to `user_id`
fn owned_item_event(conn: &Connection, user_id: Uuid, item_id: Uuid) -> AppResult<(Uuid, Uuid)> {
    conn.query_row(
        "SELECT i.service_event_id, e.vehicle_id FROM service_items i
         JOIN service_events e ON e.id = i.service_event_id
         JOIN vehicles v ON v.id = e.vehicle_id
         WHERE i.id = ?1 AND v.user_id = ?2",
        params![item_id, user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or_else(|| AppError::not_found(ITEM_NOT_FOUND))
}

/// total_cost = SUM(items.cost), 0 when the event has no items
pub fn recompute_event_total(conn: &Connection, event_id: Uuid) -> DbResult<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(cost), 0) FROM service_items WHERE service_event_id = ?1",
        [event_id],
        |row| row.get(0),
    )?;
    let total = round2(total);
    conn.execute(
        "UPDATE service_events SET total_cost = ?1, updated_at = ?2 WHERE id = ?3",
        params![total, now(), event_id],
    )?;
    Ok(total)
}

/// Copy the latest service into the vehicle's cached columns.
///
/// The latest event is ordered by service date, then mileage. Mileage never
/// goes backwards. A vehicle without events is left untouched.
pub fn sync_vehicle_cache(conn: &Connection, vehicle_id: Uuid) -> DbResult<bool> {
    let latest: Option<(NaiveDate, i64)> = conn
        .query_row(
            "SELECT service_date, mileage_at_service FROM service_events
             WHERE vehicle_id = ?1
             ORDER BY service_date DESC, mileage_at_service DESC
             LIMIT 1",
            [vehicle_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((service_date, mileage)) = latest else {
        return Ok(false);
    };

    conn.execute(
        "UPDATE vehicles
         SET current_mileage = MAX(current_mileage, ?1),
             last_service_date = ?2,
             last_service_mileage = ?1,
             updated_at = ?3
         WHERE id = ?4",
        params![mileage, service_date, now(), vehicle_id],
    )?;
    Ok(true)
}

pub fn create_event(conn: &Connection, user_id: Uuid, new: &NewServiceEvent) -> AppResult<ServiceEvent> {
    get_owned_vehicle(conn, user_id, new.vehicle_id)?;

    let ts = now();
    let event = ServiceEvent {
        id: Uuid::new_v4(),
        vehicle_id: new.vehicle_id,
        service_date: new.service_date,
        mileage_at_service: new.mileage_at_service,
        total_cost: 0.0,
        notes: new.notes.clone(),
        created_at: ts,
        updated_at: ts,
        items: Vec::new(),
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO service_events (id, vehicle_id, service_date, mileage_at_service, total_cost,
                                     notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)",
        params![
            event.id,
            event.vehicle_id,
            event.service_date,
            event.mileage_at_service,
            event.notes,
            event.created_at,
            event.updated_at
        ],
    )?;
    sync_vehicle_cache(&tx, event.vehicle_id)?;
    tx.commit()?;

    Ok(event)
}

pub fn update_event(
    conn: &Connection,
    user_id: Uuid,
    event_id: Uuid,
    update: &ServiceEventUpdate,
) -> AppResult<()> {
    let vehicle_id = owned_event_vehicle(conn, user_id, event_id)?;

    let mut changes = Changes::new();
    changes
        .set("service_date", update.service_date)
        .set("mileage_at_service", update.mileage_at_service)
        .set("notes", update.notes.clone());
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }

    let tx = conn.unchecked_transaction()?;
    changes.apply(&tx, "service_events", event_id, true)?;
    sync_vehicle_cache(&tx, vehicle_id)?;
    tx.commit()?;
    Ok(())
}

pub fn delete_event(conn: &Connection, user_id: Uuid, event_id: Uuid) -> AppResult<()> {
    let vehicle_id = owned_event_vehicle(conn, user_id, event_id)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM service_events WHERE id = ?1", [event_id])?;
    sync_vehicle_cache(&tx, vehicle_id)?;
    tx.commit()?;
    Ok(())
}

pub fn add_item(conn: &Connection, user_id: Uuid, new: &NewServiceItem) -> AppResult<ServiceItem> {
    owned_event_vehicle(conn, user_id, new.service_event_id)?;

    let item = ServiceItem {
        id: Uuid::new_v4(),
        service_event_id: new.service_event_id,
        item_type: new.item_type.trim().to_string(),
        description: new.description.trim().to_string(),
        cost: round2(new.cost),
        is_recurring: new.is_recurring,
        interval_km: new.interval_km,
        interval_months: new.interval_months,
        created_at: now(),
    };

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO service_items (id, service_event_id, type, description, cost, is_recurring,
                                    interval_km, interval_months, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            item.id,
            item.service_event_id,
            item.item_type,
            item.description,
            item.cost,
            item.is_recurring,
            item.interval_km,
            item.interval_months,
            item.created_at
        ],
    )?;
    recompute_event_total(&tx, item.service_event_id)?;
    tx.commit()?;

    Ok(item)
}

pub fn update_item(
    conn: &Connection,
    user_id: Uuid,
    item_id: Uuid,
    update: &ServiceItemUpdate,
) -> AppResult<()> {
    let (event_id, _) = owned_item_event(conn, user_id, item_id)?;

    let mut changes = Changes::new();
    changes
        .set("type", update.item_type.as_ref().map(|s| s.trim().to_string()))
        .set("description", update.description.as_ref().map(|s| s.trim().to_string()))
        .set("cost", update.cost.map(round2))
        .set("is_recurring", update.is_recurring)
        .set("interval_km", update.interval_km)
        .set("interval_months", update.interval_months);
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }

    let tx = conn.unchecked_transaction()?;
    changes.apply(&tx, "service_items", item_id, false)?;
    recompute_event_total(&tx, event_id)?;
    tx.commit()?;
    Ok(())
}

pub fn delete_item(conn: &Connection, user_id: Uuid, item_id: Uuid) -> AppResult<()> {
    let (event_id, vehicle_id) = owned_item_event(conn, user_id, item_id)?;

    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM service_items WHERE id = ?1", [item_id])?;
    recompute_event_total(&tx, event_id)?;
    sync_vehicle_cache(&tx, vehicle_id)?;
    tx.commit()?;
    Ok(())
}

/// Events of an owned vehicle with their items, newest service first
pub fn vehicle_history(conn: &Connection, user_id: Uuid, vehicle_id: Uuid) -> AppResult<Vec<ServiceEvent>> {
    get_owned_vehicle(conn, user_id, vehicle_id)?;

    let mut stmt = conn.prepare(
        "SELECT id, vehicle_id, service_date, mileage_at_service, total_cost, notes, created_at, updated_at
         FROM service_events WHERE vehicle_id = ?1
         ORDER BY service_date DESC, mileage_at_service DESC",
    )?;
    let mut events = stmt
        .query_map([vehicle_id], event_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut item_stmt = conn.prepare(
        "SELECT id, service_event_id, type, description, cost, is_recurring, interval_km,
                interval_months, created_at
         FROM service_items WHERE service_event_id = ?1 ORDER BY created_at, rowid",
    )?;
    for event in events.iter_mut() {
        event.items = item_stmt
            .query_map([event.id], item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_vehicle(vin: &str, reg: &str) -> NewVehicle {
        NewVehicle {
            brand: "Skoda".into(),
            model: "Octavia".into(),
            production_year: 2018,
            vin: vin.into(),
            registration_number: reg.into(),
            fuel_type: "diesel".into(),
            current_mileage: 100_000,
            last_service_date: None,
            last_service_mileage: None,
        }
    }

    fn event(vehicle_id: Uuid, day: NaiveDate, mileage: i64) -> NewServiceEvent {
        NewServiceEvent { vehicle_id, service_date: day, mileage_at_service: mileage, notes: None }
    }

    fn item(service_event_id: Uuid, cost: f64) -> NewServiceItem {
        NewServiceItem {
            service_event_id,
            item_type: "oil".into(),
            description: "Oil change".into(),
            cost,
            is_recurring: true,
            interval_km: Some(15_000),
            interval_months: Some(12),
        }
    }

    #[test]
    fn test_vin_must_have_17_chars() {
        assert!(new_vehicle("TMBJJ7NE8J0123456", "WE12345").validate().is_ok());
        assert!(new_vehicle("SHORT", "WE12345").validate().is_err());
    }

    #[test]
    fn test_duplicate_vin_is_bad_request() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "driver");
        create_vehicle(&conn, user, &new_vehicle("TMBJJ7NE8J0123456", "WE1")).unwrap();

        let err = create_vehicle(&conn, user, &new_vehicle("TMBJJ7NE8J0123456", "WE2")).unwrap_err();
        assert_eq!(err.status_code(), 400);
        let err = create_vehicle(&conn, user, &new_vehicle("TMBJJ7NE8J0654321", "we1")).unwrap_err();
        assert_eq!(err.status_code(), 400, "Registration compared upper-cased");
    }

    #[test]
    fn test_item_costs_roll_up_into_event_total() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "mech");
        let vehicle = create_vehicle(&conn, user, &new_vehicle("TMBJJ7NE8J0123456", "WE1")).unwrap();
        let ev = create_event(&conn, user, &event(vehicle.id, date(2025, 3, 1), 110_000)).unwrap();

        let oil = add_item(&conn, user, &item(ev.id, 250.0)).unwrap();
        add_item(&conn, user, &item(ev.id, 99.99)).unwrap();

        let history = vehicle_history(&conn, user, vehicle.id).unwrap();
        assert_eq!(history[0].total_cost, 349.99);
        assert_eq!(history[0].items.len(), 2);

        update_item(&conn, user, oil.id, &ServiceItemUpdate { cost: Some(300.0), ..Default::default() }).unwrap();
        assert_eq!(vehicle_history(&conn, user, vehicle.id).unwrap()[0].total_cost, 399.99);

        delete_item(&conn, user, oil.id).unwrap();
        assert_eq!(vehicle_history(&conn, user, vehicle.id).unwrap()[0].total_cost, 99.99);
    }

    #[test]
    fn test_vehicle_cache_follows_latest_event() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "cache");
        let vehicle = create_vehicle(&conn, user, &new_vehicle("TMBJJ7NE8J0123456", "WE1")).unwrap();

        create_event(&conn, user, &event(vehicle.id, date(2025, 1, 10), 120_000)).unwrap();
        let older = create_event(&conn, user, &event(vehicle.id, date(2024, 6, 1), 90_000)).unwrap();

        let v = get_owned_vehicle(&conn, user, vehicle.id).unwrap();
        assert_eq!(v.last_service_date, Some(date(2025, 1, 10)));
        assert_eq!(v.last_service_mileage, Some(120_000));
        assert_eq!(v.current_mileage, 120_000);

        let history = vehicle_history(&conn, user, vehicle.id).unwrap();
        assert_eq!(history[0].service_date, date(2025, 1, 10), "Newest first");

        delete_event(&conn, user, history[0].id).unwrap();
        let v = get_owned_vehicle(&conn, user, vehicle.id).unwrap();
        assert_eq!(v.last_service_date, Some(date(2024, 6, 1)));
        assert_eq!(v.last_service_mileage, Some(90_000));
        assert_eq!(v.current_mileage, 120_000, "Mileage never decreases");

        delete_event(&conn, user, older.id).unwrap();
        let v = get_owned_vehicle(&conn, user, vehicle.id).unwrap();
        assert_eq!(v.last_service_date, Some(date(2024, 6, 1)), "No events leaves cache untouched");
    }

    #[test]
    fn test_service_ownership() {
        let conn = test_support::conn();
        let owner = test_support::user(&conn, "owner");
        let other = test_support::user(&conn, "other");
        let vehicle = create_vehicle(&conn, owner, &new_vehicle("TMBJJ7NE8J0123456", "WE1")).unwrap();
        let ev = create_event(&conn, owner, &event(vehicle.id, date(2025, 1, 1), 1)).unwrap();

        assert_eq!(create_event(&conn, other, &event(vehicle.id, date(2025, 1, 1), 1)).unwrap_err().status_code(), 404);
        assert_eq!(add_item(&conn, other, &item(ev.id, 1.0)).unwrap_err().to_string(), EVENT_NOT_FOUND);
        assert_eq!(vehicle_history(&conn, other, vehicle.id).unwrap_err().status_code(), 404);
        assert_eq!(delete_event(&conn, other, ev.id).unwrap_err().status_code(), 404);
    }

    #[test]
    fn test_delete_vehicle_cascades() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "cascade");
        let vehicle = create_vehicle(&conn, user, &new_vehicle("TMBJJ7NE8J0123456", "WE1")).unwrap();
        let ev = create_event(&conn, user, &event(vehicle.id, date(2025, 1, 1), 1)).unwrap();
        add_item(&conn, user, &item(ev.id, 10.0)).unwrap();

        delete_vehicle(&conn, user, vehicle.id).unwrap();
        let items: i64 = conn.query_row("SELECT COUNT(*) FROM service_items", [], |r| r.get(0)).unwrap();
        assert_eq!(items, 0);
        assert!(list_vehicles(&conn, user).unwrap().is_empty());
    }

    #[test]
    fn test_update_vehicle() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "updater");
        let vehicle = create_vehicle(&conn, user, &new_vehicle("TMBJJ7NE8J0123456", "WE1")).unwrap();

        let updated = update_vehicle(
            &conn,
            user,
            vehicle.id,
            &VehicleUpdate { is_active: Some(false), current_mileage: Some(150_000), ..Default::default() },
        )
        .unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.current_mileage, 150_000);

        let err = update_vehicle(&conn, user, vehicle.id, &VehicleUpdate::default()).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
