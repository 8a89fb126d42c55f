// SQLite storage: connection bootstrap, schema, and per-entity repositories
//
// Repository functions take `&Connection` and return `AppResult`, so ownership
// checks and delete guards live next to the queries they protect.

pub mod finance;
pub mod loans;
pub mod meals;
pub mod planner;
pub mod settings;
pub mod users;
pub mod vehicles;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params_from_iter, Connection, ToSql};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

pub type DbResult<T> = rusqlite::Result<T>;

/// Open (or create) a database file and make sure the schema exists
pub fn open_db(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    setup_database(&conn).context("Failed to set up schema")?;

    tracing::info!(path = %path.display(), "database opened");
    Ok(conn)
}

/// In-memory database with the full schema, used by tests and previews
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
    setup_database(&conn).context("Failed to set up schema")?;
    Ok(conn)
}

/// Create every table, index and view. Safe to call repeatedly.
pub fn setup_database(conn: &Connection) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Users & sessions
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id BLOB PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            login TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_verified INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_login_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS refresh_tokens (
            id BLOB PRIMARY KEY,
            user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token_hash TEXT NOT NULL UNIQUE,
            expires_at TEXT NOT NULL,
            revoked_at TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Finance
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id BLOB PRIMARY KEY,
            user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            bank_type TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id BLOB PRIMARY KEY,
            user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_rules (
            id BLOB PRIMARY KEY,
            account_id BLOB NOT NULL REFERENCES accounts(id),
            category_id BLOB NOT NULL REFERENCES categories(id),
            keyword TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id BLOB PRIMARY KEY,
            account_id BLOB NOT NULL REFERENCES accounts(id),
            category_id BLOB REFERENCES categories(id),
            date TEXT NOT NULL,
            amount REAL NOT NULL,
            title TEXT NOT NULL,
            raw_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (account_id, raw_hash)
        )",
        [],
    )?;

    // ==========================================================================
    // Loans
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS loans (
            id BLOB PRIMARY KEY,
            user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            total_amount REAL NOT NULL,
            installments_count INTEGER NOT NULL,
            due_day INTEGER NOT NULL,
            installment_amount REAL NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payments (
            id BLOB PRIMARY KEY,
            loan_id BLOB NOT NULL REFERENCES loans(id),
            amount REAL NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('installment', 'prepayment')),
            paid_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE VIEW IF NOT EXISTS loan_status AS
        SELECT
            l.id AS loan_id,
            l.user_id AS user_id,
            l.name AS name,
            l.total_amount AS total_amount,
            l.installments_count AS installments_count,
            l.installment_amount AS installment_amount,
            l.due_day AS due_day,
            COALESCE(SUM(p.amount), 0) AS total_paid,
            l.total_amount - COALESCE(SUM(p.amount), 0) AS remaining,
            COALESCE(SUM(CASE WHEN p.type = 'installment' THEN p.amount ELSE 0 END), 0)
                AS total_installments_paid,
            COALESCE(SUM(CASE WHEN p.type = 'prepayment' THEN p.amount ELSE 0 END), 0)
                AS total_prepayments
        FROM loans l
        LEFT JOIN payments p ON p.loan_id = l.id
        GROUP BY l.id",
        [],
    )?;

    // ==========================================================================
    // Vehicles & service log
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS vehicles (
            id BLOB PRIMARY KEY,
            user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            brand TEXT NOT NULL,
            model TEXT NOT NULL,
            production_year INTEGER NOT NULL,
            vin TEXT NOT NULL UNIQUE,
            registration_number TEXT NOT NULL UNIQUE,
            fuel_type TEXT NOT NULL,
            current_mileage INTEGER NOT NULL DEFAULT 0,
            last_service_date TEXT,
            last_service_mileage INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS service_events (
            id BLOB PRIMARY KEY,
            vehicle_id BLOB NOT NULL REFERENCES vehicles(id) ON DELETE CASCADE,
            service_date TEXT NOT NULL,
            mileage_at_service INTEGER NOT NULL,
            total_cost REAL NOT NULL DEFAULT 0,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS service_items (
            id BLOB PRIMARY KEY,
            service_event_id BLOB NOT NULL REFERENCES service_events(id) ON DELETE CASCADE,
            type TEXT NOT NULL,
            description TEXT NOT NULL,
            cost REAL NOT NULL,
            is_recurring INTEGER NOT NULL DEFAULT 0,
            interval_km INTEGER,
            interval_months INTEGER,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Meals (protein/base/ingredient dictionaries are shared by all users)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS protein_types (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            category TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS base_types (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            category TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meals (
            id BLOB PRIMARY KEY,
            user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            id_protein_type BLOB NOT NULL REFERENCES protein_types(id),
            id_base_type BLOB NOT NULL REFERENCES base_types(id),
            name TEXT NOT NULL,
            description TEXT,
            is_weekend_dish INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ingredients (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            category TEXT NOT NULL,
            unit TEXT NOT NULL DEFAULT 'g'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meal_ingredients (
            id BLOB PRIMARY KEY,
            id_meal BLOB NOT NULL REFERENCES meals(id) ON DELETE CASCADE,
            id_ingredient BLOB NOT NULL REFERENCES ingredients(id),
            base_amount REAL NOT NULL,
            note TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Planning & settings
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS week_plans (
            id BLOB PRIMARY KEY,
            user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            start_date TEXT NOT NULL,
            UNIQUE (user_id, start_date)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS week_meals (
            id BLOB PRIMARY KEY,
            user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            week_plan_id BLOB NOT NULL REFERENCES week_plans(id) ON DELETE CASCADE,
            meal_id BLOB REFERENCES meals(id) ON DELETE SET NULL,
            meal_date TEXT NOT NULL,
            batch_id BLOB,
            is_out_of_home INTEGER NOT NULL DEFAULT 0,
            note TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meal_settings (
            user_id BLOB PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            default_servings INTEGER NOT NULL DEFAULT 2,
            scale_by_two_days INTEGER NOT NULL DEFAULT 1,
            shopping_day_of_week INTEGER NOT NULL DEFAULT 5,
            shopping_list_days_range INTEGER NOT NULL DEFAULT 7,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user ON refresh_tokens(user_id);
         CREATE INDEX IF NOT EXISTS idx_transactions_account_date ON transactions(account_id, date);
         CREATE INDEX IF NOT EXISTS idx_payments_loan ON payments(loan_id);
         CREATE INDEX IF NOT EXISTS idx_service_events_vehicle ON service_events(vehicle_id);
         CREATE INDEX IF NOT EXISTS idx_meal_ingredients_meal ON meal_ingredients(id_meal);
         CREATE INDEX IF NOT EXISTS idx_week_meals_user_date ON week_meals(user_id, meal_date);",
    )?;

    Ok(())
}

// ============================================================================
// HELPERS
// ============================================================================

/// True when the error is a UNIQUE / PRIMARY KEY constraint failure
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

/// Column assignments for a partial update; absent fields are left alone
#[derive(Default)]
pub struct Changes {
    columns: Vec<&'static str>,
    values: Vec<Box<dyn ToSql>>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: ToSql + 'static>(&mut self, column: &'static str, value: Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.columns.push(column);
            self.values.push(Box::new(value));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Run `UPDATE table SET ... WHERE id = ?`, optionally stamping `updated_at`
    pub fn apply(mut self, conn: &Connection, table: &str, id: Uuid, touch: bool) -> DbResult<usize> {
        if self.is_empty() {
            return Ok(0);
        }
        if touch {
            self.columns.push("updated_at");
            self.values.push(Box::new(now()));
        }

        let assignments: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", col, i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            assignments.join(", "),
            self.columns.len() + 1
        );

        self.values.push(Box::new(id));
        conn.execute(&sql, params_from_iter(self.values.iter()))
    }
}

/// Money is kept at two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::users::{create_user, NewUser};
    use rusqlite::Connection;
    use uuid::Uuid;

    pub fn conn() -> Connection {
        super::open_db_in_memory().expect("in-memory db")
    }

    pub fn user(conn: &Connection, login: &str) -> Uuid {
        create_user(
            conn,
            &NewUser {
                email: format!("{}@example.com", login),
                login: login.to_string(),
                password_hash: "not-a-real-hash".to_string(),
            },
        )
        .expect("create user")
        .id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_database_is_idempotent() {
        let conn = open_db_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 19, "Expected every table to be created once");

        let view: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'view' AND name = 'loan_status'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(view, 1);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_db_in_memory().unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_unique_violation_detection() {
        let conn = test_support::conn();
        test_support::user(&conn, "alice");

        let err = conn
            .execute(
                "INSERT INTO users (id, email, login, password_hash, created_at, updated_at)
                 VALUES (?1, 'alice@example.com', 'other', 'x', '', '')",
                [uuid::Uuid::new_v4()],
            )
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&rusqlite::Error::QueryReturnedNoRows));
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(10.005_1), 10.01);
        assert_eq!(round2(-3.333), -3.33);
    }
}
