// Per-user meal planner settings

use super::{now, DbResult};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MealSettings {
    pub user_id: Uuid,
    pub default_servings: u32,
    pub scale_by_two_days: bool,
    pub shopping_day_of_week: u32,
    pub shopping_list_days_range: u32,
    pub updated_at: DateTime<Utc>,
}

impl MealSettings {
    /// Values used before the user has saved anything
    pub fn defaults(user_id: Uuid) -> Self {
        MealSettings {
            user_id,
            default_servings: 2,
            scale_by_two_days: true,
            shopping_day_of_week: 5,
            shopping_list_days_range: 7,
            updated_at: now(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MealSettingsUpdate {
    #[validate(range(min = 1, max = 10))]
    pub default_servings: Option<u32>,
    pub scale_by_two_days: Option<bool>,
    #[validate(range(min = 1, max = 7))]
    pub shopping_day_of_week: Option<u32>,
    #[validate(range(min = 1, max = 31))]
    pub shopping_list_days_range: Option<u32>,
}

impl MealSettingsUpdate {
    fn is_empty(&self) -> bool {
        self.default_servings.is_none()
            && self.scale_by_two_days.is_none()
            && self.shopping_day_of_week.is_none()
            && self.shopping_list_days_range.is_none()
    }
}

/// Stored settings, if the user has any
pub fn find_settings(conn: &Connection, user_id: Uuid) -> DbResult<Option<MealSettings>> {
    conn.query_row(
        "SELECT user_id, default_servings, scale_by_two_days, shopping_day_of_week,
                shopping_list_days_range, updated_at
         FROM meal_settings WHERE user_id = ?1",
        [user_id],
        |row| {
            Ok(MealSettings {
                user_id: row.get(0)?,
                default_servings: row.get(1)?,
                scale_by_two_days: row.get(2)?,
                shopping_day_of_week: row.get(3)?,
                shopping_list_days_range: row.get(4)?,
                updated_at: row.get(5)?,
            })
        },
    )
    .optional()
}

/// Settings row for the user, created with defaults on first access
pub fn get_or_create_settings(conn: &Connection, user_id: Uuid) -> DbResult<MealSettings> {
    if let Some(settings) = find_settings(conn, user_id)? {
        return Ok(settings);
    }

    let settings = MealSettings::defaults(user_id);
    conn.execute(
        "INSERT OR IGNORE INTO meal_settings (user_id, default_servings, scale_by_two_days,
                                              shopping_day_of_week, shopping_list_days_range, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            settings.user_id,
            settings.default_servings,
            settings.scale_by_two_days,
            settings.shopping_day_of_week,
            settings.shopping_list_days_range,
            settings.updated_at
        ],
    )?;
    tracing::debug!(user_id = %user_id, "default meal settings created");
    Ok(settings)
}

pub fn update_settings(conn: &Connection, user_id: Uuid, update: &MealSettingsUpdate) -> AppResult<MealSettings> {
    if update.is_empty() {
        return Err(AppError::bad_request("No data available for update"));
    }

    let mut settings = get_or_create_settings(conn, user_id)?;
    if let Some(v) = update.default_servings {
        settings.default_servings = v;
    }
    if let Some(v) = update.scale_by_two_days {
        settings.scale_by_two_days = v;
    }
    if let Some(v) = update.shopping_day_of_week {
        settings.shopping_day_of_week = v;
    }
    if let Some(v) = update.shopping_list_days_range {
        settings.shopping_list_days_range = v;
    }
    settings.updated_at = now();

    conn.execute(
        "UPDATE meal_settings
         SET default_servings = ?1, scale_by_two_days = ?2, shopping_day_of_week = ?3,
             shopping_list_days_range = ?4, updated_at = ?5
         WHERE user_id = ?6",
        params![
            settings.default_servings,
            settings.scale_by_two_days,
            settings.shopping_day_of_week,
            settings.shopping_list_days_range,
            settings.updated_at,
            user_id
        ],
    )?;
    Ok(settings)
}
