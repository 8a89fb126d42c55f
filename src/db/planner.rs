// Week plans, planned days, and the reads the proposal and shopping list need

use super::meals::get_owned_meal;
use super::settings::get_or_create_settings;
use super::DbResult;
use crate::error::{AppError, AppResult};
use crate::planner::{self, MealCandidate, ProposalEntry};
use crate::shopping::{self, PlannedDay, RecipeLine, ShoppingList};
use chrono::{Datelike, Duration, NaiveDate};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeekEntry {
    pub id: Uuid,
    pub meal_date: NaiveDate,
    pub meal_id: Option<Uuid>,
    pub is_out_of_home: bool,
    pub note: Option<String>,
    pub batch_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeekPlan {
    pub id: Uuid,
    pub start_date: NaiveDate,
    pub day_entries: Vec<WeekEntry>,
}

/// A day (or two) to put on the calendar
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewWeekMeal {
    pub meal_date: NaiveDate,
    pub meal_id: Option<Uuid>,
    #[serde(default)]
    pub is_out_of_home: bool,
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[serde(default)]
    pub is_two_days: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthDay {
    pub date: NaiveDate,
    pub meal_id: Option<Uuid>,
    pub meal_name: Option<String>,
    pub is_two_days: bool,
    pub is_out_of_home: bool,
    pub protein_type: Option<String>,
    pub base_type: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub days: Vec<MonthDay>,
}

/// `date` moved by `days`; 400 when the result leaves the calendar
pub fn shift_days(date: NaiveDate, days: i64) -> AppResult<NaiveDate> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| AppError::bad_request("Date is out of the supported range"))
}

/// Monday of the week containing `date`
pub fn monday_of(date: NaiveDate) -> AppResult<NaiveDate> {
    shift_days(date, -i64::from(date.weekday().num_days_from_monday()))
}

fn entry_from_row(row: &Row) -> DbResult<WeekEntry> {
    Ok(WeekEntry {
        id: row.get(0)?,
        meal_date: row.get(1)?,
        meal_id: row.get(2)?,
        is_out_of_home: row.get(3)?,
        note: row.get(4)?,
        batch_id: row.get(5)?,
    })
}

// ============================================================================
// WEEK PLANS
// ============================================================================

/// Id of the user's plan for the week containing `date`, created on demand
pub fn get_or_create_week_plan(conn: &Connection, user_id: Uuid, date: NaiveDate) -> AppResult<Uuid> {
    let monday = monday_of(date)?;
    conn.execute(
        "INSERT OR IGNORE INTO week_plans (id, user_id, start_date) VALUES (?1, ?2, ?3)",
        params![Uuid::new_v4(), user_id, monday],
    )?;
    conn.query_row(
        "SELECT id FROM week_plans WHERE user_id = ?1 AND start_date = ?2",
        params![user_id, monday],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

fn find_week_plan(conn: &Connection, user_id: Uuid, monday: NaiveDate) -> DbResult<Option<Uuid>> {
    conn.query_row(
        "SELECT id FROM week_plans WHERE user_id = ?1 AND start_date = ?2",
        params![user_id, monday],
        |row| row.get(0),
    )
    .optional()
}

/// The week's plan with its days ordered by date; the plan is created if missing
pub fn week_plan(conn: &Connection, user_id: Uuid, monday: NaiveDate) -> AppResult<WeekPlan> {
    let start_date = monday_of(monday)?;
    let id = get_or_create_week_plan(conn, user_id, start_date)?;

    let mut stmt = conn.prepare(
        "SELECT id, meal_date, meal_id, is_out_of_home, note, batch_id
         FROM week_meals WHERE week_plan_id = ?1 ORDER BY meal_date",
    )?;
    let day_entries = stmt
        .query_map([id], entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WeekPlan { id, start_date, day_entries })
}

/// Replace the user's entries on the target days. No transaction of its own.
fn put_entry(conn: &Connection, user_id: Uuid, entry: &NewWeekMeal) -> AppResult<()> {
    if let Some(meal_id) = entry.meal_id {
        get_owned_meal(conn, user_id, meal_id)?;
    }

    let batch_id = entry.is_two_days.then(Uuid::new_v4);
    let mut days = vec![entry.meal_date];
    if entry.is_two_days {
        days.push(shift_days(entry.meal_date, 1)?);
    }

    for day in days {
        conn.execute(
            "DELETE FROM week_meals WHERE user_id = ?1 AND meal_date = ?2",
            params![user_id, day],
        )?;

        let first = day == entry.meal_date;
        let plan_id = get_or_create_week_plan(conn, user_id, day)?;
        conn.execute(
            "INSERT INTO week_meals (id, user_id, week_plan_id, meal_id, meal_date, batch_id,
                                     is_out_of_home, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                Uuid::new_v4(),
                user_id,
                plan_id,
                entry.meal_id,
                day,
                batch_id,
                first && entry.is_out_of_home,
                if first { entry.note.clone() } else { None }
            ],
        )?;
    }
    Ok(())
}

/// Put a meal on the calendar; returns the Monday of its week
pub fn add_meal_to_plan(conn: &Connection, user_id: Uuid, entry: &NewWeekMeal) -> AppResult<NaiveDate> {
    let tx = conn.unchecked_transaction()?;
    put_entry(&tx, user_id, entry)?;
    tx.commit()?;
    monday_of(entry.meal_date)
}

/// Replace the day with an out-of-home entry
pub fn set_out_of_home(conn: &Connection, user_id: Uuid, date: NaiveDate) -> AppResult<NaiveDate> {
    add_meal_to_plan(
        conn,
        user_id,
        &NewWeekMeal {
            meal_date: date,
            meal_id: None,
            is_out_of_home: true,
            note: None,
            is_two_days: false,
        },
    )
}

/// Save every proposal entry in one transaction
pub fn accept_proposal(conn: &Connection, user_id: Uuid, entries: &[NewWeekMeal]) -> AppResult<usize> {
    if entries.is_empty() {
        return Err(AppError::bad_request("The list of suggestions is empty."));
    }

    let tx = conn.unchecked_transaction()?;
    for entry in entries {
        put_entry(&tx, user_id, entry)?;
    }
    tx.commit()?;
    Ok(entries.len())
}

/// Clear a day; a day that belongs to a batch takes the whole batch with it
pub fn remove_day(conn: &Connection, user_id: Uuid, date: NaiveDate) -> AppResult<usize> {
    let batch: Option<Option<Uuid>> = conn
        .query_row(
            "SELECT batch_id FROM week_meals WHERE user_id = ?1 AND meal_date = ?2 LIMIT 1",
            params![user_id, date],
            |row| row.get(0),
        )
        .optional()?;

    let removed = match batch {
        None => 0,
        Some(Some(batch_id)) => conn.execute(
            "DELETE FROM week_meals WHERE user_id = ?1 AND batch_id = ?2",
            params![user_id, batch_id],
        )?,
        Some(None) => conn.execute(
            "DELETE FROM week_meals WHERE user_id = ?1 AND meal_date = ?2",
            params![user_id, date],
        )?,
    };
    Ok(removed)
}

/// Remove every entry of the week; 404 when the week was never planned
pub fn clear_week(conn: &Connection, user_id: Uuid, monday: NaiveDate) -> AppResult<usize> {
    let plan_id = find_week_plan(conn, user_id, monday_of(monday)?)?
        .ok_or_else(|| AppError::not_found("No plan found for the given date"))?;
    Ok(conn.execute("DELETE FROM week_meals WHERE week_plan_id = ?1", [plan_id])?)
}

/// Calendar of a month with meal, protein and base names resolved
pub fn month_view(conn: &Connection, user_id: Uuid, year: i32, month: u32) -> AppResult<MonthView> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::bad_request("Invalid year or month"))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| AppError::bad_request("Invalid year or month"))?;
    let last = shift_days(next, -1)?;

    let mut stmt = conn.prepare(
        "SELECT w.meal_date, w.meal_id, m.name, w.batch_id IS NOT NULL, w.is_out_of_home,
                p.name, b.name, w.note
         FROM week_meals w
         LEFT JOIN meals m ON m.id = w.meal_id
         LEFT JOIN protein_types p ON p.id = m.id_protein_type
         LEFT JOIN base_types b ON b.id = m.id_base_type
         WHERE w.user_id = ?1 AND w.meal_date >= ?2 AND w.meal_date <= ?3
         ORDER BY w.meal_date",
    )?;
    let days = stmt
        .query_map(params![user_id, first, last], |row| {
            Ok(MonthDay {
                date: row.get(0)?,
                meal_id: row.get(1)?,
                meal_name: row.get(2)?,
                is_two_days: row.get(3)?,
                is_out_of_home: row.get(4)?,
                protein_type: row.get(5)?,
                base_type: row.get(6)?,
                note: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MonthView { year, month, days })
}

// ============================================================================
// PROPOSAL INPUTS
// ============================================================================

/// Meal ids the user has planned on or after `since`
pub fn recent_meal_ids(conn: &Connection, user_id: Uuid, since: NaiveDate) -> DbResult<HashSet<Uuid>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT meal_id FROM week_meals
         WHERE user_id = ?1 AND meal_date >= ?2 AND meal_id IS NOT NULL",
    )?;
    let ids = stmt
        .query_map(params![user_id, since], |row| row.get(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

pub fn meal_candidates(conn: &Connection, user_id: Uuid) -> DbResult<Vec<MealCandidate>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, id_protein_type, id_base_type, is_weekend_dish
         FROM meals WHERE user_id = ?1 ORDER BY name",
    )?;
    let meals = stmt
        .query_map([user_id], |row| {
            Ok(MealCandidate {
                id: row.get(0)?,
                name: row.get(1)?,
                protein_id: row.get(2)?,
                base_id: row.get(3)?,
                is_weekend_dish: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(meals)
}

/// Load history and meals, then run the proposal for the week
pub fn generate_week_proposal<R: Rng + ?Sized>(
    conn: &Connection,
    user_id: Uuid,
    monday: NaiveDate,
    rng: &mut R,
) -> AppResult<Vec<ProposalEntry>> {
    let start = monday_of(monday)?;
    let since = planner::history_start(start)
        .ok_or_else(|| AppError::bad_request("Date is out of the supported range"))?;
    if planner::week_end(start).is_none() {
        return Err(AppError::bad_request("Date is out of the supported range"));
    }
    let recent = recent_meal_ids(conn, user_id, since)?;
    let meals = meal_candidates(conn, user_id)?;
    Ok(planner::generate_proposal(&meals, &recent, start, rng))
}

// ============================================================================
// SHOPPING LIST INPUTS
// ============================================================================

/// In-home days with a meal between `start` and `end`, inclusive
pub fn planned_days(conn: &Connection, user_id: Uuid, start: NaiveDate, end: NaiveDate) -> DbResult<Vec<PlannedDay>> {
    let mut stmt = conn.prepare(
        "SELECT meal_id, batch_id FROM week_meals
         WHERE user_id = ?1 AND meal_date >= ?2 AND meal_date <= ?3
           AND is_out_of_home = 0 AND meal_id IS NOT NULL
         ORDER BY meal_date",
    )?;
    let days = stmt
        .query_map(params![user_id, start, end], |row| {
            Ok(PlannedDay { meal_id: row.get(0)?, batch_id: row.get(1)? })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(days)
}

/// Recipe rows of every meal the user owns
pub fn recipe_lines(conn: &Connection, user_id: Uuid) -> DbResult<Vec<RecipeLine>> {
    let mut stmt = conn.prepare(
        "SELECT r.id_meal, i.id, i.name, i.unit, i.category, r.base_amount
         FROM meal_ingredients r
         JOIN ingredients i ON i.id = r.id_ingredient
         JOIN meals m ON m.id = r.id_meal
         WHERE m.user_id = ?1",
    )?;
    let lines = stmt
        .query_map([user_id], |row| {
            Ok(RecipeLine {
                meal_id: row.get(0)?,
                ingredient_id: row.get(1)?,
                name: row.get(2)?,
                unit: row.get(3)?,
                category: row.get(4)?,
                base_amount: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}

/// Shopping list from `start` over the user's configured day range
pub fn shopping_list(conn: &Connection, user_id: Uuid, start: NaiveDate) -> AppResult<ShoppingList> {
    let settings = get_or_create_settings(conn, user_id)?;
    let end = shift_days(start, i64::from(settings.shopping_list_days_range) - 1)?;

    let days = planned_days(conn, user_id, start, end)?;
    let recipes = recipe_lines(conn, user_id)?;
    let items = shopping::build_shopping_list(
        &days,
        &recipes,
        settings.default_servings,
        settings.scale_by_two_days,
    );

    Ok(ShoppingList { start_date: start, end_date: end, items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::meals::{
        add_recipe_item, create_dict, create_ingredient, create_meal, DictKind, NewDictEntry, NewIngredient,
        NewMeal, NewRecipeItem,
    };
    use crate::db::settings::{update_settings, MealSettingsUpdate};
    use crate::db::test_support;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn meal(conn: &Connection, user: Uuid, name: &str, weekend: bool) -> Uuid {
        let protein = create_dict(conn, DictKind::Protein, &NewDictEntry { name: format!("{} p", name), category: "c".into() })
            .unwrap();
        let base = create_dict(conn, DictKind::Base, &NewDictEntry { name: format!("{} b", name), category: "c".into() })
            .unwrap();
        create_meal(
            conn,
            user,
            &NewMeal {
                id_protein_type: protein.id,
                id_base_type: base.id,
                name: name.into(),
                description: None,
                is_weekend_dish: weekend,
            },
        )
        .unwrap()
        .id
    }

    fn entry(day: NaiveDate, meal_id: Option<Uuid>, two_days: bool) -> NewWeekMeal {
        NewWeekMeal {
            meal_date: day,
            meal_id,
            is_out_of_home: false,
            note: Some("note".into()),
            is_two_days: two_days,
        }
    }

    #[test]
    fn test_monday_of() {
        assert_eq!(monday_of(date(2025, 3, 6)).unwrap(), date(2025, 3, 3));
        assert_eq!(monday_of(date(2025, 3, 3)).unwrap(), date(2025, 3, 3));
        assert_eq!(monday_of(date(2025, 3, 9)).unwrap(), date(2025, 3, 3));
    }

    #[test]
    fn test_calendar_edges_are_rejected() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "edges");
        let stew = meal(&conn, user, "Stew", false);

        let err = add_meal_to_plan(&conn, user, &entry(NaiveDate::MAX, Some(stew), true)).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(week_plan(&conn, user, NaiveDate::MAX).unwrap().day_entries.is_empty(), "Rolled back");

        if NaiveDate::MIN.weekday() != chrono::Weekday::Mon {
            assert_eq!(monday_of(NaiveDate::MIN).unwrap_err().status_code(), 400);
            assert_eq!(week_plan(&conn, user, NaiveDate::MIN).unwrap_err().status_code(), 400);
        }

        let list = shopping_list(&conn, user, NaiveDate::MAX);
        assert_eq!(list.unwrap_err().status_code(), 400);
    }

    #[test]
    fn test_two_day_entry_shares_batch() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "planner");
        let stew = meal(&conn, user, "Stew", false);

        let monday = add_meal_to_plan(&conn, user, &entry(date(2025, 3, 4), Some(stew), true)).unwrap();
        assert_eq!(monday, date(2025, 3, 3));

        let plan = week_plan(&conn, user, monday).unwrap();
        assert_eq!(plan.day_entries.len(), 2);
        let (first, second) = (&plan.day_entries[0], &plan.day_entries[1]);
        assert!(first.batch_id.is_some());
        assert_eq!(first.batch_id, second.batch_id);
        assert_eq!(first.note.as_deref(), Some("note"));
        assert_eq!(second.note, None, "Note only on the first day");

        assert_eq!(remove_day(&conn, user, date(2025, 3, 5)).unwrap(), 2, "Whole batch removed");
        assert!(week_plan(&conn, user, monday).unwrap().day_entries.is_empty());
    }

    #[test]
    fn test_two_day_entry_across_weeks() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "sunday");
        let stew = meal(&conn, user, "Stew", false);

        add_meal_to_plan(&conn, user, &entry(date(2025, 3, 9), Some(stew), true)).unwrap();
        assert_eq!(week_plan(&conn, user, date(2025, 3, 3)).unwrap().day_entries.len(), 1);
        assert_eq!(week_plan(&conn, user, date(2025, 3, 10)).unwrap().day_entries.len(), 1);
    }

    #[test]
    fn test_adding_replaces_existing_day() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "replace");
        let a = meal(&conn, user, "A", false);
        let b = meal(&conn, user, "B", false);
        let day = date(2025, 3, 4);

        add_meal_to_plan(&conn, user, &entry(day, Some(a), false)).unwrap();
        add_meal_to_plan(&conn, user, &entry(day, Some(b), false)).unwrap();
        let plan = week_plan(&conn, user, day).unwrap();
        assert_eq!(plan.day_entries.len(), 1);
        assert_eq!(plan.day_entries[0].meal_id, Some(b));

        set_out_of_home(&conn, user, day).unwrap();
        let plan = week_plan(&conn, user, day).unwrap();
        assert!(plan.day_entries[0].is_out_of_home);
        assert_eq!(plan.day_entries[0].meal_id, None);
    }

    #[test]
    fn test_foreign_meal_rejected() {
        let conn = test_support::conn();
        let owner = test_support::user(&conn, "owner");
        let other = test_support::user(&conn, "other");
        let soup = meal(&conn, owner, "Soup", false);

        let err = add_meal_to_plan(&conn, other, &entry(date(2025, 3, 4), Some(soup), false)).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_clear_week_and_accept_proposal() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "weekly");
        let a = meal(&conn, user, "A", false);
        let monday = date(2025, 3, 3);

        let err = clear_week(&conn, user, monday).unwrap_err();
        assert_eq!(err.status_code(), 404);

        let err = accept_proposal(&conn, user, &[]).unwrap_err();
        assert_eq!(err.status_code(), 400);

        let saved = accept_proposal(
            &conn,
            user,
            &[entry(monday, Some(a), false), entry(date(2025, 3, 5), Some(a), true)],
        )
        .unwrap();
        assert_eq!(saved, 2);
        assert_eq!(week_plan(&conn, user, monday).unwrap().day_entries.len(), 3);

        assert_eq!(clear_week(&conn, user, monday).unwrap(), 3);
        assert!(week_plan(&conn, user, monday).unwrap().day_entries.is_empty());
    }

    #[test]
    fn test_month_view() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "monthly");
        let stew = meal(&conn, user, "Stew", false);

        add_meal_to_plan(&conn, user, &entry(date(2025, 2, 28), Some(stew), true)).unwrap();
        set_out_of_home(&conn, user, date(2025, 3, 10)).unwrap();

        let march = month_view(&conn, user, 2025, 3).unwrap();
        assert_eq!(march.days.len(), 2);
        let first = &march.days[0];
        assert_eq!(first.date, date(2025, 3, 1));
        assert_eq!(first.meal_name.as_deref(), Some("Stew"));
        assert_eq!(first.protein_type.as_deref(), Some("Stew p"));
        assert!(first.is_two_days);
        assert!(march.days[1].is_out_of_home);
        assert_eq!(march.days[1].meal_name, None);

        assert_eq!(month_view(&conn, user, 2025, 12).unwrap().days.len(), 0);
        assert_eq!(month_view(&conn, user, 2025, 13).unwrap_err().status_code(), 400);
    }

    #[test]
    fn test_deleted_meal_leaves_empty_day() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "deleter");
        let stew = meal(&conn, user, "Stew", false);
        add_meal_to_plan(&conn, user, &entry(date(2025, 3, 4), Some(stew), false)).unwrap();

        crate::db::meals::delete_meal(&conn, user, stew).unwrap();
        let plan = week_plan(&conn, user, date(2025, 3, 3)).unwrap();
        assert_eq!(plan.day_entries.len(), 1);
        assert_eq!(plan.day_entries[0].meal_id, None);
    }

    #[test]
    fn test_proposal_skips_recent_history() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "proposer");
        let eaten = meal(&conn, user, "Eaten", false);
        for i in 0..8 {
            meal(&conn, user, &format!("Fresh {}", i), false);
        }
        meal(&conn, user, "Weekend", true);
        add_meal_to_plan(&conn, user, &entry(date(2025, 2, 20), Some(eaten), false)).unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        let proposal = generate_week_proposal(&conn, user, date(2025, 3, 3), &mut rng).unwrap();
        assert!(!proposal.is_empty());
        assert!(proposal.iter().all(|e| e.meal_id != eaten));
    }

    #[test]
    fn test_shopping_list_uses_settings() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "shopper");
        let stew = meal(&conn, user, "Stew", false);
        let soup = meal(&conn, user, "Soup", false);
        let onion = create_ingredient(&conn, &NewIngredient { name: "Onion".into(), category: "Veg".into(), unit: "g".into() })
            .unwrap();
        add_recipe_item(&conn, user, stew, &NewRecipeItem { id_ingredient: onion.id, base_amount: 100.0, note: None })
            .unwrap();
        add_recipe_item(&conn, user, soup, &NewRecipeItem { id_ingredient: onion.id, base_amount: 10.0, note: None })
            .unwrap();

        add_meal_to_plan(&conn, user, &entry(date(2025, 3, 3), Some(stew), true)).unwrap();
        add_meal_to_plan(&conn, user, &entry(date(2025, 3, 12), Some(soup), false)).unwrap();

        let list = shopping_list(&conn, user, date(2025, 3, 3)).unwrap();
        assert_eq!(list.end_date, date(2025, 3, 9));
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].amount, 400.0, "Two days at two servings");

        update_settings(
            &conn,
            user,
            &MealSettingsUpdate {
                scale_by_two_days: Some(false),
                shopping_list_days_range: Some(14),
                default_servings: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        let list = shopping_list(&conn, user, date(2025, 3, 3)).unwrap();
        assert_eq!(list.end_date, date(2025, 3, 16));
        assert_eq!(list.items[0].amount, 110.0);
    }
}
