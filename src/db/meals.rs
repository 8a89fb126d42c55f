// Meals, the shared protein/base/ingredient dictionaries, and per-meal recipes

use super::{is_unique_violation, now, Changes, DbResult};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const MEAL_NOT_FOUND: &str = "Meal not found";
const INGREDIENT_NOT_FOUND: &str = "Ingredient not found";
const RECIPE_NOT_FOUND: &str = "Recipe item not found";

/// Case-insensitive substring match used by the search endpoints
fn name_contains(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(&needle.trim().to_lowercase())
}

// ============================================================================
// PROTEIN / BASE DICTIONARIES
// ============================================================================

/// The two meal classification dictionaries share one shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictKind {
    Protein,
    Base,
}

impl DictKind {
    fn table(&self) -> &'static str {
        match self {
            DictKind::Protein => "protein_types",
            DictKind::Base => "base_types",
        }
    }

    fn meal_column(&self) -> &'static str {
        match self {
            DictKind::Protein => "id_protein_type",
            DictKind::Base => "id_base_type",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DictKind::Protein => "Protein type",
            DictKind::Base => "Base type",
        }
    }

    fn in_use_message(&self) -> &'static str {
        match self {
            DictKind::Protein => "Cannot delete: Protein is used in existing meals",
            DictKind::Base => "Cannot delete: Base type is used in existing meals",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DictEntry {
    pub id: Uuid,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewDictEntry {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct DictEntryUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
}

fn dict_from_row(row: &Row) -> DbResult<DictEntry> {
    Ok(DictEntry {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
    })
}

fn duplicate_dict(kind: DictKind) -> impl FnOnce(rusqlite::Error) -> AppError {
    move |err| {
        if is_unique_violation(&err) {
            AppError::bad_request(format!("{} with this name already exists", kind.label()))
        } else {
            err.into()
        }
    }
}

/// Ordered by category, then name
pub fn list_dict(conn: &Connection, kind: DictKind) -> AppResult<Vec<DictEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, category FROM {} ORDER BY category, name",
        kind.table()
    ))?;
    let entries = stmt
        .query_map([], dict_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn get_dict(conn: &Connection, kind: DictKind, id: Uuid) -> AppResult<DictEntry> {
    conn.query_row(
        &format!("SELECT id, name, category FROM {} WHERE id = ?1", kind.table()),
        [id],
        dict_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found(format!("{} not found", kind.label())))
}

pub fn find_dict_by_name(conn: &Connection, kind: DictKind, name: &str) -> DbResult<Option<DictEntry>> {
    conn.query_row(
        &format!("SELECT id, name, category FROM {} WHERE name = ?1", kind.table()),
        [name],
        dict_from_row,
    )
    .optional()
}

pub fn create_dict(conn: &Connection, kind: DictKind, new: &NewDictEntry) -> AppResult<DictEntry> {
    let entry = DictEntry {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        category: new.category.trim().to_string(),
    };
    conn.execute(
        &format!("INSERT INTO {} (id, name, category) VALUES (?1, ?2, ?3)", kind.table()),
        params![entry.id, entry.name, entry.category],
    )
    .map_err(duplicate_dict(kind))?;
    Ok(entry)
}

pub fn update_dict(conn: &Connection, kind: DictKind, id: Uuid, update: &DictEntryUpdate) -> AppResult<DictEntry> {
    get_dict(conn, kind, id)?;

    let mut changes = Changes::new();
    changes
        .set("name", update.name.as_ref().map(|s| s.trim().to_string()))
        .set("category", update.category.as_ref().map(|s| s.trim().to_string()));
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }
    changes.apply(conn, kind.table(), id, false).map_err(duplicate_dict(kind))?;

    get_dict(conn, kind, id)
}

/// Blocked while any meal (of any user) references the entry; missing entries are a no-op
pub fn delete_dict(conn: &Connection, kind: DictKind, id: Uuid) -> AppResult<()> {
    let used: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM meals WHERE {} = ?1", kind.meal_column()),
        [id],
        |row| row.get(0),
    )?;
    if used > 0 {
        return Err(AppError::bad_request(kind.in_use_message()));
    }

    conn.execute(&format!("DELETE FROM {} WHERE id = ?1", kind.table()), [id])?;
    Ok(())
}

// ============================================================================
// MEALS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub id_protein_type: Uuid,
    pub id_base_type: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_weekend_dish: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub protein_type: DictEntry,
    pub base_type: DictEntry,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MealSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMeal {
    pub id_protein_type: Uuid,
    pub id_base_type: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_weekend_dish: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MealUpdate {
    pub id_protein_type: Option<Uuid>,
    pub id_base_type: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_weekend_dish: Option<bool>,
}

const MEAL_SELECT: &str = "SELECT m.id, m.user_id, m.id_protein_type, m.id_base_type, m.name, m.description,
        m.is_weekend_dish, m.created_at, m.updated_at,
        p.id, p.name, p.category, b.id, b.name, b.category
     FROM meals m
     JOIN protein_types p ON p.id = m.id_protein_type
     JOIN base_types b ON b.id = m.id_base_type";

fn meal_from_row(row: &Row) -> DbResult<Meal> {
    Ok(Meal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        id_protein_type: row.get(2)?,
        id_base_type: row.get(3)?,
        name: row.get(4)?,
        description: row.get(5)?,
        is_weekend_dish: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        protein_type: DictEntry {
            id: row.get(9)?,
            name: row.get(10)?,
            category: row.get(11)?,
        },
        base_type: DictEntry {
            id: row.get(12)?,
            name: row.get(13)?,
            category: row.get(14)?,
        },
    })
}

/// Dictionary references must exist; a bad id is a client error, not a 404
fn check_dict_ref(conn: &Connection, kind: DictKind, id: Uuid) -> AppResult<()> {
    match get_dict(conn, kind, id) {
        Ok(_) => Ok(()),
        Err(AppError::NotFound(msg)) => Err(AppError::BadRequest(msg)),
        Err(e) => Err(e),
    }
}

pub fn create_meal(conn: &Connection, user_id: Uuid, new: &NewMeal) -> AppResult<Meal> {
    check_dict_ref(conn, DictKind::Protein, new.id_protein_type)?;
    check_dict_ref(conn, DictKind::Base, new.id_base_type)?;

    let id = Uuid::new_v4();
    let ts = now();
    conn.execute(
        "INSERT INTO meals (id, user_id, id_protein_type, id_base_type, name, description,
                            is_weekend_dish, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            id,
            user_id,
            new.id_protein_type,
            new.id_base_type,
            new.name.trim(),
            new.description,
            new.is_weekend_dish,
            ts
        ],
    )?;

    get_owned_meal(conn, user_id, id)
}

pub fn get_owned_meal(conn: &Connection, user_id: Uuid, meal_id: Uuid) -> AppResult<Meal> {
    conn.query_row(
        &format!("{} WHERE m.id = ?1 AND m.user_id = ?2", MEAL_SELECT),
        params![meal_id, user_id],
        meal_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found(MEAL_NOT_FOUND))
}

/// The user's meals ordered by name, with nested protein and base
pub fn list_meals(conn: &Connection, user_id: Uuid) -> AppResult<Vec<Meal>> {
    let mut stmt = conn.prepare(&format!("{} WHERE m.user_id = ?1 ORDER BY m.name", MEAL_SELECT))?;
    let meals = stmt
        .query_map([user_id], meal_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(meals)
}

pub fn list_meal_summaries(conn: &Connection, user_id: Uuid) -> AppResult<Vec<MealSummary>> {
    let mut stmt = conn.prepare("SELECT id, name FROM meals WHERE user_id = ?1 ORDER BY name")?;
    let meals = stmt
        .query_map([user_id], |row| Ok(MealSummary { id: row.get(0)?, name: row.get(1)? }))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(meals)
}

pub fn search_meals(conn: &Connection, user_id: Uuid, name: &str) -> AppResult<Vec<Meal>> {
    Ok(list_meals(conn, user_id)?
        .into_iter()
        .filter(|meal| name_contains(&meal.name, name))
        .collect())
}

pub fn update_meal(conn: &Connection, user_id: Uuid, meal_id: Uuid, update: &MealUpdate) -> AppResult<Meal> {
    get_owned_meal(conn, user_id, meal_id)?;
    if let Some(id) = update.id_protein_type {
        check_dict_ref(conn, DictKind::Protein, id)?;
    }
    if let Some(id) = update.id_base_type {
        check_dict_ref(conn, DictKind::Base, id)?;
    }

    let mut changes = Changes::new();
    changes
        .set("id_protein_type", update.id_protein_type)
        .set("id_base_type", update.id_base_type)
        .set("name", update.name.as_ref().map(|s| s.trim().to_string()))
        .set("description", update.description.clone())
        .set("is_weekend_dish", update.is_weekend_dish);
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }
    changes.apply(conn, "meals", meal_id, true)?;

    get_owned_meal(conn, user_id, meal_id)
}

/// Recipe rows cascade; planned days keep their date with the meal cleared
pub fn delete_meal(conn: &Connection, user_id: Uuid, meal_id: Uuid) -> AppResult<()> {
    get_owned_meal(conn, user_id, meal_id)?;
    conn.execute("DELETE FROM meals WHERE id = ?1", [meal_id])?;
    Ok(())
}

pub fn count_meals(conn: &Connection, user_id: Uuid) -> DbResult<i64> {
    conn.query_row("SELECT COUNT(*) FROM meals WHERE user_id = ?1", [user_id], |row| row.get(0))
}

// ============================================================================
// INGREDIENT DICTIONARY
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub unit: String,
}

fn default_unit() -> String {
    "g".to_string()
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewIngredient {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[serde(default = "default_unit")]
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct IngredientUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
}

fn ingredient_from_row(row: &Row) -> DbResult<Ingredient> {
    Ok(Ingredient {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        unit: row.get(3)?,
    })
}

fn duplicate_ingredient(err: rusqlite::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::bad_request("Ingredient with this name already exists")
    } else {
        err.into()
    }
}

pub fn create_ingredient(conn: &Connection, new: &NewIngredient) -> AppResult<Ingredient> {
    let ingredient = Ingredient {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        category: new.category.trim().to_string(),
        unit: new.unit.trim().to_string(),
    };
    conn.execute(
        "INSERT INTO ingredients (id, name, category, unit) VALUES (?1, ?2, ?3, ?4)",
        params![ingredient.id, ingredient.name, ingredient.category, ingredient.unit],
    )
    .map_err(duplicate_ingredient)?;
    Ok(ingredient)
}

/// Ordered by category, then name
pub fn list_ingredients(conn: &Connection) -> AppResult<Vec<Ingredient>> {
    let mut stmt = conn.prepare("SELECT id, name, category, unit FROM ingredients ORDER BY category, name")?;
    let ingredients = stmt
        .query_map([], ingredient_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ingredients)
}

pub fn search_ingredients(conn: &Connection, name: &str) -> AppResult<Vec<Ingredient>> {
    Ok(list_ingredients(conn)?
        .into_iter()
        .filter(|ingredient| name_contains(&ingredient.name, name))
        .collect())
}

pub fn get_ingredient(conn: &Connection, id: Uuid) -> AppResult<Ingredient> {
    conn.query_row(
        "SELECT id, name, category, unit FROM ingredients WHERE id = ?1",
        [id],
        ingredient_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found(INGREDIENT_NOT_FOUND))
}

pub fn find_ingredient_by_name(conn: &Connection, name: &str) -> DbResult<Option<Ingredient>> {
    conn.query_row(
        "SELECT id, name, category, unit FROM ingredients WHERE name = ?1",
        [name],
        ingredient_from_row,
    )
    .optional()
}

pub fn update_ingredient(conn: &Connection, id: Uuid, update: &IngredientUpdate) -> AppResult<Ingredient> {
    get_ingredient(conn, id)?;

    let mut changes = Changes::new();
    changes
        .set("name", update.name.as_ref().map(|s| s.trim().to_string()))
        .set("category", update.category.as_ref().map(|s| s.trim().to_string()))
        .set("unit", update.unit.as_ref().map(|s| s.trim().to_string()));
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }
    changes.apply(conn, "ingredients", id, false).map_err(duplicate_ingredient)?;

    get_ingredient(conn, id)
}

pub fn delete_ingredient(conn: &Connection, id: Uuid) -> AppResult<()> {
    get_ingredient(conn, id)?;

    let used: i64 = conn.query_row(
        "SELECT COUNT(*) FROM meal_ingredients WHERE id_ingredient = ?1",
        [id],
        |row| row.get(0),
    )?;
    if used > 0 {
        return Err(AppError::bad_request("Cannot delete: Ingredient is used in existing recipes"));
    }

    conn.execute("DELETE FROM ingredients WHERE id = ?1", [id])?;
    Ok(())
}

// ============================================================================
// RECIPES
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeItem {
    pub id: Uuid,
    pub id_meal: Uuid,
    pub id_ingredient: Uuid,
    pub base_amount: f64,
    pub note: Option<String>,
    pub ingredient: Ingredient,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewRecipeItem {
    pub id_ingredient: Uuid,
    #[validate(range(min = 0.0))]
    pub base_amount: f64,
    #[validate(length(max = 200))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RecipeItemUpdate {
    pub id_ingredient: Option<Uuid>,
    #[validate(range(min = 0.0))]
    pub base_amount: Option<f64>,
    #[validate(length(max = 200))]
    pub note: Option<String>,
}

const RECIPE_SELECT: &str = "SELECT r.id, r.id_meal, r.id_ingredient, r.base_amount, r.note,
        i.id, i.name, i.category, i.unit
     FROM meal_ingredients r
     JOIN ingredients i ON i.id = r.id_ingredient";

fn recipe_from_row(row: &Row) -> DbResult<RecipeItem> {
    Ok(RecipeItem {
        id: row.get(0)?,
        id_meal: row.get(1)?,
        id_ingredient: row.get(2)?,
        base_amount: row.get(3)?,
        note: row.get(4)?,
        ingredient: Ingredient {
            id: row.get(5)?,
            name: row.get(6)?,
            category: row.get(7)?,
            unit: row.get(8)?,
        },
    })
}

fn get_owned_recipe_item(conn: &Connection, user_id: Uuid, recipe_id: Uuid) -> AppResult<RecipeItem> {
    conn.query_row(
        &format!(
            "{} JOIN meals m ON m.id = r.id_meal WHERE r.id = ?1 AND m.user_id = ?2",
            RECIPE_SELECT
        ),
        params![recipe_id, user_id],
        recipe_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found(RECIPE_NOT_FOUND))
}

pub fn add_recipe_item(conn: &Connection, user_id: Uuid, meal_id: Uuid, new: &NewRecipeItem) -> AppResult<RecipeItem> {
    get_owned_meal(conn, user_id, meal_id)?;
    get_ingredient(conn, new.id_ingredient)?;

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO meal_ingredients (id, id_meal, id_ingredient, base_amount, note)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, meal_id, new.id_ingredient, new.base_amount, new.note],
    )?;

    get_owned_recipe_item(conn, user_id, id)
}

pub fn meal_recipe(conn: &Connection, user_id: Uuid, meal_id: Uuid) -> AppResult<Vec<RecipeItem>> {
    get_owned_meal(conn, user_id, meal_id)?;

    let mut stmt = conn.prepare(&format!(
        "{} WHERE r.id_meal = ?1 ORDER BY i.category, i.name",
        RECIPE_SELECT
    ))?;
    let items = stmt
        .query_map([meal_id], recipe_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn update_recipe_item(
    conn: &Connection,
    user_id: Uuid,
    recipe_id: Uuid,
    update: &RecipeItemUpdate,
) -> AppResult<RecipeItem> {
    get_owned_recipe_item(conn, user_id, recipe_id)?;
    if let Some(id) = update.id_ingredient {
        get_ingredient(conn, id)?;
    }

    let mut changes = Changes::new();
    changes
        .set("id_ingredient", update.id_ingredient)
        .set("base_amount", update.base_amount)
        .set("note", update.note.clone());
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }
    changes.apply(conn, "meal_ingredients", recipe_id, false)?;

    get_owned_recipe_item(conn, user_id, recipe_id)
}

/// Removes the row from the recipe only, the dictionary entry stays
pub fn remove_recipe_item(conn: &Connection, user_id: Uuid, recipe_id: Uuid) -> AppResult<()> {
    get_owned_recipe_item(conn, user_id, recipe_id)?;
    conn.execute("DELETE FROM meal_ingredients WHERE id = ?1", [recipe_id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    fn dict(conn: &Connection, kind: DictKind, name: &str, category: &str) -> DictEntry {
        create_dict(conn, kind, &NewDictEntry { name: name.into(), category: category.into() }).unwrap()
    }

    fn meal(conn: &Connection, user: Uuid, name: &str) -> Meal {
        let protein = find_dict_by_name(conn, DictKind::Protein, "Chicken")
            .unwrap()
            .unwrap_or_else(|| dict(conn, DictKind::Protein, "Chicken", "Meat"));
        let base = find_dict_by_name(conn, DictKind::Base, "Rice")
            .unwrap()
            .unwrap_or_else(|| dict(conn, DictKind::Base, "Rice", "Grains"));
        create_meal(
            conn,
            user,
            &NewMeal {
                id_protein_type: protein.id,
                id_base_type: base.id,
                name: name.into(),
                description: None,
                is_weekend_dish: false,
            },
        )
        .unwrap()
    }

    fn ingredient(conn: &Connection, name: &str) -> Ingredient {
        create_ingredient(conn, &NewIngredient { name: name.into(), category: "Veg".into(), unit: "g".into() }).unwrap()
    }

    #[test]
    fn test_dictionary_crud_and_guard() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "cook");
        let fish = dict(&conn, DictKind::Protein, "Salmon", "Fish");
        dict(&conn, DictKind::Protein, "Beef", "Meat");

        let names: Vec<String> = list_dict(&conn, DictKind::Protein).unwrap().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["Salmon", "Beef"], "Ordered by category");

        let err = create_dict(&conn, DictKind::Protein, &NewDictEntry { name: "Salmon".into(), category: "x".into() })
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let renamed = update_dict(
            &conn,
            DictKind::Protein,
            fish.id,
            &DictEntryUpdate { name: Some("Trout".into()), category: None },
        )
        .unwrap();
        assert_eq!(renamed.name, "Trout");
        assert_eq!(renamed.category, "Fish");

        let m = meal(&conn, user, "Curry");
        let err = delete_dict(&conn, DictKind::Protein, m.id_protein_type).unwrap_err();
        assert_eq!(err.to_string(), "Cannot delete: Protein is used in existing meals");
        let err = delete_dict(&conn, DictKind::Base, m.id_base_type).unwrap_err();
        assert_eq!(err.to_string(), "Cannot delete: Base type is used in existing meals");

        delete_dict(&conn, DictKind::Protein, fish.id).unwrap();
        delete_dict(&conn, DictKind::Protein, Uuid::new_v4()).unwrap();
    }

    #[test]
    fn test_meal_requires_existing_dictionaries() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "cook");
        let err = create_meal(
            &conn,
            user,
            &NewMeal {
                id_protein_type: Uuid::new_v4(),
                id_base_type: Uuid::new_v4(),
                name: "Ghost".into(),
                description: None,
                is_weekend_dish: false,
            },
        )
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Protein type not found");

        conn.execute_batch("DROP TABLE base_types").unwrap();
        let err = check_dict_ref(&conn, DictKind::Base, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.status_code(), 500, "Storage failures are not client errors");
    }

    #[test]
    fn test_meal_listing_and_search() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "cook");
        let other = test_support::user(&conn, "other");
        meal(&conn, user, "Pasta Carbonara");
        meal(&conn, user, "Chicken Curry");
        meal(&conn, other, "Secret Pasta");

        let meals = list_meals(&conn, user).unwrap();
        assert_eq!(meals.len(), 2);
        assert_eq!(meals[0].name, "Chicken Curry");
        assert_eq!(meals[0].protein_type.name, "Chicken");

        let found = search_meals(&conn, user, "pasta").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Pasta Carbonara");

        let simple = list_meal_summaries(&conn, user).unwrap();
        assert_eq!(simple[1].name, "Pasta Carbonara");
        assert_eq!(count_meals(&conn, other).unwrap(), 1);
    }

    #[test]
    fn test_meal_ownership() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "cook");
        let other = test_support::user(&conn, "other");
        let m = meal(&conn, user, "Soup");

        assert_eq!(get_owned_meal(&conn, other, m.id).unwrap_err().status_code(), 404);
        assert_eq!(delete_meal(&conn, other, m.id).unwrap_err().status_code(), 404);

        let updated = update_meal(
            &conn,
            user,
            m.id,
            &MealUpdate { is_weekend_dish: Some(true), ..Default::default() },
        )
        .unwrap();
        assert!(updated.is_weekend_dish);
    }

    #[test]
    fn test_recipe_lifecycle() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "cook");
        let other = test_support::user(&conn, "other");
        let m = meal(&conn, user, "Risotto");
        let onion = ingredient(&conn, "Onion");

        let item = add_recipe_item(
            &conn,
            user,
            m.id,
            &NewRecipeItem { id_ingredient: onion.id, base_amount: 150.0, note: None },
        )
        .unwrap();
        assert_eq!(item.ingredient.name, "Onion");

        let err = add_recipe_item(
            &conn,
            other,
            m.id,
            &NewRecipeItem { id_ingredient: onion.id, base_amount: 1.0, note: None },
        )
        .unwrap_err();
        assert_eq!(err.status_code(), 404);

        let updated = update_recipe_item(
            &conn,
            user,
            item.id,
            &RecipeItemUpdate { base_amount: Some(200.0), ..Default::default() },
        )
        .unwrap();
        assert_eq!(updated.base_amount, 200.0);

        let err = delete_ingredient(&conn, onion.id).unwrap_err();
        assert_eq!(err.status_code(), 400, "Ingredient used by a recipe");

        remove_recipe_item(&conn, user, item.id).unwrap();
        assert!(meal_recipe(&conn, user, m.id).unwrap().is_empty());
        delete_ingredient(&conn, onion.id).unwrap();
    }

    #[test]
    fn test_delete_meal_cascades_recipe() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "cook");
        let m = meal(&conn, user, "Stew");
        let carrot = ingredient(&conn, "Carrot");
        add_recipe_item(&conn, user, m.id, &NewRecipeItem { id_ingredient: carrot.id, base_amount: 1.0, note: None })
            .unwrap();

        delete_meal(&conn, user, m.id).unwrap();
        let rows: i64 = conn.query_row("SELECT COUNT(*) FROM meal_ingredients", [], |r| r.get(0)).unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn test_ingredient_dictionary() {
        let conn = test_support::conn();
        let garlic = ingredient(&conn, "Garlic");
        create_ingredient(&conn, &NewIngredient { name: "Milk".into(), category: "Dairy".into(), unit: "ml".into() })
            .unwrap();

        let all = list_ingredients(&conn).unwrap();
        assert_eq!(all[0].name, "Milk", "Dairy sorts before Veg");
        assert_eq!(search_ingredients(&conn, "GAR").unwrap(), vec![garlic.clone()]);

        let err = create_ingredient(&conn, &NewIngredient { name: "Garlic".into(), category: "Veg".into(), unit: "g".into() })
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let updated = update_ingredient(&conn, garlic.id, &IngredientUpdate { unit: Some("pcs".into()), ..Default::default() })
            .unwrap();
        assert_eq!(updated.unit, "pcs");
    }
}
