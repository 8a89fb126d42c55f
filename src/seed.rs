// 🌱 Starter Data - dictionaries, ingredients and a few meals for new users

use crate::db::meals::{
    self, DictKind, NewDictEntry, NewIngredient, NewMeal, NewRecipeItem,
};
use crate::error::AppResult;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

const PROTEINS: &[(&str, &str)] = &[
    ("Chicken", "Meat"),
    ("Pork", "Meat"),
    ("Beef", "Meat"),
    ("Salmon", "Fish"),
    ("Eggs", "Dairy & Eggs"),
    ("Lentils", "Legumes"),
];

const BASES: &[(&str, &str)] = &[
    ("Rice", "Grains"),
    ("Pasta", "Grains"),
    ("Potatoes", "Vegetables"),
    ("Groats", "Grains"),
    ("Bread", "Bakery"),
];

const INGREDIENTS: &[(&str, &str, &str)] = &[
    ("Chicken breast", "Meat", "g"),
    ("Minced pork", "Meat", "g"),
    ("Beef shoulder", "Meat", "g"),
    ("Salmon fillet", "Fish", "g"),
    ("Eggs", "Dairy & Eggs", "pcs"),
    ("Red lentils", "Legumes", "g"),
    ("Rice", "Grains", "g"),
    ("Spaghetti", "Grains", "g"),
    ("Potatoes", "Vegetables", "g"),
    ("Buckwheat groats", "Grains", "g"),
    ("Onion", "Vegetables", "pcs"),
    ("Garlic", "Vegetables", "pcs"),
    ("Canned tomatoes", "Preserves", "g"),
    ("Cream", "Dairy & Eggs", "ml"),
    ("Coconut milk", "Preserves", "ml"),
    ("Dough", "Bakery", "g"),
    ("Mozzarella", "Dairy & Eggs", "g"),
];

struct StarterMeal {
    name: &'static str,
    protein: &'static str,
    base: &'static str,
    weekend: bool,
    recipe: &'static [(&'static str, f64)],
}

const MEALS: &[StarterMeal] = &[
    StarterMeal {
        name: "Chicken curry with rice",
        protein: "Chicken",
        base: "Rice",
        weekend: false,
        recipe: &[("Chicken breast", 150.0), ("Rice", 80.0), ("Onion", 0.5), ("Coconut milk", 100.0)],
    },
    StarterMeal {
        name: "Spaghetti bolognese",
        protein: "Pork",
        base: "Pasta",
        weekend: false,
        recipe: &[("Minced pork", 125.0), ("Spaghetti", 100.0), ("Canned tomatoes", 200.0), ("Garlic", 1.0)],
    },
    StarterMeal {
        name: "Beef goulash with groats",
        protein: "Beef",
        base: "Groats",
        weekend: false,
        recipe: &[("Beef shoulder", 150.0), ("Buckwheat groats", 80.0), ("Onion", 1.0)],
    },
    StarterMeal {
        name: "Baked salmon with potatoes",
        protein: "Salmon",
        base: "Potatoes",
        weekend: false,
        recipe: &[("Salmon fillet", 150.0), ("Potatoes", 250.0), ("Cream", 50.0)],
    },
    StarterMeal {
        name: "Lentil dal with rice",
        protein: "Lentils",
        base: "Rice",
        weekend: false,
        recipe: &[("Red lentils", 80.0), ("Rice", 60.0), ("Canned tomatoes", 150.0), ("Garlic", 1.0)],
    },
    StarterMeal {
        name: "Homemade pizza",
        protein: "Eggs",
        base: "Bread",
        weekend: true,
        recipe: &[("Dough", 200.0), ("Mozzarella", 100.0), ("Canned tomatoes", 80.0)],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedOutcome {
    Created,
    Skipped,
}

impl SeedOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            SeedOutcome::Created => "Default dishes and ingredients have been successfully added to your account!",
            SeedOutcome::Skipped => "Your account already has a base of dishes. No changes were made.",
        }
    }
}

fn dict_id(conn: &Connection, kind: DictKind, name: &str, category: &str) -> AppResult<Uuid> {
    if let Some(entry) = meals::find_dict_by_name(conn, kind, name)? {
        return Ok(entry.id);
    }
    let entry = meals::create_dict(
        conn,
        kind,
        &NewDictEntry { name: name.to_string(), category: category.to_string() },
    )?;
    Ok(entry.id)
}

fn ingredient_id(conn: &Connection, name: &str, category: &str, unit: &str) -> AppResult<Uuid> {
    if let Some(ingredient) = meals::find_ingredient_by_name(conn, name)? {
        return Ok(ingredient.id);
    }
    let ingredient = meals::create_ingredient(
        conn,
        &NewIngredient { name: name.to_string(), category: category.to_string(), unit: unit.to_string() },
    )?;
    Ok(ingredient.id)
}

fn lookup<'a>(table: &'a [(&'static str, &'static str)], name: &str) -> &'a str {
    table
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, category)| *category)
        .unwrap_or("Other")
}

/// Seed starter data for a user who has no meals yet.
///
/// Shared dictionary rows are reused by name, so seeding a second user does
/// not collide with the first user's dictionaries.
pub fn setup_defaults(conn: &Connection, user_id: Uuid) -> AppResult<SeedOutcome> {
    if meals::count_meals(conn, user_id)? > 0 {
        return Ok(SeedOutcome::Skipped);
    }

    let tx = conn.unchecked_transaction()?;

    for meal in MEALS {
        let protein = dict_id(&tx, DictKind::Protein, meal.protein, lookup(PROTEINS, meal.protein))?;
        let base = dict_id(&tx, DictKind::Base, meal.base, lookup(BASES, meal.base))?;

        let created = meals::create_meal(
            &tx,
            user_id,
            &NewMeal {
                id_protein_type: protein,
                id_base_type: base,
                name: meal.name.to_string(),
                description: None,
                is_weekend_dish: meal.weekend,
            },
        )?;

        for (ingredient, amount) in meal.recipe {
            let (name, category, unit) = INGREDIENTS
                .iter()
                .find(|(n, _, _)| n == ingredient)
                .copied()
                .unwrap_or((*ingredient, "Other", "g"));
            let id_ingredient = ingredient_id(&tx, name, category, unit)?;
            meals::add_recipe_item(
                &tx,
                user_id,
                created.id,
                &NewRecipeItem { id_ingredient, base_amount: *amount, note: None },
            )?;
        }
    }

    for (name, category) in PROTEINS {
        dict_id(&tx, DictKind::Protein, name, category)?;
    }
    for (name, category) in BASES {
        dict_id(&tx, DictKind::Base, name, category)?;
    }
    for (name, category, unit) in INGREDIENTS {
        ingredient_id(&tx, name, category, unit)?;
    }

    tx.commit()?;
    tracing::info!(user_id = %user_id, meals = MEALS.len(), "starter data created");
    Ok(SeedOutcome::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    #[test]
    fn test_seed_creates_then_skips() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "newbie");

        assert_eq!(setup_defaults(&conn, user).unwrap(), SeedOutcome::Created);
        assert_eq!(meals::count_meals(&conn, user).unwrap(), MEALS.len() as i64);
        assert_eq!(meals::list_ingredients(&conn).unwrap().len(), INGREDIENTS.len());

        let curry = meals::search_meals(&conn, user, "curry").unwrap();
        assert_eq!(meals::meal_recipe(&conn, user, curry[0].id).unwrap().len(), 4);

        assert_eq!(setup_defaults(&conn, user).unwrap(), SeedOutcome::Skipped);
        assert_eq!(meals::count_meals(&conn, user).unwrap(), MEALS.len() as i64);
    }

    #[test]
    fn test_second_user_reuses_dictionaries() {
        let conn = test_support::conn();
        let first = test_support::user(&conn, "first");
        let second = test_support::user(&conn, "second");

        setup_defaults(&conn, first).unwrap();
        assert_eq!(setup_defaults(&conn, second).unwrap(), SeedOutcome::Created);
        assert_eq!(meals::list_dict(&conn, DictKind::Protein).unwrap().len(), PROTEINS.len());
        assert_eq!(meals::count_meals(&conn, second).unwrap(), MEALS.len() as i64);
    }

    #[test]
    fn test_starter_recipes_reference_known_ingredients() {
        for meal in MEALS {
            for (name, _) in meal.recipe {
                assert!(INGREDIENTS.iter().any(|(n, _, _)| n == name), "{} missing", name);
            }
            assert!(PROTEINS.iter().any(|(n, _)| *n == meal.protein));
            assert!(BASES.iter().any(|(n, _)| *n == meal.base));
        }
    }
}
