// 🍽️ Weekly Meal Proposal - greedy random pick with variety constraints
//
// Walks the seven days of a week and picks one meal per day (or per two days).
// A pick avoids meals eaten recently, meals already proposed this week, and
// the previous pick's protein and base. Saturday only takes weekend dishes,
// every other day only non-weekend dishes.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Meals planned within this many days before the week are not proposed again
pub const HISTORY_DAYS: i64 = 28;

/// Chance that a weekday pick is cooked for two days
pub const TWO_DAY_PROBABILITY: f64 = 0.6;

const DAYS_IN_WEEK: i64 = 7;

// ============================================================================
// TYPES
// ============================================================================

/// The slice of a meal the proposal needs
#[derive(Debug, Clone, PartialEq)]
pub struct MealCandidate {
    pub id: Uuid,
    pub name: String,
    pub protein_id: Uuid,
    pub base_id: Uuid,
    pub is_weekend_dish: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposalEntry {
    pub meal_id: Uuid,
    pub meal_name: String,
    pub meal_date: NaiveDate,
    pub is_two_days: bool,
    pub is_out_of_home: bool,
}

/// First day whose plans count as recent history for a week starting at `start`
pub fn history_start(start: NaiveDate) -> Option<NaiveDate> {
    start.checked_sub_signed(Duration::days(HISTORY_DAYS))
}

/// Last day of the week starting at `start`, if the calendar reaches it
pub fn week_end(start: NaiveDate) -> Option<NaiveDate> {
    start.checked_add_signed(Duration::days(DAYS_IN_WEEK - 1))
}

fn is_strict_weekend(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sat
}

// ============================================================================
// PROPOSAL
// ============================================================================

/// Build a proposal for the week starting at `start`.
///
/// `recent` holds meal ids planned since [`history_start`]. When no meal
/// satisfies every constraint the day falls back to any meal with the right
/// weekend flag; when even that is empty the day is skipped. A week that
/// runs past the end of the calendar gets no proposal.
pub fn generate_proposal<R: Rng + ?Sized>(
    meals: &[MealCandidate],
    recent: &HashSet<Uuid>,
    start: NaiveDate,
    rng: &mut R,
) -> Vec<ProposalEntry> {
    let mut proposal = Vec::new();
    let Some(end) = week_end(start) else {
        return proposal;
    };
    if meals.is_empty() {
        return proposal;
    }

    let mut used: HashSet<Uuid> = HashSet::new();
    let mut last_protein: Option<Uuid> = None;
    let mut last_base: Option<Uuid> = None;
    let mut current = start;

    while current <= end {
        let weekend = is_strict_weekend(current);

        let mut candidates: Vec<&MealCandidate> = meals
            .iter()
            .filter(|m| {
                !recent.contains(&m.id)
                    && !used.contains(&m.id)
                    && Some(m.protein_id) != last_protein
                    && Some(m.base_id) != last_base
                    && m.is_weekend_dish == weekend
            })
            .collect();

        if candidates.is_empty() {
            candidates = meals.iter().filter(|m| m.is_weekend_dish == weekend).collect();
        }

        let Some(chosen) = candidates.choose(rng).copied() else {
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
            continue;
        };

        let next_in_week = current.succ_opt().is_some_and(|next| next <= end);
        let is_two_days = !weekend && next_in_week && rng.gen_bool(TWO_DAY_PROBABILITY);

        proposal.push(ProposalEntry {
            meal_id: chosen.id,
            meal_name: chosen.name.clone(),
            meal_date: current,
            is_two_days,
            is_out_of_home: false,
        });

        used.insert(chosen.id);
        last_protein = Some(chosen.protein_id);
        last_base = Some(chosen.base_id);
        let step = Duration::days(if is_two_days { 2 } else { 1 });
        match current.checked_add_signed(step) {
            Some(next) => current = next,
            None => break,
        }
    }

    proposal
}

// ============================================================================
// TESTS
// ============================================================================
