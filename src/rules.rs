// 🏷️ Import Rules - keyword → category matching for statement rows

use crate::parser::StatementTransaction;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordRule {
    pub id: Uuid,
    pub account_id: Uuid,
    pub category_id: Uuid,
    /// Stored upper-cased
    pub keyword: String,
}

impl KeywordRule {
    /// Case-insensitive substring match against a transaction title
    pub fn matches(&self, title: &str) -> bool {
        let keyword = self.keyword.to_uppercase();
        !keyword.is_empty() && title.to_uppercase().contains(&keyword)
    }
}

/// Keywords are compared upper-cased and stored that way
pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_uppercase()
}

// ============================================================================
// RULE ENGINE
// ============================================================================

/// First matching rule wins, in the order the rules were added
pub struct RuleEngine {
    rules: Vec<KeywordRule>,
}

impl RuleEngine {
    pub fn from_rules(rules: Vec<KeywordRule>) -> Self {
        RuleEngine { rules }
    }

    /// Category for a title, if any rule matches
    pub fn classify(&self, title: &str) -> Option<Uuid> {
        self.rules
            .iter()
            .find(|rule| rule.matches(title))
            .map(|rule| rule.category_id)
    }

    /// Fill `category_id` on every transaction a rule matches
    pub fn apply(&self, transactions: &mut [StatementTransaction]) -> usize {
        let mut matched = 0;
        for tx in transactions.iter_mut() {
            if let Some(category_id) = self.classify(&tx.title) {
                tx.category_id = Some(category_id);
                matched += 1;
            }
        }
        matched
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rule(keyword: &str, category_id: Uuid) -> KeywordRule {
        KeywordRule {
            id: Uuid::new_v4(),
            account_id: Uuid::nil(),
            category_id,
            keyword: normalize_keyword(keyword),
        }
    }

    fn tx(title: &str) -> StatementTransaction {
        StatementTransaction {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            title: title.to_string(),
            amount: -1.0,
            raw_hash: String::new(),
            category_id: None,
        }
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let r = rule("biedronka", Uuid::new_v4());
        assert_eq!(r.keyword, "BIEDRONKA");
        assert!(r.matches("Zakup BIEDRONKA 1234"));
        assert!(r.matches("biedronka"));
        assert!(!r.matches("LIDL"));
    }

    #[test]
    fn test_first_rule_wins() {
        let groceries = Uuid::new_v4();
        let fuel = Uuid::new_v4();
        let engine = RuleEngine::from_rules(vec![rule("ORLEN", fuel), rule("ORLEN SKLEP", groceries)]);

        assert_eq!(engine.classify("ORLEN SKLEP 12"), Some(fuel));
        assert_eq!(engine.classify("SKLEP"), None);
    }

    #[test]
    fn test_apply_sets_categories() {
        let food = Uuid::new_v4();
        let engine = RuleEngine::from_rules(vec![rule("lidl", food)]);
        let mut txs = vec![tx("LIDL WARSZAWA"), tx("NETFLIX")];

        assert_eq!(engine.apply(&mut txs), 1);
        assert_eq!(txs[0].category_id, Some(food));
        assert_eq!(txs[1].category_id, None);
    }

    #[test]
    fn test_empty_keyword_never_matches() {
        let engine = RuleEngine::from_rules(vec![rule("  ", Uuid::new_v4())]);
        assert_eq!(engine.classify("ANYTHING"), None);
    }
}
