// Accounts, categories, import rules, transactions and their statistics

use super::{is_unique_violation, now, round2, DbResult};
use crate::error::{AppError, AppResult};
use crate::parser::{decode_statement, parse_statement, BankType, StatementTransaction};
use crate::rules::{normalize_keyword, KeywordRule, RuleEngine};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

const ACCOUNT_NOT_FOUND: &str = "Account does not exist or you do not have permission to access it.";
const CATEGORY_NOT_FOUND: &str = "Category not found";

pub const UNCATEGORIZED: &str = "Uncategorized";
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: Uuid,
    pub name: String,
    pub bank_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub date: NaiveDate,
    pub amount: f64,
    pub title: String,
    pub category_id: Option<Uuid>,
    pub category: Option<Category>,
}

/// A statement row as shown before import
#[derive(Debug, Clone, Serialize)]
pub struct PreviewTransaction {
    #[serde(flatten)]
    pub transaction: StatementTransaction,
    /// The account already holds a row with this duplicate key
    pub already_imported: bool,
}

/// A row sent back by the client to be stored
#[derive(Debug, Clone, Deserialize)]
pub struct ImportItem {
    #[serde(deserialize_with = "deserialize_flexible_date")]
    pub date: NaiveDate,
    pub amount: f64,
    pub title: String,
    pub raw_hash: String,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

/// Accepts "2025-01-31", "2025-01-31T00:00:00" and RFC 3339 timestamps
fn deserialize_flexible_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flexible_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw)))
}

pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|ts| ts.date())
}

// ============================================================================
// ACCOUNTS
// ============================================================================

fn account_from_row(row: &Row) -> DbResult<Account> {
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        bank_type: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn create_account(conn: &Connection, user_id: Uuid, name: &str, bank_type: &str) -> AppResult<Account> {
    let account = Account {
        id: Uuid::new_v4(),
        user_id,
        name: name.trim().to_string(),
        bank_type: bank_type.trim().to_uppercase(),
        created_at: now(),
    };
    conn.execute(
        "INSERT INTO accounts (id, user_id, name, bank_type, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![account.id, account.user_id, account.name, account.bank_type, account.created_at],
    )?;
    Ok(account)
}

pub fn list_accounts(conn: &Connection, user_id: Uuid) -> AppResult<Vec<Account>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, bank_type, created_at FROM accounts
         WHERE user_id = ?1 ORDER BY created_at",
    )?;
    let accounts = stmt
        .query_map([user_id], account_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(accounts)
}

/// The account, if it exists and belongs to the user
pub fn get_owned_account(conn: &Connection, user_id: Uuid, account_id: Uuid) -> AppResult<Account> {
    conn.query_row(
        "SELECT id, user_id, name, bank_type, created_at FROM accounts WHERE id = ?1 AND user_id = ?2",
        params![account_id, user_id],
        account_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found(ACCOUNT_NOT_FOUND))
}

fn exists(conn: &Connection, sql: &str, id: Uuid) -> DbResult<bool> {
    conn.query_row(sql, [id], |_| Ok(())).optional().map(|r| r.is_some())
}

/// Delete an empty account: no transactions and no import rules
pub fn delete_account(conn: &Connection, user_id: Uuid, account_id: Uuid) -> AppResult<()> {
    get_owned_account(conn, user_id, account_id)?;

    if exists(conn, "SELECT 1 FROM transactions WHERE account_id = ?1 LIMIT 1", account_id)? {
        return Err(AppError::bad_request(
            "You cannot delete an account that contains transactions. Delete the transaction history first.",
        ));
    }
    if exists(conn, "SELECT 1 FROM import_rules WHERE account_id = ?1 LIMIT 1", account_id)? {
        return Err(AppError::bad_request(
            "This account has assigned import rules. Delete them before deleting the account.",
        ));
    }

    conn.execute("DELETE FROM accounts WHERE id = ?1", [account_id])?;
    Ok(())
}

/// Drop the whole transaction history of an account
pub fn clear_account_transactions(conn: &Connection, user_id: Uuid, account_id: Uuid) -> AppResult<usize> {
    get_owned_account(conn, user_id, account_id)?;
    Ok(conn.execute("DELETE FROM transactions WHERE account_id = ?1", [account_id])?)
}

// ============================================================================
// CATEGORIES
// ============================================================================

pub fn create_category(conn: &Connection, user_id: Uuid, name: &str) -> AppResult<Category> {
    let category = Category {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
    };
    conn.execute(
        "INSERT INTO categories (id, user_id, name) VALUES (?1, ?2, ?3)",
        params![category.id, user_id, category.name],
    )?;
    Ok(category)
}

pub fn list_categories(conn: &Connection, user_id: Uuid) -> AppResult<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name FROM categories WHERE user_id = ?1 ORDER BY name")?;
    let categories = stmt
        .query_map([user_id], |row| Ok(Category { id: row.get(0)?, name: row.get(1)? }))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub fn get_owned_category(conn: &Connection, user_id: Uuid, category_id: Uuid) -> AppResult<Category> {
    conn.query_row(
        "SELECT id, name FROM categories WHERE id = ?1 AND user_id = ?2",
        params![category_id, user_id],
        |row| Ok(Category { id: row.get(0)?, name: row.get(1)? }),
    )
    .optional()?
    .ok_or_else(|| AppError::not_found(CATEGORY_NOT_FOUND))
}

pub fn rename_category(conn: &Connection, user_id: Uuid, category_id: Uuid, name: &str) -> AppResult<Category> {
    get_owned_category(conn, user_id, category_id)?;
    conn.execute(
        "UPDATE categories SET name = ?1 WHERE id = ?2",
        params![name.trim(), category_id],
    )?;
    get_owned_category(conn, user_id, category_id)
}

/// Delete a category no rule and no transaction refers to
pub fn delete_category(conn: &Connection, user_id: Uuid, category_id: Uuid) -> AppResult<()> {
    get_owned_category(conn, user_id, category_id)?;

    if exists(conn, "SELECT 1 FROM import_rules WHERE category_id = ?1 LIMIT 1", category_id)? {
        return Err(AppError::bad_request(
            "You cannot delete a category that is used in import rules. Delete the rules first.",
        ));
    }
    if exists(conn, "SELECT 1 FROM transactions WHERE category_id = ?1 LIMIT 1", category_id)? {
        return Err(AppError::bad_request(
            "This category has assigned transactions. Change the category of the transactions before deleting it.",
        ));
    }

    conn.execute("DELETE FROM categories WHERE id = ?1", [category_id])?;
    Ok(())
}

// ============================================================================
// IMPORT RULES
// ============================================================================

fn rule_from_row(row: &Row) -> DbResult<KeywordRule> {
    Ok(KeywordRule {
        id: row.get(0)?,
        account_id: row.get(1)?,
        category_id: row.get(2)?,
        keyword: row.get(3)?,
    })
}

/// Rules of an account in creation order
pub fn account_rules(conn: &Connection, account_id: Uuid) -> DbResult<Vec<KeywordRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, category_id, keyword FROM import_rules
         WHERE account_id = ?1 ORDER BY rowid",
    )?;
    let rules = stmt
        .query_map([account_id], rule_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rules)
}

pub fn list_rules(conn: &Connection, user_id: Uuid, account_id: Uuid) -> AppResult<Vec<KeywordRule>> {
    get_owned_account(conn, user_id, account_id)?;
    Ok(account_rules(conn, account_id)?)
}

pub fn create_rule(
    conn: &Connection,
    user_id: Uuid,
    account_id: Uuid,
    category_id: Uuid,
    keyword: &str,
) -> AppResult<KeywordRule> {
    get_owned_account(conn, user_id, account_id)?;
    get_owned_category(conn, user_id, category_id)?;

    let rule = KeywordRule {
        id: Uuid::new_v4(),
        account_id,
        category_id,
        keyword: normalize_keyword(keyword),
    };
    conn.execute(
        "INSERT INTO import_rules (id, account_id, category_id, keyword) VALUES (?1, ?2, ?3, ?4)",
        params![rule.id, rule.account_id, rule.category_id, rule.keyword],
    )?;
    Ok(rule)
}

fn get_owned_rule(conn: &Connection, user_id: Uuid, rule_id: Uuid) -> AppResult<KeywordRule> {
    conn.query_row(
        "SELECT r.id, r.account_id, r.category_id, r.keyword
         FROM import_rules r JOIN accounts a ON a.id = r.account_id
         WHERE r.id = ?1 AND a.user_id = ?2",
        params![rule_id, user_id],
        rule_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Rule not found"))
}

pub fn update_rule(
    conn: &Connection,
    user_id: Uuid,
    rule_id: Uuid,
    category_id: Uuid,
    keyword: &str,
) -> AppResult<KeywordRule> {
    get_owned_rule(conn, user_id, rule_id)?;
    get_owned_category(conn, user_id, category_id)?;

    conn.execute(
        "UPDATE import_rules SET keyword = ?1, category_id = ?2 WHERE id = ?3",
        params![normalize_keyword(keyword), category_id, rule_id],
    )?;
    get_owned_rule(conn, user_id, rule_id)
}

/// Rules that already categorized a transaction stay
pub fn delete_rule(conn: &Connection, user_id: Uuid, rule_id: Uuid) -> AppResult<()> {
    let rule = get_owned_rule(conn, user_id, rule_id)?;

    // SQLite's UPPER folds ASCII only; match titles the way the import does
    let mut stmt = conn.prepare("SELECT title FROM transactions WHERE account_id = ?1 AND category_id = ?2")?;
    let titles = stmt.query_map(params![rule.account_id, rule.category_id], |row| row.get::<_, String>(0))?;
    let mut used = false;
    for title in titles {
        if rule.matches(&title?) {
            used = true;
            break;
        }
    }
    if used {
        return Err(AppError::bad_request(
            "You cannot delete a rule that has already been used to categorize transactions.",
        ));
    }

    conn.execute("DELETE FROM import_rules WHERE id = ?1", [rule_id])?;
    Ok(())
}

// ============================================================================
// IMPORT
// ============================================================================

fn existing_hashes(conn: &Connection, account_id: Uuid) -> DbResult<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT raw_hash FROM transactions WHERE account_id = ?1")?;
    let hashes = stmt
        .query_map([account_id], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(hashes)
}

/// Parse an uploaded statement for an account and categorize it with the account's rules
pub fn preview_import(
    conn: &Connection,
    user_id: Uuid,
    account_id: Uuid,
    file: &[u8],
) -> AppResult<Vec<PreviewTransaction>> {
    let account = get_owned_account(conn, user_id, account_id)?;
    let bank_type: BankType = account
        .bank_type
        .parse()
        .map_err(|e: anyhow::Error| AppError::bad_request(e.to_string()))?;

    let content = decode_statement(file);
    let mut transactions = parse_statement(bank_type, &content)?;
    if transactions.is_empty() {
        return Err(AppError::bad_request(
            "No transactions found in the file. Please check that you selected the correct bank.",
        ));
    }

    let engine = RuleEngine::from_rules(account_rules(conn, account_id)?);
    let matched = engine.apply(&mut transactions);
    let known = existing_hashes(conn, account_id)?;

    tracing::info!(
        %account_id,
        bank = %bank_type,
        rows = transactions.len(),
        matched,
        "import preview"
    );

    Ok(transactions
        .into_iter()
        .map(|tx| PreviewTransaction {
            already_imported: known.contains(&tx.raw_hash),
            transaction: tx,
        })
        .collect())
}

/// Store previewed rows atomically; any duplicate key rejects the whole batch
pub fn confirm_import(
    conn: &Connection,
    user_id: Uuid,
    account_id: Uuid,
    items: &[ImportItem],
) -> AppResult<usize> {
    get_owned_account(conn, user_id, account_id)?;

    let owned: HashSet<Uuid> = list_categories(conn, user_id)?.into_iter().map(|c| c.id).collect();
    if items
        .iter()
        .filter_map(|item| item.category_id)
        .any(|id| !owned.contains(&id))
    {
        return Err(AppError::not_found(CATEGORY_NOT_FOUND));
    }

    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO transactions (id, account_id, category_id, date, amount, title, raw_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        let created_at = now();
        for item in items {
            let result = stmt.execute(params![
                Uuid::new_v4(),
                account_id,
                item.category_id,
                item.date,
                round2(item.amount),
                item.title,
                item.raw_hash,
                created_at
            ]);
            match result {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    tracing::warn!(%account_id, raw_hash = %item.raw_hash, "duplicate transaction in import");
                    return Err(AppError::bad_request(
                        "Duplicate transactions detected or database error",
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    tx.commit()?;

    tracing::info!(%account_id, count = items.len(), "transactions imported");
    Ok(items.len())
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

pub fn list_transactions(conn: &Connection, user_id: Uuid, account_id: Uuid) -> AppResult<Vec<Transaction>> {
    get_owned_account(conn, user_id, account_id)?;

    let mut stmt = conn.prepare(
        "SELECT t.id, t.date, t.amount, t.title, t.category_id, c.name
         FROM transactions t LEFT JOIN categories c ON c.id = t.category_id
         WHERE t.account_id = ?1
         ORDER BY t.date DESC, t.rowid DESC",
    )?;
    let transactions = stmt
        .query_map([account_id], |row| {
            let category_id: Option<Uuid> = row.get(4)?;
            let category_name: Option<String> = row.get(5)?;
            Ok(Transaction {
                id: row.get(0)?,
                date: row.get(1)?,
                amount: row.get(2)?,
                title: row.get(3)?,
                category_id,
                category: category_id
                    .zip(category_name)
                    .map(|(id, name)| Category { id, name }),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(transactions)
}

/// Re-categorize a single transaction by hand
pub fn set_transaction_category(
    conn: &Connection,
    user_id: Uuid,
    transaction_id: Uuid,
    category_id: Uuid,
) -> AppResult<()> {
    let owned = conn
        .query_row(
            "SELECT 1 FROM transactions t JOIN accounts a ON a.id = t.account_id
             WHERE t.id = ?1 AND a.user_id = ?2",
            params![transaction_id, user_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !owned {
        return Err(AppError::not_found("Transaction not found"));
    }
    get_owned_category(conn, user_id, category_id)?;

    conn.execute(
        "UPDATE transactions SET category_id = ?1 WHERE id = ?2",
        params![category_id, transaction_id],
    )?;
    Ok(())
}

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct Summary {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryTotal {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyStats {
    pub summary: Summary,
    pub categories: Vec<CategoryTotal>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthTotals {
    pub month_num: u32,
    pub name: String,
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearlyStats {
    pub year: i32,
    pub data: Vec<MonthTotals>,
}

/// Income/expense summary and spending per category for one month
pub fn monthly_stats(
    conn: &Connection,
    user_id: Uuid,
    account_id: Uuid,
    month: u32,
    year: i32,
) -> AppResult<MonthlyStats> {
    if !(1..=12).contains(&month) {
        return Err(AppError::bad_request("Month must be between 1 and 12"));
    }
    get_owned_account(conn, user_id, account_id)?;
    let period = format!("{:04}-{:02}", year, month);

    let mut stmt = conn.prepare(
        "SELECT COALESCE(c.name, ?3) AS cat_name, SUM(t.amount)
         FROM transactions t LEFT JOIN categories c ON c.id = t.category_id
         WHERE t.account_id = ?1 AND strftime('%Y-%m', t.date) = ?2 AND t.amount < 0
         GROUP BY cat_name
         ORDER BY SUM(t.amount)",
    )?;
    let categories = stmt
        .query_map(params![account_id, period, UNCATEGORIZED], |row| {
            Ok(CategoryTotal {
                name: row.get(0)?,
                value: round2(row.get::<_, f64>(1)?.abs()),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let (income, expense): (f64, f64) = conn.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN amount > 0 THEN amount ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN amount <= 0 THEN amount ELSE 0 END), 0)
         FROM transactions
         WHERE account_id = ?1 AND strftime('%Y-%m', date) = ?2",
        params![account_id, period],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let income = round2(income);
    let expense = round2(expense.abs());
    Ok(MonthlyStats {
        summary: Summary {
            income,
            expense,
            balance: round2(income - expense),
        },
        categories,
    })
}

/// Income and expense for each of the twelve months of a year
pub fn yearly_stats(conn: &Connection, user_id: Uuid, account_id: Uuid, year: i32) -> AppResult<YearlyStats> {
    get_owned_account(conn, user_id, account_id)?;

    let mut stmt = conn.prepare(
        "SELECT CAST(strftime('%m', date) AS INTEGER) AS month,
                SUM(CASE WHEN amount > 0 THEN amount ELSE 0 END),
                SUM(CASE WHEN amount < 0 THEN -amount ELSE 0 END)
         FROM transactions
         WHERE account_id = ?1 AND strftime('%Y', date) = ?2
         GROUP BY month",
    )?;
    let totals: HashMap<u32, (f64, f64)> = stmt
        .query_map(params![account_id, format!("{:04}", year)], |row| {
            Ok((row.get::<_, u32>(0)?, (row.get(1)?, row.get(2)?)))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;

    let data = (1..=12u32)
        .map(|month| {
            let (income, expense) = totals.get(&month).copied().unwrap_or((0.0, 0.0));
            MonthTotals {
                month_num: month,
                name: MONTH_NAMES[(month - 1) as usize].to_string(),
                income: round2(income),
                expense: round2(expense),
                balance: round2(income - expense),
            }
        })
        .collect();

    Ok(YearlyStats { year, data })
}
