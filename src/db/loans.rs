// Loans, their payments, and the loan_status summary view

use super::{now, round2, Changes, DbResult};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

const LOAN_NOT_FOUND: &str = "Loan not found";
const PAYMENT_NOT_FOUND: &str = "Payment not found";

#[derive(Debug, Clone, Serialize)]
pub struct Loan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub total_amount: f64,
    pub installments_count: i64,
    pub due_day: i64,
    pub installment_amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewLoan {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(range(min = 0.01, message = "must be greater than 0"))]
    pub total_amount: f64,
    #[validate(range(min = 1, message = "must be greater than 0"))]
    pub installments_count: i64,
    #[validate(range(min = 1, max = 31))]
    pub due_day: i64,
    #[validate(range(min = 0.01, message = "must be greater than 0"))]
    pub installment_amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LoanUpdate {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(range(min = 0.01, message = "must be greater than 0"))]
    pub total_amount: Option<f64>,
    #[validate(range(min = 1, message = "must be greater than 0"))]
    pub installments_count: Option<i64>,
    #[validate(range(min = 1, max = 31))]
    pub due_day: Option<i64>,
    #[validate(range(min = 0.01, message = "must be greater than 0"))]
    pub installment_amount: Option<f64>,
}

/// One row of the loan_status view
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LoanStatus {
    pub loan_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub total_amount: f64,
    pub installments_count: i64,
    pub installment_amount: f64,
    pub due_day: i64,
    pub total_paid: f64,
    pub remaining: f64,
    pub total_installments_paid: f64,
    pub total_prepayments: f64,
}

fn loan_from_row(row: &Row) -> DbResult<Loan> {
    Ok(Loan {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        total_amount: row.get(3)?,
        installments_count: row.get(4)?,
        due_day: row.get(5)?,
        installment_amount: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

// ============================================================================
// LOANS
// ============================================================================

pub fn create_loan(conn: &Connection, user_id: Uuid, new: &NewLoan) -> AppResult<Loan> {
    let ts = now();
    let loan = Loan {
        id: Uuid::new_v4(),
        user_id,
        name: new.name.trim().to_string(),
        total_amount: round2(new.total_amount),
        installments_count: new.installments_count,
        due_day: new.due_day,
        installment_amount: round2(new.installment_amount),
        created_at: ts,
        updated_at: ts,
    };
    conn.execute(
        "INSERT INTO loans (id, user_id, name, total_amount, installments_count, due_day,
                            installment_amount, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            loan.id,
            loan.user_id,
            loan.name,
            loan.total_amount,
            loan.installments_count,
            loan.due_day,
            loan.installment_amount,
            loan.created_at,
            loan.updated_at
        ],
    )?;
    Ok(loan)
}

pub fn get_owned_loan(conn: &Connection, user_id: Uuid, loan_id: Uuid) -> AppResult<Loan> {
    conn.query_row(
        "SELECT id, user_id, name, total_amount, installments_count, due_day, installment_amount,
                created_at, updated_at
         FROM loans WHERE id = ?1 AND user_id = ?2",
        params![loan_id, user_id],
        loan_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found(LOAN_NOT_FOUND))
}

pub fn update_loan(conn: &Connection, user_id: Uuid, loan_id: Uuid, update: &LoanUpdate) -> AppResult<Loan> {
    get_owned_loan(conn, user_id, loan_id)?;

    let mut changes = Changes::new();
    changes
        .set("name", update.name.as_ref().map(|n| n.trim().to_string()))
        .set("total_amount", update.total_amount.map(round2))
        .set("installments_count", update.installments_count)
        .set("due_day", update.due_day)
        .set("installment_amount", update.installment_amount.map(round2));
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }
    changes.apply(conn, "loans", loan_id, true)?;

    get_owned_loan(conn, user_id, loan_id)
}

/// Loans with recorded payments cannot be deleted
pub fn delete_loan(conn: &Connection, user_id: Uuid, loan_id: Uuid) -> AppResult<()> {
    get_owned_loan(conn, user_id, loan_id)?;

    let has_payments = conn
        .query_row("SELECT 1 FROM payments WHERE loan_id = ?1 LIMIT 1", [loan_id], |_| Ok(()))
        .optional()?
        .is_some();
    if has_payments {
        return Err(AppError::bad_request(
            "Cannot delete loan with existing payments (installments or prepayments)",
        ));
    }

    conn.execute("DELETE FROM loans WHERE id = ?1", [loan_id])?;
    Ok(())
}

pub fn loan_status(conn: &Connection, user_id: Uuid) -> AppResult<Vec<LoanStatus>> {
    let mut stmt = conn.prepare(
        "SELECT loan_id, user_id, name, total_amount, installments_count, installment_amount, due_day,
                total_paid, remaining, total_installments_paid, total_prepayments
         FROM loan_status WHERE user_id = ?1 ORDER BY name",
    )?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(LoanStatus {
                loan_id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                total_amount: row.get(3)?,
                installments_count: row.get(4)?,
                installment_amount: row.get(5)?,
                due_day: row.get(6)?,
                total_paid: round2(row.get(7)?),
                remaining: round2(row.get(8)?),
                total_installments_paid: round2(row.get(9)?),
                total_prepayments: round2(row.get(10)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============================================================================
// PAYMENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Installment,
    Prepayment,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Installment => "installment",
            PaymentType::Prepayment => "prepayment",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "installment" => Ok(PaymentType::Installment),
            "prepayment" => Ok(PaymentType::Prepayment),
            other => Err(format!("unknown payment type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub amount: f64,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub paid_at: NaiveDate,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPayment {
    pub loan_id: Uuid,
    #[validate(range(min = 0.01, message = "must be greater than 0"))]
    pub amount: f64,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    /// Defaults to today
    pub paid_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PaymentUpdate {
    #[validate(range(min = 0.01, message = "must be greater than 0"))]
    pub amount: Option<f64>,
    #[serde(rename = "type")]
    pub payment_type: Option<PaymentType>,
    pub paid_at: Option<NaiveDate>,
}

fn payment_from_row(row: &Row) -> DbResult<Payment> {
    let kind: String = row.get(2)?;
    let payment_type = kind.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(Payment {
        id: row.get(0)?,
        amount: row.get(1)?,
        payment_type,
        paid_at: row.get(3)?,
    })
}

/// Record a payment against one of the user's loans
pub fn create_payment(conn: &Connection, user_id: Uuid, new: &NewPayment) -> AppResult<Payment> {
    get_owned_loan(conn, user_id, new.loan_id)?;

    let payment = Payment {
        id: Uuid::new_v4(),
        amount: round2(new.amount),
        payment_type: new.payment_type,
        paid_at: new.paid_at.unwrap_or_else(|| Utc::now().date_naive()),
    };
    conn.execute(
        "INSERT INTO payments (id, loan_id, amount, type, paid_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            payment.id,
            new.loan_id,
            payment.amount,
            payment.payment_type.as_str(),
            payment.paid_at
        ],
    )?;
    Ok(payment)
}

/// Payments of a loan, most recent first
pub fn list_payments(conn: &Connection, user_id: Uuid, loan_id: Uuid) -> AppResult<Vec<Payment>> {
    get_owned_loan(conn, user_id, loan_id)?;

    let mut stmt = conn.prepare(
        "SELECT id, amount, type, paid_at FROM payments
         WHERE loan_id = ?1 ORDER BY paid_at DESC, rowid DESC",
    )?;
    let payments = stmt
        .query_map([loan_id], payment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(payments)
}

/// 404 when the payment does not exist, 403 when it belongs to someone else
fn check_payment_owner(conn: &Connection, user_id: Uuid, payment_id: Uuid, action: &str) -> AppResult<()> {
    let owner: Option<Uuid> = conn
        .query_row(
            "SELECT l.user_id FROM payments p JOIN loans l ON l.id = p.loan_id WHERE p.id = ?1",
            [payment_id],
            |row| row.get(0),
        )
        .optional()?;

    match owner {
        None => Err(AppError::not_found(PAYMENT_NOT_FOUND)),
        Some(owner) if owner != user_id => Err(AppError::forbidden(format!(
            "You don't have permission to {} this payment",
            action
        ))),
        Some(_) => Ok(()),
    }
}

pub fn update_payment(
    conn: &Connection,
    user_id: Uuid,
    payment_id: Uuid,
    update: &PaymentUpdate,
) -> AppResult<Payment> {
    check_payment_owner(conn, user_id, payment_id, "update")?;

    let mut changes = Changes::new();
    changes
        .set("amount", update.amount.map(round2))
        .set("type", update.payment_type.map(|t| t.as_str()))
        .set("paid_at", update.paid_at);
    if changes.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }
    changes.apply(conn, "payments", payment_id, false)?;

    Ok(conn.query_row(
        "SELECT id, amount, type, paid_at FROM payments WHERE id = ?1",
        [payment_id],
        payment_from_row,
    )?)
}

pub fn delete_payment(conn: &Connection, user_id: Uuid, payment_id: Uuid) -> AppResult<()> {
    check_payment_owner(conn, user_id, payment_id, "delete")?;
    conn.execute("DELETE FROM payments WHERE id = ?1", [payment_id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    fn new_loan(name: &str) -> NewLoan {
        NewLoan {
            name: name.to_string(),
            total_amount: 1000.0,
            installments_count: 4,
            due_day: 10,
            installment_amount: 250.0,
        }
    }

    fn pay(loan_id: Uuid, amount: f64, payment_type: PaymentType, day: u32) -> NewPayment {
        NewPayment {
            loan_id,
            amount,
            payment_type,
            paid_at: NaiveDate::from_ymd_opt(2025, 1, day),
        }
    }

    #[test]
    fn test_new_loan_validation() {
        assert!(new_loan("Car").validate().is_ok());

        let mut bad = new_loan("Car");
        bad.due_day = 32;
        bad.total_amount = 0.0;
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("due_day"));
        assert!(errors.field_errors().contains_key("total_amount"));
    }

    #[test]
    fn test_loan_status_view() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "loaner");
        let loan = create_loan(&conn, user, &new_loan("Car")).unwrap();

        create_payment(&conn, user, &pay(loan.id, 250.0, PaymentType::Installment, 10)).unwrap();
        create_payment(&conn, user, &pay(loan.id, 250.0, PaymentType::Installment, 20)).unwrap();
        create_payment(&conn, user, &pay(loan.id, 100.0, PaymentType::Prepayment, 25)).unwrap();

        let status = loan_status(&conn, user).unwrap();
        assert_eq!(status.len(), 1);
        let s = &status[0];
        assert_eq!(s.loan_id, loan.id);
        assert_eq!(s.total_paid, 600.0);
        assert_eq!(s.remaining, 400.0);
        assert_eq!(s.total_installments_paid, 500.0);
        assert_eq!(s.total_prepayments, 100.0);
    }

    #[test]
    fn test_loan_without_payments_has_zero_totals() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "fresh");
        create_loan(&conn, user, &new_loan("Phone")).unwrap();

        let s = &loan_status(&conn, user).unwrap()[0];
        assert_eq!(s.total_paid, 0.0);
        assert_eq!(s.remaining, 1000.0);
    }

    #[test]
    fn test_update_loan() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "upd");
        let loan = create_loan(&conn, user, &new_loan("Old")).unwrap();

        let updated = update_loan(
            &conn,
            user,
            loan.id,
            &LoanUpdate { name: Some("New".into()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(updated.name, "New");
        assert_eq!(updated.total_amount, 1000.0);

        let err = update_loan(&conn, user, loan.id, &LoanUpdate::default()).unwrap_err();
        assert_eq!(err.to_string(), "No fields to update");

        let err = update_loan(&conn, user, Uuid::new_v4(), &LoanUpdate::default()).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_delete_loan_blocked_by_payments() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "del");
        let loan = create_loan(&conn, user, &new_loan("Car")).unwrap();
        let payment = create_payment(&conn, user, &pay(loan.id, 50.0, PaymentType::Installment, 1)).unwrap();

        let err = delete_loan(&conn, user, loan.id).unwrap_err();
        assert_eq!(err.status_code(), 400);

        delete_payment(&conn, user, payment.id).unwrap();
        delete_loan(&conn, user, loan.id).unwrap();
        assert!(loan_status(&conn, user).unwrap().is_empty());
    }

    #[test]
    fn test_payment_ownership() {
        let conn = test_support::conn();
        let owner = test_support::user(&conn, "owner");
        let other = test_support::user(&conn, "other");
        let loan = create_loan(&conn, owner, &new_loan("Car")).unwrap();

        let err = create_payment(&conn, other, &pay(loan.id, 10.0, PaymentType::Installment, 1)).unwrap_err();
        assert_eq!(err.status_code(), 404, "Foreign loans look missing");

        let payment = create_payment(&conn, owner, &pay(loan.id, 10.0, PaymentType::Installment, 1)).unwrap();
        let err = delete_payment(&conn, other, payment.id).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.to_string(), "You don't have permission to delete this payment");

        let err = update_payment(&conn, other, payment.id, &PaymentUpdate::default()).unwrap_err();
        assert_eq!(err.status_code(), 403);

        let err = delete_payment(&conn, owner, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_list_and_update_payments() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "lister");
        let loan = create_loan(&conn, user, &new_loan("Car")).unwrap();
        let first = create_payment(&conn, user, &pay(loan.id, 10.0, PaymentType::Installment, 1)).unwrap();
        create_payment(&conn, user, &pay(loan.id, 20.0, PaymentType::Prepayment, 15)).unwrap();

        let payments = list_payments(&conn, user, loan.id).unwrap();
        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].amount, 20.0, "Newest payment first");

        let updated = update_payment(
            &conn,
            user,
            first.id,
            &PaymentUpdate { payment_type: Some(PaymentType::Prepayment), ..Default::default() },
        )
        .unwrap();
        assert_eq!(updated.payment_type, PaymentType::Prepayment);
        assert_eq!(updated.amount, 10.0);
    }

    #[test]
    fn test_payment_defaults_to_today() {
        let conn = test_support::conn();
        let user = test_support::user(&conn, "today");
        let loan = create_loan(&conn, user, &new_loan("Car")).unwrap();
        let payment = create_payment(
            &conn,
            user,
            &NewPayment { loan_id: loan.id, amount: 1.0, payment_type: PaymentType::Installment, paid_at: None },
        )
        .unwrap();
        assert_eq!(payment.paid_at, Utc::now().date_naive());
    }
}
