// 🏦 Statement Parser - Polish bank CSV exports
// One parser per bank behind a shared trait; the duplicate key is assigned per file

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// CORE TYPES
// ============================================================================

/// BankType - which export format an account produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BankType {
    MBank,
    Santander,
}

pub const SUPPORTED_BANKS: [BankType; 2] = [BankType::MBank, BankType::Santander];

impl BankType {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            BankType::MBank => "mBank",
            BankType::Santander => "Santander",
        }
    }

    /// Code stored on the account row
    pub fn code(&self) -> &str {
        match self {
            BankType::MBank => "MBANK",
            BankType::Santander => "SANTANDER",
        }
    }
}

impl fmt::Display for BankType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for BankType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "MBANK" => Ok(BankType::MBank),
            "SANTANDER" => Ok(BankType::Santander),
            _ => {
                let supported: Vec<&str> = SUPPORTED_BANKS.iter().map(|b| b.code()).collect();
                Err(anyhow!(
                    "Bank '{}' is not yet supported. Supported banks: {}",
                    s,
                    supported.join(", ")
                ))
            }
        }
    }
}

/// RawTransaction - one statement row, before the duplicate key is assigned
#[derive(Debug, Clone, PartialEq)]
pub struct RawTransaction {
    pub date: NaiveDate,
    pub title: String,
    pub amount: f64,
    /// Cleaned amount exactly as written in the file; part of the duplicate key
    pub amount_text: String,
}

/// A parsed row ready for preview or import
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatementTransaction {
    pub date: NaiveDate,
    pub title: String,
    pub amount: f64,
    pub raw_hash: String,
    pub category_id: Option<Uuid>,
}

// ============================================================================
// PARSER TRAIT
// ============================================================================

/// BankParser - turns a decoded statement into raw rows
///
/// Rows that cannot be read (short rows, bad dates, bad amounts) are skipped,
/// never fatal.
pub trait BankParser: Send + Sync {
    fn parse(&self, content: &str) -> Result<Vec<RawTransaction>>;

    /// Parser version (for provenance tracking)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

/// Factory: Box<dyn BankParser> for a bank
pub fn get_parser(bank_type: BankType) -> Box<dyn BankParser> {
    match bank_type {
        BankType::MBank => Box::new(MBankParser::new()),
        BankType::Santander => Box::new(SantanderParser::new()),
    }
}

/// Parse a statement and assign each row its duplicate key
pub fn parse_statement(bank_type: BankType, content: &str) -> Result<Vec<StatementTransaction>> {
    let parser = get_parser(bank_type);
    let raw = parser.parse(content)?;
    tracing::debug!(bank = %bank_type, version = parser.version(), rows = raw.len(), "statement parsed");
    Ok(assign_raw_hashes(raw))
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Statement bytes as text: UTF-8 first, Windows-1250 otherwise
pub fn decode_statement(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1250.decode(bytes);
            text.into_owned()
        }
    }
}

/// Normalize a Polish-formatted amount: "1 234,56 PLN" -> "1234.56"
pub fn clean_amount(raw: &str) -> String {
    let cleaned: String = raw
        .replace('\'', "")
        .replace("PLN", "")
        .replace(' ', "")
        .replace('\u{a0}', "")
        .replace(',', ".")
        .trim()
        .to_string();

    if cleaned.is_empty() {
        return "0.00".to_string();
    }
    cleaned.strip_prefix('+').unwrap_or(&cleaned).to_string()
}

fn parse_amount(raw: &str) -> Option<(f64, String)> {
    let text = clean_amount(raw);
    let value: f64 = text.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some((value, text))
}

/// SHA-256 hex of "date|amount|title|occurrence"
pub fn compute_raw_hash(date: NaiveDate, amount_text: &str, title: &str, occurrence: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!(
        "{}|{}|{}|{}",
        date.format("%Y-%m-%d"),
        amount_text,
        title,
        occurrence
    ));
    format!("{:x}", hasher.finalize())
}

/// Identical rows in one file get increasing occurrence numbers, so they stay
/// distinct while a re-import of the same file reproduces the same keys.
pub fn assign_raw_hashes(rows: Vec<RawTransaction>) -> Vec<StatementTransaction> {
    let mut seen: HashMap<(NaiveDate, String, String), usize> = HashMap::new();

    rows.into_iter()
        .map(|row| {
            let count = seen
                .entry((row.date, row.amount_text.clone(), row.title.clone()))
                .or_insert(0);
            *count += 1;

            StatementTransaction {
                raw_hash: compute_raw_hash(row.date, &row.amount_text, &row.title, *count),
                date: row.date,
                title: row.title,
                amount: row.amount,
                category_id: None,
            }
        })
        .collect()
}

fn statement_reader(content: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(content.trim().as_bytes())
}

fn field<'a>(record: &'a StringRecord, idx: usize) -> Option<&'a str> {
    record.get(idx)
}

fn join_title(record: &StringRecord) -> Option<String> {
    Some(format!("{} {}", field(record, 2)?, field(record, 3)?).trim().to_string())
}

// ============================================================================
// SANTANDER
// ============================================================================

/// Santander: DD-MM-YYYY;...;title;details;...;amount
pub struct SantanderParser;

impl SantanderParser {
    pub fn new() -> Self {
        SantanderParser
    }

    fn parse_row(record: &StringRecord) -> Option<RawTransaction> {
        let date = NaiveDate::parse_from_str(field(record, 0)?.trim(), "%d-%m-%Y").ok()?;
        let title = join_title(record)?;
        let (amount, amount_text) = parse_amount(field(record, 5)?)?;
        Some(RawTransaction {
            date,
            title,
            amount,
            amount_text,
        })
    }
}

impl Default for SantanderParser {
    fn default() -> Self {
        Self::new()
    }
}

impl BankParser for SantanderParser {
    fn parse(&self, content: &str) -> Result<Vec<RawTransaction>> {
        let mut reader = statement_reader(content);
        let mut transactions = Vec::new();
        let mut started = false;

        for (idx, result) in reader.records().enumerate() {
            let Ok(record) = result else { continue };
            let first = field(&record, 0).unwrap_or("");

            if first.contains("Data operacji") {
                started = true;
                continue;
            }
            if !started {
                // Exports without a header row start at the first dated line
                if NaiveDate::parse_from_str(first.trim(), "%d-%m-%Y").is_err() {
                    continue;
                }
                started = true;
            }

            match Self::parse_row(&record) {
                Some(tx) => transactions.push(tx),
                None => tracing::debug!(line = idx + 1, "skipping unreadable statement row"),
            }
        }

        Ok(transactions)
    }
}

// ============================================================================
// MBANK
// ============================================================================

/// mBank: data starts after the "#Data księgowania" header
pub struct MBankParser;

impl MBankParser {
    pub fn new() -> Self {
        MBankParser
    }

    fn parse_row(record: &StringRecord) -> Option<RawTransaction> {
        let booking = field(record, 1)?;
        let date_str = if booking.contains('-') {
            booking
        } else {
            field(record, 0)?
        };
        let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").ok()?;
        let title = join_title(record)?;

        // Wide exports carry the amount one column further right
        let amount_raw = match field(record, 6) {
            Some(col) if record.len() > 7 && col.contains(',') => col,
            _ => field(record, 5)?,
        };
        let (amount, amount_text) = parse_amount(amount_raw)?;

        Some(RawTransaction {
            date,
            title,
            amount,
            amount_text,
        })
    }
}

impl Default for MBankParser {
    fn default() -> Self {
        Self::new()
    }
}

impl BankParser for MBankParser {
    fn parse(&self, content: &str) -> Result<Vec<RawTransaction>> {
        let mut reader = statement_reader(content);
        let mut transactions = Vec::new();
        let mut started = false;

        for (idx, result) in reader.records().enumerate() {
            let Ok(record) = result else { continue };
            let first = field(&record, 0).unwrap_or("");

            if first.contains("#Data księgowania") || first.contains("Data operacji") {
                started = true;
                continue;
            }
            if !started {
                continue;
            }

            match Self::parse_row(&record) {
                Some(tx) => transactions.push(tx),
                None => tracing::debug!(line = idx + 1, "skipping unreadable statement row"),
            }
        }

        Ok(transactions)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SANTANDER_CSV: &str = "\
Historia rachunku;;;;;;
Data operacji;Data księgowania;Opis;Szczegóły;Rachunek;Kwota;Saldo
03-02-2025;03-02-2025;BIEDRONKA 1234;Zakup kartą;PL00;-45,99;1000,00
04-02-2025;04-02-2025;PRZELEW;Wynagrodzenie;PL00;5 000,00;6000,00
xx-02-2025;broken row;;;;;
05-02-2025;05-02-2025;ORLEN;Paliwo;PL00;'-250,10 PLN;5749,90
";

    const MBANK_CSV: &str = "\
mBank S.A.;;;;;;;;
#Data księgowania;#Data operacji;#Opis operacji;#Tytuł;#Nadawca/Odbiorca;#Numer konta;#Kwota;#Saldo po operacji;
2025-03-01;2025-03-01;ZAKUP PRZY UŻYCIU KARTY;LIDL WARSZAWA;;'123';-12,50;987,50;
2025-03-02;2025-03-02;PRZELEW PRZYCHODZĄCY;ZWROT;JAN;'456';100,00;1087,50;
;;;;;;;;
";

    #[test]
    fn test_bank_type_from_str() {
        assert_eq!("mbank".parse::<BankType>().unwrap(), BankType::MBank);
        assert_eq!(" SANTANDER ".parse::<BankType>().unwrap(), BankType::Santander);

        let err = "ING".parse::<BankType>().unwrap_err().to_string();
        assert_eq!(
            err,
            "Bank 'ING' is not yet supported. Supported banks: MBANK, SANTANDER"
        );
    }

    #[test]
    fn test_clean_amount() {
        assert_eq!(clean_amount("1 234,56 PLN"), "1234.56");
        assert_eq!(clean_amount("'-45,99"), "-45.99");
        assert_eq!(clean_amount("1\u{a0}000,00"), "1000.00");
        assert_eq!(clean_amount(""), "0.00");
        assert_eq!(clean_amount("+5,00"), "5.00");
    }

    #[test]
    fn test_santander_parser_parse_csv() {
        let txs = SantanderParser::new().parse(SANTANDER_CSV).unwrap();

        assert_eq!(txs.len(), 3, "Broken row should be skipped");
        assert_eq!(txs[0].date, NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
        assert_eq!(txs[0].title, "BIEDRONKA 1234 Zakup kartą");
        assert_eq!(txs[0].amount, -45.99);
        assert_eq!(txs[1].amount, 5000.0);
        assert_eq!(txs[2].amount_text, "-250.10");
    }

    #[test]
    fn test_santander_without_header_starts_at_first_date() {
        let csv = "Some preamble;;;;;\n01-01-2025;x;A;B;c;-1,00\n";
        let txs = SantanderParser::new().parse(csv).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].title, "A B");
    }

    #[test]
    fn test_mbank_parser_parse_csv() {
        let txs = MBankParser::new().parse(MBANK_CSV).unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(txs[0].title, "ZAKUP PRZY UŻYCIU KARTY LIDL WARSZAWA");
        assert_eq!(txs[0].amount, -12.5, "Wide rows take the amount from column 6");
        assert_eq!(txs[1].amount, 100.0);
    }

    #[test]
    fn test_mbank_ignores_rows_before_header() {
        let csv = "2025-03-01;2025-03-01;A;B;;-1,00\n";
        assert!(MBankParser::new().parse(csv).unwrap().is_empty());
    }

    #[test]
    fn test_mbank_narrow_rows_use_column_five() {
        let csv = "#Data księgowania;x\n2025-03-01;2025-03-01;A;B;;-7,25\n";
        let txs = MBankParser::new().parse(csv).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, -7.25);
    }

    #[test]
    fn test_duplicate_rows_get_distinct_hashes() {
        let csv = "\
Data operacji;;;;;
01-01-2025;x;KAWA;;x;-5,00
01-01-2025;x;KAWA;;x;-5,00
";
        let txs = parse_statement(BankType::Santander, csv).unwrap();
        assert_eq!(txs.len(), 2);
        assert_ne!(txs[0].raw_hash, txs[1].raw_hash);

        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(txs[0].raw_hash, compute_raw_hash(date, "-5.00", "KAWA", 1));
        assert_eq!(txs[1].raw_hash, compute_raw_hash(date, "-5.00", "KAWA", 2));

        let again = parse_statement(BankType::Santander, csv).unwrap();
        assert_eq!(txs, again, "Re-parsing must reproduce the same keys");
    }

    #[test]
    fn test_decode_statement_falls_back_to_cp1250() {
        // "księgowania" in Windows-1250: ę = 0xEA
        let bytes = b"Data ksi\xeagowania";
        assert_eq!(decode_statement(bytes), "Data księgowania");
        assert_eq!(decode_statement("zażółć".as_bytes()), "zażółć");
    }
}
