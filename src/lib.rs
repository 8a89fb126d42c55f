// Household API - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod parser;     // Bank statement CSV parsing
pub mod planner;    // Weekly meal proposal
pub mod rules;      // Keyword → category import rules
pub mod seed;       // Starter meals and dictionaries
pub mod shopping;   // Shopping list aggregation

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod cleanup;

// Re-export commonly used types
pub use config::Settings;
pub use db::{open_db, open_db_in_memory, setup_database};
pub use error::{AppError, AppResult};
pub use parser::{decode_statement, parse_statement, BankType, StatementTransaction};
pub use rules::{KeywordRule, RuleEngine};
