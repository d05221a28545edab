use jiff::civil::Date;
use std::path::PathBuf;
use thiserror::Error;

/// Raw user input that could not be turned into a date, a number or a range.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("invalid date {input:?}, expected YYYY-MM-DD")]
    InvalidDate {
        input: String,
        #[source]
        source: jiff::Error,
    },
    #[error("invalid number {input:?}")]
    InvalidNumber {
        input: String,
        #[source]
        source: bigdecimal::ParseBigDecimalError,
    },
    #[error("end date {end} is before start date {start}")]
    ReversedRange { start: Date, end: Date },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store at {0} is not initialised, run `init` first")]
    NotInitialised(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("unexpected headers in {path}: {found:?}, expected {expected:?}")]
    UnexpectedHeaders {
        path: PathBuf,
        found: Vec<String>,
        expected: Vec<String>,
    },
    #[error("malformed row in {path} at line {line}: {reason}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("no tariff period covers {date}")]
    MissingTariffData { date: Date },
    #[error("data access failed: {0}")]
    DataAccess(#[from] StoreError),
}

/// Anything a single command can fail with. None of these end the session
/// in a bad state: the store is left as it was before the failing command.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Billing(#[from] BillingError),
}
