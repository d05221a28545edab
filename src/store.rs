use crate::billing_calculator::{
    MeterReadingProvider, PaymentProvider, TariffProvider, first_covering,
};
use crate::error::StoreError;
use crate::records::{MeterReading, Payment, TariffPeriod, parse_date, parse_decimal};
use bigdecimal::BigDecimal;
use csv::StringRecord;
use jiff::civil::Date;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub type RowId = u64;

/// A record together with the identifier of the row it is stored in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<T> {
    pub id: RowId,
    pub record: T,
}

/// One CSV file per record type, the first column always being the row id.
pub trait TableRecord: Sized + Clone {
    const FILE_NAME: &'static str;
    const HEADERS: &'static [&'static str];

    /// Key lists are ordered by. Ties keep storage order.
    fn sort_key(&self) -> Date;
    fn to_fields(&self) -> Vec<String>;
    fn from_fields(fields: &[&str]) -> Result<Self, String>;
}

impl TableRecord for MeterReading {
    const FILE_NAME: &'static str = "meter_readings.csv";
    const HEADERS: &'static [&'static str] = &["id", "date", "value"];

    fn sort_key(&self) -> Date {
        self.date
    }

    fn to_fields(&self) -> Vec<String> {
        vec![self.date.to_string(), self.value.to_string()]
    }

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        Ok(Self {
            date: parse_date(fields[0]).map_err(|e| e.to_string())?,
            value: parse_decimal(fields[1]).map_err(|e| e.to_string())?,
        })
    }
}

impl TableRecord for Payment {
    const FILE_NAME: &'static str = "payments.csv";
    const HEADERS: &'static [&'static str] = &["id", "date", "amount"];

    fn sort_key(&self) -> Date {
        self.date
    }

    fn to_fields(&self) -> Vec<String> {
        vec![self.date.to_string(), self.amount.to_string()]
    }

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        Ok(Self {
            date: parse_date(fields[0]).map_err(|e| e.to_string())?,
            amount: parse_decimal(fields[1]).map_err(|e| e.to_string())?,
        })
    }
}

impl TableRecord for TariffPeriod {
    const FILE_NAME: &'static str = "tariff_periods.csv";
    const HEADERS: &'static [&'static str] = &[
        "id",
        "valid_from",
        "valid_to",
        "base_fee",
        "unit_price_cents",
    ];

    fn sort_key(&self) -> Date {
        self.valid_from
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            self.valid_from.to_string(),
            self.valid_to.to_string(),
            self.base_fee.to_string(),
            self.unit_price_cents.to_string(),
        ]
    }

    fn from_fields(fields: &[&str]) -> Result<Self, String> {
        Ok(Self {
            valid_from: parse_date(fields[0]).map_err(|e| e.to_string())?,
            valid_to: parse_date(fields[1]).map_err(|e| e.to_string())?,
            base_fee: parse_decimal(fields[2]).map_err(|e| e.to_string())?,
            unit_price_cents: parse_decimal(fields[3]).map_err(|e| e.to_string())?,
        })
    }
}

/// Directory of CSV tables. Holds no open handles: every operation opens the
/// files it needs and closes them before returning.
#[derive(Debug, Clone)]
pub struct CsvStore {
    root: PathBuf,
}

impl CsvStore {
    /// Opens an existing store. Fails if the directory is missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::NotInitialised(root));
        }
        Ok(Self { root })
    }

    /// Creates the directory and any missing table. Existing tables are kept.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        let store = Self { root };
        store.create_table::<MeterReading>()?;
        store.create_table::<Payment>()?;
        store.create_table::<TariffPeriod>()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path<T: TableRecord>(&self) -> PathBuf {
        self.root.join(T::FILE_NAME)
    }

    fn create_table<T: TableRecord>(&self) -> Result<(), StoreError> {
        let path = self.table_path::<T>();
        if path.exists() {
            debug!(path = %path.display(), "table already present");
            return Ok(());
        }
        write_rows::<T>(&path, &[])?;
        info!(path = %path.display(), "created table");
        Ok(())
    }

    /// All rows in storage order.
    fn read_rows<T: TableRecord>(&self) -> Result<Vec<Row<T>>, StoreError> {
        let path = self.table_path::<T>();
        let file = File::open(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file);
        let headers = reader
            .headers()
            .map_err(|source| StoreError::Csv {
                path: path.clone(),
                source,
            })?
            .clone();
        if headers != StringRecord::from(T::HEADERS.to_vec()) {
            return Err(StoreError::UnexpectedHeaders {
                path,
                found: headers.iter().map(str::to_string).collect(),
                expected: T::HEADERS.iter().map(|h| h.to_string()).collect(),
            });
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| StoreError::Csv {
                path: path.clone(),
                source,
            })?;
            let line = record.position().map_or(0, |p| p.line());
            let malformed = |reason: String| StoreError::MalformedRow {
                path: path.clone(),
                line,
                reason,
            };
            let fields: Vec<&str> = record.iter().collect();
            let id = fields[0]
                .parse::<RowId>()
                .map_err(|e| malformed(format!("invalid id {:?}: {e}", fields[0])))?;
            let record = T::from_fields(&fields[1..]).map_err(malformed)?;
            rows.push(Row { id, record });
        }
        debug!(path = %path.display(), rows = rows.len(), "read table");
        Ok(rows)
    }

    /// Rows ordered by their date key, optionally limited to `from..=to`.
    pub fn list<T: TableRecord>(
        &self,
        from: Option<Date>,
        to: Option<Date>,
    ) -> Result<Vec<Row<T>>, StoreError> {
        let mut rows: Vec<Row<T>> = self
            .read_rows::<T>()?
            .into_iter()
            .filter(|row| {
                let key = row.record.sort_key();
                from.is_none_or(|from| key >= from) && to.is_none_or(|to| key <= to)
            })
            .collect();
        rows.sort_by_key(|row| row.record.sort_key());
        Ok(rows)
    }

    /// Appends `record` and returns the id it was stored under.
    pub fn insert<T: TableRecord>(&self, record: &T) -> Result<RowId, StoreError> {
        let path = self.table_path::<T>();
        let id = self
            .read_rows::<T>()?
            .iter()
            .map(|row| row.id)
            .max()
            .unwrap_or(0)
            + 1;
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        let csv_err = |source: csv::Error| StoreError::Csv {
            path: path.clone(),
            source,
        };
        writer
            .write_record(row_fields(id, record))
            .map_err(csv_err)?;
        writer.flush().map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        info!(table = T::FILE_NAME, id, "inserted row");
        Ok(id)
    }

    /// Removes the row with `id`. Returns whether a row was removed.
    pub fn delete<T: TableRecord>(&self, id: RowId) -> Result<bool, StoreError> {
        let path = self.table_path::<T>();
        let rows = self.read_rows::<T>()?;
        let before = rows.len();
        let kept: Vec<Row<T>> = rows.into_iter().filter(|row| row.id != id).collect();
        if kept.len() == before {
            warn!(table = T::FILE_NAME, id, "no row to delete");
            return Ok(false);
        }
        let tmp = path.with_extension("csv.tmp");
        write_rows(&tmp, &kept)?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        info!(table = T::FILE_NAME, id, "deleted row");
        Ok(true)
    }

    /// Inserts a tariff period, warning about inverted bounds or overlaps.
    pub fn insert_tariff(&self, tariff: &TariffPeriod) -> Result<RowId, StoreError> {
        if tariff.valid_from > tariff.valid_to {
            warn!(
                valid_from = %tariff.valid_from,
                valid_to = %tariff.valid_to,
                "tariff period ends before it starts"
            );
        }
        for existing in self.list::<TariffPeriod>(None, None)? {
            if existing.record.overlaps(tariff) {
                warn!(
                    existing_id = existing.id,
                    existing_from = %existing.record.valid_from,
                    existing_to = %existing.record.valid_to,
                    "new tariff period overlaps an existing one"
                );
            }
        }
        self.insert(tariff)
    }
}

fn row_fields<T: TableRecord>(id: RowId, record: &T) -> Vec<String> {
    let mut fields = vec![id.to_string()];
    fields.extend(record.to_fields());
    fields
}

fn write_rows<T: TableRecord>(path: &Path, rows: &[Row<T>]) -> Result<(), StoreError> {
    let csv_err = |source: csv::Error| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(T::HEADERS).map_err(csv_err)?;
    for row in rows {
        writer
            .write_record(row_fields(row.id, &row.record))
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl MeterReadingProvider for CsvStore {
    fn read_up_to(&self, date: Date) -> Result<Vec<MeterReading>, StoreError> {
        Ok(self
            .list::<MeterReading>(None, Some(date))?
            .into_iter()
            .map(|row| row.record)
            .collect())
    }
}

impl PaymentProvider for CsvStore {
    fn sum_up_to(&self, date: Date) -> Result<BigDecimal, StoreError> {
        Ok(self
            .list::<Payment>(None, Some(date))?
            .into_iter()
            .map(|row| row.record.amount)
            .sum())
    }
}

impl TariffProvider for CsvStore {
    fn find_covering(&self, date: Date) -> Result<Option<TariffPeriod>, StoreError> {
        let periods = self
            .read_rows::<TariffPeriod>()?
            .into_iter()
            .map(|row| row.record)
            .collect();
        Ok(first_covering(periods, date))
    }
}
