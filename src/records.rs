use crate::error::InputError;
use bigdecimal::BigDecimal;
use jiff::civil::Date;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A cumulative counter value read off the meter on `date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterReading {
    pub date: Date,
    pub value: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub date: Date,
    pub amount: BigDecimal,
}

/// Pricing in effect from `valid_from` to `valid_to`, both inclusive.
/// The base fee is monthly, the unit price is in cents per kWh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffPeriod {
    pub valid_from: Date,
    pub valid_to: Date,
    pub base_fee: BigDecimal,
    pub unit_price_cents: BigDecimal,
}

impl TariffPeriod {
    pub fn covers(&self, date: Date) -> bool {
        self.valid_from <= date && date <= self.valid_to
    }

    pub fn overlaps(&self, other: &TariffPeriod) -> bool {
        self.valid_from <= other.valid_to && other.valid_from <= self.valid_to
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl DateRange {
    /// Both endpoints count. A reversed range gives zero or a negative count.
    pub fn days_in_range(&self) -> i64 {
        i64::from((self.end - self.start).get_days()) + 1
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RangePolicy {
    #[default]
    Permissive,
    Strict,
}

impl RangePolicy {
    pub fn range(self, start: Date, end: Date) -> Result<DateRange, InputError> {
        if self == RangePolicy::Strict && end < start {
            return Err(InputError::ReversedRange { start, end });
        }
        Ok(DateRange { start, end })
    }
}

pub fn parse_date(input: &str) -> Result<Date, InputError> {
    Date::strptime(DATE_FORMAT, input.trim()).map_err(|source| InputError::InvalidDate {
        input: input.to_string(),
        source,
    })
}

/// Accepts either `.` or `,` as the decimal separator.
pub fn parse_decimal(input: &str) -> Result<BigDecimal, InputError> {
    let normalized = input.trim().replace(',', ".");
    BigDecimal::from_str(&normalized).map_err(|source| InputError::InvalidNumber {
        input: input.to_string(),
        source,
    })
}
