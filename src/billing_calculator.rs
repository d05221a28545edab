use crate::error::{BillingError, StoreError};
use crate::records::{DateRange, MeterReading, Payment, TariffPeriod};
use bigdecimal::{BigDecimal, RoundingMode};
use jiff::civil::Date;
use std::fmt;
use tracing::{debug, warn};

/// Days in the month used to pro-rate the base fee. Not calendar aware.
const BASE_FEE_MONTH_DAYS: i64 = 30;

pub trait MeterReadingProvider {
    /// Readings dated on or before `date`, ascending by date.
    fn read_up_to(&self, date: Date) -> Result<Vec<MeterReading>, StoreError>;
}

pub trait PaymentProvider {
    /// Sum of payments dated on or before `date`, zero when there are none.
    fn sum_up_to(&self, date: Date) -> Result<BigDecimal, StoreError>;
}

pub trait TariffProvider {
    /// First period by ascending `valid_from` whose bounds include `date`.
    fn find_covering(&self, date: Date) -> Result<Option<TariffPeriod>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceResult {
    pub days_in_range: i64,
    pub consumption_kwh: BigDecimal,
    pub consumption_cost: BigDecimal,
    pub base_fee_total: BigDecimal,
    pub total_cost: BigDecimal,
    pub total_paid: BigDecimal,
    pub balance: BigDecimal,
}

pub fn calculate<R, P, T>(
    range: DateRange,
    readings: &R,
    payments: &P,
    tariffs: &T,
) -> Result<BalanceResult, BillingError>
where
    R: MeterReadingProvider + ?Sized,
    P: PaymentProvider + ?Sized,
    T: TariffProvider + ?Sized,
{
    let readings = readings.read_up_to(range.end)?;
    let consumption_kwh = match (readings.first(), readings.last()) {
        (Some(first), Some(last)) => &last.value - &first.value,
        _ => BigDecimal::from(0),
    };

    let total_paid = payments.sum_up_to(range.end)?;

    let tariff = tariffs
        .find_covering(range.end)?
        .ok_or(BillingError::MissingTariffData { date: range.end })?;

    let consumption_cost = &consumption_kwh * &tariff.unit_price_cents / &BigDecimal::from(100);
    let daily_base_fee = &tariff.base_fee / &BigDecimal::from(BASE_FEE_MONTH_DAYS);
    let days_in_range = range.days_in_range();
    let base_fee_total = daily_base_fee * BigDecimal::from(days_in_range);
    let total_cost = &consumption_cost + &base_fee_total;
    let balance = &total_paid - &total_cost;

    debug!(
        start = %range.start,
        end = %range.end,
        readings = readings.len(),
        days_in_range,
        "calculated balance"
    );

    Ok(BalanceResult {
        days_in_range,
        consumption_kwh,
        consumption_cost,
        base_fee_total,
        total_cost,
        total_paid,
        balance,
    })
}

/// Two-decimal display value, rounded half-up.
pub fn money(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

impl fmt::Display for BalanceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "1. Days in period: {}", self.days_in_range)?;
        writeln!(f, "2. Consumption: {} kWh", self.consumption_kwh)?;
        writeln!(f, "3. Consumption cost: {}", money(&self.consumption_cost))?;
        writeln!(f, "4. Base fee total: {}", money(&self.base_fee_total))?;
        writeln!(f, "5. Total cost: {}", money(&self.total_cost))?;
        writeln!(f, "6. Total paid: {}", money(&self.total_paid))?;
        write!(f, "7. Balance: {}", money(&self.balance))
    }
}

impl MeterReadingProvider for [MeterReading] {
    fn read_up_to(&self, date: Date) -> Result<Vec<MeterReading>, StoreError> {
        let mut readings: Vec<MeterReading> =
            self.iter().filter(|r| r.date <= date).cloned().collect();
        readings.sort_by_key(|r| r.date);
        Ok(readings)
    }
}

impl PaymentProvider for [Payment] {
    fn sum_up_to(&self, date: Date) -> Result<BigDecimal, StoreError> {
        Ok(self
            .iter()
            .filter(|p| p.date <= date)
            .map(|p| &p.amount)
            .sum())
    }
}

impl TariffProvider for [TariffPeriod] {
    fn find_covering(&self, date: Date) -> Result<Option<TariffPeriod>, StoreError> {
        Ok(first_covering(self.iter().cloned().collect(), date))
    }
}

/// Stable sort by `valid_from`, then first match. Overlaps are logged, not resolved.
pub(crate) fn first_covering(mut periods: Vec<TariffPeriod>, date: Date) -> Option<TariffPeriod> {
    periods.sort_by_key(|t| t.valid_from);
    let mut covering = periods.into_iter().filter(|t| t.covers(date));
    let first = covering.next()?;
    let others = covering.count();
    if others > 0 {
        warn!(
            %date,
            chosen_from = %first.valid_from,
            chosen_to = %first.valid_to,
            others,
            "overlapping tariff periods, using the earliest"
        );
    }
    Some(first)
}
