mod billing_calculator;
mod error;
mod logging;
mod records;
mod store;

use crate::billing_calculator::{calculate, money};
use crate::error::Error;
use crate::records::{MeterReading, Payment, RangePolicy, TariffPeriod, parse_date, parse_decimal};
use crate::store::{CsvStore, RowId, TableRecord};
use bigdecimal::BigDecimal;
use clap::{ArgAction, Args, Parser, Subcommand};
use jiff::Zoned;
use jiff::civil::{Date, date};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

/// Personal electricity billing helper.
/// Keeps meter readings, payments and tariff periods in a directory of CSV files,
/// and works out whether your payments cover what you have used over a period.
#[derive(Parser, Debug)]
#[command(version, long_about)]
struct MeterBalance {
    /// Directory holding the CSV tables.
    #[arg(
        long,
        global = true,
        env = "METER_BALANCE_DATA_DIR",
        default_value = "meter-data"
    )]
    data_dir: PathBuf,
    /// More log output on stderr. `RUST_LOG` overrides this.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the data directory and any missing tables.
    Init {
        /// Also insert a small set of example rows.
        #[arg(long)]
        sample_data: bool,
    },
    /// Manage meter readings.
    #[command(subcommand)]
    Reading(ReadingCommand),
    /// Manage payments.
    #[command(subcommand)]
    Payment(PaymentCommand),
    /// Manage tariff periods.
    #[command(subcommand)]
    Tariff(TariffCommand),
    /// Compute the balance of payments against consumption and base fee.
    Balance(BalanceArgs),
}

#[derive(Subcommand, Debug)]
enum ReadingCommand {
    Add {
        #[arg(value_parser = parse_date)]
        date: Date,
        /// Counter value in kWh. `,` is accepted as decimal separator.
        #[arg(value_parser = parse_decimal)]
        value: BigDecimal,
    },
    List(ListArgs),
    Delete { id: RowId },
}

#[derive(Subcommand, Debug)]
enum PaymentCommand {
    Add {
        #[arg(value_parser = parse_date)]
        date: Date,
        #[arg(value_parser = parse_decimal, allow_hyphen_values = true)]
        amount: BigDecimal,
    },
    List(ListArgs),
    Delete { id: RowId },
}

#[derive(Subcommand, Debug)]
enum TariffCommand {
    Add {
        #[arg(value_parser = parse_date)]
        valid_from: Date,
        #[arg(value_parser = parse_date)]
        valid_to: Date,
        /// Monthly base fee.
        #[arg(value_parser = parse_decimal)]
        base_fee: BigDecimal,
        /// Price per kWh, in cents.
        #[arg(value_parser = parse_decimal)]
        unit_price_cents: BigDecimal,
    },
    List(ListArgs),
    Delete { id: RowId },
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Only rows dated on or after this day.
    #[arg(long, value_parser = parse_date)]
    from: Option<Date>,
    /// Only rows dated on or before this day.
    #[arg(long, value_parser = parse_date)]
    to: Option<Date>,
}

#[derive(Args, Debug)]
struct BalanceArgs {
    #[arg(long, value_parser = parse_date)]
    start: Date,
    /// Defaults to today.
    #[arg(long, value_parser = parse_date)]
    end: Option<Date>,
    /// Reject an end date before the start date.
    #[arg(long)]
    strict: bool,
}

/// Everything a command needs, passed in explicitly rather than held globally.
struct App {
    data_dir: PathBuf,
}

impl App {
    fn run(&self, command: Command) -> Result<(), Error> {
        match command {
            Command::Init { sample_data } => self.init(sample_data),
            Command::Reading(ReadingCommand::Add { date, value }) => {
                self.add(&MeterReading { date, value })
            }
            Command::Reading(ReadingCommand::List(list)) => {
                for row in self.store()?.list::<MeterReading>(list.from, list.to)? {
                    println!("{}\t{}\t{}", row.id, row.record.date, row.record.value);
                }
                Ok(())
            }
            Command::Reading(ReadingCommand::Delete { id }) => self.delete::<MeterReading>(id),
            Command::Payment(PaymentCommand::Add { date, amount }) => {
                self.add(&Payment { date, amount })
            }
            Command::Payment(PaymentCommand::List(list)) => {
                for row in self.store()?.list::<Payment>(list.from, list.to)? {
                    println!(
                        "{}\t{}\t{}",
                        row.id,
                        row.record.date,
                        money(&row.record.amount)
                    );
                }
                Ok(())
            }
            Command::Payment(PaymentCommand::Delete { id }) => self.delete::<Payment>(id),
            Command::Tariff(TariffCommand::Add {
                valid_from,
                valid_to,
                base_fee,
                unit_price_cents,
            }) => {
                let id = self.store()?.insert_tariff(&TariffPeriod {
                    valid_from,
                    valid_to,
                    base_fee,
                    unit_price_cents,
                })?;
                println!("Saved as #{id}");
                Ok(())
            }
            Command::Tariff(TariffCommand::List(list)) => {
                for row in self.store()?.list::<TariffPeriod>(list.from, list.to)? {
                    let tariff = &row.record;
                    println!(
                        "{}\t{}\t{}\t{}\t{} ct/kWh",
                        row.id,
                        tariff.valid_from,
                        tariff.valid_to,
                        money(&tariff.base_fee),
                        tariff.unit_price_cents
                    );
                }
                Ok(())
            }
            Command::Tariff(TariffCommand::Delete { id }) => self.delete::<TariffPeriod>(id),
            Command::Balance(args) => self.balance(args),
        }
    }

    fn store(&self) -> Result<CsvStore, Error> {
        Ok(CsvStore::open(&self.data_dir)?)
    }

    fn init(&self, sample_data: bool) -> Result<(), Error> {
        let store = CsvStore::create(&self.data_dir)?;
        if sample_data {
            insert_sample_data(&store)?;
        }
        println!("Store ready at {}", store.root().display());
        Ok(())
    }

    fn add<T: TableRecord>(&self, record: &T) -> Result<(), Error> {
        let id = self.store()?.insert(record)?;
        println!("Saved as #{id}");
        Ok(())
    }

    fn delete<T: TableRecord>(&self, id: RowId) -> Result<(), Error> {
        if self.store()?.delete::<T>(id)? {
            println!("Deleted #{id}");
        } else {
            println!("Nothing to delete: no row #{id}");
        }
        Ok(())
    }

    fn balance(&self, args: BalanceArgs) -> Result<(), Error> {
        let end = args.end.unwrap_or_else(|| Zoned::now().date());
        let policy = if args.strict {
            RangePolicy::Strict
        } else {
            RangePolicy::Permissive
        };
        let range = policy.range(args.start, end)?;
        let store = self.store()?;
        let result = calculate(range, &store, &store, &store)?;
        println!("{result}");
        Ok(())
    }
}

fn insert_sample_data(store: &CsvStore) -> Result<(), Error> {
    store.insert_tariff(&TariffPeriod {
        valid_from: date(2024, 1, 1),
        valid_to: date(2024, 12, 31),
        base_fee: BigDecimal::from(10),
        unit_price_cents: BigDecimal::from(10),
    })?;
    for (day, value) in [
        (date(2024, 1, 1), 100),
        (date(2024, 2, 2), 200),
        (date(2024, 2, 15), 300),
        (date(2024, 2, 26), 400),
    ] {
        store.insert(&MeterReading {
            date: day,
            value: BigDecimal::from(value),
        })?;
    }
    for day in [date(2024, 1, 1), date(2024, 1, 3)] {
        store.insert(&Payment {
            date: day,
            amount: BigDecimal::from(30),
        })?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = MeterBalance::parse();
    logging::init(args.verbose);

    let app = App {
        data_dir: args.data_dir,
    };
    match app.run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        MeterBalance::command().debug_assert();
    }

    #[test]
    fn invalid_dates_are_rejected_by_the_parser() {
        let parsed = MeterBalance::try_parse_from([
            "meter-balance",
            "balance",
            "--start",
            "01.01.2024",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn payment_amount_accepts_decimal_comma() {
        let parsed =
            MeterBalance::try_parse_from(["meter-balance", "payment", "add", "2024-01-01", "30,5"])
                .unwrap();
        match parsed.command {
            Command::Payment(PaymentCommand::Add { date: day, amount }) => {
                assert_eq!(day, date(2024, 1, 1));
                assert_eq!(amount, "30.5".parse::<BigDecimal>().unwrap());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn balance_with_sample_data() {
        let dir = tempfile::tempdir().unwrap();
        let app = App {
            data_dir: dir.path().join("data"),
        };
        app.init(true).unwrap();
        let store = app.store().unwrap();
        let range = RangePolicy::Permissive
            .range(date(2024, 1, 1), date(2024, 2, 26))
            .unwrap();
        let result = calculate(range, &store, &store, &store).unwrap();
        assert_eq!(money(&result.balance), "11.00".parse::<BigDecimal>().unwrap());
    }

    #[test]
    fn strict_balance_rejects_reversed_range() {
        let dir = tempfile::tempdir().unwrap();
        let app = App {
            data_dir: dir.path().join("data"),
        };
        app.init(true).unwrap();
        let err = app
            .balance(BalanceArgs {
                start: date(2024, 2, 1),
                end: Some(date(2024, 1, 1)),
                strict: true,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Input(crate::error::InputError::ReversedRange { .. })
        ));
    }

    #[test]
    fn commands_fail_on_uninitialised_store() {
        let dir = tempfile::tempdir().unwrap();
        let app = App {
            data_dir: dir.path().join("nowhere"),
        };
        let err = app.delete::<Payment>(1).unwrap_err();
        assert!(matches!(
            err,
            Error::Store(crate::error::StoreError::NotInitialised(_))
        ));
    }
}
