//! Bootstraps [`branch_ledger`](crate) as a runnable simulation: reads a
//! teller script or generates random traffic, runs the worker pool day by
//! day, and prints CSV reports. The core types never depend on this module.

use std::{
    io::{Read, Write},
    thread,
};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    account::AccountAmount,
    barrier::Arrival,
    command::{CommandError, TellerCommand, from_cents},
    ledger::{ConsistencyViolation, DayReport, Ledger, LedgerConfig},
    teller::{Teller, TellerError, WorkerId},
};
use csv_parser::CsvTransactionParser;
use csv_printer::{BalanceRow, DayRow, print_rows};
use workload::RandomWorkload;

pub mod csv_parser;
pub mod csv_printer;
pub mod workload;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Cannot parse line {line}: {source}")]
    Parse { line: u64, source: csv::Error },
    #[error("Invalid command at line {line}: {source}")]
    Command { line: u64, source: CommandError },
    #[error("Worker {worker}: {source}")]
    Teller {
        worker: WorkerId,
        source: TellerError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub ledger: LedgerConfig,
    /// Ignored when running a script, which always takes a single day.
    pub days: u32,
    pub ops_per_day: usize,
    pub seed: u64,
    /// Upper bound for random amounts, in cents.
    pub max_amount: AccountAmount,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            days: 5,
            ops_per_day: 1_000,
            seed: 0,
            max_amount: 20_000,
        }
    }
}

enum WorkPlan {
    Script(Vec<TellerCommand>),
    Random(RandomWorkload),
}

impl WorkPlan {
    fn next_day(&mut self, ops: usize) -> Vec<TellerCommand> {
        match self {
            WorkPlan::Script(commands) => std::mem::take(commands),
            WorkPlan::Random(workload) => (0..ops).map(|_| workload.next_command()).collect(),
        }
    }
}

pub type ErrorPrinter<'w> = Box<dyn Fn(&ServiceError) + Send + Sync + 'w>;

pub struct Service<'w, R, W: 'w> {
    pub config: SimulationConfig,
    /// Random traffic is generated when no script is given.
    pub script: Option<R>,
    pub output: &'w mut W,
    pub error_printer: ErrorPrinter<'w>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub fn run(self) -> Result<Vec<DayReport>> {
        let Service {
            config,
            script,
            output,
            error_printer,
        } = self;

        let ledger = Ledger::new(&config.ledger).context("Failed to initialize the ledger")?;
        let workers = ledger.worker_count();
        let (plans, days) = match script {
            Some(input) => (script_plans(input, workers, &error_printer), 1),
            None => (
                (0..workers)
                    .map(|worker| {
                        WorkPlan::Random(RandomWorkload::new(
                            config.seed,
                            worker,
                            &ledger,
                            config.max_amount,
                        ))
                    })
                    .collect::<Vec<_>>(),
                config.days,
            ),
        };

        let ops_per_day = config.ops_per_day;
        let reports = Mutex::new(Vec::new());
        thread::scope(|s| {
            for (worker, mut plan) in plans.into_iter().enumerate() {
                let ledger = &ledger;
                let reports = &reports;
                let error_printer = &error_printer;
                s.spawn(move || {
                    let teller = Teller::new(ledger, worker);
                    for _ in 0..days {
                        for command in plan.next_day(ops_per_day) {
                            if let Err(source) = teller.execute(&command) {
                                error_printer(&ServiceError::Teller { worker, source });
                            }
                        }
                        if let Arrival::Report(window) = ledger.end_of_day() {
                            reports.lock().push(ledger.report(&window));
                        }
                    }
                    if let Some(window) = ledger.barrier().retire() {
                        reports.lock().push(ledger.report(&window));
                    }
                });
            }
        });

        let mut reports = reports.into_inner();
        reports.sort_by_key(|r: &Result<DayReport, ConsistencyViolation>| match r {
            Ok(report) => report.day,
            Err(_) => u32::MAX,
        });
        let (reports, violations): (Vec<_>, Vec<_>) = reports.into_iter().partition(Result::is_ok);
        let reports: Vec<DayReport> = reports.into_iter().flatten().collect();

        print_rows(
            &mut *output,
            reports.iter().map(|r| DayRow {
                day: r.day,
                total: from_cents(r.total),
                reportable: r.reportable,
            }),
        )?;
        print_rows(
            &mut *output,
            ledger.accounts().map(|(account, balance)| BalanceRow {
                account,
                balance: from_cents(balance),
            }),
        )?;

        if let Some(Err(violation)) = violations.into_iter().next() {
            return Err(violation).context("Ledger failed validation");
        }
        info!(days = reports.len(), total = ledger.balance(), "simulation finished");
        Ok(reports)
    }
}

fn script_plans<R: Read>(
    input: R,
    workers: usize,
    error_printer: &ErrorPrinter<'_>,
) -> Vec<WorkPlan> {
    let mut plans: Vec<Vec<TellerCommand>> = (0..workers).map(|_| Vec::new()).collect();
    let mut next = 0;
    for (line, row) in CsvTransactionParser::new(input) {
        let command = row
            .map_err(|source| ServiceError::Parse { line, source })
            .and_then(|tx| {
                TellerCommand::parse(tx.kind, tx.account, tx.destination, tx.amount)
                    .map_err(|source| ServiceError::Command { line, source })
            });
        match command {
            Ok(command) => {
                plans[next].push(command);
                next = (next + 1) % workers;
            }
            Err(err) => {
                warn!(%err, "skipping script line");
                error_printer(&err);
            }
        }
    }
    plans.into_iter().map(WorkPlan::Script).collect()
}
