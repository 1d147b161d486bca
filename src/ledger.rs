use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::{
    account::{Account, AccountAmount, AccountNumber, BranchIndex},
    barrier::{Arrival, DayBarrier, ReportWindow},
    branch::Branch,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub branch_count: u32,
    pub accounts_per_branch: u32,
    /// Opening balance of every account, in cents.
    pub initial_amount: AccountAmount,
    /// Operations at or above this amount are counted in the day report.
    pub reporting_amount: AccountAmount,
    pub worker_count: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            branch_count: 4,
            accounts_per_branch: 16,
            initial_amount: 100_000,
            reporting_amount: 50_000,
            worker_count: 4,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid ledger configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("Cannot allocate {count} {what}")]
    Allocation { what: &'static str, count: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsistencyViolation {
    #[error("Branch {branch} caches {cached} but its accounts sum to {computed}")]
    BranchMismatch {
        branch: BranchIndex,
        cached: AccountAmount,
        computed: AccountAmount,
    },
    #[error("Branches sum to {branches} but accounts sum to {accounts}")]
    BankMismatch {
        branches: AccountAmount,
        accounts: AccountAmount,
    },
    #[error("Bank holds {actual} but deposits and withdrawals imply {expected}")]
    Conservation {
        expected: AccountAmount,
        actual: AccountAmount,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayReport {
    pub day: u32,
    pub total: AccountAmount,
    pub branch_balances: Vec<AccountAmount>,
    pub reportable: u64,
}

/// Ownership root of every branch and account.
///
/// The branch array is fixed at construction, so only the per-entity locks
/// need coordination. Mutation happens in [`crate::teller`].
#[derive(Debug)]
pub struct Ledger {
    branches: Box<[Branch]>,
    accounts_per_branch: u32,
    worker_count: usize,
    reporting_amount: AccountAmount,
    initial_total: AccountAmount,
    external_flow: AtomicI64,
    reportable: AtomicU64,
    barrier: DayBarrier,
}

impl Ledger {
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        if config.branch_count == 0 {
            return Err(LedgerError::InvalidConfig("at least one branch is required"));
        }
        if config.accounts_per_branch == 0 {
            return Err(LedgerError::InvalidConfig(
                "at least one account per branch is required",
            ));
        }
        if config.worker_count == 0 {
            return Err(LedgerError::InvalidConfig("at least one worker is required"));
        }
        if config.initial_amount < 0 {
            return Err(LedgerError::InvalidConfig(
                "initial amount must not be negative",
            ));
        }
        let initial_total = (config.branch_count as i64)
            .checked_mul(config.accounts_per_branch as i64)
            .and_then(|n| n.checked_mul(config.initial_amount))
            .ok_or(LedgerError::InvalidConfig("initial bank total overflows"))?;

        let mut branches = Vec::new();
        branches
            .try_reserve_exact(config.branch_count as usize)
            .map_err(|_| LedgerError::Allocation {
                what: "branches",
                count: config.branch_count as usize,
            })?;
        for index in 0..config.branch_count {
            let mut accounts = Vec::new();
            accounts
                .try_reserve_exact(config.accounts_per_branch as usize)
                .map_err(|_| LedgerError::Allocation {
                    what: "accounts",
                    count: config.accounts_per_branch as usize,
                })?;
            accounts.extend((0..config.accounts_per_branch).map(|offset| {
                Account::new(AccountNumber::new(index, offset), config.initial_amount)
            }));
            branches.push(Branch::new(index, accounts.into_boxed_slice()));
        }

        info!(
            branches = config.branch_count,
            accounts_per_branch = config.accounts_per_branch,
            workers = config.worker_count,
            initial_total,
            "ledger initialized"
        );

        Ok(Self {
            branches: branches.into_boxed_slice(),
            accounts_per_branch: config.accounts_per_branch,
            worker_count: config.worker_count,
            reporting_amount: config.reporting_amount,
            initial_total,
            external_flow: AtomicI64::new(0),
            reportable: AtomicU64::new(0),
            barrier: DayBarrier::new(config.worker_count),
        })
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch(&self, index: BranchIndex) -> Option<&Branch> {
        self.branches.get(index as usize)
    }

    pub fn accounts_per_branch(&self) -> u32 {
        self.accounts_per_branch
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn reporting_amount(&self) -> AccountAmount {
        self.reporting_amount
    }

    pub fn initial_total(&self) -> AccountAmount {
        self.initial_total
    }

    pub fn barrier(&self) -> &DayBarrier {
        &self.barrier
    }

    /// Ends the calling worker's day. See [`DayBarrier::arrive`].
    pub fn end_of_day(&self) -> Arrival<'_> {
        self.barrier.arrive()
    }

    /// Resolves an account together with the branch that owns it.
    pub fn lookup(&self, number: AccountNumber) -> Option<(&Branch, &Account)> {
        let branch = self.branch(number.branch())?;
        let account = branch.account(number)?;
        Some((branch, account))
    }

    /// Snapshot of every balance in account-number order, one lock at a time.
    pub fn accounts(&self) -> impl Iterator<Item = (AccountNumber, AccountAmount)> + '_ {
        self.branches
            .iter()
            .flat_map(|b| b.accounts().iter())
            .map(|acc| (acc.number(), acc.balance()))
    }

    /// Bank-wide total from the cached branch balances.
    ///
    /// Only meaningful while no worker is mid-operation.
    pub fn balance(&self) -> AccountAmount {
        self.branches.iter().map(Branch::balance).sum()
    }

    /// Recomputes every aggregate from the accounts. Only meaningful while quiesced.
    pub fn validate(&self) -> Result<(), ConsistencyViolation> {
        let mut branches = 0;
        let mut accounts = 0;
        for branch in self.branches.iter() {
            let computed = branch.sum_of_accounts();
            let cached = branch.balance();
            if computed != cached {
                return Err(ConsistencyViolation::BranchMismatch {
                    branch: branch.index(),
                    cached,
                    computed,
                });
            }
            branches += cached;
            accounts += computed;
        }
        if branches != accounts {
            return Err(ConsistencyViolation::BankMismatch { branches, accounts });
        }
        let expected = self.initial_total + self.external_flow.load(Ordering::Acquire);
        if accounts != expected {
            return Err(ConsistencyViolation::Conservation {
                expected,
                actual: accounts,
            });
        }
        Ok(())
    }

    /// Structural equality of all branch and account balances.
    pub fn compare(&self, other: &Ledger) -> bool {
        self.branches.len() == other.branches.len()
            && self.branches.iter().zip(other.branches.iter()).all(|(a, b)| {
                a.accounts().len() == b.accounts().len()
                    && a.balance() == b.balance()
                    && a.accounts()
                        .iter()
                        .zip(b.accounts())
                        .all(|(x, y)| x.balance() == y.balance())
            })
    }

    /// Validates and summarizes the day that `window` closes, then resets
    /// the reportable counter for the next day.
    pub fn report(&self, window: &ReportWindow<'_>) -> Result<DayReport, ConsistencyViolation> {
        if let Err(err) = self.validate() {
            error!(day = window.day(), %err, "ledger is inconsistent");
            return Err(err);
        }
        let report = DayReport {
            day: window.day(),
            total: self.balance(),
            branch_balances: self.branches.iter().map(Branch::balance).collect(),
            reportable: self.reportable.swap(0, Ordering::AcqRel),
        };
        info!(
            day = report.day,
            total = report.total,
            reportable = report.reportable,
            "day closed"
        );
        Ok(report)
    }

    // Both of these are called while the operation's locks are still held.

    pub(crate) fn record_external(&self, delta: AccountAmount) {
        self.external_flow.fetch_add(delta, Ordering::AcqRel);
    }

    pub(crate) fn record_reportable(&self, amount: AccountAmount) {
        if amount >= self.reporting_amount {
            self.reportable.fetch_add(1, Ordering::Relaxed);
        }
    }
}
