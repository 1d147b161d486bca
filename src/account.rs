use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lock_order::{LockRank, RankedGuard, RankedMutex};

/// Balance in minor units (cents).
pub type AccountAmount = i64;

pub type BranchIndex = u32;

const OFFSET_BITS: u32 = 32;
const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;

/// Identifies an account across the whole ledger.
///
/// The owning branch lives in the high 32 bits and the offset inside the
/// branch in the low 32 bits, so numeric order is `(branch, offset)` order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(u64);

impl AccountNumber {
    pub const fn new(branch: BranchIndex, offset: u32) -> Self {
        Self(((branch as u64) << OFFSET_BITS) | offset as u64)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn branch(self) -> BranchIndex {
        branch_of(self)
    }

    pub const fn offset(self) -> u32 {
        offset_of(self)
    }
}

pub const fn branch_of(number: AccountNumber) -> BranchIndex {
    (number.0 >> OFFSET_BITS) as BranchIndex
}

pub const fn offset_of(number: AccountNumber) -> u32 {
    (number.0 & OFFSET_MASK) as u32
}

pub const fn is_same_branch(a: AccountNumber, b: AccountNumber) -> bool {
    branch_of(a) == branch_of(b)
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.branch(), self.offset())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{input}` is not an account number, expected `branch:offset`")]
pub struct ParseAccountNumberError {
    input: String,
}

impl FromStr for AccountNumber {
    type Err = ParseAccountNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseAccountNumberError {
            input: s.to_string(),
        };
        let (branch, offset) = s.trim().split_once(':').ok_or_else(err)?;
        let branch = branch.trim().parse().map_err(|_| err())?;
        let offset = offset.trim().parse().map_err(|_| err())?;
        Ok(Self::new(branch, offset))
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = ParseAccountNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountNumber> for String {
    fn from(value: AccountNumber) -> Self {
        value.to_string()
    }
}

/// Smallest unit of ledger state. The balance is only reachable through its lock.
#[derive(Debug)]
pub struct Account {
    number: AccountNumber,
    balance: RankedMutex<AccountAmount>,
}

impl Account {
    pub fn new(number: AccountNumber, balance: AccountAmount) -> Self {
        Self {
            number,
            balance: RankedMutex::new(LockRank::Account(number), balance),
        }
    }

    pub fn number(&self) -> AccountNumber {
        self.number
    }

    pub fn lock(&self) -> RankedGuard<'_, AccountAmount> {
        self.balance.lock()
    }

    pub(crate) fn balance_lock(&self) -> &RankedMutex<AccountAmount> {
        &self.balance
    }

    /// Reads the balance under its own lock.
    pub fn balance(&self) -> AccountAmount {
        *self.balance.lock()
    }
}

/// Applies `delta` to an account, and to its branch when the branch guard is supplied.
///
/// Borrowing both balances mutably means the caller already owns the
/// corresponding guards.
pub fn adjust(
    balance: &mut AccountAmount,
    branch_balance: Option<&mut AccountAmount>,
    delta: AccountAmount,
) {
    *balance += delta;
    if let Some(branch_balance) = branch_balance {
        *branch_balance += delta;
    }
}
