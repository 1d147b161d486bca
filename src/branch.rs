use crate::{
    account::{Account, AccountAmount, AccountNumber, BranchIndex},
    lock_order::{LockRank, RankedGuard, RankedMutex},
};

/// A fixed, contiguous range of accounts sharing a cached aggregate balance.
///
/// `balance` equals the sum of the account balances whenever no operation
/// touching this branch is in flight.
#[derive(Debug)]
pub struct Branch {
    index: BranchIndex,
    accounts: Box<[Account]>,
    balance: RankedMutex<AccountAmount>,
}

impl Branch {
    pub(crate) fn new(index: BranchIndex, accounts: Box<[Account]>) -> Self {
        let total = accounts.iter().map(Account::balance).sum();
        Self {
            index,
            accounts,
            balance: RankedMutex::new(LockRank::Branch(index), total),
        }
    }

    pub fn index(&self) -> BranchIndex {
        self.index
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account(&self, number: AccountNumber) -> Option<&Account> {
        if number.branch() != self.index {
            return None;
        }
        self.accounts.get(number.offset() as usize)
    }

    pub fn lock(&self) -> RankedGuard<'_, AccountAmount> {
        self.balance.lock()
    }

    pub(crate) fn balance_lock(&self) -> &RankedMutex<AccountAmount> {
        &self.balance
    }

    /// Cached aggregate, read under the branch lock.
    pub fn balance(&self) -> AccountAmount {
        *self.balance.lock()
    }

    /// Sum of the accounts, each read under its own lock and never nested.
    pub fn sum_of_accounts(&self) -> AccountAmount {
        self.accounts.iter().map(Account::balance).sum()
    }
}
