//! Deposit, withdraw and transfer over the per-entity locks.
//!
//! Every operation resolves its accounts before touching any lock, then
//! acquires what it needs in [`LockRank`](crate::lock_order::LockRank) order,
//! checks funds, mutates, and releases in reverse. Failure paths release
//! through the same guard drops as success paths.

use tracing::trace;

use crate::{
    account::{AccountAmount, AccountNumber, adjust, is_same_branch},
    ledger::Ledger,
    lock_order::OrderedPair,
};

use super::TellerError;

pub fn deposit(
    ledger: &Ledger,
    account: AccountNumber,
    amount: AccountAmount,
) -> Result<(), TellerError> {
    debug_assert!(amount >= 0);
    trace!(%account, amount, "deposit");

    let (branch, acc) = ledger
        .lookup(account)
        .ok_or(TellerError::AccountNotFound(account))?;

    let mut acc_guard = acc.lock();
    let mut branch_guard = branch.lock();

    adjust(&mut acc_guard, Some(&mut *branch_guard), amount);
    ledger.record_external(amount);
    ledger.record_reportable(amount);

    drop(branch_guard);
    drop(acc_guard);
    Ok(())
}

pub fn withdraw(
    ledger: &Ledger,
    account: AccountNumber,
    amount: AccountAmount,
) -> Result<(), TellerError> {
    debug_assert!(amount >= 0);
    trace!(%account, amount, "withdraw");

    let (branch, acc) = ledger
        .lookup(account)
        .ok_or(TellerError::AccountNotFound(account))?;

    let mut acc_guard = acc.lock();
    let mut branch_guard = branch.lock();

    if amount > *acc_guard {
        return Err(TellerError::InsufficientFunds {
            account,
            balance: *acc_guard,
            requested: amount,
        });
    }

    adjust(&mut acc_guard, Some(&mut *branch_guard), -amount);
    ledger.record_external(-amount);
    ledger.record_reportable(amount);

    drop(branch_guard);
    drop(acc_guard);
    Ok(())
}

pub fn transfer(
    ledger: &Ledger,
    src: AccountNumber,
    dst: AccountNumber,
    amount: AccountAmount,
) -> Result<(), TellerError> {
    debug_assert!(amount >= 0);
    trace!(%src, %dst, amount, "transfer");

    let (src_branch, src_acc) = ledger
        .lookup(src)
        .ok_or(TellerError::AccountNotFound(src))?;
    let (dst_branch, dst_acc) = ledger
        .lookup(dst)
        .ok_or(TellerError::AccountNotFound(dst))?;

    if src == dst {
        return Ok(());
    }

    let mut accounts = OrderedPair::lock(src_acc.balance_lock(), dst_acc.balance_lock());

    if is_same_branch(src, dst) {
        // net branch change is zero, so the branch lock is not needed
        let (src_balance, dst_balance) = accounts.split();
        if amount > *src_balance {
            return Err(TellerError::InsufficientFunds {
                account: src,
                balance: *src_balance,
                requested: amount,
            });
        }
        adjust(src_balance, None, -amount);
        adjust(dst_balance, None, amount);
        ledger.record_reportable(amount);
        return Ok(());
    }

    let mut branches = OrderedPair::lock(src_branch.balance_lock(), dst_branch.balance_lock());
    let (src_balance, dst_balance) = accounts.split();
    if amount > *src_balance {
        return Err(TellerError::InsufficientFunds {
            account: src,
            balance: *src_balance,
            requested: amount,
        });
    }
    let (src_branch_balance, dst_branch_balance) = branches.split();
    adjust(src_balance, Some(src_branch_balance), -amount);
    adjust(dst_balance, Some(dst_branch_balance), amount);
    ledger.record_reportable(amount);

    drop(branches);
    drop(accounts);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{ledger::LedgerConfig, lock_order::held_by_current_thread};

    use super::*;

    fn ledger() -> Ledger {
        Ledger::new(&LedgerConfig {
            branch_count: 2,
            accounts_per_branch: 2,
            initial_amount: 100,
            reporting_amount: 50,
            worker_count: 1,
        })
        .unwrap()
    }

    fn balance(ledger: &Ledger, branch: u32, offset: u32) -> AccountAmount {
        ledger
            .lookup(AccountNumber::new(branch, offset))
            .unwrap()
            .1
            .balance()
    }

    #[test]
    fn deposit_updates_account_and_branch() {
        let ledger = ledger();
        deposit(&ledger, AccountNumber::new(1, 0), 25).unwrap();
        assert_eq!(balance(&ledger, 1, 0), 125);
        assert_eq!(ledger.branch(1).unwrap().balance(), 225);
        assert_eq!(ledger.balance(), 425);
        assert_eq!(held_by_current_thread(), 0);
        ledger.validate().unwrap();
    }

    #[test]
    fn withdraw_more_than_balance() {
        let ledger = ledger();
        let acct = AccountNumber::new(0, 1);
        let err = withdraw(&ledger, acct, 150).unwrap_err();
        assert_eq!(
            err,
            TellerError::InsufficientFunds {
                account: acct,
                balance: 100,
                requested: 150,
            }
        );
        assert_eq!(balance(&ledger, 0, 1), 100);
        assert_eq!(held_by_current_thread(), 0);

        withdraw(&ledger, acct, 100).unwrap();
        assert_eq!(balance(&ledger, 0, 1), 0);
        assert_eq!(ledger.branch(0).unwrap().balance(), 100);
        ledger.validate().unwrap();
    }

    #[test]
    fn unknown_account_changes_nothing() {
        let ledger = ledger();
        let reference = self::ledger();
        let known = AccountNumber::new(0, 0);
        for unknown in [AccountNumber::new(2, 0), AccountNumber::new(0, 2)] {
            let not_found = TellerError::AccountNotFound(unknown);
            assert_eq!(deposit(&ledger, unknown, 1).unwrap_err(), not_found);
            assert_eq!(withdraw(&ledger, unknown, 1).unwrap_err(), not_found);
            assert_eq!(transfer(&ledger, unknown, known, 1).unwrap_err(), not_found);
            assert_eq!(transfer(&ledger, known, unknown, 1).unwrap_err(), not_found);
        }
        assert!(ledger.compare(&reference));
        ledger.validate().unwrap();
    }

    #[test]
    fn self_transfer_is_noop() {
        let ledger = ledger();
        let acct = AccountNumber::new(1, 1);
        transfer(&ledger, acct, acct, 0).unwrap();
        transfer(&ledger, acct, acct, 100).unwrap();
        // even when the account could not cover it
        transfer(&ledger, acct, acct, 1_000).unwrap();
        assert!(ledger.compare(&self::ledger()));
    }

    #[test]
    fn same_branch_transfer_keeps_branch_balance() {
        let ledger = ledger();
        // higher number to lower number exercises the swapped lock order
        transfer(&ledger, AccountNumber::new(0, 1), AccountNumber::new(0, 0), 40).unwrap();
        assert_eq!(balance(&ledger, 0, 0), 140);
        assert_eq!(balance(&ledger, 0, 1), 60);
        assert_eq!(ledger.branch(0).unwrap().balance(), 200);

        let err = transfer(&ledger, AccountNumber::new(0, 1), AccountNumber::new(0, 0), 61)
            .unwrap_err();
        assert!(matches!(err, TellerError::InsufficientFunds { balance: 60, .. }));
        assert_eq!(held_by_current_thread(), 0);
        ledger.validate().unwrap();
    }

    #[test]
    fn cross_branch_transfer_moves_branch_balances() {
        let ledger = ledger();
        transfer(&ledger, AccountNumber::new(1, 0), AccountNumber::new(0, 1), 30).unwrap();
        assert_eq!(balance(&ledger, 1, 0), 70);
        assert_eq!(balance(&ledger, 0, 1), 130);
        assert_eq!(ledger.branch(0).unwrap().balance(), 230);
        assert_eq!(ledger.branch(1).unwrap().balance(), 170);

        let err = transfer(&ledger, AccountNumber::new(1, 0), AccountNumber::new(0, 0), 71)
            .unwrap_err();
        assert!(matches!(
            err,
            TellerError::InsufficientFunds {
                balance: 70,
                requested: 71,
                ..
            }
        ));
        assert_eq!(held_by_current_thread(), 0);
        assert_eq!(ledger.balance(), 400);
        ledger.validate().unwrap();
    }
}
