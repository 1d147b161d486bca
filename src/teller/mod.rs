use thiserror::Error;
use tracing::debug;

use crate::{
    account::{AccountAmount, AccountNumber},
    command::TellerCommand,
    ledger::Ledger,
};

pub mod protocol;

pub use protocol::{deposit, transfer, withdraw};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TellerError {
    #[error("Account {0} does not exist")]
    AccountNotFound(AccountNumber),
    #[error("Insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountNumber,
        balance: AccountAmount,
        requested: AccountAmount,
    },
}

pub type WorkerId = usize;

/// A worker's handle on the shared ledger.
#[derive(Debug, Clone, Copy)]
pub struct Teller<'a> {
    ledger: &'a Ledger,
    worker: WorkerId,
}

impl<'a> Teller<'a> {
    pub fn new(ledger: &'a Ledger, worker: WorkerId) -> Self {
        Self { ledger, worker }
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn execute(&self, command: &TellerCommand) -> Result<(), TellerError> {
        let result = match *command {
            TellerCommand::Deposit { account, amount } => deposit(self.ledger, account, amount),
            TellerCommand::Withdraw { account, amount } => withdraw(self.ledger, account, amount),
            TellerCommand::Transfer { src, dst, amount } => {
                transfer(self.ledger, src, dst, amount)
            }
        };
        if let Err(err) = &result {
            debug!(worker = self.worker, ?command, %err, "operation rejected");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::ledger::LedgerConfig;

    use super::*;

    #[test]
    fn execute_dispatches_commands() {
        let ledger = Ledger::new(&LedgerConfig {
            branch_count: 2,
            accounts_per_branch: 1,
            initial_amount: 10,
            reporting_amount: 100,
            worker_count: 1,
        })
        .unwrap();
        let teller = Teller::new(&ledger, 3);
        let a = AccountNumber::new(0, 0);
        let b = AccountNumber::new(1, 0);

        teller
            .execute(&TellerCommand::Deposit { account: a, amount: 5 })
            .unwrap();
        teller
            .execute(&TellerCommand::Transfer {
                src: a,
                dst: b,
                amount: 15,
            })
            .unwrap();
        let err = teller
            .execute(&TellerCommand::Withdraw { account: a, amount: 1 })
            .unwrap_err();
        assert!(matches!(err, TellerError::InsufficientFunds { balance: 0, .. }));
        assert_eq!(
            err.to_string(),
            "Insufficient funds in account 0:0: balance 0, requested 1"
        );

        assert_eq!(teller.worker(), 3);
        assert_eq!(ledger.branch(1).unwrap().balance(), 25);
        ledger.validate().unwrap();
    }
}
