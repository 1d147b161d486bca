use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Deserialize;
use thiserror::Error;

use crate::account::{AccountAmount, AccountNumber};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Transfer,
}

/// A validated request. Amounts are in cents and never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TellerCommand {
    Deposit {
        account: AccountNumber,
        amount: AccountAmount,
    },
    Withdraw {
        account: AccountNumber,
        amount: AccountAmount,
    },
    Transfer {
        src: AccountNumber,
        dst: AccountNumber,
        amount: AccountAmount,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Amount is required for {kind:?}")]
    AmountRequired { kind: TransactionKind },
    #[error("Amount must not be negative for {kind:?}")]
    NegativeAmount { kind: TransactionKind },
    #[error("Amount {amount} has more than two decimal places")]
    AmountPrecision { amount: Decimal },
    #[error("Amount {amount} is out of range")]
    AmountOutOfRange { amount: Decimal },
    #[error("Destination account is required for Transfer")]
    DestinationRequired,
}

impl TellerCommand {
    pub fn parse(
        kind: TransactionKind,
        account: AccountNumber,
        destination: Option<AccountNumber>,
        amount: Option<Decimal>,
    ) -> Result<Self, CommandError> {
        let amount = to_cents(kind, amount.ok_or(CommandError::AmountRequired { kind })?)?;
        match kind {
            TransactionKind::Deposit => Ok(Self::Deposit { account, amount }),
            TransactionKind::Withdrawal => Ok(Self::Withdraw { account, amount }),
            TransactionKind::Transfer => Ok(Self::Transfer {
                src: account,
                dst: destination.ok_or(CommandError::DestinationRequired)?,
                amount,
            }),
        }
    }

    pub fn amount(&self) -> AccountAmount {
        match *self {
            Self::Deposit { amount, .. }
            | Self::Withdraw { amount, .. }
            | Self::Transfer { amount, .. } => amount,
        }
    }
}

/// Converts a major-unit amount to cents.
pub fn to_cents(kind: TransactionKind, amount: Decimal) -> Result<AccountAmount, CommandError> {
    if amount < Decimal::ZERO {
        return Err(CommandError::NegativeAmount { kind });
    }
    let cents = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(CommandError::AmountOutOfRange { amount })?;
    if !cents.fract().is_zero() {
        return Err(CommandError::AmountPrecision { amount });
    }
    cents
        .to_i64()
        .ok_or(CommandError::AmountOutOfRange { amount })
}

/// Renders cents as a major-unit decimal with two places.
pub fn from_cents(cents: AccountAmount) -> Decimal {
    Decimal::new(cents, 2)
}
