/// Account numbers, balances and the `adjust` primitive.
/// Each account owns the lock guarding its balance.
pub mod account;

/// Fixed groups of accounts with a cached aggregate balance.
pub mod branch;

/// The global lock acquisition order. Every lock in the ledger is ranked,
/// and debug builds check that each thread acquires in ascending rank.
pub mod lock_order;

/// Ownership root for all branches: lookup, aggregation and validation.
pub mod ledger;

/// Day-boundary barrier for the worker pool, modelled as an explicit
/// phase state machine.
pub mod barrier;

/// Caller-side validation of raw transaction requests into [`command::TellerCommand`].
pub mod command;

/// Deposit, withdraw and transfer: the deadlock-free locking protocol.
pub mod teller;

/// Runs the ledger as a simulation with a pool of tellers.
/// Lives in the library so integration tests can drive it.
pub mod bin_utils;
