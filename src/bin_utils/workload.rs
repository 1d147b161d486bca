use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    account::{AccountAmount, AccountNumber},
    command::TellerCommand,
    ledger::Ledger,
    teller::WorkerId,
};

/// Random teller traffic: a quarter deposits, a quarter withdrawals, half
/// transfers, of which half stay inside one branch.
#[derive(Debug)]
pub struct RandomWorkload {
    rng: StdRng,
    branches: u32,
    accounts_per_branch: u32,
    max_amount: AccountAmount,
}

impl RandomWorkload {
    pub fn new(seed: u64, worker: WorkerId, ledger: &Ledger, max_amount: AccountAmount) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed.wrapping_add(worker as u64)),
            branches: ledger.branches().len() as u32,
            accounts_per_branch: ledger.accounts_per_branch(),
            max_amount: max_amount.max(0),
        }
    }

    pub fn next_command(&mut self) -> TellerCommand {
        let amount = self.rng.gen_range(0..=self.max_amount);
        let branch = self.rng.gen_range(0..self.branches);
        let account = self.account_in(branch);
        match self.rng.gen_range(0..4) {
            0 => TellerCommand::Deposit { account, amount },
            1 => TellerCommand::Withdraw { account, amount },
            _ => {
                let dst_branch = if self.rng.gen_bool(0.5) {
                    account.branch()
                } else {
                    self.rng.gen_range(0..self.branches)
                };
                let dst = self.account_in(dst_branch);
                TellerCommand::Transfer {
                    src: account,
                    dst,
                    amount,
                }
            }
        }
    }

    fn account_in(&mut self, branch: u32) -> AccountNumber {
        AccountNumber::new(branch, self.rng.gen_range(0..self.accounts_per_branch))
    }
}

#[cfg(test)]
mod tests {
    use crate::ledger::LedgerConfig;

    use super::*;

    #[test]
    fn commands_stay_inside_the_ledger() {
        let ledger = Ledger::new(&LedgerConfig {
            branch_count: 3,
            accounts_per_branch: 5,
            ..Default::default()
        })
        .unwrap();
        let mut workload = RandomWorkload::new(7, 0, &ledger, 1_000);
        let mut transfers = 0;
        for _ in 0..1_000 {
            let cmd = workload.next_command();
            assert!((0..=1_000).contains(&cmd.amount()));
            let accounts = match cmd {
                TellerCommand::Deposit { account, .. } | TellerCommand::Withdraw { account, .. } => {
                    vec![account]
                }
                TellerCommand::Transfer { src, dst, .. } => {
                    transfers += 1;
                    vec![src, dst]
                }
            };
            for acc in accounts {
                assert!(ledger.lookup(acc).is_some(), "{acc}");
            }
        }
        assert!(transfers > 300);
    }

    #[test]
    fn transfers_mix_same_and_cross_branch() {
        let ledger = Ledger::new(&LedgerConfig {
            branch_count: 4,
            accounts_per_branch: 4,
            ..Default::default()
        })
        .unwrap();
        let mut workload = RandomWorkload::new(3, 0, &ledger, 100);
        let (mut same, mut cross) = (0, 0);
        for _ in 0..2_000 {
            if let TellerCommand::Transfer { src, dst, .. } = workload.next_command() {
                if src.branch() == dst.branch() {
                    same += 1;
                } else {
                    cross += 1;
                }
            }
        }
        assert!(same > 200, "{same}");
        assert!(cross > 200, "{cross}");
    }

    #[test]
    fn same_seed_same_traffic() {
        let ledger = Ledger::new(&LedgerConfig::default()).unwrap();
        let mut a = RandomWorkload::new(42, 1, &ledger, 500);
        let mut b = RandomWorkload::new(42, 1, &ledger, 500);
        let mut c = RandomWorkload::new(42, 2, &ledger, 500);
        let xs: Vec<_> = (0..50).map(|_| a.next_command()).collect();
        let ys: Vec<_> = (0..50).map(|_| b.next_command()).collect();
        let zs: Vec<_> = (0..50).map(|_| c.next_command()).collect();
        assert_eq!(xs, ys);
        assert_ne!(xs, zs);
    }
}
