//! Every lock in the ledger carries a [`LockRank`], and every thread acquires
//! locks in strictly ascending rank. That single rule is what keeps
//! concurrent tellers out of circular waits.
//!
//! In debug builds a per-thread witness panics on the first out-of-order
//! acquisition, so a misordered call site fails its tests instead of
//! deadlocking occasionally.

use std::ops::{Deref, DerefMut};

use parking_lot::{Mutex, MutexGuard};

use crate::account::{AccountNumber, BranchIndex};

/// Position of a lockable entity in the global acquisition order.
///
/// All account locks rank below all branch locks. Accounts are ordered by
/// account number, which is `(branch, offset)` order, and branches by index.
/// The derived `Ord` is the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockRank {
    Account(AccountNumber),
    Branch(BranchIndex),
}

#[derive(Debug)]
pub struct RankedMutex<T> {
    rank: LockRank,
    inner: Mutex<T>,
}

impl<T> RankedMutex<T> {
    pub fn new(rank: LockRank, value: T) -> Self {
        Self {
            rank,
            inner: Mutex::new(value),
        }
    }

    pub fn rank(&self) -> LockRank {
        self.rank
    }

    /// Blocks until the lock is available.
    pub fn lock(&self) -> RankedGuard<'_, T> {
        witness::acquire(self.rank);
        RankedGuard {
            rank: self.rank,
            guard: self.inner.lock(),
        }
    }
}

pub struct RankedGuard<'a, T> {
    rank: LockRank,
    guard: MutexGuard<'a, T>,
}

impl<T> RankedGuard<'_, T> {
    pub fn rank(&self) -> LockRank {
        self.rank
    }
}

impl<T> Deref for RankedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for RankedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for RankedGuard<'_, T> {
    fn drop(&mut self) {
        witness::release(self.rank);
    }
}

/// Two locks of the same kind taken in rank order, released in reverse.
pub struct OrderedPair<'a, T> {
    // fields drop in declaration order
    later: RankedGuard<'a, T>,
    earlier: RankedGuard<'a, T>,
    swapped: bool,
}

impl<'a, T> OrderedPair<'a, T> {
    /// Locks `a` and `b` lowest rank first, whichever argument that is.
    pub fn lock(a: &'a RankedMutex<T>, b: &'a RankedMutex<T>) -> Self {
        debug_assert_ne!(a.rank, b.rank, "a pair needs two distinct locks");
        if a.rank < b.rank {
            let earlier = a.lock();
            let later = b.lock();
            Self {
                later,
                earlier,
                swapped: false,
            }
        } else {
            let earlier = b.lock();
            let later = a.lock();
            Self {
                later,
                earlier,
                swapped: true,
            }
        }
    }

    /// Guarded values in the argument order given to [`OrderedPair::lock`].
    pub fn split(&mut self) -> (&mut T, &mut T) {
        if self.swapped {
            (&mut self.later, &mut self.earlier)
        } else {
            (&mut self.earlier, &mut self.later)
        }
    }

    pub fn ranks(&self) -> (LockRank, LockRank) {
        (self.earlier.rank, self.later.rank)
    }
}

/// Number of ranked locks the current thread holds. Always zero in release builds.
pub fn held_by_current_thread() -> usize {
    witness::held()
}

#[cfg(debug_assertions)]
mod witness {
    use std::cell::RefCell;

    use super::LockRank;

    thread_local! {
        static HELD: RefCell<Vec<LockRank>> = const { RefCell::new(Vec::new()) };
    }

    pub fn acquire(rank: LockRank) {
        HELD.with_borrow_mut(|held| {
            if let Some(last) = held.last() {
                assert!(
                    rank > *last,
                    "lock order violation: acquiring {rank:?} while holding {last:?}"
                );
            }
            held.push(rank);
        });
    }

    pub fn release(rank: LockRank) {
        HELD.with_borrow_mut(|held| {
            if let Some(pos) = held.iter().rposition(|r| *r == rank) {
                held.remove(pos);
            }
        });
    }

    pub fn held() -> usize {
        HELD.with_borrow(|held| held.len())
    }
}

#[cfg(not(debug_assertions))]
mod witness {
    use super::LockRank;

    #[inline(always)]
    pub fn acquire(_rank: LockRank) {}

    #[inline(always)]
    pub fn release(_rank: LockRank) {}

    pub fn held() -> usize {
        0
    }
}
