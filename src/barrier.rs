//! Day-boundary barrier for the teller pool.
//!
//! Workers arrive between operations, never inside one. Once every active
//! worker has arrived the ledger is quiesced, and the last one to arrive is
//! handed a [`ReportWindow`]. All other workers stay blocked until that
//! window is dropped.

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No worker has finished the current day yet.
    Running,
    /// Some, but not all, active workers are waiting at the boundary.
    Quiescing,
    /// Every active worker is parked and a report window is open.
    Reporting,
    /// The next day has started and parked workers are still waking up.
    Resuming,
}

#[derive(Debug)]
struct State {
    phase: Phase,
    day: u32,
    active: usize,
    arrived: usize,
    waking: usize,
}

#[derive(Debug)]
pub struct DayBarrier {
    state: Mutex<State>,
    changed: Condvar,
}

pub enum Arrival<'a> {
    /// This worker is the reporter for the day that just ended.
    Report(ReportWindow<'a>),
    /// Another worker reported; `day` is the day now running.
    Resumed { day: u32 },
}

impl DayBarrier {
    pub fn new(workers: usize) -> Self {
        Self {
            state: Mutex::new(State {
                phase: Phase::Running,
                day: 0,
                active: workers,
                arrived: 0,
                waking: 0,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn day(&self) -> u32 {
        self.state.lock().day
    }

    pub fn active_workers(&self) -> usize {
        self.state.lock().active
    }

    /// Marks the calling worker as done with the current day and blocks
    /// until the day's report has been taken.
    pub fn arrive(&self) -> Arrival<'_> {
        let mut state = self.state.lock();
        self.wait_while_resuming(&mut state);

        state.arrived += 1;
        let day = state.day;
        if state.arrived >= state.active {
            state.phase = Phase::Reporting;
            trace!(day, workers = state.arrived, "day quiesced");
            return Arrival::Report(ReportWindow {
                barrier: self,
                day,
                waiters: state.arrived - 1,
            });
        }

        state.phase = Phase::Quiescing;
        while state.day == day {
            self.changed.wait(&mut state);
        }
        state.waking -= 1;
        if state.waking == 0 {
            state.phase = Phase::Running;
            self.changed.notify_all();
        }
        Arrival::Resumed { day: state.day }
    }

    /// Removes the calling worker from the pool.
    ///
    /// If everyone still active is already parked, the retiring worker
    /// becomes the reporter for the current day.
    pub fn retire(&self) -> Option<ReportWindow<'_>> {
        let mut state = self.state.lock();
        self.wait_while_resuming(&mut state);

        state.active = state.active.saturating_sub(1);
        if state.arrived > 0 && state.arrived >= state.active {
            state.phase = Phase::Reporting;
            return Some(ReportWindow {
                barrier: self,
                day: state.day,
                waiters: state.arrived,
            });
        }
        None
    }

    fn wait_while_resuming(&self, state: &mut MutexGuard<'_, State>) {
        while state.phase == Phase::Resuming {
            self.changed.wait(state);
        }
    }

    fn resume(&self, waiters: usize) {
        let mut state = self.state.lock();
        state.day += 1;
        state.arrived = 0;
        state.waking = waiters;
        state.phase = if waiters == 0 {
            Phase::Running
        } else {
            Phase::Resuming
        };
        trace!(day = state.day, waiters, "day resumed");
        self.changed.notify_all();
    }
}

/// Proof that no worker is mid-operation. The next day starts on drop.
pub struct ReportWindow<'a> {
    barrier: &'a DayBarrier,
    day: u32,
    waiters: usize,
}

impl ReportWindow<'_> {
    pub fn day(&self) -> u32 {
        self.day
    }
}

impl Drop for ReportWindow<'_> {
    fn drop(&mut self) {
        self.barrier.resume(self.waiters);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn single_worker_reports_every_day() {
        let barrier = DayBarrier::new(1);
        for day in 0..3 {
            let Arrival::Report(window) = barrier.arrive() else {
                panic!("lone worker must report");
            };
            assert_eq!(window.day(), day);
            assert_eq!(barrier.phase(), Phase::Reporting);
            drop(window);
            assert_eq!(barrier.phase(), Phase::Running);
        }
        assert_eq!(barrier.day(), 3);
    }

    #[test]
    fn one_reporter_per_day_across_workers() {
        const WORKERS: usize = 4;
        const DAYS: u32 = 20;
        let barrier = DayBarrier::new(WORKERS);
        let reports = AtomicUsize::new(0);
        let in_day = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..WORKERS {
                s.spawn(|| {
                    for _ in 0..DAYS {
                        in_day.fetch_add(1, Ordering::SeqCst);
                        in_day.fetch_sub(1, Ordering::SeqCst);
                        if let Arrival::Report(window) = barrier.arrive() {
                            assert_eq!(in_day.load(Ordering::SeqCst), 0);
                            reports.fetch_add(1, Ordering::SeqCst);
                            drop(window);
                        }
                    }
                    assert!(barrier.retire().is_none());
                });
            }
        });

        assert_eq!(reports.load(Ordering::SeqCst), DAYS as usize);
        assert_eq!(barrier.day(), DAYS);
        assert_eq!(barrier.active_workers(), 0);
        assert_eq!(barrier.phase(), Phase::Running);
    }

    #[test]
    fn retiring_worker_reports_for_parked_peers() {
        let barrier = DayBarrier::new(2);
        std::thread::scope(|s| {
            let parked = s.spawn(|| barrier.arrive());
            while barrier.phase() != Phase::Quiescing {
                std::thread::yield_now();
            }
            let window = barrier.retire().expect("peer is parked");
            assert_eq!(window.day(), 0);
            drop(window);
            assert!(matches!(parked.join().unwrap(), Arrival::Resumed { day: 1 }));
        });
        assert_eq!(barrier.active_workers(), 1);
        assert_eq!(barrier.phase(), Phase::Running);
    }
}
