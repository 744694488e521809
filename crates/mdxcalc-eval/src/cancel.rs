//! Cooperative cancellation, timeouts and phased cell loading
//!
//! Long loops call `Evaluator::check_cancel_or_timeout(i)` with their
//! iteration counter. The `CancellationChecker` decides from the configured
//! interval whether this iteration polls the shared `Execution`, which
//! fails with `Cancelled` or `Timeout` once the query should stop.
//!
//! Cell reads are batched: when enough requests are queued, evaluation
//! fails with `CalcError::QuantumExceeded`. `PhaseLoop::run` is the only
//! place that handles it; it loads the queued cells and runs the phase
//! again.

use crate::error::{CalcError, CalcResult};
use mdxcalc_model::CellReader;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// An iteration counter of any integer width.
///
/// Counters are widened before the modulo so a 64-bit counter keeps the
/// same cadence as a 32-bit one over the shared range.
pub trait IterationCounter: Copy {
    fn widen(self) -> i128;
}

macro_rules! impl_iteration_counter {
    ($($ty:ty),*) => {
        $(
            impl IterationCounter for $ty {
                fn widen(self) -> i128 {
                    i128::from(self)
                }
            }
        )*
    };
}

impl_iteration_counter!(u32, u64, i32, i64);

impl IterationCounter for usize {
    fn widen(self) -> i128 {
        // usize is at most 64 bits on supported targets
        self as i128
    }
}

/// Decides which iterations poll for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationChecker {
    interval: u64,
}

impl CancellationChecker {
    /// `interval` of 0 disables polling
    pub fn new(interval: u64) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Whether `iteration` is a polling point
    pub fn should_check<I: IterationCounter>(&self, iteration: I) -> bool {
        self.interval != 0 && iteration.widen().rem_euclid(i128::from(self.interval)) == 0
    }

    /// Poll `execution` if `iteration` is a polling point
    pub fn check_cancel_or_timeout<I: IterationCounter>(
        &self,
        iteration: I,
        execution: &Execution,
    ) -> CalcResult<()> {
        if self.should_check(iteration) {
            execution.check_cancel_or_timeout()
        } else {
            Ok(())
        }
    }
}

/// Shared state of one query execution: cancel flag, start time, timeout
#[derive(Debug)]
pub struct Execution {
    cancelled: Arc<AtomicBool>,
    start: Instant,
    timeout: Option<Duration>,
    checks: AtomicU64,
}

impl Execution {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            start: Instant::now(),
            timeout,
            checks: AtomicU64::new(0),
        }
    }

    /// An execution that never times out
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Check if the query has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Cancel the query
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Get a cancellation handle that can be used from another thread
    pub fn cancellation_handle(&self) -> CancellationHandle {
        CancellationHandle {
            cancelled: self.cancelled.clone(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// How many times this execution has been polled
    pub fn check_count(&self) -> u64 {
        self.checks.load(Ordering::Relaxed)
    }

    /// Fail if the query was cancelled or has run past its timeout
    pub fn check_cancel_or_timeout(&self) -> CalcResult<()> {
        self.checks.fetch_add(1, Ordering::Relaxed);
        if self.is_cancelled() {
            log::debug!("query canceled after {:?}", self.elapsed());
            return Err(CalcError::Cancelled);
        }
        if let Some(timeout) = self.timeout {
            if self.elapsed() > timeout {
                return Err(CalcError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        }
        Ok(())
    }
}

impl Default for Execution {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Handle for cancelling a query from another thread
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    /// Cancel the query
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check if the query has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Outcome of a phased run
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome<T> {
    pub value: T,
    /// Number of phases it took, at least 1
    pub phases: usize,
}

/// Runs a phase repeatedly until every cell it reads is loaded
#[derive(Debug, Clone, Copy)]
pub struct PhaseLoop {
    max_phases: usize,
}

impl PhaseLoop {
    pub fn new(max_phases: usize) -> Self {
        Self {
            max_phases: max_phases.max(1),
        }
    }

    /// Run `phase` until it completes with no cell requests outstanding.
    ///
    /// A phase that ends with `QuantumExceeded`, or that succeeds while
    /// requests are still queued, used placeholder cells; the queue is
    /// loaded and the phase runs again. Any other error is returned as is.
    pub fn run<T>(
        &self,
        reader: &dyn CellReader,
        mut phase: impl FnMut() -> CalcResult<T>,
    ) -> CalcResult<PhaseOutcome<T>> {
        for phase_no in 1..=self.max_phases {
            match phase() {
                Err(CalcError::QuantumExceeded) => {
                    log::debug!("phase {} stopped at cell quantum", phase_no);
                }
                Ok(value) if reader.pending_count() == 0 => {
                    return Ok(PhaseOutcome {
                        value,
                        phases: phase_no,
                    });
                }
                Ok(_) => {
                    log::debug!(
                        "phase {} finished with {} cells outstanding",
                        phase_no,
                        reader.pending_count()
                    );
                }
                Err(other) => return Err(other),
            }
            let loaded = reader.load_pending();
            log::trace!("loaded {} cells before phase {}", loaded, phase_no + 1);
        }
        Err(CalcError::internal(format!(
            "evaluation did not complete within {} phases",
            self.max_phases
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdxcalc_model::{CellLookup, MemberRef};
    use parking_lot::Mutex;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, false)]
    #[case(0, 5, false)]
    #[case(3, 0, true)]
    #[case(3, 4, false)]
    #[case(3, 6, true)]
    #[case(1, 17, true)]
    fn test_should_check(#[case] interval: u64, #[case] iteration: u64, #[case] expected: bool) {
        assert_eq!(CancellationChecker::new(interval).should_check(iteration), expected);
    }

    #[test]
    fn test_wide_counter_keeps_cadence() {
        let checker = CancellationChecker::new(7);
        for i in 0..200u32 {
            assert_eq!(checker.should_check(i), checker.should_check(u64::from(i)));
            assert_eq!(checker.should_check(i), checker.should_check(i64::from(i)));
        }
        let big = u64::from(u32::MAX) + 1;
        assert_eq!(checker.should_check(big), big % 7 == 0);
    }

    #[test]
    fn test_cancel_from_handle() {
        let execution = Execution::unbounded();
        let checker = CancellationChecker::new(2);
        let handle = execution.cancellation_handle();

        assert!(checker.check_cancel_or_timeout(0, &execution).is_ok());
        handle.cancel();
        assert!(checker.check_cancel_or_timeout(1, &execution).is_ok());
        assert_eq!(
            checker.check_cancel_or_timeout(2, &execution),
            Err(CalcError::Cancelled)
        );
        assert_eq!(execution.check_count(), 2);
    }

    #[test]
    fn test_timeout() {
        let execution = Execution::new(Some(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(
            execution.check_cancel_or_timeout(),
            Err(CalcError::Timeout { timeout_ms: 0 })
        );
    }

    /// Reader whose queue is filled by the test phase
    #[derive(Default)]
    struct QueueReader {
        pending: Mutex<usize>,
        loads: Mutex<usize>,
    }

    impl CellReader for QueueReader {
        fn get(&self, _: &[MemberRef]) -> CellLookup {
            *self.pending.lock() += 1;
            CellLookup::Pending
        }

        fn pending_count(&self) -> usize {
            *self.pending.lock()
        }

        fn load_pending(&self) -> usize {
            *self.loads.lock() += 1;
            std::mem::take(&mut *self.pending.lock())
        }
    }

    #[test]
    fn test_phase_loop_retries_after_quantum() {
        let reader = QueueReader::default();
        let mut calls = 0;
        let outcome = PhaseLoop::new(5)
            .run(&reader, || {
                calls += 1;
                if calls < 3 {
                    reader.get(&[]);
                    Err(CalcError::QuantumExceeded)
                } else {
                    Ok(42)
                }
            })
            .unwrap();
        assert_eq!(outcome, PhaseOutcome { value: 42, phases: 3 });
        assert_eq!(*reader.loads.lock(), 2);
    }

    #[test]
    fn test_phase_loop_reruns_when_cells_outstanding() {
        let reader = QueueReader::default();
        let mut calls = 0;
        let outcome = PhaseLoop::new(5)
            .run(&reader, || {
                calls += 1;
                if calls == 1 {
                    reader.get(&[]);
                }
                Ok(calls)
            })
            .unwrap();
        assert_eq!(outcome.value, 2);
    }

    #[test]
    fn test_phase_loop_gives_up() {
        let reader = QueueReader::default();
        let err = PhaseLoop::new(2)
            .run(&reader, || -> CalcResult<()> { Err(CalcError::QuantumExceeded) })
            .unwrap_err();
        assert!(matches!(err, CalcError::Internal { .. }));
    }

    #[test]
    fn test_phase_loop_propagates_errors() {
        let reader = QueueReader::default();
        let err = PhaseLoop::new(2)
            .run(&reader, || -> CalcResult<()> { Err(CalcError::Cancelled) })
            .unwrap_err();
        assert_eq!(err, CalcError::Cancelled);
    }
}
