//! Single-assignment, observe-many completion primitive.
//!
//! A [`CompletionCell`] coordinates a result that may not exist yet.
//! Consumers register success/failure observers before or after the cell
//! resolves; the cell resolves at most once, with either a success or a
//! failure value. Observers registered after resolution fire immediately
//! with the stored outcome; observers registered before resolution fire in
//! registration order, exactly once, when resolution occurs.
//!
//! There is no timeout and no cancellation: a cell that never resolves
//! simply never fires. Keeping resolution live is the producer's
//! responsibility, not the cell's.

use parking_lot::Mutex;
use std::fmt;

type SuccessObserver<T> = Box<dyn FnOnce(T) + Send + 'static>;
type FailureObserver<E> = Box<dyn FnOnce(E) + Send + 'static>;

enum CellState<T, E> {
    Unresolved {
        on_success: Vec<SuccessObserver<T>>,
        on_failure: Vec<FailureObserver<E>>,
    },
    Succeeded(T),
    Failed(E),
}

/// A completion cell: resolves at most once, observed many times.
///
/// Values are `Clone` so every observer receives the stored outcome.
/// Resolving an already-resolved cell is an idempotent no-op (logged at
/// `warn` level) — observers never re-fire with new data.
///
/// Observer callbacks always run outside the internal lock: resolution
/// swaps the state first, then drains the observer list, so an observer may
/// itself register observers or complete other cells without deadlocking.
///
/// # Example
///
/// ```
/// use amphi_aroundware::CompletionCell;
///
/// let cell: CompletionCell<u32, String> = CompletionCell::new();
/// cell.on_success(|value| assert_eq!(value, 7));
/// cell.succeed(7);
/// assert!(cell.is_resolved());
/// ```
pub struct CompletionCell<T, E> {
    state: Mutex<CellState<T, E>>,
}

impl<T, E> CompletionCell<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates an unresolved cell.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CellState::Unresolved {
                on_success: Vec::new(),
                on_failure: Vec::new(),
            }),
        }
    }

    /// Resolves the cell with the given outcome.
    pub fn resolve(&self, outcome: Result<T, E>) {
        match outcome {
            Ok(value) => self.succeed(value),
            Err(error) => self.fail(error),
        }
    }

    /// Resolves the cell as a success, firing pending success observers in
    /// registration order. Pending failure observers are discarded.
    pub fn succeed(&self, value: T) {
        let observers = {
            let mut state = self.state.lock();
            match &mut *state {
                CellState::Unresolved { on_success, .. } => {
                    let observers = std::mem::take(on_success);
                    *state = CellState::Succeeded(value.clone());
                    Some(observers)
                }
                _ => None,
            }
        };

        match observers {
            Some(observers) => {
                tracing::trace!(observers = observers.len(), "completion cell succeeded");
                for observer in observers {
                    observer(value.clone());
                }
            }
            None => tracing::warn!("completion cell already resolved; ignoring success"),
        }
    }

    /// Resolves the cell as a failure, firing pending failure observers in
    /// registration order. Pending success observers are discarded.
    pub fn fail(&self, error: E) {
        let observers = {
            let mut state = self.state.lock();
            match &mut *state {
                CellState::Unresolved { on_failure, .. } => {
                    let observers = std::mem::take(on_failure);
                    *state = CellState::Failed(error.clone());
                    Some(observers)
                }
                _ => None,
            }
        };

        match observers {
            Some(observers) => {
                tracing::trace!(observers = observers.len(), "completion cell failed");
                for observer in observers {
                    observer(error.clone());
                }
            }
            None => tracing::warn!("completion cell already resolved; ignoring failure"),
        }
    }

    /// Registers a success observer.
    ///
    /// Fires immediately (synchronously, before this call returns) if the
    /// cell already succeeded; never fires if the cell failed.
    pub fn on_success(&self, observer: impl FnOnce(T) + Send + 'static) {
        let observer: SuccessObserver<T> = Box::new(observer);
        let fire = {
            let mut state = self.state.lock();
            match &mut *state {
                CellState::Unresolved { on_success, .. } => {
                    on_success.push(observer);
                    None
                }
                CellState::Succeeded(value) => Some((observer, value.clone())),
                CellState::Failed(_) => None,
            }
        };
        if let Some((observer, value)) = fire {
            observer(value);
        }
    }

    /// Registers a failure observer.
    ///
    /// Fires immediately (synchronously, before this call returns) if the
    /// cell already failed; never fires if the cell succeeded.
    pub fn on_failure(&self, observer: impl FnOnce(E) + Send + 'static) {
        let observer: FailureObserver<E> = Box::new(observer);
        let fire = {
            let mut state = self.state.lock();
            match &mut *state {
                CellState::Unresolved { on_failure, .. } => {
                    on_failure.push(observer);
                    None
                }
                CellState::Failed(error) => Some((observer, error.clone())),
                CellState::Succeeded(_) => None,
            }
        };
        if let Some((observer, error)) = fire {
            observer(error);
        }
    }

    /// Returns `true` once the cell has resolved, either way.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(&*self.state.lock(), CellState::Unresolved { .. })
    }
}

impl<T, E> Default for CompletionCell<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for CompletionCell<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.lock() {
            CellState::Unresolved { .. } => "unresolved",
            CellState::Succeeded(_) => "succeeded",
            CellState::Failed(_) => "failed",
        };
        f.debug_struct("CompletionCell").field("state", &state).finish()
    }
}
