use crate::handoff::{self, Consumer, Producer};
use crate::step::{Settle, Shape, Step};
use std::{error::Error as StdError, fmt, thread, time::Duration};
use tracing::{debug, trace};

/// The value/error pair a chain ends with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled<T, E> {
    pub value: T,
    pub error: Option<E>,
}

impl<T, E> Settled<T, E> {
    pub fn into_parts(self) -> (T, Option<E>) {
        (self.value, self.error)
    }

    /// An error wins over the value, however the chain got there.
    pub fn into_result(self) -> Result<T, E> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

/// A synchronous promise chain.
///
/// Every operation runs on the calling thread before it returns. Once the chain
/// is rejected, `then` steps are skipped until `finally`; the first `catch` or
/// `catch_case` consumes the single chance to handle the error.
///
/// # Examples
///
/// ```
/// use promise_chain::{Promise, Step};
/// use std::thread;
///
/// let mut promise = Promise::<i32, std::fmt::Error>::new(0);
/// let consumer = promise.channel();
/// let task1 = thread::spawn(move || {
///     promise
///         .then(Step::map(|v| Ok(v + 1)))
///         .then(Step::map(|v| Ok(v + 2)))
///         .finally(|_, _| {})
/// });
/// let received = consumer.recv().expect("the chain never reached finally");
/// assert_eq!(received.value, 3);
/// task1.join().expect("The task1 thread has panicked");
/// ```
pub struct Promise<T, E> {
    value: T,
    error: Option<E>,
    resolved: bool,
    rejected: bool,
    caught: bool,
    handoff: Option<Producer<Settled<T, E>>>,
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("value", &self.value)
            .field("error", &self.error)
            .field("resolved", &self.resolved)
            .field("rejected", &self.rejected)
            .field("caught", &self.caught)
            .field("handoff", &self.handoff.is_some())
            .finish()
    }
}

impl<T, E> Promise<T, E> {
    /// Starts a chain seeded with `value`.
    pub fn new(value: T) -> Self {
        Self {
            value,
            error: None,
            resolved: false,
            rejected: false,
            caught: false,
            handoff: None,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn error(&self) -> Option<&E> {
        self.error.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    /// Whether a `catch`/`catch_case` has already used up the catch slot.
    pub fn was_caught(&self) -> bool {
        self.caught
    }

    /// Stores `value`. A previous rejection stays in place.
    pub fn resolve(&mut self, value: T) {
        self.resolved = true;
        self.value = value;
    }

    /// Stores `err` and marks the chain rejected.
    pub fn reject(&mut self, err: E) {
        self.rejected = true;
        self.error = Some(err);
    }

    fn settle_with(&mut self, outcome: Result<T, E>) {
        match outcome {
            Ok(value) => self.resolve(value),
            Err(err) => self.reject(err),
        }
    }

    fn apply(&mut self, settle: Settle<T, E>) {
        if let Some(value) = settle.value {
            self.resolve(value);
        }
        if let Some(err) = settle.error {
            self.reject(err);
        }
    }

    /// Runs `step` against the current value, unless the chain is rejected.
    pub fn then(mut self, step: Step<'_, T, E>) -> Self {
        if self.rejected {
            trace!(step = step.kind(), "chain rejected, step skipped");
            return self;
        }
        trace!(step = step.kind(), "running step");
        match step.0 {
            Shape::Settle(f) => {
                let mut settle = Settle::new();
                f(&self.value, &mut settle);
                self.apply(settle);
            }
            Shape::SettleDetached(f) => {
                let mut settle = Settle::new();
                f(&mut settle);
                self.apply(settle);
            }
            Shape::Map(f) => {
                let outcome = f(&self.value);
                self.settle_with(outcome);
            }
            Shape::Produce(f) => {
                let outcome = f();
                self.settle_with(outcome);
            }
            Shape::Check(f) => {
                if let Err(err) = f(&self.value) {
                    self.reject(err);
                }
            }
            Shape::Attempt(f) => {
                if let Err(err) = f() {
                    self.reject(err);
                }
            }
            Shape::Inspect(f, empty) => {
                f(&self.value);
                self.resolve(empty());
            }
            Shape::Run(f, empty) => {
                f();
                self.resolve(empty());
            }
        }
        if self.rejected {
            debug!("step rejected the chain");
        }
        self
    }

    /// Peeks at the current value. Runs even on a rejected chain.
    pub fn tap(self, f: impl FnOnce(&T)) -> Self {
        f(&self.value);
        self
    }

    /// Handles the error if it is, or wraps, `target`.
    ///
    /// A present target consumes the catch slot whether or not it matched, so
    /// later `catch_case`/`catch` calls on this chain never run. A `None`
    /// target is a no-op; a bare `None` needs the target type spelled out,
    /// as in `catch_case::<MyError>(None, ..)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::{Promise, Step};
    /// use std::fmt;
    ///
    /// #[derive(Debug, Clone, PartialEq)]
    /// struct NotFound;
    /// impl fmt::Display for NotFound {
    ///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    ///         f.write_str("not found")
    ///     }
    /// }
    /// impl std::error::Error for NotFound {}
    ///
    /// let mut handled = false;
    /// Promise::<u8, NotFound>::new(0)
    ///     .then(Step::attempt(|| Err(NotFound)))
    ///     .catch_case(NotFound, |_| handled = true)
    ///     .finally(|_, _| {});
    /// assert!(handled);
    /// ```
    pub fn catch_case<K>(mut self, target: impl Into<Option<K>>, handler: impl FnOnce(&E)) -> Self
    where
        E: StdError + 'static,
        K: StdError + PartialEq + 'static,
    {
        let target = match target.into() {
            Some(target) if !self.caught => target,
            _ => return self,
        };
        if let Some(err) = &self.error {
            if matches_target(err, &target) {
                debug!(error = %err, "catch_case matched");
                handler(err);
            } else {
                trace!(error = %err, expected = %target, "catch_case did not match");
            }
        }
        self.caught = true;
        self
    }

    /// Same as [`catch_default`](Self::catch_default).
    pub fn catch(self, handler: impl FnOnce(&E)) -> Self {
        self.catch_default(handler)
    }

    /// Handles any error. Consumes the catch slot even when there is no error.
    pub fn catch_default(mut self, handler: impl FnOnce(&E)) -> Self {
        if self.caught {
            return self;
        }
        if let Some(err) = &self.error {
            debug!("catch handling error");
            handler(err);
        }
        self.caught = true;
        self
    }

    /// Blocks the calling thread for `duration`.
    pub fn delay(self, duration: Duration) -> Self {
        thread::sleep(duration);
        self
    }

    /// Lazily creates the handoff slot and returns a consumer for it. Repeated
    /// calls hand out consumers of the same slot.
    pub fn channel(&mut self) -> Consumer<Settled<T, E>> {
        match &self.handoff {
            Some(producer) => producer.subscribe(),
            None => {
                let (producer, consumer) = handoff::channel();
                self.handoff = Some(producer);
                consumer
            }
        }
    }

    /// Ends the chain: runs `handler` with the current pair, publishes the
    /// pair to the handoff if one was requested, and returns it.
    pub fn finally(self, handler: impl FnOnce(&T, Option<&E>)) -> Settled<T, E>
    where
        T: Clone,
        E: Clone,
    {
        let Promise {
            value,
            error,
            handoff,
            ..
        } = self;
        handler(&value, error.as_ref());
        debug!(
            rejected = error.is_some(),
            handoff = handoff.is_some(),
            "chain finished"
        );
        let settled = Settled { value, error };
        if let Some(producer) = handoff {
            producer.deliver(settled.clone());
        }
        settled
    }
}

/// Walks `err` and its sources looking for one equal to `target`.
fn matches_target<K>(err: &(dyn StdError + 'static), target: &K) -> bool
where
    K: StdError + PartialEq + 'static,
{
    let mut current = Some(err);
    while let Some(err) = current {
        if err.downcast_ref::<K>() == Some(target) {
            return true;
        }
        current = err.source();
    }
    false
}
