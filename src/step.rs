//! The shapes a step attached with [`Promise::then`](crate::Promise::then) may
//! take. Each shape is a variant, so an unsupported shape simply cannot be
//! built.
//!
use std::fmt;

/// Resolve/reject callbacks handed to manual-control steps.
///
/// Calls are recorded and applied to the chain once the step returns. Within
/// each slot the later call wins, as it would with direct assignment.
#[derive(Debug)]
pub struct Settle<T, E> {
    pub(crate) value: Option<T>,
    pub(crate) error: Option<E>,
}

impl<T, E> Settle<T, E> {
    pub(crate) fn new() -> Self {
        Self {
            value: None,
            error: None,
        }
    }

    /// Resolve the chain with `value`.
    pub fn resolve(&mut self, value: T) {
        self.value = Some(value);
    }

    /// Reject the chain with `err`.
    pub fn reject(&mut self, err: E) {
        self.error = Some(err);
    }
}

/// A step to run against the chain's current value.
///
/// # Examples
///
/// ```
/// use promise_chain::{Promise, Step};
/// let (value, error) = Promise::<i32, std::fmt::Error>::new(1)
///     .then(Step::map(|v| Ok(v + 1)))
///     .then(Step::settle(|v, settle| settle.resolve(v * 10)))
///     .finally(|_, _| {})
///     .into_parts();
/// assert_eq!(value, 20);
/// assert!(error.is_none());
/// ```
pub struct Step<'a, T, E>(pub(crate) Shape<'a, T, E>);

pub(crate) enum Shape<'a, T, E> {
    /// Reads the value and settles the chain by hand.
    Settle(Box<dyn FnOnce(&T, &mut Settle<T, E>) + 'a>),
    SettleDetached(Box<dyn FnOnce(&mut Settle<T, E>) + 'a>),
    /// Transforms the value; an error rejects the chain.
    Map(Box<dyn FnOnce(&T) -> Result<T, E> + 'a>),
    Produce(Box<dyn FnOnce() -> Result<T, E> + 'a>),
    /// Validates the value; an error rejects the chain, success keeps the value.
    Check(Box<dyn FnOnce(&T) -> Result<(), E> + 'a>),
    Attempt(Box<dyn FnOnce() -> Result<(), E> + 'a>),
    /// Observes the value, then resolves with `T::default()`.
    Inspect(Box<dyn FnOnce(&T) + 'a>, fn() -> T),
    Run(Box<dyn FnOnce() + 'a>, fn() -> T),
}

impl<'a, T, E> Step<'a, T, E> {
    /// Manual control: the step calls `settle.resolve` or `settle.reject`.
    pub fn settle(f: impl FnOnce(&T, &mut Settle<T, E>) + 'a) -> Self {
        Step(Shape::Settle(Box::new(f)))
    }

    pub fn settle_detached(f: impl FnOnce(&mut Settle<T, E>) + 'a) -> Self {
        Step(Shape::SettleDetached(Box::new(f)))
    }

    pub fn map(f: impl FnOnce(&T) -> Result<T, E> + 'a) -> Self {
        Step(Shape::Map(Box::new(f)))
    }

    pub fn produce(f: impl FnOnce() -> Result<T, E> + 'a) -> Self {
        Step(Shape::Produce(Box::new(f)))
    }

    /// On success the current value is kept as is.
    pub fn check(f: impl FnOnce(&T) -> Result<(), E> + 'a) -> Self {
        Step(Shape::Check(Box::new(f)))
    }

    pub fn attempt(f: impl FnOnce() -> Result<(), E> + 'a) -> Self {
        Step(Shape::Attempt(Box::new(f)))
    }

    /// Resolves with `T::default()` once `f` returns.
    pub fn inspect(f: impl FnOnce(&T) + 'a) -> Self
    where
        T: Default,
    {
        Step(Shape::Inspect(Box::new(f), T::default))
    }

    pub fn run(f: impl FnOnce() + 'a) -> Self
    where
        T: Default,
    {
        Step(Shape::Run(Box::new(f), T::default))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self.0 {
            Shape::Settle(_) => "settle",
            Shape::SettleDetached(_) => "settle_detached",
            Shape::Map(_) => "map",
            Shape::Produce(_) => "produce",
            Shape::Check(_) => "check",
            Shape::Attempt(_) => "attempt",
            Shape::Inspect(..) => "inspect",
            Shape::Run(..) => "run",
        }
    }
}

impl<T, E> fmt::Debug for Step<'_, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Step").field(&self.kind()).finish()
    }
}
