//! JavaScript-style promise chaining, run synchronously.
//!
//! A [`Promise`] carries a value and an optional error through a chain of
//! [`Step`]s. Steps run on the calling thread; once a step rejects, later
//! `then` steps are skipped, the first `catch`/`catch_case` gets one chance to
//! handle the error, and `finally` always runs. A chain can also publish its
//! outcome through a single-slot [`handoff`] so another thread can wait for it.
//!
//! ```
//! use promise_chain::{Promise, Step};
//!
//! let settled = Promise::<i32, std::fmt::Error>::new(5)
//!     .then(Step::map(|v| Ok(v + 1)))
//!     .finally(|v, e| println!("finished with {v:?}, {e:?}"));
//! assert_eq!(settled.into_result(), Ok(6));
//! ```
use std::time::Duration;
use thiserror::Error;

mod chain;
pub mod handoff;
mod step;

pub use chain::{Promise, Settled};
pub use step::{Settle, Step};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("The chain was dropped before reaching finally")]
    ProducerDropped,
    #[error("The handoff value was already received")]
    AlreadyReceived,
    #[error("Timed out after {0:?} waiting for the handoff")]
    Timeout(Duration),
}
