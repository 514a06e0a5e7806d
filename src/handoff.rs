//! Single-slot handoff between the thread running a chain and a thread waiting
//! on its outcome. The `Producer` writes at most once; any number of
//! `Consumer` clones may wait, but only the first receive takes the value.
//!
use crate::Error;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll, Waker},
};
use tracing::{debug, trace};

/// Write side of the handoff. Owned by the chain and consumed by `deliver`.
///
/// # Examples
///
/// ```
/// use promise_chain::handoff;
/// use std::thread;
/// let (producer, consumer) = handoff::channel::<String>();
///
/// let task1 = thread::spawn(move || consumer.recv());
/// producer.deliver("Hi".into());
/// assert_eq!(task1.join().expect("The task1 thread has panicked.").unwrap(), "Hi");
/// ```
#[derive(Debug)]
pub struct Producer<T> {
    slot: Arc<Slot<T>>,
}

/// Read side of the handoff. Clones share the same slot.
#[derive(Debug)]
pub struct Consumer<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Consumer<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Open,
    Delivered,
    Received,
    Abandoned,
}

#[derive(Debug)]
struct Inner<T> {
    value: Option<T>,
    state: SlotState,
    wakers: Vec<Waker>,
}

#[derive(Debug)]
struct Slot<T> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

impl<T> Slot<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Inner<T> {
    /// Settles a waiter once the slot has left `Open`.
    fn take(&mut self) -> Option<Result<T, Error>> {
        match self.state {
            SlotState::Open => None,
            SlotState::Delivered => {
                self.state = SlotState::Received;
                trace!("handoff value received");
                self.value.take().map(Ok)
            }
            SlotState::Received => Some(Err(Error::AlreadyReceived)),
            SlotState::Abandoned => Some(Err(Error::ProducerDropped)),
        }
    }

    fn wake_all(&mut self) {
        for waker in self.wakers.drain(..) {
            waker.wake()
        }
    }
}

/// Creates a connected producer/consumer pair sharing one empty slot.
pub fn channel<T>() -> (Producer<T>, Consumer<T>) {
    let slot = Arc::new(Slot {
        inner: Mutex::new(Inner {
            value: None,
            state: SlotState::Open,
            wakers: vec![],
        }),
        ready: Condvar::new(),
    });
    (Producer { slot: slot.clone() }, Consumer { slot })
}

impl<T> Producer<T> {
    /// Fills the slot and wakes every waiter. Consuming `self` makes this the
    /// only write the slot ever sees.
    pub fn deliver(self, value: T) {
        let mut inner = self.slot.lock();
        inner.value = Some(value);
        inner.state = SlotState::Delivered;
        inner.wake_all();
        self.slot.ready.notify_all();
        debug!("handoff delivered");
    }

    /// Returns a new consumer attached to this producer's slot.
    pub fn subscribe(&self) -> Consumer<T> {
        Consumer {
            slot: self.slot.clone(),
        }
    }
}

impl<T> Drop for Producer<T> {
    /// If this is an undelivered producer, wake all waiters with an error.
    fn drop(&mut self) {
        let mut inner = self.slot.lock();
        if inner.state == SlotState::Open {
            inner.state = SlotState::Abandoned;
            inner.wake_all();
            self.slot.ready.notify_all();
            debug!("handoff abandoned before delivery");
        }
    }
}

impl<T> Consumer<T> {
    /// Blocks until the slot is settled and takes the value.
    pub fn recv(&self) -> Result<T, Error> {
        let mut inner = self.slot.lock();
        loop {
            if let Some(outcome) = inner.take() {
                return outcome;
            }
            inner = self
                .slot
                .ready
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Takes the value if it is already there, without blocking.
    pub fn try_recv(&self) -> Result<Option<T>, Error> {
        self.slot.lock().take().transpose()
    }

    /// Like `recv`, but gives up with `Error::Timeout` after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, Error> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.slot.lock();
        loop {
            if let Some(outcome) = inner.take() {
                return outcome;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(timeout));
            }
            inner = self
                .slot
                .ready
                .wait_timeout(inner, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl<T> Future for Consumer<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.slot.lock();
        match inner.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                if !inner.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    inner.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}
