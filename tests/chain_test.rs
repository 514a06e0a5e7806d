#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use promise_chain::{Error, Promise, Settled, Step};
    use std::{
        cell::{Cell, RefCell},
        thread,
        time::{Duration, Instant},
    };
    use thiserror::Error as ThisError;
    use tracing_subscriber::EnvFilter;

    #[derive(Debug, ThisError, Clone, PartialEq)]
    enum LookupError {
        #[error("record not found")]
        NotFound,
        #[error("backend unavailable")]
        Unavailable,
    }

    #[derive(Debug, ThisError, Clone, PartialEq)]
    enum ChainError {
        #[error("boom")]
        Boom,
        #[error("rejected")]
        Rejected,
        #[error("other error")]
        Other,
        #[error("lookup failed")]
        Lookup(#[source] LookupError),
    }

    type Chain = Promise<i32, ChainError>;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[test]
    fn test_scenario_add_one() {
        init_tracing();
        let settled = Chain::new(5)
            .then(Step::map(|v| Ok(v + 1)))
            .finally(|v, e| {
                assert_eq!(*v, 6);
                assert!(e.is_none());
            });
        assert_eq!(settled.into_parts(), (6, None));
    }

    #[test]
    fn test_scenario_catch_case_mismatch_then_catch() {
        init_tracing();
        let h1 = Cell::new(false);
        let h2 = RefCell::new(None);
        let settled = Chain::new(0)
            .then(Step::map(|_| Err(ChainError::Rejected)))
            .catch_case(ChainError::Other, |_| h1.set(true))
            .catch(|err| *h2.borrow_mut() = Some(err.clone()))
            .finally(|_, _| {});
        assert!(!h1.get());
        // The mismatched catch_case consumed the slot, so catch never runs.
        assert_eq!(*h2.borrow(), None);
        assert_eq!(settled.value, 0);
        assert_eq!(settled.error, Some(ChainError::Rejected));
    }

    #[test]
    fn test_scenario_catch_without_case() {
        init_tracing();
        let h2 = RefCell::new(None);
        let settled = Chain::new(0)
            .then(Step::map(|_| Err(ChainError::Rejected)))
            .catch(|err| *h2.borrow_mut() = Some(err.clone()))
            .finally(|_, _| {});
        assert_eq!(*h2.borrow(), Some(ChainError::Rejected));
        assert_eq!(settled.value, 0);
        assert_eq!(settled.error, Some(ChainError::Rejected));
    }

    #[test]
    fn test_scenario_short_circuit() {
        init_tracing();
        let third = Cell::new(false);
        let settled = Chain::new(1)
            .then(Step::map(|v| Ok(v + 1)))
            .then(Step::check(|_| Err(ChainError::Boom)))
            .then(Step::map(|v| {
                third.set(true);
                Ok(v + 100)
            }))
            .finally(|_, _| {});
        assert!(!third.get());
        assert_eq!(settled.error.as_ref().map(ToString::to_string), Some("boom".into()));
        assert_eq!(settled.value, 2);
    }

    #[test]
    fn test_scenario_handoff_across_threads() {
        init_tracing();
        let mut promise = Chain::new(1);
        let consumer = promise.channel();
        let waiter = thread::spawn(move || consumer.recv());
        let runner = thread::spawn(move || {
            promise
                .then(Step::map(|v| Ok(v * 10)))
                .delay(Duration::from_millis(10))
                .then(Step::attempt(|| Err(ChainError::Boom)))
                .finally(|_, _| {})
        });
        let returned = runner.join().expect("The runner thread has panicked");
        let received = waiter
            .join()
            .expect("The waiter thread has panicked")
            .expect("handoff was not delivered");
        assert_eq!(received, returned);
        assert_eq!(received, Settled { value: 10, error: Some(ChainError::Boom) });
    }

    #[test]
    fn test_handoff_await() {
        init_tracing();
        let mut promise = Chain::new(2);
        let consumer = promise.channel();
        let waiter = thread::spawn(move || block_on(async { consumer.await }));
        promise.then(Step::map(|v| Ok(v * v))).finally(|_, _| {});
        let received = waiter.join().expect("The waiter thread has panicked");
        assert_eq!(received.map(Settled::into_result), Ok(Ok(4)));
    }

    #[test]
    fn test_handoff_single_delivery() {
        let mut promise = Chain::new(3);
        let first = promise.channel();
        let second = promise.channel();
        assert_eq!(first.try_recv(), Ok(None));
        let returned = promise.finally(|_, _| {});
        assert_eq!(first.recv(), Ok(returned));
        assert_eq!(second.try_recv(), Err(Error::AlreadyReceived));
    }

    #[test]
    fn test_handoff_never_finished() {
        let mut promise = Chain::new(3);
        let consumer = promise.channel();
        let runner = thread::spawn(move || {
            let _promise = promise.then(Step::map(|v| Ok(v + 1)));
        });
        runner.join().expect("The runner thread has panicked");
        assert_eq!(
            consumer.recv_timeout(Duration::from_secs(5)),
            Err(Error::ProducerDropped)
        );
    }

    #[test]
    fn test_finally_runs_once_without_channel() {
        let calls = Cell::new(0);
        let settled = Chain::new(7)
            .then(Step::attempt(|| Err(ChainError::Other)))
            .catch(|_| {})
            .then(Step::map(|v| Ok(v + 1)))
            .finally(|v, e| {
                calls.set(calls.get() + 1);
                assert_eq!(*v, 7);
                assert_eq!(e, Some(&ChainError::Other));
            });
        assert_eq!(calls.get(), 1);
        assert_eq!(settled.into_result(), Err(ChainError::Other));
    }

    #[test]
    fn test_tap_is_transparent() {
        let seen = RefCell::new(vec![]);
        let resolved = Chain::new(4).then(Step::map(|v| Ok(v + 1))).tap(|v| seen.borrow_mut().push(*v));
        assert_eq!(*resolved.value(), 5);
        assert!(resolved.error().is_none());

        let rejected = resolved
            .then(Step::attempt(|| Err(ChainError::Boom)))
            .tap(|v| seen.borrow_mut().push(*v));
        assert_eq!(*rejected.value(), 5);
        assert_eq!(rejected.error(), Some(&ChainError::Boom));
        assert_eq!(*seen.borrow(), vec![5, 5]);
    }

    #[test]
    fn test_catch_case_matches_source() {
        init_tracing();
        let handled = RefCell::new(None);
        Chain::new(0)
            .then(Step::produce(|| Err(ChainError::Lookup(LookupError::NotFound))))
            .catch_case(LookupError::NotFound, |err| *handled.borrow_mut() = Some(err.clone()))
            .catch(|_| panic!("the catch slot was already used"));
        assert_eq!(
            *handled.borrow(),
            Some(ChainError::Lookup(LookupError::NotFound))
        );
    }

    #[test]
    fn test_catch_case_source_mismatch() {
        let handled = Cell::new(false);
        let promise = Chain::new(0)
            .then(Step::produce(|| Err(ChainError::Lookup(LookupError::Unavailable))))
            .catch_case(LookupError::NotFound, |_| handled.set(true));
        assert!(!handled.get());
        assert!(promise.was_caught());
    }

    #[test]
    fn test_manual_resolve_after_reject_keeps_error() {
        let settled = Chain::new(1)
            .then(Step::settle(|v, settle| {
                settle.reject(ChainError::Boom);
                settle.resolve(v + 1);
            }))
            .finally(|_, _| {});
        assert_eq!(settled.value, 2);
        assert_eq!(settled.error, Some(ChainError::Boom));
    }

    #[test]
    fn test_steps_borrow_from_caller() {
        let increments = [1, 2, 3];
        let mut log = Vec::new();
        let settled = Promise::<Option<i32>, ChainError>::new(Some(0))
            .then(Step::map(|v: &Option<i32>| {
                Ok(v.map(|v| v + increments.iter().sum::<i32>()))
            }))
            .tap(|v| log.push(format!("{v:?}")))
            .finally(|_, _| {});
        assert_eq!(settled.value, Some(6));
        assert_eq!(log, vec!["Some(6)"]);

        let emptied = Promise::<Option<i32>, ChainError>::new(Some(1))
            .then(Step::run(|| {}))
            .finally(|_, _| {});
        assert_eq!(emptied.value, None);
    }

    #[test]
    fn test_delay_blocks() {
        let start = Instant::now();
        let promise = Chain::new(1).delay(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(*promise.value(), 1);
    }
}
