//! Joining, queue synchronization and shutdown.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use baton::{unit, Handle, Outcome, PassOptions, ResumeEvent, Status, TerminateMethod, Unit};
use common::*;

#[test]
fn join_all_waits_for_every_child() {
    within_deadline("join all", || {
        let order = coordinator();
        let children: Recorder<Unit> = Recorder::new();

        let (log, handle) = (children.clone(), order.handle());
        order.declare("t1", move |_| {
            handle.pass_to("t2", ResumeEvent::Run)?;
            log.record(unit::current());
            Ok(())
        });
        let log = children.clone();
        order.declare("t2", move |_| {
            log.record(unit::current());
            Ok(())
        });

        order.pass_to("t1", ResumeEvent::Run).expect("handoff");
        order.join_all().expect("no failures");
        let children = children.snapshot();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|child| !child.is_alive()));
    });
}

#[test]
fn any_unit_can_enqueue_work() {
    within_deadline("enqueue order", || {
        let order = coordinator();
        let seen = Recorder::new();

        let (log, handle) = (seen.clone(), order.handle());
        order.declare("enqueueing", move |parent| {
            let (log, inner) = (log.clone(), handle.clone());
            handle.enqueue(move || {
                let second = log.clone();
                inner.enqueue(move || second.record(2));
                let third = log.clone();
                inner.enqueue(move || third.record(3));
                inner.enqueue(move || {
                    parent.wakeup();
                });
                log.record(1);
            });
            Ok(())
        });

        order.pass_to("enqueueing", PassOptions::manual()).expect("handoff");
        assert_eq!(seen.snapshot(), [1, 2, 3]);
    });
}

fn increment(handle: Handle, counter: Arc<AtomicUsize>) {
    counter.fetch_add(1, Ordering::SeqCst);
    let next = handle.clone();
    handle.enqueue(move || increment(next, counter));
}

#[test]
fn a_unit_can_sleep_until_a_condition_holds() {
    within_deadline("wait until", || {
        let order = coordinator();
        let counter = Arc::new(AtomicUsize::new(0));
        increment(order.handle(), Arc::clone(&counter));

        let seen = Arc::clone(&counter);
        order
            .wait_until(move || seen.load(Ordering::SeqCst) > 20_000)
            .expect("condition reached");
        assert!(counter.load(Ordering::SeqCst) > 20_000);
    });
}

#[test]
fn apocalypse_kills_units_that_are_still_alive() {
    within_deadline("apocalypse kill", || {
        let order = coordinator();
        order.declare("t", |_| unit::sleep());
        let child = order.pass_to("t", ResumeEvent::Sleep).expect("handoff");

        order.apocalypse(TerminateMethod::Kill);
        child.join().expect("killed units end normally");
        assert!(matches!(child.outcome(), Some(Outcome::Killed)));
        assert_eq!(child.status(), Status::TerminatedNormally);
    });
}

#[test]
fn apocalypse_can_join_instead_of_killing() {
    within_deadline("apocalypse join", || {
        let order = coordinator();
        order.declare("t", |_| unit::sleep());
        let child = order.pass_to("t", ResumeEvent::Run).expect("handoff");

        let handle = order.handle();
        let joiner = thread::spawn(move || handle.apocalypse(TerminateMethod::Join));
        wait_for_status(&child, Status::Suspended);
        child.wakeup();
        joiner.join().expect("joiner");

        assert!(matches!(child.outcome(), Some(Outcome::Completed)));
        assert!(order.is_shut_down());
    });
}

#[test]
fn apocalypse_is_idempotent() {
    within_deadline("apocalypse repeated", || {
        let order = coordinator();
        order.declare("t", |_| unit::sleep());
        order.pass_to("t", ResumeEvent::Sleep).expect("handoff");
        for _ in 0..100 {
            order.apocalypse(TerminateMethod::Kill);
        }
        assert!(order.is_shut_down());
        assert!(!order.worker().is_alive());
    });
}

#[test]
fn nothing_is_enqueued_after_the_apocalypse() {
    within_deadline("enqueue after apocalypse", || {
        let order = coordinator();
        order.apocalypse(TerminateMethod::Kill);
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&ran);
        assert!(!order.enqueue(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }));
        order.declare("t", |_| Ok(()));
        let err = order
            .pass_to("t", ResumeEvent::Exit)
            .expect_err("shut down");
        assert_eq!(err.kind(), baton::ErrorKind::Shutdown);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn dropping_the_coordinator_kills_its_units() {
    within_deadline("drop", || {
        let order = coordinator();
        order.declare("t", |_| unit::sleep());
        let child = order.pass_to("t", ResumeEvent::Sleep).expect("handoff");
        drop(order);
        child.join().expect("killed units end normally");
        assert!(matches!(child.outcome(), Some(Outcome::Killed)));
    });
}
