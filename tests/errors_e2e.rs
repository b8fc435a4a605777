//! Errors in spawned units reach the unit that handed off to them.

mod common;

use baton::{unit, Error, ErrorCategory, ErrorKind, ResumeEvent, Status};
use common::*;

#[test]
fn errors_raised_into_a_child_end_it() {
    within_deadline("raise into child", || {
        let order = coordinator();
        order.declare("err", |_| unit::sleep());
        let child = order.pass_to("err", ResumeEvent::Sleep).expect("handoff");

        assert!(child.raise(Error::raised("the roof")));
        let err = unit::sleep().expect_err("child failure comes back");
        assert_eq!(err.kind(), ErrorKind::Raised);
        assert_eq!(err.message(), Some("the roof"));
        assert_eq!(child.status(), Status::TerminatedWithError);
    });
}

#[test]
fn child_failures_are_raised_in_the_parent() {
    within_deadline("raise in parent", || {
        let order = coordinator();
        order.declare("err", |_| Err(Error::user("to the rules")));
        let err = order
            .pass_to("err", ResumeEvent::Exit)
            .expect_err("child failed");
        assert_eq!(err.kind(), ErrorKind::User);
        assert_eq!(err.category(), ErrorCategory::Propagated);
        assert_eq!(err.message(), Some("to the rules"));
        assert_eq!(
            err.context().name.as_ref().map(baton::Name::as_str),
            Some("err")
        );
    });
}

#[test]
fn child_failures_reach_a_sleeping_parent() {
    within_deadline("parent asleep", || {
        let order = coordinator();
        order.declare("err", |_| unit::sleep());
        let parent = unit::current();
        let child = order.pass_to("err", ResumeEvent::Sleep).expect("handoff");

        let statuses = Recorder::new();
        let log = statuses.clone();
        order.enqueue(move || {
            log.record(parent.status());
            child.raise(Error::raised("to the rules"));
        });
        let err = unit::sleep().expect_err("child failure comes back");
        assert_eq!(err.message(), Some("to the rules"));
        assert_eq!(statuses.snapshot().len(), 1);
    });
}

#[test]
fn child_panics_are_raised_in_the_parent() {
    within_deadline("panic in child", || {
        let order = coordinator();
        order.declare("panicky", |_| panic!("kaboom"));
        let err = order
            .pass_to("panicky", ResumeEvent::Exit)
            .expect_err("child panicked");
        assert_eq!(err.kind(), ErrorKind::Panicked);
        assert_eq!(err.message(), Some("kaboom"));
    });
}

#[test]
fn failures_show_up_in_join_all() {
    within_deadline("join failures", || {
        let order = coordinator();
        order.declare("ok", |_| Ok(()));
        order.declare("bad", |_| {
            unit::sleep()?;
            Err(Error::user("late failure"))
        });
        order.pass_to("ok", ResumeEvent::Exit).expect("handoff");
        let bad = order.pass_to("bad", ResumeEvent::Sleep).expect("handoff");

        bad.wakeup();
        let failure = match unit::sleep() {
            Err(err) => err,
            Ok(()) => unreachable!("nothing wakes the test thread"),
        };
        assert_eq!(failure.message(), Some("late failure"));

        let err = order.join_all().expect_err("one unit failed");
        assert_eq!(err.message(), Some("late failure"));
    });
}
