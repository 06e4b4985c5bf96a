//! Bundled sample tests
//!
//! Registered by `litmus run` to exercise every kind of body and matcher.

use parking_lot::Mutex;
use serde::Serialize;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Failure;
use crate::executor::Session;
use crate::matchers::{expect, Expect};

fn sum(x: i64, y: i64) -> i64 {
    x + y
}

#[derive(Debug, Serialize)]
struct Point {
    x: i32,
    y: i32,
}

fn parse_port(raw: &str) -> Result<u16, String> {
    raw.parse::<u16>()
        .map_err(|err| format!("invalid port {raw:?}: {err}"))
}

/// Register the sample tests on `session`
pub fn register(session: &Session) {
    session.test("Adds 2 + 2 to equal 4", || expect(sum(2, 2)).to_be(4));

    session.test("Adds 2 + 2 to NOT equal 5", || expect(sum(2, 2)).not().to_be(5));

    session.describe("stack", |s| {
        let stack = Arc::new(Mutex::new(Vec::<i32>::new()));

        let push = Arc::clone(&stack);
        s.test("push adds to the top", move || {
            push.lock().extend([1, 2, 3]);
            expect(push.lock().last().copied()).to_be(Some(3))
        });

        let pop = Arc::clone(&stack);
        s.test("pop removes the top", move || -> Result<(), Failure> {
            let mut stack = pop.lock();
            expect(stack.pop()).to_be(Some(3))?;
            expect(stack.len()).to_be(2)
        });

        let contents = Arc::clone(&stack);
        s.test("remaining items compare structurally", move || {
            expect(contents.lock().clone()).to_equal([1, 2])
        });
    });

    session.describe("equality", |s| {
        s.test("structures with the same shape are equal", || {
            expect(Point { x: 1, y: 2 }).to_equal(serde_json::json!({ "x": 1, "y": 2 }))
        });

        s.test("order matters in sequences", || {
            expect(vec![1, 2]).not().to_strict_equal(vec![2, 1])
        });

        s.test("shared pointers are identical only to themselves", || -> Result<(), Failure> {
            let shared = Rc::new(Point { x: 0, y: 0 });
            expect(Rc::clone(&shared)).to_be(Rc::clone(&shared))?;
            expect(Rc::clone(&shared)).not().to_be(Rc::new(Point { x: 0, y: 0 }))?;
            expect(shared).to_equal(Point { x: 0, y: 0 })
        });
    });

    session.describe("errors", |s| {
        s.test("invalid input is rejected", || {
            expect(|| parse_port("http")).to_throw()
        });

        s.test("valid input parses", |expect: Expect| -> Result<(), Failure> {
            expect.that(|| parse_port("8080")).not().to_throw()?;
            expect.that(parse_port("8080").ok()).to_be(Some(8080))
        });
    });

    session.test("async work resolves", || async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        expect(sum(20, 22)).to_be(42)
    });

    session.test("async work sees its assertions", |expect: Expect| async move {
        tokio::task::yield_now().await;
        expect.that("litmus").to_be("litmus")?;
        expect.that(expect.evaluated()).to_be(1)
    });
}
