//! A reference stack and a bounded stack that silently drops pushes once full.

use crate::{
    reschedule, BoxError, Config, Harness, Model, Operation, Operations, Probe, Validation,
};
use futures::future::LocalBoxFuture;
use rand::{rngs::StdRng, Rng};
use std::{
    cell::Cell,
    io,
    rc::Rc,
    sync::{Arc, Mutex},
};
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log lines.
#[derive(Clone, Default)]
pub struct Logs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Logs {
    /// Run `f` with every event logged on this thread written to the returned [Logs].
    pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Self) {
        let logs = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, logs)
    }

    /// Returns every line that contains `pattern`.
    pub fn lines(&self, pattern: &str) -> Vec<String> {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter(|line| line.contains(pattern))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for Logs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Logs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// A stack that ignores pushes beyond its capacity.
pub struct Bounded {
    items: Vec<u32>,
    capacity: usize,
}

impl Bounded {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
        }
    }

    pub fn push(&mut self, item: u32) {
        if self.items.len() < self.capacity {
            self.items.push(item);
        }
    }

    pub fn pop(&mut self) -> Option<u32> {
        self.items.pop()
    }

    pub fn peek(&self) -> Option<u32> {
        self.items.last().copied()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[u32] {
        &self.items
    }
}

/// Number of calls made to each operation, assertion, and setup.
#[derive(Default)]
pub struct Counters {
    pub setups: Cell<usize>,
    pub generated: Cell<usize>,
    pub push: Cell<usize>,
    pub pop: Cell<usize>,
    pub peek: Cell<usize>,
    pub clear: Cell<usize>,
    pub same_at: Cell<usize>,
    pub same_len: Cell<usize>,
}

fn increment(cell: &Cell<usize>) {
    cell.set(cell.get() + 1);
}

/// Compares an unbounded `Vec` against a [Bounded] stack of the given capacity.
///
/// Operations: `push`, `pop`, `peek`, `clear`, and `explode` (always fails).
/// Validators: `top` (drives `same_at` at every depth) and `len` (drives `same_len`).
pub struct Stacks {
    pub capacity: usize,
    pub counters: Rc<Counters>,
    lenient: bool,
    faulty: bool,
    setups_allowed: Option<usize>,
}

impl Stacks {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            counters: Rc::new(Counters::default()),
            lenient: false,
            faulty: false,
            setups_allowed: None,
        }
    }

    /// Add a `lenient` validator that drives `same_len` and discards its error.
    pub fn with_lenient_validator(mut self) -> Self {
        self.lenient = true;
        self
    }

    /// Add a `faulty` validator that fails without invoking its assertion.
    pub fn with_faulty_validator(mut self) -> Self {
        self.faulty = true;
        self
    }

    /// Fail every setup after the first `allowed`.
    pub fn with_setups_allowed(mut self, allowed: usize) -> Self {
        self.setups_allowed = Some(allowed);
        self
    }
}

/// Reads the top of both stacks after yielding to the runtime.
struct Peek {
    counters: Rc<Counters>,
}

impl Operation<Stacks> for Peek {
    fn input<'a>(
        &'a self,
        _: &'a mut StdRng,
        _: &'a Harness<Stacks>,
    ) -> LocalBoxFuture<'a, Vec<u32>> {
        Box::pin(async move {
            increment(&self.counters.generated);
            Vec::new()
        })
    }

    fn apply<'a>(
        &'a self,
        harness: &'a mut Harness<Stacks>,
        _: &'a Vec<u32>,
    ) -> LocalBoxFuture<'a, Result<(), BoxError>> {
        Box::pin(async move {
            increment(&self.counters.peek);
            reschedule().await;
            let _ = (harness.reference.last(), harness.actual.peek());
            Ok(())
        })
    }
}

impl Model for Stacks {
    type Reference = Vec<u32>;
    type Actual = Bounded;
    type State = ();
    type Input = Vec<u32>;
    type Witness = usize;

    async fn setup(&self) -> Result<Harness<Self>, BoxError> {
        increment(&self.counters.setups);
        if let Some(allowed) = self.setups_allowed {
            if self.counters.setups.get() > allowed {
                return Err("setup unavailable".into());
            }
        }
        Ok(Harness {
            reference: Vec::new(),
            actual: Bounded::new(self.capacity),
            state: (),
        })
    }

    fn operations(&self, _: &Config) -> Operations<Self> {
        let push = self.counters.clone();
        let push_generated = self.counters.clone();
        let pop = self.counters.clone();
        let pop_generated = self.counters.clone();
        let clear = self.counters.clone();
        let clear_generated = self.counters.clone();
        Operations::<Self>::new()
            .with_fn(
                "push",
                move |rng, _| {
                    increment(&push_generated.generated);
                    vec![rng.gen::<u32>()]
                },
                move |harness, input| {
                    increment(&push.push);
                    let [item] = input.as_slice() else {
                        return Err(format!("push expects one argument, got {input:?}").into());
                    };
                    harness.reference.push(*item);
                    harness.actual.push(*item);
                    Ok(())
                },
            )
            .with_fn(
                "pop",
                move |_, _| {
                    increment(&pop_generated.generated);
                    Vec::new()
                },
                move |harness, _| {
                    increment(&pop.pop);
                    harness.reference.pop();
                    harness.actual.pop();
                    Ok(())
                },
            )
            .with(
                "peek",
                Peek {
                    counters: self.counters.clone(),
                },
            )
            .with_fn(
                "clear",
                move |_, _| {
                    increment(&clear_generated.generated);
                    Vec::new()
                },
                move |harness, _| {
                    increment(&clear.clear);
                    harness.reference.clear();
                    harness.actual.clear();
                    Ok(())
                },
            )
            .with_fn("explode", |_, _| Vec::new(), |_, _| Err("boom".into()))
    }

    fn validation(&self, _: &Config) -> Validation<Self> {
        let same_at = self.counters.clone();
        let same_len = self.counters.clone();
        let mut validation = Validation::<Self>::new()
            .with_validator_fn("top", "same_at", |probe| {
                let harness = probe.harness();
                let depth = harness.reference.len().max(harness.actual.len());
                for depth in 0..depth {
                    probe.test(depth)?;
                }
                Ok(())
            })
            .with_validator_fn("len", "same_len", |probe| {
                let expected = probe.harness().reference.len();
                probe.test(expected)
            })
            .with_assertion("same_at", move |harness, depth| {
                increment(&same_at.same_at);
                let expected = harness.reference.iter().rev().nth(*depth);
                let actual = harness.actual.items().iter().rev().nth(*depth);
                if expected != actual {
                    return Err(format!(
                        "mismatch at depth {depth}: expected {expected:?}, found {actual:?}"
                    )
                    .into());
                }
                Ok(())
            })
            .with_assertion("same_len", move |harness, expected| {
                increment(&same_len.same_len);
                let actual = harness.actual.len();
                if actual != *expected {
                    return Err(format!("expected {expected} items, found {actual}").into());
                }
                Ok(())
            });
        if self.lenient {
            validation = validation.with_validator_fn("lenient", "same_len", |probe| {
                let expected = probe.harness().reference.len();
                let _ = probe.test(expected);
                Ok(())
            });
        }
        if self.faulty {
            validation = validation
                .with_validator_fn("faulty", "same_len", |_: &mut Probe<'_, Stacks>| {
                    Err("unavailable".into())
                });
        }
        validation
    }
}
