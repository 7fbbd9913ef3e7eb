//! Record and replay the operations applied to a [Harness].

use crate::{Error, Harness, Interrupt, Model, ModelError, Operations};
use commonware_utils::hex;
use rand::rngs::StdRng;
use sha2::{Digest, Sha256};
use std::{
    fmt::Debug,
    future::Future,
    mem,
    pin::Pin,
    task::{Context, Poll},
};
use tracing::debug;

/// A single executed operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry<I> {
    /// Name of the operation.
    pub name: String,

    /// Exact inputs the operation was applied with.
    pub input: I,
}

/// Yield control back to the runtime.
pub async fn reschedule() {
    struct Reschedule {
        yielded: bool,
    }

    impl Future for Reschedule {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.yielded {
                Poll::Ready(())
            } else {
                self.yielded = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    Reschedule { yielded: false }.await
}

/// Track the sequence of executed operations.
///
/// Two executors that apply the same operations with the same inputs (in the same order) end
/// with the same [Auditor::state], regardless of whether those operations were generated or
/// replayed.
#[derive(Default)]
pub struct Auditor {
    hash: Vec<u8>,
}

impl Auditor {
    fn record(&mut self, name: &str, input: &impl Debug) {
        let mut hasher = Sha256::new();
        hasher.update(&self.hash);
        hasher.update(b"execute");
        hasher.update(name.as_bytes());
        hasher.update(format!("{input:?}").as_bytes());
        self.hash = hasher.finalize().to_vec();
    }

    /// Generate a representation of the current state of the auditor.
    pub fn state(&self) -> String {
        hex(&self.hash)
    }
}

/// Applies operations to a [Harness] and records them into a trace.
///
/// An entry is only appended once its operation has completed successfully. Before every
/// invocation (generated or replayed), the executor yields to the runtime and checks its
/// [Interrupt].
pub struct Executor<M: Model> {
    harness: Harness<M>,
    operations: Operations<M>,
    trace: Vec<Entry<M::Input>>,
    auditor: Auditor,
    interrupt: Interrupt,
    debug: bool,
}

impl<M: Model> Executor<M> {
    /// Create a new [Executor] with an empty trace.
    pub fn new(harness: Harness<M>, operations: Operations<M>) -> Self {
        Self {
            harness,
            operations,
            trace: Vec::new(),
            auditor: Auditor::default(),
            interrupt: Interrupt::new(),
            debug: false,
        }
    }

    /// Bind the executor to `trace` (applied by [Executor::replay]).
    pub fn with_trace(mut self, trace: Vec<Entry<M::Input>>) -> Self {
        self.trace = trace;
        self
    }

    /// Stop at the next yield point once `interrupt` fires.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Log every executed operation.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Returns the state operations are applied to.
    pub fn harness(&self) -> &Harness<M> {
        &self.harness
    }

    /// Returns the recorded trace.
    pub fn trace(&self) -> &[Entry<M::Input>] {
        &self.trace
    }

    /// Consume the executor and return the recorded trace.
    pub fn into_trace(self) -> Vec<Entry<M::Input>> {
        self.trace
    }

    /// Returns the auditor of all operations executed so far.
    pub fn auditor(&self) -> &Auditor {
        &self.auditor
    }

    /// Generate fresh inputs for the operation `name` (drawn from `rng`), apply it, and record it.
    pub async fn push_and_execute(
        &mut self,
        name: &str,
        rng: &mut StdRng,
    ) -> Result<(), ModelError<M>> {
        self.yield_point().await?;
        let operation = self
            .operations
            .get(name)
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))?;
        let input = operation.input(rng, &self.harness).await;
        self.apply(name, input).await
    }

    /// Apply the operation `name` with caller-supplied `input` and record it.
    pub async fn execute(&mut self, name: &str, input: M::Input) -> Result<(), ModelError<M>> {
        self.yield_point().await?;
        self.apply(name, input).await
    }

    /// Apply every entry of the bound trace, in order, with its recorded inputs.
    ///
    /// If an operation fails, the trace is left holding the entries that were applied.
    pub async fn replay(&mut self) -> Result<(), ModelError<M>> {
        let trace = mem::take(&mut self.trace);
        for Entry { name, input } in trace {
            self.execute(&name, input).await?;
        }
        Ok(())
    }

    async fn yield_point(&self) -> Result<(), ModelError<M>> {
        reschedule().await;
        if self.interrupt.fired() {
            return Err(Error::Interrupted {
                operations: self.trace.len(),
            });
        }
        Ok(())
    }

    async fn apply(&mut self, name: &str, input: M::Input) -> Result<(), ModelError<M>> {
        let operation = self
            .operations
            .get(name)
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))?;
        if let Err(err) = operation.apply(&mut self.harness, &input).await {
            return Err(Error::Operation {
                name: name.to_string(),
                reason: err.to_string(),
                trace: self.trace.clone(),
            });
        }
        if self.debug {
            debug!(name, ?input, "executed operation");
        }
        self.auditor.record(name, &input);
        self.trace.push(Entry {
            name: name.to_string(),
            input,
        });
        Ok(())
    }
}
