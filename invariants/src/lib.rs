//! Exercise invariants between a reference model and an implementation.
//!
//! A [Model] describes two parallel implementations of the same abstract behavior: a trusted
//! `Reference` and the `Actual` system under test. The engine drives a seeded, weighted random
//! sequence of named operations against both, runs every enabled validator after each
//! operation, and, on the first divergence, shrinks the recorded trace to a short reproducer.
//!
//! # Overview
//!
//! * [Session] runs `num_iterations` independent [Fuzzer]s in sequence. Iteration `i` is seeded
//!   with `(seed_prefix, seed_number + i)`, so any failing iteration can be replayed in isolation.
//! * [Fuzzer] builds a fresh [Harness], registers every configured operation with a weighted
//!   [Selector], and performs exactly `num_operations` picks.
//! * [Executor] records each executed operation (name and exact inputs) into a trace and can
//!   replay that trace against freshly constructed state without consuming any randomness.
//! * [Validation] runs each enabled [Validator], handing it a [Probe] that captures the exact
//!   arguments passed to the designated assertion.
//! * [shrink()] searches for a shorter trace that still fails the captured assertion with the
//!   captured arguments, bounded by `shortening.iterations` candidates.
//!
//! The final [Failure] carries the minimized trace, the failing assertion and its arguments, and
//! the configuration of the failing iteration. [Regression] replays it directly, without any
//! random search, to turn it into an example-based test.
//!
//! # Determinism
//!
//! The engine is single-threaded and cooperative: no two operations ever run concurrently.
//! Models are assumed to be deterministic (the same inputs applied to freshly constructed state
//! always produce the same result). The engine does not enforce this.
//!
//! # Status
//!
//! `commonware-invariants` is **ALPHA** software and is not yet recommended for production use.
//! Developers should expect breaking changes and occasional instability.

#![doc(
    html_logo_url = "https://commonware.xyz/imgs/rustdoc_logo.svg",
    html_favicon_url = "https://commonware.xyz/favicon.ico"
)]

use std::{fmt::Debug, future::Future};
use thiserror::Error;

mod config;
pub use config::{Config, OperationConfig, Shortening, ValidatorConfig};
mod failure;
pub use failure::Failure;
mod fuzzer;
pub use fuzzer::{Event, Fuzzer, Ready, Summary};
#[cfg(test)]
pub mod mocks;
mod operations;
pub use operations::{FnOperation, Operation, Operations};
mod regression;
pub use regression::Regression;
mod selector;
pub use selector::Selector;
mod session;
pub use session::Session;
mod shrink;
pub use shrink::{shrink, Report};
mod signal;
pub use signal::{Interrupt, Signal, Signaler};
mod trace;
pub use trace::{reschedule, Auditor, Entry, Executor};
mod validation;
pub use validation::{Assertion, FnValidator, Probe, Validation, Validator};

/// Error returned by user-supplied operations, validators, and assertions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// [Error] specialized to the input and witness types of a [Model].
pub type ModelError<M> = Error<<M as Model>::Input, <M as Model>::Witness>;

/// State constructed by [Model::setup] and exclusively owned by one run.
pub struct Harness<M: Model> {
    /// Trusted implementation whose behavior defines correctness.
    pub reference: M::Reference,
    /// Implementation under test.
    pub actual: M::Actual,
    /// Auxiliary state shared by operations (i.e. handles, counters).
    pub state: M::State,
}

/// A user-supplied description of the system to fuzz.
///
/// Every call to [Model::setup] must produce a clean slate: the shrinker rebuilds state from
/// scratch for every candidate trace it evaluates.
pub trait Model: Sized + 'static {
    /// Trusted implementation.
    type Reference: 'static;

    /// Implementation under test.
    type Actual: 'static;

    /// Auxiliary state.
    type State: 'static;

    /// Argument tuple recorded for every executed operation.
    type Input: Clone + Debug + 'static;

    /// Argument tuple passed to assertions.
    type Witness: Clone + Debug + 'static;

    /// Construct fresh reference, actual, and auxiliary state.
    fn setup(&self) -> impl Future<Output = Result<Harness<Self>, BoxError>>;

    /// Return the named operations that may be applied to a [Harness].
    fn operations(&self, config: &Config) -> Operations<Self>;

    /// Return the validators (and the assertions they drive) checked after every operation.
    fn validation(&self, config: &Config) -> Validation<Self>;
}

/// Errors that can occur when fuzzing a [Model].
#[derive(Error, Debug)]
pub enum Error<I, W> {
    #[error("{0}")]
    Failure(Box<Failure<I, W>>),
    #[error("operation {name} failed after {} operations: {reason}", .trace.len())]
    Operation {
        name: String,
        reason: String,
        trace: Vec<Entry<I>>,
    },
    #[error("validator {name} failed outside of its assertion: {reason}")]
    Validator { name: String, reason: String },
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("unknown assertion: {0}")]
    UnknownAssertion(String),
    #[error("duplicate operation: {0}")]
    DuplicateOperation(String),
    #[error("invalid weight for operation {name}: {weight}")]
    InvalidWeight { name: String, weight: f64 },
    #[error("validator {0} has no configuration")]
    UnconfiguredValidator(String),
    #[error("setup failed: {0}")]
    Setup(String),
    #[error("shrinking aborted: {reason}")]
    Shrink {
        failure: Box<Failure<I, W>>,
        reason: String,
    },
    #[error("interrupted after {operations} operations")]
    Interrupted { operations: usize },
}

impl<I, W> Error<I, W> {
    /// Returns `true` if the error is an assertion failure found (and shrunk) by the engine,
    /// rather than a defect in the model or its configuration.
    pub fn is_engine_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns the [Failure] carried by this error, if any.
    pub fn failure(&self) -> Option<&Failure<I, W>> {
        match self {
            Self::Failure(failure) | Self::Shrink { failure, .. } => Some(failure.as_ref()),
            _ => None,
        }
    }
}
