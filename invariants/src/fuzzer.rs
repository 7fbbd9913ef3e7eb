//! Drive a single seeded run of a [Model].
//!
//! A [Fuzzer] is created for one `(seed_prefix, seed_number)` pair. [Fuzzer::setup] constructs
//! fresh state and registers every configured operation with a weighted [Selector].
//! [Ready::run] then performs exactly `num_operations` picks, validating the [Harness] after
//! each one. The first failing assertion is shrunk before it is returned.

use crate::{
    shrink, Config, Entry, Error, Executor, Harness, Interrupt, Model, ModelError, Selector,
    Validation,
};
use futures::channel::mpsc;
use tracing::{debug, info, warn};

/// Progress of a [Session](crate::Session).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// An iteration is about to start.
    Iteration,

    /// An operation completed (and was recorded).
    Operation,
}

/// The outcome of a run that did not fail.
#[derive(Clone, Debug)]
pub struct Summary<I> {
    /// Prefix of the seed the run was derived from.
    pub seed_prefix: String,

    /// Number of the seed the run was derived from.
    pub seed_number: u64,

    /// Number of operations executed.
    pub operations: u64,

    /// [Auditor](crate::Auditor) state after the last operation.
    pub digest: String,

    /// Every executed operation, in order.
    pub trace: Vec<Entry<I>>,
}

/// A run that has not constructed any state yet.
pub struct Fuzzer<'a, M: Model> {
    model: &'a M,
    config: Config,
    interrupt: Interrupt,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl<'a, M: Model> Fuzzer<'a, M> {
    /// Create a new [Fuzzer] seeded with `config.seed_prefix` and `config.seed_number`.
    pub fn new(model: &'a M, config: Config) -> Self {
        Self {
            model,
            config,
            interrupt: Interrupt::new(),
            events: None,
        }
    }

    /// Stop the run (and shrinking) once `interrupt` fires.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Report an [Event::Operation] after every executed operation.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    /// Construct fresh state and register every enabled operation.
    ///
    /// Operations without configuration are skipped (with a warning). Every validator must be
    /// configured.
    pub async fn setup(self) -> Result<Ready<'a, M>, ModelError<M>> {
        let harness = self
            .model
            .setup()
            .await
            .map_err(|err| Error::Setup(err.to_string()))?;
        let operations = self.model.operations(&self.config);
        if let Some(name) = operations.duplicate() {
            return Err(Error::DuplicateOperation(name.to_string()));
        }
        let validation = self.model.validation(&self.config);
        validation.verify(&self.config)?;

        // Register operations in table order
        let mut selector = Selector::new(self.config.seed());
        for name in operations.names() {
            let Some(policy) = self.config.operation(name) else {
                warn!(name, "operation has no configuration, skipping");
                continue;
            };
            if !policy.enabled {
                if self.config.debug {
                    debug!(name, "operation disabled, skipping");
                }
                continue;
            }
            selector
                .add(policy.weight, name.to_string())
                .map_err(|_| Error::InvalidWeight {
                    name: name.to_string(),
                    weight: policy.weight,
                })?;
        }
        if self.config.debug {
            debug!(
                seed_prefix = %self.config.seed_prefix,
                seed_number = self.config.seed_number,
                registered = selector.len(),
                "setup complete"
            );
        }

        let executor = Executor::new(harness, operations)
            .with_interrupt(self.interrupt.clone())
            .with_debug(self.config.debug);
        Ok(Ready {
            model: self.model,
            config: self.config,
            interrupt: self.interrupt,
            events: self.events,
            selector,
            executor,
            validation,
        })
    }
}

/// A run with fresh state, ready to pick operations.
pub struct Ready<'a, M: Model> {
    model: &'a M,
    config: Config,
    interrupt: Interrupt,
    events: Option<mpsc::UnboundedSender<Event>>,
    selector: Selector<String>,
    executor: Executor<M>,
    validation: Validation<M>,
}

impl<M: Model> Ready<'_, M> {
    /// Returns the state operations are applied to.
    pub fn harness(&self) -> &Harness<M> {
        self.executor.harness()
    }

    /// Returns the configuration of the run.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Perform `num_operations` weighted picks, validating after each one.
    ///
    /// If no operation can be picked (none registered or all weights zero), the run completes
    /// without executing anything. If an assertion fails, the failure is shrunk and returned as
    /// [Error::Failure]. Any other error is returned as is.
    pub async fn run(mut self) -> Result<Summary<M::Input>, ModelError<M>> {
        let mut executed = 0;
        while executed < self.config.num_operations {
            let Some(name) = self.selector.pick().cloned() else {
                break;
            };
            if self.config.debug {
                debug!(%name, "picked operation");
            }
            self.executor
                .push_and_execute(&name, self.selector.rng())
                .await?;
            executed += 1;
            if let Some(events) = &self.events {
                let _ = events.unbounded_send(Event::Operation);
            }

            // Check invariants
            match self
                .validation
                .validate(
                    self.executor.harness(),
                    self.executor.trace(),
                    &self.config,
                )
                .await
            {
                Ok(()) => {}
                Err(Error::Failure(failure)) => {
                    info!(
                        validator = %failure.validator,
                        test = %failure.test,
                        witness = ?failure.witness,
                        operations = failure.trace.len(),
                        "found failure, shrinking"
                    );
                    let failure = shrink(self.model, *failure, &self.interrupt).await?;
                    return Err(Error::Failure(Box::new(failure)));
                }
                Err(err) => return Err(err),
            }
        }

        Ok(Summary {
            seed_prefix: self.config.seed_prefix,
            seed_number: self.config.seed_number,
            operations: executed,
            digest: self.executor.auditor().state(),
            trace: self.executor.into_trace(),
        })
    }
}
