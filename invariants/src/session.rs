//! Run many independently seeded iterations of a [Model].

use crate::{Config, Event, Fuzzer, Interrupt, Model, ModelError, Signal};
use commonware_utils::hex;
use futures::channel::mpsc;
use rand::{thread_rng, RngCore};
use std::time::Instant;
use tracing::{debug, info};

/// Number of random bytes in a generated seed prefix.
const RANDOM_PREFIX_LENGTH: usize = 16;

/// Runs `num_iterations` [Fuzzer]s in sequence, stopping at the first failure.
///
/// Iteration `i` is seeded with `(seed_prefix, seed_number + i)`. If `random_seed` is set, the
/// prefix is replaced (once, on creation) with a fresh random prefix that is reported in every
/// [Failure](crate::Failure).
pub struct Session<'a, M: Model> {
    model: &'a M,
    config: Config,
    signal: Option<Signal>,
    events: mpsc::UnboundedSender<Event>,
}

impl<'a, M: Model> Session<'a, M> {
    /// Create a new [Session] and the receiver of its progress [Event]s.
    ///
    /// Dropping the receiver does not affect the session.
    pub fn new(model: &'a M, mut config: Config) -> (Self, mpsc::UnboundedReceiver<Event>) {
        if config.random_seed {
            let mut prefix = [0u8; RANDOM_PREFIX_LENGTH];
            thread_rng().fill_bytes(&mut prefix);
            config.seed_prefix = hex(&prefix);
            config.random_seed = false;
        }
        let (events, receiver) = mpsc::unbounded();
        (
            Self {
                model,
                config,
                signal: None,
                events,
            },
            receiver,
        )
    }

    /// Stop the session (between operations) once `signal` resolves.
    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Returns the (resolved) seed prefix of every iteration.
    pub fn seed_prefix(&self) -> &str {
        &self.config.seed_prefix
    }

    /// Returns the configuration of the session.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every iteration, returning the number of iterations completed.
    ///
    /// The first iteration to fail aborts the session with its (shrunk) failure. If the signal
    /// resolves or the deadline passes, the session stops with
    /// [Error::Interrupted](crate::Error::Interrupted).
    pub async fn run(self) -> Result<u64, ModelError<M>> {
        let start = Instant::now();
        let mut interrupt = Interrupt::new();
        if let Some(signal) = self.signal {
            interrupt = interrupt.with_signal(signal);
        }
        if let Some(deadline) = self.config.deadline {
            interrupt = interrupt.with_timeout(deadline);
        }

        for iteration in 0..self.config.num_iterations {
            let mut config = self.config.clone();
            config.seed_number = self.config.seed_number.wrapping_add(iteration);
            if config.debug {
                debug!(
                    seed_prefix = %config.seed_prefix,
                    seed_number = config.seed_number,
                    "starting iteration"
                );
            }
            let _ = self.events.unbounded_send(Event::Iteration);
            Fuzzer::new(self.model, config)
                .with_interrupt(interrupt.clone())
                .with_events(self.events.clone())
                .setup()
                .await?
                .run()
                .await?;
        }
        info!(
            seed_prefix = %self.config.seed_prefix,
            iterations = self.config.num_iterations,
            elapsed = ?start.elapsed(),
            "session complete"
        );
        Ok(self.config.num_iterations)
    }
}
