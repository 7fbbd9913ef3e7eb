//! Reduce a failing trace to a shorter trace that fails the same way.

use crate::{Entry, Error, Executor, Failure, Interrupt, Model, ModelError};
use std::rc::Rc;
use tracing::{debug, info, trace};

/// Outcome of shrinking a [Failure].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// Length of the trace before shrinking.
    pub original: usize,

    /// Number of candidate traces evaluated.
    pub attempts: u64,

    /// Number of candidates accepted as the new shortest trace.
    pub accepted: u64,

    /// Number of candidates whose replay failed (before the assertion could be checked).
    pub discarded: u64,

    /// Whether the budget ran out with candidates left to evaluate.
    pub exhausted: bool,

    /// Whether shrinking stopped early because the [Interrupt] fired.
    pub interrupted: bool,
}

// A candidate is the trace with the entry at the given index removed. Candidates derived from
// the same trace share it.
type Candidate<I> = (usize, Rc<[Entry<I>]>);

fn removals<I>(stack: &mut Vec<Candidate<I>>, trace: Rc<[Entry<I>]>) {
    for index in 0..trace.len() {
        stack.push((index, trace.clone()));
    }
}

/// Search for a shorter trace that still fails `failure`'s assertion with `failure`'s witness.
///
/// Every candidate removes a single entry from a previously accepted trace (most recently
/// generated candidates are tried first). A candidate is evaluated by replaying it against
/// freshly constructed state and invoking the failing assertion with the originally captured
/// witness. A candidate that still fails and is shorter than the best trace found so far becomes
/// the new best (with its description) and spawns candidates of its own.
///
/// At most `failure.config.shortening.iterations` candidates are evaluated. Candidates whose
/// replay fails are discarded. If the model cannot construct fresh state, shrinking stops with
/// [Error::Shrink] (carrying the best failure found so far). If `interrupt` fires, shrinking
/// stops early and the best failure found so far is returned.
pub async fn shrink<M: Model>(
    model: &M,
    failure: Failure<M::Input, M::Witness>,
    interrupt: &Interrupt,
) -> Result<Failure<M::Input, M::Witness>, ModelError<M>> {
    let mut best = failure;
    let budget = best.config.shortening.iterations;
    let debug = best.config.debug;
    let mut report = Report {
        original: best.trace.len(),
        ..Default::default()
    };
    let validation = model.validation(&best.config);
    let Some(assertion) = validation.assertion(&best.test) else {
        return Err(Error::UnknownAssertion(best.test.clone()));
    };

    let mut stack = Vec::new();
    removals(&mut stack, best.trace.clone().into());
    while report.attempts < budget {
        let Some((index, candidate)) = stack.pop() else {
            break;
        };
        if candidate.is_empty() {
            continue;
        }
        if interrupt.fired() {
            report.interrupted = true;
            break;
        }
        report.attempts += 1;
        let next: Vec<_> = candidate
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, entry)| entry.clone())
            .collect();

        // Rebuild state from scratch
        let harness = match model.setup().await {
            Ok(harness) => harness,
            Err(err) => {
                best.shrink = Some(report);
                return Err(Error::Shrink {
                    failure: Box::new(best),
                    reason: err.to_string(),
                });
            }
        };
        let mut executor = Executor::new(harness, model.operations(&best.config))
            .with_trace(next)
            .with_interrupt(interrupt.clone());
        match executor.replay().await {
            Ok(()) => {}
            Err(Error::Interrupted { .. }) => {
                report.interrupted = true;
                break;
            }
            Err(err) => {
                if debug {
                    trace!(index, length = candidate.len(), %err, "discarded candidate");
                }
                report.discarded += 1;
                continue;
            }
        }

        let Err(err) = assertion(executor.harness(), &best.witness) else {
            continue;
        };
        if executor.trace().len() >= best.trace.len() {
            continue;
        }
        report.accepted += 1;
        best.description = err.to_string();
        best.trace = executor.into_trace();
        if debug {
            debug!(length = best.trace.len(), attempts = report.attempts, "accepted candidate");
        }
        removals(&mut stack, best.trace.clone().into());
    }
    report.exhausted = !report.interrupted && stack.iter().any(|(_, trace)| !trace.is_empty());

    info!(
        test = %best.test,
        original = report.original,
        shrunk = best.trace.len(),
        attempts = report.attempts,
        exhausted = report.exhausted,
        interrupted = report.interrupted,
        "shrunk failure"
    );
    best.shrink = Some(report);
    Ok(best)
}
