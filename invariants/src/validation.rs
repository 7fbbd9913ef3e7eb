//! Check invariants between the reference and the actual implementation.

use crate::{BoxError, Config, Entry, Error, Failure, Harness, Model, ModelError};
use futures::future::{self, LocalBoxFuture};
use std::{collections::BTreeMap, marker::PhantomData};
use tracing::debug;

/// A named check over a [Harness] and the arguments it is invoked with.
///
/// Assertions must only depend on the harness and their arguments: the shrinker re-invokes the
/// failing assertion with the originally captured arguments against replayed state.
pub type Assertion<M> = dyn Fn(&Harness<M>, &<M as Model>::Witness) -> Result<(), BoxError>;

/// The wrapped assertion handed to a [Validator].
///
/// Every call to [Probe::test] is forwarded to the assertion the validator is bound to. The
/// first failing call (with its exact arguments) is remembered, even if the validator discards
/// the returned error.
pub struct Probe<'a, M: Model> {
    harness: &'a Harness<M>,
    assertion: &'a Assertion<M>,
    validator: &'a str,
    test: &'a str,
    debug: bool,
    calls: usize,
    failure: Option<(M::Witness, String)>,
}

impl<'a, M: Model> Probe<'a, M> {
    fn new(
        harness: &'a Harness<M>,
        assertion: &'a Assertion<M>,
        validator: &'a str,
        test: &'a str,
        debug: bool,
    ) -> Self {
        Self {
            harness,
            assertion,
            validator,
            test,
            debug,
            calls: 0,
            failure: None,
        }
    }

    /// Returns the state under validation.
    pub fn harness(&self) -> &'a Harness<M> {
        self.harness
    }

    /// Returns the number of times the assertion has been invoked.
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Invoke the assertion with `witness`.
    pub fn test(&mut self, witness: M::Witness) -> Result<(), BoxError> {
        if self.debug {
            debug!(validator = self.validator, test = self.test, ?witness, "testing");
        }
        self.calls += 1;
        let result = (self.assertion)(self.harness, &witness);
        if let Err(err) = &result {
            if self.failure.is_none() {
                self.failure = Some((witness, err.to_string()));
            }
        }
        result
    }
}

/// Drives an assertion with arguments derived from a [Harness].
///
/// A failure may surface arbitrarily deep inside [Validator::check]: whatever arguments were
/// passed to [Probe::test] when the assertion failed are the ones reported and replayed.
pub trait Validator<M: Model> {
    /// Check the harness exposed by `probe`, invoking its assertion as needed.
    fn check<'a, 'p>(
        &'a self,
        probe: &'a mut Probe<'p, M>,
    ) -> LocalBoxFuture<'a, Result<(), BoxError>>;
}

/// A [Validator] built from a synchronous closure.
pub struct FnValidator<M, F> {
    check: F,
    _model: PhantomData<fn() -> M>,
}

impl<M, F> FnValidator<M, F>
where
    M: Model,
    F: Fn(&mut Probe<'_, M>) -> Result<(), BoxError>,
{
    /// Create a new [FnValidator].
    pub fn new(check: F) -> Self {
        Self {
            check,
            _model: PhantomData,
        }
    }
}

impl<M, F> Validator<M> for FnValidator<M, F>
where
    M: Model,
    F: Fn(&mut Probe<'_, M>) -> Result<(), BoxError>,
{
    fn check<'a, 'p>(
        &'a self,
        probe: &'a mut Probe<'p, M>,
    ) -> LocalBoxFuture<'a, Result<(), BoxError>> {
        Box::pin(future::ready((self.check)(probe)))
    }
}

struct Registered<M: Model> {
    name: String,
    test: String,
    validator: Box<dyn Validator<M>>,
}

/// The validators of a [Model] and the assertions they are bound to.
pub struct Validation<M: Model> {
    validators: Vec<Registered<M>>,
    assertions: BTreeMap<String, Box<Assertion<M>>>,
}

impl<M: Model> Default for Validation<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Validation<M> {
    /// Create an empty suite.
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
            assertions: BTreeMap::new(),
        }
    }

    /// Register `validator` under `name`, bound to the assertion `test`.
    pub fn with_validator(
        mut self,
        name: impl Into<String>,
        test: impl Into<String>,
        validator: impl Validator<M> + 'static,
    ) -> Self {
        self.validators.push(Registered {
            name: name.into(),
            test: test.into(),
            validator: Box::new(validator),
        });
        self
    }

    /// Register a synchronous validator under `name`, bound to the assertion `test`.
    pub fn with_validator_fn<F>(
        self,
        name: impl Into<String>,
        test: impl Into<String>,
        check: F,
    ) -> Self
    where
        F: Fn(&mut Probe<'_, M>) -> Result<(), BoxError> + 'static,
    {
        self.with_validator(name, test, FnValidator::new(check))
    }

    /// Register an assertion under `name`.
    pub fn with_assertion<F>(mut self, name: impl Into<String>, assertion: F) -> Self
    where
        F: Fn(&Harness<M>, &M::Witness) -> Result<(), BoxError> + 'static,
    {
        self.assertions.insert(name.into(), Box::new(assertion));
        self
    }

    /// Returns the assertion registered under `name`.
    pub fn assertion(&self, name: &str) -> Option<&Assertion<M>> {
        self.assertions.get(name).map(|assertion| assertion.as_ref())
    }

    /// Returns the `(validator, assertion)` names of every registered validator.
    pub fn validators(&self) -> impl Iterator<Item = (&str, &str)> {
        self.validators
            .iter()
            .map(|registered| (registered.name.as_str(), registered.test.as_str()))
    }

    /// Ensure every validator is configured and bound to a registered assertion.
    pub fn verify(&self, config: &Config) -> Result<(), ModelError<M>> {
        for registered in &self.validators {
            if config.validator(&registered.name).is_none() {
                return Err(Error::UnconfiguredValidator(registered.name.clone()));
            }
            if !self.assertions.contains_key(&registered.test) {
                return Err(Error::UnknownAssertion(registered.test.clone()));
            }
        }
        Ok(())
    }

    /// Run every enabled validator against `harness`, in registration order.
    ///
    /// The first failing assertion is returned as a [Failure] snapshotting `trace` and `config`.
    pub async fn validate(
        &self,
        harness: &Harness<M>,
        trace: &[Entry<M::Input>],
        config: &Config,
    ) -> Result<(), ModelError<M>> {
        for registered in &self.validators {
            let policy = config
                .validator(&registered.name)
                .ok_or_else(|| Error::UnconfiguredValidator(registered.name.clone()))?;
            if !policy.enabled {
                continue;
            }
            let assertion = self
                .assertion(&registered.test)
                .ok_or_else(|| Error::UnknownAssertion(registered.test.clone()))?;
            if config.debug {
                debug!(validator = %registered.name, "validating");
            }

            let mut probe = Probe::new(
                harness,
                assertion,
                &registered.name,
                &registered.test,
                config.debug,
            );
            let result = registered.validator.check(&mut probe).await;
            if let Some((witness, description)) = probe.failure.take() {
                return Err(Error::Failure(Box::new(Failure {
                    validator: registered.name.clone(),
                    test: registered.test.clone(),
                    witness,
                    description,
                    trace: trace.to_vec(),
                    config: config.clone(),
                    shrink: None,
                })));
            }
            if let Err(err) = result {
                return Err(Error::Validator {
                    name: registered.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
        Ok(())
    }
}
