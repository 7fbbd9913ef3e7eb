//! Turn a [Failure] into an example-based test.

use crate::{
    BoxError, Config, Entry, Error, Executor, Failure, Harness, Model, ModelError, Validation,
};

/// Drive a [Model] directly, without any random search.
///
/// A [Regression] owns freshly constructed state, the operation table, and the validation
/// suite of a model. Operations are invoked with caller-supplied inputs and assertions with
/// caller-supplied witnesses, so a minimized [Failure] can be written down as a plain test.
///
/// # Example
///
/// ```ignore
/// let mut regression = Regression::new(&model, &failure.config).await?;
/// regression.replay(&failure.trace).await?;
/// assert!(regression.assert(&failure.test, &failure.witness).is_err());
/// ```
pub struct Regression<M: Model> {
    executor: Executor<M>,
    validation: Validation<M>,
}

impl<M: Model> Regression<M> {
    /// Construct fresh state for `model`.
    pub async fn new(model: &M, config: &Config) -> Result<Self, ModelError<M>> {
        let harness = model
            .setup()
            .await
            .map_err(|err| Error::Setup(err.to_string()))?;
        let executor = Executor::new(harness, model.operations(config)).with_debug(config.debug);
        Ok(Self {
            executor,
            validation: model.validation(config),
        })
    }

    /// Returns the state operations are applied to.
    pub fn harness(&self) -> &Harness<M> {
        self.executor.harness()
    }

    /// Returns the operations executed so far.
    pub fn trace(&self) -> &[Entry<M::Input>] {
        self.executor.trace()
    }

    /// Returns the validation suite (and its raw assertions).
    pub fn validation(&self) -> &Validation<M> {
        &self.validation
    }

    /// Invoke the operation `name` with `input`.
    pub async fn execute(&mut self, name: &str, input: M::Input) -> Result<(), ModelError<M>> {
        self.executor.execute(name, input).await
    }

    /// Invoke every entry of `trace`, in order.
    pub async fn replay(&mut self, trace: &[Entry<M::Input>]) -> Result<(), ModelError<M>> {
        for entry in trace {
            self.executor
                .execute(&entry.name, entry.input.clone())
                .await?;
        }
        Ok(())
    }

    /// Invoke the assertion `test` with `witness` against the current state.
    pub fn assert(&self, test: &str, witness: &M::Witness) -> Result<(), BoxError> {
        let assertion = self
            .validation
            .assertion(test)
            .ok_or_else(|| format!("unknown assertion: {test}"))?;
        assertion(self.executor.harness(), witness)
    }

    /// Replay `failure`'s trace and invoke its assertion with its witness.
    ///
    /// Returns the outcome of the assertion (an error if the failure reproduces).
    pub async fn check(
        &mut self,
        failure: &Failure<M::Input, M::Witness>,
    ) -> Result<Result<(), BoxError>, ModelError<M>> {
        if self.validation.assertion(&failure.test).is_none() {
            return Err(Error::UnknownAssertion(failure.test.clone()));
        }
        self.replay(&failure.trace).await?;
        Ok(self.assert(&failure.test, &failure.witness))
    }
}
