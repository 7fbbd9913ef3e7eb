//! Named operations applied to a [Harness].

use crate::{BoxError, Harness, Model};
use futures::future::{self, LocalBoxFuture};
use rand::rngs::StdRng;
use std::{collections::BTreeSet, marker::PhantomData};

/// A step that mutates a [Harness].
///
/// An operation either applies the same step to both the reference and the actual
/// implementation or applies it to the actual implementation and compares the outcome against
/// the reference. Returning an error aborts the run (without shrinking).
pub trait Operation<M: Model> {
    /// Generate the inputs of a fresh invocation.
    ///
    /// Never called when replaying a recorded trace.
    fn input<'a>(
        &'a self,
        rng: &'a mut StdRng,
        harness: &'a Harness<M>,
    ) -> LocalBoxFuture<'a, M::Input>;

    /// Apply the step with the given `input`.
    fn apply<'a>(
        &'a self,
        harness: &'a mut Harness<M>,
        input: &'a M::Input,
    ) -> LocalBoxFuture<'a, Result<(), BoxError>>;
}

/// An [Operation] built from a pair of synchronous closures.
pub struct FnOperation<M, G, A> {
    generate: G,
    apply: A,
    _model: PhantomData<fn() -> M>,
}

impl<M, G, A> FnOperation<M, G, A>
where
    M: Model,
    G: Fn(&mut StdRng, &Harness<M>) -> M::Input,
    A: Fn(&mut Harness<M>, &M::Input) -> Result<(), BoxError>,
{
    /// Create a new [FnOperation].
    pub fn new(generate: G, apply: A) -> Self {
        Self {
            generate,
            apply,
            _model: PhantomData,
        }
    }
}

impl<M, G, A> Operation<M> for FnOperation<M, G, A>
where
    M: Model,
    G: Fn(&mut StdRng, &Harness<M>) -> M::Input,
    A: Fn(&mut Harness<M>, &M::Input) -> Result<(), BoxError>,
{
    fn input<'a>(
        &'a self,
        rng: &'a mut StdRng,
        harness: &'a Harness<M>,
    ) -> LocalBoxFuture<'a, M::Input> {
        Box::pin(future::ready((self.generate)(rng, harness)))
    }

    fn apply<'a>(
        &'a self,
        harness: &'a mut Harness<M>,
        input: &'a M::Input,
    ) -> LocalBoxFuture<'a, Result<(), BoxError>> {
        Box::pin(future::ready((self.apply)(harness, input)))
    }
}

/// The operation table of a [Model], in registration order.
///
/// Registration order determines the order in which operations are registered with the
/// [Selector](crate::Selector) and is therefore part of what a seed reproduces.
pub struct Operations<M: Model> {
    entries: Vec<(String, Box<dyn Operation<M>>)>,
}

impl<M: Model> Default for Operations<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Operations<M> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `operation` under `name`.
    pub fn with(mut self, name: impl Into<String>, operation: impl Operation<M> + 'static) -> Self {
        self.entries.push((name.into(), Box::new(operation)));
        self
    }

    /// Register a synchronous operation under `name`.
    pub fn with_fn<G, A>(self, name: impl Into<String>, generate: G, apply: A) -> Self
    where
        G: Fn(&mut StdRng, &Harness<M>) -> M::Input + 'static,
        A: Fn(&mut Harness<M>, &M::Input) -> Result<(), BoxError> + 'static,
    {
        self.with(name, FnOperation::new(generate, apply))
    }

    /// Returns the operation registered under `name`.
    pub fn get(&self, name: &str) -> Option<&dyn Operation<M>> {
        self.entries
            .iter()
            .find(|(registered, _)| registered == name)
            .map(|(_, operation)| operation.as_ref())
    }

    /// Returns the registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the first name registered more than once, if any.
    pub fn duplicate(&self) -> Option<&str> {
        let mut seen = BTreeSet::new();
        self.names().find(|name| !seen.insert(*name))
    }

    /// Returns the number of registered operations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no operation is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::Stacks;
    use futures::executor::block_on;
    use rand::SeedableRng;

    #[test]
    fn test_registration_order() {
        let operations = Stacks::new(5).operations(&Default::default());
        assert_eq!(
            operations.names().collect::<Vec<_>>(),
            vec!["push", "pop", "peek", "clear", "explode"]
        );
        assert_eq!(operations.len(), 5);
        assert!(operations.get("push").is_some());
        assert!(operations.get("missing").is_none());
        assert!(operations.duplicate().is_none());
    }

    #[test]
    fn test_duplicate() {
        let operations = Operations::<Stacks>::new()
            .with_fn("noop", |_, _| Vec::new(), |_, _| Ok(()))
            .with_fn("other", |_, _| Vec::new(), |_, _| Ok(()))
            .with_fn("noop", |_, _| Vec::new(), |_, _| Ok(()));
        assert_eq!(operations.duplicate(), Some("noop"));
    }

    #[test]
    fn test_fn_operation() {
        let model = Stacks::new(5);
        let operations = model.operations(&Default::default());
        let push = operations.get("push").unwrap();
        let mut harness = block_on(model.setup()).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let input = block_on(push.input(&mut rng, &harness));
        assert_eq!(input.len(), 1);
        block_on(push.apply(&mut harness, &input)).unwrap();
        assert_eq!(harness.reference, input);
        assert_eq!(harness.actual.items(), &input[..]);
    }
}
