// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Regex-based [`Collection`] of step implementations.

use derive_more::with_trait::Debug;
use regex::Regex;

use super::{
    context::Context, location::Location, regex::HashableRegex, Match,
    StepFn, StepMatcher,
};
use crate::{
    error::Outcome,
    model::{Step, StepType},
    RunContext,
};

/// Step implementation registered in a [`Collection`].
#[derive(Debug)]
struct Definition {
    /// [`StepType`] this implementation is restricted to, if any.
    ty: Option<StepType>,

    /// Pattern a [`Step`] sentence has to match.
    regex: HashableRegex,

    /// Where this implementation was registered.
    location: Option<Location>,

    /// Body of this implementation.
    #[debug(skip)]
    func: Box<StepFn>,
}

/// Collection of step implementations, each one matched by a [`Regex`].
///
/// Implementations are kept in registration order.
#[derive(Debug, Default)]
pub struct Collection {
    /// Registered implementations.
    definitions: Vec<Definition>,
}

impl Collection {
    /// Creates a new empty [`Collection`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a [Given] step implementation matching the given `regex`.
    ///
    /// The `func` may return `()` (failing by panic) or a [`Result`].
    ///
    /// [Given]: https://cucumber.io/docs/gherkin/reference#given
    #[must_use]
    #[track_caller]
    pub fn given<F, O>(self, regex: Regex, func: F) -> Self
    where
        F: Fn(&mut RunContext, &Context<'_>) -> O + 'static,
        O: Outcome,
    {
        self.push(Some(StepType::Given), regex.into(), Location::caller(), func)
    }

    /// Adds a [When] step implementation matching the given `regex`.
    ///
    /// [When]: https://cucumber.io/docs/gherkin/reference#when
    #[must_use]
    #[track_caller]
    pub fn when<F, O>(self, regex: Regex, func: F) -> Self
    where
        F: Fn(&mut RunContext, &Context<'_>) -> O + 'static,
        O: Outcome,
    {
        self.push(Some(StepType::When), regex.into(), Location::caller(), func)
    }

    /// Adds a [Then] step implementation matching the given `regex`.
    ///
    /// [Then]: https://cucumber.io/docs/gherkin/reference#then
    #[must_use]
    #[track_caller]
    pub fn then<F, O>(self, regex: Regex, func: F) -> Self
    where
        F: Fn(&mut RunContext, &Context<'_>) -> O + 'static,
        O: Outcome,
    {
        self.push(Some(StepType::Then), regex.into(), Location::caller(), func)
    }

    /// Adds a step implementation matching the given `regex` regardless of
    /// the [`StepType`].
    #[must_use]
    #[track_caller]
    pub fn step<F, O>(self, regex: Regex, func: F) -> Self
    where
        F: Fn(&mut RunContext, &Context<'_>) -> O + 'static,
        O: Outcome,
    {
        self.push(None, regex.into(), Location::caller(), func)
    }

    /// Adds a step implementation for the `ty` (or any [`StepType`]),
    /// compiling the `pattern` anchored to the whole sentence.
    ///
    /// # Errors
    ///
    /// If the `pattern` is not a valid [`Regex`].
    #[track_caller]
    pub fn define<F, O>(
        self,
        ty: Option<StepType>,
        pattern: &str,
        func: F,
    ) -> Result<Self, regex::Error>
    where
        F: Fn(&mut RunContext, &Context<'_>) -> O + 'static,
        O: Outcome,
    {
        let location = Location::caller();
        let regex = HashableRegex::anchored(pattern)?;
        Ok(self.push(ty, regex, location, func))
    }

    /// Number of registered implementations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Indicates whether no implementation is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Stores a new [`Definition`].
    fn push<F, O>(
        mut self,
        ty: Option<StepType>,
        regex: HashableRegex,
        location: Location,
        func: F,
    ) -> Self
    where
        F: Fn(&mut RunContext, &Context<'_>) -> O + 'static,
        O: Outcome,
    {
        tracing::trace!(
            pattern = regex.as_str(),
            %location,
            "registering step",
        );
        self.definitions.push(Definition {
            ty,
            regex,
            location: Some(location),
            func: Box::new(move |ctx, step| func(ctx, step).into_result()),
        });
        self
    }
}

impl StepMatcher for Collection {
    fn find(&self, step: &Step) -> Vec<Match<'_>> {
        self.definitions
            .iter()
            .filter(|d| d.ty.map_or(true, |ty| ty == step.ty))
            .filter_map(|d| {
                let caps = d.regex.captures(&step.text)?;
                let matches = d
                    .regex
                    .capture_names()
                    .zip(caps.iter())
                    .map(|(name, m)| {
                        let value = m.map(|m| m.as_str().to_owned());
                        (name.map(str::to_owned), value.unwrap_or_default())
                    })
                    .collect();
                Some(Match {
                    regex: &d.regex,
                    location: d.location,
                    func: &*d.func,
                    matches,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::Config;

    fn collection() -> Collection {
        let have = Regex::new(r"^I have (?P<count>\d+) cucumbers$").unwrap();
        Collection::new()
            .given(have, |_, _| {})
            .when(Regex::new(r"^I eat (\d+)$").unwrap(), |_, _| {})
            .step(Regex::new(r"^anything (.*)$").unwrap(), |_, _| {})
    }

    #[test]
    fn finds_by_type_and_sentence() {
        let steps = collection();

        let found = steps.find(&Step::given("I have 5 cucumbers"));
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].regex.as_str(),
            r"^I have (?P<count>\d+) cucumbers$",
        );
        assert_eq!(found[0].matches[1], (Some("count".into()), "5".into()));
        assert!(found[0].location.unwrap().path.ends_with("collection.rs"));

        assert!(steps.find(&Step::then("I have 5 cucumbers")).is_empty());
        assert_eq!(steps.find(&Step::then("anything goes")).len(), 1);
    }

    #[test]
    fn resolves_zero_one_or_ambiguous() {
        let steps = collection()
            .when(Regex::new(r"^I eat .*$").unwrap(), |_, _| {});

        assert!(steps.resolve(&Step::given("nothing")).unwrap().is_none());
        let have = Step::given("I have 1 cucumbers");
        assert!(steps.resolve(&have).unwrap().is_some());

        let err = steps.resolve(&Step::when("I eat 2")).unwrap_err();
        assert_eq!(err.possible_matches.len(), 2);
        assert_eq!(err.possible_matches[0].0.as_str(), r"^I eat (\d+)$");
    }

    #[test]
    fn invokes_with_context() {
        let steps = Collection::new()
            .define(
                Some(StepType::Given),
                r"I have (\d+) cucumbers",
                |ctx, step| {
                    let n = step.parse::<u32>(0)?;
                    _ = ctx.user_data_mut().insert("cucumbers", n);
                    anyhow::Ok(())
                },
            )
            .unwrap();
        let step = Step::given("I have 7 cucumbers");
        let mut ctx = RunContext::new(Arc::new(Config::default()));

        let found = steps.resolve(&step).unwrap().unwrap();
        found.invoke(&mut ctx, &step).unwrap();

        assert_eq!(ctx.user_data().get::<u32>("cucumbers"), Some(&7));
    }

    #[test]
    fn invocation_errors_are_raised() {
        let steps = Collection::new()
            .given::<_, ()>(Regex::new("^boom$").unwrap(), |_, _| panic!("exploded"));
        let step = Step::given("boom");
        let mut ctx = RunContext::new(Arc::new(Config::default()));

        let raised = steps
            .resolve(&step)
            .unwrap()
            .unwrap()
            .invoke(&mut ctx, &step)
            .unwrap_err();
        assert_eq!(raised.kind, "panic");
        assert_eq!(raised.message, "exploded");
    }
}
