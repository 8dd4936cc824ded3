// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Matching [`Step`]s to their implementations.
//!
//! The [`Runner`] only depends on the [`StepMatcher`] trait; [`Collection`]
//! is its regex-based implementation.
//!
//! [`Runner`]: crate::Runner

pub mod collection;
pub mod context;
pub mod error;
pub mod location;
pub mod regex;

use derive_more::with_trait::Debug;
use itertools::Itertools as _;

use crate::{error::Raised, model::Step, RunContext};

#[doc(inline)]
pub use self::{
    collection::Collection,
    context::{CaptureName, Context},
    error::AmbiguousMatchError,
    location::Location,
    regex::HashableRegex,
};

/// Boxed body of a step implementation.
pub type StepFn = dyn Fn(&mut RunContext, &Context<'_>) -> Result<(), Raised>;

/// Step implementation matching a [`Step`], along with the captures of its
/// pattern.
#[derive(Debug)]
pub struct Match<'me> {
    /// Pattern the [`Step`] matched.
    pub regex: &'me HashableRegex,

    /// Where the implementation was registered.
    pub location: Option<Location>,

    /// Body of the implementation.
    #[debug(skip)]
    pub func: &'me StepFn,

    /// Captures of the [`Match::regex`], the whole match going first.
    pub matches: Vec<(CaptureName, String)>,
}

impl Match<'_> {
    /// Invokes the implementation for the given `step`, capturing its
    /// returned error or its panic.
    ///
    /// # Errors
    ///
    /// If the implementation returns an error or panics.
    pub fn invoke(
        &self,
        ctx: &mut RunContext,
        step: &Step,
    ) -> Result<(), Raised> {
        let context = Context { step, matches: self.matches.clone() };
        Raised::capture(|| (self.func)(ctx, &context))
    }
}

/// Source of step implementations for the [`Runner`].
///
/// [`Runner`]: crate::Runner
pub trait StepMatcher {
    /// Finds all the implementations matching the given `step`.
    fn find(&self, step: &Step) -> Vec<Match<'_>>;

    /// Resolves the single implementation matching the given `step`, if any.
    ///
    /// # Errors
    ///
    /// If the `step` matches multiple implementations.
    fn resolve(
        &self,
        step: &Step,
    ) -> Result<Option<Match<'_>>, AmbiguousMatchError> {
        let mut found = self.find(step);
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            _ => Err(AmbiguousMatchError {
                possible_matches: found
                    .into_iter()
                    .map(|m| (m.regex.clone(), m.location))
                    .sorted()
                    .collect(),
            }),
        }
    }
}
