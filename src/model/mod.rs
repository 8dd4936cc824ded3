// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution model: the [`Feature`] → [`Scenario`] → [`Step`] tree built once
//! by a parser and mutated in place by the [`Runner`].
//!
//! [`Runner`]: crate::Runner

pub mod feature;
pub mod scenario;
pub mod state;
pub mod step;

#[doc(inline)]
pub use self::{
    feature::{Background, Feature, FeatureBuilder},
    scenario::{
        ExampleRow, Examples, ExpandExamplesError, Origin, Scenario,
        ScenarioKind,
    },
    state::{PendingPolicy, State, Timing},
    step::{
        BackgroundRef, Failure, PreconditionRef, Step, StepType, Table,
    },
};
