// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Behavior-driven test runner for [Gherkin] features.
//!
//! `.feature` files are parsed into an execution model of [`Feature`]s,
//! [`Scenario`]s and [`Step`]s. A [`Runner`] walks that model, matching
//! every [`Step`] against compiled implementations and reducing the outcomes
//! into a [`State`] per node. Everything around it (timing, output, user
//! data, summaries) plugs in as [`Hook`]s registered by extensions.
//!
//! # Example
//!
//! ```rust
//! # use cucumber_harness::{
//! #     step::Collection, Config, Feature, Harness, Scenario, State, Step,
//! # };
//! # use regex::Regex;
//! #
//! let steps = Collection::new()
//!     .given(Regex::new("a hungry cat").unwrap(), |_, _| {})
//!     .then(Regex::new("the cat is not hungry").unwrap(), |_, _| {});
//!
//! let feature = Feature::builder("Feature", "Animals")
//!     .scenario(Scenario::new("Scenario", "Feeding").with_steps([
//!         Step::given("a hungry cat"),
//!         Step::then("the cat is not hungry"),
//!     ]))
//!     .build();
//!
//! let finished = Harness::custom()
//!     .steps(steps)
//!     .run_features(Config::default(), vec![feature])
//!     .unwrap();
//! assert!(finished.succeeded);
//! assert_eq!(finished.features[0].state, State::Passed);
//! ```
//!
//! [Gherkin]: https://cucumber.io/docs/gherkin/reference

#![deny(nonstandard_style, trivial_casts, trivial_numeric_casts)]
#![forbid(non_ascii_idents, unsafe_code)]
#![warn(
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::missing_docs_in_private_items,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_results
)]
#![cfg_attr(
    test,
    allow(clippy::expect_used, clippy::unwrap_used, unused_results)
)]

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod extension;
pub mod harness;
pub mod hook;
pub mod id;
pub mod model;
pub mod parser;
pub mod runner;
pub mod step;
pub mod tag;

pub use gherkin;

#[doc(inline)]
pub use self::{
    config::Config,
    context::{RunContext, UserData},
    error::{Error, Result},
    extension::{Extension, ExtensionRegistry},
    harness::{Finished, Harness},
    hook::{Hook, HookHandle, HookRegistry, HookTarget, Phase, Point},
    model::{
        Failure, Feature, PendingPolicy, Scenario, ScenarioKind, State, Step,
        StepType,
    },
    parser::Parser,
    runner::Runner,
    step::{Collection, Context, StepMatcher},
    tag::{Tag, TagPredicate},
};
