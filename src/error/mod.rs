// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error taxonomy of a run.
//!
//! - Structural errors ([`Error`]) abort the whole run: an ambiguous step
//!   match, a failing hook, a broken extension, malformed configuration.
//! - Failures of user-written step bodies never show up here: they're
//!   captured as [`Raised`] and turned into a [`Failure`] on the [`Step`].
//!
//! [`Failure`]: crate::Failure
//! [`Step`]: crate::Step

pub mod config;
pub mod core;
pub mod extension;
pub mod hook;
pub mod raised;

#[doc(inline)]
pub use self::{
    config::ConfigError,
    core::{AmbiguousStepError, Error, Result},
    extension::ExtensionError,
    hook::HookError,
    raised::{Outcome, Raised},
};
