// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`HookError`] definition.

use derive_more::with_trait::{Display, Error};

use super::Raised;
use crate::hook::{Phase, Point};

/// Hook raised an error or panicked, aborting the run.
#[derive(Clone, Debug, Display, Error)]
#[display("Hook `{hook}` failed in `{phase}.{point}`: {source}")]
pub struct HookError {
    /// Name of the failed hook.
    pub hook: String,

    /// [`Phase`] the hook was fired in.
    pub phase: Phase,

    /// [`Point`] the hook was fired at.
    pub point: Point,

    /// What the hook raised.
    pub source: Raised,
}

impl HookError {
    /// Returns the kind of what the hook raised.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.source.kind
    }

    /// Returns the message of what the hook raised.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.source.message
    }
}
