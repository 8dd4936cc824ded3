// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Top-level [`Error`] of a run.

use std::io;

use derive_more::with_trait::{Display, Error as StdError, From};

use super::{ConfigError, ExtensionError, HookError};
use crate::{parser, step::AmbiguousMatchError};

/// Fatal error aborting a run.
///
/// Every variant maps to a non-zero exit code.
#[derive(Debug, Display, StdError, From)]
pub enum Error {
    /// Failed to parse `.feature` files.
    #[display("Failed to parse features: {_0}")]
    Parse(parser::Error),

    /// Invalid configuration or CLI input.
    #[display("Invalid configuration: {_0}")]
    Config(ConfigError),

    /// Requested extension failed to load.
    #[display("{_0}")]
    Extension(ExtensionError),

    /// Hook raised.
    #[display("{_0}")]
    Hook(HookError),

    /// Step matched several implementations.
    #[display("{_0}")]
    AmbiguousStep(AmbiguousStepError),

    /// I/O operation failed.
    #[display("I/O operation failed: {_0}")]
    Io(io::Error),
}

/// Alias of a [`Result`] with [`Error`] by default.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// [`Step`] matching several implementations.
///
/// [`Step`]: crate::Step
#[derive(Debug, Display, StdError)]
#[display(
    "Step `{keyword} {text}` of scenario `{scenario}` is ambiguous. {source}"
)]
pub struct AmbiguousStepError {
    /// Keyword of the ambiguous [`Step`].
    ///
    /// [`Step`]: crate::Step
    pub keyword: String,

    /// Text of the ambiguous [`Step`].
    ///
    /// [`Step`]: crate::Step
    pub text: String,

    /// Name of the [`Scenario`] containing the [`Step`].
    ///
    /// [`Scenario`]: crate::Scenario
    /// [`Step`]: crate::Step
    pub scenario: String,

    /// Implementations matched.
    pub source: AmbiguousMatchError,
}
