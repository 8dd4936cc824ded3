// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tools for parsing [Gherkin] files into [`Feature`]s.
//!
//! [Gherkin]: https://cucumber.io/docs/gherkin/reference

pub mod basic;

use std::{io, path::PathBuf};

use derive_more::with_trait::{Display, Error as StdError, From};

use crate::{model::ExpandExamplesError, Feature};

#[doc(inline)]
pub use self::basic::Basic;

/// Source of parsed [`Feature`]s.
pub trait Parser<I> {
    /// Parses the given `input` into [`Feature`]s, in a stable order.
    ///
    /// # Errors
    ///
    /// If any [`Feature`] fails to parse or convert.
    fn parse(self, input: I) -> Result<Vec<Feature>>;
}

/// Result of parsing [Gherkin] files.
///
/// [Gherkin]: https://cucumber.io/docs/gherkin/reference
pub type Result<T> = std::result::Result<T, Error>;

/// [`Parser`] error.
#[derive(Debug, Display, StdError, From)]
pub enum Error {
    /// Failed to parse a `.feature` file.
    #[display("Failed to parse feature: {_0}")]
    Parsing(gherkin::ParseFileError),

    /// Failed to expand `Examples`.
    #[display("Failed to expand examples in `{}`: {source}", path.display())]
    #[from(ignore)]
    ExampleExpansion {
        /// Path of the `.feature` file.
        path: PathBuf,

        /// Expansion error.
        source: ExpandExamplesError,
    },

    /// Failed to walk a directory of `.feature` files.
    #[display("Failed to walk `{}`: {source}", path.display())]
    #[from(ignore)]
    Walk {
        /// Walked directory.
        path: PathBuf,

        /// Walking error.
        source: globwalk::GlobError,
    },

    /// Failed to access a path.
    #[display("Failed to access `{}`: {source}", path.display())]
    #[from(ignore)]
    Io {
        /// Accessed path.
        path: PathBuf,

        /// I/O error.
        source: io::Error,
    },

    /// `@loop` tag without a valid iteration count.
    #[display("Invalid `@loop({arg})` of scenario `{scenario}`")]
    #[from(ignore)]
    InvalidLoop {
        /// Argument of the tag.
        arg: String,

        /// Name of the tagged scenario.
        scenario: String,
    },

    /// `@precondition` tag not of the `<file>:<scenario>` form.
    #[display(
        "Malformed `@precondition({arg})` of scenario `{scenario}`, expected \
         `<file>:<scenario>`"
    )]
    #[from(ignore)]
    MalformedPrecondition {
        /// Argument of the tag.
        arg: String,

        /// Name of the tagged scenario.
        scenario: String,
    },

    /// `@precondition` tag referencing an unknown scenario.
    #[display(
        "Precondition scenario `{reference}` not found in `{}`",
        path.display(),
    )]
    #[from(ignore)]
    PreconditionNotFound {
        /// Scenario reference: a 1-based index or a name.
        reference: String,

        /// Path of the referenced `.feature` file.
        path: PathBuf,
    },

    /// `@precondition` tags forming a cycle.
    #[display("Precondition cycle detected: {}", chain.join(" -> "))]
    #[from(ignore)]
    PreconditionCycle {
        /// Scenarios forming the cycle, the repeated one last.
        chain: Vec<String>,
    },
}
