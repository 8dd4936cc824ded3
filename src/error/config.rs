// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration and CLI input errors.

use derive_more::with_trait::{Display, Error, From};

use crate::tag::TagExprError;

/// Invalid configuration or CLI input.
#[derive(Debug, Display, Error, From)]
pub enum ConfigError {
    /// Two options share a flag.
    #[display(
        "Option `{flag}` of extension `{extension}` collides with `{other}`"
    )]
    #[from(ignore)]
    OptionCollision {
        /// Colliding flag.
        flag: String,

        /// Extension declaring the colliding option.
        extension: String,

        /// Owner of the flag declared first.
        other: String,
    },

    /// User data is not a `key=value` pair.
    #[display("Malformed user data `{input}`, expected `key=value`")]
    #[from(ignore)]
    MalformedUserData {
        /// Rejected input.
        input: String,
    },

    /// Tag expression doesn't parse.
    #[display("{_0}")]
    InvalidTagExpression(TagExprError),

    /// Extension name is registered already.
    #[display("Extension `{name}` is registered already")]
    #[from(ignore)]
    DuplicateExtension {
        /// Name of the extension.
        name: String,
    },

    /// Option isn't declared by any registered extension.
    #[display("Unknown option `{name}`")]
    #[from(ignore)]
    UnknownOption {
        /// Name of the option.
        name: String,
    },

    /// Option value doesn't parse.
    #[display("Invalid value `{value}` of option `{name}`: {reason}")]
    #[from(ignore)]
    InvalidOptionValue {
        /// Name of the option.
        name: String,

        /// Rejected value.
        value: String,

        /// Why the value is rejected.
        reason: String,
    },

    /// CLI arguments don't parse.
    #[display("{_0}")]
    Cli(clap::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_collision() {
        let err = ConfigError::OptionCollision {
            flag: "--marker".into(),
            extension: "syslog".into(),
            other: "core".into(),
        };
        assert_eq!(
            err.to_string(),
            "Option `--marker` of extension `syslog` collides with `core`",
        );
    }

    #[test]
    fn displays_malformed_user_data() {
        let err = ConfigError::MalformedUserData { input: "oops".into() };
        assert!(err.to_string().contains("expected `key=value`"));
    }
}
