// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Config`] of a run.

use std::{
    path::PathBuf,
    slice,
    time::{SystemTime, UNIX_EPOCH},
};

use linked_hash_map::LinkedHashMap;
use smart_default::SmartDefault;

use crate::{error::ConfigError, model::PendingPolicy, tag::TagPredicate};

/// Every recognized option of a run, with its type and default.
///
/// Usually built from CLI arguments by [`cli::parse_from()`].
///
/// [`cli::parse_from()`]: crate::cli::parse_from
#[derive(Clone, Debug, SmartDefault)]
pub struct Config {
    /// `.feature` files or directories to run.
    pub feature_files: Vec<PathBuf>,

    /// Directories step implementations live in.
    #[default(_code = "vec![PathBuf::from(\"steps\")]")]
    pub basedirs: Vec<PathBuf>,

    /// Tag expression selecting [`Scenario`]s by their merged tags.
    ///
    /// [`Scenario`]: crate::Scenario
    pub tags: String,

    /// Tag expression selecting [`Feature`]s by their own tags.
    ///
    /// [`Feature`]: crate::Feature
    pub feature_tags: String,

    /// Ids of [`Scenario`]s to run. Empty runs all of them.
    ///
    /// [`Scenario`]: crate::Scenario
    pub scenario_ids: Vec<u64>,

    /// Stops the run after the first failed [`Scenario`].
    ///
    /// [`Scenario`]: crate::Scenario
    pub early_exit: bool,

    /// Expects every `@wip` [`Scenario`] to fail.
    ///
    /// [`Scenario`]: crate::Scenario
    pub wip_mode: bool,

    /// Matches steps without invoking them.
    pub dry_run_mode: bool,

    /// Shuffles [`Scenario`]s inside each [`Feature`].
    ///
    /// [`Feature`]: crate::Feature
    /// [`Scenario`]: crate::Scenario
    pub shuffle_scenarios: bool,

    /// Seed of the shuffle. Random if absent.
    pub shuffle_seed: Option<u64>,

    /// String identifying the run.
    #[default(_code = "default_marker()")]
    pub marker: String,

    /// Whether `pending` steps fail their [`Scenario`].
    ///
    /// [`Scenario`]: crate::Scenario
    pub pending_policy: PendingPolicy,

    /// Values of the options declared by extensions, keyed by long name.
    pub extension_options: LinkedHashMap<String, OptionValue>,
}

/// Value of an option declared by an extension.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OptionValue {
    /// Boolean switch.
    Flag(bool),

    /// Single optional value.
    Value(Option<String>),

    /// Repeatable value.
    Values(Vec<String>),
}

impl Config {
    /// Returns the value of the `--{name}` extension flag.
    ///
    /// # Errors
    ///
    /// If no extension declares such a flag.
    pub fn flag(&self, name: &str) -> Result<bool, ConfigError> {
        match self.option(name)? {
            OptionValue::Flag(v) => Ok(*v),
            OptionValue::Value(v) => Ok(v.is_some()),
            OptionValue::Values(v) => Ok(!v.is_empty()),
        }
    }

    /// Returns the single value of the `--{name}` extension option.
    ///
    /// # Errors
    ///
    /// If no extension declares such an option.
    pub fn value(&self, name: &str) -> Result<Option<&str>, ConfigError> {
        Ok(match self.option(name)? {
            OptionValue::Flag(_) => None,
            OptionValue::Value(v) => v.as_deref(),
            OptionValue::Values(v) => v.last().map(String::as_str),
        })
    }

    /// Returns all the values of the repeatable `--{name}` extension option.
    ///
    /// # Errors
    ///
    /// If no extension declares such an option.
    pub fn values(&self, name: &str) -> Result<&[String], ConfigError> {
        Ok(match self.option(name)? {
            OptionValue::Flag(_) => &[],
            OptionValue::Value(v) => {
                v.as_ref().map_or(&[][..], slice::from_ref)
            }
            OptionValue::Values(v) => v,
        })
    }

    /// Sets the value of the `--{name}` extension option.
    pub fn set_option(&mut self, name: impl Into<String>, value: OptionValue) {
        drop(self.extension_options.insert(name.into(), value));
    }

    /// Parses [`Config::feature_tags`] and [`Config::tags`] into
    /// [`TagPredicate`]s.
    ///
    /// # Errors
    ///
    /// If any of the expressions is malformed.
    pub fn tag_predicates(
        &self,
    ) -> Result<(TagPredicate, TagPredicate), ConfigError> {
        Ok((
            TagPredicate::parse(&self.feature_tags)?,
            TagPredicate::parse(&self.tags)?,
        ))
    }

    /// Looks up the extension option with the given `name`.
    fn option(&self, name: &str) -> Result<&OptionValue, ConfigError> {
        self.extension_options
            .get(name)
            .ok_or_else(|| ConfigError::UnknownOption { name: name.into() })
    }
}

/// Marker of a run: current unix time in seconds.
fn default_marker() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.basedirs, [PathBuf::from("steps")]);
        assert!(config.marker.parse::<u64>().unwrap() > 0);
        assert_eq!(config.pending_policy, PendingPolicy::Neutral);
        assert!(!config.dry_run_mode);
        assert!(config.scenario_ids.is_empty());
    }

    #[test]
    fn extension_options_are_typed() {
        let mut config = Config::default();
        config.set_option("no-output", OptionValue::Flag(true));
        config.set_option("formatter", OptionValue::Value(Some("dots".into())));
        config.set_option(
            "user-data",
            OptionValue::Values(vec!["a=1".into(), "b=2".into()]),
        );

        assert!(config.flag("no-output").unwrap());
        assert_eq!(config.value("formatter").unwrap(), Some("dots"));
        assert_eq!(config.values("user-data").unwrap(), ["a=1", "b=2"]);
    }

    #[test]
    fn unknown_option_is_an_error() {
        let err = Config::default().flag("nope").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownOption { name } if name == "nope",
        ));
    }

    #[test]
    fn malformed_tags_are_rejected() {
        let config = Config { tags: "a and".into(), ..Config::default() };
        assert!(matches!(
            config.tag_predicates(),
            Err(ConfigError::InvalidTagExpression(_)),
        ));
    }
}
