// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI (command line interface) layer.
//!
//! Core options are declared by [`Opts`]. Options of registered extensions
//! are appended at runtime, so the whole set is only known once every
//! [`Extension`] is registered.
//!
//! # Example
//!
//! ```rust
//! # use cucumber_harness::{cli, extension::Console, ExtensionRegistry};
//! #
//! let mut extensions = ExtensionRegistry::new();
//! extensions.register_extension::<Console>().unwrap();
//!
//! let (config, verbosity) =
//!     cli::parse_from(&extensions, ["harness", "-t", "@fast", "--no-ansi"])
//!         .unwrap();
//! assert_eq!(config.tags, "@fast");
//! assert!(config.flag("no-ansi").unwrap());
//! assert_eq!(verbosity, 0);
//! ```
//!
//! [`Extension`]: crate::extension::Extension

use std::{collections::HashMap, ffi::OsString, io, iter, path::PathBuf};

use clap::{ArgAction, CommandFactory as _, FromArgMatches as _};
use tracing_subscriber::{
    fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
};

use crate::{
    config::OptionValue,
    error::ConfigError,
    extension::{user_data, OptionKind},
    model::PendingPolicy,
    Config, ExtensionRegistry,
};

/// Owner of the core flags in collision reports.
const CORE: &str = "core";

/// Core CLI options of a run.
#[derive(clap::Parser, Clone, Debug, Default)]
#[command(
    name = "cucumber-harness",
    about = "Run the features, pet a dog!",
    long_about = "Run the features, pet a dog!"
)]
pub struct Opts {
    /// `.feature` files or directories containing them.
    #[arg(value_name = "FEATURE_FILES")]
    pub feature_files: Vec<PathBuf>,

    /// Directory containing step implementations, may be repeated.
    #[arg(id = "basedir", long = "basedir", short = 'b', value_name = "DIR")]
    pub basedirs: Vec<PathBuf>,

    /// Tag expression to filter scenarios by.
    ///
    /// Note: Tags from Feature, Rule and Scenario are merged together on
    /// filtering, so be careful about conflicting tags on different levels.
    #[arg(long, short = 't', value_name = "tagexpr")]
    pub tags: Option<String>,

    /// Tag expression to filter features (and rules) by.
    #[arg(long, value_name = "tagexpr")]
    pub feature_tags: Option<String>,

    /// Comma-separated ids of scenarios to run.
    #[arg(
        id = "scenarios",
        long = "scenarios",
        short = 's',
        value_name = "ids",
        value_delimiter = ','
    )]
    pub scenario_ids: Vec<u64>,

    /// Stop the run after the first failed scenario.
    #[arg(long, short = 'e')]
    pub early_exit: bool,

    /// Expect every scenario tagged `@wip` to fail.
    #[arg(long, short = 'w')]
    pub wip: bool,

    /// Match steps without invoking them.
    #[arg(long, short = 'd')]
    pub dry_run: bool,

    /// Shuffle scenarios inside every feature.
    #[arg(long)]
    pub shuffle: bool,

    /// Seed of the shuffle, random if omitted.
    #[arg(long, value_name = "seed", requires = "shuffle")]
    pub shuffle_seed: Option<u64>,

    /// String identifying the run, defaults to the current unix time.
    #[arg(long, short = 'm', value_name = "marker")]
    pub marker: Option<String>,

    /// Count pending steps as failed.
    #[arg(long)]
    pub pending_is_failure: bool,

    /// Increase logging verbosity, may be repeated.
    #[arg(long = "verbose", short = 'v', action = ArgAction::Count)]
    pub verbosity: u8,
}

impl Opts {
    /// Converts these [`Opts`] into a [`Config`], keeping the defaults of
    /// omitted options.
    #[must_use]
    pub fn into_config(self) -> Config {
        let mut config = Config {
            feature_files: self.feature_files,
            tags: self.tags.unwrap_or_default(),
            feature_tags: self.feature_tags.unwrap_or_default(),
            scenario_ids: self.scenario_ids,
            early_exit: self.early_exit,
            wip_mode: self.wip,
            dry_run_mode: self.dry_run,
            shuffle_scenarios: self.shuffle,
            shuffle_seed: self.shuffle_seed,
            pending_policy: if self.pending_is_failure {
                PendingPolicy::Failing
            } else {
                PendingPolicy::Neutral
            },
            ..Config::default()
        };
        if !self.basedirs.is_empty() {
            config.basedirs = self.basedirs;
        }
        if let Some(marker) = self.marker {
            config.marker = marker;
        }
        config
    }
}

/// Builds the [`clap::Command`] of [`Opts`] extended with the options of
/// every registered extension.
///
/// # Errors
///
/// If an extension option reuses a flag of the core or of another
/// extension.
pub fn command(
    extensions: &ExtensionRegistry,
) -> Result<clap::Command, ConfigError> {
    let mut cmd = Opts::command();

    let mut owners = HashMap::<String, String>::new();
    for flag in ["--help", "-h"] {
        drop(owners.insert(flag.to_owned(), CORE.to_owned()));
    }
    for arg in cmd.get_arguments() {
        let flags = iter::once(format!("--{}", arg.get_id()))
            .chain(arg.get_long().map(|l| format!("--{l}")))
            .chain(arg.get_short().map(|s| format!("-{s}")));
        for flag in flags {
            drop(owners.insert(flag, CORE.to_owned()));
        }
    }

    for (extension, opt) in extensions.get_options() {
        let flags = iter::once(format!("--{}", opt.long))
            .chain(opt.short.map(|s| format!("-{s}")));
        for flag in flags {
            if let Some(other) = owners.get(&flag) {
                return Err(ConfigError::OptionCollision {
                    flag,
                    extension: extension.to_owned(),
                    other: other.clone(),
                });
            }
            drop(owners.insert(flag, extension.to_owned()));
        }
        cmd = cmd.arg(opt.to_arg());
    }
    Ok(cmd)
}

/// Parses the given `args` (the binary name going first) into a [`Config`]
/// and the requested logging verbosity.
///
/// # Errors
///
/// - If options of extensions collide.
/// - If the `args` don't parse.
/// - If a tag expression or user data is malformed.
pub fn parse_from<I, T>(
    extensions: &ExtensionRegistry,
    args: I,
) -> Result<(Config, u8), ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command(extensions)?.try_get_matches_from(args)?;
    let opts = Opts::from_arg_matches(&matches)?;
    let verbosity = opts.verbosity;
    let mut config = opts.into_config();

    for (_, opt) in extensions.get_options() {
        let value = match opt.kind {
            OptionKind::Flag => OptionValue::Flag(matches.get_flag(opt.long)),
            OptionKind::Value => OptionValue::Value(
                matches.get_one::<String>(opt.long).cloned(),
            ),
            OptionKind::Multiple => OptionValue::Values(
                matches
                    .get_many::<String>(opt.long)
                    .map(|vs| vs.cloned().collect())
                    .unwrap_or_default(),
            ),
        };
        config.set_option(opt.long, value);
    }

    _ = config.tag_predicates()?;
    if let Ok(pairs) = config.values(user_data::OPTION) {
        _ = user_data::parse_pairs(pairs)?;
    }

    Ok((config, verbosity))
}

/// Installs a global [`tracing`] subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over the `verbosity`, which maps `0..=3` to
/// `warn`, `info`, `debug` and `trace`. Does nothing if a global subscriber
/// is installed already.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{
        Console, Descriptor, ExtOption, Summary, UserDataLoader,
    };

    fn extensions() -> ExtensionRegistry {
        let mut exts = ExtensionRegistry::new();
        exts.register_extension::<UserDataLoader>().unwrap();
        exts.register_extension::<Console>().unwrap();
        exts.register_extension::<Summary>().unwrap();
        exts
    }

    #[test]
    fn parses_core_options() {
        let (config, verbosity) = parse_from(
            &extensions(),
            [
                "harness",
                "features/",
                "-t",
                "@fast and not @slow",
                "--scenarios",
                "3,7",
                "--early-exit",
                "--shuffle",
                "--shuffle-seed",
                "9",
                "-m",
                "run-1",
                "--pending-is-failure",
                "-vv",
            ],
        )
        .unwrap();

        assert_eq!(config.feature_files, [PathBuf::from("features/")]);
        assert_eq!(config.basedirs, [PathBuf::from("steps")]);
        assert_eq!(config.tags, "@fast and not @slow");
        assert_eq!(config.scenario_ids, [3, 7]);
        assert!(config.early_exit);
        assert!(config.shuffle_scenarios);
        assert_eq!(config.shuffle_seed, Some(9));
        assert_eq!(config.marker, "run-1");
        assert_eq!(config.pending_policy, PendingPolicy::Failing);
        assert!(!config.dry_run_mode);
        assert_eq!(verbosity, 2);
    }

    #[test]
    fn fills_extension_options() {
        let (config, _) = parse_from(
            &extensions(),
            ["harness", "-u", "a=1", "--user-data", "b=2", "-f", "dots"],
        )
        .unwrap();

        assert_eq!(config.values("user-data").unwrap(), ["a=1", "b=2"]);
        assert_eq!(config.value("formatter").unwrap(), Some("dots"));
        assert!(!config.flag("no-summary").unwrap());
        assert!(config.flag("trace-log").is_err());
    }

    #[test]
    fn rejects_colliding_options() {
        let mut exts = extensions();
        exts.register(
            Descriptor::new("rogue", |_, _| Ok(()))
                .option(ExtOption::flag("dry-run", "Steals a core flag")),
        )
        .unwrap();

        let err = parse_from(&exts, ["harness"]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OptionCollision { ref flag, ref other, .. }
                if flag == "--dry-run" && other == CORE,
        ));

        let mut exts = extensions();
        exts.register(
            Descriptor::new("rogue", |_, _| Ok(()))
                .option(ExtOption::flag("quiet", "Steals a short").short('u')),
        )
        .unwrap();
        let err = command(&exts).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OptionCollision { ref other, .. }
                if other == "user-data",
        ));
    }

    #[test]
    fn rejects_malformed_input() {
        let err = parse_from(&extensions(), ["harness", "-u", "oops"])
            .unwrap_err();
        assert!(matches!(err, ConfigError::MalformedUserData { .. }));

        let err = parse_from(&extensions(), ["harness", "-t", "a and"])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTagExpression(_)));

        let err = parse_from(&extensions(), ["harness", "--unknown"])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Cli(_)));
    }
}
