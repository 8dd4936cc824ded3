// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Top-level [`Harness`] wiring [`Parser`], [`ExtensionRegistry`],
//! [`HookRegistry`] and [`Runner`] together.
//!
//! [`Parser`]: crate::parser::Parser

use std::{env, ffi::OsString, process, sync::Arc};

use derive_more::with_trait::Debug;

use crate::{
    cli,
    error::{ConfigError, Error, Result},
    extension::{
        Console, Descriptor, Extension as _, Summary, TimeRecorder, TraceLog,
        UserDataLoader,
    },
    hook::{Hook, HookHandle, Phase, Point},
    parser::{self, Parser as _},
    step::{Collection, StepMatcher},
    Config, ExtensionRegistry, Feature, HookRegistry, RunContext, Runner,
};

/// Top-level BDD harness.
///
/// Parses `.feature` files, loads enabled extensions and runs [`Feature`]s
/// against the registered step implementations.
///
/// # Example
///
/// ```rust,no_run
/// # use cucumber_harness::{step::Collection, Harness};
/// # use regex::Regex;
/// #
/// let steps = Collection::new()
///     .given(Regex::new("a hungry cat").unwrap(), |_, _| {})
///     .when(Regex::new("I feed the cat").unwrap(), |_, _| {})
///     .then(Regex::new("the cat is not hungry").unwrap(), |_, _| {});
///
/// Harness::new().steps(steps).run_and_exit();
/// ```
#[derive(Debug)]
pub struct Harness {
    /// Source of step implementations.
    #[debug(skip)]
    steps: Box<dyn StepMatcher>,

    /// Registered extensions.
    extensions: ExtensionRegistry,

    /// Hooks registered by the user, extension hooks join them on load.
    hooks: HookRegistry,
}

/// Result of a finished run.
#[derive(Debug)]
pub struct Finished {
    /// Run [`Feature`]s carrying their final states.
    pub features: Vec<Feature>,

    /// Whether the run succeeded.
    pub succeeded: bool,

    /// [`RunContext`] as left by the run.
    pub context: RunContext,

    /// Extensions with their loaded instances.
    pub extensions: ExtensionRegistry,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Creates a new [`Harness`] with the built-in extensions registered and
    /// no step implementations.
    #[must_use]
    pub fn new() -> Self {
        Self::custom()
            .extension(TimeRecorder::descriptor())
            .extension(UserDataLoader::descriptor())
            .extension(Console::descriptor())
            .extension(Summary::descriptor())
            .extension(TraceLog::descriptor())
    }

    /// Creates a new [`Harness`] without any extension registered.
    #[must_use]
    pub fn custom() -> Self {
        Self {
            steps: Box::new(Collection::new()),
            extensions: ExtensionRegistry::new(),
            hooks: HookRegistry::new(),
        }
    }

    /// Replaces the source of step implementations.
    #[must_use]
    pub fn steps(mut self, steps: impl StepMatcher + 'static) -> Self {
        self.steps = Box::new(steps);
        self
    }

    /// Registers an extension, replacing an already registered one of the
    /// same name in place.
    ///
    /// This is how a built-in extension gets reconfigured, for example a
    /// [`Console`] writing somewhere else than stdout.
    #[must_use]
    pub fn extension(mut self, descriptor: Descriptor) -> Self {
        if let Some(replaced) = self.extensions.replace(descriptor) {
            tracing::debug!(extension = replaced.name(), "extension replaced");
        }
        self
    }

    /// Registers a [`Hook`] to fire before every `point`.
    #[must_use]
    pub fn before(mut self, point: Point, hook: Hook) -> Self {
        _ = self.hook(Phase::Before, point, hook);
        self
    }

    /// Registers a [`Hook`] to fire after every `point`.
    #[must_use]
    pub fn after(mut self, point: Point, hook: Hook) -> Self {
        _ = self.hook(Phase::After, point, hook);
        self
    }

    /// Registers a [`Hook`], returning its [`HookHandle`].
    pub fn hook(
        &mut self,
        phase: Phase,
        point: Point,
        hook: Hook,
    ) -> HookHandle {
        self.hooks.register(phase, point, hook)
    }

    /// Returns the registered extensions.
    #[must_use]
    pub const fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// Parses the given CLI `args` (the binary name going first), installs
    /// the [`tracing`] subscriber and runs the selected `.feature` files.
    ///
    /// # Errors
    ///
    /// If the `args` are invalid, or the run aborts.
    pub fn run_cli<I, T>(self, args: I) -> Result<Finished>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let (config, verbosity) = cli::parse_from(&self.extensions, args)?;
        cli::init_tracing(verbosity);
        self.run(config)
    }

    /// Parses [`Config::feature_files`] and runs them.
    ///
    /// # Errors
    ///
    /// If any `.feature` file fails to parse, or the run aborts.
    pub fn run(self, config: Config) -> Result<Finished> {
        let mut features = Vec::new();
        for path in &config.feature_files {
            features.extend(parser::Basic.parse(path)?);
        }
        tracing::debug!(
            basedirs = ?config.basedirs,
            features = features.len(),
            "parsed features",
        );
        self.run_features(config, features)
    }

    /// Runs already parsed `features`.
    ///
    /// # Errors
    ///
    /// - If the [`Config`] holds a malformed tag expression.
    /// - If an enabled extension fails to load.
    /// - If a [`Hook`] raises or a [`Step`] is ambiguous.
    ///
    /// [`Step`]: crate::Step
    pub fn run_features(
        self,
        config: Config,
        mut features: Vec<Feature>,
    ) -> Result<Finished> {
        let Self { steps, mut extensions, mut hooks } = self;
        let mut context = RunContext::new(Arc::new(config));

        extensions.load(&mut context, &mut hooks)?;
        tracing::debug!(extensions = ?extensions.loaded(), "extensions loaded");

        let succeeded = Runner::new(&mut context, &mut hooks, &*steps)?
            .start(&mut features)?;
        tracing::info!(succeeded, "run finished");

        Ok(Finished { features, succeeded, context, extensions })
    }

    /// Runs with the arguments of the current process, and exits it.
    ///
    /// Exits with `0` if the run succeeded, and with `1` on a failed run or
    /// any [`Error`]. Help and version requests exit with `0` after
    /// printing.
    pub fn run_and_exit(self) -> ! {
        let code = match self.run_cli(env::args_os()) {
            Ok(finished) => i32::from(!finished.succeeded),
            Err(Error::Config(ConfigError::Cli(e))) => {
                if !e.use_stderr() {
                    e.exit()
                }
                _ = e.print();
                1
            }
            Err(e) => {
                cli::init_tracing(0);
                tracing::error!("{e}");
                1
            }
        };
        process::exit(code)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        extension::{console::Buffer, Report},
        hook::HookTarget,
        model::{Scenario, State, Step},
    };
    use regex::Regex;

    fn steps() -> Collection {
        Collection::new()
            .given(Regex::new("^ok$").unwrap(), |_, _| {})
            .then(Regex::new("^boom$").unwrap(), |_, _| -> () {
                panic!("boom")
            })
    }

    fn feature() -> Feature {
        Feature::builder("Feature", "f")
            .scenario(
                Scenario::new("Scenario", "passes")
                    .with_step(Step::given("ok")),
            )
            .scenario(
                Scenario::new("Scenario", "fails")
                    .with_steps([Step::given("ok"), Step::then("boom")]),
            )
            .build()
    }

    #[test]
    fn registers_builtin_extensions() {
        let harness = Harness::new();
        let names = harness
            .extensions()
            .descriptors()
            .iter()
            .map(Descriptor::name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            ["time-recorder", "user-data", "console", "summary", "trace-log"],
        );
        assert!(Harness::custom().extensions().descriptors().is_empty());
    }

    #[test]
    fn runs_features_through_extensions() {
        let console = Buffer::new();
        let summary = Buffer::new();
        let finished = Harness::new()
            .steps(steps())
            .extension(Console::writing_to(console.clone()))
            .extension(Summary::writing_to(summary.clone()))
            .run_features(Config::default(), vec![feature()])
            .unwrap();

        assert!(!finished.succeeded);
        assert_eq!(finished.features[0].state, State::Failed);
        assert_eq!(
            finished.extensions.loaded(),
            ["time-recorder", "user-data", "console", "summary"],
        );
        assert!(finished.features[0].timing.endtime.is_some());

        let report = finished.context.state::<Report>().unwrap();
        assert_eq!(report.scenarios.passed, 1);
        assert_eq!(report.scenarios.failed, 1);
        let summary = summary.contents();
        assert!(summary.contains("2 scenarios (1 failed, 1 passed)"));
        assert!(console.contents().contains("Feature: f"));
    }

    #[test]
    fn user_hooks_fire() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);

        let finished = Harness::custom()
            .steps(steps())
            .after(
                Point::EachScenario,
                Hook::new(move |_: &mut RunContext, target: HookTarget<'_>| {
                    if let HookTarget::Scenario(s) = target {
                        log.borrow_mut().push((s.name.clone(), s.state));
                    }
                }),
            )
            .run_features(Config::default(), vec![feature()])
            .unwrap();

        assert!(!finished.succeeded);
        assert_eq!(
            *seen.borrow(),
            [
                ("passes".to_owned(), State::Passed),
                ("fails".to_owned(), State::Failed),
            ],
        );
    }

    #[test]
    fn user_after_hooks_see_recorded_timing() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut harness = Harness::new()
            .steps(steps())
            .extension(Console::writing_to(Buffer::new()))
            .extension(Summary::writing_to(Buffer::new()));
        for point in &Point::ALL[1..] {
            let point = *point;
            let log = Rc::clone(&seen);
            _ = harness.hook(
                Phase::After,
                point,
                Hook::new(move |_: &mut RunContext, target: HookTarget<'_>| {
                    let stamped = match target {
                        HookTarget::Feature(f) => f.timing.endtime.is_some(),
                        HookTarget::Scenario(s) => s.timing.endtime.is_some(),
                        HookTarget::Step(s) => s.timing.endtime.is_some(),
                        HookTarget::All { .. } => false,
                    };
                    log.borrow_mut().push((point, stamped));
                }),
            );
        }

        _ = harness
            .run_features(Config::default(), vec![feature()])
            .unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1 + 2 + 3);
        assert!(seen.iter().all(|(_, stamped)| *stamped), "{seen:?}");
    }

    #[test]
    fn broken_extension_aborts() {
        let err = Harness::custom()
            .extension(
                Descriptor::new("broken", |_, _| -> anyhow::Result<()> {
                    anyhow::bail!("nope")
                })
                .load_if(|_| true)
                .priority(1),
            )
            .run_features(Config::default(), vec![feature()])
            .unwrap_err();
        assert!(matches!(err, Error::Extension(e) if e.extension == "broken"));
    }

    #[test]
    fn cli_errors_are_config_errors() {
        let err =
            Harness::new().run_cli(["harness", "-u", "nope"]).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MalformedUserData { .. }),
        ));
    }
}
