// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tools for executing [`Feature`]s.
//!
//! # Order guarantees
//!
//! [`Feature`]s run strictly sequentially, in the given order. Concrete
//! [`Scenario`]s of a [`Feature`] run in declaration order (outline rows and
//! loop iterations expanded in place), unless shuffled. [`Step`]s always run
//! in declaration order, `Background` ones first.
//!
//! [`Step`]: crate::Step

pub mod selection;

use derive_more::with_trait::Debug;
use rand::{rngs::StdRng, seq::SliceRandom as _, SeedableRng as _};

use crate::{
    error::{AmbiguousStepError, ConfigError, Error, HookError},
    hook::{HookTarget, Phase, Point},
    model::{Feature, PendingPolicy, Scenario, State},
    step::StepMatcher,
    HookRegistry, RunContext,
};

#[doc(inline)]
pub use self::selection::Selection;

/// Name of the tag marking a work-in-progress [`Scenario`].
pub const WIP_TAG: &str = "wip";

/// Switches of a run, read once from the [`Config`].
///
/// [`Config`]: crate::Config
#[derive(Clone, Copy, Debug)]
struct Options {
    /// Stop after the first failed [`Scenario`].
    early_exit: bool,

    /// Expect `@wip` [`Scenario`]s to fail.
    wip: bool,

    /// Match [`Step`]s without invoking them.
    ///
    /// [`Step`]: crate::Step
    dry_run: bool,

    /// Treatment of [`State::Pending`].
    policy: PendingPolicy,
}

/// Outcomes of the executed [`Scenario`]s the run verdict depends on.
#[derive(Clone, Copy, Debug, Default)]
struct Tally {
    /// Some `@wip` [`Scenario`] didn't fail.
    wip_not_failed: bool,

    /// Some non-`@wip` [`Scenario`] failed.
    non_wip_failed: bool,

    /// Some [`Step`] had no implementation.
    ///
    /// [`Step`]: crate::Step
    pending: bool,
}

impl Tally {
    /// Accounts the finished `scenario`.
    fn record(&mut self, scenario: &Scenario) {
        let failed = scenario.state.is_failed();
        if scenario.all_tags.iter().any(|t| t.name == WIP_TAG) {
            self.wip_not_failed |= !failed;
        } else {
            self.non_wip_failed |= failed;
        }
    }
}

/// Position of a concrete [`Scenario`] inside its [`Feature`].
#[derive(Clone, Copy, Debug)]
struct Slot {
    /// Index in [`Feature::scenarios`].
    scenario: usize,

    /// Index among the children of a template.
    child: Option<usize>,
}

impl Slot {
    /// Lists every concrete [`Scenario`] of the `feature` in declaration
    /// order.
    fn all(feature: &Feature) -> Vec<Self> {
        feature
            .scenarios
            .iter()
            .enumerate()
            .flat_map(|(i, s)| {
                if s.is_template() {
                    (0..s.children().len())
                        .map(|c| Self { scenario: i, child: Some(c) })
                        .collect()
                } else {
                    vec![Self { scenario: i, child: None }]
                }
            })
            .collect()
    }

    /// Resolves this [`Slot`] in the `feature`.
    fn get_mut(self, feature: &mut Feature) -> &mut Scenario {
        let scenario = &mut feature.scenarios[self.scenario];
        match self.child {
            Some(c) => &mut scenario.children_mut()[c],
            None => scenario,
        }
    }
}

/// State machine walking [`Feature`]s, firing [`Hook`]s at every boundary and
/// invoking [`Step`] implementations found by a [`StepMatcher`].
///
/// A failing [`Step`] is recorded in the model and the run goes on. A
/// failing [`Hook`] or an ambiguous [`Step`] aborts the run, and `after`
/// [`Hook`]s of the aborted boundaries don't fire.
///
/// [`Hook`]: crate::Hook
/// [`Step`]: crate::Step
#[derive(Debug)]
pub struct Runner<'r> {
    /// Context handed to [`Hook`]s and [`Step`] implementations.
    ///
    /// [`Hook`]: crate::Hook
    /// [`Step`]: crate::Step
    ctx: &'r mut RunContext,

    /// [`Hook`]s to fire.
    ///
    /// [`Hook`]: crate::Hook
    hooks: &'r mut HookRegistry,

    /// Source of [`Step`] implementations.
    ///
    /// [`Step`]: crate::Step
    #[debug(skip)]
    matcher: &'r dyn StepMatcher,

    /// Filters of the run.
    selection: Selection,

    /// Switches of the run.
    options: Options,

    /// Shuffler of [`Scenario`]s, if enabled.
    #[debug(skip)]
    rng: Option<StdRng>,

    /// Verdict inputs of the current run.
    tally: Tally,
}

impl<'r> Runner<'r> {
    /// Creates a new [`Runner`] configured by the [`Config`] of the `ctx`.
    ///
    /// # Errors
    ///
    /// If a tag expression of the [`Config`] is malformed.
    ///
    /// [`Config`]: crate::Config
    pub fn new(
        ctx: &'r mut RunContext,
        hooks: &'r mut HookRegistry,
        matcher: &'r dyn StepMatcher,
    ) -> Result<Self, ConfigError> {
        let config = ctx.config();
        let selection = Selection::from_config(config)?;
        let options = Options {
            early_exit: config.early_exit,
            wip: config.wip_mode,
            dry_run: config.dry_run_mode,
            policy: config.pending_policy,
        };
        let rng = config.shuffle_scenarios.then(|| {
            let seed = config.shuffle_seed.unwrap_or_else(rand::random);
            tracing::info!(seed, "shuffling scenarios");
            StdRng::seed_from_u64(seed)
        });

        Ok(Self {
            ctx,
            hooks,
            matcher,
            selection,
            options,
            rng,
            tally: Tally::default(),
        })
    }

    /// Runs the given `features`, returning whether the run succeeded.
    ///
    /// The verdict depends on the mode:
    /// - normally, no [`Feature`] may end [`State::Failed`];
    /// - in WIP mode, every `@wip` [`Scenario`] must fail and no other may;
    /// - in dry-run mode, every [`Step`] must have an implementation.
    ///
    /// # Errors
    ///
    /// If a [`Hook`] raises or a [`Step`] matches several implementations.
    ///
    /// [`Hook`]: crate::Hook
    /// [`Step`]: crate::Step
    pub fn start(&mut self, features: &mut [Feature]) -> Result<bool, Error> {
        self.tally = Tally::default();
        let marker = self.ctx.marker().to_owned();
        tracing::info!(%marker, features = features.len(), "run started");

        self.fire(
            Phase::Before,
            Point::All,
            HookTarget::All { features: &mut *features, marker: &marker },
        )?;
        for feature in features.iter_mut() {
            if self.run_feature(feature)? {
                tracing::info!(feature = %feature.name, "exiting early");
                break;
            }
        }
        self.fire(
            Phase::After,
            Point::All,
            HookTarget::All { features: &mut *features, marker: &marker },
        )?;

        let success = self.verdict(features);
        tracing::info!(%marker, success, "run finished");
        Ok(success)
    }

    /// Runs a single `feature`, returning whether the run has to stop.
    fn run_feature(&mut self, feature: &mut Feature) -> Result<bool, Error> {
        if !self.selection.feature(feature) {
            tracing::debug!(feature = %feature.name, "feature not selected");
            return Ok(false);
        }

        tracing::info!(feature = %feature.name, "feature started");
        self.fire(
            Phase::Before,
            Point::EachFeature,
            HookTarget::Feature(feature),
        )?;

        let mut slots = Slot::all(feature);
        if let Some(rng) = &mut self.rng {
            slots.shuffle(rng);
        }

        let mut states = Vec::with_capacity(slots.len());
        for slot in slots {
            let scenario = slot.get_mut(feature);
            if !self.selection.scenario(scenario) {
                tracing::debug!(
                    scenario = %scenario.name,
                    "scenario not selected",
                );
                scenario.state = State::Skipped;
                continue;
            }

            self.run_scenario(scenario)?;
            self.tally.record(scenario);
            states.push(scenario.state);
            if self.options.early_exit && scenario.state.is_failed() {
                break;
            }
        }

        let policy = self.options.policy;
        let templates = feature.scenarios.iter_mut();
        for template in templates.filter(|s| s.is_template()) {
            template.state = template.derived_state(policy);
        }
        feature.state = State::reduce(states, policy);

        tracing::info!(
            feature = %feature.name,
            state = %feature.state,
            "feature finished",
        );
        self.fire(
            Phase::After,
            Point::EachFeature,
            HookTarget::Feature(feature),
        )?;

        Ok(self.options.early_exit && feature.state.is_failed())
    }

    /// Runs a single concrete `scenario`.
    fn run_scenario(&mut self, scenario: &mut Scenario) -> Result<(), Error> {
        tracing::debug!(
            scenario = %scenario.name,
            id = %scenario.id,
            "scenario started",
        );
        self.ctx.scenario_data_mut().clear();
        self.fire(
            Phase::Before,
            Point::EachScenario,
            HookTarget::Scenario(scenario),
        )?;

        let matcher = self.matcher;
        let mut blocked = false;
        for step in &mut scenario.steps {
            if blocked {
                step.state = State::Skipped;
                continue;
            }

            let found = matcher.resolve(step).map_err(|source| {
                AmbiguousStepError {
                    keyword: step.keyword.clone(),
                    text: step.text.clone(),
                    scenario: scenario.name.clone(),
                    source,
                }
            })?;
            let Some(found) = found else {
                tracing::warn!(
                    step = %step.text,
                    scenario = %scenario.name,
                    "step is pending",
                );
                step.state = State::Pending;
                self.tally.pending = true;
                blocked = self.options.policy == PendingPolicy::Failing;
                continue;
            };
            if self.options.dry_run {
                step.state = State::Untested;
                continue;
            }

            self.fire(Phase::Before, Point::EachStep, HookTarget::Step(step))?;
            match found.invoke(self.ctx, step) {
                Ok(()) => step.state = State::Passed,
                Err(raised) => {
                    tracing::debug!(
                        step = %step.text,
                        error = %raised,
                        "step failed",
                    );
                    step.fail(raised.into());
                    blocked = true;
                }
            }
            self.fire(Phase::After, Point::EachStep, HookTarget::Step(step))?;
        }

        scenario.state = scenario.derived_state(self.options.policy);
        tracing::debug!(
            scenario = %scenario.name,
            state = %scenario.state,
            "scenario finished",
        );
        self.fire(
            Phase::After,
            Point::EachScenario,
            HookTarget::Scenario(scenario),
        )?;
        Ok(())
    }

    /// Fires the [`Hook`]s of the `phase` and `point` for the `target`.
    ///
    /// [`Hook`]: crate::Hook
    fn fire(
        &mut self,
        phase: Phase,
        point: Point,
        target: HookTarget<'_>,
    ) -> Result<(), HookError> {
        self.hooks.call(phase, point, self.ctx, target)
    }

    /// Decides whether the run succeeded.
    fn verdict(&self, features: &[Feature]) -> bool {
        if self.options.dry_run {
            !self.tally.pending
        } else if self.options.wip {
            !self.tally.wip_not_failed && !self.tally.non_wip_failed
        } else {
            !features.iter().any(|f| f.state.is_failed())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, io, rc::Rc, sync::Arc};

    use regex::Regex;

    use super::*;
    use crate::{
        hook::Hook,
        model::{Examples, Step},
        step::Collection,
        tag::Tag,
        Config,
    };

    fn re(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap()
    }

    fn steps() -> Collection {
        Collection::new()
            .step(re("^passes$"), |_, _| {})
            .step(re("^fails$"), |_, _| Err::<(), _>(anyhow::anyhow!("boom")))
            .step(re("^panics$"), |_, _| -> () { panic!("oops") })
            .step(re("^remembers (.+)$"), |ctx, step| {
                let seen = ctx.scenario_data().len();
                let value = step.arg(0).unwrap_or_default().to_owned();
                drop(ctx.scenario_data_mut().insert(value, seen));
            })
            .step(re("^ambiguous$"), |_, _| {})
            .step(re("^ambig"), |_, _| {})
    }

    fn scenario(name: &str, texts: &[&str]) -> Scenario {
        Scenario::new("Scenario", name)
            .with_steps(texts.iter().map(|t| Step::given(*t)))
    }

    fn feature(scenarios: impl IntoIterator<Item = Scenario>) -> Feature {
        scenarios
            .into_iter()
            .fold(Feature::builder("Feature", "f"), |b, s| b.scenario(s))
            .build()
    }

    fn run(
        config: Config,
        hooks: &mut HookRegistry,
        features: &mut [Feature],
    ) -> Result<bool, Error> {
        let mut ctx = RunContext::new(Arc::new(config));
        let steps = steps();
        Runner::new(&mut ctx, hooks, &steps)?.start(features)
    }

    fn step_states(scenario: &Scenario) -> Vec<State> {
        scenario.steps.iter().map(|s| s.state).collect()
    }

    #[test]
    fn failed_step_skips_the_rest() {
        let mut features =
            [feature([scenario("s", &["passes", "fails", "passes"])])];

        let ok = run(Config::default(), &mut HookRegistry::new(), &mut features)
            .unwrap();

        let s = &features[0].scenarios[0];
        assert_eq!(
            step_states(s),
            [State::Passed, State::Failed, State::Skipped],
        );
        assert_eq!(s.state, State::Failed);
        assert_eq!(features[0].state, State::Failed);
        assert!(!ok);

        let failure = s.steps[1].failure.as_ref().unwrap();
        assert_eq!(failure.reason, "boom");
    }

    #[test]
    fn panic_is_a_step_failure() {
        let mut features = [feature([scenario("s", &["panics", "passes"])])];

        let ok = run(Config::default(), &mut HookRegistry::new(), &mut features)
            .unwrap();

        let s = &features[0].scenarios[0];
        assert_eq!(step_states(s), [State::Failed, State::Skipped]);
        let failure = s.steps[0].failure.as_ref().unwrap();
        assert_eq!(failure.name, "panic");
        assert_eq!(failure.reason, "oops");
        assert!(!ok);
    }

    #[test]
    fn dry_run_matches_without_invoking() {
        let mut features =
            [feature([scenario("s", &["passes", "fails", "panics"])])];
        let config = Config { dry_run_mode: true, ..Config::default() };
        let fired = Rc::new(RefCell::new(0));
        let mut hooks = HookRegistry::new();
        let counter = Rc::clone(&fired);
        _ = hooks.before(
            Point::EachStep,
            Hook::new(move |_: &mut RunContext, _: HookTarget<'_>| {
                *counter.borrow_mut() += 1;
            }),
        );

        let ok = run(config, &mut hooks, &mut features).unwrap();

        assert!(ok);
        assert_eq!(*fired.borrow(), 0);
        assert!(features[0].scenarios[0]
            .steps
            .iter()
            .all(|s| s.state == State::Untested));
    }

    #[test]
    fn dry_run_fails_on_pending() {
        let mut features = [feature([scenario("s", &["passes", "unknown"])])];
        let config = Config { dry_run_mode: true, ..Config::default() };

        let ok = run(config, &mut HookRegistry::new(), &mut features).unwrap();

        assert!(!ok);
        assert_eq!(
            step_states(&features[0].scenarios[0]),
            [State::Untested, State::Pending],
        );
    }

    #[test]
    fn wip_mode_inverts_success() {
        let wip = |texts: &[&str]| {
            scenario("w", texts).with_tags([Tag::new(WIP_TAG)])
        };
        let config = || Config { wip_mode: true, ..Config::default() };

        let run_wip = |features: &mut [Feature]| {
            run(config(), &mut HookRegistry::new(), features).unwrap()
        };

        assert!(!run_wip(&mut [feature([wip(&["passes"])])]));
        assert!(run_wip(&mut [feature([
            wip(&["fails"]),
            scenario("ok", &["passes"]),
        ])]));
        assert!(!run_wip(&mut [feature([
            wip(&["fails"]),
            scenario("bad", &["fails"]),
        ])]));
    }

    #[test]
    fn pending_policy() {
        let steps = ["passes", "unknown", "passes"];
        let mut neutral = [feature([scenario("s", &steps)])];
        assert!(run(Config::default(), &mut HookRegistry::new(), &mut neutral)
            .unwrap());
        let s = &neutral[0].scenarios[0];
        assert_eq!(
            step_states(s),
            [State::Passed, State::Pending, State::Passed],
        );
        assert_eq!(s.state, State::Passed);

        let mut failing = [feature([scenario("s", &steps)])];
        let config = Config {
            pending_policy: PendingPolicy::Failing,
            ..Config::default()
        };
        assert!(!run(config, &mut HookRegistry::new(), &mut failing).unwrap());
        let s = &failing[0].scenarios[0];
        assert_eq!(
            step_states(s),
            [State::Passed, State::Pending, State::Skipped],
        );
        assert_eq!(s.state, State::Failed);
    }

    #[test]
    fn failing_hook_aborts() {
        let mut features = [feature([scenario("s", &["passes", "passes"])])];
        let mut hooks = HookRegistry::new();
        _ = hooks.before(
            Point::EachStep,
            Hook::new(|_: &mut RunContext, _: HookTarget<'_>| {
                Err::<(), _>(io::Error::new(io::ErrorKind::Other, "no disk"))
            })
            .named("disk_check"),
        );
        let after_fired = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&after_fired);
        _ = hooks.after(
            Point::All,
            Hook::new(move |_: &mut RunContext, _: HookTarget<'_>| {
                *flag.borrow_mut() = true;
            }),
        );

        let err =
            run(Config::default(), &mut hooks, &mut features).unwrap_err();

        let Error::Hook(err) = err else {
            panic!("expected a hook error, got: {err}");
        };
        assert_eq!(err.hook, "disk_check");
        assert_eq!(err.phase, Phase::Before);
        assert_eq!(err.point, Point::EachStep);
        assert_eq!(err.kind(), "io::Other");
        assert_eq!(err.message(), "no disk");
        assert!(!*after_fired.borrow());
    }

    #[test]
    fn ambiguous_step_aborts() {
        let mut features = [feature([scenario("s", &["ambiguous"])])];

        let mut hooks = HookRegistry::new();
        let err =
            run(Config::default(), &mut hooks, &mut features).unwrap_err();

        let Error::AmbiguousStep(err) = err else {
            panic!("expected an ambiguity, got: {err}");
        };
        assert_eq!(err.text, "ambiguous");
        assert_eq!(err.source.possible_matches.len(), 2);
    }

    #[test]
    fn early_exit_stops_everything() {
        let mut features = [
            feature([scenario("a", &["fails"]), scenario("b", &["passes"])]),
            feature([scenario("c", &["passes"])]),
        ];
        let config = Config { early_exit: true, ..Config::default() };

        let ok = run(config, &mut HookRegistry::new(), &mut features).unwrap();

        assert!(!ok);
        assert_eq!(features[0].scenarios[0].state, State::Failed);
        assert_eq!(features[0].scenarios[1].state, State::Untested);
        assert_eq!(features[0].state, State::Failed);
        assert_eq!(features[1].state, State::Untested);
    }

    #[test]
    fn unselected_scenarios_are_skipped() {
        let mut features = [
            feature([
                scenario("a", &["passes"]).with_tags([Tag::new("fast")]),
                scenario("b", &["fails"]),
            ]),
            feature([scenario("c", &["fails"])]),
        ];
        let config = Config { tags: "@fast".into(), ..Config::default() };

        let ok = run(config, &mut HookRegistry::new(), &mut features).unwrap();

        assert!(ok);
        assert_eq!(features[0].scenarios[1].state, State::Skipped);
        assert_eq!(features[0].state, State::Passed);
        assert_eq!(features[1].state, State::Untested);
        assert_eq!(features[1].scenarios[0].steps[0].state, State::Untested);
    }

    #[test]
    fn outline_children_run_and_template_reduces() {
        let outline = scenario("o", &["<outcome>"])
            .outline(vec![Examples {
                header: vec!["outcome".into()],
                rows: vec![vec!["passes".into()], vec!["fails".into()]],
                tags: Vec::new(),
                line: 0,
            }])
            .unwrap();
        let mut features = [feature([outline])];

        let ok = run(Config::default(), &mut HookRegistry::new(), &mut features)
            .unwrap();

        let template = &features[0].scenarios[0];
        let children = template.children();
        assert_eq!(children[0].state, State::Passed);
        assert_eq!(children[1].state, State::Failed);
        assert_eq!(template.state, State::Failed);
        assert!(!ok);
    }

    #[test]
    fn scenario_data_is_cleared_between_scenarios() {
        let mut features = [feature([
            scenario("a", &["remembers x", "remembers y"]),
            scenario("b", &["remembers z"]),
        ])];
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = HookRegistry::new();
        let log = Rc::clone(&seen);
        _ = hooks.after(
            Point::EachScenario,
            Hook::new(move |ctx: &mut RunContext, _: HookTarget<'_>| {
                log.borrow_mut().push(ctx.scenario_data().len());
            }),
        );

        assert!(run(Config::default(), &mut hooks, &mut features).unwrap());
        assert_eq!(*seen.borrow(), [2, 1]);
    }

    #[test]
    fn seeded_shuffle_is_deterministic() {
        let order = |seed| {
            let mut features = [feature(
                (0..8).map(|i| scenario(&i.to_string(), &["passes"])),
            )];
            let config = Config {
                shuffle_scenarios: true,
                shuffle_seed: Some(seed),
                ..Config::default()
            };
            let names = Rc::new(RefCell::new(Vec::new()));
            let log = Rc::clone(&names);
            let mut hooks = HookRegistry::new();
            _ = hooks.before(
                Point::EachScenario,
                Hook::new(move |_: &mut RunContext, t: HookTarget<'_>| {
                    if let HookTarget::Scenario(s) = t {
                        log.borrow_mut().push(s.name.clone());
                    }
                }),
            );
            assert!(run(config, &mut hooks, &mut features).unwrap());
            names.take()
        };

        let first = order(42);
        assert_eq!(first, order(42));
        assert_eq!(first.len(), 8);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, (0..8).map(|i| i.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn hooks_fire_around_every_boundary() {
        let mut features = [feature([scenario("s", &["passes", "passes"])])];
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = HookRegistry::new();
        for point in Point::ALL {
            for phase in [Phase::Before, Phase::After] {
                let log = Rc::clone(&calls);
                _ = hooks.register(
                    phase,
                    point,
                    Hook::new(move |_: &mut RunContext, _: HookTarget<'_>| {
                        log.borrow_mut().push(format!("{phase}.{point}"));
                    }),
                );
            }
        }

        assert!(run(Config::default(), &mut hooks, &mut features).unwrap());
        assert_eq!(
            *calls.borrow(),
            [
                "before.all",
                "before.each_feature",
                "before.each_scenario",
                "before.each_step",
                "after.each_step",
                "before.each_step",
                "after.each_step",
                "after.each_scenario",
                "after.each_feature",
                "after.all",
            ],
        );
    }
}
