// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Summary`] extension reporting per-state counts at the end of a run.

use std::{fmt, io, time::Duration};

use itertools::Itertools as _;

use super::{
    console::Styles, time_recorder::RunTiming, Descriptor, ExtOption, Extension,
};
use crate::{
    hook::{Hook, HookHandle, HookTarget, Point},
    model::{Feature, State},
    Config, HookRegistry, RunContext,
};

/// Number of nodes in every [`State`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stats {
    /// Number of [`State::Passed`] nodes.
    pub passed: usize,

    /// Number of [`State::Failed`] nodes.
    pub failed: usize,

    /// Number of [`State::Skipped`] nodes.
    pub skipped: usize,

    /// Number of [`State::Pending`] nodes.
    pub pending: usize,

    /// Number of [`State::Untested`] nodes.
    pub untested: usize,
}

impl Stats {
    /// Counts a node in the given `state`.
    pub fn record(&mut self, state: State) {
        *self.get_mut(state) += 1;
    }

    /// Returns the number of nodes in the given `state`.
    #[must_use]
    pub const fn get(&self, state: State) -> usize {
        match state {
            State::Passed => self.passed,
            State::Failed => self.failed,
            State::Skipped => self.skipped,
            State::Pending => self.pending,
            State::Untested => self.untested,
        }
    }

    /// Total number of counted nodes.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.pending + self.untested
    }

    fn get_mut(&mut self, state: State) -> &mut usize {
        match state {
            State::Passed => &mut self.passed,
            State::Failed => &mut self.failed,
            State::Skipped => &mut self.skipped,
            State::Pending => &mut self.pending,
            State::Untested => &mut self.untested,
        }
    }
}

/// Counts of a finished run, stored in the [`RunContext`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Report {
    /// [`Feature`]s [`Stats`].
    pub features: Stats,

    /// Concrete [`Scenario`]s [`Stats`].
    ///
    /// [`Scenario`]: crate::Scenario
    pub scenarios: Stats,

    /// [`Step`]s [`Stats`].
    ///
    /// [`Step`]: crate::Step
    pub steps: Stats,

    /// Duration of the run.
    pub duration: Duration,
}

impl Report {
    /// Counts the given `features`.
    #[must_use]
    pub fn collect(features: &[Feature], duration: Duration) -> Self {
        let mut report = Self { duration, ..Self::default() };
        for f in features {
            report.features.record(f.state);
            for s in f.concrete_scenarios() {
                report.scenarios.record(s.state);
                for step in &s.steps {
                    report.steps.record(step.state);
                }
            }
        }
        report
    }

    /// Renders this [`Report`] with the given [`Styles`].
    #[must_use]
    pub fn render(&self, styles: &Styles) -> String {
        let line = |stats: &Stats, noun: &str| {
            let parts = State::ALL
                .iter()
                .rev()
                .filter(|s| stats.get(**s) > 0)
                .map(|s| styles.paint(*s, format!("{} {s}", stats.get(*s))))
                .join(", ");
            let noun = if stats.total() == 1 {
                noun.to_owned()
            } else {
                format!("{noun}s")
            };
            if parts.is_empty() {
                format!("{} {noun}", stats.total())
            } else {
                format!("{} {noun} ({parts})", stats.total())
            }
        };
        // Sub-millisecond precision is noise.
        let took = Duration::from_millis(
            u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX),
        );

        format!(
            "[Summary]\n{}\n{}\n{}\nTook {}\n",
            line(&self.features, "feature"),
            line(&self.scenarios, "scenario"),
            line(&self.steps, "step"),
            humantime::format_duration(took),
        )
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&Styles::plain()))
    }
}

/// Extension printing a [`Report`] once the run is finished.
#[derive(Debug)]
pub struct Summary {
    /// Registered [`Hook`].
    handle: HookHandle,
}

impl Summary {
    /// Creates a [`Descriptor`] of a [`Summary`] writing into the given
    /// `out`put without colors.
    #[must_use]
    pub fn writing_to<W>(out: W) -> Descriptor
    where
        W: io::Write + Clone + 'static,
    {
        Descriptor::of::<Self>().with_factory(move |_, hooks| {
            Ok(Self::install(hooks, out.clone(), Styles::plain()))
        })
    }

    /// Returns the handle of the reporting [`Hook`].
    #[must_use]
    pub const fn handle(&self) -> HookHandle {
        self.handle
    }

    /// Registers the reporting [`Hook`].
    fn install<W>(hooks: &mut HookRegistry, mut out: W, styles: Styles) -> Self
    where
        W: io::Write + 'static,
    {
        let handle = hooks.after(
            Point::All,
            Hook::new(move |ctx: &mut RunContext, target: HookTarget<'_>| {
                let HookTarget::All { features, .. } = target else {
                    return Ok(());
                };
                let duration = ctx.state::<RunTiming>().map_or_else(
                    || features.iter().map(Feature::duration).sum(),
                    RunTiming::duration,
                );
                let report = Report::collect(features, duration);
                ctx.insert_state(report);
                out.write_all(report.render(&styles).as_bytes())?;
                out.flush()
            })
            .named("summary::report"),
        );
        Self { handle }
    }
}

impl Extension for Summary {
    const NAME: &'static str = "summary";

    fn options() -> Vec<ExtOption> {
        vec![ExtOption::flag("no-summary", "Disables the end-of-run summary")]
    }

    fn load_if(config: &Config) -> bool {
        !config.flag("no-summary").unwrap_or_default()
    }

    fn load(
        _: &mut RunContext,
        hooks: &mut HookRegistry,
    ) -> anyhow::Result<Self> {
        Ok(Self::install(hooks, io::stdout(), Styles::new()))
    }
}
