// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution [`State`] of model nodes and its reduction.

use std::time::{Duration, SystemTime};

use derive_more::with_trait::Display;

/// Execution state of a [`Feature`], [`Scenario`] or [`Step`].
///
/// [`Feature`]: crate::Feature
/// [`Scenario`]: crate::Scenario
/// [`Step`]: crate::Step
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq)]
pub enum State {
    /// Not run (yet).
    #[default]
    #[display("untested")]
    Untested,

    /// Deliberately not run.
    #[display("skipped")]
    Skipped,

    /// No implementation was found.
    #[display("pending")]
    Pending,

    /// Ran successfully.
    #[display("passed")]
    Passed,

    /// Ran and failed.
    #[display("failed")]
    Failed,
}

impl State {
    /// All the [`State`]s, in their reduction order (weakest first).
    pub const ALL: [Self; 5] = [
        Self::Untested,
        Self::Skipped,
        Self::Pending,
        Self::Passed,
        Self::Failed,
    ];

    /// Weight of this [`State`] in a reduction.
    const fn rank(self) -> u8 {
        match self {
            Self::Untested => 0,
            Self::Skipped => 1,
            Self::Pending => 2,
            Self::Passed => 3,
            Self::Failed => 4,
        }
    }

    /// Reduces the `states` of child nodes into the [`State`] of their
    /// parent: `FAILED > PASSED > PENDING > SKIPPED > UNTESTED`.
    ///
    /// With [`PendingPolicy::Failing`] any [`State::Pending`] child counts as
    /// [`State::Failed`].
    #[must_use]
    pub fn reduce<I>(states: I, policy: PendingPolicy) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        states
            .into_iter()
            .map(|s| policy.apply(s))
            .max_by_key(|s| s.rank())
            .unwrap_or_default()
    }

    /// Indicates whether this [`State`] is [`State::Failed`].
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Policy of treating [`State::Pending`] [`Step`]s in reductions.
///
/// [`Step`]: crate::Step
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum PendingPolicy {
    /// [`State::Pending`] is its own bucket and fails nothing.
    #[default]
    #[display("neutral")]
    Neutral,

    /// [`State::Pending`] fails the enclosing [`Scenario`].
    ///
    /// [`Scenario`]: crate::Scenario
    #[display("failing")]
    Failing,
}

impl PendingPolicy {
    /// Maps the given `state` according to this [`PendingPolicy`].
    #[must_use]
    pub const fn apply(self, state: State) -> State {
        match (self, state) {
            (Self::Failing, State::Pending) => State::Failed,
            (_, s) => s,
        }
    }
}

/// Start and end timestamps of a model node.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Timing {
    /// When the node started running.
    pub starttime: Option<SystemTime>,

    /// When the node finished running.
    pub endtime: Option<SystemTime>,
}

impl Timing {
    /// Returns `endtime - starttime` if both are set, or zero otherwise.
    #[must_use]
    pub fn duration(&self) -> Duration {
        match (self.starttime, self.endtime) {
            (Some(start), Some(end)) => {
                end.duration_since(start).unwrap_or_default()
            }
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{seq::SliceRandom as _, Rng as _};

    use super::*;

    #[test]
    fn empty_reduces_to_untested() {
        assert_eq!(State::reduce([], PendingPolicy::Neutral), State::Untested);
    }

    #[test]
    fn failed_outranks_everything() {
        let states = [State::Passed, State::Failed, State::Skipped];
        let reduced = State::reduce(states, PendingPolicy::Neutral);
        assert_eq!(reduced, State::Failed);
    }

    #[test]
    fn passed_outranks_skipped_and_pending() {
        let states = [State::Skipped, State::Passed, State::Pending];
        let reduced = State::reduce(states, PendingPolicy::Neutral);
        assert_eq!(reduced, State::Passed);
    }

    #[test]
    fn pending_fails_under_failing_policy() {
        let states = [State::Passed, State::Pending];
        let failing = State::reduce(states, PendingPolicy::Failing);
        assert_eq!(failing, State::Failed);
        let neutral = State::reduce(states, PendingPolicy::Neutral);
        assert_eq!(neutral, State::Passed);
    }

    #[test]
    fn reduction_is_order_independent_max() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let len = rng.gen_range(0..8);
            let mut states = (0..len)
                .map(|_| State::ALL[rng.gen_range(0..State::ALL.len())])
                .collect::<Vec<_>>();

            let expected = State::ALL
                .iter()
                .rev()
                .copied()
                .find(|s| states.contains(s))
                .unwrap_or(State::Untested);

            assert_eq!(
                State::reduce(states.clone(), PendingPolicy::Neutral),
                expected,
            );
            states.shuffle(&mut rng);
            assert_eq!(
                State::reduce(states, PendingPolicy::Neutral),
                expected,
            );
        }
    }

    #[test]
    fn duration_requires_both_timestamps() {
        let now = SystemTime::now();
        let mut timing = Timing { starttime: Some(now), endtime: None };
        assert_eq!(timing.duration(), Duration::ZERO);

        timing.endtime = Some(now + Duration::from_millis(15));
        assert_eq!(timing.duration(), Duration::from_millis(15));
    }
}
