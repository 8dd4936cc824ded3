// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Identifiers of [`Feature`]s and [`Scenario`]s.
//!
//! [`Feature`]: crate::Feature
//! [`Scenario`]: crate::Scenario

use std::sync::{Mutex, PoisonError};

use derive_more::with_trait::{Display, From, Into};

/// Monotonic counter handing out strictly increasing ids, starting at `1`.
#[derive(Debug, Default)]
pub struct IdCounter(Mutex<u64>);

impl IdCounter {
    /// Creates a new [`IdCounter`].
    #[must_use]
    pub const fn new() -> Self {
        Self(Mutex::new(0))
    }

    /// Returns the next id.
    pub fn next_id(&self) -> u64 {
        let mut last = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *last += 1;
        *last
    }
}

/// Counter of [`FeatureId`]s for the whole process.
pub(crate) static FEATURE_IDS: IdCounter = IdCounter::new();

/// Counter of [`ScenarioId`]s for the whole process, shared by all
/// [`Feature`]s.
///
/// [`Feature`]: crate::Feature
pub(crate) static SCENARIO_IDS: IdCounter = IdCounter::new();

/// Id of a [`Feature`].
///
/// [`Feature`]: crate::Feature
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    Eq,
    From,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
)]
pub struct FeatureId(u64);

impl FeatureId {
    /// Allocates the next [`FeatureId`].
    #[must_use]
    pub fn next() -> Self {
        Self(FEATURE_IDS.next_id())
    }

    /// Returns the raw value of this [`FeatureId`].
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Id of a [`Scenario`].
///
/// [`Scenario`]: crate::Scenario
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    Eq,
    From,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
)]
pub struct ScenarioId(u64);

impl ScenarioId {
    /// Allocates the next [`ScenarioId`].
    #[must_use]
    pub fn next() -> Self {
        Self(SCENARIO_IDS.next_id())
    }

    /// Returns the raw value of this [`ScenarioId`].
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use super::*;

    #[test]
    fn counter_starts_at_one() {
        let counter = IdCounter::new();
        assert_eq!(counter.next_id(), 1);
        assert_eq!(counter.next_id(), 2);
    }

    #[test]
    fn concurrent_increments_yield_distinct_ids() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 250;

        let counter = Arc::new(IdCounter::new());
        let handles = (0..THREADS)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|_| counter.next_id())
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        let ids = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<HashSet<_>>();

        assert_eq!(ids.len() as u64, THREADS * PER_THREAD);
        assert_eq!(ids, (1..=THREADS * PER_THREAD).collect());
    }

    #[test]
    fn scenario_ids_increase() {
        let a = ScenarioId::next();
        let b = ScenarioId::next();
        assert!(b > a);
    }
}
