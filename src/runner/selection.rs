// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Selection`] of [`Feature`]s and [`Scenario`]s to run.

use crate::{
    error::ConfigError,
    model::{Feature, Scenario},
    tag::TagPredicate,
    Config,
};

/// Id and tag filters of a run.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    /// [`Scenario`] ids to run. Empty selects all.
    pub ids: Vec<u64>,

    /// Predicate over [`Feature`] (and `Rule`) tags.
    pub feature_tags: TagPredicate,

    /// Predicate over merged [`Scenario`] tags.
    pub scenario_tags: TagPredicate,
}

impl Selection {
    /// Builds the [`Selection`] of the given [`Config`].
    ///
    /// # Errors
    ///
    /// If a tag expression of the [`Config`] is malformed.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let (feature_tags, scenario_tags) = config.tag_predicates()?;
        Ok(Self {
            ids: config.scenario_ids.clone(),
            feature_tags,
            scenario_tags,
        })
    }

    /// Indicates whether anything within the `feature` is selected.
    #[must_use]
    pub fn feature(&self, feature: &Feature) -> bool {
        feature.has_to_run(&self.ids, &self.feature_tags, &self.scenario_tags)
    }

    /// Indicates whether the concrete `scenario` is selected.
    #[must_use]
    pub fn scenario(&self, scenario: &Scenario) -> bool {
        scenario.has_to_run(&self.ids, &self.feature_tags, &self.scenario_tags)
    }
}
