// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Feature`] model and its [`FeatureBuilder`].

use std::{path::PathBuf, time::Duration};

use super::{
    scenario::{merge_tags, Scenario},
    state::{PendingPolicy, State, Timing},
    step::Step,
};
use crate::{
    id::FeatureId,
    tag::{Tag, TagPredicate},
};

/// `Background` of a [`Feature`] (or of a `Rule`): [`Step`]s implicitly
/// run before every [`Scenario`].
#[derive(Clone, Debug, Default)]
pub struct Background {
    /// Keyword as written.
    pub keyword: String,

    /// Name of this [`Background`].
    pub name: String,

    /// [`Step`]s to prepend.
    pub steps: Vec<Step>,
}

/// Top-level unit of a `.feature` file: a named group of [`Scenario`]s.
#[derive(Clone, Debug)]
pub struct Feature {
    /// Id of this [`Feature`].
    pub id: FeatureId,

    /// Keyword as written.
    pub keyword: String,

    /// Name (sentence) of this [`Feature`].
    pub name: String,

    /// Description lines.
    pub description: Vec<String>,

    /// Path of the `.feature` file this [`Feature`] was parsed from.
    pub path: Option<PathBuf>,

    /// Line in the `.feature` file.
    pub line: usize,

    /// Tags of this [`Feature`].
    pub tags: Vec<Tag>,

    /// [`Background`], if any.
    pub background: Option<Background>,

    /// [`Scenario`]s, including templates and `Rule` ones, in file order.
    pub scenarios: Vec<Scenario>,

    /// Execution [`State`].
    pub state: State,

    /// Start and end timestamps.
    pub timing: Timing,
}

impl Feature {
    /// Starts building a new [`Feature`].
    #[must_use]
    pub fn builder(
        keyword: impl Into<String>,
        name: impl Into<String>,
    ) -> FeatureBuilder {
        FeatureBuilder::new(keyword, name)
    }

    /// Tags used for hook gating.
    #[must_use]
    pub fn all_tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Iterates over all the directly executable [`Scenario`]s, expanding
    /// templates into their children.
    pub fn concrete_scenarios(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter().flat_map(Scenario::concrete)
    }

    /// Indicates whether anything inside this [`Feature`] is selected by the
    /// given filters.
    #[must_use]
    pub fn has_to_run(
        &self,
        ids: &[u64],
        feature_tags: &TagPredicate,
        scenario_tags: &TagPredicate,
    ) -> bool {
        feature_tags.matches(&self.tags)
            && self
                .scenarios
                .iter()
                .any(|s| s.has_to_run(ids, feature_tags, scenario_tags))
    }

    /// Recomputes the [`State`] from the concrete [`Scenario`]s.
    #[must_use]
    pub fn derived_state(&self, policy: PendingPolicy) -> State {
        State::reduce(self.concrete_scenarios().map(|s| s.state), policy)
    }

    /// Counts the concrete [`Scenario`]s.
    #[must_use]
    pub fn count_scenarios(&self) -> usize {
        self.concrete_scenarios().count()
    }

    /// Counts the [`Step`]s of the concrete [`Scenario`]s.
    #[must_use]
    pub fn count_steps(&self) -> usize {
        self.concrete_scenarios().map(|s| s.steps.len()).sum()
    }

    /// Returns `endtime - starttime`, or zero if not both set.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.timing.duration()
    }
}

/// Builder of a [`Feature`], wiring tag inheritance and `Background`s into
/// the added [`Scenario`]s.
#[derive(Debug)]
pub struct FeatureBuilder {
    /// [`Feature`] being built.
    feature: Feature,
}

impl FeatureBuilder {
    /// Creates a new [`FeatureBuilder`], allocating a fresh [`FeatureId`].
    #[must_use]
    pub fn new(keyword: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            feature: Feature {
                id: FeatureId::next(),
                keyword: keyword.into(),
                name: name.into(),
                description: Vec::new(),
                path: None,
                line: 0,
                tags: Vec::new(),
                background: None,
                scenarios: Vec::new(),
                state: State::Untested,
                timing: Timing::default(),
            },
        }
    }

    /// Sets the description lines.
    #[must_use]
    pub fn description<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature.description = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the source path.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.feature.path = Some(path.into());
        self
    }

    /// Sets the line.
    #[must_use]
    pub fn line(mut self, line: usize) -> Self {
        self.feature.line = line;
        self
    }

    /// Adds [`Feature`] tags. Must be called before adding [`Scenario`]s to
    /// have them inherited.
    #[must_use]
    pub fn tags<I: IntoIterator<Item = Tag>>(mut self, tags: I) -> Self {
        self.feature.tags.extend(tags);
        self
    }

    /// Sets the [`Background`]. Must be called before adding [`Scenario`]s
    /// to have it prepended.
    #[must_use]
    pub fn background(mut self, background: Background) -> Self {
        self.feature.background = Some(background);
        self
    }

    /// Adds a [`Scenario`].
    #[must_use]
    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.push(scenario, None, &[], &[]);
        self
    }

    /// Adds the [`Scenario`]s of a `Rule`, which inherit the `Rule`'s `tags`
    /// and get its `background` after the [`Feature`]'s one.
    #[must_use]
    pub fn rule<I>(
        mut self,
        name: impl Into<String>,
        tags: &[Tag],
        background: Option<&Background>,
        scenarios: I,
    ) -> Self
    where
        I: IntoIterator<Item = Scenario>,
    {
        let name = name.into();
        let extra = background.map(|b| b.steps.as_slice()).unwrap_or_default();
        for scenario in scenarios {
            self.push(scenario, Some(name.clone()), tags, extra);
        }
        self
    }

    /// Attaches the `scenario` to the [`Feature`] being built.
    fn push(
        &mut self,
        mut scenario: Scenario,
        rule: Option<String>,
        rule_tags: &[Tag],
        rule_background: &[Step],
    ) {
        let inherited = merge_tags(&self.feature.tags, rule_tags);
        let background = self
            .feature
            .background
            .iter()
            .flat_map(|b| b.steps.iter())
            .chain(rule_background)
            .cloned()
            .collect::<Vec<_>>();

        scenario.rule = rule.clone();
        for child in scenario.children_mut() {
            child.rule = rule.clone();
        }
        scenario.attach(self.feature.id, &inherited, &background);
        self.feature.scenarios.push(scenario);
    }

    /// Finishes building the [`Feature`].
    #[must_use]
    pub fn build(self) -> Feature {
        self.feature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::step::BackgroundRef;

    fn feature() -> Feature {
        Feature::builder("Feature", "Eating")
            .tags([Tag::new("food")])
            .background(Background {
                keyword: "Background".into(),
                name: String::new(),
                steps: vec![Step::given("a table")],
            })
            .scenario(
                Scenario::new("Scenario", "plain")
                    .with_tags([Tag::new("good_case")])
                    .with_step(Step::when("I eat")),
            )
            .rule(
                "portions",
                &[Tag::new("rule")],
                None,
                [Scenario::new("Scenario", "ruled")
                    .with_step(Step::then("I am full"))
                    .looped(2)],
            )
            .build()
    }

    #[test]
    fn scenarios_inherit_feature_and_rule_tags() {
        let f = feature();
        assert_eq!(
            f.scenarios[0].all_tags,
            [Tag::new("food"), Tag::new("good_case")],
        );

        let ruled = &f.scenarios[1];
        assert_eq!(ruled.rule.as_deref(), Some("portions"));
        for child in ruled.children() {
            assert_eq!(child.rule.as_deref(), Some("portions"));
            assert!(child.all_tags.contains(&Tag::new("rule")));
            assert_eq!(child.feature_id, Some(f.id));
        }
    }

    #[test]
    fn background_is_prepended_to_concrete_scenarios() {
        let f = feature();
        for s in f.concrete_scenarios() {
            assert_eq!(s.steps[0].text, "a table");
            assert_eq!(
                s.steps[0].as_background,
                Some(BackgroundRef { index: 0 }),
            );
            assert_eq!(s.steps.len(), 2);
        }
        assert_eq!(f.count_scenarios(), 3);
        assert_eq!(f.count_steps(), 6);
    }

    #[test]
    fn has_to_run_respects_feature_tags() {
        let f = feature();
        let always = TagPredicate::Always;

        let tagged = |expr| TagPredicate::parse(expr).unwrap();
        assert!(f.has_to_run(&[], &tagged("food"), &always));
        assert!(!f.has_to_run(&[], &tagged("drink"), &always));
        assert!(f.has_to_run(&[], &always, &tagged("rule")));
        assert!(!f.has_to_run(&[u64::MAX], &always, &always));
    }
}
