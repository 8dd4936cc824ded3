// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Scenario`] model along with [`Scenario Outline`][1] and `Scenario Loop`
//! expansion.
//!
//! [1]: https://cucumber.io/docs/gherkin/reference#scenario-outline

use std::{iter, time::Duration};

use derive_more::with_trait::{Display, Error};
use lazy_regex::regex;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    state::{PendingPolicy, State, Timing},
    step::{BackgroundRef, Step},
};
use crate::{
    id::{FeatureId, ScenarioId},
    tag::{Tag, TagPredicate},
};

/// Row of an `Examples` table a concrete [`Scenario`] was expanded from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExampleRow {
    /// Index of the row among all the rows of the outline, starting at `0`.
    pub index: usize,

    /// Header of the `Examples` table.
    pub header: Vec<String>,

    /// Values of the row.
    pub values: Vec<String>,
}

impl ExampleRow {
    /// Returns the value of the given `column`, if any.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.header
            .iter()
            .position(|h| h == column)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }
}

/// `Examples` block of a [`Scenario Outline`][1].
///
/// [1]: https://cucumber.io/docs/gherkin/reference#scenario-outline
#[derive(Clone, Debug, Default)]
pub struct Examples {
    /// Header row.
    pub header: Vec<String>,

    /// Data rows.
    pub rows: Vec<Vec<String>>,

    /// Tags of this `Examples` block, added to every expanded [`Scenario`].
    pub tags: Vec<Tag>,

    /// Line of the block in its `.feature` file.
    pub line: usize,
}

/// Shape of a [`Scenario`].
#[derive(Clone, Debug)]
pub enum ScenarioKind {
    /// Directly executed [`Scenario`].
    Plain,

    /// Template expanded into one child per `Examples` row.
    Outline {
        /// Header of the first `Examples` table.
        header: Vec<String>,

        /// Expanded [`Scenario`]s, in row order.
        children: Vec<Scenario>,
    },

    /// Template run `iterations` times.
    Loop {
        /// Number of iterations.
        iterations: usize,

        /// Expanded [`Scenario`]s, in iteration order.
        children: Vec<Scenario>,
    },
}

/// Where a concrete [`Scenario`] comes from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Origin {
    /// Written directly in a `.feature` file (or a template itself).
    Standalone,

    /// Expanded from an `Examples` row.
    Example {
        /// Id of the outline template.
        template: ScenarioId,

        /// Row the [`Scenario`] was expanded from.
        row: ExampleRow,
    },

    /// Produced by a loop iteration.
    Iteration {
        /// Id of the loop template.
        template: ScenarioId,

        /// Iteration number, starting at `1`.
        index: usize,
    },
}

impl Origin {
    /// Returns the id of the template this [`Scenario`] was expanded from.
    #[must_use]
    pub const fn template(&self) -> Option<ScenarioId> {
        match self {
            Self::Standalone => None,
            Self::Example { template, .. }
            | Self::Iteration { template, .. } => Some(*template),
        }
    }
}

/// One executable test case: a sequence of [`Step`]s.
#[derive(Clone, Debug)]
pub struct Scenario {
    /// Id of this [`Scenario`], unique across the whole run.
    pub id: ScenarioId,

    /// Id of the owning [`Feature`], set once attached.
    ///
    /// [`Feature`]: crate::Feature
    pub feature_id: Option<FeatureId>,

    /// Keyword as written.
    pub keyword: String,

    /// Name of this [`Scenario`].
    pub name: String,

    /// Description lines.
    pub description: Vec<String>,

    /// Line in the `.feature` file.
    pub line: usize,

    /// Name of the `Rule` grouping this [`Scenario`], if any.
    pub rule: Option<String>,

    /// Own tags.
    pub tags: Vec<Tag>,

    /// Tags of the enclosing [`Feature`] and `Rule`.
    ///
    /// [`Feature`]: crate::Feature
    pub inherited_tags: Vec<Tag>,

    /// [`Scenario::inherited_tags`] merged with [`Scenario::tags`].
    pub all_tags: Vec<Tag>,

    /// [`Step`]s in execution order: `Background` copies first.
    pub steps: Vec<Step>,

    /// Shape of this [`Scenario`].
    pub kind: ScenarioKind,

    /// Template back-reference of an expanded [`Scenario`].
    pub origin: Origin,

    /// Execution [`State`].
    pub state: State,

    /// Start and end timestamps.
    pub timing: Timing,
}

impl Scenario {
    /// Creates a new [`ScenarioKind::Plain`] [`Scenario`] allocating a fresh
    /// [`ScenarioId`].
    #[must_use]
    pub fn new(keyword: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ScenarioId::next(),
            feature_id: None,
            keyword: keyword.into(),
            name: name.into(),
            description: Vec::new(),
            line: 0,
            rule: None,
            tags: Vec::new(),
            inherited_tags: Vec::new(),
            all_tags: Vec::new(),
            steps: Vec::new(),
            kind: ScenarioKind::Plain,
            origin: Origin::Standalone,
            state: State::Untested,
            timing: Timing::default(),
        }
    }

    /// Adds the given `tags`.
    #[must_use]
    pub fn with_tags<I: IntoIterator<Item = Tag>>(mut self, tags: I) -> Self {
        self.tags.extend(tags);
        self.all_tags = merge_tags(&self.inherited_tags, &self.tags);
        self
    }

    /// Appends a [`Step`].
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        renumber(&mut self.steps);
        self
    }

    /// Appends the given [`Step`]s.
    #[must_use]
    pub fn with_steps<I>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = Step>,
    {
        self.steps.extend(steps);
        renumber(&mut self.steps);
        self
    }

    /// Sets the description lines.
    #[must_use]
    pub fn with_description<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.description = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the line of this [`Scenario`] in its `.feature` file.
    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Turns this [`Scenario`] into a [`ScenarioKind::Outline`] template,
    /// expanding one child per row of the given `examples`.
    ///
    /// `<column>` placeholders in the name, [`Step`] texts, doc strings and
    /// tables of every child are replaced with the row values.
    ///
    /// # Errors
    ///
    /// If a placeholder doesn't name any column of its `Examples`.
    pub fn outline(
        mut self,
        examples: Vec<Examples>,
    ) -> Result<Self, ExpandExamplesError> {
        let header = examples
            .first()
            .map(|ex| ex.header.clone())
            .unwrap_or_default();

        let mut children = Vec::new();
        for ex in &examples {
            for values in &ex.rows {
                let row = ExampleRow {
                    index: children.len(),
                    header: ex.header.clone(),
                    values: values.clone(),
                };
                children.push(self.expand_example(row, &ex.tags)?);
            }
        }

        self.kind = ScenarioKind::Outline { header, children };
        Ok(self)
    }

    /// Turns this [`Scenario`] into a [`ScenarioKind::Loop`] template with
    /// the given number of `iterations`.
    #[must_use]
    pub fn looped(mut self, iterations: usize) -> Self {
        let children = (1..=iterations)
            .map(|index| {
                let mut child = self.expand_child();
                child.name = format!("{} (iteration {index})", self.name);
                child.origin = Origin::Iteration { template: self.id, index };
                child
            })
            .collect();
        self.kind = ScenarioKind::Loop { iterations, children };
        self
    }

    /// Creates a child of this template with a fresh [`ScenarioId`].
    fn expand_child(&self) -> Self {
        let mut child = self.clone();
        child.id = ScenarioId::next();
        child.kind = ScenarioKind::Plain;
        child
    }

    /// Expands a single `Examples` row.
    fn expand_example(
        &self,
        row: ExampleRow,
        example_tags: &[Tag],
    ) -> Result<Self, ExpandExamplesError> {
        let mut child = self.expand_child();
        child.tags.extend(example_tags.iter().cloned());
        child.all_tags = merge_tags(&child.inherited_tags, &child.tags);

        child.name = substitute(&child.name, &row, child.line)?;
        for step in &mut child.steps {
            let line = step.line;
            for value in iter::once(&mut step.text)
                .chain(step.doc_string.iter_mut())
                .chain(step.table.iter_mut().flat_map(|t| {
                    t.header.iter_mut().chain(t.rows.iter_mut().flatten())
                }))
            {
                *value = substitute(value, &row, line)?;
            }
        }

        child.origin = Origin::Example { template: self.id, row };
        Ok(child)
    }

    /// Indicates whether this [`Scenario`] is an outline or loop template,
    /// never executed directly.
    #[must_use]
    pub const fn is_template(&self) -> bool {
        !matches!(self.kind, ScenarioKind::Plain)
    }

    /// Returns the expanded children of a template, or an empty slice.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.kind {
            ScenarioKind::Plain => &[],
            ScenarioKind::Outline { children, .. }
            | ScenarioKind::Loop { children, .. } => children,
        }
    }

    /// Returns the expanded children of a template mutably.
    pub fn children_mut(&mut self) -> &mut [Self] {
        match &mut self.kind {
            ScenarioKind::Plain => &mut [],
            ScenarioKind::Outline { children, .. }
            | ScenarioKind::Loop { children, .. } => children,
        }
    }

    /// Iterates over the directly executable [`Scenario`]s: this one, or
    /// the children of a template.
    pub fn concrete(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        if self.is_template() {
            Box::new(self.children().iter())
        } else {
            Box::new(iter::once(self))
        }
    }

    /// Iterates over the [`Step`]s copied from a `Background`.
    pub fn background_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.as_background.is_some())
    }

    /// Iterates over the [`Step`]s written in this [`Scenario`] itself.
    pub fn own_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.as_background.is_none())
    }

    /// Printable width of the `column` of a template: the widest of its
    /// header cell and every child's example cell. `0` for non-templates.
    #[must_use]
    pub fn column_width(&self, column: usize) -> usize {
        let width = console::measure_text_width;
        match &self.kind {
            ScenarioKind::Plain => 0,
            ScenarioKind::Outline { header, children } => children
                .iter()
                .filter_map(|c| match &c.origin {
                    Origin::Example { row, .. } => row.values.get(column),
                    _ => None,
                })
                .chain(header.get(column))
                .map(|v| width(v))
                .max()
                .unwrap_or_default(),
            ScenarioKind::Loop { iterations, .. } => {
                if column == 0 {
                    width(&iterations.to_string())
                } else {
                    0
                }
            }
        }
    }

    /// Indicates whether this [`Scenario`] is selected by the given filters.
    ///
    /// A template is selected if any of its children is. A child is selected
    /// by its own id or by the id of its template.
    #[must_use]
    pub fn has_to_run(
        &self,
        ids: &[u64],
        feature_tags: &TagPredicate,
        scenario_tags: &TagPredicate,
    ) -> bool {
        if self.is_template() {
            return self
                .children()
                .iter()
                .any(|c| c.has_to_run(ids, feature_tags, scenario_tags));
        }

        let id_selected = ids.is_empty()
            || ids.contains(&self.id.get())
            || self.origin.template().is_some_and(|t| ids.contains(&t.get()));

        id_selected
            && feature_tags.matches(&self.inherited_tags)
            && scenario_tags.matches(&self.all_tags)
    }

    /// Recomputes the [`State`] from the [`Step`]s (or from the children of
    /// a template).
    #[must_use]
    pub fn derived_state(&self, policy: PendingPolicy) -> State {
        if self.is_template() {
            State::reduce(self.children().iter().map(|c| c.state), policy)
        } else {
            State::reduce(self.steps.iter().map(|s| s.state), policy)
        }
    }

    /// Returns `endtime - starttime`, or zero if not both set.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.timing.duration()
    }

    /// Binds this [`Scenario`] (and its children) to a [`Feature`]:
    /// inherits tags and prepends copies of the `background` [`Step`]s.
    ///
    /// [`Feature`]: crate::Feature
    pub(crate) fn attach(
        &mut self,
        feature_id: FeatureId,
        inherited: &[Tag],
        background: &[Step],
    ) {
        self.feature_id = Some(feature_id);
        self.inherited_tags = inherited.to_vec();
        self.all_tags = merge_tags(&self.inherited_tags, &self.tags);

        let copies = background.iter().enumerate().map(|(index, s)| {
            let mut copy = s.clone();
            copy.as_background = Some(BackgroundRef { index });
            copy
        });
        drop(self.steps.splice(0..0, copies));
        renumber(&mut self.steps);
        for step in &mut self.steps {
            step.all_tags = self.all_tags.clone();
        }

        for child in self.children_mut() {
            child.attach(feature_id, inherited, background);
        }
    }
}

/// Merges `inherited` and `own` tags, dropping duplicates.
pub(crate) fn merge_tags(inherited: &[Tag], own: &[Tag]) -> Vec<Tag> {
    let mut all = inherited.to_vec();
    for tag in own {
        if !all.contains(tag) {
            all.push(tag.clone());
        }
    }
    all
}

/// Numbers the `steps` starting at `1`.
fn renumber(steps: &mut [Step]) {
    for (i, step) in steps.iter_mut().enumerate() {
        step.id = i + 1;
    }
}

/// Replaces `<column>` placeholders in the `text` with values of the `row`.
fn substitute(
    text: &str,
    row: &ExampleRow,
    line: usize,
) -> Result<String, ExpandExamplesError> {
    /// [`Regex`] matching placeholders `Examples` should expand into.
    static TEMPLATE_REGEX: &Lazy<Regex> = regex!(r"<([^>\s]+)>");

    let mut err = None;
    let replaced = TEMPLATE_REGEX
        .replace_all(text, |cap: &regex::Captures<'_>| {
            let name = &cap[1];
            row.get(name).map_or_else(
                || {
                    err = Some(ExpandExamplesError {
                        line,
                        name: name.to_owned(),
                    });
                    String::new()
                },
                str::to_owned,
            )
        })
        .into_owned();

    err.map_or(Ok(replaced), Err)
}

/// Error of [`Scenario Outline`][1] expansion encountering an unknown
/// placeholder.
///
/// [1]: https://cucumber.io/docs/gherkin/reference#scenario-outline
#[derive(Clone, Debug, Display, Error)]
#[display("Failed to resolve <{name}> at line {line}")]
pub struct ExpandExamplesError {
    /// Line of the unknown placeholder.
    pub line: usize,

    /// Name of the unknown placeholder.
    pub name: String,
}
