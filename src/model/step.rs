// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Step`] model.

use std::{path::PathBuf, time::Duration};

use derive_more::with_trait::Display;

use super::state::{State, Timing};
use crate::tag::Tag;

/// Type of a [`Step`], as resolved from its keyword.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum StepType {
    /// `Given` (and `And`/`But` following it).
    Given,

    /// `When` (and `And`/`But` following it).
    When,

    /// `Then` (and `And`/`But` following it).
    Then,
}

impl From<gherkin::StepType> for StepType {
    fn from(ty: gherkin::StepType) -> Self {
        match ty {
            gherkin::StepType::Given => Self::Given,
            gherkin::StepType::When => Self::When,
            gherkin::StepType::Then => Self::Then,
        }
    }
}

/// Data table attached to a [`Step`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Table {
    /// First row of the table.
    pub header: Vec<String>,

    /// Rows following the [`Table::header`].
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Splits the given `rows` into a header and data rows.
    ///
    /// Returns [`None`] if there are no rows at all.
    #[must_use]
    pub fn from_rows(mut rows: Vec<Vec<String>>) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }
        let header = rows.remove(0);
        Some(Self { header, rows })
    }

    /// Iterates over the data rows as `(column, value)` pairs.
    pub fn records(
        &self,
    ) -> impl Iterator<Item = Vec<(&str, &str)>> + '_ {
        self.rows.iter().map(|row| {
            self.header
                .iter()
                .map(String::as_str)
                .zip(row.iter().map(String::as_str))
                .collect()
        })
    }
}

/// Error record of a [`State::Failed`] [`Step`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display("{name}: {reason}")]
pub struct Failure {
    /// Kind of the error raised.
    pub name: String,

    /// Error message.
    pub reason: String,

    /// Formatted error chain and backtrace, if captured.
    pub traceback: String,
}

/// Back-reference of a [`Step`] copied from a `Background`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BackgroundRef {
    /// Index of the original step inside the `Background`.
    pub index: usize,
}

/// Back-reference of a [`Step`] imported from another `.feature` file by a
/// `@precondition` tag.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PreconditionRef {
    /// Path of the `.feature` file the step is imported from.
    pub path: Option<PathBuf>,

    /// Name of the scenario the step belongs to.
    pub scenario: String,
}

/// Single sentence of a [`Scenario`], matched to an implementation and
/// executed.
///
/// [`Scenario`]: crate::Scenario
#[derive(Clone, Debug)]
pub struct Step {
    /// Number of this [`Step`] inside its [`Scenario`], starting at `1`.
    ///
    /// [`Scenario`]: crate::Scenario
    pub id: usize,

    /// Keyword as written (`Given`, `And`, ...).
    pub keyword: String,

    /// Resolved [`StepType`].
    pub ty: StepType,

    /// Sentence of this [`Step`].
    pub text: String,

    /// Doc string body.
    pub doc_string: Option<String>,

    /// Data table.
    pub table: Option<Table>,

    /// Line in the `.feature` file.
    pub line: usize,

    /// Set if this [`Step`] is a copy of a `Background` one.
    pub as_background: Option<BackgroundRef>,

    /// Set if this [`Step`] is imported as a precondition.
    pub as_precondition: Option<PreconditionRef>,

    /// Tags inherited from the enclosing [`Scenario`] and [`Feature`].
    ///
    /// [`Feature`]: crate::Feature
    /// [`Scenario`]: crate::Scenario
    pub all_tags: Vec<Tag>,

    /// Execution [`State`].
    pub state: State,

    /// [`Failure`] details, if [`State::Failed`].
    pub failure: Option<Failure>,

    /// Start and end timestamps.
    pub timing: Timing,
}

impl Step {
    /// Creates a new [`State::Untested`] [`Step`].
    #[must_use]
    pub fn new(
        ty: StepType,
        keyword: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            keyword: keyword.into(),
            ty,
            text: text.into(),
            doc_string: None,
            table: None,
            line: 0,
            as_background: None,
            as_precondition: None,
            all_tags: Vec::new(),
            state: State::Untested,
            failure: None,
            timing: Timing::default(),
        }
    }

    /// Shortcut for a [`StepType::Given`] [`Step`].
    #[must_use]
    pub fn given(text: impl Into<String>) -> Self {
        Self::new(StepType::Given, "Given", text)
    }

    /// Shortcut for a [`StepType::When`] [`Step`].
    #[must_use]
    pub fn when(text: impl Into<String>) -> Self {
        Self::new(StepType::When, "When", text)
    }

    /// Shortcut for a [`StepType::Then`] [`Step`].
    #[must_use]
    pub fn then(text: impl Into<String>) -> Self {
        Self::new(StepType::Then, "Then", text)
    }

    /// Attaches a doc string.
    #[must_use]
    pub fn with_doc_string(mut self, doc: impl Into<String>) -> Self {
        self.doc_string = Some(doc.into());
        self
    }

    /// Attaches a data [`Table`].
    #[must_use]
    pub fn with_table(mut self, table: Table) -> Self {
        self.table = Some(table);
        self
    }

    /// Sets the line of this [`Step`] in its `.feature` file.
    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Returns `endtime - starttime`, or zero if not both set.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.timing.duration()
    }

    /// Sets [`State::Failed`] along with the given [`Failure`].
    pub fn fail(&mut self, failure: Failure) {
        self.state = State::Failed;
        self.failure = Some(failure);
    }
}
