// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Tag`]s and [`TagPredicate`]s gating filters and hooks.

use std::{borrow::Cow, fmt, str::FromStr};

use derive_more::with_trait::{Display, Error};
use gherkin::tagexpr::TagOperation;
use lazy_regex::regex;
use once_cell::sync::Lazy;
use regex::Regex;
use sealed::sealed;

/// Tag attached to a [`Feature`] or a [`Scenario`].
///
/// Written as `@name` or `@name(arg)` in a `.feature` file.
///
/// [`Feature`]: crate::Feature
/// [`Scenario`]: crate::Scenario
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Tag {
    /// Name of this [`Tag`], without the leading `@`.
    pub name: String,

    /// Optional argument given in parentheses.
    pub arg: Option<String>,
}

impl Tag {
    /// Creates a new argument-less [`Tag`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), arg: None }
    }

    /// Creates a new [`Tag`] carrying the given `arg`.
    #[must_use]
    pub fn with_arg(name: impl Into<String>, arg: impl Into<String>) -> Self {
        Self { name: name.into(), arg: Some(arg.into()) }
    }

    /// Parses a raw tag, as it's stored by [`gherkin`] (`name` or `name(arg)`,
    /// optionally prefixed with `@`).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        /// [`Regex`] splitting a tag into its name and argument.
        static TAG_WITH_ARG: &Lazy<Regex> = regex!(r"^([^()]+)\((.*)\)$");

        let raw = raw.trim().trim_start_matches('@');
        TAG_WITH_ARG.captures(raw).map_or_else(
            || Self::new(raw),
            |caps| Self::with_arg(&caps[1], caps[2].trim()),
        )
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if let Some(arg) = &self.arg {
            write!(f, "({arg})")?;
        }
        Ok(())
    }
}

/// Extension of a [`TagOperation`] allowing to evaluate it.
#[sealed]
pub trait Ext {
    /// Evaluates this [`TagOperation`] for the given `tags`.
    #[must_use]
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone;
}

#[sealed]
impl Ext for TagOperation {
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone,
    {
        match self {
            Self::And(l, r) => l.eval(tags.clone()) & r.eval(tags),
            Self::Or(l, r) => l.eval(tags.clone()) | r.eval(tags),
            Self::Not(t) => !t.eval(tags),
            Self::Tag(t) => tags.into_iter().any(|tag| tag.as_ref() == t),
        }
    }
}

/// Boolean expression over tag names.
///
/// Supports `and`, `or`, `not` and parentheses. Tag names may be written
/// bare (`good_case`) or `@`-prefixed (`@good_case`). An empty expression
/// matches everything.
#[derive(Clone, Debug, Default)]
pub enum TagPredicate {
    /// Matches unconditionally.
    #[default]
    Always,

    /// Matches when the parsed expression holds.
    Expr(TagOperation),
}

impl TagPredicate {
    /// Parses the given tag `expression`.
    ///
    /// # Errors
    ///
    /// If the `expression` is not a valid tag expression.
    pub fn parse(expression: &str) -> Result<Self, TagExprError> {
        if expression.trim().is_empty() {
            return Ok(Self::Always);
        }
        normalize(expression)
            .parse::<TagOperation>()
            .map(Self::Expr)
            .map_err(|e| TagExprError {
                expression: expression.to_owned(),
                reason: e.to_string(),
            })
    }

    /// Indicates whether this [`TagPredicate`] matches unconditionally.
    #[must_use]
    pub const fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }

    /// Evaluates this [`TagPredicate`] against the given tag names.
    #[must_use]
    pub fn evaluate<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone,
    {
        match self {
            Self::Always => true,
            Self::Expr(op) => op.eval(tags),
        }
    }

    /// Evaluates this [`TagPredicate`] against the names of the given
    /// [`Tag`]s.
    #[must_use]
    pub fn matches(&self, tags: &[Tag]) -> bool {
        self.evaluate(tags.iter().map(|t| t.name.as_str()))
    }
}

impl FromStr for TagPredicate {
    type Err = TagExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error of parsing an invalid tag expression.
#[derive(Clone, Debug, Display, Error)]
#[display("Invalid tag expression `{expression}`: {reason}")]
pub struct TagExprError {
    /// Expression failed to parse.
    pub expression: String,

    /// Parser's explanation.
    pub reason: String,
}

/// Prefixes bare tag names of the `expression` with `@`, leaving operators
/// and parentheses intact.
fn normalize(expression: &str) -> Cow<'_, str> {
    /// [`Regex`] matching operands and operators of a tag expression.
    static TOKEN: &Lazy<Regex> = regex!(r"[^\s()]+");

    TOKEN.replace_all(expression, |caps: &regex::Captures<'_>| {
        let token = &caps[0];
        match token {
            "and" | "or" | "not" => token.to_owned(),
            t if t.starts_with('@') => t.to_owned(),
            t => format!("@{t}"),
        }
    })
}
