// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Context`] of a step implementation invocation.

use std::str::FromStr;

use crate::model::{Step, Table};

/// Name of a capturing group, if it's named.
pub type CaptureName = Option<String>;

/// Context handed to a step implementation: the matched [`Step`] and the
/// captures of its pattern.
#[derive(Clone, Debug)]
pub struct Context<'s> {
    /// [`Step`] matched to the implementation.
    pub step: &'s Step,

    /// Captures of the pattern, the whole match going first.
    pub matches: Vec<(CaptureName, String)>,
}

impl<'s> Context<'s> {
    /// Returns the sentence of the [`Step`].
    #[must_use]
    pub fn text(&self) -> &'s str {
        &self.step.text
    }

    /// Returns the doc string of the [`Step`], if any.
    #[must_use]
    pub fn doc_string(&self) -> Option<&'s str> {
        self.step.doc_string.as_deref()
    }

    /// Returns the data [`Table`] of the [`Step`], if any.
    #[must_use]
    pub fn table(&self) -> Option<&'s Table> {
        self.step.table.as_ref()
    }

    /// Returns the positional capture by its `index`. Index `0` is the first
    /// capturing group, not the whole match.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.matches.get(index + 1).map(|(_, v)| v.as_str())
    }

    /// Returns the capture of the group with the given `name`.
    #[must_use]
    pub fn named(&self, name: &str) -> Option<&str> {
        self.matches
            .iter()
            .find(|(n, _)| n.as_deref() == Some(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parses the positional capture by its `index`.
    ///
    /// # Errors
    ///
    /// If there is no such capture, or it fails to parse.
    pub fn parse<T>(&self, index: usize) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let raw = self
            .arg(index)
            .ok_or_else(|| anyhow::anyhow!("no capture at index {index}"))?;
        Ok(raw.parse()?)
    }

    /// Iterates over positional captures, skipping the whole match.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.matches.iter().skip(1).map(|(_, v)| v.as_str())
    }
}
