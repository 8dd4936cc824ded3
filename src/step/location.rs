// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Location`] of a step implementation.

use std::panic;

use derive_more::with_trait::Display;

/// Location of a step implementation in the source code, captured at its
/// registration.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{path}:{line}:{column}")]
pub struct Location {
    /// Path to the file where the step implementation is registered.
    pub path: &'static str,

    /// Line of the file where the step implementation is registered.
    pub line: u32,

    /// Column of the file where the step implementation is registered.
    pub column: u32,
}

impl Location {
    /// Creates a new [`Location`].
    #[must_use]
    pub const fn new(path: &'static str, line: u32, column: u32) -> Self {
        Self { path, line, column }
    }

    /// Returns the [`Location`] of the caller of the `#[track_caller]`
    /// function invoking this one.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        panic::Location::caller().into()
    }
}

impl From<&'static panic::Location<'static>> for Location {
    fn from(loc: &'static panic::Location<'static>) -> Self {
        Self::new(loc.file(), loc.line(), loc.column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_as_path_line_column() {
        let loc = Location::new("tests/steps.rs", 42, 10);
        assert_eq!(loc.to_string(), "tests/steps.rs:42:10");
    }

    #[test]
    fn captures_caller() {
        let loc = Location::caller();
        assert!(loc.path.ends_with("location.rs"));
        assert!(loc.line > 0);
    }

    #[test]
    fn orders_by_path_then_line() {
        assert!(Location::new("a.rs", 2, 1) < Location::new("b.rs", 1, 1));
        assert!(Location::new("a.rs", 1, 9) < Location::new("a.rs", 2, 1));
    }
}
