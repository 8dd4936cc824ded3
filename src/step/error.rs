// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`AmbiguousMatchError`] definition.

use std::fmt;

use derive_more::with_trait::Error;

use super::{location::Location, regex::HashableRegex};

/// Error of a [`Step`] matching multiple step implementations of a
/// [`Collection`].
///
/// [`Collection`]: super::Collection
/// [`Step`]: crate::Step
#[derive(Clone, Debug, Error)]
pub struct AmbiguousMatchError {
    /// Possible patterns the [`Step`] matches, sorted.
    ///
    /// [`Step`]: crate::Step
    pub possible_matches: Vec<(HashableRegex, Option<Location>)>,
}

impl fmt::Display for AmbiguousMatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Possible matches:")?;
        for (reg, loc_opt) in &self.possible_matches {
            write!(f, "\n{reg}")?;
            if let Some(loc) = loc_opt {
                write!(f, " --> {loc}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;

    #[test]
    fn lists_every_possible_match() {
        let err = AmbiguousMatchError {
            possible_matches: vec![
                (
                    Regex::new("^I eat (\\d+)$").unwrap().into(),
                    Some(Location::new("tests/steps.rs", 10, 5)),
                ),
                (Regex::new("^I eat .*$").unwrap().into(), None),
            ],
        };

        assert_eq!(
            err.to_string(),
            "Possible matches:\n\
             ^I eat (\\d+)$ --> tests/steps.rs:10:5\n\
             ^I eat .*$",
        );
    }
}
