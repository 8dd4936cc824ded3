// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`HashableRegex`] identifying a step pattern.

use std::{
    cmp::Ordering,
    hash::{Hash, Hasher},
};

use derive_more::with_trait::{Debug, Deref, Display};
use regex::Regex;

/// [`Regex`] wrapper comparing and hashing by its pattern, so step patterns
/// may be sorted and deduplicated.
#[derive(Clone, Debug, Deref, Display)]
pub struct HashableRegex(Regex);

impl HashableRegex {
    /// Compiles the given `pattern`, anchoring it to the whole sentence unless
    /// it's anchored already.
    ///
    /// # Errors
    ///
    /// If the `pattern` is not a valid [`Regex`].
    pub fn anchored(pattern: &str) -> Result<Self, regex::Error> {
        let mut anchored = String::with_capacity(pattern.len() + 2);
        if !pattern.starts_with('^') {
            anchored.push('^');
        }
        anchored.push_str(pattern);
        if !pattern.ends_with('$') {
            anchored.push('$');
        }
        Regex::new(&anchored).map(Self)
    }

    /// Returns the pattern of this [`HashableRegex`].
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Regex> for HashableRegex {
    fn from(re: Regex) -> Self {
        Self(re)
    }
}

impl Hash for HashableRegex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_str().hash(state);
    }
}

impl PartialEq for HashableRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for HashableRegex {}

impl PartialOrd for HashableRegex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HashableRegex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_str().cmp(other.0.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn anchors_unanchored_patterns() {
        let re = HashableRegex::anchored(r"I have (\d+) cucumbers").unwrap();
        assert_eq!(re.as_str(), r"^I have (\d+) cucumbers$");
        assert!(re.is_match("I have 3 cucumbers"));
        assert!(!re.is_match("I have 3 cucumbers left"));

        let re = HashableRegex::anchored("^already$").unwrap();
        assert_eq!(re.as_str(), "^already$");
    }

    #[test]
    fn compares_by_pattern() {
        let a = HashableRegex::from(Regex::new("a").unwrap());
        let b = HashableRegex::from(Regex::new("b").unwrap());
        assert!(a < b);

        let set = [a.clone(), b, a].into_iter().collect::<HashSet<_>>();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn rejects_invalid_pattern() {
        assert!(HashableRegex::anchored("(unclosed").is_err());
    }
}
