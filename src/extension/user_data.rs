// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`UserDataLoader`] extension publishing `key=value` pairs.

use super::{ExtOption, Extension};
use crate::{
    error::ConfigError,
    hook::{Hook, HookHandle, HookTarget, Point},
    Config, HookRegistry, RunContext,
};

/// Long name of the user data option.
pub const OPTION: &str = "user-data";

/// Splits every `key=value` pair of the `input`.
///
/// # Errors
///
/// If any pair has no `=` or an empty key.
pub fn parse_pairs<S: AsRef<str>>(
    input: &[S],
) -> Result<Vec<(String, String)>, ConfigError> {
    input
        .iter()
        .map(|raw| {
            let raw = raw.as_ref();
            raw.split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .filter(|(k, _)| !k.is_empty())
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .ok_or_else(|| ConfigError::MalformedUserData {
                    input: raw.to_owned(),
                })
        })
        .collect()
}

/// Extension publishing `-u key=value` pairs into
/// [`RunContext::user_data()`] before the run starts.
#[derive(Debug)]
pub struct UserDataLoader {
    /// Parsed pairs, in CLI order.
    pairs: Vec<(String, String)>,

    /// Registered [`Hook`].
    handle: HookHandle,
}

impl UserDataLoader {
    /// Returns the parsed pairs.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Returns the handle of the publishing [`Hook`].
    #[must_use]
    pub const fn handle(&self) -> HookHandle {
        self.handle
    }
}

impl Extension for UserDataLoader {
    const NAME: &'static str = "user-data";

    fn options() -> Vec<ExtOption> {
        vec![ExtOption::multiple(
            OPTION,
            "KEY=VALUE",
            "Adds a user data value, may be repeated",
        )
        .short('u')]
    }

    fn load_if(_: &Config) -> bool {
        true
    }

    fn load(
        ctx: &mut RunContext,
        hooks: &mut HookRegistry,
    ) -> anyhow::Result<Self> {
        let raw = ctx.config().values(OPTION).unwrap_or_default();
        let pairs = parse_pairs(raw)?;

        let published = pairs.clone();
        let handle = hooks.before(
            Point::All,
            Hook::new(move |ctx: &mut RunContext, _: HookTarget<'_>| {
                for (k, v) in &published {
                    drop(ctx.user_data_mut().insert(k.clone(), v.clone()));
                }
            })
            .named("user-data::publish")
            .priority(0),
        );
        tracing::debug!(count = pairs.len(), "user data parsed");

        Ok(Self { pairs, handle })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::OptionValue, hook::Phase, ExtensionRegistry};

    #[test]
    fn splits_pairs() {
        let pairs =
            parse_pairs(&["browser = firefox", "empty=", "eq=a=b"]).unwrap();
        assert_eq!(
            pairs,
            [
                ("browser".to_owned(), "firefox".to_owned()),
                ("empty".to_owned(), String::new()),
                ("eq".to_owned(), "a=b".to_owned()),
            ],
        );
    }

    #[test]
    fn rejects_malformed_pairs() {
        for bad in ["novalue", "=value"] {
            let err = parse_pairs(&[bad]).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::MalformedUserData { input } if input == bad,
            ));
        }
    }

    #[test]
    fn publishes_before_all() {
        let mut config = Config::default();
        config.set_option(OPTION, OptionValue::Values(vec!["env=ci".into()]));
        let mut ctx = RunContext::new(Arc::new(config));
        let mut hooks = HookRegistry::new();
        let mut exts = ExtensionRegistry::new();
        exts.register_extension::<UserDataLoader>().unwrap();
        exts.load(&mut ctx, &mut hooks).unwrap();
        assert!(ctx.user_data().is_empty());

        hooks
            .call(
                Phase::Before,
                Point::All,
                &mut ctx,
                HookTarget::All { features: &mut [], marker: "m" },
            )
            .unwrap();

        assert_eq!(ctx.user_data().get_str("env"), Some("ci"));
    }

    #[test]
    fn malformed_input_fails_loading() {
        let mut config = Config::default();
        config.set_option(OPTION, OptionValue::Values(vec!["oops".into()]));
        let mut ctx = RunContext::new(Arc::new(config));
        let mut exts = ExtensionRegistry::new();
        exts.register_extension::<UserDataLoader>().unwrap();

        let err = exts.load(&mut ctx, &mut HookRegistry::new()).unwrap_err();
        assert!(err.to_string().contains("Malformed user data `oops`"));
    }
}
