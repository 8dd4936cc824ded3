// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`TraceLog`] extension emitting [`tracing`] events at every hook point.

use std::{cell::Cell, rc::Rc};

use super::{ExtOption, Extension};
use crate::{
    hook::{Hook, HookHandle, HookTarget, Phase, Point},
    Config, HookRegistry, RunContext,
};

/// Long name of the flag enabling the [`TraceLog`].
pub const OPTION: &str = "trace-log";

/// Extension emitting an `INFO` [`tracing`] event before and after every
/// [`Feature`], [`Scenario`] and [`Step`], and around the whole run.
///
/// Every event carries the run marker, so interleaved logs of parallel runs
/// stay separable.
///
/// [`Feature`]: crate::Feature
/// [`Scenario`]: crate::Scenario
/// [`Step`]: crate::Step
#[derive(Debug)]
pub struct TraceLog {
    /// Registered [`Hook`]s.
    handles: Vec<HookHandle>,

    /// Number of emitted events.
    emitted: Rc<Cell<usize>>,
}

impl TraceLog {
    /// Returns handles of the registered [`Hook`]s.
    #[must_use]
    pub fn handles(&self) -> &[HookHandle] {
        &self.handles
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn emitted(&self) -> usize {
        self.emitted.get()
    }
}

/// Emits a single event about the `target`.
fn emit(ctx: &RunContext, target: &HookTarget<'_>, phase: Phase) {
    let marker = ctx.marker();
    match target {
        HookTarget::All { features, .. } => tracing::info!(
            marker,
            %phase,
            point = "all",
            features = features.len(),
        ),
        HookTarget::Feature(f) => tracing::info!(
            marker,
            %phase,
            point = "feature",
            feature = %f.name,
            state = %f.state,
        ),
        HookTarget::Scenario(s) => tracing::info!(
            marker,
            %phase,
            point = "scenario",
            scenario = %s.name,
            id = %s.id,
            state = %s.state,
        ),
        HookTarget::Step(s) => tracing::info!(
            marker,
            %phase,
            point = "step",
            step = %s.text,
            state = %s.state,
        ),
    }
}

impl Extension for TraceLog {
    const NAME: &'static str = "trace-log";

    fn options() -> Vec<ExtOption> {
        vec![ExtOption::flag(
            OPTION,
            "Emits an INFO tracing event at every hook point",
        )]
    }

    fn load_if(config: &Config) -> bool {
        config.flag(OPTION).unwrap_or_default()
    }

    fn load(
        _: &mut RunContext,
        hooks: &mut HookRegistry,
    ) -> anyhow::Result<Self> {
        let emitted = Rc::new(Cell::new(0));
        let mut handles = Vec::with_capacity(8);
        for point in Point::ALL {
            for phase in [Phase::Before, Phase::After] {
                let counter = Rc::clone(&emitted);
                handles.push(hooks.register(
                    phase,
                    point,
                    Hook::new(
                        move |ctx: &mut RunContext, target: HookTarget<'_>| {
                            emit(ctx, &target, phase);
                            counter.set(counter.get() + 1);
                        },
                    )
                    .named(format!("trace-log::{phase}_{point}")),
                ));
            }
        }
        Ok(Self { handles, emitted })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::OptionValue, model::Step, ExtensionRegistry};

    #[test]
    fn disabled_by_default() {
        let mut ctx = RunContext::new(Arc::new(Config::default()));
        let mut hooks = HookRegistry::new();
        let mut exts = ExtensionRegistry::new();
        exts.register_extension::<TraceLog>().unwrap();
        exts.load(&mut ctx, &mut hooks).unwrap();

        assert!(exts.get::<TraceLog>().is_none());
        assert!(hooks.is_empty());
    }

    #[test]
    fn emits_at_every_point() {
        let mut config = Config::default();
        config.set_option(OPTION, OptionValue::Flag(true));
        let mut ctx = RunContext::new(Arc::new(config));
        let mut hooks = HookRegistry::new();
        let mut exts = ExtensionRegistry::new();
        exts.register_extension::<TraceLog>().unwrap();
        exts.load(&mut ctx, &mut hooks).unwrap();

        let mut step = Step::then("it works");
        for phase in [Phase::Before, Phase::After] {
            let target = HookTarget::Step(&mut step);
            hooks.call(phase, Point::EachStep, &mut ctx, target).unwrap();
        }

        let log = exts.get::<TraceLog>().unwrap();
        assert_eq!(log.handles().len(), 8);
        assert_eq!(log.emitted(), 2);
    }
}
