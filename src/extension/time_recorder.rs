// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`TimeRecorder`] extension stamping start and end times.

use std::time::{Duration, SystemTime};

use super::Extension;
use crate::{
    hook::{Hook, HookHandle, HookTarget, Phase, Point},
    model::Timing,
    Config, HookRegistry, RunContext,
};

/// Start and end of the whole run, stored in the [`RunContext`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RunTiming(pub Timing);

impl RunTiming {
    /// Returns the duration of the run, or zero if it's not finished.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.0.duration()
    }
}

/// Extension setting `starttime` and `endtime` of every [`Feature`],
/// [`Scenario`] and invoked [`Step`].
///
/// Its [`Hook`]s fire with [`TimeRecorder::HOOK_PRIORITY`], so every other
/// [`Hook`] observes `starttime` in the [`Phase::Before`] and `endtime` in
/// the [`Phase::After`], no matter when it was registered.
///
/// [`Feature`]: crate::Feature
/// [`Scenario`]: crate::Scenario
/// [`Step`]: crate::Step
#[derive(Debug)]
pub struct TimeRecorder {
    /// Registered [`Hook`]s.
    handles: Vec<HookHandle>,
}

impl TimeRecorder {
    /// Priority of the registered [`Hook`]s, firing ahead of any other one.
    pub const HOOK_PRIORITY: i32 = i32::MIN;

    /// Returns handles of the registered [`Hook`]s.
    #[must_use]
    pub fn handles(&self) -> &[HookHandle] {
        &self.handles
    }
}

/// Stamps the `target` (or the run) with the current time.
fn stamp(ctx: &mut RunContext, target: HookTarget<'_>, phase: Phase) {
    let now = SystemTime::now();
    let timing = match target {
        HookTarget::All { .. } => &mut ctx.state_or_default::<RunTiming>().0,
        HookTarget::Feature(f) => &mut f.timing,
        HookTarget::Scenario(s) => &mut s.timing,
        HookTarget::Step(s) => &mut s.timing,
    };
    match phase {
        Phase::Before => timing.starttime = Some(now),
        Phase::After => timing.endtime = Some(now),
    }
}

impl Extension for TimeRecorder {
    const NAME: &'static str = "time-recorder";
    const LOAD_PRIORITY: i32 = 1;

    fn load_if(_: &Config) -> bool {
        true
    }

    fn load(
        _: &mut RunContext,
        hooks: &mut HookRegistry,
    ) -> anyhow::Result<Self> {
        let mut handles = Vec::with_capacity(8);
        for point in Point::ALL {
            for phase in [Phase::Before, Phase::After] {
                let hook = Hook::new(
                    move |ctx: &mut RunContext, target: HookTarget<'_>| {
                        stamp(ctx, target, phase);
                    },
                )
                .named(format!("time-recorder::{phase}_{point}"))
                .priority(Self::HOOK_PRIORITY);
                handles.push(hooks.register(phase, point, hook));
            }
        }
        Ok(Self { handles })
    }
}
