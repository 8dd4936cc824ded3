// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`HookRegistry`] turning the fixed run lifecycle into a pluggable
//! pipeline.
//!
//! Every lifecycle [`Point`] fires twice, once per [`Phase`]. [`Hook`]s
//! registered for a `(Phase, Point)` pair fire in ascending priority order,
//! ties broken by registration order, and only for targets whose tags
//! satisfy the [`Hook`]'s [`TagPredicate`].

use std::{any, collections::HashMap, fmt};

use derive_more::with_trait::{Debug, Display};

use crate::{
    error::{HookError, Outcome, Raised},
    model::{Feature, Scenario, Step},
    tag::TagPredicate,
    RunContext,
};

/// Default priority of a [`Hook`]. Lower fires earlier.
pub const DEFAULT_PRIORITY: i32 = 1000;

/// Side of a lifecycle [`Point`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Phase {
    /// Before entering the [`Point`].
    #[display("before")]
    Before,

    /// After leaving the [`Point`].
    #[display("after")]
    After,
}

/// Lifecycle boundary hooks fire at.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Point {
    /// The whole run.
    #[display("all")]
    All,

    /// Every [`Feature`].
    #[display("each_feature")]
    EachFeature,

    /// Every concrete [`Scenario`].
    #[display("each_scenario")]
    EachScenario,

    /// Every invoked [`Step`].
    #[display("each_step")]
    EachStep,
}

impl Point {
    /// All the [`Point`]s, outermost first.
    pub const ALL: [Self; 4] =
        [Self::All, Self::EachFeature, Self::EachScenario, Self::EachStep];
}

/// Model node a [`Hook`] fires for.
#[derive(Debug)]
pub enum HookTarget<'a> {
    /// Every [`Feature`] of the run, along with the run marker.
    All {
        /// [`Feature`]s of the run.
        features: &'a mut [Feature],

        /// Marker identifying the run.
        marker: &'a str,
    },

    /// Single [`Feature`].
    Feature(&'a mut Feature),

    /// Single concrete [`Scenario`].
    Scenario(&'a mut Scenario),

    /// Single [`Step`].
    Step(&'a mut Step),
}

impl HookTarget<'_> {
    /// Returns the [`Point`] this [`HookTarget`] belongs to.
    #[must_use]
    pub const fn point(&self) -> Point {
        match self {
            Self::All { .. } => Point::All,
            Self::Feature(_) => Point::EachFeature,
            Self::Scenario(_) => Point::EachScenario,
            Self::Step(_) => Point::EachStep,
        }
    }

    /// Reborrows this [`HookTarget`] for a single [`Hook`] call.
    pub fn reborrow(&mut self) -> HookTarget<'_> {
        match self {
            Self::All { features, marker } => {
                HookTarget::All { features: &mut **features, marker }
            }
            Self::Feature(f) => HookTarget::Feature(f),
            Self::Scenario(s) => HookTarget::Scenario(s),
            Self::Step(s) => HookTarget::Step(s),
        }
    }

    /// Evaluates the `predicate` against the tags of this [`HookTarget`].
    ///
    /// For [`HookTarget::All`] it holds if any [`Feature`] satisfies it.
    #[must_use]
    pub fn satisfies(&self, predicate: &TagPredicate) -> bool {
        match self {
            _ if predicate.is_always() => true,
            Self::All { features, .. } => {
                features.iter().any(|f| predicate.matches(f.all_tags()))
            }
            Self::Feature(f) => predicate.matches(f.all_tags()),
            Self::Scenario(s) => predicate.matches(&s.all_tags),
            Self::Step(s) => predicate.matches(&s.all_tags),
        }
    }
}

/// Boxed body of a [`Hook`].
type HookFn = dyn FnMut(&mut RunContext, HookTarget<'_>) -> Result<(), Raised>;

/// Callable fired at a lifecycle boundary.
#[derive(Debug)]
pub struct Hook {
    /// Name identifying this [`Hook`] in errors.
    name: String,

    /// Tags a target must satisfy for this [`Hook`] to fire.
    predicate: TagPredicate,

    /// Sort key among [`Hook`]s of the same `(Phase, Point)`.
    priority: i32,

    /// Body of this [`Hook`].
    #[debug(skip)]
    func: Box<HookFn>,
}

impl Hook {
    /// Creates a new [`Hook`] named after the type of `func`, firing for
    /// every target with [`DEFAULT_PRIORITY`].
    ///
    /// The `func` may return `()` (failing by panic) or a [`Result`].
    pub fn new<F, O>(mut func: F) -> Self
    where
        F: FnMut(&mut RunContext, HookTarget<'_>) -> O + 'static,
        O: Outcome,
    {
        Self {
            name: any::type_name::<F>().to_owned(),
            predicate: TagPredicate::Always,
            priority: DEFAULT_PRIORITY,
            func: Box::new(move |ctx, target| func(ctx, target).into_result()),
        }
    }

    /// Names this [`Hook`].
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Gates this [`Hook`] with the given [`TagPredicate`].
    #[must_use]
    pub fn on_tags(mut self, predicate: TagPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Sets the priority of this [`Hook`]. Lower fires earlier.
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Returns the name of this [`Hook`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Handle of a registered [`Hook`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct HookHandle {
    /// [`Phase`] the [`Hook`] is registered for.
    pub phase: Phase,

    /// [`Point`] the [`Hook`] is registered for.
    pub point: Point,

    /// Registration sequence number.
    seq: u64,
}

/// Registered [`Hook`] along with its registration sequence number.
#[derive(Debug)]
struct Entry {
    /// Registration sequence number.
    seq: u64,

    /// Registered [`Hook`].
    hook: Hook,
}

/// Storage of [`Hook`]s keyed by `(Phase, Point)`.
#[derive(Debug, Default)]
pub struct HookRegistry {
    /// Registered [`Hook`]s, each sequence kept sorted by priority.
    entries: HashMap<(Phase, Point), Vec<Entry>>,

    /// Next registration sequence number.
    next_seq: u64,
}

impl HookRegistry {
    /// Creates an empty [`HookRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the `hook` for the given `phase` and `point`.
    ///
    /// Registering the same body twice adds two entries.
    pub fn register(
        &mut self,
        phase: Phase,
        point: Point,
        hook: Hook,
    ) -> HookHandle {
        let seq = self.next_seq;
        self.next_seq += 1;

        tracing::debug!(
            hook = hook.name(),
            %phase,
            %point,
            priority = hook.priority,
            "registering hook",
        );

        let entries = self.entries.entry((phase, point)).or_default();
        let at = entries.partition_point(|e| e.hook.priority <= hook.priority);
        entries.insert(at, Entry { seq, hook });

        HookHandle { phase, point, seq }
    }

    /// Shortcut for registering a [`Phase::Before`] [`Hook`].
    pub fn before(&mut self, point: Point, hook: Hook) -> HookHandle {
        self.register(Phase::Before, point, hook)
    }

    /// Shortcut for registering a [`Phase::After`] [`Hook`].
    pub fn after(&mut self, point: Point, hook: Hook) -> HookHandle {
        self.register(Phase::After, point, hook)
    }

    /// Removes the [`Hook`] registered under the given `handle`.
    ///
    /// Returns [`None`] if it's not registered (anymore).
    pub fn unregister(&mut self, handle: HookHandle) -> Option<Hook> {
        let entries = self.entries.get_mut(&(handle.phase, handle.point))?;
        let at = entries.iter().position(|e| e.seq == handle.seq)?;
        Some(entries.remove(at).hook)
    }

    /// Fires all the [`Hook`]s registered for the `phase` and `point`,
    /// whose predicate the `target` satisfies, in order.
    ///
    /// # Errors
    ///
    /// If any [`Hook`] raises. The remaining [`Hook`]s don't fire.
    pub fn call(
        &mut self,
        phase: Phase,
        point: Point,
        ctx: &mut RunContext,
        mut target: HookTarget<'_>,
    ) -> Result<(), HookError> {
        let Some(entries) = self.entries.get_mut(&(phase, point)) else {
            return Ok(());
        };

        for Entry { hook, .. } in entries {
            if !target.satisfies(&hook.predicate) {
                continue;
            }
            tracing::trace!(hook = hook.name(), %phase, %point, "firing hook");

            let func = &mut hook.func;
            let target = target.reborrow();
            Raised::capture(|| func(ctx, target)).map_err(|source| {
                tracing::error!(
                    hook = hook.name.as_str(),
                    %phase,
                    %point,
                    error = %source,
                    "hook failed",
                );
                HookError { hook: hook.name.clone(), phase, point, source }
            })?;
        }
        Ok(())
    }

    /// Returns names of the [`Hook`]s registered for the `phase` and
    /// `point`, in firing order.
    #[must_use]
    pub fn names(&self, phase: Phase, point: Point) -> Vec<&str> {
        self.entries
            .get(&(phase, point))
            .map(|es| es.iter().map(|e| e.hook.name()).collect())
            .unwrap_or_default()
    }

    /// Counts all the registered [`Hook`]s.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Indicates whether no [`Hook`] is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all the registered [`Hook`]s.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Display for HookHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}#{}", self.phase, self.point, self.seq)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, sync::Arc};

    use super::*;
    use crate::{model::Step, tag::Tag, Config};

    fn ctx() -> RunContext {
        RunContext::new(Arc::new(Config::default()))
    }

    fn recording(log: &Rc<RefCell<Vec<String>>>, name: &str) -> Hook {
        let log = Rc::clone(log);
        let entry = name.to_owned();
        Hook::new(move |_: &mut RunContext, _: HookTarget<'_>| {
            log.borrow_mut().push(entry.clone());
        })
        .named(name)
    }

    #[test]
    fn fires_by_priority_then_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = HookRegistry::new();
        _ = hooks.before(Point::EachStep, recording(&log, "h1").priority(10));
        _ = hooks.before(Point::EachStep, recording(&log, "h2"));
        _ = hooks.before(Point::EachStep, recording(&log, "h3").priority(1));
        _ = hooks.before(Point::EachStep, recording(&log, "h4").priority(10));

        let mut step = Step::given("anything");
        let target = HookTarget::Step(&mut step);
        hooks
            .call(Phase::Before, Point::EachStep, &mut ctx(), target)
            .unwrap();

        assert_eq!(*log.borrow(), ["h3", "h1", "h4", "h2"]);
        assert_eq!(
            hooks.names(Phase::Before, Point::EachStep),
            ["h3", "h1", "h4", "h2"],
        );
    }

    #[test]
    fn tag_gated_hook_fires_only_for_matching_targets() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = HookRegistry::new();
        _ = hooks.after(
            Point::EachStep,
            recording(&log, "gated")
                .on_tags(TagPredicate::parse("good_case").unwrap()),
        );

        let mut good = Step::given("good");
        good.all_tags = vec![Tag::new("good_case"), Tag::new("other")];
        let mut bad = Step::given("bad");
        bad.all_tags = vec![Tag::new("bad_case"), Tag::new("other")];

        let mut ctx = ctx();
        for step in [&mut good, &mut bad] {
            let target = HookTarget::Step(step);
            hooks
                .call(Phase::After, Point::EachStep, &mut ctx, target)
                .unwrap();
        }

        assert_eq!(*log.borrow(), ["gated"]);
    }

    #[test]
    fn all_target_matches_if_any_feature_does() {
        let pred = TagPredicate::parse("smoke").unwrap();
        let mut features = vec![
            Feature::builder("Feature", "a").build(),
            Feature::builder("Feature", "b").tags([Tag::new("smoke")]).build(),
        ];
        let target = HookTarget::All { features: &mut features, marker: "m" };
        assert!(target.satisfies(&pred));

        let mut none: Vec<Feature> = Vec::new();
        let empty = HookTarget::All { features: &mut none, marker: "m" };
        assert!(!empty.satisfies(&pred));
        assert!(empty.satisfies(&TagPredicate::Always));
    }

    #[test]
    fn failing_hook_aborts_remaining_ones() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = HookRegistry::new();
        _ = hooks.before(
            Point::EachStep,
            Hook::new(|_: &mut RunContext, _: HookTarget<'_>| {
                anyhow::bail!("no database")
            })
            .named("connect")
            .priority(1),
        );
        _ = hooks.before(Point::EachStep, recording(&log, "never"));

        let mut step = Step::given("x");
        let target = HookTarget::Step(&mut step);
        let err = hooks
            .call(Phase::Before, Point::EachStep, &mut ctx(), target)
            .unwrap_err();

        assert_eq!(err.hook, "connect");
        assert_eq!(err.phase, Phase::Before);
        assert_eq!(err.point, Point::EachStep);
        assert_eq!(err.kind(), "Error");
        assert_eq!(err.message(), "no database");
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn panicking_hook_is_wrapped() {
        let mut hooks = HookRegistry::new();
        _ = hooks.after(
            Point::EachScenario,
            Hook::new::<_, ()>(|_: &mut RunContext, _: HookTarget<'_>| panic!("oops")),
        );

        let mut scenario = Scenario::new("Scenario", "s");
        let err = hooks
            .call(
                Phase::After,
                Point::EachScenario,
                &mut ctx(),
                HookTarget::Scenario(&mut scenario),
            )
            .unwrap_err();

        assert_eq!(err.kind(), Raised::PANIC);
        assert_eq!(err.message(), "oops");
        assert!(err.hook.contains("panicking_hook_is_wrapped"));
    }

    #[test]
    fn unregister_and_reset() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = HookRegistry::new();
        let first = hooks.before(Point::All, recording(&log, "a"));
        _ = hooks.before(Point::All, recording(&log, "a"));
        assert_eq!(hooks.len(), 2);

        assert!(hooks.unregister(first).is_some());
        assert!(hooks.unregister(first).is_none());
        assert_eq!(hooks.len(), 1);

        hooks.reset();
        assert!(hooks.is_empty());
    }
}
