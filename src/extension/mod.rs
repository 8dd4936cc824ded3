// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`ExtensionRegistry`] loading pluggable units in priority order.
//!
//! An [`Extension`] is enabled by its load predicate, contributes CLI options
//! and, once instantiated, registers [`Hook`]s.
//!
//! [`Hook`]: crate::Hook

pub mod console;
pub mod summary;
pub mod time_recorder;
pub mod trace_log;
pub mod user_data;

use std::{any::Any, fmt::Write as _, mem};

use derive_more::with_trait::Debug;

use crate::{
    error::{ConfigError, ExtensionError},
    Config, HookRegistry, RunContext,
};

#[doc(inline)]
pub use self::{
    console::{Console, Formatter, Styles},
    summary::{Report, Stats, Summary},
    time_recorder::{RunTiming, TimeRecorder},
    trace_log::TraceLog,
    user_data::UserDataLoader,
};

/// Default [`Extension::LOAD_PRIORITY`].
pub const DEFAULT_LOAD_PRIORITY: i32 = 1000;

/// Pluggable unit registering [`Hook`]s when loaded.
///
/// [`Hook`]: crate::Hook
pub trait Extension: Any + Sized {
    /// Name of this [`Extension`].
    const NAME: &'static str;

    /// Load order. Lower loads earlier.
    const LOAD_PRIORITY: i32 = DEFAULT_LOAD_PRIORITY;

    /// CLI options contributed by this [`Extension`].
    #[must_use]
    fn options() -> Vec<ExtOption> {
        Vec::new()
    }

    /// Indicates whether this [`Extension`] is enabled by the [`Config`].
    fn load_if(config: &Config) -> bool;

    /// Instantiates this [`Extension`], registering its [`Hook`]s.
    ///
    /// # Errors
    ///
    /// If the [`Extension`] is enabled, but can't work.
    ///
    /// [`Hook`]: crate::Hook
    fn load(
        ctx: &mut RunContext,
        hooks: &mut HookRegistry,
    ) -> anyhow::Result<Self>;

    /// Creates a [`Descriptor`] of this [`Extension`].
    #[must_use]
    fn descriptor() -> Descriptor {
        Descriptor::of::<Self>()
    }
}

/// Kind of an [`ExtOption`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OptionKind {
    /// Boolean switch.
    Flag,

    /// Option taking a single value.
    Value,

    /// Repeatable option taking a value.
    Multiple,
}

/// CLI option declared by an [`Extension`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtOption {
    /// Long flag, without the leading `--`.
    pub long: &'static str,

    /// Short flag, if any.
    pub short: Option<char>,

    /// Placeholder of the value in help text.
    pub value_name: Option<&'static str>,

    /// Help text.
    pub help: &'static str,

    /// [`OptionKind`] of this [`ExtOption`].
    pub kind: OptionKind,
}

impl ExtOption {
    /// Creates a [`OptionKind::Flag`] option.
    #[must_use]
    pub const fn flag(long: &'static str, help: &'static str) -> Self {
        Self {
            long,
            short: None,
            value_name: None,
            help,
            kind: OptionKind::Flag,
        }
    }

    /// Creates a [`OptionKind::Value`] option.
    #[must_use]
    pub const fn value(
        long: &'static str,
        value_name: &'static str,
        help: &'static str,
    ) -> Self {
        Self {
            long,
            short: None,
            value_name: Some(value_name),
            help,
            kind: OptionKind::Value,
        }
    }

    /// Creates a [`OptionKind::Multiple`] option.
    #[must_use]
    pub const fn multiple(
        long: &'static str,
        value_name: &'static str,
        help: &'static str,
    ) -> Self {
        Self {
            long,
            short: None,
            value_name: Some(value_name),
            help,
            kind: OptionKind::Multiple,
        }
    }

    /// Sets the short flag.
    #[must_use]
    pub const fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Converts this [`ExtOption`] into a [`clap::Arg`].
    #[must_use]
    pub fn to_arg(&self) -> clap::Arg {
        use clap::ArgAction;

        let mut arg = clap::Arg::new(self.long).long(self.long).help(self.help);
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        if let Some(name) = self.value_name {
            arg = arg.value_name(name);
        }
        arg.action(match self.kind {
            OptionKind::Flag => ArgAction::SetTrue,
            OptionKind::Value => ArgAction::Set,
            OptionKind::Multiple => ArgAction::Append,
        })
    }

    /// Renders the flags of this [`ExtOption`] as in usage text.
    #[must_use]
    pub fn usage(&self) -> String {
        let mut out = String::new();
        if let Some(short) = self.short {
            _ = write!(out, "-{short}, ");
        }
        _ = write!(out, "--{}", self.long);
        if let Some(name) = self.value_name {
            _ = write!(out, " <{name}>");
        }
        out
    }
}

/// Constructor of a type-erased [`Extension`].
type Factory = dyn Fn(
    &mut RunContext,
    &mut HookRegistry,
) -> anyhow::Result<Box<dyn Any>>;

/// Boxes a loaded extension instance.
fn erase<T: Any>(instance: T) -> Box<dyn Any> {
    Box::new(instance)
}

/// Predicate enabling an [`Extension`].
type LoadIf = dyn Fn(&Config) -> bool;

/// Type-erased description of an [`Extension`], as stored in an
/// [`ExtensionRegistry`].
#[derive(Debug)]
pub struct Descriptor {
    /// Name of the [`Extension`].
    name: String,

    /// Load predicate, if declared.
    #[debug(skip)]
    load_if: Option<Box<LoadIf>>,

    /// Load priority, if declared.
    priority: Option<i32>,

    /// Declared CLI options.
    options: Vec<ExtOption>,

    /// Constructor.
    #[debug(skip)]
    factory: Box<Factory>,
}

impl Descriptor {
    /// Describes the [`Extension`] `E`.
    #[must_use]
    pub fn of<E: Extension>() -> Self {
        Self {
            name: E::NAME.to_owned(),
            load_if: Some(Box::new(E::load_if)),
            priority: Some(E::LOAD_PRIORITY),
            options: E::options(),
            factory: Box::new(|ctx, hooks| {
                E::load(ctx, hooks).map(erase)
            }),
        }
    }

    /// Describes an ad-hoc extension built by the given `factory`.
    ///
    /// Until both [`Descriptor::load_if()`] and [`Descriptor::priority()`]
    /// are set, it never loads.
    #[must_use]
    pub fn new<F, T>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&mut RunContext, &mut HookRegistry) -> anyhow::Result<T>
            + 'static,
        T: Any,
    {
        Self {
            name: name.into(),
            load_if: None,
            priority: None,
            options: Vec::new(),
            factory: Box::new(move |ctx, hooks| {
                factory(ctx, hooks).map(erase)
            }),
        }
    }

    /// Sets the load predicate.
    #[must_use]
    pub fn load_if(mut self, pred: impl Fn(&Config) -> bool + 'static) -> Self {
        self.load_if = Some(Box::new(pred));
        self
    }

    /// Sets the load priority.
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Adds a CLI option.
    #[must_use]
    pub fn option(mut self, option: ExtOption) -> Self {
        self.options.push(option);
        self
    }

    /// Replaces the constructor, keeping the name, predicate, priority and
    /// options.
    #[must_use]
    pub fn with_factory<F, T>(mut self, factory: F) -> Self
    where
        F: Fn(&mut RunContext, &mut HookRegistry) -> anyhow::Result<T>
            + 'static,
        T: Any,
    {
        self.factory = Box::new(move |ctx, hooks| {
            factory(ctx, hooks).map(erase)
        });
        self
    }

    /// Returns the name of the described extension.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared CLI options.
    #[must_use]
    pub fn options(&self) -> &[ExtOption] {
        &self.options
    }
}

/// Instantiated extension.
#[derive(Debug)]
struct Loaded {
    /// Name of the extension.
    name: String,

    /// Instance of the extension.
    #[debug(skip)]
    instance: Box<dyn Any>,
}

/// Ordered registry of extension [`Descriptor`]s and their loaded instances.
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    /// Registered [`Descriptor`]s, in registration order.
    descriptors: Vec<Descriptor>,

    /// Loaded extensions, in load order.
    loaded: Vec<Loaded>,
}

impl ExtensionRegistry {
    /// Creates an empty [`ExtensionRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the given [`Descriptor`].
    ///
    /// # Errors
    ///
    /// If a [`Descriptor`] of the same name is registered already. Use
    /// [`ExtensionRegistry::replace()`] to swap it instead.
    pub fn register(
        &mut self,
        descriptor: Descriptor,
    ) -> Result<(), ConfigError> {
        if self.descriptors.iter().any(|d| d.name == descriptor.name) {
            return Err(ConfigError::DuplicateExtension {
                name: descriptor.name,
            });
        }
        tracing::debug!(extension = descriptor.name(), "registering extension");
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Shortcut for registering the [`Extension`] `E`.
    ///
    /// # Errors
    ///
    /// If an extension named [`Extension::NAME`] is registered already.
    pub fn register_extension<E: Extension>(
        &mut self,
    ) -> Result<(), ConfigError> {
        self.register(Descriptor::of::<E>())
    }

    /// Replaces the registered [`Descriptor`] of the same name, keeping its
    /// position, or appends the given one if there is none.
    ///
    /// Returns the replaced [`Descriptor`], if any.
    pub fn replace(&mut self, descriptor: Descriptor) -> Option<Descriptor> {
        tracing::debug!(extension = descriptor.name(), "replacing extension");
        match self.descriptors.iter_mut().find(|d| d.name == descriptor.name) {
            Some(existing) => Some(mem::replace(existing, descriptor)),
            None => {
                self.descriptors.push(descriptor);
                None
            }
        }
    }

    /// Instantiates every enabled extension in ascending priority order,
    /// ties broken by registration order.
    ///
    /// Does nothing if extensions are loaded already, until
    /// [`ExtensionRegistry::reset()`].
    ///
    /// # Errors
    ///
    /// If an enabled extension fails to instantiate. The remaining ones are
    /// not loaded.
    pub fn load(
        &mut self,
        ctx: &mut RunContext,
        hooks: &mut HookRegistry,
    ) -> Result<(), ExtensionError> {
        if !self.loaded.is_empty() {
            tracing::debug!("extensions are loaded already");
            return Ok(());
        }

        let mut order = self
            .descriptors
            .iter()
            .filter_map(|d| d.priority.map(|p| (p, d)))
            .collect::<Vec<_>>();
        order.sort_by_key(|(p, _)| *p);

        for (priority, desc) in order {
            let Some(load_if) = &desc.load_if else {
                tracing::debug!(
                    extension = desc.name(),
                    "skipping extension without load predicate",
                );
                continue;
            };
            if !load_if(ctx.config()) {
                tracing::debug!(extension = desc.name(), "extension disabled");
                continue;
            }

            tracing::debug!(
                extension = desc.name(),
                priority,
                "loading extension",
            );
            let instance = (desc.factory)(ctx, hooks).map_err(|source| {
                ExtensionError { extension: desc.name.clone(), source }
            })?;
            self.loaded.push(Loaded { name: desc.name.clone(), instance });
        }
        Ok(())
    }

    /// Returns names of the loaded extensions, in load order.
    #[must_use]
    pub fn loaded(&self) -> Vec<&str> {
        self.loaded.iter().map(|l| l.name.as_str()).collect()
    }

    /// Returns the loaded instance of the [`Extension`] `E`, if any.
    #[must_use]
    pub fn get<E: Extension>(&self) -> Option<&E> {
        self.get_as(E::NAME)
    }

    /// Returns the loaded instance named `name`, if it's of type `T`.
    #[must_use]
    pub fn get_as<T: Any>(&self, name: &str) -> Option<&T> {
        self.loaded
            .iter()
            .find(|l| l.name == name)
            .and_then(|l| l.instance.downcast_ref())
    }

    /// Returns the registered [`Descriptor`]s.
    #[must_use]
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Returns declared CLI options along with their extension names, in
    /// registration order.
    #[must_use]
    pub fn get_options(&self) -> Vec<(&str, &ExtOption)> {
        self.descriptors
            .iter()
            .flat_map(|d| d.options.iter().map(move |o| (d.name(), o)))
            .collect()
    }

    /// Renders the declared CLI options as help text, grouped by extension
    /// in registration order.
    #[must_use]
    pub fn get_option_description(&self) -> String {
        let mut out = String::new();
        for desc in self.descriptors.iter().filter(|d| !d.options.is_empty()) {
            _ = writeln!(out, "{}:", desc.name);
            for opt in &desc.options {
                _ = writeln!(out, "  {:<32}{}", opt.usage(), opt.help);
            }
        }
        out
    }

    /// Drops every registered [`Descriptor`] and loaded instance.
    pub fn reset(&mut self) {
        self.descriptors.clear();
        self.loaded.clear();
    }
}
