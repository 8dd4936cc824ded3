// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`RunContext`] passed explicitly into hooks and step bodies.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use linked_hash_map::LinkedHashMap;

use crate::Config;

/// Ordered bag of opaque values keyed by name.
#[derive(Default)]
pub struct UserData(LinkedHashMap<String, Box<dyn Any>>);

impl UserData {
    /// Creates an empty [`UserData`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the `value` under the `key`, returning the replaced one.
    pub fn insert<T: Any>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Option<Box<dyn Any>> {
        self.0.insert(key.into(), Box::new(value))
    }

    /// Returns the value under the `key`, if it's of type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.0.get(key).and_then(|v| v.downcast_ref())
    }

    /// Returns the value under the `key` mutably, if it's of type `T`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.0.get_mut(key).and_then(|v| v.downcast_mut())
    }

    /// Shortcut for a [`String`] value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get::<String>(key).map(String::as_str)
    }

    /// Removes the value under the `key`.
    pub fn remove(&mut self, key: &str) -> Option<Box<dyn Any>> {
        self.0.remove(key)
    }

    /// Indicates whether a value is stored under the `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates over the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Indicates whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

/// Explicit state of a run, handed to every hook and step body.
pub struct RunContext {
    /// [`Config`] of the run.
    config: Arc<Config>,

    /// Data picked by the user, lives for the whole run.
    user_data: UserData,

    /// Data of the currently running [`Scenario`], cleared before each one.
    ///
    /// [`Scenario`]: crate::Scenario
    scenario_data: UserData,

    /// State contributed by extensions, keyed by its type.
    state: HashMap<TypeId, Box<dyn Any>>,
}

impl RunContext {
    /// Creates a new [`RunContext`] for the given [`Config`].
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            user_data: UserData::new(),
            scenario_data: UserData::new(),
            state: HashMap::new(),
        }
    }

    /// Returns the [`Config`] of the run.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the marker identifying the run.
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.config.marker
    }

    /// Returns the run-wide [`UserData`].
    #[must_use]
    pub const fn user_data(&self) -> &UserData {
        &self.user_data
    }

    /// Returns the run-wide [`UserData`] mutably.
    pub fn user_data_mut(&mut self) -> &mut UserData {
        &mut self.user_data
    }

    /// Returns the [`UserData`] of the running [`Scenario`].
    ///
    /// [`Scenario`]: crate::Scenario
    #[must_use]
    pub const fn scenario_data(&self) -> &UserData {
        &self.scenario_data
    }

    /// Returns the [`UserData`] of the running [`Scenario`] mutably.
    ///
    /// [`Scenario`]: crate::Scenario
    pub fn scenario_data_mut(&mut self) -> &mut UserData {
        &mut self.scenario_data
    }

    /// Stores extension state of type `T`, replacing the previous one.
    pub fn insert_state<T: Any>(&mut self, value: T) {
        drop(self.state.insert(TypeId::of::<T>(), Box::new(value)));
    }

    /// Returns extension state of type `T`, if any.
    #[must_use]
    pub fn state<T: Any>(&self) -> Option<&T> {
        self.state.get(&TypeId::of::<T>()).and_then(|v| v.downcast_ref())
    }

    /// Returns extension state of type `T` mutably, if any.
    pub fn state_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.state
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Returns extension state of type `T`, inserting its default first if
    /// absent.
    pub fn state_or_default<T: Any + Default>(&mut self) -> &mut T {
        let entry = self
            .state
            .entry(TypeId::of::<T>())
            .or_insert_with(|| -> Box<dyn Any> { Box::new(T::default()) });
        if !entry.is::<T>() {
            *entry = Box::new(T::default());
        }
        entry.downcast_mut().unwrap_or_else(|| unreachable!())
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("marker", &self.marker())
            .field("user_data", &self.user_data)
            .field("scenario_data", &self.scenario_data)
            .field("state", &self.state.len())
            .finish()
    }
}
