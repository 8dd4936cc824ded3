// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Errors and panics raised by user-written code.

use std::{
    any::{self, Any},
    backtrace::{Backtrace, BacktraceStatus},
    cell::RefCell,
    io,
    panic::{self, AssertUnwindSafe},
};

use derive_more::with_trait::{Display, Error};
use once_cell::sync::Lazy;

use crate::model::Failure;

thread_local! {
    /// Where the last panic of this thread happened.
    static LAST_PANIC: RefCell<Option<PanicSite>> = RefCell::new(None);
}

/// Panic hook recording a [`PanicSite`] before delegating to the previously
/// installed hook.
static PANIC_HOOK: Lazy<()> = Lazy::new(|| {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let site = PanicSite {
            location: info.location().map(ToString::to_string),
            backtrace: Backtrace::capture(),
        };
        LAST_PANIC.with(|last| *last.borrow_mut() = Some(site));
        previous(info);
    }));
});

/// Source location and backtrace of a panic.
#[derive(Debug)]
struct PanicSite {
    /// `file:line:column` of the panic.
    location: Option<String>,

    /// Backtrace, if enabled by `RUST_BACKTRACE`.
    backtrace: Backtrace,
}

/// Error or panic raised by a step body or a hook.
#[derive(Clone, Debug, Display, Error)]
#[display("{kind}: {message}")]
pub struct Raised {
    /// Kind of what was raised: the error type name, or `panic`.
    pub kind: String,

    /// Message of the error or panic payload.
    pub message: String,

    /// Error chain (and backtrace, if captured).
    pub traceback: String,
}

impl Raised {
    /// [`Raised::kind`] of panics.
    pub const PANIC: &'static str = "panic";

    /// Captures the given `err`.
    ///
    /// It's named after the [`io::ErrorKind`] of its root cause, if any, or
    /// after the declared error type `E` otherwise.
    pub fn from_error<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        let err = err.into();
        let kind = err.root_cause().downcast_ref::<io::Error>().map_or_else(
            short_type_name::<E>,
            |e| format!("io::{:?}", e.kind()),
        );
        Self {
            kind,
            message: err.to_string(),
            traceback: format!("{err:?}"),
        }
    }

    /// Captures the given panic `payload`.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload_to_string(payload);
        Self {
            kind: Self::PANIC.to_owned(),
            traceback: format!("panicked: {message}"),
            message,
        }
    }

    /// Runs the given `f`, capturing its returned error or its panic.
    ///
    /// A captured panic carries its location, along with a backtrace when
    /// `RUST_BACKTRACE` enables one.
    pub(crate) fn capture<F>(f: F) -> Result<(), Self>
    where
        F: FnOnce() -> Result<(), Self>,
    {
        _ = Lazy::force(&PANIC_HOOK);
        panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
            let site = LAST_PANIC.with(|last| last.borrow_mut().take());
            Err(Self::from_panic(&*payload).located(site))
        })
    }

    /// Adds the `site` of the panic to the [`Raised::traceback`].
    fn located(mut self, site: Option<PanicSite>) -> Self {
        let Some(site) = site else {
            return self;
        };
        if let Some(location) = site.location {
            self.traceback =
                format!("panicked at {location}: {}", self.message);
        }
        if site.backtrace.status() == BacktraceStatus::Captured {
            self.traceback = format!("{}\n{}", self.traceback, site.backtrace);
        }
        self
    }
}

/// Return value of a step body or a hook: either `()` (failing by panic) or
/// a [`Result`] whose error is converted into [`Raised`].
pub trait Outcome {
    /// Converts this [`Outcome`] into a [`Result`].
    ///
    /// # Errors
    ///
    /// If this [`Outcome`] represents a failure.
    fn into_result(self) -> Result<(), Raised>;
}

impl Outcome for () {
    fn into_result(self) -> Result<(), Raised> {
        Ok(())
    }
}

impl<E> Outcome for Result<(), E>
where
    E: Into<anyhow::Error>,
{
    fn into_result(self) -> Result<(), Raised> {
        self.map_err(Raised::from_error)
    }
}

impl From<Raised> for Failure {
    fn from(raised: Raised) -> Self {
        Self {
            name: raised.kind,
            reason: raised.message,
            traceback: raised.traceback,
        }
    }
}

/// Converts a panic `payload` into a readable [`String`].
pub(crate) fn payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        "Unknown panic payload".to_owned()
    }
}

/// Last path segment of the `T` type name, without generics.
///
/// A bare `Error` keeps its parent module, so `anyhow::Error` and
/// `serde_json::Error` stay distinguishable.
fn short_type_name<T>() -> String {
    let full = any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let mut segments = base.rsplit("::");
    let last = segments.next().unwrap_or(base);
    match segments.next() {
        Some(module) if last == "Error" => format!("{module}::{last}"),
        _ => last.to_owned(),
    }
}
