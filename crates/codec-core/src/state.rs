//! The one lock and the state it guards.
//!
//! Lifecycle flag, active-source map, generator reference count and the
//! macro table all live in [`Shared`] behind a single blocking mutex. Each
//! component owns its slice of the state (`ssr::Lifecycle`,
//! `clock_mux::ClockState`, `registry::RegistryState`) and exposes only
//! composite transitions on it.
//!
//! Macro callbacks run with the lock held but never while the `RefCell` is
//! borrowed: [`Section::state`] confines each borrow to a closure, and
//! nothing in those closures calls out of the crate. A callback that
//! re-enters the codec on the same execution context therefore sees a free
//! cell instead of a double borrow.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::bus::register_address;
use crate::clock_mux::{ClockState, MuxTable};
use crate::error::CodecError;
use crate::fmt::RateLimit;
use crate::ids::{DeviceId, MacroId};
use crate::ops::MacroClock;
use crate::registry::{BuiltComposite, MacroSlot, RegistryState};
use crate::ssr::Lifecycle;
use crate::version::VersionTier;

/// Everything the shared lock protects.
pub(crate) struct Shared<'a> {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) clocks: ClockState,
    pub(crate) registry: RegistryState<'a>,
    pub(crate) version: VersionTier,
    diag: RateLimit,
}

/// Result of [`Shared::detach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Detached {
    /// Nothing attached under that id (or attached from another device).
    Unknown,
    /// Slot cleared; the composite registration is still in place or was
    /// never published.
    Cleared,
    /// Slot cleared and the published composite must be unregistered.
    Unpublish,
}

impl<'a> Shared<'a> {
    fn new(expected_macros: u8) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            clocks: ClockState::new(MuxTable::DEFAULT),
            registry: RegistryState::new(expected_macros),
            version: VersionTier::Undefined,
            diag: RateLimit::new(),
        }
    }

    /// Fail fast with [`CodecError::NotReady`] while the codec is down.
    pub(crate) fn ensure_up(&mut self, op: &'static str) -> Result<(), CodecError> {
        if self.lifecycle.is_up() {
            return Ok(());
        }
        if self.diag.allow() {
            debug!("{}: subsystem restart in progress", op);
        }
        Err(CodecError::NotReady)
    }

    /// `true` if a rate-limited diagnostic may be emitted now.
    pub(crate) fn diag_allowed(&mut self) -> bool {
        self.diag.allow()
    }

    /// Clock switch of an attached clock-source macro.
    pub(crate) fn source_clock(&self, source: MacroId) -> Result<&'a dyn MacroClock, CodecError> {
        self.registry
            .slot(source)
            .map(|slot| slot.ops.clock)
            .ok_or(CodecError::InvalidArgument)
    }

    /// Source currently clocking `id`, its switch and the physical address of
    /// `reg` in `id`'s register window.
    pub(crate) fn register_target(
        &mut self,
        id: MacroId,
        reg: u16,
    ) -> Result<(MacroId, &'a dyn MacroClock, u32), CodecError> {
        let Some(base) = self.registry.slot(id).map(|slot| slot.ops.register_base) else {
            if self.diag.allow() {
                debug!("{}: register window not attached", id);
            }
            return Err(CodecError::InvalidArgument);
        };
        let source = self.clocks.active_source(id);
        let clock = match self.source_clock(source) {
            Ok(clock) => clock,
            Err(err) => {
                if self.diag.allow() {
                    debug!("{}: clock source {} not attached", id, source);
                }
                return Err(err);
            }
        };
        Ok((source, clock, register_address(base, reg)?))
    }

    /// Admit a macro; returns the composite descriptor list when this attach
    /// completed the expected set.
    pub(crate) fn attach(
        &mut self,
        id: MacroId,
        slot: MacroSlot<'a>,
    ) -> Result<Option<BuiltComposite>, CodecError> {
        self.registry.admit(id, slot)?;
        self.clocks.reset_active(id);
        if !self.registry.is_complete() {
            return Ok(None);
        }
        let built = match self.registry.build_composite() {
            Ok(built) => built,
            Err(err) => {
                // Leave the registry exactly as it was before this attach.
                let _ = self.registry.evict(id, slot.device);
                self.clocks.reset_active(id);
                return Err(err);
            }
        };
        if !self.registry.is_attached(MacroId::CLOCK_PROVIDER)
            && self.clocks.apply_provider_fallback()
        {
            debug!(
                "{} absent: dependent macros switched to self-sourced clocks",
                MacroId::CLOCK_PROVIDER
            );
        }
        Ok(Some(built))
    }

    /// Remove a macro attached from `device`.
    pub(crate) fn detach(&mut self, id: MacroId, device: DeviceId) -> Detached {
        let Some(teardown) = self.registry.evict(id, device) else {
            return Detached::Unknown;
        };
        self.clocks.reset_active(id);
        if teardown {
            Detached::Unpublish
        } else {
            Detached::Cleared
        }
    }
}

/// Lock wrapper around [`Shared`].
pub(crate) struct SharedState<'a, M: RawMutex> {
    inner: Mutex<M, RefCell<Shared<'a>>>,
}

impl<'a, M: RawMutex> SharedState<'a, M> {
    pub(crate) fn new(expected_macros: u8) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Shared::new(expected_macros))),
        }
    }

    /// Run `f` with the lock held.
    pub(crate) fn critical<R>(&self, f: impl FnOnce(&Section<'_, 'a>) -> R) -> R {
        self.inner.lock(|cell| f(&Section { cell }))
    }

    /// Single short transition under the lock.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut Shared<'a>) -> R) -> R {
        self.critical(|section| section.state(f))
    }
}

/// A held lock. State is reachable only through short borrows.
pub(crate) struct Section<'s, 'a> {
    cell: &'s RefCell<Shared<'a>>,
}

impl<'a> Section<'_, 'a> {
    /// Borrow the guarded state for the duration of `f`.
    ///
    /// `f` must not call macro callbacks, the bus or the registrar.
    pub(crate) fn state<R>(&self, f: impl FnOnce(&mut Shared<'a>) -> R) -> R {
        f(&mut self.cell.borrow_mut())
    }
}
