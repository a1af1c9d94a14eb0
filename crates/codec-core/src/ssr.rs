//! Subsystem-restart (SSR) state machine.
//!
//! ```text
//!            on_down()                     on_up()
//!   Up ───────────────────▶ Down ───────────────────▶ Up
//!    ▲                                                 │
//!    └── first on_up() after construction is a no-op ──┘
//! ```
//!
//! The codec is born `Up`. The first `on_up()` only consumes the cold-boot
//! marker so no "came back" traffic goes out before a real restart. While
//! `Down` the bus is in cache-only mode and register access and clock
//! requests fail fast with [`CodecError::NotReady`](crate::CodecError::NotReady).
//! Coming back up re-drives any frame-sync generator bits a restart cut off.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::bus::RegisterBus;
use crate::codec::Codec;
use crate::ids::MacroId;
use crate::notifier::PeerEvent;
use crate::ops::MacroEvent;
use crate::registry::ComponentRegistrar;

/// Up/Down flag plus the cold-boot marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lifecycle {
    up: bool,
    cold_boot: bool,
}

impl Lifecycle {
    pub(crate) const fn new() -> Self {
        Self {
            up: true,
            cold_boot: true,
        }
    }

    pub(crate) fn is_up(self) -> bool {
        self.up
    }

    pub(crate) fn go_down(&mut self) {
        self.up = false;
        // A real restart happened; the next Up must be delivered.
        self.cold_boot = false;
    }

    pub(crate) fn go_up(&mut self) {
        self.up = true;
    }

    /// Consume the cold-boot marker. Returns `true` if it was still set.
    pub(crate) fn take_cold_boot(&mut self) -> bool {
        core::mem::take(&mut self.cold_boot)
    }
}

impl<'a, M, B, R> Codec<'a, M, B, R>
where
    M: RawMutex,
    B: RegisterBus,
    R: ComponentRegistrar,
{
    /// The platform is restarting the codec subsystem.
    pub fn on_down(&self) {
        debug!("subsystem restart: down");
        self.notify_peer(PeerEvent::PreRestart);
        self.bus.set_cache_only(true);

        let handlers = self.shared.with(|s| {
            s.lifecycle.go_down();
            s.registry.event_handlers()
        });
        for (id, handler) in handlers {
            trace!("{}: ssr down", id);
            handler.on_event(MacroEvent::SsrDown, 0);
        }

        self.notify_peer(PeerEvent::RestartDown);
    }

    /// The codec subsystem is back.
    pub fn on_up(&self) {
        if self.shared.with(|s| s.lifecycle.take_cold_boot()) {
            debug!("subsystem up at cold boot, nothing to restore");
            return;
        }
        debug!("subsystem restart: up");

        let gate = self
            .shared
            .with(|s| s.registry.event_handler(MacroId::CLOCK_GATE));
        if let Some(gate) = gate {
            gate.on_event(MacroEvent::WaitForClockReset, 0);
        }
        self.bus.set_cache_only(false);

        let handlers = self.shared.with(|s| {
            s.lifecycle.go_up();
            s.registry.event_handlers()
        });
        self.resync_generator();
        for (id, handler) in handlers {
            trace!("{}: ssr up", id);
            handler.on_event(MacroEvent::SsrUp, 0);
        }

        self.notify_peer(PeerEvent::RestartUp);
    }

    /// `true` unless a subsystem restart is in progress.
    pub fn is_up(&self) -> bool {
        self.shared.with(|s| s.lifecycle.is_up())
    }
}

#[cfg(test)]
mod tests {
    use super::Lifecycle;

    #[test]
    fn test_cold_boot_consumed_once() {
        let mut lc = Lifecycle::new();
        assert!(lc.is_up());
        assert!(lc.take_cold_boot());
        assert!(!lc.take_cold_boot());
    }

    #[test]
    fn test_down_clears_cold_boot() {
        let mut lc = Lifecycle::new();
        lc.go_down();
        assert!(!lc.is_up());
        assert!(!lc.take_cold_boot(), "up after a real down must not be suppressed");
        lc.go_up();
        assert!(lc.is_up());
    }
}
