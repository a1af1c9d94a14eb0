//! The composite codec.
//!
//! [`Codec`] owns the shared state and the collaborators. Its operations are
//! split by concern across the crate:
//!
//! | Concern              | Module                                  |
//! |----------------------|-----------------------------------------|
//! | attach / detach      | [`registry`](crate::registry)           |
//! | clock requests       | [`clock_mux`](crate::clock_mux)         |
//! | register access      | [`register_port`](crate::register_port) |
//! | restart handling     | [`ssr`](crate::ssr)                     |
//! | runtime PM           | [`power`](crate::power)                 |
//! | probe, peer traffic  | here                                    |

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::bus::RegisterBus;
use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::ids::MacroId;
use crate::notifier::{AdcChannel, CodecListener, NotifierHub, PeerEvent, PeerRequest};
use crate::ops::{MacroClock, PortMapEntry};
use crate::registry::ComponentRegistrar;
use crate::state::SharedState;
use crate::version::VersionTier;

/// Arbitration core for one multi-macro codec.
///
/// `M` selects the raw mutex behind the shared lock, `B` is the register
/// transport and `R` publishes the composite identity. Both `B` and `R` are
/// also implemented for shared references, so a codec can borrow them.
pub struct Codec<'a, M, B, R>
where
    M: RawMutex,
    B: RegisterBus,
    R: ComponentRegistrar,
{
    pub(crate) config: CodecConfig,
    pub(crate) shared: SharedState<'a, M>,
    pub(crate) bus: B,
    pub(crate) registrar: R,
    pub(crate) aux_clock: Option<&'a dyn MacroClock>,
    notifier: NotifierHub<'a, M>,
}

impl<'a, M, B, R> Codec<'a, M, B, R>
where
    M: RawMutex,
    B: RegisterBus,
    R: ComponentRegistrar,
{
    /// Create a codec with no macros attached.
    pub fn new(config: CodecConfig, bus: B, registrar: R) -> Result<Self, CodecError> {
        config.validate().map_err(|err| {
            error!(
                "{}: expected_macros {} out of range",
                config.device, config.expected_macros
            );
            err
        })?;
        Ok(Self {
            config,
            shared: SharedState::new(config.expected_macros),
            bus,
            registrar,
            aux_clock: None,
            notifier: NotifierHub::new(),
        })
    }

    /// Always-on auxiliary clock managed by the runtime PM hooks.
    #[must_use]
    pub fn with_aux_clock(mut self, clock: &'a dyn MacroClock) -> Self {
        self.aux_clock = Some(clock);
        self
    }

    /// Configuration this codec was built with.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Register transport.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Initialise every attached macro, fix the version tier and deliver the
    /// cold-boot `Up`.
    ///
    /// Init runs in identity order and stops at the first failure.
    pub fn probe(&self) -> Result<(), CodecError> {
        let lifecycles = self.shared.with(|s| s.registry.lifecycles());
        for (id, lifecycle) in lifecycles {
            lifecycle.init().map_err(|err| {
                error!("{} init failed: {}", id, err);
                err
            })?;
        }
        let version = self.shared.with(|s| {
            s.version = VersionTier::from_count(s.registry.attached_count());
            s.version
        });
        debug!("codec probed, version {}", version);
        self.on_up();
        Ok(())
    }

    /// Run every attached macro's exit hook, in identity order.
    pub fn remove(&self) {
        let lifecycles = self.shared.with(|s| s.registry.lifecycles());
        for (id, lifecycle) in lifecycles {
            trace!("{} exit", id);
            lifecycle.exit();
        }
    }

    /// Version tier fixed at probe time.
    pub fn version(&self) -> VersionTier {
        self.shared.with(|s| s.version)
    }

    /// Forward wake-interrupt registration to the wake owner, if it has the
    /// capability.
    pub fn register_wake_irq(&self, ipc_wakeup: u32) -> Result<(), CodecError> {
        match self.shared.with(|s| s.registry.wake_irq()) {
            Some(wake) => wake.register_wake_irq(ipc_wakeup),
            None => debug!("{} has no wake capability", MacroId::WAKE_OWNER),
        }
        Ok(())
    }

    /// Hand a request from the analog peer to the playback macro.
    pub fn forward_peer_event(&self, request: PeerRequest, data: u32) -> Result<(), CodecError> {
        let handler = self
            .shared
            .with(|s| s.registry.event_handler(MacroId::PEER_SINK));
        match handler {
            Some(handler) => handler.on_event(request.macro_event(), data),
            None => debug!("{} request dropped, {} has no handler", request, MacroId::PEER_SINK),
        }
        Ok(())
    }

    /// Hand each SoundWire port-map entry to the macro it names.
    ///
    /// Entries for macros that are absent or lack the capability are
    /// skipped. Stops at the first macro that rejects its layout.
    pub fn set_port_map(&self, entries: &[PortMapEntry<'_>]) -> Result<(), CodecError> {
        if entries.is_empty() {
            error!("set_port_map: empty port map");
            return Err(CodecError::InvalidArgument);
        }
        for entry in entries {
            let id = entry.macro_id;
            let Some(port_map) = self.shared.with(|s| s.registry.port_map(id)) else {
                trace!("{} takes no port map", id);
                continue;
            };
            port_map.set_port_map(entry.use_case, entry.ports).map_err(|err| {
                error!("{} port map for use case {} failed: {}", id, entry.use_case, err);
                err
            })?;
        }
        Ok(())
    }

    /// Tell the peer to release the transmit hold for `adc`.
    pub fn clear_tx_hold(&self, adc: AdcChannel) {
        let Some(line) = adc.hold_line() else {
            trace!("{} has no transmit hold", adc);
            return;
        };
        self.notify_peer(PeerEvent::TxHoldClear { line });
    }

    /// Subscribe (`enable`) or unsubscribe the analog peer.
    pub fn register_listener(
        &self,
        listener: &'a dyn CodecListener,
        enable: bool,
    ) -> Result<(), CodecError> {
        if enable {
            self.notifier.subscribe(listener)
        } else {
            self.notifier.unsubscribe(listener)
        }
    }

    /// The peer notifier.
    pub fn notifier(&self) -> &NotifierHub<'a, M> {
        &self.notifier
    }

    pub(crate) fn notify_peer(&self, event: PeerEvent) {
        trace!("peer event {}", event);
        self.notifier.notify(event.code(), self.config.peer);
    }
}
