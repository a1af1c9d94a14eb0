//! Macro capability set.
//!
//! A macro attaches with a [`MacroOps`] bundle: its register window, its DAI
//! descriptors, a mandatory clock switch and a handful of optional
//! capabilities. Absent capabilities are `None` rather than sentinel values.
//!
//! All capability traits take `&self` and require `Sync`; implementors use
//! interior mutability so one macro instance can be borrowed by the codec and
//! by its own driver at the same time.

use crate::error::CodecError;
use crate::ids::MacroId;

/// One digital-audio-interface descriptor contributed by a macro.
///
/// The composite codec exposes the concatenation of every macro's list; a
/// DAI's position in that list is its index in the composite identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DaiDescriptor {
    /// Interface name as exposed by the composite codec.
    pub name: &'static str,
    /// Macro-local interface id.
    pub id: u32,
}

impl DaiDescriptor {
    /// Create a descriptor.
    pub const fn new(name: &'static str, id: u32) -> Self {
        Self { name, id }
    }
}

/// Lifecycle events delivered to a macro's [`MacroEventHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacroEvent {
    /// The codec went down for a subsystem restart; register I/O is refused.
    SsrDown,
    /// The codec is back; register I/O and clock requests may resume.
    SsrUp,
    /// Sent to the clock-gating macro before the bus leaves cache-only mode,
    /// so it can order itself against its reset line.
    WaitForClockReset,
    /// Analog peer asks the playback path to mute.
    RxMute,
    /// Analog peer detected a load impedance.
    ImpedanceDetected,
    /// Analog peer cleared impedance detection.
    ImpedanceCleared,
}

/// Master-clock switch a macro exposes to the arbiter.
///
/// Calls may nest: the arbiter enables a source once per holder and expects
/// the implementation to keep its own count.
pub trait MacroClock: Sync {
    /// Enable (`true`) or disable (`false`) the clock this macro drives.
    fn set_clock(&self, enable: bool) -> Result<(), CodecError>;
}

/// Init/exit hooks run when the composite codec is probed and removed.
pub trait MacroLifecycle: Sync {
    /// Bring the macro up after the composite codec exists.
    fn init(&self) -> Result<(), CodecError>;

    /// Tear the macro down before the composite codec goes away.
    fn exit(&self);
}

/// Receiver for lifecycle and forwarded peer events.
pub trait MacroEventHandler: Sync {
    /// Handle `event` with its payload.
    fn on_event(&self, event: MacroEvent, data: u32);
}

/// Wake-interrupt registration, only honoured for [`MacroId::WAKE_OWNER`].
///
/// [`MacroId::WAKE_OWNER`]: crate::MacroId::WAKE_OWNER
pub trait WakeIrq: Sync {
    /// Register the wake source; `ipc_wakeup` selects IPC wake-up over the
    /// hardware interrupt line.
    fn register_wake_irq(&self, ipc_wakeup: u32);
}

/// Parameters of one SoundWire master port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortParams {
    /// Sample offset within the frame.
    pub offset1: u8,
    /// Data lane the port is routed to.
    pub lane_ctrl: u8,
}

/// SoundWire port layout for one macro in one use case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapEntry<'p> {
    /// Macro the layout is meant for.
    pub macro_id: MacroId,
    /// Use-case selector understood by the macro.
    pub use_case: u32,
    /// Per-port parameters, indexed by master port.
    pub ports: &'p [PortParams],
}

/// SoundWire port-map configuration.
pub trait MacroPortMap: Sync {
    /// Apply `ports` for `use_case`.
    fn set_port_map(&self, use_case: u32, ports: &[PortParams]) -> Result<(), CodecError>;
}

/// Everything a macro hands to the codec when it attaches.
#[derive(Clone, Copy)]
pub struct MacroOps<'a> {
    /// Base address of the macro's register window on the shared bus.
    pub register_base: u32,
    /// DAI descriptors, in the macro's own order.
    pub dais: &'a [DaiDescriptor],
    /// Clock switch.
    pub clock: &'a dyn MacroClock,
    /// Init/exit hooks.
    pub lifecycle: Option<&'a dyn MacroLifecycle>,
    /// Event handler.
    pub events: Option<&'a dyn MacroEventHandler>,
    /// Wake-interrupt registration.
    pub wake_irq: Option<&'a dyn WakeIrq>,
    /// SoundWire port-map configuration.
    pub port_map: Option<&'a dyn MacroPortMap>,
}

impl<'a> MacroOps<'a> {
    /// Bundle with the mandatory parts only.
    pub fn new(register_base: u32, dais: &'a [DaiDescriptor], clock: &'a dyn MacroClock) -> Self {
        Self {
            register_base,
            dais,
            clock,
            lifecycle: None,
            events: None,
            wake_irq: None,
            port_map: None,
        }
    }

    /// Add init/exit hooks.
    #[must_use]
    pub fn with_lifecycle(mut self, lifecycle: &'a dyn MacroLifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Add an event handler.
    #[must_use]
    pub fn with_events(mut self, events: &'a dyn MacroEventHandler) -> Self {
        self.events = Some(events);
        self
    }

    /// Add wake-interrupt registration.
    #[must_use]
    pub fn with_wake_irq(mut self, wake_irq: &'a dyn WakeIrq) -> Self {
        self.wake_irq = Some(wake_irq);
        self
    }

    /// Add port-map configuration.
    #[must_use]
    pub fn with_port_map(mut self, port_map: &'a dyn MacroPortMap) -> Self {
        self.port_map = Some(port_map);
        self
    }
}

impl core::fmt::Debug for MacroOps<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MacroOps")
            .field("register_base", &self.register_base)
            .field("dais", &self.dais)
            .field("lifecycle", &self.lifecycle.is_some())
            .field("events", &self.events.is_some())
            .field("wake_irq", &self.wake_irq.is_some())
            .field("port_map", &self.port_map.is_some())
            .finish_non_exhaustive()
    }
}
