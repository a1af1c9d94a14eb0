//! Mock collaborators for host-side testing.
//!
//! Every mock records its calls for assertion and can inject failures. They
//! use atomics and embassy blocking mutexes only, so they build on `no_std`
//! targets and can be shared across threads in host tests.
//!
//! Calls that need ordering checks are stamped from one crate-wide
//! [`next_seq`] counter.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::bus::RegisterBus;
use crate::error::CodecError;
use crate::ids::DeviceId;
use crate::notifier::{CodecListener, PeerEvent};
use crate::ops::{
    DaiDescriptor, MacroClock, MacroEvent, MacroEventHandler, MacroLifecycle, MacroPortMap,
    PortParams, WakeIrq,
};
use crate::registry::{ComponentRegistrar, CompositeDais};

type Guarded<T> = Mutex<CriticalSectionRawMutex, RefCell<T>>;

/// Capacity of every mock call log.
pub const LOG_CAPACITY: usize = 64;

static SEQ: AtomicU32 = AtomicU32::new(1);

/// Next value of the global call sequence.
pub fn next_seq() -> u32 {
    SEQ.fetch_add(1, Ordering::SeqCst)
}

fn failure(code: &AtomicI32) -> Result<(), CodecError> {
    match code.load(Ordering::SeqCst) {
        0 => Ok(()),
        code => Err(CodecError::HardwareFailure(code)),
    }
}

// ── Register bus ────────────────────────────────────────────────────────────

/// Register file with a write log.
///
/// Writes update the register file either way; only writes made outside
/// cache-only mode are logged as issued to hardware.
pub struct MockBus {
    registers: Guarded<heapless::LinearMap<u32, u8, LOG_CAPACITY>>,
    writes: Guarded<heapless::Vec<(u32, u8), LOG_CAPACITY>>,
    reads: AtomicU32,
    cached_writes: AtomicU32,
    cache_only: AtomicBool,
}

impl MockBus {
    /// Empty register file, live mode.
    pub const fn new() -> Self {
        Self {
            registers: Mutex::new(RefCell::new(heapless::LinearMap::new())),
            writes: Mutex::new(RefCell::new(heapless::Vec::new())),
            reads: AtomicU32::new(0),
            cached_writes: AtomicU32::new(0),
            cache_only: AtomicBool::new(false),
        }
    }

    /// Set a register without logging a write.
    pub fn preload(&self, addr: u32, value: u8) {
        self.registers.lock(|r| {
            let _ = r.borrow_mut().insert(addr, value);
        });
    }

    /// Current register value (unset registers read as 0).
    pub fn register(&self, addr: u32) -> u8 {
        self.registers
            .lock(|r| r.borrow().get(&addr).copied().unwrap_or(0))
    }

    /// Writes issued to hardware, oldest first.
    pub fn writes(&self) -> heapless::Vec<(u32, u8), LOG_CAPACITY> {
        self.writes.lock(|w| w.borrow().clone())
    }

    /// Number of reads.
    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Writes absorbed while in cache-only mode.
    pub fn cached_writes(&self) -> u32 {
        self.cached_writes.load(Ordering::SeqCst)
    }

    /// Whether the bus is in cache-only mode.
    pub fn is_cache_only(&self) -> bool {
        self.cache_only.load(Ordering::SeqCst)
    }

    /// Forget logged writes and counters; register contents are kept.
    pub fn clear_log(&self) {
        self.writes.lock(|w| w.borrow_mut().clear());
        self.reads.store(0, Ordering::SeqCst);
        self.cached_writes.store(0, Ordering::SeqCst);
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBus for MockBus {
    fn read_raw(&self, addr: u32) -> u8 {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.register(addr)
    }

    fn write_raw(&self, addr: u32, value: u8) {
        self.preload(addr, value);
        if self.is_cache_only() {
            self.cached_writes.fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.writes.lock(|w| {
            let _ = w.borrow_mut().push((addr, value));
        });
    }

    fn set_cache_only(&self, enable: bool) {
        self.cache_only.store(enable, Ordering::SeqCst);
    }
}

// ── Clock ───────────────────────────────────────────────────────────────────

/// Counting clock switch.
pub struct MockClock {
    enable_calls: AtomicU32,
    enables: AtomicU32,
    disables: AtomicU32,
    fail_enable: AtomicI32,
    fail_disable: AtomicI32,
    last_enable_seq: AtomicU32,
    last_disable_seq: AtomicU32,
}

impl MockClock {
    /// Clock that always succeeds.
    pub const fn new() -> Self {
        Self {
            enable_calls: AtomicU32::new(0),
            enables: AtomicU32::new(0),
            disables: AtomicU32::new(0),
            fail_enable: AtomicI32::new(0),
            fail_disable: AtomicI32::new(0),
            last_enable_seq: AtomicU32::new(0),
            last_disable_seq: AtomicU32::new(0),
        }
    }

    /// Make enables fail with `HardwareFailure(code)`; `0` restores success.
    pub fn fail_enable_with(&self, code: i32) {
        self.fail_enable.store(code, Ordering::SeqCst);
    }

    /// Make disables fail with `HardwareFailure(code)`; `0` restores success.
    pub fn fail_disable_with(&self, code: i32) {
        self.fail_disable.store(code, Ordering::SeqCst);
    }

    /// Enable calls, failed ones included.
    pub fn enable_calls(&self) -> u32 {
        self.enable_calls.load(Ordering::SeqCst)
    }

    /// Successful enables.
    pub fn enables(&self) -> u32 {
        self.enables.load(Ordering::SeqCst)
    }

    /// Disable calls, failed ones included.
    pub fn disables(&self) -> u32 {
        self.disables.load(Ordering::SeqCst)
    }

    /// Outstanding holds: successful enables minus disables.
    pub fn held(&self) -> i64 {
        i64::from(self.enables()).saturating_sub(i64::from(self.disables()))
    }

    /// Sequence stamp of the latest enable call.
    pub fn last_enable_seq(&self) -> u32 {
        self.last_enable_seq.load(Ordering::SeqCst)
    }

    /// Sequence stamp of the latest disable call.
    pub fn last_disable_seq(&self) -> u32 {
        self.last_disable_seq.load(Ordering::SeqCst)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroClock for MockClock {
    fn set_clock(&self, enable: bool) -> Result<(), CodecError> {
        if enable {
            self.enable_calls.fetch_add(1, Ordering::SeqCst);
            self.last_enable_seq.store(next_seq(), Ordering::SeqCst);
            failure(&self.fail_enable)?;
            self.enables.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            self.disables.fetch_add(1, Ordering::SeqCst);
            self.last_disable_seq.store(next_seq(), Ordering::SeqCst);
            failure(&self.fail_disable)
        }
    }
}

// ── Macro ───────────────────────────────────────────────────────────────────

/// Macro driver stand-in: lifecycle hooks, event handler, wake capability
/// and port-map configuration.
pub struct MockMacro {
    events: Guarded<heapless::Vec<(u32, MacroEvent, u32), LOG_CAPACITY>>,
    port_maps: Guarded<heapless::Vec<(u32, PortParams), LOG_CAPACITY>>,
    fail_port_map: AtomicI32,
    inits: AtomicU32,
    exits: AtomicU32,
    fail_init: AtomicI32,
    wake_calls: AtomicU32,
    last_wake: AtomicU32,
}

impl MockMacro {
    /// Macro whose hooks all succeed.
    pub const fn new() -> Self {
        Self {
            events: Mutex::new(RefCell::new(heapless::Vec::new())),
            port_maps: Mutex::new(RefCell::new(heapless::Vec::new())),
            fail_port_map: AtomicI32::new(0),
            inits: AtomicU32::new(0),
            exits: AtomicU32::new(0),
            fail_init: AtomicI32::new(0),
            wake_calls: AtomicU32::new(0),
            last_wake: AtomicU32::new(0),
        }
    }

    /// Make `init` fail with `HardwareFailure(code)`; `0` restores success.
    pub fn fail_init_with(&self, code: i32) {
        self.fail_init.store(code, Ordering::SeqCst);
    }

    /// Make `set_port_map` fail with `HardwareFailure(code)`; `0` restores
    /// success.
    pub fn fail_port_map_with(&self, code: i32) {
        self.fail_port_map.store(code, Ordering::SeqCst);
    }

    /// Port maps applied: use case and the first port's parameters.
    pub fn port_maps(&self) -> heapless::Vec<(u32, PortParams), LOG_CAPACITY> {
        self.port_maps.lock(|p| p.borrow().clone())
    }

    /// Events received, oldest first.
    pub fn events(&self) -> heapless::Vec<MacroEvent, LOG_CAPACITY> {
        self.events
            .lock(|e| e.borrow().iter().map(|&(_, event, _)| event).collect())
    }

    /// Events with their payload and sequence stamp.
    pub fn event_log(&self) -> heapless::Vec<(u32, MacroEvent, u32), LOG_CAPACITY> {
        self.events.lock(|e| e.borrow().clone())
    }

    /// Sequence stamp of the first `event` received.
    pub fn seq_of(&self, event: MacroEvent) -> Option<u32> {
        self.events.lock(|e| {
            e.borrow()
                .iter()
                .find(|&&(_, ev, _)| ev == event)
                .map(|&(seq, _, _)| seq)
        })
    }

    /// `init` calls.
    pub fn inits(&self) -> u32 {
        self.inits.load(Ordering::SeqCst)
    }

    /// `exit` calls.
    pub fn exits(&self) -> u32 {
        self.exits.load(Ordering::SeqCst)
    }

    /// Wake registrations.
    pub fn wake_calls(&self) -> u32 {
        self.wake_calls.load(Ordering::SeqCst)
    }

    /// Argument of the latest wake registration.
    pub fn last_wake(&self) -> u32 {
        self.last_wake.load(Ordering::SeqCst)
    }
}

impl Default for MockMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroLifecycle for MockMacro {
    fn init(&self) -> Result<(), CodecError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        failure(&self.fail_init)
    }

    fn exit(&self) {
        self.exits.fetch_add(1, Ordering::SeqCst);
    }
}

impl MacroEventHandler for MockMacro {
    fn on_event(&self, event: MacroEvent, data: u32) {
        let seq = next_seq();
        self.events.lock(|e| {
            let _ = e.borrow_mut().push((seq, event, data));
        });
    }
}

impl WakeIrq for MockMacro {
    fn register_wake_irq(&self, ipc_wakeup: u32) {
        self.wake_calls.fetch_add(1, Ordering::SeqCst);
        self.last_wake.store(ipc_wakeup, Ordering::SeqCst);
    }
}

impl MacroPortMap for MockMacro {
    fn set_port_map(&self, use_case: u32, ports: &[PortParams]) -> Result<(), CodecError> {
        failure(&self.fail_port_map)?;
        let first = ports.first().copied().unwrap_or_default();
        self.port_maps.lock(|p| {
            let _ = p.borrow_mut().push((use_case, first));
        });
        Ok(())
    }
}

// ── Registrar ───────────────────────────────────────────────────────────────

/// Records the published composite.
pub struct MockRegistrar {
    published: Guarded<Option<CompositeDais>>,
    registers: AtomicU32,
    unregisters: AtomicU32,
    fail: AtomicI32,
}

impl MockRegistrar {
    /// Registrar that accepts every composite.
    pub const fn new() -> Self {
        Self {
            published: Mutex::new(RefCell::new(None)),
            registers: AtomicU32::new(0),
            unregisters: AtomicU32::new(0),
            fail: AtomicI32::new(0),
        }
    }

    /// Make `register` fail with `HardwareFailure(code)`; `0` restores success.
    pub fn fail_with(&self, code: i32) {
        self.fail.store(code, Ordering::SeqCst);
    }

    /// Currently published composite.
    pub fn published(&self) -> Option<CompositeDais> {
        self.published.lock(|p| p.borrow().clone())
    }

    /// Names of the published DAIs, in order.
    pub fn published_names(&self) -> heapless::Vec<&'static str, LOG_CAPACITY> {
        self.published.lock(|p| {
            p.borrow()
                .iter()
                .flat_map(|dais| dais.iter().map(|d| d.name))
                .collect()
        })
    }

    /// `register` calls, failed ones included.
    pub fn registers(&self) -> u32 {
        self.registers.load(Ordering::SeqCst)
    }

    /// `unregister` calls.
    pub fn unregisters(&self) -> u32 {
        self.unregisters.load(Ordering::SeqCst)
    }
}

impl Default for MockRegistrar {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistrar for MockRegistrar {
    fn register(&self, dais: &[DaiDescriptor]) -> Result<(), CodecError> {
        self.registers.fetch_add(1, Ordering::SeqCst);
        failure(&self.fail)?;
        let mut copy = CompositeDais::new();
        copy.extend_from_slice(dais)
            .map_err(|_| CodecError::ResourceExhausted)?;
        self.published.lock(|p| *p.borrow_mut() = Some(copy));
        Ok(())
    }

    fn unregister(&self) {
        self.unregisters.fetch_add(1, Ordering::SeqCst);
        self.published.lock(|p| *p.borrow_mut() = None);
    }
}

// ── Listener ────────────────────────────────────────────────────────────────

/// Records notifier traffic.
pub struct MockListener {
    log: Guarded<heapless::Vec<(u32, u32, Option<DeviceId>), LOG_CAPACITY>>,
}

impl MockListener {
    /// Listener with an empty log.
    pub const fn new() -> Self {
        Self {
            log: Mutex::new(RefCell::new(heapless::Vec::new())),
        }
    }

    /// Raw codes received, oldest first.
    pub fn codes(&self) -> heapless::Vec<u32, LOG_CAPACITY> {
        self.log
            .lock(|l| l.borrow().iter().map(|&(_, code, _)| code).collect())
    }

    /// Decoded events received; undecodable codes are skipped.
    pub fn events(&self) -> heapless::Vec<PeerEvent, LOG_CAPACITY> {
        self.log.lock(|l| {
            l.borrow()
                .iter()
                .filter_map(|&(_, code, _)| PeerEvent::decode(code))
                .collect()
        })
    }

    /// Context of the latest event.
    pub fn last_context(&self) -> Option<DeviceId> {
        self.log.lock(|l| l.borrow().last().and_then(|&(_, _, ctx)| ctx))
    }

    /// Sequence stamp of the latest event.
    pub fn last_seq(&self) -> Option<u32> {
        self.log.lock(|l| l.borrow().last().map(|&(seq, _, _)| seq))
    }
}

impl Default for MockListener {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecListener for MockListener {
    fn on_codec_event(&self, code: u32, context: Option<DeviceId>) {
        let seq = next_seq();
        self.log.lock(|l| {
            let _ = l.borrow_mut().push((seq, code, context));
        });
    }
}
