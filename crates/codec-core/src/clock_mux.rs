//! Master-clock multiplexing between macros.
//!
//! Each macro's clock is supplied by one of two sources taken from the
//! [`MuxTable`]: its primary (MUX0) alone, or the primary and a secondary
//! that electrically depends on it (MUX1, cascaded). Every granted request
//! also holds one reference on the shared frame-sync generator hosted in the
//! voice-activity register window. The generator is switched on at the 0→1
//! edge and off at the 1→0 edge.
//!
//! # Lock discipline
//!
//! Clock callbacks run with the shared lock held. The generator register
//! writes do not: they go through [`Codec::update_bits`], which takes the
//! lock itself and enables a macro clock, and that clock callback may in turn
//! need the lock. The arbiter therefore drops the lock around the three
//! generator writes and takes it again before touching the active-source map.
//!
//! ```text
//!   enable MUX1:  [lock] primary on, ref+1 [unlock] generator writes
//!                 [lock] still up? secondary on, active = secondary
//!   disable MUX1: [lock] ref-1 [unlock] generator writes
//!                 [lock] secondary off, primary off, active = primary
//! ```
//!
//! A restart can land in that unlock window. Generator writes refused with
//! `NotReady` mark the hardware stale, and the next `on_up` drives all three
//! bits to match the reference count.
//!
//! [`Codec::update_bits`]: crate::Codec::update_bits

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::bus::RegisterBus;
use crate::codec::Codec;
use crate::error::CodecError;
use crate::ids::{MacroId, MuxSlot, PerMacro};
use crate::ops::MacroClock;
use crate::registry::ComponentRegistrar;
use crate::state::Shared;

/// Candidate clock sources of one macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MuxEntry {
    /// Source used on its own (MUX0) and first in the cascade (MUX1).
    pub primary: MacroId,
    /// Source stacked on the primary in the cascade.
    pub secondary: MacroId,
}

impl MuxEntry {
    const fn new(primary: MacroId, secondary: MacroId) -> Self {
        Self { primary, secondary }
    }

    /// Source selected by `slot`.
    pub const fn source(self, slot: MuxSlot) -> MacroId {
        match slot {
            MuxSlot::Primary => self.primary,
            MuxSlot::Cascaded => self.secondary,
        }
    }
}

/// Per-macro clock source preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxTable(PerMacro<MuxEntry>);

impl MuxTable {
    /// Every macro takes its primary clock from the capture macro.
    pub const DEFAULT: MuxTable = MuxTable(PerMacro::new([
        MuxEntry::new(MacroId::Capture, MacroId::VoiceActivity),
        MuxEntry::new(MacroId::Capture, MacroId::Playback),
        MuxEntry::new(MacroId::Capture, MacroId::Speaker),
        MuxEntry::new(MacroId::Capture, MacroId::VoiceActivity),
    ]));

    /// Macros that fall back to their own clock when the provider is absent.
    pub const SELF_SOURCED_FALLBACK: [MacroId; 2] = [MacroId::Speaker, MacroId::VoiceActivity];

    /// Sources for `id`.
    pub fn entry(&self, id: MacroId) -> MuxEntry {
        *self.0.get(id)
    }

    /// Source for `id` in `slot`.
    pub fn source(&self, id: MacroId, slot: MuxSlot) -> MacroId {
        self.entry(id).source(slot)
    }

    fn self_source(&mut self, id: MacroId) {
        self.0.get_mut(id).primary = id;
    }
}

impl Default for MuxTable {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Frame-sync generator control bit: register offset in the voice-activity
/// window and the mask that enables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorBit {
    /// Register offset.
    pub reg: u16,
    /// Enable mask.
    pub mask: u8,
}

/// Generator bits in enable order; disable walks them in reverse.
pub const GENERATOR_REGISTERS: [GeneratorBit; 3] = [
    // MCLK_CONTROL: master clock enable
    GeneratorBit { reg: 0x0000, mask: 0x01 },
    // FS_CNT_CONTROL: frame-sync counter enable
    GeneratorBit { reg: 0x0004, mask: 0x01 },
    // TOP_CFG0: frame-sync generator enable
    GeneratorBit { reg: 0x0080, mask: 0x02 },
];

/// What a reference-count step asks of the generator hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GeneratorEdge {
    Unchanged,
    Start,
    Stop,
}

/// Arbitration state guarded by the shared lock.
pub(crate) struct ClockState {
    mux: MuxTable,
    fallback_applied: bool,
    active: PerMacro<MacroId>,
    generator_users: u32,
    generator_stale: bool,
}

impl ClockState {
    pub(crate) fn new(mux: MuxTable) -> Self {
        let mut active = PerMacro::splat(MacroId::Capture);
        for id in MacroId::ALL {
            *active.get_mut(id) = mux.entry(id).primary;
        }
        Self {
            mux,
            fallback_applied: false,
            active,
            generator_users: 0,
            generator_stale: false,
        }
    }

    pub(crate) fn mux(&self) -> MuxTable {
        self.mux
    }

    pub(crate) fn active_source(&self, id: MacroId) -> MacroId {
        *self.active.get(id)
    }

    pub(crate) fn generator_users(&self) -> u32 {
        self.generator_users
    }

    pub(crate) fn mark_generator_stale(&mut self) {
        self.generator_stale = true;
    }

    /// Consume the stale marker. Returns the level the generator must be
    /// driven to, or `None` if the hardware already matches the count.
    pub(crate) fn take_generator_resync(&mut self) -> Option<bool> {
        core::mem::take(&mut self.generator_stale).then_some(self.generator_users > 0)
    }

    pub(crate) fn reset_active(&mut self, id: MacroId) {
        *self.active.get_mut(id) = self.mux.entry(id).primary;
    }

    /// Record the outcome of a granted request.
    pub(crate) fn settle(&mut self, id: MacroId, slot: MuxSlot, enable: bool) {
        *self.active.get_mut(id) = if enable {
            self.mux.source(id, slot)
        } else {
            self.mux.entry(id).primary
        };
    }

    /// Self-source the dependent macros. Returns `false` if already applied.
    pub(crate) fn apply_provider_fallback(&mut self) -> bool {
        if self.fallback_applied {
            return false;
        }
        for id in MuxTable::SELF_SOURCED_FALLBACK {
            self.mux.self_source(id);
            self.reset_active(id);
        }
        self.fallback_applied = true;
        true
    }

    /// Move the generator reference count one step.
    pub(crate) fn generator_step(&mut self, enable: bool) -> GeneratorEdge {
        if enable {
            self.generator_users = self.generator_users.saturating_add(1);
            if self.generator_users == 1 {
                return GeneratorEdge::Start;
            }
            return GeneratorEdge::Unchanged;
        }
        match self.generator_users {
            0 => {
                error!("frame-sync generator released with no holders");
                GeneratorEdge::Unchanged
            }
            1 => {
                self.generator_users = 0;
                GeneratorEdge::Stop
            }
            n => {
                self.generator_users = n.saturating_sub(1);
                GeneratorEdge::Unchanged
            }
        }
    }
}

const fn on_off(enable: bool) -> &'static str {
    if enable {
        "enable"
    } else {
        "disable"
    }
}

impl<'a, M, B, R> Codec<'a, M, B, R>
where
    M: RawMutex,
    B: RegisterBus,
    R: ComponentRegistrar,
{
    /// Enable or disable the clock feeding `id` through `slot`.
    ///
    /// Fails fast with [`CodecError::NotReady`] while the codec is down and
    /// with [`CodecError::InvalidArgument`] when a source macro is not
    /// attached. Disabling a cascaded clock always unwinds both sources and
    /// only reports `NotReady` or `InvalidArgument`.
    pub fn request_clock(&self, id: MacroId, slot: MuxSlot, enable: bool) -> Result<(), CodecError> {
        match (slot, enable) {
            (MuxSlot::Primary, _) => self.request_primary(id, enable),
            (MuxSlot::Cascaded, true) => self.enable_cascaded(id),
            (MuxSlot::Cascaded, false) => self.disable_cascaded(id),
        }
    }

    /// [`request_clock`](Self::request_clock) for callers holding raw ids.
    pub fn request_clock_raw(&self, id: u16, slot: u8, enable: bool) -> Result<(), CodecError> {
        let id = MacroId::try_from(id).map_err(|err| {
            error!("request_clock: unknown macro id {}", id);
            err
        })?;
        let slot = MuxSlot::try_from(slot).map_err(|err| {
            error!("request_clock: unknown mux slot {}", slot);
            err
        })?;
        self.request_clock(id, slot, enable)
    }

    /// Take (`true`) or drop (`false`) one reference on the frame-sync
    /// generator, driving its registers on the 0→1 and 1→0 edges.
    ///
    /// Register writes happen with the shared lock released; a write that
    /// fails is logged and the remaining writes still run. Writes refused by
    /// a restart are replayed once the codec is up again.
    pub fn toggle_shared_generator(&self, enable: bool) {
        let edge = self.shared.with(|s| s.clocks.generator_step(enable));
        let start = match edge {
            GeneratorEdge::Unchanged => return,
            GeneratorEdge::Start => true,
            GeneratorEdge::Stop => false,
        };
        trace!("frame-sync generator {}", on_off(start));
        if !self.drive_generator(start) {
            // Refused by a restart; on_up may already have run.
            self.resync_generator();
        }
        // Re-take the lock so callers blocked on it observe the new state
        // before this request continues.
        self.shared.critical(|_| ());
    }

    /// Bring the generator bits in line with the reference count after
    /// writes were refused during a restart. No-op while down or in sync.
    pub(crate) fn resync_generator(&self) {
        loop {
            let level = self.shared.with(|s| {
                if s.lifecycle.is_up() {
                    s.clocks.take_generator_resync()
                } else {
                    None
                }
            });
            let Some(start) = level else { return };
            debug!("frame-sync generator resync: {}", on_off(start));
            if self.drive_generator(start) {
                return;
            }
        }
    }

    /// Current generator reference count.
    pub fn generator_users(&self) -> u32 {
        self.shared.with(|s| s.clocks.generator_users())
    }

    /// Source currently driving `id`'s clock.
    pub fn active_source(&self, id: MacroId) -> MacroId {
        self.shared.with(|s| s.clocks.active_source(id))
    }

    /// The mux table in effect, including any provider fallback.
    pub fn mux_table(&self) -> MuxTable {
        self.shared.with(|s| s.clocks.mux())
    }

    /// Write all three generator bits. Returns `false` if a write was
    /// refused because the codec went down.
    fn drive_generator(&self, start: bool) -> bool {
        let mut complete = true;
        if start {
            for bit in GENERATOR_REGISTERS {
                complete &= self.write_generator_bit(bit, bit.mask);
            }
        } else {
            for bit in GENERATOR_REGISTERS.into_iter().rev() {
                complete &= self.write_generator_bit(bit, 0);
            }
        }
        complete
    }

    fn write_generator_bit(&self, bit: GeneratorBit, value: u8) -> bool {
        match self.update_bits(MacroId::CLOCK_GATE, bit.reg, bit.mask, value) {
            Ok(_) => true,
            Err(CodecError::NotReady) => {
                self.shared.with(|s| s.clocks.mark_generator_stale());
                false
            }
            Err(err) => {
                error!("frame-sync generator write to {} failed: {}", bit.reg, err);
                true
            }
        }
    }

    fn request_primary(&self, id: MacroId, enable: bool) -> Result<(), CodecError> {
        self.shared.critical(|sec| {
            sec.state(|s| s.ensure_up("request_clock"))?;
            let (source, clock) = sec.state(|s| {
                let source = s.clocks.mux().entry(id).primary;
                s.source_clock(source).map(|clock| (source, clock))
            })?;
            clock.set_clock(enable).map_err(|err| {
                error!("{} mux0 {} via {} failed: {}", id, on_off(enable), source, err);
                err
            })
        })?;
        self.toggle_shared_generator(enable);
        self.shared
            .with(|s| s.clocks.settle(id, MuxSlot::Primary, enable));
        Ok(())
    }

    fn enable_cascaded(&self, id: MacroId) -> Result<(), CodecError> {
        let cascade = self.shared.critical(|sec| {
            let cascade = sec.state(|s| Cascade::resolve(s, id))?;
            let (source, clock) = cascade.primary;
            clock.set_clock(true).map_err(|err| {
                error!("{} mux1 primary {} enable failed: {}", id, source, err);
                err
            })?;
            Ok::<_, CodecError>(cascade)
        })?;

        self.toggle_shared_generator(true);

        let (source, clock) = cascade.secondary;
        let result = self.shared.critical(|sec| {
            sec.state(|s| s.ensure_up("request_clock"))?;
            clock.set_clock(true).map_err(|err| {
                error!("{} mux1 secondary {} enable failed: {}", id, source, err);
                err
            })?;
            sec.state(|s| s.clocks.settle(id, MuxSlot::Cascaded, true));
            Ok::<(), CodecError>(())
        });
        if let Err(err) = result {
            self.toggle_shared_generator(false);
            let (source, clock) = cascade.primary;
            self.shared.critical(|_| {
                if let Err(rollback) = clock.set_clock(false) {
                    error!("{} mux1 rollback of {} failed: {}", id, source, rollback);
                }
            });
            return Err(err);
        }
        Ok(())
    }

    fn disable_cascaded(&self, id: MacroId) -> Result<(), CodecError> {
        let (cascade, active) = self.shared.with(|s| {
            Cascade::resolve(s, id).map(|cascade| (cascade, s.clocks.active_source(id)))
        })?;
        if active != cascade.secondary.0 {
            warn!(
                "{} mux1 release while clocked from {}, expected {}",
                id, active, cascade.secondary.0
            );
        }

        self.toggle_shared_generator(false);

        self.shared.critical(|sec| {
            for (source, clock) in [cascade.secondary, cascade.primary] {
                if let Err(err) = clock.set_clock(false) {
                    error!("{} mux1 disable of {} failed: {}", id, source, err);
                }
            }
            sec.state(|s| s.clocks.settle(id, MuxSlot::Cascaded, false));
        });
        Ok(())
    }
}

/// Resolved sources of a cascaded request.
struct Cascade<'a> {
    primary: (MacroId, &'a dyn MacroClock),
    secondary: (MacroId, &'a dyn MacroClock),
}

impl<'a> Cascade<'a> {
    fn resolve(s: &mut Shared<'a>, id: MacroId) -> Result<Self, CodecError> {
        s.ensure_up("request_clock")?;
        let entry = s.clocks.mux().entry(id);
        Ok(Self {
            primary: (entry.primary, s.source_clock(entry.primary)?),
            secondary: (entry.secondary, s.source_clock(entry.secondary)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_routes_through_capture() {
        let table = MuxTable::DEFAULT;
        for id in MacroId::ALL {
            assert_eq!(table.source(id, MuxSlot::Primary), MacroId::Capture);
        }
        assert_eq!(
            table.source(MacroId::Playback, MuxSlot::Cascaded),
            MacroId::Playback
        );
        assert_eq!(
            table.source(MacroId::Capture, MuxSlot::Cascaded),
            MacroId::VoiceActivity
        );
    }

    #[test]
    fn test_fallback_applies_once() {
        let mut state = ClockState::new(MuxTable::DEFAULT);
        assert!(state.apply_provider_fallback());
        assert!(!state.apply_provider_fallback());

        let mux = state.mux();
        assert_eq!(mux.entry(MacroId::Speaker).primary, MacroId::Speaker);
        assert_eq!(
            mux.entry(MacroId::VoiceActivity).primary,
            MacroId::VoiceActivity
        );
        // Playback keeps its provider.
        assert_eq!(mux.entry(MacroId::Playback).primary, MacroId::Capture);
        assert_eq!(state.active_source(MacroId::Speaker), MacroId::Speaker);
    }

    #[test]
    fn test_generator_edges_only_on_transitions() {
        let mut state = ClockState::new(MuxTable::DEFAULT);
        assert_eq!(state.generator_step(true), GeneratorEdge::Start);
        assert_eq!(state.generator_step(true), GeneratorEdge::Unchanged);
        assert_eq!(state.generator_step(false), GeneratorEdge::Unchanged);
        assert_eq!(state.generator_step(false), GeneratorEdge::Stop);
        assert_eq!(state.generator_users(), 0);
    }

    #[test]
    fn test_generator_release_at_zero_is_clamped() {
        let mut state = ClockState::new(MuxTable::DEFAULT);
        assert_eq!(state.generator_step(false), GeneratorEdge::Unchanged);
        assert_eq!(state.generator_users(), 0);
        assert_eq!(state.generator_step(true), GeneratorEdge::Start);
    }

    #[test]
    fn test_generator_resync_follows_count() {
        let mut state = ClockState::new(MuxTable::DEFAULT);
        assert_eq!(state.take_generator_resync(), None);
        state.generator_step(true);
        state.mark_generator_stale();
        assert_eq!(state.take_generator_resync(), Some(true));
        assert_eq!(state.take_generator_resync(), None);
        state.generator_step(false);
        state.mark_generator_stale();
        assert_eq!(state.take_generator_resync(), Some(false));
    }

    #[test]
    fn test_settle_tracks_slot_and_resets_on_disable() {
        let mut state = ClockState::new(MuxTable::DEFAULT);
        state.settle(MacroId::Playback, MuxSlot::Cascaded, true);
        assert_eq!(state.active_source(MacroId::Playback), MacroId::Playback);
        state.settle(MacroId::Playback, MuxSlot::Cascaded, false);
        assert_eq!(state.active_source(MacroId::Playback), MacroId::Capture);
    }

    #[test]
    fn test_generator_registers_enable_order() {
        let regs: Vec<u16> = GENERATOR_REGISTERS.iter().map(|b| b.reg).collect();
        assert_eq!(regs, [0x0000, 0x0004, 0x0080]);
        assert_eq!(GENERATOR_REGISTERS.last().map(|b| b.mask), Some(0x02));
    }
}
