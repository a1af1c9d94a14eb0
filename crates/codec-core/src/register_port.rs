//! Lifecycle-gated register access.
//!
//! Every access runs under the shared lock inside a one-shot clock bracket:
//! the macro's currently active clock source is enabled right before the bus
//! access and disabled right after. The bracket is independent of any
//! long-lived reference taken through
//! [`request_clock`](crate::Codec::request_clock).

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::bus::RegisterBus;
use crate::codec::Codec;
use crate::error::CodecError;
use crate::ids::MacroId;
use crate::registry::ComponentRegistrar;

impl<'a, M, B, R> Codec<'a, M, B, R>
where
    M: RawMutex,
    B: RegisterBus,
    R: ComponentRegistrar,
{
    /// Read register `reg` of macro `id`.
    pub fn read_register(&self, id: MacroId, reg: u16) -> Result<u8, CodecError> {
        self.with_register_clock(id, reg, "read", |addr| self.bus.read_raw(addr))
    }

    /// Write `value` to register `reg` of macro `id`.
    pub fn write_register(&self, id: MacroId, reg: u16, value: u8) -> Result<(), CodecError> {
        self.with_register_clock(id, reg, "write", |addr| {
            self.bus.write_raw(addr, value);
        })
    }

    /// Replace the bits selected by `mask` with those of `value`.
    ///
    /// Read and write share one clock bracket. Returns `true` if the register
    /// changed; an unchanged register is not written.
    pub fn update_bits(&self, id: MacroId, reg: u16, mask: u8, value: u8) -> Result<bool, CodecError> {
        self.with_register_clock(id, reg, "update", |addr| {
            let old = self.bus.read_raw(addr);
            let new = (old & !mask) | (value & mask);
            if new == old {
                return false;
            }
            self.bus.write_raw(addr, new);
            true
        })
    }

    fn with_register_clock<T>(
        &self,
        id: MacroId,
        reg: u16,
        op: &'static str,
        access: impl FnOnce(u32) -> T,
    ) -> Result<T, CodecError> {
        self.shared.critical(|sec| {
            let (source, clock, addr) = sec.state(|s| {
                s.ensure_up(op)?;
                s.register_target(id, reg)
            })?;

            if let Err(err) = clock.set_clock(true) {
                if sec.state(|s| s.diag_allowed()) {
                    debug!("{} {}/{}: clock {} unavailable: {}", op, id, reg, source, err);
                }
                return Err(err);
            }

            let value = access(addr);

            if let Err(err) = clock.set_clock(false) {
                if sec.state(|s| s.diag_allowed()) {
                    debug!("{} {}/{}: clock {} release failed: {}", op, id, reg, source, err);
                }
            }
            Ok(value)
        })
    }
}
