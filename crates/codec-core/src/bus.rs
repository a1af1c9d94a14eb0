//! Shared register bus contract.
//!
//! The transport itself (AHB window, regmap cache, SoundWire bridge…) lives
//! outside this crate. The core only needs raw byte access and the
//! cache-only switch used while the codec is down.

use crate::error::CodecError;

/// Raw register transport shared by every macro.
///
/// Treated as infallible at this level: bus faults surface as hardware
/// timeouts in the transport, not as results here.
pub trait RegisterBus: Sync {
    /// Read the byte register at `addr`.
    fn read_raw(&self, addr: u32) -> u8;

    /// Write `value` to the byte register at `addr`.
    fn write_raw(&self, addr: u32, value: u8);

    /// In cache-only mode writes are recorded but not issued to hardware.
    fn set_cache_only(&self, enable: bool);
}

impl<T: RegisterBus + ?Sized> RegisterBus for &T {
    fn read_raw(&self, addr: u32) -> u8 {
        (**self).read_raw(addr)
    }

    fn write_raw(&self, addr: u32, value: u8) {
        (**self).write_raw(addr, value);
    }

    fn set_cache_only(&self, enable: bool) {
        (**self).set_cache_only(enable);
    }
}

/// Physical address of register `reg` inside the window starting at `base`.
pub fn register_address(base: u32, reg: u16) -> Result<u32, CodecError> {
    base.checked_add(u32::from(reg))
        .ok_or(CodecError::InvalidArgument)
}
