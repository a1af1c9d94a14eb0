//! Macro identities, mux slots and device handles.
//!
//! The macro set is closed and small, so per-macro state is a fixed array
//! indexed by [`MacroId`] rather than a dynamic map.

use crate::error::CodecError;

/// Number of macro identities.
pub const MACRO_COUNT: usize = 4;

/// One hardware macro sharing the codec.
///
/// Discriminant order is the identity order: composite descriptor lists and
/// every per-macro broadcast follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MacroId {
    /// Capture path. Supplies the master clock to the other macros and owns
    /// the wake interrupt.
    Capture = 0,
    /// Playback path. Receives requests forwarded from the analog peer.
    Playback = 1,
    /// Speaker amplifier path.
    Speaker = 2,
    /// Voice-activity path. Gates clocks across restarts and hosts the shared
    /// frame-sync generator.
    VoiceActivity = 3,
}

impl MacroId {
    /// All identities in identity order.
    pub const ALL: [MacroId; MACRO_COUNT] = [
        MacroId::Capture,
        MacroId::Playback,
        MacroId::Speaker,
        MacroId::VoiceActivity,
    ];

    /// Macro that supplies the master clock to the others.
    pub const CLOCK_PROVIDER: MacroId = MacroId::Capture;
    /// Macro whose wake-interrupt capability is retained.
    pub const WAKE_OWNER: MacroId = MacroId::Capture;
    /// Macro told to wait for its clock reset before the bus comes back.
    pub const CLOCK_GATE: MacroId = MacroId::VoiceActivity;
    /// Macro that receives requests forwarded from the analog peer.
    pub const PEER_SINK: MacroId = MacroId::Playback;

    /// Array index of this identity.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short lowercase name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Playback => "playback",
            Self::Speaker => "speaker",
            Self::VoiceActivity => "voice-activity",
        }
    }
}

impl TryFrom<u16> for MacroId {
    type Error = CodecError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Capture),
            1 => Ok(Self::Playback),
            2 => Ok(Self::Speaker),
            3 => Ok(Self::VoiceActivity),
            _ => Err(CodecError::InvalidArgument),
        }
    }
}

impl core::fmt::Display for MacroId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-size table with one entry per [`MacroId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PerMacro<T>([T; MACRO_COUNT]);

impl<T: Copy> PerMacro<T> {
    pub(crate) const fn splat(value: T) -> Self {
        Self([value; MACRO_COUNT])
    }
}

impl<T> PerMacro<T> {
    pub(crate) const fn new(entries: [T; MACRO_COUNT]) -> Self {
        Self(entries)
    }

    // MacroId discriminants are 0..MACRO_COUNT, so the index is always in bounds.
    #[allow(clippy::indexing_slicing)]
    pub(crate) fn get(&self, id: MacroId) -> &T {
        &self.0[id.index()]
    }

    #[allow(clippy::indexing_slicing)]
    pub(crate) fn get_mut(&mut self, id: MacroId) -> &mut T {
        &mut self.0[id.index()]
    }

    /// Entries paired with their identity, in identity order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (MacroId, &T)> {
        MacroId::ALL.into_iter().zip(self.0.iter())
    }
}

/// Clock mux slot for [`Codec::request_clock`](crate::Codec::request_clock).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MuxSlot {
    /// Single source: the macro's primary clock supplier (MUX0).
    Primary = 0,
    /// Cascaded: primary enabled first, then the secondary that depends on it
    /// (MUX1).
    Cascaded = 1,
}

impl MuxSlot {
    /// Array index of this slot in a mux table row.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for MuxSlot {
    type Error = CodecError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Primary),
            1 => Ok(Self::Cascaded),
            _ => Err(CodecError::InvalidArgument),
        }
    }
}

impl core::fmt::Display for MuxSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Primary => f.write_str("mux0"),
            Self::Cascaded => f.write_str("mux1"),
        }
    }
}

/// Opaque handle for a device in the platform's device tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceId(pub u32);

impl core::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "dev#{}", self.0)
    }
}

/// Where an attach/detach call comes from.
///
/// `parent` must be the codec's own device: the discovery layer only hands
/// these out to children it instantiated under the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MacroOrigin {
    /// The macro's own device.
    pub device: DeviceId,
    /// The device the macro was instantiated under.
    pub parent: DeviceId,
}
