//! Codec configuration and compile-time capacities.

use crate::error::CodecError;
use crate::ids::{DeviceId, MACRO_COUNT};

/// Maximum number of DAI descriptors in the composite identity.
pub const MAX_COMPOSITE_DAIS: usize = 32;

/// Maximum number of peer listeners on the notifier.
pub const MAX_LISTENERS: usize = 4;

/// Static description of one codec instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecConfig {
    /// The codec's own device. Attach/detach callers must name it as parent.
    pub device: DeviceId,
    /// Number of macros that make up the composite (1..=4).
    pub expected_macros: u8,
    /// Analog peer handed to listeners as event context.
    pub peer: Option<DeviceId>,
}

impl CodecConfig {
    /// Configuration without an analog peer.
    pub const fn new(device: DeviceId, expected_macros: u8) -> Self {
        Self {
            device,
            expected_macros,
            peer: None,
        }
    }

    /// Set the analog peer passed along with notifications.
    #[must_use]
    pub const fn with_peer(mut self, peer: DeviceId) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Reject configurations the codec cannot satisfy.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.expected_macros == 0 || usize::from(self.expected_macros) > MACRO_COUNT {
            return Err(CodecError::InvalidArgument);
        }
        Ok(())
    }
}
