//! Error taxonomy shared by every codec operation.

/// Codec errors.
///
/// Every fallible operation in this crate returns one of these; nothing in the
/// core panics or aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Bad macro id or mux slot, missing collaborator, or a caller that is not
    /// a child of this codec. Never retried internally.
    InvalidArgument,
    /// The codec is down for a subsystem restart. Retry once the `SsrUp`
    /// macro event has been observed.
    NotReady,
    /// A clock callback or transport reported a fault (device-specific code).
    HardwareFailure(i32),
    /// A fixed-capacity table (composite DAI list, listener list) is full.
    ResourceExhausted,
}

impl CodecError {
    /// Returns `true` for errors the caller may retry after the next `Up`.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::NotReady)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

impl core::fmt::Display for CodecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::NotReady => write!(f, "codec down for subsystem restart"),
            Self::HardwareFailure(code) => write!(f, "hardware failure ({code})"),
            Self::ResourceExhausted => write!(f, "fixed capacity exhausted"),
        }
    }
}
