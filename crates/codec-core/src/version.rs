//! Negotiated codec version tier.

/// Version tier derived from how many macros were attached at probe time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VersionTier {
    /// Not probed yet, or probed with nothing attached.
    Undefined,
    /// One macro.
    V1_0,
    /// Two macros.
    V1_1,
    /// Three or more macros.
    V1_2,
}

impl VersionTier {
    /// Tier for `attached` macros.
    pub const fn from_count(attached: u8) -> Self {
        match attached {
            0 => Self::Undefined,
            1 => Self::V1_0,
            2 => Self::V1_1,
            _ => Self::V1_2,
        }
    }

    /// Human-readable label, as shown on the debug surface.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
            Self::V1_2 => "1.2",
        }
    }
}

impl core::fmt::Display for VersionTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}
