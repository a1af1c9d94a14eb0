//! Diagnostic shim.
//!
//! Call sites use `error!`/`warn!`/`debug!`/`trace!` with `{}` placeholders.
//! Output goes to `defmt` on firmware builds, to `tracing` on host builds and
//! compiles to nothing when neither feature is enabled. Every argument must
//! implement both `defmt::Format` and `core::fmt::Display`.
#![allow(unused_macros)]

use embassy_time::{Duration, Instant};

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::trace!($s $(, $x)*);
            #[cfg(all(feature = "tracing", not(feature = "defmt")))]
            ::tracing::trace!($s $(, $x)*);
            #[cfg(not(any(feature = "defmt", feature = "tracing")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::debug!($s $(, $x)*);
            #[cfg(all(feature = "tracing", not(feature = "defmt")))]
            ::tracing::debug!($s $(, $x)*);
            #[cfg(not(any(feature = "defmt", feature = "tracing")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::warn!($s $(, $x)*);
            #[cfg(all(feature = "tracing", not(feature = "defmt")))]
            ::tracing::warn!($s $(, $x)*);
            #[cfg(not(any(feature = "defmt", feature = "tracing")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::error!($s $(, $x)*);
            #[cfg(all(feature = "tracing", not(feature = "defmt")))]
            ::tracing::error!($s $(, $x)*);
            #[cfg(not(any(feature = "defmt", feature = "tracing")))]
            let _ = ($( & $x ),*);
        }
    };
}

/// Burst limiter for diagnostics that can fire on every register access.
///
/// Allows [`BURST`](Self::BURST) messages per [`INTERVAL`](Self::INTERVAL);
/// the number dropped in the previous window is reported when a new window
/// opens.
pub(crate) struct RateLimit {
    window_start: Option<Instant>,
    emitted: u32,
    suppressed: u32,
}

impl RateLimit {
    pub(crate) const INTERVAL: Duration = Duration::from_secs(5);
    pub(crate) const BURST: u32 = 10;

    pub(crate) const fn new() -> Self {
        Self {
            window_start: None,
            emitted: 0,
            suppressed: 0,
        }
    }

    /// Returns `true` if a diagnostic may be emitted now.
    pub(crate) fn allow(&mut self) -> bool {
        let now = Instant::now();
        let expired = self.window_start.map_or(true, |start| {
            now.checked_duration_since(start)
                .map_or(true, |elapsed| elapsed >= Self::INTERVAL)
        });
        if expired {
            if self.suppressed > 0 {
                warn!("{} diagnostics suppressed", self.suppressed);
            }
            self.window_start = Some(now);
            self.emitted = 0;
            self.suppressed = 0;
        }
        if self.emitted < Self::BURST {
            self.emitted = self.emitted.saturating_add(1);
            true
        } else {
            self.suppressed = self.suppressed.saturating_add(1);
            false
        }
    }
}
