//! Arbitration core for a multi-macro audio codec.
//!
//! Several independent hardware macro blocks (capture, playback, speaker amp,
//! voice activity) share one register bus, one set of master clocks and one
//! composite codec identity. This crate coordinates those shared resources and
//! keeps them consistent across subsystem restarts.
//!
//! # Architecture Layers
//!
//! ```text
//! Macro drivers (capture / playback / speaker / voice-activity)
//!         ↓ attach / detach / request_clock / read / write
//! Codec (this crate)
//!   ├── registry     composite identity, built once all macros attached
//!   ├── clock_mux    ref-counted master-clock multiplexing
//!   ├── register_port  lifecycle-gated register access
//!   ├── ssr          subsystem-restart state machine
//!   └── notifier     broadcast to the analog-codec peer
//!         ↓
//! RegisterBus + ComponentRegistrar (transport / platform layer)
//! ```
//!
//! # Locking
//!
//! One [`embassy_sync::blocking_mutex::Mutex`] guards the lifecycle flag, the
//! active-source map, the generator reference count and the macro table. It is
//! generic over [`RawMutex`](embassy_sync::blocking_mutex::raw::RawMutex):
//! firmware picks `CriticalSectionRawMutex` or `ThreadModeRawMutex`, host
//! tests use `CriticalSectionRawMutex` with the `critical-section` std impl.
//!
//! # Features
//!
//! - `std`: `std::error::Error` impls (host builds)
//! - `defmt`: defmt derives and defmt-routed diagnostics
//! - `tracing`: tracing-routed diagnostics (host / emulator)
//!
//! # Example
//!
//! ```no_run
//! use codec_core::{Codec, MacroId, MuxSlot};
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//!
//! fn stream_start<B, R>(codec: &Codec<'_, CriticalSectionRawMutex, B, R>)
//! where
//!     B: codec_core::RegisterBus,
//!     R: codec_core::ComponentRegistrar,
//! {
//!     codec.request_clock(MacroId::Playback, MuxSlot::Primary, true).unwrap();
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this driver crate:
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors — callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

pub mod bus;
pub mod clock_mux;
pub mod codec;
pub mod config;
pub mod error;
pub mod ids;
pub mod mocks;
pub mod notifier;
pub mod ops;
pub mod power;
pub mod register_port;
pub mod registry;
pub mod ssr;
mod state;
pub mod version;

pub use bus::RegisterBus;
pub use clock_mux::{GeneratorBit, MuxEntry, MuxTable, GENERATOR_REGISTERS};
pub use codec::Codec;
pub use config::{CodecConfig, MAX_COMPOSITE_DAIS, MAX_LISTENERS};
pub use error::CodecError;
pub use ids::{DeviceId, MacroId, MacroOrigin, MuxSlot, MACRO_COUNT};
pub use notifier::{AdcChannel, CodecListener, NotifierHub, PeerEvent, PeerRequest};
pub use ops::{
    DaiDescriptor, MacroClock, MacroEvent, MacroEventHandler, MacroLifecycle, MacroOps,
    MacroPortMap, PortMapEntry, PortParams, WakeIrq,
};
pub use registry::{ComponentRegistrar, CompositeDais};
pub use version::VersionTier;
