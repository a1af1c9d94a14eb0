//! Broadcast channel to the analog-codec peer, and the peer's requests back.
//!
//! Listeners are called synchronously in subscription order. The list is
//! copied out before dispatch, so a listener may subscribe or unsubscribe
//! from inside its own callback.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::config::MAX_LISTENERS;
use crate::error::CodecError;
use crate::ids::DeviceId;
use crate::ops::MacroEvent;

/// Subscriber to codec notifications.
pub trait CodecListener: Sync {
    /// Receive an encoded [`PeerEvent`] with the configured peer as context.
    fn on_codec_event(&self, code: u32, context: Option<DeviceId>);
}

const TX_CH_HOLD_CLEAR: u32 = 1;
const PRE_RESTART: u32 = 2;
const RESTART_DOWN: u32 = 3;
const RESTART_UP: u32 = 4;

/// Event sent to the analog peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeerEvent {
    /// Release the transmit hold on secondary-ADC line `line` (1..=3).
    TxHoldClear {
        /// Encoded secondary-ADC line.
        line: u16,
    },
    /// A subsystem restart is about to start.
    PreRestart,
    /// The codec is down.
    RestartDown,
    /// The codec is back up.
    RestartUp,
}

impl PeerEvent {
    /// Wire code: event id in the low 16 bits, payload in the high 16.
    // A u16 payload shifted into the high half cannot overflow.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn code(self) -> u32 {
        match self {
            Self::TxHoldClear { line } => (u32::from(line) << 16) | TX_CH_HOLD_CLEAR,
            Self::PreRestart => PRE_RESTART,
            Self::RestartDown => RESTART_DOWN,
            Self::RestartUp => RESTART_UP,
        }
    }

    /// Inverse of [`code`](Self::code).
    #[allow(clippy::arithmetic_side_effects)]
    pub fn decode(code: u32) -> Option<Self> {
        let payload = u16::try_from(code >> 16).ok()?;
        match code & 0xFFFF {
            TX_CH_HOLD_CLEAR => Some(Self::TxHoldClear { line: payload }),
            PRE_RESTART if payload == 0 => Some(Self::PreRestart),
            RESTART_DOWN if payload == 0 => Some(Self::RestartDown),
            RESTART_UP if payload == 0 => Some(Self::RestartUp),
            _ => None,
        }
    }
}

/// Capture ADC whose transmit hold may be cleared on the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcChannel {
    /// ADC0.
    Adc0,
    /// ADC1, no analog hold.
    Adc1,
    /// ADC2.
    Adc2,
    /// ADC3.
    Adc3,
}

impl AdcChannel {
    /// Secondary-ADC line on the peer, or `None` if this ADC has no hold.
    pub const fn hold_line(self) -> Option<u16> {
        match self {
            Self::Adc0 => Some(1),
            Self::Adc1 => None,
            Self::Adc2 => Some(2),
            Self::Adc3 => Some(3),
        }
    }
}

impl TryFrom<u16> for AdcChannel {
    type Error = CodecError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Adc0),
            1 => Ok(Self::Adc1),
            2 => Ok(Self::Adc2),
            3 => Ok(Self::Adc3),
            _ => Err(CodecError::InvalidArgument),
        }
    }
}

/// Request from the analog peer, forwarded to the playback macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeerRequest {
    /// Mute the receive path.
    RxMute,
    /// Load impedance detected.
    ImpedanceDetected,
    /// Load impedance cleared.
    ImpedanceCleared,
}

impl PeerRequest {
    /// Macro event delivered for this request.
    pub const fn macro_event(self) -> MacroEvent {
        match self {
            Self::RxMute => MacroEvent::RxMute,
            Self::ImpedanceDetected => MacroEvent::ImpedanceDetected,
            Self::ImpedanceCleared => MacroEvent::ImpedanceCleared,
        }
    }
}

impl TryFrom<u16> for PeerRequest {
    type Error = CodecError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Self::RxMute),
            2 => Ok(Self::ImpedanceDetected),
            3 => Ok(Self::ImpedanceCleared),
            _ => Err(CodecError::InvalidArgument),
        }
    }
}

impl core::fmt::Display for PeerEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TxHoldClear { line } => write!(f, "tx-hold-clear({line})"),
            Self::PreRestart => f.write_str("pre-restart"),
            Self::RestartDown => f.write_str("restart-down"),
            Self::RestartUp => f.write_str("restart-up"),
        }
    }
}

impl core::fmt::Display for AdcChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Adc0 => f.write_str("adc0"),
            Self::Adc1 => f.write_str("adc1"),
            Self::Adc2 => f.write_str("adc2"),
            Self::Adc3 => f.write_str("adc3"),
        }
    }
}

impl core::fmt::Display for PeerRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::RxMute => f.write_str("rx-mute"),
            Self::ImpedanceDetected => f.write_str("impedance-detected"),
            Self::ImpedanceCleared => f.write_str("impedance-cleared"),
        }
    }
}

type Listeners<'a, const N: usize> = heapless::Vec<&'a dyn CodecListener, N>;

/// Ordered set of [`CodecListener`]s.
pub struct NotifierHub<'a, M: RawMutex, const N: usize = MAX_LISTENERS> {
    listeners: Mutex<M, RefCell<Listeners<'a, N>>>,
}

impl<'a, M: RawMutex, const N: usize> NotifierHub<'a, M, N> {
    /// Empty hub.
    pub const fn new() -> Self {
        Self {
            listeners: Mutex::new(RefCell::new(heapless::Vec::new())),
        }
    }

    /// Add `listener` at the end of the dispatch order.
    pub fn subscribe(&self, listener: &'a dyn CodecListener) -> Result<(), CodecError> {
        self.listeners.lock(|cell| {
            let mut listeners = cell.borrow_mut();
            if listeners.iter().any(|l| same_listener(*l, listener)) {
                return Err(CodecError::InvalidArgument);
            }
            listeners
                .push(listener)
                .map_err(|_| CodecError::ResourceExhausted)
        })
    }

    /// Remove `listener`, keeping the order of the others.
    pub fn unsubscribe(&self, listener: &dyn CodecListener) -> Result<(), CodecError> {
        self.listeners.lock(|cell| {
            let mut listeners = cell.borrow_mut();
            let index = listeners
                .iter()
                .position(|l| same_listener(*l, listener))
                .ok_or(CodecError::InvalidArgument)?;
            listeners.remove(index);
            Ok(())
        })
    }

    /// Deliver `code` to every listener, in subscription order.
    pub fn notify(&self, code: u32, context: Option<DeviceId>) {
        let snapshot = self.listeners.lock(|cell| cell.borrow().clone());
        for listener in snapshot {
            listener.on_codec_event(code, context);
        }
    }

    /// Number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.lock(|cell| cell.borrow().len())
    }

    /// `true` with no listeners.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<M: RawMutex, const N: usize> Default for NotifierHub<'_, M, N> {
    fn default() -> Self {
        Self::new()
    }
}

fn same_listener(a: &dyn CodecListener, b: &dyn CodecListener) -> bool {
    core::ptr::eq(a as *const _ as *const u8, b as *const _ as *const u8)
}
