//! Shared test rig: one mock set per macro plus the codec collaborators.
#![allow(dead_code)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::unwrap_used)]

use codec_core::mocks::{MockBus, MockClock, MockListener, MockMacro, MockRegistrar};
use codec_core::{
    Codec, CodecConfig, CodecError, DaiDescriptor, DeviceId, GeneratorBit, MacroId, MacroOps,
    MacroOrigin, GENERATOR_REGISTERS,
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

pub const CODEC_DEVICE: DeviceId = DeviceId(1);
pub const PEER_DEVICE: DeviceId = DeviceId(50);

pub type TestCodec<'a> = Codec<'a, CriticalSectionRawMutex, &'a MockBus, &'a MockRegistrar>;

pub static CAPTURE_DAIS: [DaiDescriptor; 2] = [
    DaiDescriptor::new("capture-tx0", 0),
    DaiDescriptor::new("capture-tx1", 1),
];
pub static PLAYBACK_DAIS: [DaiDescriptor; 2] = [
    DaiDescriptor::new("playback-rx0", 0),
    DaiDescriptor::new("playback-rx1", 1),
];
pub static SPEAKER_DAIS: [DaiDescriptor; 1] = [DaiDescriptor::new("speaker-rx0", 0)];
pub static VOICE_DAIS: [DaiDescriptor; 1] = [DaiDescriptor::new("voice-tx0", 0)];

pub fn dais(id: MacroId) -> &'static [DaiDescriptor] {
    match id {
        MacroId::Capture => &CAPTURE_DAIS,
        MacroId::Playback => &PLAYBACK_DAIS,
        MacroId::Speaker => &SPEAKER_DAIS,
        MacroId::VoiceActivity => &VOICE_DAIS,
    }
}

/// DAI names `ids` contribute, concatenated in the given order.
pub fn names_of(ids: &[MacroId]) -> Vec<&'static str> {
    ids.iter()
        .flat_map(|&id| dais(id).iter().map(|d| d.name))
        .collect()
}

pub fn base(id: MacroId) -> u32 {
    0x1000 * (id as u32 + 1)
}

pub fn origin(id: MacroId) -> MacroOrigin {
    MacroOrigin {
        device: DeviceId(100 + id as u32),
        parent: CODEC_DEVICE,
    }
}

/// Bus address of a generator bit in the voice-activity window.
pub fn generator_addr(bit: GeneratorBit) -> u32 {
    base(MacroId::VoiceActivity) + u32::from(bit.reg)
}

/// Generator enable writes, in the order they hit the bus.
pub fn generator_on_writes() -> Vec<(u32, u8)> {
    GENERATOR_REGISTERS
        .iter()
        .map(|&bit| (generator_addr(bit), bit.mask))
        .collect()
}

/// Generator disable writes, in the order they hit the bus.
pub fn generator_off_writes() -> Vec<(u32, u8)> {
    GENERATOR_REGISTERS
        .iter()
        .rev()
        .map(|&bit| (generator_addr(bit), 0))
        .collect()
}

pub struct Rig {
    pub bus: MockBus,
    pub registrar: MockRegistrar,
    pub listener: MockListener,
    pub aux: MockClock,
    clocks: [MockClock; 4],
    macros: [MockMacro; 4],
}

impl Rig {
    pub fn new() -> Self {
        Self {
            bus: MockBus::new(),
            registrar: MockRegistrar::new(),
            listener: MockListener::new(),
            aux: MockClock::new(),
            clocks: core::array::from_fn(|_| MockClock::new()),
            macros: core::array::from_fn(|_| MockMacro::new()),
        }
    }

    pub fn clock(&self, id: MacroId) -> &MockClock {
        &self.clocks[id.index()]
    }

    pub fn handler(&self, id: MacroId) -> &MockMacro {
        &self.macros[id.index()]
    }

    /// Codec expecting `expected` macros, with the listener subscribed.
    pub fn codec(&self, expected: u8) -> TestCodec<'_> {
        let config = CodecConfig::new(CODEC_DEVICE, expected).with_peer(PEER_DEVICE);
        let codec = Codec::new(config, &self.bus, &self.registrar)
            .unwrap()
            .with_aux_clock(&self.aux);
        codec.register_listener(&self.listener, true).unwrap();
        codec
    }

    /// Every capability wired to this rig's mocks.
    pub fn ops(&self, id: MacroId) -> MacroOps<'_> {
        let mac = self.handler(id);
        MacroOps::new(base(id), dais(id), self.clock(id))
            .with_lifecycle(mac)
            .with_events(mac)
            .with_wake_irq(mac)
            .with_port_map(mac)
    }

    /// Clock only: no lifecycle hooks, no event handler.
    pub fn bare_ops(&self, id: MacroId) -> MacroOps<'_> {
        MacroOps::new(base(id), dais(id), self.clock(id))
    }

    pub fn attach<'a>(&'a self, codec: &TestCodec<'a>, id: MacroId) -> Result<(), CodecError> {
        codec.attach(origin(id), id, self.ops(id))
    }

    pub fn attach_all<'a>(&'a self, codec: &TestCodec<'a>, ids: &[MacroId]) {
        for &id in ids {
            self.attach(codec, id).unwrap();
        }
    }

    pub fn detach(&self, codec: &TestCodec<'_>, id: MacroId) {
        codec.detach(origin(id), id);
    }
}
