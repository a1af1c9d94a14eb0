//! Subsystem-restart gating: nothing touches hardware while the codec is down.
#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

mod common;

use codec_core::{CodecError, MacroEvent, MacroId, MuxSlot, PeerEvent};
use common::{base, Rig};

#[test]
fn cold_boot_up_is_suppressed() {
    let rig = Rig::new();
    let codec = rig.codec(2);
    rig.attach_all(&codec, &[MacroId::Capture, MacroId::VoiceActivity]);

    codec.on_up();

    assert!(codec.is_up());
    assert!(rig.listener.codes().is_empty());
    assert!(rig.handler(MacroId::VoiceActivity).events().is_empty());
    assert!(!rig.bus.is_cache_only());
}

#[test]
fn second_up_after_cold_boot_is_delivered() {
    let rig = Rig::new();
    let codec = rig.codec(1);
    rig.attach_all(&codec, &[MacroId::Capture]);

    codec.on_up();
    codec.on_up();

    assert_eq!(rig.listener.events().as_slice(), &[PeerEvent::RestartUp]);
    assert_eq!(
        rig.handler(MacroId::Capture).events().as_slice(),
        &[MacroEvent::SsrUp]
    );
}

#[test]
fn down_switches_bus_to_cache_only_and_informs_everyone() {
    let rig = Rig::new();
    let codec = rig.codec(2);
    rig.attach_all(&codec, &[MacroId::Capture, MacroId::Playback]);

    codec.on_down();

    assert!(!codec.is_up());
    assert!(rig.bus.is_cache_only());
    for id in [MacroId::Capture, MacroId::Playback] {
        assert_eq!(rig.handler(id).events().as_slice(), &[MacroEvent::SsrDown]);
    }
    assert_eq!(
        rig.listener.events().as_slice(),
        &[PeerEvent::PreRestart, PeerEvent::RestartDown]
    );
    // Restart-down goes out only after every macro handled SsrDown.
    let capture_down = rig.handler(MacroId::Capture).seq_of(MacroEvent::SsrDown).unwrap();
    assert!(rig.listener.last_seq().unwrap() > capture_down);
}

#[test]
fn register_access_fails_fast_while_down() {
    let rig = Rig::new();
    let codec = rig.codec(2);
    rig.attach_all(&codec, &[MacroId::Capture, MacroId::Playback]);
    codec.on_down();
    let calls_before = rig.clock(MacroId::Capture).enable_calls();

    assert_eq!(
        codec.read_register(MacroId::Playback, 0x10),
        Err(CodecError::NotReady)
    );
    assert_eq!(
        codec.write_register(MacroId::Playback, 0x10, 0xFF),
        Err(CodecError::NotReady)
    );
    assert_eq!(
        codec.update_bits(MacroId::Playback, 0x10, 0x01, 0x01),
        Err(CodecError::NotReady)
    );

    assert_eq!(rig.clock(MacroId::Capture).enable_calls(), calls_before);
    assert_eq!(rig.bus.reads(), 0);
    assert_eq!(rig.bus.cached_writes(), 0);
    assert_eq!(rig.bus.register(base(MacroId::Playback) + 0x10), 0);
}

#[test]
fn clock_requests_fail_fast_while_down_without_mutation() {
    let rig = Rig::new();
    let codec = rig.codec(4);
    rig.attach_all(&codec, &MacroId::ALL);

    codec
        .request_clock(MacroId::Playback, MuxSlot::Cascaded, true)
        .unwrap();
    let users = codec.generator_users();
    let active = codec.active_source(MacroId::Playback);
    codec.on_down();

    for (slot, enable) in [
        (MuxSlot::Primary, true),
        (MuxSlot::Primary, false),
        (MuxSlot::Cascaded, true),
        (MuxSlot::Cascaded, false),
    ] {
        assert_eq!(
            codec.request_clock(MacroId::Playback, slot, enable),
            Err(CodecError::NotReady),
            "{slot} enable={enable}"
        );
    }

    assert_eq!(codec.generator_users(), users);
    assert_eq!(codec.active_source(MacroId::Playback), active);
    assert_eq!(rig.clock(MacroId::Playback).held(), 1);
}

#[test]
fn up_orders_clock_gate_before_bus_and_broadcast() {
    let rig = Rig::new();
    let codec = rig.codec(3);
    rig.attach_all(
        &codec,
        &[MacroId::Capture, MacroId::Speaker, MacroId::VoiceActivity],
    );
    codec.probe().unwrap();
    codec.on_down();

    codec.on_up();

    assert!(codec.is_up());
    assert!(!rig.bus.is_cache_only());

    let gate = rig.handler(MacroId::VoiceActivity);
    assert_eq!(
        gate.events().as_slice(),
        &[
            MacroEvent::SsrDown,
            MacroEvent::WaitForClockReset,
            MacroEvent::SsrUp
        ]
    );
    let wait = gate.seq_of(MacroEvent::WaitForClockReset).unwrap();
    for id in [MacroId::Capture, MacroId::Speaker] {
        let events = rig.handler(id).events();
        assert_eq!(events.as_slice(), &[MacroEvent::SsrDown, MacroEvent::SsrUp]);
        assert!(rig.handler(id).seq_of(MacroEvent::SsrUp).unwrap() > wait);
    }
    assert_eq!(
        rig.listener.events().as_slice(),
        &[
            PeerEvent::PreRestart,
            PeerEvent::RestartDown,
            PeerEvent::RestartUp
        ]
    );
}

#[test]
fn access_resumes_after_up() {
    let rig = Rig::new();
    let codec = rig.codec(2);
    rig.attach_all(&codec, &[MacroId::Capture, MacroId::Playback]);
    codec.on_down();
    codec.on_up();

    codec.write_register(MacroId::Playback, 0x20, 0x5A).unwrap();
    assert_eq!(codec.read_register(MacroId::Playback, 0x20), Ok(0x5A));
    codec
        .request_clock(MacroId::Playback, MuxSlot::Primary, true)
        .unwrap();
    assert_eq!(codec.generator_users(), 1);
}

#[test]
fn repeated_restart_cycles_keep_peer_traffic_paired() {
    let rig = Rig::new();
    let codec = rig.codec(1);
    rig.attach_all(&codec, &[MacroId::Capture]);
    codec.probe().unwrap();

    for _ in 0..3 {
        codec.on_down();
        codec.on_up();
    }

    let events = rig.listener.events();
    assert_eq!(events.len(), 9);
    for cycle in events.chunks(3) {
        assert_eq!(
            cycle,
            &[
                PeerEvent::PreRestart,
                PeerEvent::RestartDown,
                PeerEvent::RestartUp
            ]
        );
    }
}

/// A restart landing between the generator reference count step and its
/// register writes.
mod restart_during_generator_writes {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::OnceLock;

    use codec_core::mocks::{MockBus, MockClock, MockRegistrar};
    use codec_core::{
        Codec, CodecConfig, CodecError, DaiDescriptor, MacroClock, MacroId, MacroOps, MuxSlot,
        GENERATOR_REGISTERS,
    };
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    use super::common::{base, generator_addr, origin, CODEC_DEVICE};

    type StaticCodec =
        Codec<'static, CriticalSectionRawMutex, &'static MockBus, &'static MockRegistrar>;

    /// Capture clock that takes the codec down on its n-th enable.
    struct RestartingClock {
        codec: OnceLock<&'static StaticCodec>,
        enables: AtomicU32,
        restart_on: u32,
    }

    impl MacroClock for RestartingClock {
        fn set_clock(&self, enable: bool) -> Result<(), CodecError> {
            if enable && self.enables.fetch_add(1, Ordering::SeqCst) + 1 == self.restart_on {
                if let Some(codec) = self.codec.get() {
                    codec.on_down();
                }
            }
            Ok(())
        }
    }

    static CAPTURE_DAIS: [DaiDescriptor; 1] = [DaiDescriptor::new("capture-tx0", 0)];
    static VOICE_DAIS: [DaiDescriptor; 1] = [DaiDescriptor::new("voice-tx0", 0)];
    static VOICE_CLOCK: MockClock = MockClock::new();

    fn setup(restart_on: u32) -> (&'static StaticCodec, &'static MockBus) {
        let bus: &'static MockBus = Box::leak(Box::new(MockBus::new()));
        let registrar: &'static MockRegistrar = Box::leak(Box::new(MockRegistrar::new()));
        let clock: &'static RestartingClock = Box::leak(Box::new(RestartingClock {
            codec: OnceLock::new(),
            enables: AtomicU32::new(0),
            restart_on,
        }));
        let codec: &'static StaticCodec = Box::leak(Box::new(
            Codec::new(CodecConfig::new(CODEC_DEVICE, 2), bus, registrar).unwrap(),
        ));
        codec
            .attach(
                origin(MacroId::Capture),
                MacroId::Capture,
                MacroOps::new(base(MacroId::Capture), &CAPTURE_DAIS, clock),
            )
            .unwrap();
        codec
            .attach(
                origin(MacroId::VoiceActivity),
                MacroId::VoiceActivity,
                MacroOps::new(base(MacroId::VoiceActivity), &VOICE_DAIS, &VOICE_CLOCK),
            )
            .unwrap();
        clock.codec.set(codec).ok().unwrap();
        (codec, bus)
    }

    fn generator_bits(bus: &MockBus) -> Vec<u8> {
        GENERATOR_REGISTERS
            .iter()
            .map(|&bit| bus.register(generator_addr(bit)) & bit.mask)
            .collect()
    }

    fn all_on() -> Vec<u8> {
        GENERATOR_REGISTERS.iter().map(|bit| bit.mask).collect()
    }

    #[test]
    fn start_cut_short_is_completed_on_up() {
        // Enable 1 is the request itself, enable 2 brackets the first
        // generator write.
        let (codec, bus) = setup(2);

        codec
            .request_clock(MacroId::VoiceActivity, MuxSlot::Primary, true)
            .unwrap();
        assert!(!codec.is_up());
        assert_eq!(codec.generator_users(), 1);
        assert_ne!(generator_bits(bus), all_on());

        codec.on_up();
        assert_eq!(generator_bits(bus), all_on());

        codec
            .request_clock(MacroId::VoiceActivity, MuxSlot::Primary, true)
            .unwrap();
        assert_eq!(codec.generator_users(), 2);
        assert_eq!(generator_bits(bus), all_on());

        for _ in 0..2 {
            codec
                .request_clock(MacroId::VoiceActivity, MuxSlot::Primary, false)
                .unwrap();
        }
        assert_eq!(codec.generator_users(), 0);
        assert_eq!(generator_bits(bus), [0, 0, 0]);
    }

    #[test]
    fn stop_cut_short_is_completed_on_up() {
        // Enables 1..=4 start the generator; enable 5 brackets the first
        // write of the stop edge.
        let (codec, bus) = setup(5);

        codec
            .request_clock(MacroId::VoiceActivity, MuxSlot::Primary, true)
            .unwrap();
        assert_eq!(generator_bits(bus), all_on());

        codec
            .request_clock(MacroId::VoiceActivity, MuxSlot::Primary, false)
            .unwrap();
        assert!(!codec.is_up());
        assert_eq!(codec.generator_users(), 0);
        assert_ne!(generator_bits(bus), [0, 0, 0]);

        codec.on_up();
        assert_eq!(generator_bits(bus), [0, 0, 0]);
    }

    #[test]
    fn up_without_interrupted_writes_touches_nothing() {
        let (codec, bus) = setup(u32::MAX);
        codec
            .request_clock(MacroId::VoiceActivity, MuxSlot::Primary, true)
            .unwrap();
        codec.on_down();
        bus.clear_log();

        codec.on_up();

        assert!(bus.writes().is_empty());
        assert_eq!(generator_bits(bus), all_on());
    }
}
