//! Concurrent clock requests and register access from several threads.
#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

mod common;

use codec_core::{MacroId, MuxSlot, GENERATOR_REGISTERS};
use common::{base, generator_addr, Rig};

const ROUNDS: u16 = 50;

#[test]
fn parallel_requests_leave_everything_balanced() {
    let rig = Rig::new();
    let codec = rig.codec(4);
    rig.attach_all(&codec, &MacroId::ALL);

    std::thread::scope(|scope| {
        for id in MacroId::ALL {
            let codec = &codec;
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    codec.request_clock(id, MuxSlot::Primary, true).unwrap();
                    let value = u8::try_from(round % 256).unwrap();
                    codec.write_register(id, 0x40, value).unwrap();
                    assert_eq!(codec.read_register(id, 0x40), Ok(value));
                    codec.request_clock(id, MuxSlot::Primary, false).unwrap();
                }
            });
        }
        let codec = &codec;
        scope.spawn(move || {
            for _ in 0..ROUNDS {
                codec
                    .request_clock(MacroId::Playback, MuxSlot::Cascaded, true)
                    .unwrap();
                codec.update_bits(MacroId::Speaker, 0x41, 0x80, 0x80).unwrap();
                codec
                    .request_clock(MacroId::Playback, MuxSlot::Cascaded, false)
                    .unwrap();
            }
        });
    });

    assert_eq!(codec.generator_users(), 0);
    for id in MacroId::ALL {
        assert_eq!(rig.clock(id).held(), 0, "{id} clock left held");
    }
    for bit in GENERATOR_REGISTERS {
        assert_eq!(rig.bus.register(generator_addr(bit)) & bit.mask, 0);
    }
    assert_eq!(rig.bus.register(base(MacroId::Speaker) + 0x41), 0x80);
}

#[test]
fn restart_while_busy_never_corrupts_counts() {
    let rig = Rig::new();
    let codec = rig.codec(4);
    rig.attach_all(&codec, &MacroId::ALL);
    codec.probe().unwrap();

    std::thread::scope(|scope| {
        let codec = &codec;
        scope.spawn(move || {
            for _ in 0..ROUNDS {
                codec.on_down();
                codec.on_up();
            }
        });
        for id in [MacroId::Playback, MacroId::Speaker] {
            scope.spawn(move || {
                for _ in 0..ROUNDS {
                    // NotReady is expected whenever the restart thread is down.
                    if codec.request_clock(id, MuxSlot::Primary, true).is_ok() {
                        while codec.request_clock(id, MuxSlot::Primary, false).is_err() {
                            std::thread::yield_now();
                        }
                    }
                    let _ = codec.read_register(id, 0x00);
                }
            });
        }
    });

    assert!(codec.is_up());
    assert_eq!(codec.generator_users(), 0);
    assert_eq!(rig.clock(MacroId::Capture).held(), 0);
}
