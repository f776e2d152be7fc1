//! Property-based tests for the frame codec and dictionary.

use asi_protocol::{FRAME_LEN, Frame, FrameError, MessageClass, MessageRole, frame_crc};
use proptest::prelude::*;

fn arb_class() -> impl Strategy<Value = MessageClass> {
    prop_oneof![
        Just(MessageClass::ActionRequest),
        Just(MessageClass::StatusFromCm),
        Just(MessageClass::Ack),
        Just(MessageClass::Notification),
        Just(MessageClass::CalibReadback),
    ]
}

fn arb_frame() -> impl Strategy<Value = Frame> {
    (
        arb_class(),
        any::<u16>(),
        any::<u16>(),
        any::<[u8; 8]>(),
        any::<u16>(),
        any::<u32>(),
    )
        .prop_map(|(class, id, sequence, value, rolling_counter, timestamp_s)| {
            let length = *class.allowed_lengths().first().unwrap_or(&1);
            let mut frame = Frame::sealed(class, id, sequence, length, value);
            frame.rolling_counter = rolling_counter;
            frame.timestamp_s = timestamp_s;
            frame
        })
}

proptest! {
    #[test]
    fn encode_decode_round_trips(frame in arb_frame()) {
        let wire = frame.encode();
        let decoded = Frame::decode(&wire).expect("frame decodes");
        prop_assert_eq!(decoded, frame);
        prop_assert!(decoded.check_crc().is_ok());
    }

    #[test]
    fn crc_detects_any_single_bit_flip_in_protected_fields(
        frame in arb_frame(),
        bit in 0usize..96,
    ) {
        // Protected region on the wire: sequence (12..14), id (14..16),
        // value (16..24) - 12 bytes, 96 bits.
        let mut wire = frame.encode();
        let offsets = [12usize, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23];
        let byte = offsets[bit / 8];
        wire[byte] ^= 1 << (bit % 8);

        let tampered = Frame::decode(&wire).expect("still structurally valid");
        prop_assert!(
            matches!(tampered.check_crc(), Err(FrameError::CrcMismatch { .. })),
            "expected CrcMismatch after bit flip"
        );
    }

    #[test]
    fn crc_is_pure(sequence in any::<u16>(), id in any::<u16>(), value in any::<[u8; 8]>()) {
        prop_assert_eq!(frame_crc(sequence, id, &value), frame_crc(sequence, id, &value));
    }

    #[test]
    fn non_frame_sizes_rejected(len in 0usize..64) {
        prop_assume!(len != FRAME_LEN);
        let data = vec![0u8; len];
        prop_assert!(
            matches!(Frame::decode(&data), Err(FrameError::WrongSize { .. })),
            "expected WrongSize for non-frame length"
        );
    }
}

#[test]
fn dictionary_identity_on_all_roles() {
    for role in MessageRole::all() {
        let id = role.id();
        let back = MessageRole::from_id(id).expect("declared role resolves");
        assert_eq!(back, role);
        assert_eq!(back.id(), id);
    }
}

#[test]
fn declared_ids_from_the_wire_spec_resolve() {
    // Spot checks against the published id table.
    assert_eq!(
        MessageRole::from_id(0x0007).expect("horn"),
        MessageRole::ActivateHorn
    );
    assert_eq!(
        MessageRole::from_id(0x03E8).expect("prndl"),
        MessageRole::Prndl
    );
    assert_eq!(
        MessageRole::from_id(0x03E9).expect("speed"),
        MessageRole::VehicleSpeed
    );
    assert_eq!(
        MessageRole::from_id(0x07D0).expect("rain"),
        MessageRole::RainSensor
    );
    assert_eq!(
        MessageRole::from_id(0x1010).expect("startup"),
        MessageRole::StartupTestNotification
    );
    assert_eq!(
        MessageRole::from_id(0x1011).expect("status"),
        MessageRole::StatusNotification
    );
    assert_eq!(
        MessageRole::from_id(0xFF01).expect("critical"),
        MessageRole::CriticalFail
    );
    assert_eq!(
        MessageRole::from_id(0xFF02).expect("non-critical"),
        MessageRole::NonCriticalFail
    );
}
