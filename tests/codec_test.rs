//! Frame codec conformance against the literal RFC 6455 §5.7 examples and
//! the length-encoding boundaries.

use bytes::BytesMut;
use pretty_assertions::assert_eq;
use tokio_util::codec::{Decoder, Encoder};
use websocket_hub::{Frame, FrameCodec, Opcode, WsError};

fn decode_one(bytes: &[u8]) -> Frame {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from(bytes);
    let frame = codec.decode(&mut buf).unwrap().expect("complete frame");
    assert!(buf.is_empty(), "decoder left {} bytes behind", buf.len());
    frame
}

fn encode_one(frame: Frame) -> BytesMut {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    codec.encode(frame, &mut buf).unwrap();
    buf
}

#[test]
fn single_frame_unmasked_text() {
    // RFC 6455 §5.7: "Hello", unmasked.
    let frame = decode_one(&[0x81, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F]);
    assert!(frame.fin);
    assert_eq!(frame.opcode, Opcode::Text);
    assert_eq!(frame.payload.as_ref(), b"Hello");
}

#[test]
fn single_frame_masked_text() {
    // RFC 6455 §5.7: "Hello", masked with 0x37FA213D.
    let frame = decode_one(&[
        0x81, 0x85, 0x37, 0xFA, 0x21, 0x3D, 0x7F, 0x9F, 0x4D, 0x51, 0x58,
    ]);
    assert!(frame.fin);
    assert_eq!(frame.opcode, Opcode::Text);
    assert_eq!(frame.payload.as_ref(), b"Hello");
}

#[test]
fn fragmented_text_frames_decode_individually() {
    // RFC 6455 §5.7: "Hel" + "lo" in two fragments.
    let first = decode_one(&[0x01, 0x03, 0x48, 0x65, 0x6C]);
    assert!(!first.fin);
    assert_eq!(first.opcode, Opcode::Text);
    assert_eq!(first.payload.as_ref(), b"Hel");

    let second = decode_one(&[0x80, 0x02, 0x6C, 0x6F]);
    assert!(second.fin);
    assert_eq!(second.opcode, Opcode::Continuation);
    assert_eq!(second.payload.as_ref(), b"lo");
}

#[test]
fn ping_frame_with_payload() {
    // RFC 6455 §5.7: unmasked ping carrying "Hello".
    let frame = decode_one(&[0x89, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F]);
    assert!(frame.fin);
    assert_eq!(frame.opcode, Opcode::Ping);
    assert_eq!(frame.payload.as_ref(), b"Hello");
}

#[test]
fn binary_with_16_bit_length() {
    // RFC 6455 §5.7: 256 bytes of binary data with the two-byte length form.
    let mut bytes = vec![0x82, 0x7E, 0x01, 0x00];
    let payload: Vec<u8> = (0..256).map(|i| (i % 251) as u8).collect();
    bytes.extend_from_slice(&payload);

    let frame = decode_one(&bytes);
    assert!(frame.fin);
    assert_eq!(frame.opcode, Opcode::Binary);
    assert_eq!(frame.payload.as_ref(), payload.as_slice());
}

#[test]
fn binary_with_64_bit_length() {
    // RFC 6455 §5.7: 65 536 bytes with the eight-byte length form.
    let mut bytes = vec![0x82, 0x7F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00];
    let payload: Vec<u8> = (0..65_536usize).map(|i| (i % 251) as u8).collect();
    bytes.extend_from_slice(&payload);

    let frame = decode_one(&bytes);
    assert!(frame.fin);
    assert_eq!(frame.opcode, Opcode::Binary);
    assert_eq!(frame.payload.len(), 65_536);
    assert_eq!(frame.payload.as_ref(), payload.as_slice());
}

#[test]
fn length_encoding_boundaries() {
    // 125 → 7-bit form.
    let buf = encode_one(Frame::binary(vec![0u8; 125]));
    assert_eq!(buf[1], 125);
    assert_eq!(buf.len(), 2 + 125);

    // 126 → 16-bit form.
    let buf = encode_one(Frame::binary(vec![0u8; 126]));
    assert_eq!(buf[1], 126);
    assert_eq!(&buf[2..4], &126u16.to_be_bytes());
    assert_eq!(buf.len(), 4 + 126);

    // 65535 → still the 16-bit form.
    let buf = encode_one(Frame::binary(vec![0u8; 65_535]));
    assert_eq!(buf[1], 126);
    assert_eq!(&buf[2..4], &65_535u16.to_be_bytes());

    // 65536 → 64-bit form.
    let buf = encode_one(Frame::binary(vec![0u8; 65_536]));
    assert_eq!(buf[1], 127);
    assert_eq!(&buf[2..10], &65_536u64.to_be_bytes());
}

#[test]
fn receiver_reconstructs_boundary_lengths() {
    for len in [125usize, 126, 65_535, 65_536] {
        let mut codec = FrameCodec::new();
        let mut buf = encode_one(Frame::binary(vec![0xABu8; len]));
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.payload.len(), len, "length {len} did not round-trip");
    }
}

#[test]
fn text_round_trip() {
    let text = "caf\u{e9} \u{1F980} unmasked text";
    let mut codec = FrameCodec::new();
    let mut buf = encode_one(Frame::text(text));
    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert!(frame.fin);
    assert_eq!(frame.opcode, Opcode::Text);
    assert_eq!(frame.payload.as_ref(), text.as_bytes());
}

#[test]
fn binary_round_trip() {
    let payload: Vec<u8> = (0..=255).collect();
    let mut codec = FrameCodec::new();
    let mut buf = encode_one(Frame::binary(payload.clone()));
    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert!(frame.fin);
    assert_eq!(frame.opcode, Opcode::Binary);
    assert_eq!(frame.payload.as_ref(), payload.as_slice());
}

#[test]
fn reserved_bits_rejected() {
    for bit in [0x40u8, 0x20, 0x10] {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0x81 | bit, 0x01, 0x41][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(WsError::ReservedBits)
        ));
    }
}

#[test]
fn invalid_opcodes_rejected() {
    for opcode in [0x3u8, 0x7, 0xB, 0xF] {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0x80 | opcode, 0x00][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(WsError::InvalidOpcode(v)) if v == opcode
        ));
    }
}

#[test]
fn oversized_control_frames_rejected() {
    for opcode in [0x88u8, 0x89, 0x8A] {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[opcode, 0x7E, 0x00, 0x80][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(WsError::ControlFrameTooLarge(126))
        ));
    }
}

#[test]
fn incremental_feed_decodes_once_complete() {
    let wire = [0x81u8, 0x85, 0x37, 0xFA, 0x21, 0x3D, 0x7F, 0x9F, 0x4D, 0x51, 0x58];
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();

    for &byte in &wire[..wire.len() - 1] {
        buf.extend_from_slice(&[byte]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
    buf.extend_from_slice(&wire[wire.len() - 1..]);
    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(frame.payload.as_ref(), b"Hello");
}
