//! Tests for the length-prefixed frame codec.

use rstest::rstest;

use super::*;

fn encode(codec: &mut FrameCodec, payload: &'static [u8]) -> BytesMut {
    let mut buf = BytesMut::new();
    codec
        .encode(Bytes::from_static(payload), &mut buf)
        .expect("encode should succeed");
    buf
}

#[rstest]
#[case::eight(LengthPrefix::U8, &[5][..])]
#[case::sixteen(LengthPrefix::U16, &[5, 0][..])]
#[case::twenty_four(LengthPrefix::U24, &[5, 0, 0][..])]
#[case::thirty_two(LengthPrefix::U32, &[5, 0, 0, 0][..])]
fn writes_little_endian_prefix(#[case] prefix: LengthPrefix, #[case] expected: &[u8]) {
    let mut codec = FrameCodec::new(prefix);

    let buf = encode(&mut codec, b"hello");

    assert_eq!(&buf[..prefix.len()], expected);
    assert_eq!(&buf[prefix.len()..], b"hello");
}

#[rstest]
#[case(8, LengthPrefix::U8)]
#[case(16, LengthPrefix::U16)]
#[case(24, LengthPrefix::U24)]
#[case(32, LengthPrefix::U32)]
fn selects_prefix_from_bits(#[case] bits: u8, #[case] expected: LengthPrefix) {
    assert_eq!(LengthPrefix::from_bits(bits), Ok(expected));
    assert_eq!(expected.bits(), bits);
}

#[rstest]
#[case(0)]
#[case(12)]
#[case(64)]
fn rejects_unsupported_bits(#[case] bits: u8) {
    assert_eq!(
        LengthPrefix::from_bits(bits),
        Err(ConfigError::UnsupportedFramingBits(bits))
    );
}

#[rstest]
fn decodes_complete_frame() {
    let mut codec = FrameCodec::default();
    let mut buf = encode(&mut codec, b"payload");

    let frame = codec
        .decode(&mut buf)
        .expect("decode should succeed")
        .expect("should produce frame");

    assert_eq!(&frame[..], b"payload");
    assert!(buf.is_empty());
}

#[rstest]
fn returns_none_for_partial_prefix() {
    let mut codec = FrameCodec::default();
    let mut buf = BytesMut::from(&[7u8, 0][..]);

    let result = codec.decode(&mut buf).expect("decode should succeed");

    assert!(result.is_none());
    assert_eq!(buf.len(), 2);
}

#[rstest]
fn returns_none_for_partial_payload() {
    let mut codec = FrameCodec::default();
    let mut buf = encode(&mut codec, b"truncated");
    let rest = buf.split_off(6);

    assert!(codec.decode(&mut buf).expect("decode should succeed").is_none());

    buf.extend_from_slice(&rest);
    let frame = codec.decode(&mut buf).expect("decode").expect("completed frame");
    assert_eq!(&frame[..], b"truncated");
}

#[rstest]
fn decodes_back_to_back_frames_in_order() {
    let mut codec = FrameCodec::new(LengthPrefix::U16);
    let mut buf = encode(&mut codec, b"first");
    buf.extend_from_slice(&encode(&mut codec, b"second"));

    let first = codec.decode(&mut buf).expect("decode").expect("first frame");
    let second = codec.decode(&mut buf).expect("decode").expect("second frame");

    assert_eq!(&first[..], b"first");
    assert_eq!(&second[..], b"second");
    assert!(codec.decode(&mut buf).expect("decode").is_none());
}

#[rstest]
fn empty_frames_are_delivered() {
    let mut codec = FrameCodec::default();
    let mut buf = encode(&mut codec, b"");

    let frame = codec.decode(&mut buf).expect("decode").expect("empty frame");

    assert!(frame.is_empty());
}

#[rstest]
fn rejects_payload_exceeding_prefix() {
    let mut codec = FrameCodec::new(LengthPrefix::U8);
    let mut buf = BytesMut::new();

    let err = codec
        .encode(Bytes::from(vec![0u8; 256]), &mut buf)
        .expect_err("encode should fail");

    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    assert!(buf.is_empty());
}

#[rstest]
fn eof_mid_frame_is_an_error() {
    let mut codec = FrameCodec::default();
    let mut buf = encode(&mut codec, b"cut short");
    buf.truncate(5);

    let err = codec.decode_eof(&mut buf).expect_err("eof mid-frame");

    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[rstest]
fn clean_eof_yields_none() {
    let mut codec = FrameCodec::default();
    let mut buf = BytesMut::new();

    assert!(codec.decode_eof(&mut buf).expect("clean eof").is_none());
}

#[rstest]
fn eof_after_bare_header_is_an_error() {
    let mut codec = FrameCodec::default();
    let mut buf = BytesMut::from(&[3u8, 0, 0, 0][..]);

    assert!(codec.decode(&mut buf).expect("header only").is_none());
    let err = codec.decode_eof(&mut buf).expect_err("payload never arrived");

    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[rstest]
fn oversized_header_is_rejected_without_reserving() {
    let mut codec = FrameCodec::default();
    let mut buf = BytesMut::from(&[0xff, 0xff, 0xff, 0xff][..]);

    let err = codec.decode(&mut buf).expect_err("frame above the limit");

    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    assert!(buf.capacity() < DEFAULT_MAX_FRAME_LENGTH);
}

#[rstest]
fn configured_limit_applies_to_both_directions() {
    let mut codec = FrameCodec::with_max_frame_length(LengthPrefix::U32, 4);
    let mut out = BytesMut::new();

    codec
        .encode(Bytes::from_static(b"four"), &mut out)
        .expect("frame at the limit");
    let err = codec
        .encode(Bytes::from_static(b"five!"), &mut out)
        .expect_err("frame above the limit");
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

    let mut incoming = BytesMut::from(&[5u8, 0, 0, 0][..]);
    let err = codec.decode(&mut incoming).expect_err("header above the limit");
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

#[rstest]
#[case(LengthPrefix::U8, 0xff)]
#[case(LengthPrefix::U16, 0xffff)]
#[case(LengthPrefix::U32, DEFAULT_MAX_FRAME_LENGTH)]
fn limit_is_clamped_to_the_prefix(#[case] prefix: LengthPrefix, #[case] expected: usize) {
    assert_eq!(FrameCodec::new(prefix).max_frame_length(), expected);
}
