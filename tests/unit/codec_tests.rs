//! Unit tests for the newline frame codec.
//!
//! Covers:
//! - a complete line decodes without its terminator
//! - several lines in one buffer decode one at a time
//! - partial delivery is buffered until the newline arrives
//! - `\r\n` terminators are accepted
//! - over-long lines are dropped and decoding resumes at the next line
//! - invalid UTF-8 decodes lossily instead of failing
//! - an unterminated final line is yielded at EOF
//! - the encoder appends `\n` and refuses raw newlines

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use device_relay::protocol::codec::{FrameCodec, MAX_LINE_BYTES};
use device_relay::AppError;

#[test]
fn single_line_decodes_without_terminator() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("DEVICE_CONNECTED:Android Device\n");

    let line = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(line.as_deref(), Some("DEVICE_CONNECTED:Android Device"));
    assert!(buf.is_empty(), "the terminator must be consumed");
}

#[test]
fn batched_lines_decode_one_at_a_time() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("GET_LOCATION\nGET_DEVICE_INFO\n");

    let first = codec.decode(&mut buf).expect("first decode");
    let second = codec.decode(&mut buf).expect("second decode");
    let third = codec.decode(&mut buf).expect("third decode");

    assert_eq!(first.as_deref(), Some("GET_LOCATION"));
    assert_eq!(second.as_deref(), Some("GET_DEVICE_INFO"));
    assert!(third.is_none(), "no further lines must be present");
}

#[test]
fn partial_delivery_is_buffered_until_newline() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("LOCA");

    assert!(codec.decode(&mut buf).expect("partial decode").is_none());

    buf.extend_from_slice(b"TION:Lat:1,Lng:2\n");
    let line = codec.decode(&mut buf).expect("completed decode");

    assert_eq!(line.as_deref(), Some("LOCATION:Lat:1,Lng:2"));
}

#[test]
fn crlf_terminator_is_stripped() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("GET_LOCATION\r\n");

    let line = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(line.as_deref(), Some("GET_LOCATION"));
}

#[test]
fn empty_line_decodes_as_empty_string() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("\n");

    let line = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(line.as_deref(), Some(""));
}

#[test]
fn over_long_line_is_discarded_and_next_line_survives() {
    let mut codec = FrameCodec::with_max_length(16);
    let mut raw = "x".repeat(30);
    raw.push('\n');
    raw.push_str("HEARTBEAT:a\n");
    let mut buf = BytesMut::from(raw.as_str());

    let line = codec.decode(&mut buf).expect("decode must not fail on length");

    assert_eq!(
        line.as_deref(),
        Some("HEARTBEAT:a"),
        "the over-long line must be skipped, not returned or fatal"
    );
}

#[test]
fn over_long_line_split_across_reads_is_discarded() {
    let mut codec = FrameCodec::with_max_length(8);
    let mut buf = BytesMut::from("0123456789");

    assert!(codec.decode(&mut buf).expect("first chunk").is_none());

    buf.extend_from_slice(b"abcdef\nLOCATION\n");
    let line = codec.decode(&mut buf).expect("second chunk");

    assert_eq!(line.as_deref(), Some("LOCATION"));
}

#[test]
fn lines_at_the_limit_survive_around_a_skipped_line() {
    let mut codec = FrameCodec::with_max_length(4);
    let mut buf = BytesMut::from("abcd\nabcdef\nxy\n");

    let mut lines = Vec::new();
    while let Some(line) = codec.decode(&mut buf).expect("decode must not fail on length") {
        lines.push(line);
    }

    assert_eq!(lines, vec!["abcd".to_owned(), "xy".to_owned()]);
}

#[test]
fn over_long_final_line_at_eof_yields_nothing() {
    let mut codec = FrameCodec::with_max_length(4);
    let mut buf = BytesMut::from("ok\nabcdefgh");

    let first = codec.decode_eof(&mut buf).expect("first decode_eof");
    let second = codec.decode_eof(&mut buf).expect("over-long tail is skipped");

    assert_eq!(first.as_deref(), Some("ok"));
    assert!(second.is_none());
}

#[test]
fn invalid_utf8_decodes_lossily() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from(&[b'A', 0xFF, b'\n'][..]);

    let line = codec.decode(&mut buf).expect("invalid UTF-8 must not be an error");

    assert_eq!(line.as_deref(), Some("A\u{FFFD}"));
}

#[test]
fn unterminated_final_line_is_yielded_at_eof() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("HEARTBEAT:Pixel");

    let line = codec.decode_eof(&mut buf).expect("decode_eof must succeed");
    let after = codec.decode_eof(&mut buf).expect("second decode_eof");

    assert_eq!(line.as_deref(), Some("HEARTBEAT:Pixel"));
    assert!(after.is_none());
}

#[test]
fn default_limit_is_one_mebibyte() {
    assert_eq!(FrameCodec::default().max_length(), MAX_LINE_BYTES);
    assert_eq!(MAX_LINE_BYTES, 1_048_576);
}

#[test]
fn encoder_appends_newline() {
    let mut codec = FrameCodec::new();
    let mut dst = BytesMut::new();

    codec
        .encode("SHOW_MESSAGE:hello".to_owned(), &mut dst)
        .expect("encode must succeed");

    assert_eq!(&dst[..], b"SHOW_MESSAGE:hello\n");
}

#[test]
fn encoder_rejects_raw_newline() {
    let mut codec = FrameCodec::new();
    let mut dst = BytesMut::new();

    let err = codec
        .encode("SHOW_MESSAGE:a\nb".to_owned(), &mut dst)
        .expect_err("a raw newline would split the frame");

    assert!(matches!(err, AppError::Protocol(_)));
    assert!(dst.is_empty(), "nothing must be written on rejection");
}
