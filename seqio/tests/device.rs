mod common;

use common::{init_logging, pattern, with_chunk_size, ScriptedBackend, StuckSeekBackend};
use seqio::{Device, MemoryBackend, OpenMode};

#[test]
fn test_read_all_from_canned_chunks() {
    init_logging();
    for sequential in [true, false] {
        let backend = if sequential {
            ScriptedBackend::sequential(&[b"12", b"34", b""])
        } else {
            ScriptedBackend::random_access(&[b"12", b"34", b""])
        };
        let mut device = Device::new(backend);
        assert!(device.open(OpenMode::READ_ONLY));
        assert_eq!(device.is_sequential(), sequential);

        assert_eq!(device.read_all(), b"1234");
        assert!(device.at_end());
    }
}

#[test]
fn test_closed_device_is_at_end() {
    let device = Device::new(MemoryBackend::with_data(b"data".to_vec()));
    assert!(device.at_end());
    assert!(!device.is_open());
}

#[test]
fn test_peek_does_not_consume() {
    let mut device = Device::new(MemoryBackend::with_data(b"hello world".to_vec()));
    assert!(device.open(OpenMode::READ_ONLY));

    assert_eq!(device.peek_bytes(5), b"hello");
    assert_eq!(device.peek_bytes(5), b"hello");
    assert_eq!(device.pos(), 0);
    assert_eq!(device.read_bytes(5), b"hello");
    assert_eq!(device.pos(), 5);
    assert_eq!(device.bytes_available(), 6);
}

#[test]
fn test_peek_on_sequential_device() {
    let mut device = Device::new(ScriptedBackend::sequential(&[b"hello world"]));
    assert!(device.open(OpenMode::READ_ONLY));

    let mut buf = [0u8; 5];
    assert_eq!(device.peek(&mut buf), 5);
    assert_eq!(&buf, b"hello");
    assert_eq!(device.bytes_available(), 11);

    assert_eq!(device.read_bytes(5), b"hello");
    assert_eq!(device.pos(), 0);
    assert_eq!(device.read_all(), b" world");
}

#[test]
fn test_unbuffered_peek_rewinds() {
    let mut device = with_chunk_size(MemoryBackend::with_data(b"abcdef".to_vec()), 0);
    assert!(device.open(OpenMode::READ_ONLY));

    assert_eq!(device.peek_bytes(3), b"abc");
    assert_eq!(device.pos(), 0);
    assert_eq!(device.read_bytes(4), b"abcd");
}

#[test]
fn test_skip_matches_read() {
    let data = pattern(5000);
    for chunk in [0, 1, 3, 4096, 16384] {
        let mut device = with_chunk_size(MemoryBackend::with_data(data.clone()), chunk);
        assert!(device.open(OpenMode::READ_ONLY));
        assert_eq!(device.read_bytes(10), &data[..10]);
        assert_eq!(device.skip(1234), 1234);
        assert_eq!(device.pos(), 1244);
        assert_eq!(device.read_all(), &data[1244..], "chunk size {chunk}");
    }
}

#[test]
fn test_skip_on_sequential_device() {
    let mut device = Device::new(ScriptedBackend::sequential(&[b"abc", b"defgh", b"ij"]));
    assert!(device.open(OpenMode::READ_ONLY));

    assert_eq!(device.get_char(), Some(b'a'));
    assert_eq!(device.skip(4), 4);
    assert_eq!(device.read_all(), b"fghij");
    assert_eq!(device.skip(10), 0);
}

#[test]
fn test_skip_past_end() {
    let mut device = Device::new(MemoryBackend::with_data(b"abc".to_vec()));
    assert!(device.open(OpenMode::READ_ONLY));
    assert_eq!(device.skip(10), 3);
    assert!(device.at_end());
    assert_eq!(device.skip(-1), -1);
}

#[test]
fn test_text_mode_strips_cr_split_across_reads() {
    let mut device = Device::new(ScriptedBackend::sequential(&[b"a\r", b"\nb"]));
    assert!(device.open(OpenMode::READ_ONLY | OpenMode::TEXT));
    assert_eq!(device.read_all(), b"a\nb");

    let mut device = Device::new(ScriptedBackend::sequential(&[b"a\r", b"\nb"]));
    assert!(device.open(OpenMode::READ_ONLY | OpenMode::TEXT));
    let mut out = Vec::new();
    while let Some(c) = device.get_char() {
        out.push(c);
    }
    assert_eq!(out, b"a\nb");
}

#[test]
fn test_text_mode_toggle() {
    let mut device = Device::new(MemoryBackend::with_data(b"x\r\ny".to_vec()));
    device.set_text_mode_enabled(true);
    assert!(!device.is_text_mode_enabled());

    assert!(device.open(OpenMode::READ_ONLY));
    device.set_text_mode_enabled(true);
    assert!(device.is_text_mode_enabled());
    assert_eq!(device.read_all(), b"x\ny");
}

#[test]
fn test_round_trip_across_chunk_sizes() {
    let data = pattern(10_000);
    for chunk in [0, 1, 2, 7, 4096, 16384] {
        for piece in [1, 3, 333, 20_000] {
            let mut device = with_chunk_size(MemoryBackend::with_data(data.clone()), chunk);
            assert!(device.open(OpenMode::READ_ONLY));

            let mut out = Vec::new();
            loop {
                let bytes = device.read_bytes(piece);
                if bytes.is_empty() {
                    break;
                }
                out.extend_from_slice(&bytes);
            }
            assert_eq!(out, data, "chunk {chunk}, piece {piece}");
            assert!(device.at_end());
        }
    }
}

#[test]
fn test_read_line() {
    let mut device = Device::new(MemoryBackend::with_data(b"first\nsecond\r\nthird".to_vec()));
    assert!(device.open(OpenMode::READ_ONLY | OpenMode::TEXT));
    assert!(!device.can_read_line());

    assert_eq!(device.read_line(0), b"first\n");
    assert!(device.can_read_line());
    assert_eq!(device.read_line(0), b"second\n");
    assert_eq!(device.read_line(0), b"third");
    assert_eq!(device.read_line(0), b"");
}

#[test]
fn test_read_line_into_limits() {
    let mut device = Device::new(MemoryBackend::with_data(b"abcdef\n".to_vec()));
    assert!(device.open(OpenMode::READ_ONLY));

    let mut tiny = [0u8; 1];
    assert_eq!(device.read_line_into(&mut tiny), -1);

    let mut buf = [0xffu8; 4];
    assert_eq!(device.read_line_into(&mut buf), 3);
    assert_eq!(&buf, b"abc\0");
    assert_eq!(device.pos(), 3);

    assert_eq!(device.read_line(2), b"de");
    assert_eq!(device.read_line(0), b"f\n");
}

#[test]
fn test_read_line_on_sequential_device() {
    let mut device = Device::new(ScriptedBackend::sequential(&[b"one\ntw", b"o\nthree"]));
    assert!(device.open(OpenMode::READ_ONLY));

    assert_eq!(device.read_line(0), b"one\n");
    assert_eq!(device.read_line(0), b"two\n");
    assert_eq!(device.read_line(0), b"three");
    assert!(device.at_end());
}

#[test]
fn test_seek_and_reset() {
    let mut device = Device::new(MemoryBackend::with_data(b"0123456789".to_vec()));
    assert!(!device.seek(1));
    assert!(device.open(OpenMode::READ_ONLY));

    assert_eq!(device.read_bytes(3), b"012");
    assert!(device.seek(7));
    assert_eq!(device.pos(), 7);
    assert_eq!(device.read_all(), b"789");

    assert!(!device.seek(-1));
    assert!(device.reset());
    assert_eq!(device.get_char(), Some(b'0'));
    assert_eq!(device.size(), 10);
}

#[test]
fn test_seek_backwards_within_buffer() {
    let mut device = Device::new(MemoryBackend::with_data(b"abcdefgh".to_vec()));
    assert!(device.open(OpenMode::READ_ONLY));
    assert_eq!(device.read_bytes(2), b"ab");
    assert!(device.seek(5));
    assert_eq!(device.read_bytes(2), b"fg");
    assert!(device.seek(1));
    assert_eq!(device.read_bytes(3), b"bcd");
}

#[test]
fn test_sequential_device_cannot_seek() {
    let mut device = Device::new(ScriptedBackend::sequential(&[b"abc"]));
    assert!(device.open(OpenMode::READ_ONLY));
    assert!(!device.seek(0));
    assert_eq!(device.pos(), 0);
    assert_eq!(device.read_all(), b"abc");
    assert_eq!(device.pos(), 0);
}

#[test]
fn test_unget_char() {
    let mut device = Device::new(MemoryBackend::with_data(b"abc".to_vec()));
    assert!(device.open(OpenMode::READ_ONLY));
    assert_eq!(device.read_bytes(2), b"ab");
    device.unget_char(b'b');
    assert_eq!(device.pos(), 1);
    assert_eq!(device.read_all(), b"bc");

    let mut device = Device::new(ScriptedBackend::sequential(&[b"xy"]));
    assert!(device.open(OpenMode::READ_ONLY));
    assert_eq!(device.get_char(), Some(b'x'));
    device.unget_char(b'Z');
    assert_eq!(device.read_all(), b"Zy");
}

#[test]
fn test_write_drops_overwritten_read_data() {
    let mut device = Device::new(MemoryBackend::with_data(b"abcdef".to_vec()));
    assert!(device.open(OpenMode::READ_WRITE));

    assert_eq!(device.get_char(), Some(b'a'));
    assert_eq!(device.write(b"XY"), 2);
    assert_eq!(device.pos(), 3);
    assert_eq!(device.read_all(), b"def");
    assert_eq!(device.backend().data(), b"aXYdef");
}

#[test]
fn test_write_helpers() {
    let mut device = Device::new(MemoryBackend::new());
    assert!(device.open(OpenMode::WRITE_ONLY));
    assert_eq!(device.write_str("ab"), 2);
    assert_eq!(device.write_cstr(c"cd"), 2);
    assert!(device.put_char(b'e'));
    assert_eq!(device.write(b""), 0);
    device.close();
    assert_eq!(device.into_backend().into_inner(), b"abcde");
}

#[test]
fn test_append_mode_starts_at_end() {
    let mut device = Device::new(MemoryBackend::with_data(b"head".to_vec()));
    assert!(device.open(OpenMode::WRITE_ONLY | OpenMode::APPEND));
    assert_eq!(device.pos(), 4);
    assert_eq!(device.write(b"-tail"), 5);
    assert_eq!(device.backend().data(), b"head-tail");
}

#[test]
fn test_misuse_returns_sentinels() {
    init_logging();
    let mut device = Device::new(MemoryBackend::with_data(b"abc".to_vec()));
    let mut buf = [0u8; 2];
    assert_eq!(device.read(&mut buf), -1);
    assert_eq!(device.write(b"x"), -1);
    assert!(device.read_all().is_empty());

    assert!(device.open(OpenMode::READ_ONLY));
    assert!(!device.open(OpenMode::READ_ONLY));
    assert_eq!(device.error_string(), "device already open");
    assert_eq!(device.write(b"x"), -1);
    assert!(!device.put_char(b'x'));
    assert!(device.read_bytes(-1).is_empty());

    device.close();
    assert!(!device.is_writable() && !device.is_readable());
    assert_eq!(device.open_mode(), OpenMode::NOT_OPEN);
}

#[test]
fn test_open_failure_sets_error_string() {
    let mut device = Device::new(MemoryBackend::new());
    assert_eq!(device.error_string(), "Unknown error");
    assert!(!device.open(OpenMode::TEXT));
    assert!(device.error_string().contains("buffer access not specified"));

    device.set_error_string("custom");
    assert_eq!(device.error_string(), "custom");
    assert!(device.open(OpenMode::READ_ONLY));
    assert_eq!(device.error_string(), "Unknown error");
}

#[test]
fn test_read_bytes_hands_out_whole_chunk() {
    let mut device = with_chunk_size(ScriptedBackend::sequential(&[b"hello"]), 16);
    assert!(device.open(OpenMode::READ_ONLY));

    // Fill the read buffer without consuming it.
    assert_eq!(device.peek_bytes(1), b"h");
    assert_eq!(device.read_bytes(5), b"hello");
    assert!(device.at_end());
    assert!(device.backend().probe_calls > 0);
}

#[test]
fn test_multi_channel_delivery() {
    let mut device = Device::new(ScriptedBackend::sequential(&[]));
    assert!(device.open(OpenMode::READ_ONLY));
    device.set_read_channel_count(2);
    assert_eq!(device.read_channel_count(), 2);

    assert!(device.deliver_read_data(1, b"chan1"));
    assert!(device.deliver_read_chunk(0, b"chan0".to_vec()));
    assert!(!device.deliver_read_data(5, b"lost"));
    assert_eq!(device.channel_bytes_available(1), 5);

    assert_eq!(device.read_all(), b"chan0");
    device.set_current_read_channel(1);
    assert_eq!(device.current_read_channel(), 1);
    assert_eq!(device.read_all(), b"chan1");

    device.set_current_read_channel(7);
    assert_eq!(device.current_read_channel(), 1);
    let mut buf = [0u8; 4];
    assert_eq!(device.read(&mut buf), 0);
}

#[test]
fn test_write_channels_survive_close() {
    let mut device = Device::new(MemoryBackend::new());
    assert!(device.open(OpenMode::WRITE_ONLY));
    device.set_write_channel_count(2);
    device.set_current_write_channel(1);
    assert_eq!(device.current_write_channel(), 1);

    device
        .write_buffer_mut()
        .expect("write channel 1 exists")
        .append(b"pending");
    assert_eq!(device.bytes_to_write(), 7);

    device.close();
    assert_eq!(device.write_channel_count(), 0);
    assert_eq!(device.bytes_to_write(), 7);
}

#[test]
fn test_chunk_size_configuration() {
    let mut device = Device::new(MemoryBackend::with_data(pattern(100)));
    assert_eq!(device.read_chunk_size(), 16384);
    assert_eq!(device.write_chunk_size(), 0);
    device.set_read_chunk_size(8);
    device.set_write_chunk_size(32);
    assert_eq!(device.write_chunk_size(), 32);

    assert!(device.open(OpenMode::READ_ONLY));
    assert_eq!(device.read_bytes(3), &pattern(100)[..3]);
    assert_eq!(device.bytes_available(), 97);
}

#[test]
fn test_unbuffered_open_mode() {
    let mut device = Device::new(ScriptedBackend::random_access(&[b"abcdef"]));
    assert!(device.open(OpenMode::READ_ONLY | OpenMode::UNBUFFERED));
    assert_eq!(device.read_bytes(2), b"ab");
    assert_eq!(device.read_bytes(10), b"cdef");
    assert_eq!(device.backend().read_calls, 2);
}

#[test]
fn test_huge_max_size_only_reads_what_exists() {
    let huge = i64::MAX / 2;
    let mut device = Device::new(MemoryBackend::with_data(b"abc\ndef".to_vec()));
    assert!(device.open(OpenMode::READ_ONLY));
    assert_eq!(device.peek_bytes(huge), b"abc\ndef");
    assert_eq!(device.read_line(huge), b"abc\n");
    assert_eq!(device.read_bytes(huge), b"def");
    assert!(device.read_bytes(huge).is_empty());

    let mut device = Device::new(ScriptedBackend::sequential(&[b"ab", b"cd"]));
    assert!(device.open(OpenMode::READ_ONLY));
    assert_eq!(device.read_bytes(huge), b"ab");
    assert_eq!(device.read_bytes(huge), b"cd");
}

#[test]
fn test_read_when_reposition_fails() {
    init_logging();
    let mut device = with_chunk_size(StuckSeekBackend::with_data(b"0123456789"), 4);
    assert!(device.open(OpenMode::READ_ONLY));
    assert_eq!(device.read_bytes(2), b"01");

    // Rolling back leaves the backend ahead of the device position.
    device.start_transaction();
    assert_eq!(device.read_bytes(2), b"23");
    device.rollback_transaction();
    assert_eq!(device.pos(), 2);

    device.backend_mut().fail_seeks = true;
    let mut buf = [0u8; 4];
    assert_eq!(device.read(&mut buf), -1);
    assert_eq!(device.pos(), 2);
    assert!(device.peek_bytes(1).is_empty());
    assert!(device.error_string().contains("refused"));

    device.unget_char(b'1');
    assert_eq!(device.read(&mut buf), 1);
    assert_eq!(buf[0], b'1');
    assert_eq!(device.pos(), 2);

    device.backend_mut().fail_seeks = false;
    assert_eq!(device.read_bytes(4), b"2345");
    assert_eq!(device.pos(), 6);
}

#[test]
fn test_write_when_reposition_fails() {
    let mut device = Device::new(StuckSeekBackend::with_data(b"0123"));
    assert!(device.open(OpenMode::READ_WRITE | OpenMode::APPEND));
    assert_eq!(device.pos(), 4);

    device.backend_mut().fail_seeks = true;
    assert_eq!(device.write(b"45"), -1);
    assert_eq!(device.pos(), 4);
    assert_eq!(device.backend().inner.data(), b"0123");

    device.backend_mut().fail_seeks = false;
    assert_eq!(device.write(b"45"), 2);
    assert_eq!(device.backend().inner.data(), b"012345");
}

#[test]
fn test_skip_when_seek_fails() {
    let mut device = with_chunk_size(StuckSeekBackend::with_data(b"0123456789"), 4);
    assert!(device.open(OpenMode::READ_ONLY));
    assert_eq!(device.read_bytes(2), b"01");

    device.backend_mut().fail_seeks = true;
    // Only the two buffered bytes can be skipped.
    assert_eq!(device.skip(5), 2);
    assert_eq!(device.pos(), 4);
    assert_eq!(device.skip(3), -1);
    assert_eq!(device.pos(), 4);

    device.backend_mut().fail_seeks = false;
    assert_eq!(device.read_bytes(2), b"45");
}
