use std::thread::sleep;
use std::time::Duration;

use dmxp_mbuff::MPMC::Buffer::layout::{DEFAULT_CAPACITY, DEFAULT_TIMEOUT};
use dmxp_mbuff::{MultiBuffer, MultiBufferBuilder, Readable, Writeable};

const T: Duration = DEFAULT_TIMEOUT;

#[test]
fn test_stalled_reader_loses_backlog() {
    let buffer = MultiBuffer::new(DEFAULT_CAPACITY).expect("buffer");
    let mut writer = buffer.writer();
    let mut reader = buffer.reader_simple();
    let t0 = buffer.now();

    for data in [&b"one"[..], b"two", b"three"] {
        writer.write_bytes(data);
        assert!(writer.write_finalize());
    }
    buffer.service_at(t0);
    assert_eq!(reader.queue_len(), 2);

    buffer.service_at(t0 + T.mul_f64(0.9));
    assert_eq!(reader.get_read_ready(), 3);
    assert!(reader.read_consume(1));

    buffer.service_at(t0 + T.mul_f64(1.1));
    assert_eq!(reader.get_read_ready(), 0);
    assert_eq!(reader.queue_len(), 0);
    assert_eq!(buffer.stats().read_timeouts, 1);
    assert_eq!(buffer.get_free_bytes(), DEFAULT_CAPACITY);
    assert!(buffer.consistency());

    // The port stays usable.
    assert!(reader.is_enabled());
    writer.write_bytes(b"four");
    assert!(writer.write_finalize());
    buffer.service_at(t0 + T.mul_f64(1.2));
    assert_eq!(reader.get_read_ready(), 4);
}

#[test]
fn test_active_reader_is_not_expired() {
    let buffer = MultiBuffer::new(DEFAULT_CAPACITY).expect("buffer");
    let mut writer = buffer.writer();
    let mut reader = buffer.reader_simple();
    let t0 = buffer.now();

    for data in [&b"one"[..], b"two"] {
        writer.write_bytes(data);
        assert!(writer.write_finalize());
    }
    buffer.service_at(t0);

    // Finalizing at 0.9T arms the watchdog for the next packet from there.
    buffer.service_at(t0 + T.mul_f64(0.9));
    reader.read_finalize();
    buffer.service_at(t0 + T.mul_f64(1.5));
    assert_eq!(reader.get_read_ready(), 3);
    assert_eq!(buffer.stats().read_timeouts, 0);

    buffer.service_at(t0 + T.mul_f64(2.0));
    assert_eq!(reader.get_read_ready(), 0);
    assert_eq!(buffer.stats().read_timeouts, 1);
}

#[test]
fn test_stalled_writer_loses_partial() {
    let buffer = MultiBuffer::new(DEFAULT_CAPACITY).expect("buffer");
    let mut writer = buffer.writer();
    let mut reader = buffer.reader_simple();
    let t0 = buffer.now();

    writer.write_bytes(&[1u8; 300]);
    buffer.service_at(t0 + T.mul_f64(0.9));
    assert_eq!(writer.get_write_partial(), 300);

    // Each write re-arms the watchdog.
    writer.write_bytes(&[2u8; 10]);
    buffer.service_at(t0 + T.mul_f64(1.1));
    assert_eq!(writer.get_write_partial(), 310);

    buffer.service_at(t0 + T.mul_f64(2.0));
    assert_eq!(writer.get_write_partial(), 0);
    assert_eq!(buffer.get_free_bytes(), DEFAULT_CAPACITY);
    assert_eq!(buffer.stats().write_timeouts, 1);
    assert!(!writer.write_finalize());

    writer.write_bytes(b"fresh");
    assert!(writer.write_finalize());
    buffer.service_at(t0 + T.mul_f64(2.1));
    assert_eq!(reader.get_read_ready(), 5);
}

#[test]
fn test_idle_writer_is_left_alone() {
    let buffer = MultiBuffer::new(DEFAULT_CAPACITY).expect("buffer");
    let mut writer = buffer.writer();
    let t0 = buffer.now();

    writer.write_bytes(b"done");
    assert!(writer.write_finalize());
    buffer.service_at(t0 + T * 10);
    assert_eq!(buffer.stats().write_timeouts, 0);
}

#[test]
fn test_custom_timeouts() {
    let buffer = MultiBufferBuilder::new()
        .with_read_timeout(Duration::from_millis(100))
        .with_write_timeout(Duration::from_millis(50))
        .build()
        .expect("buffer");
    let mut writer = buffer.writer();
    let mut reader = buffer.reader_simple();
    let t0 = buffer.now();

    writer.write_bytes(b"slow");
    buffer.service_at(t0 + Duration::from_millis(100));
    assert_eq!(writer.get_write_partial(), 0);

    writer.set_timeout(Duration::from_secs(5));
    reader.set_timeout(Duration::from_secs(5));
    writer.write_bytes(b"patient");
    buffer.service_at(t0 + Duration::from_millis(200));
    assert!(writer.write_finalize());
    buffer.service_at(t0 + Duration::from_millis(300));
    buffer.service_at(t0 + Duration::from_secs(4));
    assert_eq!(reader.get_read_ready(), 7);
    assert_eq!(buffer.stats().write_timeouts, 1);
    assert_eq!(buffer.stats().read_timeouts, 0);
}

#[test]
fn test_overflowed_writer_is_cleared() {
    let buffer = MultiBuffer::new(DEFAULT_CAPACITY).expect("buffer");
    let mut writer = buffer.writer();
    let t0 = buffer.now();

    writer.set_max_packet(16);
    writer.write_bytes(&[0u8; 17]);
    assert!(writer.is_failed());
    assert_eq!(buffer.get_free_bytes(), DEFAULT_CAPACITY);

    buffer.service_at(t0 + T.mul_f64(0.9));
    assert!(writer.is_failed());

    // Nothing is open, but the latched failure is still reclaimed.
    buffer.service_at(t0 + T.mul_f64(1.1));
    assert!(!writer.is_failed());
    assert_eq!(buffer.stats().write_timeouts, 1);
    assert_eq!(buffer.stats().write_overflows, 1);

    writer.write_bytes(b"ok");
    assert!(writer.write_finalize());
}

#[test]
fn test_watchdogs_measure_from_last_activity() {
    let buffer = MultiBufferBuilder::new()
        .with_read_timeout(Duration::from_millis(200))
        .with_write_timeout(Duration::from_millis(200))
        .build()
        .expect("buffer");
    let mut writer = buffer.writer();
    let mut reader = buffer.reader_simple();

    for data in [&b"one"[..], b"two"] {
        writer.write_bytes(data);
        assert!(writer.write_finalize());
    }
    writer.write_bytes(b"start");
    buffer.service();
    assert_eq!(reader.get_read_ready(), 3);

    sleep(Duration::from_millis(150));
    writer.write_bytes(b"active");
    reader.read_finalize();
    sleep(Duration::from_millis(100));
    buffer.service();

    // Both ports did something 100ms ago; neither is stalled.
    assert_eq!(writer.get_write_partial(), 11);
    assert_eq!(reader.get_read_ready(), 3);
    let stats = buffer.stats();
    assert_eq!(stats.write_timeouts, 0);
    assert_eq!(stats.read_timeouts, 0);

    sleep(Duration::from_millis(250));
    buffer.service();
    assert_eq!(writer.get_write_partial(), 0);
    assert_eq!(reader.get_read_ready(), 0);
    let stats = buffer.stats();
    assert_eq!(stats.write_timeouts, 1);
    assert_eq!(stats.read_timeouts, 1);
    assert_eq!(buffer.get_free_bytes(), buffer.capacity());
}
