// Allocation tracking for the packet path.
//
// dhat installs a global allocator and only one profiler may run at a time,
// so this file holds a single #[serial_test::serial] test.
//
// cargo test --test allocation_tracking -- --nocapture

use dmxp_mbuff::{MultiBuffer, Readable, Writeable};

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

fn consume<R: Readable>(reader: &mut R, payload: &[u8], scratch: &mut [u8]) {
    let n = reader.get_read_ready();
    assert_eq!(n, payload.len());
    assert!(reader.read_bytes(&mut scratch[..n]));
    assert_eq!(&scratch[..n], payload);
    reader.read_finalize();
}

fn round_trip<R: Readable, S: Readable>(
    buffer: &MultiBuffer,
    writer: &mut impl Writeable,
    a: &mut R,
    b: &mut S,
    payload: &[u8],
) {
    let mut scratch = [0u8; 512];
    writer.write_bytes(payload);
    assert!(writer.write_finalize());
    buffer.service();
    consume(a, payload, &mut scratch);
    consume(b, payload, &mut scratch);
}

#[test]
#[serial_test::serial]
fn test_steady_state_is_allocation_free() {
    let _profiler = dhat::Profiler::builder().testing().build();

    let buffer = MultiBuffer::new(16 * 1024).expect("buffer");
    let mut writer = buffer.writer();
    let mut simple = buffer.reader_simple();
    let mut priority = buffer.reader_priority();
    let payload: Vec<u8> = (0..300u32).map(|i| i as u8).collect();

    println!("Warming up...");
    for _ in 0..100 {
        round_trip(&buffer, &mut writer, &mut simple, &mut priority, &payload);
    }

    let before = dhat::HeapStats::get();
    for i in 0..1000 {
        let len = 1 + i % payload.len();
        round_trip(&buffer, &mut writer, &mut simple, &mut priority, &payload[..len]);
    }
    let after = dhat::HeapStats::get();

    println!(
        "blocks before: {}, after: {}",
        before.total_blocks, after.total_blocks
    );
    dhat::assert_eq!(after.total_blocks, before.total_blocks);
    assert_eq!(buffer.get_free_bytes(), 16 * 1024);
}
