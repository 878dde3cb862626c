// In demos/throughput.rs
//
// Single-threaded poll loop throughput: one writer, two readers.
//
// cargo run --release --example throughput -- 1000000 256
use dmxp_mbuff::{MultiBufferBuilder, Readable, Writeable};
use std::env;
use std::time::Instant;

fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();
    let num_packets: usize = args
        .get(1)
        .map(|s| s.parse().expect("Invalid number of packets"))
        .unwrap_or(1_000_000);
    let packet_size: usize = args
        .get(2)
        .map(|s| s.parse().expect("Invalid packet size"))
        .unwrap_or(256);

    let buffer = MultiBufferBuilder::new()
        .with_capacity(256 * 1024)
        .with_max_packet(packet_size.max(1))
        .build()?;
    let mut writer = buffer.writer();
    let mut readers = [buffer.reader_simple(), buffer.reader_simple()];

    let payload = vec![0x5au8; packet_size.max(1)];
    let mut scratch = vec![0u8; payload.len()];
    let batch = 16;

    println!(
        "Throughput: {} packets of {} bytes, batches of {}",
        num_packets,
        payload.len(),
        batch
    );

    let start = Instant::now();
    let mut sent = 0;
    while sent < num_packets {
        for _ in 0..batch.min(num_packets - sent) {
            writer.write_bytes(&payload);
            if writer.write_finalize() {
                sent += 1;
            }
        }
        buffer.service();
        for reader in readers.iter_mut() {
            while reader.get_read_ready() > 0 {
                let n = reader.get_read_ready();
                reader.read_bytes(&mut scratch[..n]);
                reader.read_finalize();
            }
        }
    }
    let elapsed = start.elapsed();

    let rate = sent as f64 / elapsed.as_secs_f64();
    println!("Throughput: {} packets in {:.2?}", sent, elapsed);
    println!(
        "Throughput: {:.0} packets/s, {:.1} MB/s per reader",
        rate,
        rate * payload.len() as f64 / 1e6
    );
    println!("Throughput: {:?}", buffer.stats());
    Ok(())
}
