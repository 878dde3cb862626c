// In demos/switch.rs
//
// A toy software switch: several ingress ports write hashed messages into
// one MultiBuffer, and two egress ports read them back in a single poll
// loop. Press Ctrl+C to stop early.
//
// RUST_LOG=dmxp_mbuff=debug cargo run --example switch -- 1000
use dmxp_mbuff::{MultiBufferBuilder, MultiWriter, Readable, Writeable};
use sha2::{Digest, Sha256};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const INGRESS_PORTS: usize = 3;

fn digest_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Read one "<port>:<seq>:<payload>:<hash>" message and check its hash.
fn check_message<R: Readable>(reader: &mut R) -> Option<bool> {
    let len = reader.get_read_ready();
    if len == 0 {
        return None;
    }
    let mut buf = vec![0u8; len];
    let ok = reader.read_bytes(&mut buf);
    reader.read_finalize();
    let text = String::from_utf8(buf).ok()?;
    let (body, hash) = text.rsplit_once(':')?;
    Some(ok && digest_hex(body.as_bytes()) == hash)
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <num_messages>", args[0]);
        std::process::exit(1);
    }
    let num_messages: usize = args[1].parse().expect("Invalid number of messages");

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let buffer = MultiBufferBuilder::new()
        .with_capacity(64 * 1024)
        .with_max_packet(512)
        .build()?;
    let mut ingress: Vec<MultiWriter> = (0..INGRESS_PORTS).map(|_| buffer.writer()).collect();
    let mut egress = buffer.reader_simple();
    let mut telemetry = buffer.reader_priority();

    println!(
        "Switch: {} ingress ports, {} bytes of buffer",
        INGRESS_PORTS,
        buffer.capacity()
    );

    let start = Instant::now();
    let mut sent = 0usize;
    let mut verified = [0usize; 2];
    let mut corrupt = 0usize;

    while running.load(Ordering::SeqCst) && verified[0] < num_messages {
        // Ingress: each port offers one message per pass while there is room.
        for (port, writer) in ingress.iter_mut().enumerate() {
            if sent >= num_messages || !egress.can_accept() {
                break;
            }
            let body = format!("{}:{}:payload-{}", port, sent, "x".repeat(sent % 64));
            let message = format!("{}:{}", body, digest_hex(body.as_bytes()));
            writer.write_bytes(message.as_bytes());
            writer.set_priority((sent % 4) as u16);
            if writer.write_finalize() {
                sent += 1;
            }
        }

        buffer.service();

        // Egress: drain both readers.
        while let Some(good) = check_message(&mut egress) {
            if good {
                verified[0] += 1;
            } else {
                corrupt += 1;
            }
        }
        while let Some(good) = check_message(&mut telemetry) {
            if good {
                verified[1] += 1;
            } else {
                corrupt += 1;
            }
        }

        if sent % 100 == 0 {
            std::thread::sleep(Duration::from_micros(10));
        }
    }

    let elapsed = start.elapsed();
    println!("Switch: sent {} messages in {:.2?}", sent, elapsed);
    println!(
        "Switch: egress verified {}, telemetry verified {}, corrupt {}",
        verified[0], verified[1], corrupt
    );
    println!("Switch: {:?}", buffer.stats());
    println!("Switch: free bytes {} of {}", buffer.get_free_bytes(), buffer.capacity());
    Ok(())
}
