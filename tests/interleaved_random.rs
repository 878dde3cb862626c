// Random interleaving of several writers against one FIFO reader, with
// capacity conservation checked after every step.

use std::collections::VecDeque;
use std::time::Duration;

use dmxp_mbuff::{MultiBufferBuilder, Readable, Writeable};

const CHUNK: usize = 64;
const MAX_PACKET: usize = 512;

fn chunks_for(len: usize) -> usize {
    len.div_ceil(CHUNK) * CHUNK
}

#[derive(Default)]
struct OpenPacket {
    data: Vec<u8>,
    failed: bool,
}

#[test]
fn test_interleaved_writers() {
    let mut rng = fastrand::Rng::with_seed(0xfeed);
    let buffer = MultiBufferBuilder::new()
        .with_capacity(64 * 1024)
        .with_chunk_size(CHUNK)
        .with_max_packet(MAX_PACKET)
        .with_read_timeout(Duration::from_secs(3600))
        .with_write_timeout(Duration::from_secs(3600))
        .build()
        .expect("buffer");
    let capacity = buffer.capacity();
    let mut writers: Vec<_> = (0..3).map(|_| buffer.writer()).collect();
    let mut reader = buffer.reader_simple();

    let mut open: Vec<OpenPacket> = (0..3).map(|_| OpenPacket::default()).collect();
    let mut committed: VecDeque<Vec<u8>> = VecDeque::new();
    let mut delivered: VecDeque<Vec<u8>> = VecDeque::new();
    let mut seq = 0u8;

    for _ in 0..4000 {
        let w = rng.usize(0..writers.len());
        match rng.u8(0..16) {
            0..=6 => {
                let mut data = vec![0u8; rng.usize(1..=160)];
                for byte in data.iter_mut() {
                    *byte = seq;
                    seq = seq.wrapping_add(1);
                }
                writers[w].write_bytes(&data);
                let model = &mut open[w];
                if !model.failed {
                    if model.data.len() + data.len() > MAX_PACKET {
                        model.failed = true;
                        model.data.clear();
                    } else {
                        model.data.extend_from_slice(&data);
                    }
                }
            }
            7 => {
                writers[w].write_abort();
                open[w] = OpenPacket::default();
            }
            8..=10 if committed.len() + delivered.len() < 30 => {
                let model = std::mem::take(&mut open[w]);
                let ok = !model.failed && !model.data.is_empty();
                assert_eq!(writers[w].write_finalize(), ok);
                if ok {
                    committed.push_back(model.data);
                }
            }
            11..=12 => {
                buffer.service();
                delivered.extend(committed.drain(..));
            }
            _ => match delivered.pop_front() {
                Some(expected) => {
                    let mut data = vec![0u8; reader.get_read_ready()];
                    assert!(reader.read_bytes(&mut data));
                    assert_eq!(data, expected);
                    reader.read_finalize();
                }
                None => assert_eq!(reader.get_read_ready(), 0),
            },
        }

        for (writer, model) in writers.iter().zip(&open) {
            assert_eq!(writer.is_failed(), model.failed);
            assert_eq!(writer.get_write_partial(), model.data.len());
        }
        let in_flight: usize = open
            .iter()
            .map(|p| p.data.len())
            .chain(committed.iter().map(Vec::len))
            .chain(delivered.iter().map(Vec::len))
            .map(chunks_for)
            .sum();
        assert_eq!(buffer.get_free_bytes() + in_flight, capacity);
        assert!(buffer.consistency());
    }

    drop(writers);
    buffer.service();
    drop(reader);
    assert_eq!(buffer.get_free_bytes(), capacity);
    assert_eq!(buffer.packet_count(), 0);
}
