// Randomized check of both reader orderings against small reference models.
//
// The priority model is a sorted linked list, deliberately naive, so that the
// heap inside the priority reader is checked against something obviously
// correct.

use std::collections::{LinkedList, VecDeque};
use std::time::Duration;

use dmxp_mbuff::{MultiBuffer, MultiBufferBuilder, Readable, Writeable};

const DEPTH: usize = 48;
const OPS: usize = 5000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    priority: u16,
    index: u32,
}

/// Reference priority queue: kept sorted, highest priority first, then
/// earliest arrival.
#[derive(Default)]
struct RefQueue {
    current: Option<Entry>,
    list: LinkedList<Entry>,
}

impl RefQueue {
    fn accept(&mut self, entry: Entry) {
        if self.current.is_none() {
            self.current = Some(entry);
            return;
        }
        let pos = self
            .list
            .iter()
            .position(|e| e.priority < entry.priority)
            .unwrap_or(self.list.len());
        let mut tail = self.list.split_off(pos);
        self.list.push_back(entry);
        self.list.append(&mut tail);
    }

    fn finalize(&mut self) {
        self.current = self.list.pop_front();
    }

    fn len(&self) -> usize {
        self.list.len() + usize::from(self.current.is_some())
    }
}

/// Reference FIFO reader with the enable watermark.
struct RefFifo {
    current: Option<Entry>,
    queue: VecDeque<Entry>,
    enabled: bool,
    since: u32,
}

impl RefFifo {
    fn accept(&mut self, entry: Entry) {
        if !self.enabled || entry.index < self.since {
            return;
        }
        if self.current.is_none() {
            self.current = Some(entry);
        } else {
            self.queue.push_back(entry);
        }
    }

    fn finalize(&mut self) {
        self.current = self.queue.pop_front();
    }

    fn set_enable(&mut self, enable: bool, next: u32) {
        if enable && !self.enabled {
            self.since = next;
        } else if !enable {
            self.current = None;
            self.queue.clear();
        }
        self.enabled = enable;
    }

    fn len(&self) -> usize {
        self.queue.len() + usize::from(self.current.is_some())
    }
}

/// Read the current packet, check it against the model, and finalize.
fn check_head<R: Readable>(reader: &mut R, expected: Option<Entry>) {
    match expected {
        Some(entry) => {
            assert!(reader.get_read_ready() >= 4);
            assert_eq!(reader.read_u32(), Some(entry.index));
            let rest = reader.get_read_ready();
            assert!(reader.read_consume(rest));
            reader.read_finalize();
        }
        None => assert_eq!(reader.get_read_ready(), 0),
    }
}

fn new_buffer() -> MultiBuffer {
    MultiBufferBuilder::new()
        .with_capacity(64 * 1024)
        .with_queue_depth(DEPTH)
        .with_read_timeout(Duration::from_secs(3600))
        .with_write_timeout(Duration::from_secs(3600))
        .build()
        .expect("buffer")
}

#[test]
fn test_priority_reader_matches_reference() {
    let mut rng = fastrand::Rng::with_seed(1234);
    let buffer = new_buffer();
    let mut writer = buffer.writer();
    let mut reader = buffer.reader_priority();

    let mut model = RefQueue::default();
    let mut pending: Vec<Entry> = Vec::new();
    let mut next_index = 0u32;

    for _ in 0..OPS {
        match rng.u8(0..10) {
            0..=4 if model.len() + pending.len() < DEPTH => {
                let entry = Entry {
                    priority: rng.u16(0..6),
                    index: next_index,
                };
                next_index += 1;
                writer.write_u32(entry.index);
                writer.set_priority(entry.priority);
                writer.write_bytes(&vec![0u8; rng.usize(0..200)]);
                assert!(writer.write_finalize());
                pending.push(entry);
            }
            5..=6 => {
                buffer.service();
                for entry in pending.drain(..) {
                    model.accept(entry);
                }
            }
            _ => {
                if let Some(entry) = model.current {
                    let meta = reader.packet_meta().expect("current packet");
                    assert_eq!(meta.priority, entry.priority);
                }
                check_head(&mut reader, model.current);
                model.finalize();
            }
        }
        assert!(reader.consistency());
        assert_eq!(reader.queue_len() + usize::from(model.current.is_some()), model.len());
        assert!(buffer.consistency());
    }

    // Drain what is left.
    buffer.service();
    for entry in pending.drain(..) {
        model.accept(entry);
    }
    while model.current.is_some() {
        check_head(&mut reader, model.current);
        model.finalize();
    }
    assert_eq!(buffer.get_free_bytes(), buffer.capacity());
}

#[test]
fn test_simple_reader_matches_reference() {
    let mut rng = fastrand::Rng::with_seed(42);
    let buffer = new_buffer();
    let mut writer = buffer.writer();
    let mut reader = buffer.reader_simple();

    let mut model = RefFifo {
        current: None,
        queue: VecDeque::new(),
        enabled: true,
        since: 0,
    };
    let mut pending: Vec<Entry> = Vec::new();
    let mut next_index = 0u32;

    for _ in 0..OPS {
        match rng.u8(0..20) {
            0..=8 if model.len() + pending.len() < DEPTH => {
                let entry = Entry {
                    priority: rng.u16(..),
                    index: next_index,
                };
                next_index += 1;
                writer.write_u32(entry.index);
                writer.set_priority(entry.priority);
                assert!(writer.write_finalize());
                pending.push(entry);
            }
            9..=12 => {
                buffer.service();
                for entry in pending.drain(..) {
                    model.accept(entry);
                }
            }
            13 => {
                let enable = !model.enabled;
                reader.set_port_enable(enable);
                model.set_enable(enable, next_index);
            }
            _ => {
                check_head(&mut reader, model.current);
                model.finalize();
            }
        }
        assert!(reader.consistency());
        assert_eq!(reader.is_enabled(), model.enabled);
        assert!(buffer.consistency());
    }
}
