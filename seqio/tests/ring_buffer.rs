use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use seqio::RingBuffer;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Operation {
    Append(Vec<u8>),
    AppendOwned(Vec<u8>),
    AppendShared(Vec<u8>),
    Read(usize),
    ReadChunk,
    Skip(usize),
    Chop(usize),
    PutChar(u8),
    UngetChar(u8),
    ReadLine(usize),
    Clear,
}

#[derive(Clone, Debug)]
struct Scenario {
    block_size: usize,
    operations: Vec<Operation>,
}

impl Arbitrary for Scenario {
    fn arbitrary(g: &mut Gen) -> Self {
        let block_size = *g.choose(&[0, 1, 3, 8, 64, 4096]).unwrap_or(&8);
        let count = usize::arbitrary(g) % 60 + 1;
        let operations = (0..count)
            .map(|_| match u8::arbitrary(g) % 12 {
                0 | 1 => Operation::Append(Vec::arbitrary(g)),
                2 => Operation::AppendOwned(Vec::arbitrary(g)),
                3 => Operation::AppendShared(Vec::arbitrary(g)),
                4 | 5 => Operation::Read(usize::arbitrary(g) % 50),
                6 => Operation::ReadChunk,
                7 => Operation::Skip(usize::arbitrary(g) % 50),
                8 => Operation::Chop(usize::arbitrary(g)),
                9 => Operation::PutChar(u8::arbitrary(g)),
                10 => Operation::UngetChar(u8::arbitrary(g)),
                _ if bool::arbitrary(g) => Operation::ReadLine(usize::arbitrary(g) % 20 + 2),
                _ => Operation::Clear,
            })
            .collect();
        Scenario {
            block_size,
            operations,
        }
    }
}

// Every operation is mirrored on a plain VecDeque; the buffer must always
// agree with it byte for byte.
#[quickcheck]
fn prop_ring_buffer_matches_model(scenario: Scenario) -> bool {
    let mut buffer = RingBuffer::new(scenario.block_size);
    let mut model: VecDeque<u8> = VecDeque::new();

    for op in scenario.operations {
        match op {
            Operation::Append(data) => {
                buffer.append(&data);
                model.extend(&data);
            }
            Operation::AppendOwned(data) => {
                model.extend(&data);
                buffer.append_owned(data);
            }
            Operation::AppendShared(data) => {
                let shared = Arc::new(data);
                buffer.append_shared(Arc::clone(&shared));
                model.extend(shared.iter());
            }
            Operation::Read(n) => {
                let mut out = vec![0u8; n];
                let got = buffer.read(&mut out);
                let expected: Vec<u8> = model.drain(..n.min(model.len())).collect();
                if out[..got] != expected[..] {
                    return false;
                }
            }
            Operation::ReadChunk => {
                let chunk = buffer.read_chunk();
                let expected: Vec<u8> = model.drain(..chunk.len()).collect();
                if chunk != expected || (chunk.is_empty() && !model.is_empty()) {
                    return false;
                }
            }
            Operation::Skip(n) => {
                let skipped = buffer.skip(n);
                if skipped != n.min(model.len()) {
                    return false;
                }
                model.drain(..skipped);
            }
            Operation::Chop(n) => {
                let n = n % (model.len() + 1);
                buffer.chop(n);
                model.truncate(model.len() - n);
            }
            Operation::PutChar(c) => {
                buffer.put_char(c);
                model.push_back(c);
            }
            Operation::UngetChar(c) => {
                buffer.unget_char(c);
                model.push_front(c);
            }
            Operation::ReadLine(room) => {
                let mut out = vec![0xffu8; room];
                let got = buffer.read_line(&mut out);
                if model.is_empty() {
                    if got.is_some() {
                        return false;
                    }
                    continue;
                }
                let limit = (room - 1).min(model.len());
                let len = model
                    .iter()
                    .take(limit)
                    .position(|&b| b == b'\n')
                    .map_or(limit, |i| i + 1);
                let expected: Vec<u8> = model.drain(..len).collect();
                if got != Some(len) || out[..len] != expected[..] || out[len] != 0 {
                    return false;
                }
            }
            Operation::Clear => {
                buffer.clear();
                model.clear();
            }
        }

        if buffer.size() != model.len() || buffer.is_empty() != model.is_empty() {
            return false;
        }
    }

    buffer.to_vec() == model.iter().copied().collect::<Vec<u8>>()
}

#[quickcheck]
fn prop_peek_does_not_consume(data: Vec<u8>, pos: usize, len: usize) -> bool {
    let mut buffer = RingBuffer::new(5);
    for piece in data.chunks(7) {
        buffer.append(piece);
    }
    let pos = pos % (data.len() + 1);
    let mut out = vec![0u8; len % 64];
    let got = buffer.peek(&mut out, pos);

    let expected = &data[pos..(pos + out.len()).min(data.len())];
    got == expected.len() && &out[..got] == expected && buffer.size() == data.len()
}

#[quickcheck]
fn prop_index_of_matches_slice_search(data: Vec<u8>, needle: u8, pos: usize, max_len: usize) -> bool {
    let mut buffer = RingBuffer::new(4);
    for piece in data.chunks(3) {
        buffer.append(piece);
    }
    let pos = pos % (data.len() + 1);
    let max_len = max_len % (data.len() + 2);
    let window = &data[pos..(pos + max_len).min(data.len())];
    let expected = window.iter().position(|&b| b == needle).map(|i| pos + i);
    buffer.index_of(needle, max_len, pos) == expected
}
