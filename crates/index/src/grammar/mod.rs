//! Line-driven state machines for the two index grammars.
//!
//! Both grammars share the same outer shape: records are separated by blank
//! lines, fields are `Key: value` lines, and lines starting with whitespace
//! continue the previous field. Each machine consumes one (right-trimmed)
//! line at a time and pushes any completed entries onto an output queue.

mod binary;
mod source;

use self::binary::BinaryList;
use self::source::SourceList;
use crate::error::{ErrorKind, Result};
use crate::{Entry, IndexKind};
use std::collections::VecDeque;
use std::io::BufRead;

/// Where a machine is within the current record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum State {
    /// Between records (start of stream, or after a blank line).
    #[default]
    Idle,
    /// Inside a record, reading fields.
    InRecord,
    /// Inside a multi-line file list (`Checksums-Sha256:`).
    InFileBlock,
}

/// Returns the value of `line` if it is the field `key` (case-insensitive).
///
/// Continuation lines never match, since their "key" starts with whitespace.
pub(crate) fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (name, value) = line.split_once(':')?;
    name.eq_ignore_ascii_case(key).then(|| value.trim_start())
}

enum Machine {
    Binary(BinaryList),
    Source(SourceList),
}
impl Machine {
    fn line(&mut self, line: &str, out: &mut VecDeque<Entry>) {
        match self {
            Self::Binary(m) => m.line(line, out),
            Self::Source(m) => m.line(line, out),
        }
    }

    fn finish(&mut self, out: &mut VecDeque<Entry>) {
        match self {
            Self::Binary(m) => m.end_record(out),
            Self::Source(m) => m.end_record(out),
        }
    }
}

/// Lazy iterator over the entries of an index.
///
/// Created by [`IndexKind::entries`]. Lines are decoded as UTF-8 with invalid
/// sequences replaced; the end of the stream closes the last open record.
/// After an I/O error the iterator is exhausted.
pub struct Entries<R> {
    reader: R,
    machine: Machine,
    buffer: Vec<u8>,
    pending: VecDeque<Entry>,
    finished: bool,
}
impl<R: BufRead> Entries<R> {
    pub(crate) fn new(kind: IndexKind, reader: R) -> Self {
        let machine = match kind {
            IndexKind::Packages => Machine::Binary(BinaryList::default()),
            IndexKind::Sources => Machine::Source(SourceList::default()),
        };
        Self {
            reader,
            machine,
            buffer: Vec::with_capacity(256),
            pending: VecDeque::new(),
            finished: false,
        }
    }
}
impl<R: BufRead> Iterator for Entries<R> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(Ok(entry));
            }
            if self.finished {
                return None;
            }
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => {
                    self.finished = true;
                    self.machine.finish(&mut self.pending);
                },
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.buffer);
                    self.machine.line(line.trim_end(), &mut self.pending);
                },
                Err(e) => {
                    self.finished = true;
                    return Some(Err(ErrorKind::Io(e).into()));
                },
            }
        }
    }
}
