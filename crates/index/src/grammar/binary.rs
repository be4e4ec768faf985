//! `Packages` grammar.

use super::{State, field};
use crate::Entry;
use std::collections::VecDeque;

#[derive(Debug, Default)]
struct Record {
    filename: Option<String>,
    size: Option<u64>,
    hash: Option<String>,
    bad_size: bool,
}

/// State machine for binary package lists.
///
/// Only three fields matter: `Filename`, `Size` and `MD5sum`. A record is
/// emitted when it has a non-empty filename and a valid size.
#[derive(Debug, Default)]
pub(crate) struct BinaryList {
    state: State,
    record: Record,
}
impl BinaryList {
    pub(crate) fn line(&mut self, line: &str, out: &mut VecDeque<Entry>) {
        if line.is_empty() {
            self.end_record(out);
            return;
        }
        self.state = State::InRecord;
        if let Some(value) = field(line, "Filename") {
            self.record.filename = Some(value.to_string());
        } else if let Some(value) = field(line, "Size") {
            match value.parse::<u64>() {
                Ok(size) => {
                    self.record.size = Some(size);
                    self.record.bad_size = false;
                },
                Err(_) => self.record.bad_size = true,
            }
        } else if let Some(value) = field(line, "MD5sum") {
            self.record.hash = Some(value.to_string());
        }
    }

    pub(crate) fn end_record(&mut self, out: &mut VecDeque<Entry>) {
        if self.state == State::Idle {
            return;
        }
        let record = std::mem::take(&mut self.record);
        self.state = State::Idle;
        let Some(path) = record.filename.filter(|f| !f.is_empty()) else {
            return;
        };
        match record.size {
            Some(size) if !record.bad_size => out.push_back(Entry::new(path, size, record.hash)),
            _ => tracing::debug!(%path, "dropping binary record without a valid size"),
        }
    }
}
