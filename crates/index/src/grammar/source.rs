//! `Sources` grammar.
//!
//! Only the `Checksums-Sha256` file list is read. The legacy `Files` list
//! (MD5) names the same files and is ignored.

use super::{State, field};
use crate::Entry;
use std::collections::VecDeque;

#[derive(Debug)]
struct File {
    name: String,
    size: u64,
    hash: String,
}

#[derive(Debug, Default)]
struct Record {
    directory: Option<String>,
    files: Vec<File>,
}

/// State machine for source package lists.
#[derive(Debug, Default)]
pub(crate) struct SourceList {
    state: State,
    record: Record,
}
impl SourceList {
    pub(crate) fn line(&mut self, line: &str, out: &mut VecDeque<Entry>) {
        if line.is_empty() {
            self.end_record(out);
            return;
        }
        let continuation = line.starts_with([' ', '\t']);
        match self.state {
            State::InFileBlock if continuation => {
                self.file_line(line);
                return;
            },
            _ => self.state = State::InRecord,
        }
        if continuation {
            return;
        }
        if field(line, "Checksums-Sha256").is_some() {
            self.state = State::InFileBlock;
        } else if let Some(directory) = field(line, "Directory") {
            self.record.directory = Some(directory.to_string());
        }
    }

    fn file_line(&mut self, line: &str) {
        let mut parts = line.split_whitespace();
        let (Some(hash), Some(size), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
            tracing::debug!(line, "ignoring malformed checksum line");
            return;
        };
        let Ok(size) = size.parse::<u64>() else {
            tracing::debug!(line, "ignoring checksum line with invalid size");
            return;
        };
        self.record.files.push(File {
            name: name.to_string(),
            size,
            hash: hash.to_string(),
        });
    }

    pub(crate) fn end_record(&mut self, out: &mut VecDeque<Entry>) {
        if self.state == State::Idle {
            return;
        }
        let record = std::mem::take(&mut self.record);
        self.state = State::Idle;
        let Some(directory) = record.directory.filter(|d| !d.is_empty()) else {
            if !record.files.is_empty() {
                tracing::debug!(files = record.files.len(), "dropping source record without a directory");
            }
            return;
        };
        let directory = directory.trim_end_matches('/');
        for file in record.files {
            out.push_back(Entry::new(format!("{directory}/{}", file.name), file.size, Some(file.hash)));
        }
    }
}
