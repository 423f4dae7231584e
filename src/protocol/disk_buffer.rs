// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Named, file-backed data buffers.
//!
//! A buffer never parses its files. Producers write the next slot with
//! [`DiskBuffer::write_next`] (or write the file themselves and call
//! [`DiskBuffer::done_writing`]); consumers subscribe and read the current
//! file when told new data arrived. With more than one slot, writers rotate
//! through `<stem>_<slot>.<ext>` so a reader never sees a half-written file.

use parking_lot::RwLock;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::utils::files::write_atomic;
use crate::utils::{Observers, Origin, SubscriptionId};

#[derive(Debug, Clone, PartialEq)]
pub enum DiskBufferChange {
    NewData(String),
    Path(PathBuf),
}

#[derive(Debug, Clone)]
pub struct DiskBufferEvent {
    pub id: String,
    pub change: DiskBufferChange,
    pub origin: Origin,
}

#[derive(Debug, Default)]
struct BufferState {
    path: PathBuf,
    current_file: Option<String>,
    next_slot: usize,
}

pub struct DiskBuffer {
    id: String,
    file_name: String,
    buffer_count: usize,
    state: RwLock<BufferState>,
    observers: Observers<DiskBufferEvent>,
}

impl DiskBuffer {
    /// A double-buffered disk buffer writing `file_name` variants into `path`.
    pub fn new(id: impl Into<String>, file_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            buffer_count: 2,
            state: RwLock::new(BufferState {
                path: path.into(),
                ..BufferState::default()
            }),
            observers: Observers::new(),
        }
    }

    /// Number of rotating slots. One slot always writes `file_name` itself.
    pub fn with_buffer_count(mut self, count: usize) -> Self {
        self.buffer_count = count.max(1);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    pub fn path(&self) -> PathBuf {
        self.state.read().path.clone()
    }

    pub fn set_path(&self, path: impl Into<PathBuf>) {
        self.set_path_from(path, Origin::Local)
    }

    pub fn set_path_from(&self, path: impl Into<PathBuf>, origin: Origin) {
        let path = path.into();
        self.state.write().path = path.clone();
        self.emit(DiskBufferChange::Path(path), origin);
    }

    /// Name of the file in `slot`.
    pub fn slot_file_name(&self, slot: usize) -> String {
        if self.buffer_count == 1 {
            return self.file_name.clone();
        }
        let name = Path::new(&self.file_name);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match name.extension() {
            Some(extension) => format!("{}_{}.{}", stem, slot % self.buffer_count, extension.to_string_lossy()),
            None => format!("{}_{}", stem, slot % self.buffer_count),
        }
    }

    /// Claim the next slot for writing.
    pub fn next_file_name(&self) -> String {
        let slot = {
            let mut state = self.state.write();
            let slot = state.next_slot;
            state.next_slot = (slot + 1) % self.buffer_count;
            slot
        };
        self.slot_file_name(slot)
    }

    /// Write `contents` into the next slot and announce it.
    pub fn write_next(&self, contents: &[u8]) -> io::Result<String> {
        let file_name = self.next_file_name();
        write_atomic(&self.path().join(&file_name), contents)?;
        self.done_writing(&file_name);
        Ok(file_name)
    }

    /// Mark `file_name` as the newest complete file and notify observers.
    pub fn done_writing(&self, file_name: &str) {
        self.done_writing_from(file_name, Origin::Local)
    }

    pub fn done_writing_from(&self, file_name: &str, origin: Origin) {
        self.state.write().current_file = Some(file_name.to_string());
        self.emit(DiskBufferChange::NewData(file_name.to_string()), origin);
    }

    pub fn current_file(&self) -> Option<String> {
        self.state.read().current_file.clone()
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        let state = self.state.read();
        state.current_file.as_ref().map(|file| state.path.join(file))
    }

    /// Raw bytes of the newest file.
    pub fn read_current(&self) -> io::Result<Vec<u8>> {
        let path = self
            .current_path()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("buffer '{}' holds no data", self.id)))?;
        std::fs::read(path)
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&DiskBufferEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn emit(&self, change: DiskBufferChange, origin: Origin) {
        self.observers.notify(&DiskBufferEvent {
            id: self.id.clone(),
            change,
            origin,
        });
    }
}

impl fmt::Debug for DiskBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("DiskBuffer")
            .field("id", &self.id)
            .field("file_name", &self.file_name)
            .field("path", &state.path)
            .field("current_file", &state.current_file)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn slots_rotate_through_numbered_names() {
        let buffer = DiskBuffer::new("field", "field.json", "/tmp");
        assert_eq!(buffer.next_file_name(), "field_0.json");
        assert_eq!(buffer.next_file_name(), "field_1.json");
        assert_eq!(buffer.next_file_name(), "field_0.json");

        let single = DiskBuffer::new("raw", "raw.bin", "/tmp").with_buffer_count(1);
        assert_eq!(single.next_file_name(), "raw.bin");
        assert_eq!(single.next_file_name(), "raw.bin");
    }

    #[test]
    fn writing_announces_new_data() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = DiskBuffer::new("field", "field.json", dir.path());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        buffer.subscribe(move |event| sink.lock().push(event.change.clone()));

        let first = buffer.write_next(b"{\"v\":1}").unwrap();
        let second = buffer.write_next(b"{\"v\":2}").unwrap();

        assert_ne!(first, second);
        assert_eq!(buffer.current_file().as_deref(), Some(second.as_str()));
        assert_eq!(buffer.read_current().unwrap(), b"{\"v\":2}".to_vec());
        assert_eq!(
            *seen.lock(),
            vec![DiskBufferChange::NewData(first), DiskBufferChange::NewData(second)]
        );
    }

    #[test]
    fn empty_buffer_has_nothing_to_read() {
        let buffer = DiskBuffer::new("empty", "e.bin", "/nonexistent");
        assert_eq!(buffer.read_current().unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
