// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Filesystem helpers shared by the cache, run metadata and persistence code.

use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

const HASH_CHUNK: usize = 64 * 1024;

/// CRC32 of a file's contents, streamed in chunks.
pub fn crc32_file(path: &Path) -> io::Result<u32> {
    let mut file = fs::File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buffer = vec![0u8; HASH_CHUNK];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize())
}

/// Modification time of `path` as an RFC 3339 string.
pub fn modified_timestamp(path: &Path) -> io::Result<String> {
    let modified = fs::metadata(path)?.modified()?;
    let timestamp: DateTime<Utc> = modified.into();
    Ok(timestamp.to_rfc3339())
}

/// Write `contents` to `path` through a sibling temp file and a rename, so
/// readers never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut temp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)
}

/// Copy `from` to `to`, creating the destination directory if needed.
pub fn copy_into_place(from: &Path, to: &Path) -> io::Result<u64> {
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::copy(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, b"hello").unwrap();
        let first = crc32_file(&path).unwrap();
        assert_eq!(first, crc32fast::hash(b"hello"));

        fs::write(&path, b"hello!").unwrap();
        assert_ne!(crc32_file(&path).unwrap(), first);
    }

    #[test]
    fn atomic_write_replaces_file_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.json");
        write_atomic(&path, b"[1]").unwrap();
        write_atomic(&path, b"[1,2]").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[1,2]");
        assert!(!dir.path().join("nested").join("ledger.json.tmp").exists());
    }
}
