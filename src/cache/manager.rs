// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The cache directory and its append-only JSON ledger.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::entry::{CacheEntry, CachedFile};
use crate::cache::source_info::{FileDependency, SourceInfo};
use crate::config::consts::{CACHE_LEDGER_FILE, CACHE_LEDGER_VERSION, CACHE_PREFIX_MAX_LEN};
use crate::errors::CacheError;
use crate::observability::messages::cache::{CacheEntryStored, CacheValidationFailed};
use crate::observability::messages::StructuredLog;
use crate::utils::files::{copy_into_place, write_atomic};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Ledger {
    version: u32,
    entries: Vec<CacheEntry>,
    /// Every cache-relative file name the ledger refers to.
    files: Vec<String>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            version: CACHE_LEDGER_VERSION,
            entries: Vec::new(),
            files: Vec::new(),
        }
    }
}

/// A matching entry found by [`CacheManager::find_cache`].
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub entry: CacheEntry,
    directory: PathBuf,
}

impl CacheHit {
    /// Cached copies paired with the file names they restore to.
    pub fn files(&self) -> Vec<(PathBuf, &str)> {
        self.entry
            .files
            .iter()
            .map(|file| {
                (
                    self.directory.join(&file.cache_file.path),
                    file.original_name.as_str(),
                )
            })
            .collect()
    }

    /// Copy every cached file into `destination` under its original name.
    pub fn restore_into(&self, destination: &Path) -> Result<Vec<PathBuf>, CacheError> {
        let mut restored = Vec::with_capacity(self.entry.files.len());
        for (cached, original) in self.files() {
            let target = destination.join(original);
            copy_into_place(&cached, &target)?;
            restored.push(target);
        }
        Ok(restored)
    }
}

pub struct CacheManager {
    directory: PathBuf,
    ledger_path: PathBuf,
    ledger: Mutex<Ledger>,
    validate_hash: AtomicBool,
}

impl CacheManager {
    /// Open (or create) the cache in `directory`.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        let ledger_path = directory.join(CACHE_LEDGER_FILE);
        let ledger = if ledger_path.exists() {
            let bytes = std::fs::read(&ledger_path)?;
            serde_json::from_slice(&bytes)
                .map_err(|e| CacheError::CorruptLedger(format!("{}: {}", ledger_path.display(), e)))?
        } else {
            Ledger::default()
        };
        Ok(Self {
            directory,
            ledger_path,
            ledger: Mutex::new(ledger),
            validate_hash: AtomicBool::new(true),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    pub fn validate_hash(&self) -> bool {
        self.validate_hash.load(Ordering::SeqCst)
    }

    /// With validation on, lookups re-hash cached files before trusting them.
    pub fn set_validate_hash(&self, validate: bool) {
        self.validate_hash.store(validate, Ordering::SeqCst);
    }

    pub fn entries(&self) -> Vec<CacheEntry> {
        self.ledger.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.ledger.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.lock().entries.is_empty()
    }

    /// Most recent non-stale entry matching `source`.
    ///
    /// When hash validation is on, every cached file must still have its
    /// recorded size and CRC32, and any file already present in
    /// `destination` under its original name must too; otherwise the entry
    /// is rejected.
    pub fn find_cache(&self, source: &SourceInfo, destination: Option<&Path>) -> Option<CacheHit> {
        let candidates: Vec<CacheEntry> = self
            .ledger
            .lock()
            .entries
            .iter()
            .rev()
            .filter(|entry| !entry.stale && entry.source_info.matches(source))
            .cloned()
            .collect();

        let validate = self.validate_hash();
        candidates
            .into_iter()
            .find(|entry| !validate || self.entry_is_intact(entry, destination))
            .map(|entry| CacheHit {
                entry,
                directory: self.directory.clone(),
            })
    }

    fn entry_is_intact(&self, entry: &CacheEntry, destination: Option<&Path>) -> bool {
        entry.files.iter().all(|file| {
            let cached = self.directory.join(&file.cache_file.path);
            if !file.cache_file.matches_file(&cached) {
                CacheValidationFailed {
                    file: &cached,
                    reason: "cached copy differs from the ledger",
                }
                .log();
                return false;
            }
            if let Some(destination) = destination {
                let restored = destination.join(&file.original_name);
                if restored.exists() && !file.cache_file.matches_file(&restored) {
                    CacheValidationFailed {
                        file: &restored,
                        reason: "output was modified after it was cached",
                    }
                    .log();
                    return false;
                }
            }
            true
        })
    }

    /// Copy `outputs` into the cache and append an entry for `source`.
    pub fn store(
        &self,
        source: &SourceInfo,
        outputs: &[PathBuf],
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
    ) -> Result<CacheEntry, CacheError> {
        let fingerprint = source.fingerprint();
        let prefix = source.argument_prefix(CACHE_PREFIX_MAX_LEN);

        let mut files = Vec::with_capacity(outputs.len());
        for output in outputs {
            if !output.exists() {
                return Err(CacheError::MissingOutput(output.clone()));
            }
            let original_name = output
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| CacheError::MissingOutput(output.clone()))?;
            let cache_name = self.unused_cache_name(&prefix, fingerprint, &original_name);
            let cached = self.directory.join(&cache_name);
            copy_into_place(output, &cached)?;
            files.push(CachedFile {
                cache_file: FileDependency::capture(&cached, cache_name)?,
                original_name,
            });
        }

        let entry = CacheEntry {
            timestamp_start: started,
            timestamp_end: finished,
            files,
            user_info: String::new(),
            source_info: source.clone(),
            stale: false,
        };

        let mut ledger = self.ledger.lock();
        let mut updated = ledger.clone();
        updated.entries.push(entry.clone());
        for file in &entry.files {
            if !updated.files.contains(&file.cache_file.path) {
                updated.files.push(file.cache_file.path.clone());
            }
        }
        self.persist(&updated)?;
        *ledger = updated;

        CacheEntryStored {
            processor_id: &source.processor_id,
            fingerprint,
            files: entry.files.len(),
            entries: ledger.entries.len(),
        }
        .log();
        Ok(entry)
    }

    /// Flag every entry matching `source` as stale. Returns how many changed.
    pub fn mark_stale(&self, source: &SourceInfo) -> Result<usize, CacheError> {
        let mut ledger = self.ledger.lock();
        let mut updated = ledger.clone();
        let mut changed = 0;
        for entry in updated.entries.iter_mut() {
            if !entry.stale && entry.source_info.matches(source) {
                entry.stale = true;
                changed += 1;
            }
        }
        if changed > 0 {
            self.persist(&updated)?;
            *ledger = updated;
        }
        Ok(changed)
    }

    /// `<prefix>_<fingerprint>_<name>`, with a counter after the fingerprint
    /// when an earlier entry already holds that name.
    fn unused_cache_name(&self, prefix: &str, fingerprint: u32, original_name: &str) -> String {
        let mut cache_name = format!("{}_{:08x}_{}", prefix, fingerprint, original_name);
        let mut counter = 1;
        while self.directory.join(&cache_name).exists() {
            cache_name = format!("{}_{:08x}_{}_{}", prefix, fingerprint, counter, original_name);
            counter += 1;
        }
        cache_name
    }

    fn persist(&self, ledger: &Ledger) -> Result<(), CacheError> {
        let json = serde_json::to_vec_pretty(ledger)?;
        write_atomic(&self.ledger_path, &json)?;
        Ok(())
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("directory", &self.directory)
            .field("entries", &self.len())
            .field("validate_hash", &self.validate_hash())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Configuration;
    use tempfile::TempDir;

    fn source(x: f64) -> SourceInfo {
        SourceInfo::new("stub", "p").with_arguments(&Configuration::new().with("x", x))
    }

    fn output(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn store_then_find_restores_outputs() {
        let cache_dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let cache = CacheManager::open(cache_dir.path()).unwrap();
        let out = output(work.path(), "result.txt", "hello");

        cache.store(&source(1.0), &[out], Utc::now(), Utc::now()).unwrap();
        assert_eq!(cache.len(), 1);

        let restore = TempDir::new().unwrap();
        let hit = cache.find_cache(&source(1.0), Some(restore.path())).unwrap();
        let restored = hit.restore_into(restore.path()).unwrap();
        assert_eq!(std::fs::read_to_string(&restored[0]).unwrap(), "hello");

        assert!(cache.find_cache(&source(2.0), None).is_none());
    }

    #[test]
    fn ledger_survives_reopen() {
        let cache_dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        {
            let cache = CacheManager::open(cache_dir.path()).unwrap();
            let out = output(work.path(), "a.txt", "a");
            cache.store(&source(1.0), &[out], Utc::now(), Utc::now()).unwrap();
        }
        let reopened = CacheManager::open(cache_dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.find_cache(&source(1.0), None).is_some());

        let ledger: serde_json::Value =
            serde_json::from_slice(&std::fs::read(reopened.ledger_path()).unwrap()).unwrap();
        assert_eq!(ledger["files"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn validation_rejects_modified_cache_file() {
        let cache_dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let cache = CacheManager::open(cache_dir.path()).unwrap();
        let out = output(work.path(), "a.txt", "original");
        let entry = cache.store(&source(1.0), &[out], Utc::now(), Utc::now()).unwrap();

        std::fs::write(cache_dir.path().join(&entry.files[0].cache_file.path), "tampered").unwrap();
        assert!(cache.find_cache(&source(1.0), None).is_none());

        cache.set_validate_hash(false);
        assert!(cache.find_cache(&source(1.0), None).is_some());
    }

    #[test]
    fn validation_rejects_modified_destination_file() {
        let cache_dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let cache = CacheManager::open(cache_dir.path()).unwrap();
        let out = output(work.path(), "a.txt", "original");
        cache.store(&source(1.0), &[out.clone()], Utc::now(), Utc::now()).unwrap();

        assert!(cache.find_cache(&source(1.0), Some(work.path())).is_some());
        std::fs::write(&out, "edited by hand").unwrap();
        assert!(cache.find_cache(&source(1.0), Some(work.path())).is_none());
    }

    #[test]
    fn missing_output_is_an_error() {
        let cache_dir = TempDir::new().unwrap();
        let cache = CacheManager::open(cache_dir.path()).unwrap();
        let missing = cache_dir.path().join("never_written.txt");
        let err = cache
            .store(&source(1.0), &[missing], Utc::now(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, CacheError::MissingOutput(_)));
        assert!(cache.is_empty());
    }

    #[test]
    fn stale_entries_are_skipped() {
        let cache_dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let cache = CacheManager::open(cache_dir.path()).unwrap();
        let out = output(work.path(), "a.txt", "a");
        cache.store(&source(1.0), &[out], Utc::now(), Utc::now()).unwrap();

        assert_eq!(cache.mark_stale(&source(1.0)).unwrap(), 1);
        assert!(cache.find_cache(&source(1.0), None).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn entries_differing_only_in_inputs_keep_their_own_outputs() {
        let cache_dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let cache = CacheManager::open(cache_dir.path()).unwrap();
        let input = output(work.path(), "input.txt", "v1");

        let first = source(1.0).with_input_files(&[input.clone()]);
        let out = output(work.path(), "result.txt", "output-for-v1");
        let first_entry = cache.store(&first, &[out], Utc::now(), Utc::now()).unwrap();

        std::fs::write(&input, "v2-longer").unwrap();
        let second = source(1.0).with_input_files(&[input]);
        assert_ne!(first.fingerprint(), second.fingerprint());
        let out = output(work.path(), "result.txt", "output-for-v2-longer");
        let second_entry = cache.store(&second, &[out], Utc::now(), Utc::now()).unwrap();

        assert_ne!(first_entry.files[0].cache_file.path, second_entry.files[0].cache_file.path);
        assert_eq!(cache.len(), 2);

        for validate in [true, false] {
            cache.set_validate_hash(validate);
            let restore = TempDir::new().unwrap();
            let hit = cache.find_cache(&first, None).unwrap();
            let restored = hit.restore_into(restore.path()).unwrap();
            assert_eq!(std::fs::read_to_string(&restored[0]).unwrap(), "output-for-v1");
        }
    }

    #[test]
    fn storing_the_same_run_twice_keeps_the_first_copy_intact() {
        let cache_dir = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let cache = CacheManager::open(cache_dir.path()).unwrap();

        let out = output(work.path(), "a.txt", "first");
        let first = cache.store(&source(1.0), &[out], Utc::now(), Utc::now()).unwrap();
        let out = output(work.path(), "a.txt", "second run");
        let second = cache.store(&source(1.0), &[out], Utc::now(), Utc::now()).unwrap();

        assert_ne!(first.files[0].cache_file.path, second.files[0].cache_file.path);
        let kept = cache_dir.path().join(&first.files[0].cache_file.path);
        assert!(first.files[0].cache_file.matches_file(&kept));
    }

    #[test]
    fn corrupt_ledger_is_reported() {
        let cache_dir = TempDir::new().unwrap();
        std::fs::write(cache_dir.path().join(CACHE_LEDGER_FILE), "[").unwrap();
        assert!(matches!(
            CacheManager::open(cache_dir.path()),
            Err(CacheError::CorruptLedger(_))
        ));
    }
}
