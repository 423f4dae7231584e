// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Cache ledger file name inside the cache directory
pub const CACHE_LEDGER_FILE: &str = "tinc_cache.json";
/// Ledger format version written into new ledgers
pub const CACHE_LEDGER_VERSION: u32 = 1;
/// Longest argument prefix used in cached file names
pub const CACHE_PREFIX_MAX_LEN: usize = 64;

/// Version tag written into per-run metadata sidecars
pub const RUN_METADATA_VERSION: u32 = 1;

/// Default port for the synchronization server
pub const DEFAULT_PORT: u16 = 7400;
/// Default time a barrier waits for every participant (milliseconds)
pub const DEFAULT_BARRIER_TIMEOUT_MS: u64 = 30_000;
/// Interval at which a waiting barrier re-checks its state (milliseconds)
pub const BARRIER_POLL_INTERVAL_MS: u64 = 10;
/// Default time a COMMAND waits for its reply (milliseconds)
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 60_000;
/// Largest accepted wire frame (64 MiB) - frames above this are discarded
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Default number of sweep worker threads
pub const DEFAULT_SWEEP_THREADS: usize = 1;

/// Default time an external program may run before it is killed (milliseconds)
pub const DEFAULT_PROGRAM_TIMEOUT_MS: u64 = 3_600_000;
