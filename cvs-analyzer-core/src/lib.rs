//! The CVS-to-modern-VCS migration analysis core.
//!
//! This crate is the "hard core" of the migration: it turns per-file
//! revision DAGs, as read from legacy `",v"` archives, into a coherent
//! global model — a revision graph per file with repaired parent/child
//! links, resynced timestamps, classified operations, collected symbols
//! and a small taxonomy of commit objects ready for an emission phase
//! this crate does not implement.
//!
//! [`callback::analyze_file`] is the entry point: it drives one parsed
//! [`comma_v::File`] through a [`revision::PerFileAnalyzer`] and commits
//! the result into a [`collector::GlobalCollector`] shared across a
//! batch of archives.

pub mod callback;
pub mod collector;
pub mod commit;
pub mod config;
pub mod digest;
pub mod file;
pub mod ids;
pub mod revision;
pub mod revnum;
pub mod symbol;

pub use collector::GlobalCollector;
pub use config::Config;
