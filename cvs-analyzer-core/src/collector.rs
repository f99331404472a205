//! The global collector (§4.4): owns every artifact produced across a
//! batch of archives — the file and revision tables, the symbol
//! statistics store, the resync log, the metadata store, id generators
//! and the fatal-error list. Per-file analyzers never touch these
//! directly; they hand back finished data through [`GlobalCollector::commit_file`].

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{
    config::Config,
    digest::Digest,
    file::{CVSFile, FileId},
    ids::{self, RevisionId},
    revision::{CVSRevision, ResyncLogLine},
    symbol::SymbolStats,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0:?} and an Attic copy of it both contribute the same canonical path")]
    DuplicateCanonicalPath(PathBuf),
}

/// One entry in the append-only fatal-error list (§4.4, §7). Recovery
/// happens at file granularity: the batch continues past these.
#[derive(Debug, Clone)]
pub struct FatalError {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Stats {
    pub files_processed: usize,
    pub revisions_processed: usize,
}

pub struct GlobalCollector {
    pub(crate) config: Config,
    pub(crate) symbol_stats: SymbolStats,
    pub(crate) revision_ids: ids::Counter,
    next_file_id: FileId,
    canonical_paths: HashMap<PathBuf, bool>,
    files: HashMap<FileId, CVSFile>,
    revisions: HashMap<RevisionId, CVSRevision>,
    all_revisions_log: Vec<RevisionId>,
    metadata: HashMap<Digest, (String, String)>,
    resync_log: Vec<ResyncLogLine>,
    fatal_errors: Vec<FatalError>,
    stats: Stats,
}

impl GlobalCollector {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            symbol_stats: SymbolStats::default(),
            revision_ids: ids::Counter::default(),
            next_file_id: 0,
            canonical_paths: HashMap::new(),
            files: HashMap::new(),
            revisions: HashMap::new(),
            all_revisions_log: Vec::new(),
            metadata: HashMap::new(),
            resync_log: Vec::new(),
            fatal_errors: Vec::new(),
            stats: Stats::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn symbol_stats(&self) -> &SymbolStats {
        &self.symbol_stats
    }

    pub fn fatal_errors(&self) -> &[FatalError] {
        &self.fatal_errors
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn files(&self) -> impl Iterator<Item = &CVSFile> {
        self.files.values()
    }

    pub fn revision(&self, id: RevisionId) -> Option<&CVSRevision> {
        self.revisions.get(&id)
    }

    pub fn all_revisions_log(&self) -> &[RevisionId] {
        &self.all_revisions_log
    }

    pub fn metadata(&self) -> &HashMap<Digest, (String, String)> {
        &self.metadata
    }

    pub fn resync_log(&self) -> &[ResyncLogLine] {
        &self.resync_log
    }

    pub fn record_fatal(&mut self, path: &Path, message: impl Into<String>) {
        let message = message.into();
        log::error!("{}: {}", path.display(), message);
        self.fatal_errors.push(FatalError { path: path.to_path_buf(), message });
    }

    /// Begins analysis of one archive file, rejecting it up front if an
    /// Attic copy and a non-Attic copy would both claim the same
    /// canonical path. Returns the bare `CVSFile` rather than a
    /// `PerFileAnalyzer` borrowing from `self`, so the caller can still
    /// reach `self.symbol_stats`/`self.revision_ids` directly afterwards
    /// (see `callback::analyze_file`).
    pub fn begin_file(
        &mut self,
        filesystem_path: &Path,
        repository_path: &Path,
        executable: bool,
        size: u64,
    ) -> Result<CVSFile, Error> {
        let (canonical_path, in_attic) = CVSFile::canonical_of(filesystem_path);

        if let Some(&existing_in_attic) = self.canonical_paths.get(&canonical_path) {
            if existing_in_attic != in_attic {
                let err = Error::DuplicateCanonicalPath(canonical_path.clone());
                self.record_fatal(filesystem_path, err.to_string());
                return Err(err);
            }
        }
        self.canonical_paths.insert(canonical_path, in_attic);

        let id = self.next_file_id;
        self.next_file_id += 1;

        Ok(CVSFile::new(id, filesystem_path, repository_path, executable, size))
    }

    /// Commits a fully-analyzed file's output. Call only once the
    /// per-file analyzer finished without error; a file that failed
    /// partway should simply be dropped, so nothing from it reaches the
    /// artifact stores (§7).
    pub fn commit_file(
        &mut self,
        file: CVSFile,
        revisions: Vec<CVSRevision>,
        resync_lines: Vec<ResyncLogLine>,
        metadata: Vec<(Digest, String, String)>,
    ) {
        self.files.insert(file.id, file);

        for (digest, author, log) in metadata {
            self.metadata.entry(digest).or_insert((author, log));
        }

        for revision in revisions {
            self.add_cvs_revision(revision);
        }

        self.resync_log.extend(resync_lines);
        self.stats.files_processed += 1;
    }

    fn add_cvs_revision(&mut self, revision: CVSRevision) {
        self.all_revisions_log.push(revision.id);
        self.stats.revisions_processed += 1;
        self.revisions.insert(revision.id, revision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn duplicate_attic_and_non_attic_path_is_rejected() {
        let mut collector = GlobalCollector::new(Config::default());

        collector
            .begin_file(Path::new("proj/foo.c,v"), Path::new("proj/foo.c"), false, 0)
            .unwrap();

        let err = collector
            .begin_file(Path::new("proj/Attic/foo.c,v"), Path::new("proj/foo.c"), false, 0)
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateCanonicalPath(_)));
        assert_eq!(collector.fatal_errors().len(), 1);
    }

    #[test]
    fn same_path_twice_is_not_a_duplicate() {
        let mut collector = GlobalCollector::new(Config::default());

        collector
            .begin_file(Path::new("proj/foo.c,v"), Path::new("proj/foo.c"), false, 0)
            .unwrap();

        let second = collector.begin_file(Path::new("proj/foo.c,v"), Path::new("proj/foo.c"), false, 0);
        assert!(second.is_ok());
    }

    #[test]
    fn commit_file_updates_stats_and_tables() {
        let mut collector = GlobalCollector::new(Config::default());
        let file = collector
            .begin_file(Path::new("proj/foo.c,v"), Path::new("proj/foo.c"), false, 0)
            .unwrap();

        let analyzer = crate::revision::PerFileAnalyzer::new(&collector.config, &mut collector.symbol_stats, file);
        let (file, revisions, resync, metadata) = analyzer.finish();

        collector.commit_file(file, revisions, resync, metadata);

        assert_eq!(collector.stats().files_processed, 1);
        assert_eq!(collector.files().count(), 1);
    }
}
