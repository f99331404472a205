//! Concrete artifact sinks (§6, "Artifact files"). The core never writes
//! these itself; a front end drives one [`ArtifactSink`] across a
//! finished [`cvs_analyzer_core::GlobalCollector`] once the analysis
//! pass completes, since all of the DBs are logically immutable until
//! then.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use cvs_analyzer_core::{
    digest::Digest,
    file::CVSFile,
    revision::{CVSRevision, ResyncLogLine},
    symbol::SymbolStats,
    GlobalCollector,
};

use crate::{connection::Connection, error::Error};

mod embedded {
    refinery::embed_migrations!("./migrations");
}

/// The destination for every artifact the analysis core produces.
/// Implemented once as [`SqliteSink`]; kept as a trait so a front end
/// (or a test) can substitute an in-memory recorder.
pub trait ArtifactSink {
    fn write_file(&mut self, file: &CVSFile) -> Result<(), Error>;
    fn write_revision(&mut self, revision: &CVSRevision) -> Result<(), Error>;
    fn write_resync_line(&mut self, line: &ResyncLogLine) -> Result<(), Error>;
    fn write_metadata(&mut self, digest: Digest, author: &str, log_message: &str) -> Result<(), Error>;
    fn write_symbol_stats(&mut self, stats: &SymbolStats) -> Result<(), Error>;
    fn finalize(&mut self) -> Result<(), Error>;
}

/// The reference [`ArtifactSink`]: the four keyed artifacts (revision,
/// file, metadata and symbol DBs) go into one SQLite database migrated
/// with [`refinery`]; the two append-only logs go to plain text files,
/// exactly as §6 specifies their format.
pub struct SqliteSink {
    conn: Connection,
    resync_log: BufWriter<File>,
    all_revisions_log: BufWriter<File>,
}

impl SqliteSink {
    /// Opens (creating if necessary) the SQLite database at `db_path`
    /// and runs pending migrations, and truncates the two text log
    /// files at `resync_log_path`/`all_revisions_log_path`.
    pub fn new(
        db_path: impl AsRef<Path>,
        resync_log_path: impl AsRef<Path>,
        all_revisions_log_path: impl AsRef<Path>,
    ) -> Result<Self, Error> {
        let mut raw = rusqlite::Connection::open(db_path)?;
        embedded::migrations::runner().run(&mut raw)?;

        Ok(Self {
            conn: Connection::new(raw),
            resync_log: BufWriter::new(File::create(resync_log_path)?),
            all_revisions_log: BufWriter::new(File::create(all_revisions_log_path)?),
        })
    }
}

impl ArtifactSink for SqliteSink {
    fn write_file(&mut self, file: &CVSFile) -> Result<(), Error> {
        self.conn.insert_file(file)
    }

    fn write_revision(&mut self, revision: &CVSRevision) -> Result<(), Error> {
        self.conn.insert_revision(revision)?;
        writeln!(self.all_revisions_log, "{:x}", revision.id)?;
        Ok(())
    }

    fn write_resync_line(&mut self, line: &ResyncLogLine) -> Result<(), Error> {
        let original = line
            .original_timestamp
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let adjusted = line
            .adjusted_timestamp
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        writeln!(self.resync_log, "{:08x} {} {:08x}", original, line.digest, adjusted)?;
        Ok(())
    }

    fn write_metadata(&mut self, digest: Digest, author: &str, log_message: &str) -> Result<(), Error> {
        self.conn.insert_metadata(digest, author, log_message)
    }

    fn write_symbol_stats(&mut self, stats: &SymbolStats) -> Result<(), Error> {
        self.conn.insert_symbol_stats(stats)
    }

    fn finalize(&mut self) -> Result<(), Error> {
        self.resync_log.flush()?;
        self.all_revisions_log.flush()?;
        Ok(())
    }
}

/// Drains a finished [`GlobalCollector`] into `sink`, in the order §6
/// prescribes: files, then revisions in `add_cvs_revision` order (so
/// the all-revisions log lines up with it), then the resync log,
/// metadata and symbol statistics.
pub fn write_collector(sink: &mut dyn ArtifactSink, collector: &GlobalCollector) -> Result<(), Error> {
    for file in collector.files() {
        sink.write_file(file)?;
    }

    for &id in collector.all_revisions_log() {
        let revision = collector
            .revision(id)
            .expect("all_revisions_log only ever references committed revisions");
        sink.write_revision(revision)?;
    }

    for line in collector.resync_log() {
        sink.write_resync_line(line)?;
    }

    for (digest, (author, log_message)) in collector.metadata() {
        sink.write_metadata(*digest, author, log_message)?;
    }

    sink.write_symbol_stats(collector.symbol_stats())?;

    sink.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    use cvs_analyzer_core::{config::Config, revision::PerFileAnalyzer, symbol::SymbolStats};

    #[test]
    fn writes_a_file_and_its_revisions_through_a_collector() {
        let dir = tempdir().unwrap();
        let mut sink = SqliteSink::new(
            dir.path().join("store.db"),
            dir.path().join("resync.log"),
            dir.path().join("all-revisions.log"),
        )
        .unwrap();

        let config = Config::default();
        let mut stats = SymbolStats::default();
        let file = CVSFile::new(0, Path::new("proj/foo.c,v"), Path::new("proj/foo.c"), false, 0);
        let analyzer = PerFileAnalyzer::new(&config, &mut stats, file);
        let (file, revisions, resync, metadata) = analyzer.finish();

        let mut collector = GlobalCollector::new(config);
        collector.commit_file(file, revisions, resync, metadata);

        write_collector(&mut sink, &collector).unwrap();

        assert!(dir.path().join("store.db").exists());
        assert!(dir.path().join("all-revisions.log").exists());
    }
}
