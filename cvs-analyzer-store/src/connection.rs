use rusqlite::params;

use cvs_analyzer_core::{
    digest::Digest,
    file::CVSFile,
    revision::{CVSRevision, LineOfDevelopment, Operation, ResyncLogLine},
    symbol::SymbolStats,
};

use crate::{error::Error, sql};

fn operation_str(operation: Operation) -> &'static str {
    match operation {
        Operation::Add => "add",
        Operation::Change => "change",
        Operation::Delete => "delete",
    }
}

/// A single connection to a store database, wrapping the insert
/// statements for every artifact table named in the configuration
/// (§6, "Artifact files"). The resync log and all-revisions log are
/// plain text files, not tables here; see [`crate::sink::SqliteSink`].
#[derive(Debug)]
pub(crate) struct Connection {
    conn: rusqlite::Connection,
}

impl Connection {
    pub(crate) fn new(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub(crate) fn insert_file(&mut self, file: &CVSFile) -> Result<(), Error> {
        self.conn
            .prepare_cached(
                "
                INSERT INTO
                    files
                (id, filesystem_path, canonical_path, repository_path, in_attic, executable, size, expansion_mode, max_vendor_branch_head)
                VALUES
                (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?
            .execute(params![
                file.id,
                sql::os_str(file.filesystem_path.as_os_str()),
                sql::os_str(file.canonical_path.as_os_str()),
                sql::os_str(file.repository_path.as_os_str()),
                file.in_attic,
                file.executable,
                file.size,
                sql::expansion_mode(file.mode),
                file.max_vendor_branch_head.as_ref().map(ToString::to_string),
            ])?;

        Ok(())
    }

    pub(crate) fn insert_revision(&mut self, revision: &CVSRevision) -> Result<(), Error> {
        let (lod_kind, lod_branch) = match &revision.lod {
            LineOfDevelopment::Trunk => ("trunk", None),
            LineOfDevelopment::Branch(name) => ("branch", Some(name.as_str())),
        };

        self.conn
            .prepare_cached(
                "
                INSERT INTO
                    revisions
                (id, file_id, revision, timestamp, digest, author, parent, child, operation, has_deltatext, lod_kind, lod_branch, is_first_on_branch)
                VALUES
                (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?
            .execute(params![
                revision.id,
                revision.file_id,
                revision.revision.to_string(),
                sql::time(&revision.timestamp),
                revision.digest.to_string(),
                revision.author,
                revision.parent,
                revision.child,
                operation_str(revision.operation),
                revision.has_deltatext,
                lod_kind,
                lod_branch,
                revision.is_first_on_branch,
            ])?;

        let mut tag_stmt = self
            .conn
            .prepare_cached("INSERT INTO revision_tags (revision_id, tag) VALUES (?, ?)")?;
        for tag in &revision.tag_names {
            tag_stmt.execute(params![revision.id, tag])?;
        }

        let mut branch_stmt = self
            .conn
            .prepare_cached("INSERT INTO revision_branches (revision_id, branch) VALUES (?, ?)")?;
        for branch in &revision.branch_names {
            branch_stmt.execute(params![revision.id, branch])?;
        }

        Ok(())
    }

    pub(crate) fn insert_metadata(&mut self, digest: Digest, author: &str, log_message: &str) -> Result<(), Error> {
        self.conn
            .prepare_cached("INSERT OR IGNORE INTO metadata (digest, author, log_message) VALUES (?, ?, ?)")?
            .execute(params![digest.to_string(), author, log_message])?;

        Ok(())
    }

    pub(crate) fn insert_symbol_stats(&mut self, stats: &SymbolStats) -> Result<(), Error> {
        let mut count_stmt = self.conn.prepare_cached(
            "INSERT INTO symbol_counts (name, branch_creations, branch_commits, tag_creations) VALUES (?, ?, ?, ?)",
        )?;
        for name in stats.symbol_names() {
            let counts = stats.counts_for(name);
            count_stmt.execute(params![
                name,
                counts.branch_creations,
                counts.branch_commits,
                counts.tag_creations,
            ])?;
        }

        let mut blocker_stmt = self
            .conn
            .prepare_cached("INSERT INTO symbol_blockers (branch, blocking_symbol) VALUES (?, ?)")?;
        for (branch, blocking_symbol) in stats.blockers() {
            blocker_stmt.execute(params![branch, blocking_symbol])?;
        }

        Ok(())
    }
}
