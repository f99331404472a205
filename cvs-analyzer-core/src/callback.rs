//! Drives a parsed [`comma_v::File`] through a [`PerFileAnalyzer`] in the
//! callback order the archive-parser protocol mandates (§4.3, §5):
//! `set_principal_branch`, `set_expansion`, every `define_tag`, every
//! `define_revision`, `tree_completed`, every `set_revision_info`,
//! `parse_completed`. [`comma_v`] is kept as a complete, already-parsed
//! `File` rather than a true push parser, so this module plays the part
//! of the archive parser: it owns the ordering decisions the real
//! parser would otherwise make as it streamed events.

use std::path::Path;

use thiserror::Error;

use crate::{
    collector::{self, GlobalCollector},
    file::{ExpansionMode, FileId},
    revision::{self, PerFileAnalyzer},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Collector(#[from] collector::Error),
    #[error(transparent)]
    Revision(#[from] revision::Error),
}

/// Analyzes one archive file end to end and commits its output to
/// `collector`. On any structural error, nothing from this file is
/// committed and the error is recorded in `collector`'s fatal-error
/// list before being returned.
pub fn analyze_file(
    collector: &mut GlobalCollector,
    filesystem_path: &Path,
    repository_path: &Path,
    executable: bool,
    size: u64,
    archive: &comma_v::File,
) -> Result<FileId, Error> {
    let file = collector.begin_file(filesystem_path, repository_path, executable, size)?;

    let outcome = (|| -> Result<_, Error> {
        let mut analyzer = PerFileAnalyzer::new(&collector.config, &mut collector.symbol_stats, file);

        drive_tree(&mut analyzer, archive)?;
        analyzer.tree_completed()?;
        analyzer.reserve_ids(&mut collector.revision_ids);
        drive_revision_info(&mut analyzer, archive)?;

        Ok(analyzer.finish())
    })();

    match outcome {
        Ok((file, revisions, resync, metadata)) => {
            let file_id = file.id;
            collector.commit_file(file, revisions, resync, metadata);
            Ok(file_id)
        }
        Err(err) => {
            collector.record_fatal(filesystem_path, err.to_string());
            Err(err)
        }
    }
}

fn drive_tree(analyzer: &mut PerFileAnalyzer, archive: &comma_v::File) -> Result<(), Error> {
    if let Some(branch) = &archive.admin.branch {
        analyzer.set_principal_branch(branch);
    }

    let mode = archive
        .admin
        .expand
        .as_ref()
        .map(|raw| ExpansionMode::from_header(&raw.0))
        .unwrap_or(ExpansionMode::Default);
    analyzer.set_expansion(mode);

    for (sym, revnum) in &archive.admin.symbols {
        let name = analyzer.config().to_utf8.decode(&sym.0, "symbol name");
        analyzer.define_tag(&name, &revnum.to_string())?;
    }

    for (revnum, delta) in &archive.delta {
        let author = analyzer.config().to_utf8.decode(&delta.author.0, "revision author");
        let state = delta
            .state
            .as_ref()
            .map(|s| String::from_utf8_lossy(&s.0).into_owned())
            .unwrap_or_else(|| "Exp".to_string());

        analyzer.define_revision(
            revnum,
            delta.date,
            &author,
            &state,
            &delta.branches,
            delta.next.as_ref(),
        )?;
    }

    Ok(())
}

fn drive_revision_info(analyzer: &mut PerFileAnalyzer, archive: &comma_v::File) -> Result<(), Error> {
    for revnum in analyzer.revision_numbers() {
        match archive.delta_text.get(&revnum) {
            Some(delta_text) => {
                let log = analyzer.config().to_utf8.decode(&delta_text.log.0, "log message");
                analyzer.set_revision_info(&revnum, &log, &delta_text.text.0)?;
            }
            None => {
                log::warn!("revision {} has no associated delta text; skipping", revnum);
            }
        }
    }

    Ok(())
}
