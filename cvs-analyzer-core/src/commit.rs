//! The commit-object taxonomy (§3, §4.5): the hand-off to the emission
//! phase. Pure data plus the rules for numbering and log-message
//! synthesis; no I/O.

use std::time::SystemTime;

use comma_v::Num;

use crate::ids::RevisionId;

const TOOL_NAME: &str = "cvs2svn";

/// A symbol name with transform-rule "already applied" escape markers
/// stripped, suitable for embedding in a synthesized log message.
fn clean_symbol_name(name: &str) -> String {
    name.trim_matches('\\').to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Tag,
    Branch,
}

impl SymbolKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Branch => "branch",
        }
    }
}

/// A single synthesized commit (§3). Either carries revisions or a
/// symbolic name, never both — enforced by construction, since each
/// variant only has room for one.
#[derive(Debug, Clone)]
pub enum Commit {
    InitialProjectCommit {
        revnum: u64,
        date: SystemTime,
    },
    PrimaryCommit {
        revnum: u64,
        cvs_revs: Vec<RevisionId>,
        date: SystemTime,
        log: String,
        author: String,
    },
    SymbolPreCommit {
        revnum: u64,
        symbolic_name: String,
        kind: SymbolKind,
        date: SystemTime,
    },
    SymbolCloseCommit {
        revnum: u64,
        symbolic_name: String,
        kind: SymbolKind,
        date: SystemTime,
    },
    DefaultBranchPostCommit {
        revnum: u64,
        motivating_revnum: Num,
        cvs_revs: Vec<RevisionId>,
        date: SystemTime,
    },
}

impl Commit {
    pub fn revnum(&self) -> u64 {
        match self {
            Self::InitialProjectCommit { revnum, .. }
            | Self::PrimaryCommit { revnum, .. }
            | Self::SymbolPreCommit { revnum, .. }
            | Self::SymbolCloseCommit { revnum, .. }
            | Self::DefaultBranchPostCommit { revnum, .. } => *revnum,
        }
    }

    pub fn date(&self) -> SystemTime {
        match self {
            Self::InitialProjectCommit { date, .. }
            | Self::PrimaryCommit { date, .. }
            | Self::SymbolPreCommit { date, .. }
            | Self::SymbolCloseCommit { date, .. }
            | Self::DefaultBranchPostCommit { date, .. } => *date,
        }
    }

    /// The user-visible log message for this commit, synthesizing one
    /// for every variant but `PrimaryCommit`, which carries the original
    /// CVS log message verbatim.
    pub fn log_message(&self) -> String {
        match self {
            Self::InitialProjectCommit { .. } => {
                "Standard project directories initialized by the migration tool.\n".to_string()
            }
            Self::PrimaryCommit { log, .. } => log.clone(),
            Self::SymbolPreCommit { symbolic_name, kind, .. }
            | Self::SymbolCloseCommit { symbolic_name, kind, .. } => {
                symbol_log_message(symbolic_name, *kind)
            }
            Self::DefaultBranchPostCommit { motivating_revnum, .. } => format!(
                "This commit was manufactured by {} to replicate changes made on a default branch in revision {}.\n",
                TOOL_NAME, motivating_revnum
            ),
        }
    }

    /// `{author, log, date}`. `author`/`log` arrive here already decoded
    /// by [`crate::config::Utf8Transcode`], which is what warns on
    /// invalid bytes at the point of decode; there's nothing left to
    /// check on an already-valid `String`.
    pub fn revprops(&self) -> (String, String, SystemTime) {
        let author = match self {
            Self::PrimaryCommit { author, .. } => author.clone(),
            _ => TOOL_NAME.to_string(),
        };
        let log = self.log_message();

        (author, log, self.date())
    }
}

fn symbol_log_message(name: &str, kind: SymbolKind) -> String {
    let cleaned = clean_symbol_name(name);
    let sep = if cleaned.len() < 13 { " " } else { "\n" };
    format!(
        "This commit was manufactured by {} to create {}{}'{}'.",
        TOOL_NAME,
        kind.as_str(),
        sep,
        cleaned
    )
}

/// Hands out commit revnums: 1 is reserved for the initial commit,
/// every subsequent commit draws from a shared counter starting at 2.
#[derive(Debug)]
pub struct RevnumAllocator {
    next: u64,
}

impl Default for RevnumAllocator {
    fn default() -> Self {
        Self { next: 2 }
    }
}

impl RevnumAllocator {
    pub fn initial() -> u64 {
        1
    }

    pub fn next(&mut self) -> u64 {
        let revnum = self.next;
        self.next += 1;
        revnum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ts() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_000)
    }

    #[test]
    fn initial_commit_is_revnum_one() {
        assert_eq!(RevnumAllocator::initial(), 1);
    }

    #[test]
    fn allocator_starts_at_two_and_increments() {
        let mut alloc = RevnumAllocator::default();
        assert_eq!(alloc.next(), 2);
        assert_eq!(alloc.next(), 3);
        assert_eq!(alloc.next(), 4);
    }

    #[test]
    fn short_symbol_name_gets_space_separator() {
        let commit = Commit::SymbolPreCommit {
            revnum: 2,
            symbolic_name: "REL_1_0".to_string(),
            kind: SymbolKind::Tag,
            date: ts(),
        };
        assert_eq!(
            commit.log_message(),
            "This commit was manufactured by cvs2svn to create tag 'REL_1_0'."
        );
    }

    #[test]
    fn long_symbol_name_gets_newline_separator() {
        let commit = Commit::SymbolCloseCommit {
            revnum: 3,
            symbolic_name: "a-rather-long-branch-name".to_string(),
            kind: SymbolKind::Branch,
            date: ts(),
        };
        assert_eq!(
            commit.log_message(),
            "This commit was manufactured by cvs2svn to create branch\n'a-rather-long-branch-name'."
        );
    }

    #[test]
    fn symbol_cleaning_strips_escape_markers() {
        let commit = Commit::SymbolPreCommit {
            revnum: 2,
            symbolic_name: "\\REL_1_0\\".to_string(),
            kind: SymbolKind::Tag,
            date: ts(),
        };
        assert_eq!(
            commit.log_message(),
            "This commit was manufactured by cvs2svn to create tag 'REL_1_0'."
        );
    }

    #[test]
    fn primary_commit_uses_its_own_log_and_author() {
        let commit = Commit::PrimaryCommit {
            revnum: 2,
            cvs_revs: vec![0, 1],
            date: ts(),
            log: "fix the thing\n".to_string(),
            author: "alice".to_string(),
        };
        let (author, log, _) = commit.revprops();
        assert_eq!(author, "alice");
        assert_eq!(log, "fix the thing\n");
    }
}
