use std::path::{Path, PathBuf};

use comma_v::Num;

pub type FileId = usize;

/// The expansion mode an RCS archive declares for keyword substitution
/// (`$Id$` and friends). Filled in late, from the archive's `expand`
/// header, before the file's first revision is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionMode {
    Default,
    Binary,
    Kv,
    KvAndLocker,
    Oldlog,
    Value,
}

impl ExpansionMode {
    pub fn from_header(raw: &[u8]) -> Self {
        match raw {
            b"b" => Self::Binary,
            b"k" => Self::Kv,
            b"kv" => Self::Kv,
            b"kvl" => Self::KvAndLocker,
            b"o" => Self::Oldlog,
            b"v" => Self::Value,
            _ => Self::Default,
        }
    }
}

/// A single file contributed to the migration.
///
/// `canonical_path` is the path the emitted repository will use;
/// `in_attic` says whether the source file was physically in the Attic
/// subdirectory. It is a fatal error (see [`crate::collector::Error`])
/// for the same canonical path to be contributed by two distinct source
/// files (an attic copy and a non-attic copy of the same logical file).
#[derive(Debug, Clone)]
pub struct CVSFile {
    pub id: FileId,
    pub filesystem_path: PathBuf,
    pub canonical_path: PathBuf,
    pub repository_path: PathBuf,
    pub in_attic: bool,
    pub executable: bool,
    pub size: u64,
    pub mode: Option<ExpansionMode>,
    /// The highest vendor-branch-head revision (`1.1.1.N`) seen on this
    /// file, used by the default-branch rewriter downstream.
    pub max_vendor_branch_head: Option<Num>,
}

impl CVSFile {
    /// Computes the canonical path and in-attic flag without
    /// constructing a file, so callers can check for canonical-path
    /// collisions before allocating a file id.
    pub fn canonical_of(path: &Path) -> (PathBuf, bool) {
        canonicalize(path)
    }

    pub fn new(
        id: FileId,
        filesystem_path: &Path,
        repository_path: &Path,
        executable: bool,
        size: u64,
    ) -> Self {
        let (canonical_path, in_attic) = canonicalize(filesystem_path);

        Self {
            id,
            filesystem_path: filesystem_path.to_path_buf(),
            canonical_path,
            repository_path: repository_path.to_path_buf(),
            in_attic,
            executable,
            size,
            mode: None,
            max_vendor_branch_head: None,
        }
    }

    /// Sets the expansion mode exactly once. Calling this twice is a
    /// programmer error: the archive header is only read once, before
    /// any revision is processed.
    pub fn set_expansion(&mut self, mode: ExpansionMode) {
        assert!(self.mode.is_none(), "expansion mode set twice for {:?}", self.canonical_path);
        self.mode = Some(mode);
    }
}

/// Strips a trailing `Attic` path component, returning the canonical
/// path and whether one was present.
fn canonicalize(path: &Path) -> (PathBuf, bool) {
    let mut components: Vec<_> = path.components().collect();

    if let Some(pos) = components
        .iter()
        .position(|c| c.as_os_str() == "Attic")
    {
        components.remove(pos);
        (components.iter().collect(), true)
    } else {
        (path.to_path_buf(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_attic_component() {
        let file = CVSFile::new(
            1,
            Path::new("proj/Attic/foo.c,v"),
            Path::new("proj/foo.c"),
            false,
            0,
        );

        assert_eq!(file.canonical_path, Path::new("proj/foo.c,v"));
        assert!(file.in_attic);
    }

    #[test]
    fn preserves_non_attic_path() {
        let file = CVSFile::new(1, Path::new("proj/foo.c,v"), Path::new("proj/foo.c"), false, 0);

        assert_eq!(file.canonical_path, Path::new("proj/foo.c,v"));
        assert!(!file.in_attic);
    }

    #[test]
    fn executable_bit_is_preserved() {
        let file = CVSFile::new(1, Path::new("attr-exec,v"), Path::new("attr-exec"), true, 0);
        assert!(file.executable);
    }

    #[test]
    fn expansion_mode_set_once() {
        let mut file = CVSFile::new(1, Path::new("foo,v"), Path::new("foo"), false, 0);
        file.set_expansion(ExpansionMode::Kv);
        assert_eq!(file.mode, Some(ExpansionMode::Kv));
    }

    #[test]
    #[should_panic(expected = "expansion mode set twice")]
    fn expansion_mode_cannot_be_set_twice() {
        let mut file = CVSFile::new(1, Path::new("foo,v"), Path::new("foo"), false, 0);
        file.set_expansion(ExpansionMode::Kv);
        file.set_expansion(ExpansionMode::Kv);
    }
}
