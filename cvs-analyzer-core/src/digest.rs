//! Content digests used to key metadata-store lookups and to identify
//! resynced revisions in the resync log, independent of their (mutable)
//! timestamp.

use std::fmt;

/// A blake3 digest over a revision's log message and author, joined by a
/// NUL byte. Two revisions with the same digest were almost certainly
/// the same CVS commit split across files by the original tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn of_commit(log_message: &str, author: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(log_message.as_bytes());
        hasher.update(b"\0");
        hasher.update(author.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_digest() {
        let a = Digest::of_commit("fix the thing", "alice");
        let b = Digest::of_commit("fix the thing", "alice");
        assert_eq!(a, b);
    }

    #[test]
    fn different_author_different_digest() {
        let a = Digest::of_commit("fix the thing", "alice");
        let b = Digest::of_commit("fix the thing", "bob");
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_hex() {
        let d = Digest::of_commit("x", "y");
        assert_eq!(d.to_string().len(), 64);
        assert!(d.to_string().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
