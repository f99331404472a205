//! Pure functions over revision numbers.
//!
//! These operate on [`comma_v::Num`], which already normalizes away
//! interposed zero segments (`1.3.0.2` parses to the same value as
//! `1.3.2`) and classifies a number as `Branch` or `Commit` by the parity
//! of its component count. Everything here assumes a well-formed `Num`;
//! there is no such thing as a malformed one once it has been parsed.

use comma_v::Num;

/// True iff `r` is a trunk revision: exactly two components.
pub fn is_trunk(r: &Num) -> bool {
    match r {
        Num::Commit(parts) => parts.len() == 2,
        Num::Branch(_) => false,
    }
}

/// True iff `r` identifies a commit on a branch: an even-length number
/// with at least four components.
pub fn is_branch_revision(r: &Num) -> bool {
    match r {
        Num::Commit(parts) => parts.len() >= 4,
        Num::Branch(_) => false,
    }
}

/// True iff `b` is a branch number: odd-length, at least three
/// components.
pub fn is_branch_number(b: &Num) -> bool {
    matches!(b, Num::Branch(parts) if parts.len() >= 3)
}

/// True iff `r` matches the vendor-branch pattern `1.1.1.N`.
pub fn is_vendor_branch_revision(r: &Num) -> bool {
    matches!(r, Num::Commit(parts) if parts.len() == 4 && parts[0] == 1 && parts[1] == 1 && parts[2] == 1)
}

/// True iff `a` and `b` are on the same line of development: both trunk,
/// or sharing the same prefix up to (and excluding) the last component.
pub fn same_line_of_development(a: Option<&Num>, b: Option<&Num>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => match (a, b) {
            (Num::Commit(a), Num::Commit(b)) if a.len() == 2 && b.len() == 2 => true,
            (Num::Commit(a), Num::Commit(b)) if a.len() == b.len() => {
                a[..a.len() - 1] == b[..b.len() - 1]
            }
            _ => false,
        },
        _ => false,
    }
}

/// For a branch revision, the branch number it lives on: the revision's
/// components with the last one dropped.
pub fn branch_number_of(r: &Num) -> Option<Num> {
    match r {
        Num::Commit(parts) if parts.len() >= 4 => {
            Some(Num::Branch(parts[..parts.len() - 1].to_vec()))
        }
        _ => None,
    }
}

/// The parent revision of a branch number: the branch number with its
/// last component removed (`1.3.2` -> `1.3`).
pub fn parent_of_branch_number(b: &Num) -> Option<Num> {
    match b {
        Num::Branch(parts) if parts.len() >= 3 => {
            let parent = &parts[..parts.len() - 1];
            Some(if parent.len() % 2 == 0 {
                Num::Commit(parent.to_vec())
            } else {
                Num::Branch(parent.to_vec())
            })
        }
        _ => None,
    }
}

/// If `s` is of the form `P.0.N` (a single interposed zero segment),
/// rewrite it to `P.N`; otherwise return it unchanged. This mirrors what
/// [`comma_v::Num::from_str`] does internally, but is exposed separately
/// for symbol-header revnums, which are classified as raw strings before
/// they're known to be well-formed branch numbers.
pub fn normalize_branch_number(s: &str) -> String {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() >= 3 {
        if let Some(zero_pos) = parts.iter().rposition(|p| *p == "0") {
            if zero_pos + 1 < parts.len() {
                let mut rewritten = parts.clone();
                rewritten.remove(zero_pos);
                return rewritten.join(".");
            }
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn num(s: &str) -> Num {
        Num::from_str(s).unwrap()
    }

    #[test]
    fn trunk() {
        assert!(is_trunk(&num("1.3")));
        assert!(!is_trunk(&num("1.3.2.1")));
        assert!(!is_trunk(&num("1.3.2")));
    }

    #[test]
    fn branch_revision() {
        assert!(is_branch_revision(&num("1.3.2.1")));
        assert!(!is_branch_revision(&num("1.3")));
        assert!(!is_branch_revision(&num("1.3.2")));
    }

    #[test]
    fn branch_number() {
        assert!(is_branch_number(&num("1.3.2")));
        assert!(!is_branch_number(&num("1.3")));
    }

    #[test]
    fn vendor_branch() {
        assert!(is_vendor_branch_revision(&num("1.1.1.1")));
        assert!(is_vendor_branch_revision(&num("1.1.1.2")));
        assert!(!is_vendor_branch_revision(&num("1.1.2.1")));
        assert!(!is_vendor_branch_revision(&num("1.2")));
    }

    #[test]
    fn same_lod() {
        assert!(same_line_of_development(Some(&num("1.3")), Some(&num("1.4"))));
        assert!(same_line_of_development(
            Some(&num("1.3.2.1")),
            Some(&num("1.3.2.2"))
        ));
        assert!(!same_line_of_development(Some(&num("1.3")), Some(&num("1.3.2.1"))));
        assert!(!same_line_of_development(None, Some(&num("1.3"))));
    }

    #[test]
    fn branch_number_of_commit() {
        assert_eq!(branch_number_of(&num("1.3.2.1")).unwrap(), num("1.3.2"));
        assert_eq!(branch_number_of(&num("1.3")), None);
    }

    #[test]
    fn parent_of_branch() {
        assert_eq!(parent_of_branch_number(&num("1.3.2")).unwrap(), num("1.3"));
    }

    #[test]
    fn normalize_interposed_zero() {
        // comma_v::Num already strips the interposed zero at parse time.
        assert_eq!(num("1.3.0.2"), num("1.3.2"));
    }

    #[test]
    fn normalize_branch_number_string() {
        assert_eq!(normalize_branch_number("1.3.0.2"), "1.3.2");
        assert_eq!(normalize_branch_number("1.3.2"), "1.3.2");
        assert_eq!(normalize_branch_number("1.3"), "1.3");
    }
}
