//! Line-based diff between two versions.
//!
//! Hunks come from a longest-common-subsequence alignment of the two line
//! sequences after trimming their common prefix and suffix. A run of
//! consecutive non-matching lines becomes a single hunk: `Replace` when it
//! both removes and adds lines, `Delete` or `Insert` otherwise. Identical
//! content yields no hunks; content with no line in common yields exactly one
//! `Replace` hunk.
//!
//! Line indices are zero-based positions in the base and target line lists.

use serde::{Deserialize, Serialize};

/// Shape of a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HunkKind {
    Insert,
    Delete,
    Replace,
}

/// A contiguous block of difference between base and target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub kind: HunkKind,
    /// Index of the first affected base line (insertion point for `Insert`).
    pub base_start: usize,
    /// Lines removed from the base.
    pub removed: Vec<String>,
    /// Index of the first affected target line (deletion point for `Delete`).
    pub target_start: usize,
    /// Lines added in the target.
    pub added: Vec<String>,
}

/// Result of comparing two versions of one file.
///
/// `base` is always the older version regardless of argument order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub file_id: String,
    pub base_version_id: String,
    pub target_version_id: String,
    pub hunks: Vec<Hunk>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Total lines added and removed across all hunks.
    pub fn line_counts(&self) -> (usize, usize) {
        self.hunks.iter().fold((0, 0), |(added, removed), h| {
            (added + h.added.len(), removed + h.removed.len())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    Delete,
    Insert,
}

/// Compute the hunk list turning `base` into `target`.
pub fn diff_lines(base: &str, target: &str) -> Vec<Hunk> {
    let a: Vec<&str> = base.lines().collect();
    let b: Vec<&str> = target.lines().collect();

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];
    let ops = align(a_mid, b_mid);

    let mut hunks = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    let mut k = 0usize;
    while k < ops.len() {
        if ops[k] == Op::Equal {
            i += 1;
            j += 1;
            k += 1;
            continue;
        }

        let base_start = prefix + i;
        let target_start = prefix + j;
        let mut removed = Vec::new();
        let mut added = Vec::new();
        while k < ops.len() && ops[k] != Op::Equal {
            match ops[k] {
                Op::Delete => {
                    removed.push(a_mid[i].to_string());
                    i += 1;
                }
                Op::Insert => {
                    added.push(b_mid[j].to_string());
                    j += 1;
                }
                Op::Equal => break,
            }
            k += 1;
        }

        let kind = match (removed.is_empty(), added.is_empty()) {
            (false, false) => HunkKind::Replace,
            (false, true) => HunkKind::Delete,
            _ => HunkKind::Insert,
        };
        hunks.push(Hunk {
            kind,
            base_start,
            removed,
            target_start,
            added,
        });
    }

    hunks
}

/// LCS alignment as a sequence of edit operations.
///
/// Hirschberg's divide and conquer: memory stays linear in the shorter
/// side while time remains `O(n * m)`.
fn align(a: &[&str], b: &[&str]) -> Vec<Op> {
    let mut ops = Vec::with_capacity(a.len() + b.len());
    split_align(a, b, &mut ops);
    ops
}

fn split_align(a: &[&str], b: &[&str], ops: &mut Vec<Op>) {
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        ops.extend(std::iter::repeat_n(Op::Insert, m));
        return;
    }
    if m == 0 {
        ops.extend(std::iter::repeat_n(Op::Delete, n));
        return;
    }
    if n == 1 {
        match b.iter().position(|line| *line == a[0]) {
            Some(j) => {
                ops.extend(std::iter::repeat_n(Op::Insert, j));
                ops.push(Op::Equal);
                ops.extend(std::iter::repeat_n(Op::Insert, m - j - 1));
            }
            None => {
                ops.push(Op::Delete);
                ops.extend(std::iter::repeat_n(Op::Insert, m));
            }
        }
        return;
    }

    let mid = n / 2;
    let head = lcs_prefix_row(&a[..mid], b);
    let tail = lcs_suffix_row(&a[mid..], b);
    let split = (0..=m)
        .max_by_key(|&j| (head[j] + tail[j], std::cmp::Reverse(j)))
        .unwrap_or(0);

    split_align(&a[..mid], &b[..split], ops);
    split_align(&a[mid..], &b[split..], ops);
}

/// `row[j]` = LCS length of `a` and `b[..j]`.
fn lcs_prefix_row(a: &[&str], b: &[&str]) -> Vec<u32> {
    let m = b.len();
    let mut prev = vec![0u32; m + 1];
    let mut cur = vec![0u32; m + 1];
    for x in a {
        cur[0] = 0;
        for j in 1..=m {
            cur[j] = if *x == b[j - 1] {
                prev[j - 1] + 1
            } else {
                cur[j - 1].max(prev[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev
}

/// `row[j]` = LCS length of `a` and `b[j..]`.
fn lcs_suffix_row(a: &[&str], b: &[&str]) -> Vec<u32> {
    let m = b.len();
    let mut prev = vec![0u32; m + 1];
    let mut cur = vec![0u32; m + 1];
    for x in a.iter().rev() {
        cur[m] = 0;
        for j in (0..m).rev() {
            cur[j] = if *x == b[j] {
                prev[j + 1] + 1
            } else {
                cur[j + 1].max(prev[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev
}

#[cfg(test)]
pub(crate) fn apply_hunks(base: &str, hunks: &[Hunk]) -> Vec<String> {
    let lines: Vec<&str> = base.lines().collect();
    let mut out = Vec::new();
    let mut cursor = 0;
    for hunk in hunks {
        out.extend(lines[cursor..hunk.base_start].iter().map(|s| s.to_string()));
        out.extend(hunk.added.iter().cloned());
        cursor = hunk.base_start + hunk.removed.len();
    }
    out.extend(lines[cursor..].iter().map(|s| s.to_string()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_content_has_no_hunks() {
        assert!(diff_lines("a\nb\nc", "a\nb\nc").is_empty());
        assert!(diff_lines("", "").is_empty());
    }

    #[test]
    fn test_disjoint_content_is_single_replace() {
        let hunks = diff_lines("v1", "v2");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].kind, HunkKind::Replace);
        assert_eq!(hunks[0].removed, vec!["v1"]);
        assert_eq!(hunks[0].added, vec!["v2"]);

        let hunks = diff_lines("a\nb\nc", "x\ny");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].kind, HunkKind::Replace);
    }

    #[test]
    fn test_insert_and_delete() {
        let hunks = diff_lines("a\nc", "a\nb\nc");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].kind, HunkKind::Insert);
        assert_eq!(hunks[0].base_start, 1);
        assert_eq!(hunks[0].added, vec!["b"]);

        let hunks = diff_lines("a\nb\nc", "a\nc");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].kind, HunkKind::Delete);
        assert_eq!(hunks[0].removed, vec!["b"]);
    }

    #[test]
    fn test_separate_changes_produce_separate_hunks() {
        let base = "title\none\ntwo\nthree\nfour";
        let target = "Title\none\ntwo\nthree\nfour\nfive";
        let hunks = diff_lines(base, target);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].kind, HunkKind::Replace);
        assert_eq!(hunks[1].kind, HunkKind::Insert);
        assert_eq!(hunks[1].target_start, 5);
    }

    #[test]
    fn test_long_documents_align_without_full_table() {
        let base: Vec<String> = (0..4000).map(|i| format!("line {i}")).collect();
        let target: Vec<String> = (0..4000)
            .map(|i| if i % 1000 == 500 { format!("edited {i}") } else { format!("line {i}") })
            .collect();
        let hunks = diff_lines(&base.join("\n"), &target.join("\n"));

        assert_eq!(hunks.len(), 4);
        assert!(hunks.iter().all(|h| h.kind == HunkKind::Replace));
        assert_eq!(hunks[0].base_start, 500);
        assert_eq!(hunks[3].removed, vec!["line 3500"]);
        assert_eq!(hunks[3].added, vec!["edited 3500"]);
    }

    #[test]
    fn test_suffix_row_matches_prefix_row_reversed() {
        let a = ["x", "y", "z"];
        let b = ["y", "x", "z", "y"];
        let rev_a: Vec<&str> = a.iter().rev().copied().collect();
        let rev_b: Vec<&str> = b.iter().rev().copied().collect();
        let mut forward = lcs_prefix_row(&rev_a, &rev_b);
        forward.reverse();
        assert_eq!(lcs_suffix_row(&a, &b), forward);
        assert_eq!(lcs_prefix_row(&a, &b), vec![0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_empty_base() {
        let hunks = diff_lines("", "x\ny");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].kind, HunkKind::Insert);
        assert_eq!(hunks[0].added.len(), 2);
    }
}

/// Property-based tests for diff invariants.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn lcs_len(a: &[&str], b: &[&str]) -> usize {
        let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
        for i in 1..=a.len() {
            for j in 1..=b.len() {
                table[i][j] = if a[i - 1] == b[j - 1] {
                    table[i - 1][j - 1] + 1
                } else {
                    table[i - 1][j].max(table[i][j - 1])
                };
            }
        }
        table[a.len()][b.len()]
    }

    fn doc() -> impl Strategy<Value = String> {
        prop::collection::vec("[abc]{0,2}", 0..12).prop_map(|lines| lines.join("\n"))
    }

    proptest! {
        /// Property: applying the hunks to the base reproduces the target lines.
        #[test]
        fn hunks_reconstruct_target(base in doc(), target in doc()) {
            let hunks = diff_lines(&base, &target);
            let rebuilt = apply_hunks(&base, &hunks);
            let expected: Vec<String> = target.lines().map(String::from).collect();
            prop_assert_eq!(rebuilt, expected);
        }

        /// Property: the alignment keeps a longest common subsequence.
        #[test]
        fn removed_lines_are_minimal(base in doc(), target in doc()) {
            let a: Vec<&str> = base.lines().collect();
            let b: Vec<&str> = target.lines().collect();
            let (_, removed) = Diff {
                file_id: String::new(),
                base_version_id: String::new(),
                target_version_id: String::new(),
                hunks: diff_lines(&base, &target),
            }
            .line_counts();
            prop_assert_eq!(a.len() - removed, lcs_len(&a, &b));
        }

        /// Property: a document diffed against itself has no hunks.
        #[test]
        fn self_diff_is_empty(base in doc()) {
            prop_assert!(diff_lines(&base, &base).is_empty());
        }

        /// Property: hunks are ordered and never overlap.
        #[test]
        fn hunks_are_ordered(base in doc(), target in doc()) {
            let hunks = diff_lines(&base, &target);
            for pair in hunks.windows(2) {
                prop_assert!(pair[0].base_start + pair[0].removed.len() <= pair[1].base_start);
                prop_assert!(pair[0].target_start + pair[0].added.len() <= pair[1].target_start);
            }
        }
    }
}
