/*!
Snapshots and the per-stack history they accumulate in.

A [`Snapshot`] is an immutable label-to-value mapping captured from every
registered binding at one point in time. A [`History`] is the append-ordered
sequence of snapshots owned by a single stack, addressed on restore by the
offset from the most recent entry.
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, RewindError};

/// An immutable mapping from binding label to captured value.
///
/// Entries are kept in registration order. A snapshot is produced atomically
/// by [`BindingRegistry::capture`](crate::BindingRegistry::capture) and is
/// never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    entries: Vec<(String, Value)>,
}

impl Snapshot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, label: String, value: Value) {
        self.entries.push((label, value));
    }

    /// Look up the captured value for a label.
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(entry_label, _)| entry_label == label)
            .map(|(_, value)| value)
    }

    /// Whether a label was captured in this snapshot.
    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// Labels in capture order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    /// Label/value pairs in capture order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(label, value)| (label.as_str(), value))
    }

    /// Number of captured values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot captured no values.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The ordered snapshot sequence owned by one stack.
///
/// Snapshots are stored oldest first; `at_offset(0)` is the most recent.
/// Restores are non-destructive: they move the [`cursor`](History::cursor)
/// without truncating or appending, so a more recent snapshot can still be
/// re-restored afterwards. The optional depth cap evicts the oldest snapshot
/// once exceeded.
#[derive(Debug, Default)]
pub struct History {
    snapshots: Vec<Snapshot>,
    cursor: Option<usize>,
    max_depth: Option<usize>,
}

impl History {
    pub(crate) fn new(max_depth: Option<usize>) -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: None,
            max_depth,
        }
    }

    /// Number of stored snapshots.
    pub fn depth(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no snapshot has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// The configured depth cap, if any.
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Offset of the last restore, or `None` when live at the latest store.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// All snapshots, oldest first.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// The snapshot `offset` store-calls back from the most recent one.
    ///
    /// # Errors
    /// [`RewindError::OutOfRange`] if `offset >= depth()`.
    pub fn at_offset(&self, offset: usize) -> Result<&Snapshot> {
        let depth = self.snapshots.len();
        if offset >= depth {
            return Err(RewindError::OutOfRange { offset, depth });
        }
        Ok(&self.snapshots[depth - 1 - offset])
    }

    pub(crate) fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
        if let Some(max) = self.max_depth {
            while self.snapshots.len() > max {
                self.snapshots.remove(0);
            }
        }
        self.cursor = None;
    }

    pub(crate) fn mark_restored(&mut self, offset: usize) {
        self.cursor = Some(offset);
    }

    pub(crate) fn replace(&mut self, mut snapshots: Vec<Snapshot>) {
        if let Some(max) = self.max_depth {
            if snapshots.len() > max {
                snapshots.drain(..snapshots.len() - max);
            }
        }
        self.snapshots = snapshots;
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_with(label: &str, value: Value) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert(label.to_string(), value);
        snapshot
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("b".to_string(), json!(2));
        snapshot.insert("a".to_string(), json!(1));

        let labels: Vec<&str> = snapshot.labels().collect();
        assert_eq!(labels, vec!["b", "a"]);
        assert_eq!(snapshot.get("a"), Some(&json!(1)));
        assert!(snapshot.contains("b"));
        assert!(!snapshot.contains("c"));
    }

    #[test]
    fn test_at_offset_addresses_from_latest() {
        let mut history = History::new(None);
        for i in 0..3 {
            history.push(snapshot_with("n", json!(i)));
        }

        assert_eq!(history.at_offset(0).unwrap().get("n"), Some(&json!(2)));
        assert_eq!(history.at_offset(2).unwrap().get("n"), Some(&json!(0)));
    }

    #[test]
    fn test_at_offset_out_of_range() {
        let mut history = History::new(None);
        assert!(matches!(
            history.at_offset(0),
            Err(RewindError::OutOfRange { offset: 0, depth: 0 })
        ));

        history.push(snapshot_with("n", json!(1)));
        assert!(history.at_offset(0).is_ok());
        assert!(matches!(
            history.at_offset(1),
            Err(RewindError::OutOfRange { offset: 1, depth: 1 })
        ));
    }

    #[test]
    fn test_depth_cap_evicts_oldest() {
        let mut history = History::new(Some(3));
        for i in 0..10 {
            history.push(snapshot_with("n", json!(i)));
        }

        assert_eq!(history.depth(), 3);
        assert_eq!(history.at_offset(2).unwrap().get("n"), Some(&json!(7)));
        assert_eq!(history.latest().unwrap().get("n"), Some(&json!(9)));
    }

    #[test]
    fn test_cursor_tracks_restores_and_resets_on_push() {
        let mut history = History::new(None);
        history.push(snapshot_with("n", json!(1)));
        history.push(snapshot_with("n", json!(2)));
        assert_eq!(history.cursor(), None);

        history.mark_restored(1);
        assert_eq!(history.cursor(), Some(1));

        history.push(snapshot_with("n", json!(3)));
        assert_eq!(history.cursor(), None);
        assert_eq!(history.depth(), 3);
    }

    #[test]
    fn test_replace_swaps_contents_and_respects_cap() {
        let mut history = History::new(Some(2));
        history.push(snapshot_with("n", json!(0)));
        history.mark_restored(0);

        history.replace(vec![
            snapshot_with("n", json!(1)),
            snapshot_with("n", json!(2)),
            snapshot_with("n", json!(3)),
        ]);

        assert_eq!(history.depth(), 2);
        assert_eq!(history.cursor(), None);
        assert_eq!(history.latest().unwrap().get("n"), Some(&json!(3)));
        assert_eq!(history.at_offset(1).unwrap().get("n"), Some(&json!(2)));
    }
}
