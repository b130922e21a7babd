//! Scenario-driven coverage of the shortest-path diff.
//!
//! A small builder assembles chains out of the four entry shapes and records
//! marks, so every scenario states its expected result as "the slice between
//! these two marks" instead of hand-copied entry lists.

use std::collections::HashMap;

use history::{NodeHistory, NodeHistoryEntry};

#[derive(Default)]
struct HistoryBuilder {
    entries: Vec<NodeHistoryEntry>,
    marks: HashMap<&'static str, usize>,
    counter: u64,
}

impl HistoryBuilder {
    fn new() -> Self {
        Self::default()
    }

    fn next_key(&mut self) -> String {
        self.counter += 1;
        format!("entry-{:03}", self.counter)
    }

    fn base_only(mut self, base_size: u64) -> Self {
        let key = self.next_key();
        self.entries.push(NodeHistoryEntry::create_base_only(
            key.clone(),
            format!("etag-{key}"),
            format!("version-{key}"),
            base_size,
        ));
        self
    }

    fn delta_only(mut self, delta_size: u64) -> Self {
        let key = self.next_key();
        self.entries.push(NodeHistoryEntry::create_delta_only(
            key.clone(),
            format!("etag-{key}"),
            delta_size,
        ));
        self
    }

    fn whole(mut self, base_size: u64, delta_size: u64) -> Self {
        let key = self.next_key();
        let mut entry =
            NodeHistoryEntry::create_delta_only(key.clone(), format!("etag-{key}"), delta_size);
        entry.attach_base(format!("version-{key}"), base_size);
        self.entries.push(entry);
        self
    }

    fn deleted(mut self) -> Self {
        self.entries.push(NodeHistoryEntry::create_deleted());
        self
    }

    /// Marks the position after the most recently added entry.
    fn mark(mut self, name: &'static str) -> Self {
        self.marks.insert(name, self.entries.len());
        self
    }

    /// Entries strictly after `from` up to and including `to`.
    fn slice(&self, from: &str, to: &str) -> Vec<NodeHistoryEntry> {
        self.entries[self.marks[from]..self.marks[to]].to_vec()
    }

    /// The chain as seen after `mark` (a stored snapshot of the prefix).
    fn prefix(&self, mark: &str) -> NodeHistory {
        NodeHistory::create("dir/file.dat", self.entries[..self.marks[mark]].to_vec())
    }

    fn build(&self) -> NodeHistory {
        NodeHistory::create("dir/file.dat", self.entries.clone())
    }
}

#[test]
fn single_new_delta_replays_relatively() {
    let b = HistoryBuilder::new()
        .base_only(1024)
        .mark("stored")
        .delta_only(10)
        .mark("end");

    let path = b.build().diff(Some(&b.prefix("stored"))).expect("diff");
    assert_eq!(path.entries, b.slice("stored", "end"));
    assert!(!path.is_absolute);
}

#[test]
fn delta_tail_replays_relatively_from_a_deeper_snapshot() {
    let b = HistoryBuilder::new()
        .base_only(1024)
        .delta_only(10)
        .mark("stored")
        .delta_only(10)
        .mark("end");

    let path = b.build().diff(Some(&b.prefix("stored"))).expect("diff");
    assert_eq!(path.entries, b.slice("stored", "end"));
    assert!(!path.is_absolute);
}

#[test]
fn whole_entry_with_a_large_base_still_replays_its_delta() {
    let b = HistoryBuilder::new()
        .base_only(1024)
        .delta_only(10)
        .mark("stored")
        .whole(10_000_000, 10)
        .mark("end");

    let path = b.build().diff(Some(&b.prefix("stored"))).expect("diff");
    assert_eq!(path.entries, b.slice("stored", "end"));
    assert!(!path.is_absolute);
}

#[test]
fn from_scratch_replays_base_and_deltas() {
    let b = HistoryBuilder::new()
        .mark("begin")
        .base_only(1024)
        .delta_only(10)
        .mark("end");

    let path = b.build().diff(None).expect("diff");
    assert_eq!(path.entries, b.slice("begin", "end"));
    assert!(path.is_absolute);
}

#[test]
fn from_scratch_prefers_the_most_recent_base() {
    let b = HistoryBuilder::new()
        .base_only(1024)
        .mark("begin")
        .whole(2048, 10)
        .mark("end");

    let path = b.build().diff(None).expect("diff");
    assert_eq!(path.entries, b.slice("begin", "end"));
    assert!(path.is_absolute);
}

#[test]
fn chain_restarted_after_a_tombstone_is_absolute() {
    let b = HistoryBuilder::new()
        .base_only(1024)
        .delta_only(10)
        .deleted()
        .mark("begin")
        .base_only(1024)
        .mark("end");

    let stored = HistoryBuilder::new().base_only(1024).delta_only(10);

    let path = b.build().diff(Some(&stored.build())).expect("diff");
    assert_eq!(path.entries, b.slice("begin", "end"));
    assert!(path.is_absolute);
}

#[test]
fn delta_sum_beyond_candidate_base_cuts_over_to_the_base() {
    // Replaying all three deltas would move 3 bytes against a 2-byte base:
    // the path restarts at the whole entry instead.
    let b = HistoryBuilder::new()
        .base_only(1024)
        .mark("stored")
        .delta_only(1)
        .mark("begin")
        .whole(2, 1)
        .delta_only(1)
        .mark("end");

    let path = b.build().diff(Some(&b.prefix("stored"))).expect("diff");
    assert_eq!(path.entries, b.slice("begin", "end"));
    assert!(path.is_absolute);
}

#[test]
fn large_delta_chain_prefers_a_small_trailing_base() {
    // Stored points at a 1 MiB base; the remote tail carries 1.1 MiB of
    // deltas but ends in a 400 KiB base. The path must be that base alone.
    const KB: u64 = 1024;
    let b = HistoryBuilder::new()
        .base_only(1024 * KB)
        .mark("stored")
        .delta_only(200 * KB)
        .delta_only(300 * KB)
        .delta_only(600 * KB)
        .mark("begin")
        .whole(400 * KB, 10 * KB)
        .mark("end");

    let path = b.build().diff(Some(&b.prefix("stored"))).expect("diff");
    assert_eq!(path.entries, b.slice("begin", "end"));
    assert!(path.is_absolute);
    assert_eq!(path.entries.len(), 1);
    assert_eq!(path.entries[0].base_size, 400 * KB);
}

#[test]
fn relative_paths_respect_the_bytes_bound() {
    // Whenever the diff stays relative, the replayed delta bytes can never
    // exceed the size of a base it passed over.
    let b = HistoryBuilder::new()
        .base_only(1024)
        .mark("stored")
        .delta_only(100)
        .whole(1_000_000, 100)
        .delta_only(100)
        .mark("end");

    let path = b.build().diff(Some(&b.prefix("stored"))).expect("diff");
    assert!(!path.is_absolute);
    let delta_sum: u64 = path.entries.iter().map(|e| e.delta_size).sum();
    let passed_base = path
        .entries
        .iter()
        .filter_map(|e| e.base_version.as_ref().map(|_| e.base_size))
        .min()
        .unwrap_or(u64::MAX);
    assert!(delta_sum <= passed_base);
}
