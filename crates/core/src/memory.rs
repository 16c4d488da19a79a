//! Session memory: the ordered log of entries sent to the model.
//!
//! Entries are only ever appended or removed in bulk. The first
//! [`Memory::prefix_len`] entries form the protected system prefix written by
//! the prompt assembler; only [`Memory::trim_oldest`] honours it.

use crate::message::{ChatMessage, Entry, Role};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    entries: Vec<Entry>,
    prefix_len: usize,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return it.
    pub fn append(&mut self, role: Role, content: impl Into<String>, media: Vec<String>) -> &Entry {
        self.entries.push(Entry::new(role, content, media));
        let last = self.entries.len() - 1;
        &self.entries[last]
    }

    /// Evict up to `count` entries from the tail. A negative count evicts
    /// everything. Returns how many entries were removed.
    pub fn evict(&mut self, count: isize) -> usize {
        let len = self.entries.len();
        let count = usize::try_from(count).map_or(len, |n| n.min(len));
        self.entries.truncate(len - count);
        self.prefix_len = self.prefix_len.min(self.entries.len());
        count
    }

    /// Drop the oldest entries after the protected prefix until the total
    /// content length fits in `limit`. Returns how many entries were removed.
    pub fn trim_oldest(&mut self, limit: usize) -> usize {
        let mut total = self.content_len();
        let mut cut = self.prefix_len;
        while total > limit && cut < self.entries.len() {
            total -= self.entries[cut].char_len();
            cut += 1;
        }
        let removed = cut - self.prefix_len;
        self.entries.drain(self.prefix_len..cut);
        removed
    }

    /// Treat everything currently in memory as the protected prefix.
    pub fn mark_prefix(&mut self) {
        self.prefix_len = self.entries.len();
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    /// Independent deep copy of the current memory.
    pub fn snapshot(&self) -> Memory {
        self.clone()
    }

    /// Replace the live memory wholesale.
    pub fn restore(&mut self, snapshot: Memory) {
        *self = snapshot;
    }

    /// Total length of all entry contents, in characters.
    pub fn content_len(&self) -> usize {
        self.entries.iter().map(Entry::char_len).sum()
    }

    /// Serialize the memory into a model request and bump every recall counter.
    ///
    /// With `annotate`, entries that were already sent before are prefixed with
    /// how often the model has seen them. The stored content is untouched.
    pub fn render(&mut self, annotate: bool) -> Vec<ChatMessage> {
        self.entries
            .iter_mut()
            .map(|entry| {
                let content = if annotate && entry.recalls > 0 {
                    format!("[recalled {} times] {}", entry.recalls, entry.content)
                } else {
                    entry.content.clone()
                };
                entry.recalls = entry.recalls.saturating_add(1);
                ChatMessage {
                    role: entry.role,
                    content,
                    images: entry.media.clone(),
                }
            })
            .collect()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with(n: usize) -> Memory {
        let mut memory = Memory::new();
        for i in 0..n {
            memory.append(Role::User, format!("message {i}"), vec![]);
        }
        memory
    }

    #[test]
    fn append_preserves_order() {
        let mut memory = Memory::new();
        memory.append(Role::System, "persona", vec![]);
        let entry = memory.append(Role::User, "hi", vec!["img".into()]);
        assert_eq!(entry.role, Role::User);
        assert_eq!(entry.media, vec!["img".to_string()]);
        let roles: Vec<Role> = memory.entries().iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
    }

    #[test]
    fn evict_zero_is_noop() {
        let mut memory = memory_with(3);
        assert_eq!(memory.evict(0), 0);
        assert_eq!(memory.len(), 3);
    }

    #[test]
    fn evict_negative_clears_everything() {
        let mut memory = memory_with(3);
        memory.mark_prefix();
        assert_eq!(memory.evict(-1), 3);
        assert!(memory.is_empty());
        assert_eq!(memory.prefix_len(), 0);
    }

    #[test]
    fn evict_more_than_len_clears_everything() {
        let mut memory = memory_with(2);
        assert_eq!(memory.evict(10), 2);
        assert!(memory.is_empty());
        assert_eq!(Memory::new().evict(5), 0);
    }

    #[test]
    fn evict_removes_newest_entries() {
        let mut memory = memory_with(4);
        assert_eq!(memory.evict(1), 1);
        assert_eq!(memory.len(), 3);
        assert_eq!(memory.last().unwrap().content, "message 2");
    }

    #[test]
    fn snapshot_round_trip_is_independent() {
        let mut live = memory_with(2);
        let mut snapshot = live.snapshot();
        assert_eq!(snapshot, live);

        snapshot.append(Role::Tool, "only in snapshot", vec![]);
        assert_eq!(live.len(), 2);

        let mut restored = Memory::new();
        restored.restore(live.snapshot());
        assert_eq!(restored, live);

        live.append(Role::Assistant, "only live", vec![]);
        assert_eq!(restored.len(), 2);
    }

    #[test]
    fn content_len_counts_characters() {
        let mut memory = Memory::new();
        memory.append(Role::User, "ab", vec![]);
        memory.append(Role::Assistant, "ñé", vec![]);
        assert_eq!(memory.content_len(), 4);
    }

    #[test]
    fn trim_oldest_keeps_prefix() {
        let mut memory = Memory::new();
        memory.append(Role::System, "persona", vec![]);
        memory.mark_prefix();
        memory.append(Role::User, "aaaaa", vec![]);
        memory.append(Role::Assistant, "bbbbb", vec![]);
        memory.append(Role::User, "ccccc", vec![]);

        let removed = memory.trim_oldest(12);
        assert_eq!(removed, 2);
        let contents: Vec<&str> = memory.entries().iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["persona", "ccccc"]);
    }

    #[test]
    fn trim_oldest_never_touches_prefix_even_when_over_limit() {
        let mut memory = Memory::new();
        memory.append(Role::System, "a very long persona block", vec![]);
        memory.mark_prefix();
        memory.append(Role::User, "hi", vec![]);
        assert_eq!(memory.trim_oldest(1), 1);
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.entries()[0].role, Role::System);
    }

    #[test]
    fn render_bumps_recall_counters() {
        let mut memory = memory_with(1);
        let first = memory.render(true);
        assert_eq!(first[0].content, "message 0");
        let second = memory.render(true);
        assert_eq!(second[0].content, "[recalled 1 times] message 0");
        assert_eq!(memory.entries()[0].recalls, 2);
        assert_eq!(memory.entries()[0].content, "message 0");
    }

    #[test]
    fn render_without_annotation_sends_content_verbatim() {
        let mut memory = memory_with(1);
        memory.render(false);
        let again = memory.render(false);
        assert_eq!(again[0].content, "message 0");
        assert_eq!(again[0].role, Role::User);
    }
}
