//! Shared world-state snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// A coarse, shared snapshot of session state.
///
/// One mutable map plus the time of the last replacement. There is no
/// versioning and no merging: updates replace the whole map, last writer
/// wins.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldState {
    state: BTreeMap<String, serde_json::Value>,
    last_sync: DateTime<Utc>,
}

impl WorldState {
    /// Create an empty snapshot stamped now.
    pub fn new() -> Self {
        Self {
            state: BTreeMap::new(),
            last_sync: Utc::now(),
        }
    }

    /// Replace the snapshot wholesale and bump the sync timestamp.
    pub fn replace(&mut self, state: BTreeMap<String, serde_json::Value>) {
        self.state = state;
        self.last_sync = Utc::now();
    }

    /// The current snapshot contents.
    pub const fn get(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.state
    }

    /// When the snapshot was last replaced.
    pub const fn last_sync(&self) -> DateTime<Utc> {
        self.last_sync
    }

    /// Reset to an empty snapshot stamped now.
    pub fn reset(&mut self) {
        self.state.clear();
        self.last_sync = Utc::now();
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_is_wholesale() {
        let mut world = WorldState::new();
        let mut first = BTreeMap::new();
        first.insert("location".to_owned(), serde_json::json!("tavern"));
        first.insert("torch_lit".to_owned(), serde_json::json!(true));
        world.replace(first);

        let mut second = BTreeMap::new();
        second.insert("location".to_owned(), serde_json::json!("crypt"));
        world.replace(second);

        assert_eq!(world.get().len(), 1, "old keys must not survive a replace");
        assert_eq!(
            world.get().get("location"),
            Some(&serde_json::json!("crypt"))
        );
    }

    #[test]
    fn replace_bumps_last_sync() {
        let mut world = WorldState::new();
        let before = world.last_sync();
        world.replace(BTreeMap::new());
        assert!(world.last_sync() >= before);
    }
}
