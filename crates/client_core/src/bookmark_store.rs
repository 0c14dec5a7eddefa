//! Owned, subscribable set of the session's bookmarked posts.
//!
//! Views that render a bookmark indicator hold an `Arc<BookmarkStore>`
//! plus a subscription; nothing hands out the underlying set itself.
//! Mutations bump a version counter so subscribers know to re-read.

use std::collections::HashSet;

use parking_lot::RwLock;
use shared::domain::PostId;
use tokio::sync::watch;

pub struct BookmarkStore {
    posts: RwLock<HashSet<PostId>>,
    version: watch::Sender<u64>,
}

impl BookmarkStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            posts: RwLock::new(HashSet::new()),
            version,
        }
    }

    /// Replaces the whole set, e.g. from a bookmark list fetch.
    pub fn hydrate(&self, ids: impl IntoIterator<Item = PostId>) {
        {
            let mut posts = self.posts.write();
            posts.clear();
            posts.extend(ids);
        }
        self.bump();
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.posts.read().contains(id)
    }

    /// Idempotent; returns whether the set changed.
    pub fn insert(&self, id: &PostId) -> bool {
        let changed = self.posts.write().insert(id.clone());
        if changed {
            self.bump();
        }
        changed
    }

    /// Idempotent; returns whether the set changed.
    pub fn remove(&self, id: &PostId) -> bool {
        let changed = self.posts.write().remove(id);
        if changed {
            self.bump();
        }
        changed
    }

    pub fn snapshot(&self) -> Vec<PostId> {
        let mut ids: Vec<PostId> = self.posts.read().iter().cloned().collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        ids
    }

    pub fn len(&self) -> usize {
        self.posts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.read().is_empty()
    }

    /// Subscribers observe a monotonically increasing version and re-read
    /// via `contains`/`snapshot` on change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl Default for BookmarkStore {
    fn default() -> Self {
        Self::new()
    }
}
