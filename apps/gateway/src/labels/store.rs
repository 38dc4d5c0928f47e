use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::labels::types::{ChatLabelAssociation, Label};

/// Per-user table of label definitions. Reads hand out copies; the store
/// owns every instance.
#[async_trait]
pub trait LabelStore: Send + Sync {
    /// Snapshot of all labels for the user, deleted ones included.
    async fn get(&self, user_id: &str) -> HashMap<String, Label>;

    /// Copy of one label, if present.
    async fn get_label(&self, user_id: &str, label_id: &str) -> Option<Label>;

    /// Insert or fully replace the entry for `label.id`.
    async fn upsert(&self, user_id: &str, label: Label);

    /// Insert only if the ID is not already present. Returns whether it
    /// inserted.
    async fn insert_if_absent(&self, user_id: &str, label: Label) -> bool;

    /// Soft-delete an existing entry; no-op for unknown IDs.
    async fn mark_deleted(&self, user_id: &str, label_id: &str);
}

pub fn memory_labels() -> Arc<dyn LabelStore> {
    Arc::new(MemoryLabelStore::default())
}

#[derive(Default)]
struct MemoryLabelStore {
    inner: RwLock<HashMap<String, HashMap<String, Label>>>,
}

#[async_trait]
impl LabelStore for MemoryLabelStore {
    async fn get(&self, user_id: &str) -> HashMap<String, Label> {
        let inner = self.inner.read().await;
        inner.get(user_id).cloned().unwrap_or_default()
    }

    async fn get_label(&self, user_id: &str, label_id: &str) -> Option<Label> {
        let inner = self.inner.read().await;
        inner.get(user_id).and_then(|labels| labels.get(label_id)).cloned()
    }

    async fn upsert(&self, user_id: &str, label: Label) {
        let mut inner = self.inner.write().await;
        inner
            .entry(user_id.to_string())
            .or_default()
            .insert(label.id.clone(), label);
    }

    async fn insert_if_absent(&self, user_id: &str, label: Label) -> bool {
        let mut inner = self.inner.write().await;
        let labels = inner.entry(user_id.to_string()).or_default();
        if labels.contains_key(&label.id) {
            return false;
        }
        labels.insert(label.id.clone(), label);
        true
    }

    async fn mark_deleted(&self, user_id: &str, label_id: &str) {
        let mut inner = self.inner.write().await;
        if let Some(label) = inner.get_mut(user_id).and_then(|labels| labels.get_mut(label_id)) {
            label.deleted = true;
            label.active = false;
        }
    }
}

/// Per-user chat-label association set. Insertion order is preserved but
/// carries no meaning.
#[async_trait]
pub trait AssociationStore: Send + Sync {
    /// Add the pair if absent. Returns whether it added.
    async fn add(&self, user_id: &str, chat_jid: &str, label_id: &str) -> bool;

    /// Remove the pair if present. Returns whether it removed.
    async fn remove(&self, user_id: &str, chat_jid: &str, label_id: &str) -> bool;

    /// Snapshot of the user's associations.
    async fn list(&self, user_id: &str) -> Vec<ChatLabelAssociation>;
}

pub fn memory_associations() -> Arc<dyn AssociationStore> {
    Arc::new(MemoryAssociationStore::default())
}

#[derive(Default)]
struct MemoryAssociationStore {
    inner: RwLock<HashMap<String, Vec<ChatLabelAssociation>>>,
}

#[async_trait]
impl AssociationStore for MemoryAssociationStore {
    async fn add(&self, user_id: &str, chat_jid: &str, label_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let associations = inner.entry(user_id.to_string()).or_default();
        let exists = associations
            .iter()
            .any(|entry| entry.chat_jid == chat_jid && entry.label_id == label_id);
        if exists {
            return false;
        }
        associations.push(ChatLabelAssociation {
            chat_jid: chat_jid.to_string(),
            label_id: label_id.to_string(),
        });
        true
    }

    async fn remove(&self, user_id: &str, chat_jid: &str, label_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(associations) = inner.get_mut(user_id) else {
            return false;
        };
        let before = associations.len();
        associations.retain(|entry| !(entry.chat_jid == chat_jid && entry.label_id == label_id));
        associations.len() != before
    }

    async fn list(&self, user_id: &str) -> Vec<ChatLabelAssociation> {
        let inner = self.inner.read().await;
        inner.get(user_id).cloned().unwrap_or_default()
    }
}
