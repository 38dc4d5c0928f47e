//! App-state patch encoding and the label sync event shapes.
//!
//! Outbound label mutations travel as app-state patches: an index path
//! naming the mutation kind plus its keys, and a camelCase action value in
//! the platform's sync-action layout. Inbound, the platform delivers three
//! event shapes; [`LabelSyncEvent`] models them as one sum type so event
//! handling dispatches on the variant instead of inspecting payloads.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Index path kind for label definition changes.
pub const INDEX_LABEL_EDIT: &str = "label_edit";
/// Index path kind for chat-label association changes.
pub const INDEX_LABEL_JID: &str = "label_jid";

/// An encoded app-state mutation ready to send over a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppStatePatch {
    /// Ordered tokens naming the mutation kind and its keys.
    pub index: Vec<String>,
    /// Sync-action payload in the platform's camelCase layout.
    pub action: serde_json::Value,
}

/// Encode a label create, edit, or soft delete.
pub fn build_label_edit(label_id: &str, name: &str, color: i32, deleted: bool) -> AppStatePatch {
    AppStatePatch {
        index: vec![INDEX_LABEL_EDIT.to_string(), label_id.to_string()],
        action: serde_json::json!({
            "labelEditAction": {
                "name": name,
                "color": color,
                "deleted": deleted,
            }
        }),
    }
}

/// Encode attaching or detaching a label on a chat.
pub fn build_label_association(chat: &crate::Jid, label_id: &str, labeled: bool) -> AppStatePatch {
    AppStatePatch {
        index: vec![
            INDEX_LABEL_JID.to_string(),
            label_id.to_string(),
            chat.to_string(),
        ],
        action: serde_json::json!({
            "labelAssociationAction": {
                "labeled": labeled,
            }
        }),
    }
}

/// One label-related event delivered by the platform's sync channel.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSyncEvent {
    /// Generic app-state delta, identified only by its index path.
    AppStateDelta(AppStateDelta),
    /// Typed chat-label association change.
    ChatLabelAssociation(ChatLabelAssociationEvent),
    /// Typed label definition change.
    LabelEdit(LabelEditEvent),
}

/// A generic app-state delta with an undecoded action payload.
#[derive(Debug, Deserialize)]
pub struct AppStateDelta {
    pub index: Vec<String>,
    /// Kept raw; only deltas whose index path is label-related get decoded.
    pub action: Box<RawValue>,
}

/// Typed association event payload.
#[derive(Debug, Deserialize)]
pub struct ChatLabelAssociationEvent {
    pub chat_jid: String,
    pub label_id: String,
    #[serde(default)]
    pub action: Option<ChatLabelAssociationAction>,
}

/// Association action; an absent `labeled` means the label was removed.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatLabelAssociationAction {
    #[serde(default)]
    pub labeled: Option<bool>,
}

/// Typed label-edit event payload.
#[derive(Debug, Deserialize)]
pub struct LabelEditEvent {
    pub label_id: String,
    #[serde(default)]
    pub action: Option<LabelEditAction>,
}

/// Label-edit action; unset fields fall back to their zero values.
#[derive(Debug, Default, Deserialize)]
pub struct LabelEditAction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<i32>,
    #[serde(default)]
    pub predefined_id: Option<i32>,
    #[serde(default)]
    pub deleted: Option<bool>,
}

/// Decoded view of a generic delta's action payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncActionValue {
    #[serde(default)]
    pub label_association_action: Option<ChatLabelAssociationAction>,
}

/// Decode the raw action payload of a label-related delta.
pub fn decode_sync_action(raw: &RawValue) -> Result<SyncActionValue, serde_json::Error> {
    serde_json::from_str(raw.get())
}
