use serde::{Deserialize, Serialize};

/// One label definition in a user's namespace. Soft-deleted labels keep
/// their entry with `deleted = true, active = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub color: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predefined_id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    pub active: bool,
}

impl Label {
    pub fn new_active(id: impl Into<String>, name: impl Into<String>, color: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color,
            predefined_id: None,
            deleted: false,
            active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLabelAssociation {
    pub chat_jid: String,
    pub label_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLabelRequest {
    pub name: String,
    #[serde(default)]
    pub color: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditLabelRequest {
    pub label_id: String,
    pub name: String,
    #[serde(default)]
    pub color: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedLabel {
    pub label_id: String,
    pub name: String,
    pub color: i32,
}
