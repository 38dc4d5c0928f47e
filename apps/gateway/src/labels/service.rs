use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use platform_client::{
    AppStatePatch, Jid, SessionError, SessionProvider, build_label_association, build_label_edit,
};
use tracing::info;

use crate::labels::seed;
use crate::labels::store::{AssociationStore, LabelStore};
use crate::labels::types::{
    ChatLabelAssociation, CreateLabelRequest, CreatedLabel, EditLabelRequest, Label,
};

#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("no connected session for user {0}")]
    SessionUnavailable(String),
    #[error("remote send failed: {0}")]
    RemoteSend(String),
}

impl LabelError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_request",
            Self::SessionUnavailable(_) => "session_unavailable",
            Self::RemoteSend(_) => "remote_send_failed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::SessionUnavailable(user_id) => {
                format!("no connected session for user {user_id}")
            }
            Self::RemoteSend(message) => format!("remote send failed: {message}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LabelPolicyConfig {
    pub send_timeout_ms: u64,
}

impl Default for LabelPolicyConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 10_000,
        }
    }
}

/// Mutation gateway and query surface over the label caches.
///
/// Every mutating operation follows the same protocol: validate, require a
/// connected session, send the encoded patch to the platform, and only then
/// apply the equivalent local change. A rejected or timed-out send leaves
/// the stores untouched.
#[derive(Clone)]
pub struct LabelService {
    labels: Arc<dyn LabelStore>,
    associations: Arc<dyn AssociationStore>,
    sessions: Arc<dyn SessionProvider>,
    policy: LabelPolicyConfig,
}

impl LabelService {
    pub fn new(
        labels: Arc<dyn LabelStore>,
        associations: Arc<dyn AssociationStore>,
        sessions: Arc<dyn SessionProvider>,
    ) -> Self {
        Self::new_with_policy(labels, associations, sessions, LabelPolicyConfig::default())
    }

    pub fn new_with_policy(
        labels: Arc<dyn LabelStore>,
        associations: Arc<dyn AssociationStore>,
        sessions: Arc<dyn SessionProvider>,
        policy: LabelPolicyConfig,
    ) -> Self {
        Self {
            labels,
            associations,
            sessions,
            policy,
        }
    }

    /// Active labels for the user, sorted by ID for stable output.
    pub async fn list_active_labels(&self, user_id: &str) -> Result<Vec<Label>, LabelError> {
        self.require_connected(user_id).await?;
        let mut labels: Vec<Label> = self
            .labels
            .get(user_id)
            .await
            .into_values()
            .filter(|label| label.active)
            .collect();
        labels.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(labels)
    }

    pub async fn create_label(
        &self,
        user_id: &str,
        request: CreateLabelRequest,
    ) -> Result<CreatedLabel, LabelError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(LabelError::Validation("name is required".to_string()));
        }
        self.require_connected(user_id).await?;

        let label_id = generate_label_id(name, Utc::now());
        let patch = build_label_edit(&label_id, name, request.color, false);
        self.send_patch(user_id, patch).await?;

        self.labels
            .upsert(user_id, Label::new_active(label_id.clone(), name, request.color))
            .await;
        info!(user_id, label_id = %label_id, color = request.color, "label created");
        Ok(CreatedLabel {
            label_id,
            name: name.to_string(),
            color: request.color,
        })
    }

    /// Replace name and color on an existing label. The platform treats an
    /// edit of an unknown ID as a create, so the cache does too.
    pub async fn edit_label(
        &self,
        user_id: &str,
        request: EditLabelRequest,
    ) -> Result<(), LabelError> {
        if request.label_id.trim().is_empty() {
            return Err(LabelError::Validation("label_id is required".to_string()));
        }
        let name = request.name.trim();
        if name.is_empty() {
            return Err(LabelError::Validation("name is required".to_string()));
        }
        self.require_connected(user_id).await?;

        let patch = build_label_edit(&request.label_id, name, request.color, false);
        self.send_patch(user_id, patch).await?;

        match self.labels.get_label(user_id, &request.label_id).await {
            Some(mut label) => {
                label.name = name.to_string();
                label.color = request.color;
                self.labels.upsert(user_id, label).await;
            }
            None => {
                self.labels
                    .upsert(
                        user_id,
                        Label::new_active(request.label_id.clone(), name, request.color),
                    )
                    .await;
            }
        }
        info!(user_id, label_id = %request.label_id, "label edited");
        Ok(())
    }

    /// Soft delete. The deletion patch must carry the label's current name
    /// and color; unknown IDs send empty values and leave the cache alone.
    pub async fn delete_label(&self, user_id: &str, label_id: &str) -> Result<(), LabelError> {
        if label_id.trim().is_empty() {
            return Err(LabelError::Validation("label_id is required".to_string()));
        }
        self.require_connected(user_id).await?;

        let (name, color) = self
            .labels
            .get_label(user_id, label_id)
            .await
            .map(|label| (label.name, label.color))
            .unwrap_or_default();
        let patch = build_label_edit(label_id, &name, color, true);
        self.send_patch(user_id, patch).await?;

        self.labels.mark_deleted(user_id, label_id).await;
        info!(user_id, label_id = %label_id, "label deleted");
        Ok(())
    }

    pub async fn associate(
        &self,
        user_id: &str,
        chat_jid: &str,
        label_id: &str,
    ) -> Result<ChatLabelAssociation, LabelError> {
        let chat = validated_chat(chat_jid, label_id)?;
        self.require_connected(user_id).await?;

        let patch = build_label_association(&chat, label_id, true);
        self.send_patch(user_id, patch).await?;

        let chat_jid = chat.to_string();
        let added = self.associations.add(user_id, &chat_jid, label_id).await;
        info!(user_id, chat_jid = %chat_jid, label_id = %label_id, added, "chat labeled");
        Ok(ChatLabelAssociation {
            chat_jid,
            label_id: label_id.to_string(),
        })
    }

    pub async fn disassociate(
        &self,
        user_id: &str,
        chat_jid: &str,
        label_id: &str,
    ) -> Result<ChatLabelAssociation, LabelError> {
        let chat = validated_chat(chat_jid, label_id)?;
        self.require_connected(user_id).await?;

        let patch = build_label_association(&chat, label_id, false);
        self.send_patch(user_id, patch).await?;

        let chat_jid = chat.to_string();
        let removed = self.associations.remove(user_id, &chat_jid, label_id).await;
        info!(user_id, chat_jid = %chat_jid, label_id = %label_id, removed, "chat unlabeled");
        Ok(ChatLabelAssociation {
            chat_jid,
            label_id: label_id.to_string(),
        })
    }

    /// Chat JIDs currently carrying the label. Pure cache read.
    pub async fn labeled_chats(
        &self,
        user_id: &str,
        label_id: &str,
    ) -> Result<Vec<String>, LabelError> {
        if label_id.trim().is_empty() {
            return Err(LabelError::Validation("label_id is required".to_string()));
        }
        Ok(self
            .associations
            .list(user_id)
            .await
            .into_iter()
            .filter(|entry| entry.label_id == label_id)
            .map(|entry| entry.chat_jid)
            .collect())
    }

    pub async fn list_associations(&self, user_id: &str) -> Vec<ChatLabelAssociation> {
        self.associations.list(user_id).await
    }

    pub async fn seed_defaults(&self, user_id: &str) -> Result<usize, LabelError> {
        self.require_connected(user_id).await?;
        Ok(seed::seed_defaults(self.labels.as_ref(), user_id).await)
    }

    /// Ask the platform to redeliver the user's label state.
    pub async fn request_sync(&self, user_id: &str) -> Result<(), LabelError> {
        self.require_connected(user_id).await?;
        self.sessions
            .request_resync(user_id)
            .await
            .map_err(map_session_error)?;
        info!(user_id, "label resync requested");
        Ok(())
    }

    async fn require_connected(&self, user_id: &str) -> Result<(), LabelError> {
        if self.sessions.is_connected(user_id).await {
            Ok(())
        } else {
            Err(LabelError::SessionUnavailable(user_id.to_string()))
        }
    }

    async fn send_patch(&self, user_id: &str, patch: AppStatePatch) -> Result<(), LabelError> {
        let timeout = Duration::from_millis(self.policy.send_timeout_ms);
        match tokio::time::timeout(timeout, self.sessions.send_patch(user_id, patch)).await {
            Ok(result) => result.map_err(map_session_error),
            Err(_) => Err(LabelError::RemoteSend(format!(
                "patch send timed out after {}ms",
                self.policy.send_timeout_ms
            ))),
        }
    }
}

fn validated_chat(chat_jid: &str, label_id: &str) -> Result<Jid, LabelError> {
    if chat_jid.trim().is_empty() {
        return Err(LabelError::Validation("chat_jid is required".to_string()));
    }
    if label_id.trim().is_empty() {
        return Err(LabelError::Validation("label_id is required".to_string()));
    }
    Jid::parse(chat_jid)
        .map_err(|error| LabelError::Validation(format!("invalid chat JID: {error}")))
}

fn map_session_error(error: SessionError) -> LabelError {
    match error {
        SessionError::NotConnected(user_id) => LabelError::SessionUnavailable(user_id),
        other => LabelError::RemoteSend(other.to_string()),
    }
}

pub(crate) fn generate_label_id(name: &str, now: DateTime<Utc>) -> String {
    format!("label_{}_{}", now.timestamp(), name.replace(' ', "_"))
}
