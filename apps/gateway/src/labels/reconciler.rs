use std::sync::Arc;

use platform_client::{
    AppStateDelta, ChatLabelAssociationEvent, INDEX_LABEL_EDIT, INDEX_LABEL_JID, LabelEditEvent,
    LabelSyncEvent, decode_sync_action,
};
use tracing::{debug, info, warn};

use crate::labels::store::{AssociationStore, LabelStore};
use crate::labels::types::Label;

/// What a reconciled event did to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    LabelUpserted {
        label_id: String,
    },
    AssociationUpdated {
        chat_jid: String,
        label_id: String,
        labeled: bool,
    },
    /// Label-edit deltas carry no decoded fields; the typed event does.
    LabelEditAcknowledged {
        label_id: String,
    },
    /// Not label-related.
    Ignored,
    /// Malformed; logged and discarded.
    Dropped,
}

impl ReconcileOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LabelUpserted { .. } => "label_upserted",
            Self::AssociationUpdated { .. } => "association_updated",
            Self::LabelEditAcknowledged { .. } => "label_edit_acknowledged",
            Self::Ignored => "ignored",
            Self::Dropped => "dropped",
        }
    }
}

/// Merges asynchronously delivered platform events into the label caches.
///
/// Merges are idempotent; replaying an event converges to the same state.
/// No I/O happens here, so a bad event can only ever cost a log line.
pub struct EventReconciler {
    labels: Arc<dyn LabelStore>,
    associations: Arc<dyn AssociationStore>,
}

impl EventReconciler {
    pub fn new(labels: Arc<dyn LabelStore>, associations: Arc<dyn AssociationStore>) -> Self {
        Self {
            labels,
            associations,
        }
    }

    pub async fn handle_event(&self, user_id: &str, event: LabelSyncEvent) -> ReconcileOutcome {
        match event {
            LabelSyncEvent::AppStateDelta(delta) => self.apply_delta(user_id, delta).await,
            LabelSyncEvent::ChatLabelAssociation(event) => {
                self.apply_association(user_id, event).await
            }
            LabelSyncEvent::LabelEdit(event) => self.apply_label_edit(user_id, event).await,
        }
    }

    async fn apply_delta(&self, user_id: &str, delta: AppStateDelta) -> ReconcileOutcome {
        match delta.index.as_slice() {
            [kind, label_id, ..] if kind == INDEX_LABEL_EDIT => {
                debug!(user_id, label_id = %label_id, "label edit delta acknowledged");
                ReconcileOutcome::LabelEditAcknowledged {
                    label_id: label_id.clone(),
                }
            }
            [kind, label_id, chat_jid, ..] if kind == INDEX_LABEL_JID => {
                let action = match decode_sync_action(&delta.action) {
                    Ok(action) => action,
                    Err(error) => {
                        warn!(
                            user_id,
                            index = ?delta.index,
                            %error,
                            "dropping label_jid delta with undecodable action"
                        );
                        return ReconcileOutcome::Dropped;
                    }
                };
                let labeled = action
                    .label_association_action
                    .and_then(|association| association.labeled)
                    .unwrap_or(false);
                self.set_association(user_id, chat_jid, label_id, labeled)
                    .await
            }
            _ => ReconcileOutcome::Ignored,
        }
    }

    async fn apply_association(
        &self,
        user_id: &str,
        event: ChatLabelAssociationEvent,
    ) -> ReconcileOutcome {
        let labeled = event
            .action
            .and_then(|action| action.labeled)
            .unwrap_or(false);
        self.set_association(user_id, &event.chat_jid, &event.label_id, labeled)
            .await
    }

    async fn apply_label_edit(&self, user_id: &str, event: LabelEditEvent) -> ReconcileOutcome {
        if event.label_id.is_empty() {
            warn!(user_id, "dropping label edit event with empty label id");
            return ReconcileOutcome::Dropped;
        }
        let action = event.action.unwrap_or_default();
        let deleted = action.deleted.unwrap_or(false);
        // Full replace: the event is authoritative for every field.
        let label = Label {
            id: event.label_id.clone(),
            name: action.name.unwrap_or_default(),
            color: action.color.unwrap_or_default(),
            predefined_id: action.predefined_id.map(|id| id.to_string()),
            deleted,
            active: !deleted,
        };
        self.labels.upsert(user_id, label).await;
        info!(user_id, label_id = %event.label_id, deleted, "reconciled label edit");
        ReconcileOutcome::LabelUpserted {
            label_id: event.label_id,
        }
    }

    async fn set_association(
        &self,
        user_id: &str,
        chat_jid: &str,
        label_id: &str,
        labeled: bool,
    ) -> ReconcileOutcome {
        if chat_jid.is_empty() || label_id.is_empty() {
            warn!(user_id, "dropping association event with empty chat or label id");
            return ReconcileOutcome::Dropped;
        }
        let changed = if labeled {
            self.associations.add(user_id, chat_jid, label_id).await
        } else {
            self.associations.remove(user_id, chat_jid, label_id).await
        };
        if changed {
            info!(
                user_id,
                chat_jid = %chat_jid,
                label_id = %label_id,
                labeled,
                "reconciled chat-label association"
            );
        } else {
            debug!(
                user_id,
                chat_jid = %chat_jid,
                label_id = %label_id,
                labeled,
                "association event already reflected"
            );
        }
        ReconcileOutcome::AssociationUpdated {
            chat_jid: chat_jid.to_string(),
            label_id: label_id.to_string(),
            labeled,
        }
    }
}
