use std::sync::Arc;

use anyhow::{Result, anyhow};
use platform_client::{
    AppStatePatch, InMemorySessionRegistry, LabelSyncEvent, SessionError, SessionProvider,
};

use crate::labels::reconciler::{EventReconciler, ReconcileOutcome};
use crate::labels::service::{LabelError, LabelPolicyConfig, LabelService, generate_label_id};
use crate::labels::store::{self, AssociationStore, LabelStore};
use crate::labels::types::{CreateLabelRequest, EditLabelRequest};

const USER: &str = "user-1";

struct Gateway {
    service: LabelService,
    reconciler: EventReconciler,
    labels: Arc<dyn LabelStore>,
    associations: Arc<dyn AssociationStore>,
    sessions: Arc<InMemorySessionRegistry>,
}

fn gateway() -> Gateway {
    let labels = store::memory_labels();
    let associations = store::memory_associations();
    let sessions = InMemorySessionRegistry::shared();
    let service = LabelService::new(labels.clone(), associations.clone(), sessions.clone());
    let reconciler = EventReconciler::new(labels.clone(), associations.clone());
    Gateway {
        service,
        reconciler,
        labels,
        associations,
        sessions,
    }
}

async fn connected_gateway() -> Gateway {
    let gw = gateway();
    gw.sessions.connect(USER).await;
    gw
}

fn sync_event(json: &str) -> Result<LabelSyncEvent> {
    Ok(serde_json::from_str(json)?)
}

fn create_request(name: &str, color: i32) -> CreateLabelRequest {
    CreateLabelRequest {
        name: name.to_string(),
        color,
    }
}

#[tokio::test]
async fn create_label_generates_id_and_lists_as_active() -> Result<()> {
    let gw = connected_gateway().await;

    let created = gw.service.create_label(USER, create_request("Urgent", 0)).await?;
    assert!(created.label_id.starts_with("label_"));
    assert!(created.label_id.ends_with("_Urgent"));

    let active = gw.service.list_active_labels(USER).await?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "Urgent");
    assert_eq!(active[0].color, 0);
    assert!(active[0].active);
    assert!(!active[0].deleted);

    let patches = gw.sessions.sent_patches(USER).await;
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].index, vec!["label_edit", created.label_id.as_str()]);
    assert_eq!(patches[0].action["labelEditAction"]["name"], "Urgent");
    Ok(())
}

#[tokio::test]
async fn create_label_requires_a_name() -> Result<()> {
    let gw = connected_gateway().await;
    let result = gw.service.create_label(USER, create_request("   ", 1)).await;
    match result {
        Err(LabelError::Validation(message)) => assert!(message.contains("name")),
        other => return Err(anyhow!("expected validation error, got {other:?}")),
    }
    assert_eq!(gw.sessions.send_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn operations_without_a_connected_session_are_rejected() -> Result<()> {
    let gw = gateway();

    let create = gw.service.create_label(USER, create_request("Urgent", 0)).await;
    assert!(matches!(create, Err(LabelError::SessionUnavailable(_))));

    let list = gw.service.list_active_labels(USER).await;
    assert!(matches!(list, Err(LabelError::SessionUnavailable(_))));

    assert_eq!(gw.sessions.send_calls(), 0);
    assert!(gw.labels.get(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn rejected_send_leaves_the_cache_unchanged() -> Result<()> {
    let gw = connected_gateway().await;
    gw.sessions.fail_sends(true);

    let result = gw.service.create_label(USER, create_request("Urgent", 0)).await;
    assert!(matches!(result, Err(LabelError::RemoteSend(_))));
    assert_eq!(gw.sessions.send_calls(), 1);
    assert!(gw.labels.get(USER).await.is_empty());

    let associate = gw.service.associate(USER, "123@c.us", "importante").await;
    assert!(matches!(associate, Err(LabelError::RemoteSend(_))));
    assert!(gw.associations.list(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn send_timeout_surfaces_as_remote_send_error() -> Result<()> {
    struct StalledSession;

    #[async_trait::async_trait]
    impl SessionProvider for StalledSession {
        async fn is_connected(&self, _user_id: &str) -> bool {
            true
        }

        async fn send_patch(
            &self,
            _user_id: &str,
            _patch: AppStatePatch,
        ) -> Result<(), SessionError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn request_resync(&self, _user_id: &str) -> Result<(), SessionError> {
            Ok(())
        }
    }

    let labels = store::memory_labels();
    let associations = store::memory_associations();
    let service = LabelService::new_with_policy(
        labels.clone(),
        associations,
        Arc::new(StalledSession),
        LabelPolicyConfig { send_timeout_ms: 50 },
    );

    let result = service.create_label(USER, create_request("Urgent", 0)).await;
    match result {
        Err(LabelError::RemoteSend(message)) => assert!(message.contains("timed out")),
        other => return Err(anyhow!("expected timeout error, got {other:?}")),
    }
    assert!(labels.get(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn associating_twice_keeps_one_entry_but_resends_the_patch() -> Result<()> {
    let gw = connected_gateway().await;

    gw.service.associate(USER, "123@c.us", "importante").await?;
    gw.service.associate(USER, "123@c.us", "importante").await?;

    let associations = gw.service.list_associations(USER).await;
    assert_eq!(associations.len(), 1);
    assert_eq!(associations[0].chat_jid, "123@c.us");
    assert_eq!(associations[0].label_id, "importante");
    // Cache-side idempotence only; the platform sees every request.
    assert_eq!(gw.sessions.send_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn associate_normalizes_the_stored_jid() -> Result<()> {
    let gw = connected_gateway().await;

    gw.service.associate(USER, " 123@C.US ", "importante").await?;

    let chats = gw.service.labeled_chats(USER, "importante").await?;
    assert_eq!(chats, vec!["123@c.us"]);

    let patches = gw.sessions.sent_patches(USER).await;
    assert_eq!(patches[0].index, vec!["label_jid", "importante", "123@c.us"]);
    Ok(())
}

#[tokio::test]
async fn associate_rejects_an_invalid_chat_jid() -> Result<()> {
    let gw = connected_gateway().await;

    let result = gw.service.associate(USER, "not-a-jid", "importante").await;
    match result {
        Err(LabelError::Validation(message)) => assert!(message.contains("invalid chat JID")),
        other => return Err(anyhow!("expected validation error, got {other:?}")),
    }
    assert_eq!(gw.sessions.send_calls(), 0);
    assert!(gw.associations.list(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn delete_soft_deletes_and_the_patch_carries_current_fields() -> Result<()> {
    let gw = connected_gateway().await;
    let created = gw.service.create_label(USER, create_request("Urgent", 2)).await?;

    gw.service.delete_label(USER, &created.label_id).await?;

    let active = gw.service.list_active_labels(USER).await?;
    assert!(active.is_empty());

    let label = gw
        .labels
        .get_label(USER, &created.label_id)
        .await
        .ok_or_else(|| anyhow!("deleted label should stay resolvable"))?;
    assert!(label.deleted);
    assert!(!label.active);
    assert_eq!(label.name, "Urgent");

    let patches = gw.sessions.sent_patches(USER).await;
    assert_eq!(patches.len(), 2);
    assert_eq!(patches[1].action["labelEditAction"]["name"], "Urgent");
    assert_eq!(patches[1].action["labelEditAction"]["color"], 2);
    assert_eq!(patches[1].action["labelEditAction"]["deleted"], true);
    Ok(())
}

#[tokio::test]
async fn delete_of_unknown_label_sends_empty_fields_and_stores_nothing() -> Result<()> {
    let gw = connected_gateway().await;

    gw.service.delete_label(USER, "label_missing").await?;

    let patches = gw.sessions.sent_patches(USER).await;
    assert_eq!(patches[0].action["labelEditAction"]["name"], "");
    assert_eq!(patches[0].action["labelEditAction"]["color"], 0);
    assert_eq!(patches[0].action["labelEditAction"]["deleted"], true);
    assert!(gw.labels.get(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn edit_updates_an_existing_label_in_place() -> Result<()> {
    let gw = connected_gateway().await;
    let created = gw.service.create_label(USER, create_request("Urgent", 0)).await?;

    gw.service
        .edit_label(
            USER,
            EditLabelRequest {
                label_id: created.label_id.clone(),
                name: "Renamed".to_string(),
                color: 3,
            },
        )
        .await?;

    let label = gw
        .labels
        .get_label(USER, &created.label_id)
        .await
        .ok_or_else(|| anyhow!("label should exist"))?;
    assert_eq!(label.name, "Renamed");
    assert_eq!(label.color, 3);
    assert!(label.active);
    Ok(())
}

#[tokio::test]
async fn edit_of_unknown_label_creates_an_active_entry() -> Result<()> {
    let gw = connected_gateway().await;

    gw.service
        .edit_label(
            USER,
            EditLabelRequest {
                label_id: "platform_42".to_string(),
                name: "Imported".to_string(),
                color: 1,
            },
        )
        .await?;

    let label = gw
        .labels
        .get_label(USER, "platform_42")
        .await
        .ok_or_else(|| anyhow!("edit of unknown id should create"))?;
    assert!(label.active);
    assert_eq!(label.name, "Imported");
    Ok(())
}

#[tokio::test]
async fn edit_requires_label_id_and_name() -> Result<()> {
    let gw = connected_gateway().await;

    let missing_id = gw
        .service
        .edit_label(
            USER,
            EditLabelRequest {
                label_id: String::new(),
                name: "x".to_string(),
                color: 0,
            },
        )
        .await;
    assert!(matches!(missing_id, Err(LabelError::Validation(_))));

    let missing_name = gw
        .service
        .edit_label(
            USER,
            EditLabelRequest {
                label_id: "importante".to_string(),
                name: "  ".to_string(),
                color: 0,
            },
        )
        .await;
    assert!(matches!(missing_name, Err(LabelError::Validation(_))));
    assert_eq!(gw.sessions.send_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn seeding_inserts_once_and_never_overwrites_edits() -> Result<()> {
    let gw = connected_gateway().await;

    assert_eq!(gw.service.seed_defaults(USER).await?, 6);

    gw.service
        .edit_label(
            USER,
            EditLabelRequest {
                label_id: "trabalho".to_string(),
                name: "Work".to_string(),
                color: 2,
            },
        )
        .await?;

    assert_eq!(gw.service.seed_defaults(USER).await?, 0);

    let label = gw
        .labels
        .get_label(USER, "trabalho")
        .await
        .ok_or_else(|| anyhow!("seeded label should exist"))?;
    assert_eq!(label.name, "Work");
    assert_eq!(label.color, 2);
    Ok(())
}

#[tokio::test]
async fn request_sync_requires_a_session_and_reaches_the_provider() -> Result<()> {
    let gw = gateway();

    let result = gw.service.request_sync(USER).await;
    assert!(matches!(result, Err(LabelError::SessionUnavailable(_))));
    assert_eq!(gw.sessions.resync_calls(), 0);

    gw.sessions.connect(USER).await;
    gw.service.request_sync(USER).await?;
    assert_eq!(gw.sessions.resync_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn reconciled_unlabel_event_clears_a_locally_added_pair() -> Result<()> {
    let gw = connected_gateway().await;
    gw.service.associate(USER, "123@c.us", "importante").await?;

    let event = sync_event(
        r#"{"chat_label_association": {"chat_jid": "123@c.us", "label_id": "importante", "action": {"labeled": false}}}"#,
    )?;
    let outcome = gw.reconciler.handle_event(USER, event).await;
    assert_eq!(
        outcome,
        ReconcileOutcome::AssociationUpdated {
            chat_jid: "123@c.us".to_string(),
            label_id: "importante".to_string(),
            labeled: false,
        }
    );
    assert!(gw.associations.list(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn reconciled_unlabel_of_an_absent_pair_is_a_noop() -> Result<()> {
    let gw = gateway();

    let event = sync_event(
        r#"{"chat_label_association": {"chat_jid": "999@c.us", "label_id": "familia", "action": {"labeled": false}}}"#,
    )?;
    let outcome = gw.reconciler.handle_event(USER, event).await;
    assert!(matches!(
        outcome,
        ReconcileOutcome::AssociationUpdated { labeled: false, .. }
    ));
    assert!(gw.associations.list(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn association_event_without_labeled_flag_removes() -> Result<()> {
    let gw = connected_gateway().await;
    gw.service.associate(USER, "123@c.us", "urgente").await?;

    let event = sync_event(
        r#"{"chat_label_association": {"chat_jid": "123@c.us", "label_id": "urgente"}}"#,
    )?;
    gw.reconciler.handle_event(USER, event).await;
    assert!(gw.associations.list(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn association_event_with_empty_ids_is_dropped() -> Result<()> {
    let gw = gateway();

    let event = sync_event(
        r#"{"chat_label_association": {"chat_jid": "", "label_id": "importante", "action": {"labeled": true}}}"#,
    )?;
    let outcome = gw.reconciler.handle_event(USER, event).await;
    assert_eq!(outcome, ReconcileOutcome::Dropped);
    assert!(gw.associations.list(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn reconciling_the_same_label_edit_twice_converges() -> Result<()> {
    let gw = gateway();
    let json = r#"{"label_edit": {"label_id": "platform_7", "action": {"name": "Clientes", "color": 5, "predefined_id": 2, "deleted": false}}}"#;

    let first = gw.reconciler.handle_event(USER, sync_event(json)?).await;
    let second = gw.reconciler.handle_event(USER, sync_event(json)?).await;
    assert_eq!(first, second);

    let labels = gw.labels.get(USER).await;
    assert_eq!(labels.len(), 1);
    let label = gw
        .labels
        .get_label(USER, "platform_7")
        .await
        .ok_or_else(|| anyhow!("label should exist"))?;
    assert_eq!(label.name, "Clientes");
    assert_eq!(label.predefined_id.as_deref(), Some("2"));
    assert!(label.active);
    Ok(())
}

#[tokio::test]
async fn label_edit_event_is_a_full_replace() -> Result<()> {
    let gw = gateway();

    gw.reconciler
        .handle_event(
            USER,
            sync_event(
                r#"{"label_edit": {"label_id": "x1", "action": {"name": "Named", "color": 4, "deleted": false}}}"#,
            )?,
        )
        .await;
    // A later event with fewer fields resets the missing ones.
    gw.reconciler
        .handle_event(
            USER,
            sync_event(r#"{"label_edit": {"label_id": "x1", "action": {"deleted": true}}}"#)?,
        )
        .await;

    let label = gw
        .labels
        .get_label(USER, "x1")
        .await
        .ok_or_else(|| anyhow!("label should exist"))?;
    assert!(label.deleted);
    assert!(!label.active);
    assert_eq!(label.name, "");
    assert_eq!(label.color, 0);
    Ok(())
}

#[tokio::test]
async fn label_edit_event_with_empty_id_is_dropped() -> Result<()> {
    let gw = gateway();
    let event = sync_event(r#"{"label_edit": {"label_id": "", "action": {"name": "x"}}}"#)?;
    let outcome = gw.reconciler.handle_event(USER, event).await;
    assert_eq!(outcome, ReconcileOutcome::Dropped);
    assert!(gw.labels.get(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn label_jid_delta_applies_the_decoded_labeled_flag() -> Result<()> {
    let gw = gateway();

    let add = sync_event(
        r#"{"app_state_delta": {"index": ["label_jid", "importante", "123@c.us"], "action": {"labelAssociationAction": {"labeled": true}}}}"#,
    )?;
    let outcome = gw.reconciler.handle_event(USER, add).await;
    assert!(matches!(
        outcome,
        ReconcileOutcome::AssociationUpdated { labeled: true, .. }
    ));
    assert_eq!(gw.associations.list(USER).await.len(), 1);

    let remove = sync_event(
        r#"{"app_state_delta": {"index": ["label_jid", "importante", "123@c.us"], "action": {"labelAssociationAction": {"labeled": false}}}}"#,
    )?;
    gw.reconciler.handle_event(USER, remove).await;
    assert!(gw.associations.list(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn label_edit_delta_is_acknowledged_without_store_changes() -> Result<()> {
    let gw = gateway();
    let event = sync_event(
        r#"{"app_state_delta": {"index": ["label_edit", "label_1_x"], "action": {"labelEditAction": {"name": "x"}}}}"#,
    )?;
    let outcome = gw.reconciler.handle_event(USER, event).await;
    assert_eq!(
        outcome,
        ReconcileOutcome::LabelEditAcknowledged {
            label_id: "label_1_x".to_string(),
        }
    );
    assert!(gw.labels.get(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn undecodable_delta_action_is_dropped() -> Result<()> {
    let gw = gateway();
    let event = sync_event(
        r#"{"app_state_delta": {"index": ["label_jid", "importante", "123@c.us"], "action": "not an object"}}"#,
    )?;
    let outcome = gw.reconciler.handle_event(USER, event).await;
    assert_eq!(outcome, ReconcileOutcome::Dropped);
    assert!(gw.associations.list(USER).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn unrelated_or_truncated_delta_indexes_are_ignored() -> Result<()> {
    let gw = gateway();

    let unrelated = sync_event(
        r#"{"app_state_delta": {"index": ["archive", "123@c.us"], "action": {}}}"#,
    )?;
    assert_eq!(
        gw.reconciler.handle_event(USER, unrelated).await,
        ReconcileOutcome::Ignored
    );

    let truncated = sync_event(
        r#"{"app_state_delta": {"index": ["label_jid", "importante"], "action": {}}}"#,
    )?;
    assert_eq!(
        gw.reconciler.handle_event(USER, truncated).await,
        ReconcileOutcome::Ignored
    );
    Ok(())
}

#[tokio::test]
async fn store_reads_hand_out_defensive_copies() -> Result<()> {
    let gw = connected_gateway().await;
    let created = gw.service.create_label(USER, create_request("Urgent", 0)).await?;

    let snapshot = gw.labels.get(USER).await;

    gw.service
        .edit_label(
            USER,
            EditLabelRequest {
                label_id: created.label_id.clone(),
                name: "Renamed".to_string(),
                color: 1,
            },
        )
        .await?;

    let before = snapshot
        .get(&created.label_id)
        .ok_or_else(|| anyhow!("snapshot should contain the label"))?;
    assert_eq!(before.name, "Urgent");
    let after = gw
        .labels
        .get_label(USER, &created.label_id)
        .await
        .ok_or_else(|| anyhow!("label should exist"))?;
    assert_eq!(after.name, "Renamed");
    Ok(())
}

#[tokio::test]
async fn concurrent_mutations_and_events_settle_consistently() -> Result<()> {
    let gw = connected_gateway().await;

    let event = sync_event(
        r#"{"app_state_delta": {"index": ["label_jid", "pendente", "3@c.us"], "action": {"labelAssociationAction": {"labeled": true}}}}"#,
    )?;
    let (first, second, _) = tokio::join!(
        gw.service.associate(USER, "1@c.us", "pendente"),
        gw.service.associate(USER, "2@c.us", "pendente"),
        gw.reconciler.handle_event(USER, event),
    );
    first?;
    second?;

    let chats = gw.service.labeled_chats(USER, "pendente").await?;
    assert_eq!(chats.len(), 3);
    Ok(())
}

#[test]
fn generated_label_ids_are_time_and_name_derived() -> Result<()> {
    let now = chrono::DateTime::from_timestamp(1_700_000_000, 0)
        .ok_or_else(|| anyhow!("valid timestamp"))?;
    assert_eq!(
        generate_label_id("My Label", now),
        "label_1700000000_My_Label"
    );
    assert_eq!(generate_label_id("Urgent", now), "label_1700000000_Urgent");
    Ok(())
}
