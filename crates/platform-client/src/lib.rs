//! Contract between the labels gateway and the remote messaging platform:
//! chat JID parsing, app-state patch encoding, the sync event shapes the
//! platform delivers, and the session provider seam the gateway sends
//! patches through.

pub mod appstate;
pub mod jid;
pub mod session;

pub use appstate::{
    AppStateDelta, AppStatePatch, ChatLabelAssociationAction, ChatLabelAssociationEvent,
    INDEX_LABEL_EDIT, INDEX_LABEL_JID, LabelEditAction, LabelEditEvent, LabelSyncEvent,
    SyncActionValue, build_label_association, build_label_edit, decode_sync_action,
};
pub use jid::{Jid, JidError};
pub use session::{InMemorySessionRegistry, SessionError, SessionProvider};
