use tracing::info;

use crate::labels::store::LabelStore;
use crate::labels::types::Label;

/// Well-known starter labels, created once per user. IDs are stable so a
/// platform resync maps onto the same entries.
const DEFAULT_LABELS: [(&str, &str, i32); 6] = [
    ("importante", "⭐ Importante", 0),
    ("trabalho", "💼 Trabalho", 4),
    ("familia", "👨‍👩‍👧‍👦 Família", 3),
    ("urgente", "🚨 Urgente", 0),
    ("pendente", "⏳ Pendente", 1),
    ("concluido", "✅ Concluído", 3),
];

/// Insert any missing default labels for the user. Existing entries are
/// never touched, soft-deleted ones included. Returns how many were added.
pub async fn seed_defaults(labels: &dyn LabelStore, user_id: &str) -> usize {
    let mut seeded = 0;
    for (id, name, color) in DEFAULT_LABELS {
        if labels
            .insert_if_absent(user_id, Label::new_active(id, name, color))
            .await
        {
            seeded += 1;
        }
    }
    if seeded > 0 {
        info!(user_id, seeded, "seeded default labels");
    }
    seeded
}
