use diesel::prelude::*;

use crate::schema::audit_log;

/// Records an admin action. Fire-and-forget: a failed insert is logged and
/// never fails the action that triggered it.
pub fn log_audit(
    conn: &mut SqliteConnection,
    user_id: i32,
    action: &str,
    resource_id: &str,
    metadata: serde_json::Value,
) {
    let result = diesel::insert_into(audit_log::table)
        .values((
            audit_log::user_id.eq(user_id),
            audit_log::action.eq(action),
            audit_log::resource_id.eq(resource_id),
            audit_log::metadata.eq(metadata.to_string()),
        ))
        .execute(conn);

    if let Err(e) = result {
        log::error!("Failed to write audit entry '{}': {}", action, e);
    }
}
