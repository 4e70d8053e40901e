use sqlx::PgPool;
use uuid::Uuid;

use crate::db::tenant::schema_name;

/// An audit log entry to record.
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: &'static str,
    pub resource_type: &'static str,
    pub resource_id: Option<String>,
}

impl AuditEntry {
    pub fn new(user_id: Uuid, action: &'static str, resource_type: &'static str, id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            action,
            resource_type,
            resource_id: Some(id.to_string()),
        }
    }
}

/// Fire-and-forget audit log entry. Failures are logged, never returned.
pub fn log(pool: PgPool, tenant: &str, entry: AuditEntry) {
    let schema = schema_name(tenant);

    tokio::spawn(async move {
        let res = sqlx::query(&format!(
            r#"INSERT INTO "{schema}".audit_log (user_id, action, resource_type, resource_id)
               VALUES ($1, $2, $3, $4)"#
        ))
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.resource_type)
        .bind(entry.resource_id)
        .execute(&pool)
        .await;

        if let Err(e) = res {
            tracing::warn!("audit log insert failed for schema {schema}: {e}");
        }
    });
}
