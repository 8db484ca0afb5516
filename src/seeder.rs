use std::time::Duration;

use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::IndexModel;

use crate::auth::models::Role;
use crate::auth::password::hash_password;
use crate::config::BootstrapSettings;
use crate::db::session_repository::SESSIONS_COLLECTION;
use crate::db::staged_repository::StagedRepository;
use crate::error::AppError;
use crate::models::record::{new_record_id, AuditTrail, RecordKind};
use crate::models::user::User;

/// Create the indexes the repositories rely on. Idempotent.
pub async fn ensure_indexes(db: &mongodb::Database) -> Result<(), AppError> {
    let unique_username = IndexModel::builder()
        .keys(doc! { "username": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    db.collection::<mongodb::bson::Document>(&RecordKind::User.confirmed_collection())
        .create_index(unique_username)
        .await?;

    // Notifications are queried with an `$or` over both recipient fields.
    let recipients = ["recipient_user", "recipient_role"].map(|field| {
        let mut keys = mongodb::bson::Document::new();
        keys.insert(field, 1);
        IndexModel::builder().keys(keys).build()
    });
    db.collection::<mongodb::bson::Document>("notifications")
        .create_indexes(recipients)
        .await?;

    // Mongo removes a session once its `expires_at` date has passed.
    let session_expiry = IndexModel::builder()
        .keys(doc! { "expires_at": 1 })
        .options(IndexOptions::builder().expire_after(Duration::ZERO).build())
        .build();
    db.collection::<mongodb::bson::Document>(SESSIONS_COLLECTION)
        .create_index(session_expiry)
        .await?;

    tracing::info!("Database indexes ensured");
    Ok(())
}

/// Seed a confirmed admin account when none exists and a password is configured.
///
/// Returns `true` if an account was created.
pub async fn seed_admin(
    users: &dyn StagedRepository<User>,
    settings: &BootstrapSettings,
) -> Result<bool, AppError> {
    let Some(password) = settings.admin_password.as_deref() else {
        return Ok(false);
    };

    let admin_role = Role::Admin.to_string();
    if users.find_confirmed_by("role", &admin_role).await?.is_some() {
        tracing::debug!("An admin account already exists, skipping bootstrap");
        return Ok(false);
    }
    if users
        .find_confirmed_by("username", &settings.admin_username)
        .await?
        .is_some()
    {
        tracing::warn!(
            username = %settings.admin_username,
            "Bootstrap admin username is taken by a non-admin account, skipping"
        );
        return Ok(false);
    }

    let mut audit = AuditTrail::submitted("bootstrap");
    audit.approved_by = Some("bootstrap".to_string());
    audit.approved_at = Some(audit.submitted_at);

    let admin = User {
        id: new_record_id(),
        username: settings.admin_username.clone(),
        name: settings.admin_name.clone(),
        email: settings.admin_email.clone(),
        phone: None,
        role: Role::Admin,
        password_hash: hash_password(password),
        audit,
    };
    users.upsert_confirmed(&admin).await?;

    tracing::info!(username = %admin.username, "Seeded bootstrap admin account");
    Ok(true)
}
