/**
 * Server Initialization
 *
 * Wires the concrete stores to the router, seeds the user directory, and
 * starts the background auth-session reaper.
 *
 * # Initialization Process
 *
 * 1. Connect the database (optional; in-memory stores otherwise)
 * 2. Open the attachment store
 * 3. Seed the broadcast pseudo-user and the default admin account
 * 4. Build the router and the auth-session store
 * 5. Spawn the reaper task
 * 6. Assemble the Axum router
 */
use crate::backend::auth::sessions::AuthSessionStore;
use crate::backend::chat::render::PlainRenderer;
use crate::backend::chat::router::MessageRouter;
use crate::backend::routes::router::create_router;
use crate::backend::server::config::{load_database, ServerConfig};
use crate::backend::server::state::AppState;
use crate::backend::store::fs::FsAttachmentStore;
use crate::backend::store::memory::{
    MemoryAttachmentStore, MemoryMessageStore, MemoryUnreadLedger, MemoryUserDirectory,
};
use crate::backend::store::pg::{PgMessageStore, PgUnreadLedger, PgUserDirectory};
use crate::backend::store::{
    AttachmentStore, MessageStore, StoreError, UnreadLedger, UserDirectory,
};
use crate::shared::user::{User, ADMIN_USERNAME, BROADCAST_USERNAME};
use axum::Router;
use std::sync::Arc;

/// Create and configure the Axum application
pub async fn create_app(config: &ServerConfig) -> Router<()> {
    tracing::info!("Initializing chat routing server");

    // Step 1: durable stores, or their in-memory stand-ins
    let db_pool = load_database(config).await;
    let (users, messages, unread): (
        Arc<dyn UserDirectory>,
        Arc<dyn MessageStore>,
        Arc<dyn UnreadLedger>,
    ) = match db_pool {
        Some(pool) => (
            Arc::new(PgUserDirectory::new(pool.clone())),
            Arc::new(PgMessageStore::new(pool.clone())),
            Arc::new(PgUnreadLedger::new(pool)),
        ),
        None => (
            Arc::new(MemoryUserDirectory::new()),
            Arc::new(MemoryMessageStore::new()),
            Arc::new(MemoryUnreadLedger::new()),
        ),
    };

    // Step 2: attachment blobs on disk
    let attachments: Arc<dyn AttachmentStore> =
        match FsAttachmentStore::new(&config.upload_dir) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::error!("Failed to open upload directory: {}", e);
                tracing::warn!("Attachment deletion will be a no-op");
                Arc::new(MemoryAttachmentStore::new())
            }
        };

    // Step 3: a fresh directory needs the broadcast pseudo-user to be usable
    if let Err(e) = ensure_seed_users(users.as_ref()).await {
        tracing::error!("Failed to seed user directory: {}", e);
    }

    // Step 4: the routing core and the shared auth-session store
    let router = Arc::new(MessageRouter::new(
        users,
        messages,
        unread,
        attachments,
        Arc::new(PlainRenderer::new()),
        config.chunk_size,
    ));
    let auth_sessions = Arc::new(AuthSessionStore::new(config.auth_session_ttl));

    // Step 5: low-frequency sweep of idle cookie sessions, off the hot path
    let reaper_store = auth_sessions.clone();
    let reaper_interval = config.reaper_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(reaper_interval);
        interval.tick().await; // first tick fires immediately, skip it
        loop {
            interval.tick().await;
            let purged = reaper_store.purge_expired();
            if purged > 0 {
                tracing::info!("Reaped {} expired auth sessions", purged);
            }
        }
    });

    tracing::info!("Router configured with auth-session reaper");

    // Step 6: routes
    create_router(AppState {
        router,
        auth_sessions,
    })
}

/// Guarantee the accounts every fresh deployment relies on
async fn ensure_seed_users(users: &dyn UserDirectory) -> Result<(), StoreError> {
    if users.find(BROADCAST_USERNAME).await?.is_none() {
        users
            .insert(&User::new(BROADCAST_USERNAME, "Broadcast", ""))
            .await?;
        tracing::info!("Seeded broadcast pseudo-user");
    }
    if users.find(ADMIN_USERNAME).await?.is_none() {
        users.insert(&User::new(ADMIN_USERNAME, "Admin", "User")).await?;
        tracing::info!("Seeded default admin account");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_users_is_idempotent() {
        let users = MemoryUserDirectory::new();
        ensure_seed_users(&users).await.unwrap();
        ensure_seed_users(&users).await.unwrap();
        let all = users.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|u| u.username == BROADCAST_USERNAME));
        assert!(all.iter().any(|u| u.username == ADMIN_USERNAME));
    }
}
