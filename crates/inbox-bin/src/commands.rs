//! Subcommand implementations.

use std::sync::Arc;

use anyhow::Context;
use inbox_config_and_utils::{Config, Paths};
use inbox_realtime::{RealtimeClient, RealtimeConfig};
use inbox_storage::{create_credential_store, CredentialStore};
use tracing::info;
use unread_count::{session_channel, ApiClient, Principal, Session, UnreadCountProvider};

fn open_credentials(paths: &Paths) -> anyhow::Result<Arc<CredentialStore>> {
    paths.ensure_dirs()?;
    let store = create_credential_store(paths).context("failed to open credential store")?;
    Ok(Arc::new(store))
}

/// The session implied by what is stored on disk.
fn stored_session(credentials: &CredentialStore) -> anyhow::Result<Session> {
    let session = match credentials.stored_session()? {
        Some(stored) => {
            let mut principal = Principal::new(stored.user_id);
            principal.email = stored.email;
            Session::authenticated(principal)
        }
        None => Session::anonymous(),
    };
    Ok(session)
}

pub fn login(paths: &Paths, user_id: &str, token: &str, email: Option<&str>) -> anyhow::Result<()> {
    let credentials = open_credentials(paths)?;
    credentials.set_session(user_id, token, email)?;
    println!("Logged in as {}", user_id);
    Ok(())
}

pub fn logout(paths: &Paths) -> anyhow::Result<()> {
    let credentials = open_credentials(paths)?;
    if credentials.clear_session()? {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

/// One-shot fetch. Unlike `watch`, failures are reported rather than read as 0.
pub async fn count(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let credentials = open_credentials(paths)?;
    if credentials.session_token()?.is_none() {
        anyhow::bail!("not logged in; run `inbox-unread login` first");
    }

    let client = ApiClient::from_config(config, credentials)?;
    let response = client
        .get_unread_message_count()
        .await
        .context("failed to fetch unread count")?;
    println!("{}", response.count);
    Ok(())
}

pub async fn watch(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let credentials = open_credentials(paths)?;
    let fetcher = ApiClient::from_config(config, credentials.clone())?;
    let transport = RealtimeClient::new(RealtimeConfig::from(config));

    let (session_tx, session_rx) = session_channel();
    let provider = UnreadCountProvider::new(
        session_rx,
        Arc::new(fetcher),
        Arc::new(transport),
        credentials.clone(),
    );

    let session = stored_session(&credentials)?;
    if !session.is_ready() {
        println!("Not logged in; count stays at 0");
    }
    session_tx.send_replace(session);

    let mut count_rx = provider.handle().watch();
    println!("{}", *count_rx.borrow_and_update());

    info!("Watching unread count; press Ctrl-C to stop");
    loop {
        tokio::select! {
            changed = count_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", *count_rx.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    provider.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_stored_session_round_trips_login_and_logout() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        login(&paths, "u1", "tok", Some("u1@example.com")).unwrap();
        let session = stored_session(&open_credentials(&paths).unwrap()).unwrap();
        let principal = session.ready_principal().unwrap();
        assert_eq!(principal.id, "u1");
        assert_eq!(principal.email.as_deref(), Some("u1@example.com"));

        logout(&paths).unwrap();
        let session = stored_session(&open_credentials(&paths).unwrap()).unwrap();
        assert_eq!(session, Session::anonymous());
    }

    #[tokio::test]
    async fn test_count_requires_login() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let err = count(&Config::default(), &paths).await.unwrap_err();
        assert!(err.to_string().contains("not logged in"));
    }
}
