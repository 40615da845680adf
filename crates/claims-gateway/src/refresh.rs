//! Single-flight credential refresh
//!
//! At most one refresh call is outstanding at any time. The first caller to
//! observe an expired token creates a ticket and spawns the refresh task;
//! every caller arriving while the ticket exists waits on the same ticket
//! and receives the same outcome.
//!
//! Ticket lifecycle:
//! 1. Created under the slot lock by the first expired caller
//! 2. Refresh task calls the endpoint (no locks held)
//! 3. Task writes the store, then takes the slot lock only to empty the slot
//!    and publish the outcome
//! 4. Waiters wake with the outcome; the next expiry creates a new ticket
//!
//! The task is spawned rather than driven by the first waiter, so a waiter
//! that is dropped (timeout, cancellation) never aborts a refresh the other
//! waiters depend on.

use std::sync::Arc;

use claims_auth::{CredentialPair, CredentialStore, Session};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::error::RefreshFailure;
use crate::metrics;

/// Result shared with every caller attached to one ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The store now holds this pair; retry with its access token
    Refreshed(CredentialPair),
    /// The store is now Anonymous; the caller must re-authenticate
    Failed(RefreshFailure),
}

/// In-flight marker. Holds `None` until the refresh task publishes.
type Ticket = watch::Receiver<Option<RefreshOutcome>>;

/// Guarantees one refresh call per expiry event.
///
/// Cheap to clone; clones share the ticket slot and the store.
#[derive(Clone)]
pub struct RefreshCoordinator {
    store: Arc<CredentialStore>,
    client: reqwest::Client,
    refresh_url: Arc<str>,
    in_flight: Arc<Mutex<Option<Ticket>>>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<CredentialStore>, client: reqwest::Client, refresh_url: String) -> Self {
        Self {
            store,
            client,
            refresh_url: refresh_url.into(),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Obtain a credential newer than `stale_access`, refreshing if needed.
    ///
    /// `stale_access` is the access token the expired request carried (`None`
    /// if it was sent anonymously). If the store already holds a different
    /// access token, someone refreshed or logged in since that request went
    /// out, and the current pair is returned without a network call. If the
    /// store is Anonymous there is nothing to refresh.
    pub async fn ensure_fresh_credential(&self, stale_access: Option<&str>) -> RefreshOutcome {
        let mut ticket = {
            let mut slot = self.in_flight.lock().await;

            match slot.as_ref() {
                // A dropped sender means the task died without publishing
                Some(ticket) if ticket.has_changed().is_ok() => {
                    debug!("attaching to in-flight refresh");
                    ticket.clone()
                }
                _ => match self.store.get().await {
                    Session::Anonymous => {
                        debug!("no session to refresh");
                        return RefreshOutcome::Failed(RefreshFailure::NoCredentials);
                    }
                    Session::Authenticated(pair) if stale_access != Some(pair.access.as_str()) => {
                        debug!("credential already replaced since request was sent");
                        return RefreshOutcome::Refreshed(pair);
                    }
                    Session::Authenticated(pair) => {
                        let (tx, rx) = watch::channel(None);
                        *slot = Some(rx.clone());
                        debug!("starting token refresh");
                        tokio::spawn(self.clone().run(pair, tx));
                        rx
                    }
                },
            }
        };

        match ticket.wait_for(Option::is_some).await {
            Ok(outcome) => outcome
                .clone()
                .unwrap_or(RefreshOutcome::Failed(RefreshFailure::NoCredentials)),
            Err(_) => {
                warn!("refresh task ended without publishing an outcome");
                RefreshOutcome::Failed(RefreshFailure::Transport(
                    "refresh task aborted".into(),
                ))
            }
        }
    }

    /// Store a freshly issued pair (login).
    ///
    /// Takes the ticket slot so no new refresh starts from the pair being
    /// replaced. A refresh already in flight loses its `replace_if` and
    /// hands this pair to its waiters instead.
    pub async fn establish(&self, pair: CredentialPair) -> claims_auth::Result<()> {
        let _slot = self.in_flight.lock().await;
        self.store.set(pair).await?;
        info!("session established");
        Ok(())
    }

    /// Drop the session (logout).
    pub async fn end_session(&self) -> claims_auth::Result<()> {
        let _slot = self.in_flight.lock().await;
        self.store.clear().await?;
        info!("session ended");
        Ok(())
    }

    #[cfg(test)]
    async fn is_refreshing(&self) -> bool {
        self.in_flight.lock().await.is_some()
    }

    /// Refresh task body: one network call, then resolve the ticket.
    async fn run(self, pair: CredentialPair, tx: watch::Sender<Option<RefreshOutcome>>) {
        let result =
            claims_auth::refresh_access(&self.client, &self.refresh_url, &pair.refresh).await;

        // Store first: waiters read the store only after the slot is emptied
        let outcome = match result {
            Ok(response) => {
                let next = response.into_pair(&pair.refresh);
                let replaced = self
                    .store
                    .replace_if(&pair.refresh, Session::Authenticated(next.clone()))
                    .await;
                match replaced {
                    Ok(true) => {
                        info!("token refresh succeeded");
                        metrics::record_refresh("refreshed");
                        RefreshOutcome::Refreshed(next)
                    }
                    Ok(false) => self.superseded().await,
                    Err(e) => {
                        // In-memory session is already updated; only the file lags
                        warn!(error = %e, "failed to persist refreshed credentials");
                        metrics::record_refresh("refreshed");
                        RefreshOutcome::Refreshed(next)
                    }
                }
            }
            Err(e) => {
                let failure = RefreshFailure::from(e);
                warn!(error = %failure, "token refresh failed, clearing session");
                match self.store.replace_if(&pair.refresh, Session::Anonymous).await {
                    Ok(true) => {
                        metrics::record_refresh("failed");
                        RefreshOutcome::Failed(failure)
                    }
                    Ok(false) => self.superseded().await,
                    Err(e) => {
                        warn!(error = %e, "failed to persist cleared session");
                        metrics::record_refresh("failed");
                        RefreshOutcome::Failed(failure)
                    }
                }
            }
        };

        let mut slot = self.in_flight.lock().await;
        *slot = None;
        // send_replace stores the value even if every waiter has gone away
        tx.send_replace(Some(outcome));
    }

    /// Outcome when a login or logout replaced the session mid-refresh.
    async fn superseded(&self) -> RefreshOutcome {
        info!("session replaced during refresh, handing waiters the current session");
        metrics::record_refresh("superseded");
        match self.store.get().await {
            Session::Authenticated(pair) => RefreshOutcome::Refreshed(pair),
            Session::Anonymous => RefreshOutcome::Failed(RefreshFailure::NoCredentials),
        }
    }
}
