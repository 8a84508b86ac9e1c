use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use ednova_domain::tenant::{TenantName, TenantNameError};

/// Opens and health-checks connections to one tenant's isolated store.
pub trait TenantConnector: Send + Sync + 'static {
    type Conn: Clone + Send + Sync + 'static;

    fn connect(
        &self,
        tenant: &TenantName,
    ) -> impl Future<Output = anyhow::Result<Self::Conn>> + Send;

    fn is_live(&self, conn: &Self::Conn) -> impl Future<Output = bool> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("invalid tenant name: {0}")]
    InvalidName(#[from] TenantNameError),
    #[error("tenant {0} is not served by this instance")]
    NotAllowed(String),
    #[error("failed to connect to tenant {tenant}")]
    Connect {
        tenant: TenantName,
        #[source]
        source: anyhow::Error,
    },
}

/// Lifecycle of a cached tenant connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TenantState {
    Connecting = 0,
    Ready = 1,
    Disconnected = 2,
    Errored = 3,
}

impl TenantState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Connecting,
            1 => Self::Ready,
            2 => Self::Disconnected,
            _ => Self::Errored,
        }
    }
}

/// Open connection to one tenant's store, shared by every request routed to it.
#[derive(Debug)]
pub struct TenantHandle<C> {
    name: TenantName,
    conn: C,
    state: AtomicU8,
}

impl<C> TenantHandle<C> {
    pub fn new(name: TenantName, conn: C) -> Self {
        Self {
            name,
            conn,
            state: AtomicU8::new(TenantState::Ready as u8),
        }
    }

    pub fn name(&self) -> &TenantName {
        &self.name
    }

    pub fn conn(&self) -> &C {
        &self.conn
    }

    pub fn state(&self) -> TenantState {
        TenantState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == TenantState::Ready
    }

    fn set_state(&self, state: TenantState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

type Slot<C> = Arc<OnceCell<Arc<TenantHandle<C>>>>;

/// Process-wide cache of tenant connections.
///
/// Entries are created lazily on first request for a tenant. Concurrent first
/// requests for the same tenant share one connection attempt. Entries leave
/// the cache when evicted, marked errored, or found dead by [`Self::sweep`];
/// the next request for that tenant then reconnects.
pub struct TenantRegistry<C: TenantConnector> {
    connector: C,
    allow_list: Option<HashSet<TenantName>>,
    slots: Mutex<HashMap<TenantName, Slot<C::Conn>>>,
}

impl<C: TenantConnector> TenantRegistry<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            allow_list: None,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Restrict the registry to the given tenants. Invalid names are ignored.
    pub fn with_allow_list<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = names
            .into_iter()
            .filter_map(|n| match TenantName::parse(n.as_ref()) {
                Ok(name) => Some(name),
                Err(e) => {
                    tracing::warn!(tenant = n.as_ref(), error = %e, "ignoring invalid allow-list entry");
                    None
                }
            })
            .collect();
        self.allow_list = Some(allowed);
        self
    }

    /// Validate `raw` and return a live handle for it, connecting if needed.
    pub async fn resolve(&self, raw: &str) -> Result<Arc<TenantHandle<C::Conn>>, TenantError> {
        let name = TenantName::parse(raw)?;
        if let Some(allowed) = &self.allow_list {
            if !allowed.contains(&name) {
                return Err(TenantError::NotAllowed(name.to_string()));
            }
        }

        loop {
            let slot = self.slot(&name);

            if let Some(handle) = slot.get() {
                if handle.is_ready() {
                    tracing::trace!(tenant = %name, "reusing tenant connection");
                    return Ok(Arc::clone(handle));
                }
                // Stale entry left by a failed observer; drop it and retry.
                self.remove_slot(&name, &slot);
                continue;
            }

            let result = slot
                .get_or_try_init(|| async {
                    tracing::info!(tenant = %name, "connecting tenant store");
                    let conn = self.connector.connect(&name).await?;
                    tracing::info!(tenant = %name, "tenant store connected");
                    Ok::<_, anyhow::Error>(Arc::new(TenantHandle::new(name.clone(), conn)))
                })
                .await;

            return match result {
                Ok(handle) => Ok(Arc::clone(handle)),
                Err(source) => {
                    if !slot.initialized() {
                        self.remove_slot(&name, &slot);
                    }
                    Err(TenantError::Connect {
                        tenant: name,
                        source,
                    })
                }
            };
        }
    }

    /// Drop the cached connection for `name`. Returns whether one was cached.
    pub fn evict(&self, name: &TenantName) -> bool {
        let removed = self.lock_slots().remove(name);
        match removed {
            Some(slot) => {
                if let Some(handle) = slot.get() {
                    handle.set_state(TenantState::Disconnected);
                }
                tracing::warn!(tenant = %name, "tenant connection evicted");
                true
            }
            None => false,
        }
    }

    /// Record that `handle` failed mid-request and evict it, unless the cache
    /// already holds a newer handle for the same tenant.
    pub fn mark_errored(&self, handle: &Arc<TenantHandle<C::Conn>>) {
        handle.set_state(TenantState::Errored);
        let mut slots = self.lock_slots();
        let same = slots
            .get(handle.name())
            .and_then(|slot| slot.get())
            .is_some_and(|cached| Arc::ptr_eq(cached, handle));
        if same {
            slots.remove(handle.name());
            tracing::warn!(tenant = %handle.name(), "tenant connection errored, evicted");
        }
    }

    /// Ping every cached connection and evict those that are dead or no longer
    /// ready. Returns the evicted tenant names.
    pub async fn sweep(&self) -> Vec<TenantName> {
        let snapshot: Vec<(TenantName, Slot<C::Conn>)> = self
            .lock_slots()
            .iter()
            .map(|(name, slot)| (name.clone(), Arc::clone(slot)))
            .collect();

        let checks = snapshot.into_iter().filter_map(|(name, slot)| {
            let handle = Arc::clone(slot.get()?);
            Some(async move {
                let alive = handle.is_ready() && self.connector.is_live(handle.conn()).await;
                (name, slot, handle, alive)
            })
        });

        let mut evicted = Vec::new();
        for (name, slot, handle, alive) in join_all(checks).await {
            if alive {
                continue;
            }
            if handle.is_ready() {
                handle.set_state(TenantState::Disconnected);
            }
            if self.remove_slot(&name, &slot) {
                tracing::warn!(tenant = %name, "tenant connection failed health check, evicted");
                evicted.push(name);
            }
        }
        evicted
    }

    /// Cached tenants and their lifecycle state.
    pub fn tenants(&self) -> Vec<(TenantName, TenantState)> {
        let mut out: Vec<_> = self
            .lock_slots()
            .iter()
            .map(|(name, slot)| {
                let state = slot.get().map_or(TenantState::Connecting, |h| h.state());
                (name.clone(), state)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn slot(&self, name: &TenantName) -> Slot<C::Conn> {
        Arc::clone(self.lock_slots().entry(name.clone()).or_default())
    }

    /// Remove `slot` for `name` if it is still the cached one.
    fn remove_slot(&self, name: &TenantName, slot: &Slot<C::Conn>) -> bool {
        let mut slots = self.lock_slots();
        if slots.get(name).is_some_and(|cached| Arc::ptr_eq(cached, slot)) {
            slots.remove(name);
            true
        } else {
            false
        }
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<TenantName, Slot<C::Conn>>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Run [`TenantRegistry::sweep`] every `interval` until the task is aborted.
pub fn spawn_health_sweep<C: TenantConnector>(
    registry: Arc<TenantRegistry<C>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = registry.sweep().await;
            if !evicted.is_empty() {
                tracing::info!(count = evicted.len(), "tenant health sweep evicted connections");
            }
        }
    })
}
