use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use ednova_domain::tenant::TenantName;

type Slot = Weak<AsyncMutex<()>>;

/// Per-(tenant, user) async locks serializing progress mutations within this
/// process. Entries are dropped once nobody holds or waits on them.
#[derive(Clone, Default)]
pub struct UserLocks {
    slots: Arc<Mutex<HashMap<(TenantName, Uuid), Slot>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, tenant: &TenantName, user_id: Uuid) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.retain(|_, slot| slot.strong_count() > 0);
            let key = (tenant.clone(), user_id);
            match slots.get(&key).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let fresh = Arc::new(AsyncMutex::new(()));
                    slots.insert(key, Arc::downgrade(&fresh));
                    fresh
                }
            }
        };
        mutex.lock_owned().await
    }

    /// Number of live lock slots.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.values().filter(|s| s.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
