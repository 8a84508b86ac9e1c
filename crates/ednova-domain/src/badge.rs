//! Badge reconciliation.
//!
//! Possession is a pure function of current XP and the catalog: a badge is
//! held iff `xp >= threshold`. Dropping below a threshold revokes the badge.

use std::collections::HashSet;

use uuid::Uuid;

/// Catalog entry as seen by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeThreshold {
    pub id: Uuid,
    pub xp_threshold: i64,
}

/// Set changes needed to make a user's badges consistent with their XP.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgePlan {
    pub awarded: Vec<Uuid>,
    pub revoked: Vec<Uuid>,
}

impl BadgePlan {
    pub fn is_empty(&self) -> bool {
        self.awarded.is_empty() && self.revoked.is_empty()
    }
}

/// Compute awards and revocations for `xp` against `catalog`, given the
/// badges the user currently `held`.
///
/// Held ids that are no longer in the catalog are left alone.
pub fn plan(xp: i64, catalog: &[BadgeThreshold], held: &HashSet<Uuid>) -> BadgePlan {
    let mut plan = BadgePlan::default();
    for badge in catalog {
        let eligible = xp >= badge.xp_threshold;
        let holds = held.contains(&badge.id);
        if eligible && !holds {
            plan.awarded.push(badge.id);
        } else if !eligible && holds {
            plan.revoked.push(badge.id);
        }
    }
    plan
}
