use chrono::Utc;
use uuid::Uuid;

use ednova_domain::user::UserRole;

use crate::domain::repository::PurchaseRepository;
use crate::error::LmsError;

/// Signed-in user a use case acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Learners need an unexpired purchase of the course. Admins always pass.
pub async fn ensure_course_access<P: PurchaseRepository>(
    purchases: &P,
    caller: Caller,
    course_id: Uuid,
) -> Result<(), LmsError> {
    if caller.is_admin() {
        return Ok(());
    }
    if purchases
        .has_active(caller.user_id, course_id, Utc::now())
        .await?
    {
        Ok(())
    } else {
        Err(LmsError::NoActivePurchase)
    }
}
