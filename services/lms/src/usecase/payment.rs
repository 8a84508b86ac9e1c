use chrono::Utc;
use uuid::Uuid;

use ednova_domain::tenant::TenantName;

use crate::domain::repository::{
    CourseRepository, MailSender, PaymentGateway, ProgressRepository, PurchaseRepository,
    UserRepository,
};
use crate::domain::types::{CheckoutRequest, CheckoutSession, Mail, Purchase};
use crate::error::LmsError;
use crate::usecase::access::Caller;

pub struct CheckoutUseCase<C, Pu, G>
where
    C: CourseRepository,
    Pu: PurchaseRepository,
    G: PaymentGateway,
{
    pub courses: C,
    pub purchases: Pu,
    pub gateway: G,
    pub front_url: String,
    pub currency: String,
    pub tenant: TenantName,
}

impl<C, Pu, G> CheckoutUseCase<C, Pu, G>
where
    C: CourseRepository,
    Pu: PurchaseRepository,
    G: PaymentGateway,
{
    pub async fn execute(&self, caller: Caller, course_id: Uuid) -> Result<CheckoutSession, LmsError> {
        if caller.is_admin() {
            return Err(LmsError::Forbidden);
        }
        let course = self
            .courses
            .find(course_id)
            .await?
            .ok_or(LmsError::NotFound("course"))?;
        if self
            .purchases
            .has_active(caller.user_id, course_id, Utc::now())
            .await?
        {
            return Err(LmsError::AlreadyPurchased);
        }

        let front = self.front_url.trim_end_matches('/');
        let tenant = &self.tenant;
        let request = CheckoutRequest {
            amount: course.price,
            currency: self.currency.clone(),
            description: course.title.clone(),
            success_url: format!(
                "{front}/{tenant}/payment/success?course_id={course_id}&session_id={{CHECKOUT_SESSION_ID}}"
            ),
            cancel_url: format!("{front}/{tenant}/courses/{course_id}"),
            user_id: caller.user_id,
            course_id,
            tenant: tenant.to_string(),
        };
        let session = self.gateway.create_checkout(&request).await?;
        tracing::info!(
            user_id = %caller.user_id,
            course_id = %course_id,
            session_id = %session.id,
            "checkout session created"
        );
        Ok(session)
    }
}

#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub purchase: Purchase,
    /// `false` when this payment session had already been recorded.
    pub newly_recorded: bool,
}

pub struct VerifyPurchaseUseCase<C, U, Pu, P, G, M>
where
    C: CourseRepository,
    U: UserRepository,
    Pu: PurchaseRepository,
    P: ProgressRepository,
    G: PaymentGateway,
    M: MailSender,
{
    pub courses: C,
    pub users: U,
    pub purchases: Pu,
    pub progress: P,
    pub gateway: G,
    pub mail: M,
    pub tenant: TenantName,
}

impl<C, U, Pu, P, G, M> VerifyPurchaseUseCase<C, U, Pu, P, G, M>
where
    C: CourseRepository,
    U: UserRepository,
    Pu: PurchaseRepository,
    P: ProgressRepository,
    G: PaymentGateway,
    M: MailSender,
{
    pub async fn execute(
        &self,
        caller: Caller,
        course_id: Uuid,
        session_id: &str,
    ) -> Result<VerifyOutcome, LmsError> {
        if caller.is_admin() {
            return Err(LmsError::Forbidden);
        }
        let course = self
            .courses
            .find(course_id)
            .await?
            .ok_or(LmsError::NotFound("course"))?;
        let user = self
            .users
            .find_by_id(caller.user_id)
            .await?
            .ok_or(LmsError::NotFound("user"))?;

        let session = self.gateway.fetch_session(session_id).await?;
        if !session.paid {
            return Err(LmsError::validation("payment has not been completed"));
        }
        let matches = session.user_id == Some(caller.user_id)
            && session.course_id == Some(course_id)
            && session.tenant.as_deref() == Some(self.tenant.as_str());
        if !matches {
            tracing::warn!(
                user_id = %caller.user_id,
                course_id = %course_id,
                session_id = %session.id,
                "payment session metadata mismatch"
            );
            return Err(LmsError::validation("payment session does not match this purchase"));
        }

        let now = Utc::now();
        let expiration_date = course
            .access_until(now)
            .ok_or_else(|| LmsError::validation("course expiry is out of range"))?;
        let purchase = Purchase {
            id: Uuid::now_v7(),
            user_id: caller.user_id,
            course_id,
            payment_session_id: Some(session.id.clone()),
            purchase_date: now,
            expiration_date,
        };
        let newly_recorded = self.purchases.record(&purchase).await?;
        self.progress.init_course(caller.user_id, course_id).await?;

        if newly_recorded {
            tracing::info!(user_id = %caller.user_id, course_id = %course_id, "course purchased");
            let mail = Mail {
                to: user.email.clone(),
                subject: format!("You're enrolled in {}", course.title),
                body: format!(
                    "Hi {},\n\nThanks for purchasing {}. Your access is valid until {}.\n",
                    user.name,
                    course.title,
                    purchase.expiration_date.format("%Y-%m-%d")
                ),
            };
            if let Err(e) = self.mail.send(&mail).await {
                tracing::warn!(user_id = %caller.user_id, error = %e, "purchase confirmation not sent");
            }
        }
        Ok(VerifyOutcome {
            purchase,
            newly_recorded,
        })
    }
}
