use chrono::{Duration, Utc};
use uuid::Uuid;

use ednova_domain::pagination::PageRequest;
use ednova_domain::tenant::TenantName;
use ednova_domain::user::UserRole;

use crate::domain::repository::{BadgeRepository, MailSender, ObjectStorage, UserRepository};
use crate::domain::types::{
    ACCOUNT_TOKEN_TTL_MINS, AccountToken, AccountTokenKind, Mail, StoredAsset, Upload, User,
};
use crate::error::LmsError;
use crate::usecase::credential::{digest_token, generate_token, hash_password, verify_password};
use crate::usecase::upload::{delete_quietly, upload_then_write};

const NAME_MIN_CHARS: usize = 3;
const NAME_MAX_CHARS: usize = 30;
const PASSWORD_MIN_CHARS: usize = 8;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_name(name: &str) -> Result<(), LmsError> {
    let len = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(LmsError::validation(format!(
            "name must be {NAME_MIN_CHARS}-{NAME_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), LmsError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(LmsError::validation("email is not valid")),
    }
}

fn validate_password(password: &str) -> Result<(), LmsError> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(LmsError::validation(format!(
            "password must be at least {PASSWORD_MIN_CHARS} characters"
        )));
    }
    Ok(())
}

// ── Register ─────────────────────────────────────────────────────────────────

pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub struct RegisterUseCase<U: UserRepository> {
    pub users: U,
}

impl<U: UserRepository> RegisterUseCase<U> {
    pub async fn execute(&self, input: RegisterInput) -> Result<User, LmsError> {
        self.register(input, UserRole::User).await
    }

    /// Create another administrator of the tenant.
    pub async fn register_admin(&self, input: RegisterInput) -> Result<User, LmsError> {
        self.register(input, UserRole::Admin).await
    }

    async fn register(&self, input: RegisterInput, role: UserRole) -> Result<User, LmsError> {
        let name = input.name.trim().to_owned();
        let email = normalize_email(&input.email);
        validate_name(&name)?;
        validate_email(&email)?;
        validate_password(&input.password)?;

        if self.users.email_taken(&email).await? {
            return Err(LmsError::AlreadyExists("email"));
        }
        if self.users.name_taken(&name, None).await? {
            return Err(LmsError::AlreadyExists("name"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            name,
            email,
            password_hash: hash_password(&input.password),
            role,
            xp: 0,
            verified: false,
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        self.users.create(&user).await?;
        tracing::info!(user_id = %user.id, role = ?role, "user registered");
        Ok(user)
    }
}

// ── Login ────────────────────────────────────────────────────────────────────

pub struct LoginUseCase<U: UserRepository> {
    pub users: U,
}

impl<U: UserRepository> LoginUseCase<U> {
    /// Unknown email and wrong password fail the same way.
    pub async fn execute(&self, email: &str, password: &str) -> Result<User, LmsError> {
        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(LmsError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            return Err(LmsError::InvalidCredentials);
        }
        Ok(user)
    }
}

// ── Profile ──────────────────────────────────────────────────────────────────

/// User together with the ids of the badges they hold.
#[derive(Debug, Clone)]
pub struct Profile {
    pub user: User,
    pub badges: Vec<Uuid>,
}

pub struct GetProfileUseCase<U: UserRepository, B: BadgeRepository> {
    pub users: U,
    pub badges: B,
}

impl<U: UserRepository, B: BadgeRepository> GetProfileUseCase<U, B> {
    pub async fn execute(&self, user_id: Uuid) -> Result<Profile, LmsError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(LmsError::NotFound("user"))?;
        let badges = self
            .badges
            .held_by_users(&[user_id])
            .await?
            .remove(&user_id)
            .unwrap_or_default();
        Ok(Profile { user, badges })
    }
}

pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub avatar: Option<Upload>,
}

pub struct UpdateProfileUseCase<U: UserRepository, S: ObjectStorage> {
    pub users: U,
    pub storage: S,
}

impl<U: UserRepository, S: ObjectStorage> UpdateProfileUseCase<U, S> {
    pub async fn execute(&self, user_id: Uuid, input: UpdateProfileInput) -> Result<User, LmsError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(LmsError::NotFound("user"))?;

        let name = input.name.map(|n| n.trim().to_owned()).filter(|n| *n != user.name);
        if let Some(name) = &name {
            validate_name(name)?;
            if self.users.name_taken(name, Some(user_id)).await? {
                return Err(LmsError::AlreadyExists("name"));
            }
        }

        let new_name = name.as_deref();
        let users = &self.users;
        let avatar = match input.avatar {
            Some(upload) => Some(
                upload_then_write(&self.storage, "avatars", upload, |asset: StoredAsset| async move {
                    users.update_profile(user_id, new_name, Some(&asset)).await?;
                    Ok::<_, LmsError>(asset)
                })
                .await?,
            ),
            None => {
                if new_name.is_some() {
                    users.update_profile(user_id, new_name, None).await?;
                }
                None
            }
        };

        if let (Some(_), Some(old)) = (&avatar, &user.avatar) {
            delete_quietly(&self.storage, &old.asset_id).await;
        }

        Ok(User {
            name: name.unwrap_or(user.name),
            avatar: avatar.or(user.avatar),
            ..user
        })
    }
}

pub struct ChangePasswordUseCase<U: UserRepository> {
    pub users: U,
}

impl<U: UserRepository> ChangePasswordUseCase<U> {
    pub async fn execute(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), LmsError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(LmsError::NotFound("user"))?;
        if !verify_password(old_password, &user.password_hash) {
            return Err(LmsError::InvalidCredentials);
        }
        validate_password(new_password)?;
        self.users
            .update_password(user_id, &hash_password(new_password))
            .await
    }
}

// ── Verification / password reset ────────────────────────────────────────────

/// Mail a single-use link for e-mail verification or password reset.
pub struct SendAccountTokenUseCase<U: UserRepository, M: MailSender> {
    pub users: U,
    pub mail: M,
    pub front_url: String,
    pub tenant: TenantName,
}

impl<U: UserRepository, M: MailSender> SendAccountTokenUseCase<U, M> {
    pub async fn execute(&self, kind: AccountTokenKind, email: &str) -> Result<(), LmsError> {
        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(LmsError::NotFound("user"))?;
        if kind == AccountTokenKind::Verify && user.verified {
            return Err(LmsError::validation("account is already verified"));
        }

        let token = generate_token();
        let stored = AccountToken {
            digest: digest_token(&token),
            expires_at: Utc::now() + Duration::minutes(ACCOUNT_TOKEN_TTL_MINS),
        };
        self.users.set_token(user.id, kind, Some(&stored)).await?;

        let front = self.front_url.trim_end_matches('/');
        let tenant = &self.tenant;
        let mail = match kind {
            AccountTokenKind::Verify => Mail {
                to: user.email.clone(),
                subject: "Verify your account".to_owned(),
                body: format!(
                    "Hi {},\n\nConfirm your e-mail address within {ACCOUNT_TOKEN_TTL_MINS} minutes:\n{front}/{tenant}/verify/{token}\n",
                    user.name
                ),
            },
            AccountTokenKind::Reset => Mail {
                to: user.email.clone(),
                subject: "Reset your password".to_owned(),
                body: format!(
                    "Hi {},\n\nReset your password within {ACCOUNT_TOKEN_TTL_MINS} minutes:\n{front}/{tenant}/reset/{token}\n\nIgnore this mail if you did not ask for it.\n",
                    user.name
                ),
            },
        };

        if let Err(e) = self.mail.send(&mail).await {
            // Undelivered token: clear it.
            self.users.set_token(user.id, kind, None).await?;
            return Err(e);
        }
        Ok(())
    }
}

async fn redeem_token<U: UserRepository>(
    users: &U,
    kind: AccountTokenKind,
    token: &str,
) -> Result<User, LmsError> {
    let (user, stored) = users
        .find_by_token(kind, &digest_token(token))
        .await?
        .ok_or_else(|| LmsError::validation("token is invalid or has expired"))?;
    if stored.is_expired(Utc::now()) {
        users.set_token(user.id, kind, None).await?;
        return Err(LmsError::validation("token is invalid or has expired"));
    }
    Ok(user)
}

pub struct CompleteVerificationUseCase<U: UserRepository> {
    pub users: U,
}

impl<U: UserRepository> CompleteVerificationUseCase<U> {
    pub async fn execute(&self, token: &str) -> Result<(), LmsError> {
        let user = redeem_token(&self.users, AccountTokenKind::Verify, token).await?;
        self.users.mark_verified(user.id).await?;
        tracing::info!(user_id = %user.id, "account verified");
        Ok(())
    }
}

pub struct ResetPasswordUseCase<U: UserRepository> {
    pub users: U,
}

impl<U: UserRepository> ResetPasswordUseCase<U> {
    pub async fn execute(&self, token: &str, password: &str) -> Result<(), LmsError> {
        validate_password(password)?;
        let user = redeem_token(&self.users, AccountTokenKind::Reset, token).await?;
        self.users
            .update_password(user.id, &hash_password(password))
            .await?;
        self.users
            .set_token(user.id, AccountTokenKind::Reset, None)
            .await
    }
}

// ── Leaderboard ──────────────────────────────────────────────────────────────

pub struct LeaderboardUseCase<U: UserRepository, B: BadgeRepository> {
    pub users: U,
    pub badges: B,
}

impl<U: UserRepository, B: BadgeRepository> LeaderboardUseCase<U, B> {
    pub async fn execute(&self, page: PageRequest) -> Result<Vec<Profile>, LmsError> {
        let users = self.users.leaderboard(page).await?;
        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
        let mut held = self.badges.held_by_users(&ids).await?;
        Ok(users
            .into_iter()
            .map(|user| Profile {
                badges: held.remove(&user.id).unwrap_or_default(),
                user,
            })
            .collect())
    }
}

// ── Admin listing ────────────────────────────────────────────────────────────

pub struct ListUsersUseCase<U: UserRepository, B: BadgeRepository> {
    pub users: U,
    pub badges: B,
}

impl<U: UserRepository, B: BadgeRepository> ListUsersUseCase<U, B> {
    /// Every account of the tenant, newest first.
    pub async fn execute(&self) -> Result<Vec<Profile>, LmsError> {
        let users = self.users.list_all().await?;
        let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
        let mut held = self.badges.held_by_users(&ids).await?;
        Ok(users
            .into_iter()
            .map(|user| Profile {
                badges: held.remove(&user.id).unwrap_or_default(),
                user,
            })
            .collect())
    }
}
