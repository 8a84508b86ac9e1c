use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ednova_auth_types::cookie::{clear_session_cookie, set_session_cookie};
use ednova_auth_types::identity::SessionUser;
use ednova_auth_types::token::issue_session_token;
use ednova_domain::pagination::PageRequest;
use ednova_domain::tenant::TenantName;
use ednova_domain::user::UserRole;

use crate::domain::types::{AccountTokenKind, User};
use crate::error::LmsError;
use crate::handlers::{FormData, MessageResponse, require_admin};
use crate::state::{AppState, Tenant};
use crate::usecase::user::{
    ChangePasswordUseCase, CompleteVerificationUseCase, GetProfileUseCase, LeaderboardUseCase,
    ListUsersUseCase, LoginUseCase, Profile, RegisterInput, RegisterUseCase,
    ResetPasswordUseCase, SendAccountTokenUseCase, UpdateProfileInput, UpdateProfileUseCase,
};

#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub xp: i64,
    pub verified: bool,
    pub avatar_url: Option<String>,
    pub badges: Vec<Uuid>,
    #[serde(serialize_with = "ednova_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    fn new(user: User, badges: Vec<Uuid>) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            xp: user.xp,
            verified: user.verified,
            avatar_url: user.avatar.map(|a| a.public_url),
            badges,
            created_at: user.created_at,
        }
    }
}

impl From<Profile> for UserResponse {
    fn from(profile: Profile) -> Self {
        Self::new(profile.user, profile.badges)
    }
}

fn with_session(
    state: &AppState,
    jar: CookieJar,
    user: &User,
    tenant: &TenantName,
) -> Result<CookieJar, LmsError> {
    let (token, _exp) = issue_session_token(
        user.id,
        user.role,
        tenant,
        state.session_ttl_secs,
        state.session_key.as_str(),
    )
    .map_err(|e| LmsError::Internal(e.into()))?;
    Ok(set_session_cookie(
        jar,
        token,
        state.cookie_domain.clone(),
        state.session_ttl_secs,
    ))
}

// ── POST /user/register ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    tenant: Tenant,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, LmsError> {
    let usecase = RegisterUseCase {
        users: tenant.users(),
    };
    let user = usecase
        .execute(RegisterInput {
            name: body.name,
            email: body.email,
            password: body.password,
        })
        .await?;
    let jar = with_session(&state, jar, &user, tenant.name())?;
    Ok((StatusCode::CREATED, jar, Json(UserResponse::new(user, vec![]))))
}

// ── POST /user/admin ─────────────────────────────────────────────────────────

/// Admin-created administrator account. The caller's session is untouched.
pub async fn register_admin(
    tenant: Tenant,
    session: SessionUser,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, LmsError> {
    require_admin(&session)?;
    let usecase = RegisterUseCase {
        users: tenant.users(),
    };
    let user = usecase
        .register_admin(RegisterInput {
            name: body.name,
            email: body.email,
            password: body.password,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::new(user, vec![]))))
}

// ── GET /user/all ────────────────────────────────────────────────────────────

pub async fn list_users(
    tenant: Tenant,
    session: SessionUser,
) -> Result<Json<Vec<UserResponse>>, LmsError> {
    require_admin(&session)?;
    let usecase = ListUsersUseCase {
        users: tenant.users(),
        badges: tenant.badges(),
    };
    let users = usecase.execute().await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

// ── POST /user/login ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub role: UserRole,
    pub verified: bool,
}

pub async fn login(
    State(state): State<AppState>,
    tenant: Tenant,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, LmsError> {
    let usecase = LoginUseCase {
        users: tenant.users(),
    };
    let user = usecase.execute(&body.email, &body.password).await?;
    let jar = with_session(&state, jar, &user, tenant.name())?;
    let body = LoginResponse {
        user_id: user.id,
        role: user.role,
        verified: user.verified,
    };
    Ok((jar, Json(body)))
}

// ── GET /user/logout ─────────────────────────────────────────────────────────

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (
        clear_session_cookie(jar, state.cookie_domain.clone()),
        Json(MessageResponse {
            message: "logged out",
        }),
    )
}

// ── GET /user/me ─────────────────────────────────────────────────────────────

pub async fn get_me(
    tenant: Tenant,
    session: SessionUser,
) -> Result<Json<UserResponse>, LmsError> {
    let usecase = GetProfileUseCase {
        users: tenant.users(),
        badges: tenant.badges(),
    };
    let profile = usecase.execute(session.user_id).await?;
    Ok(Json(profile.into()))
}

// ── PUT /user/me ─────────────────────────────────────────────────────────────

pub async fn update_me(
    State(state): State<AppState>,
    tenant: Tenant,
    session: SessionUser,
    multipart: Multipart,
) -> Result<Json<UserResponse>, LmsError> {
    let mut form = FormData::read(multipart).await?;
    let input = UpdateProfileInput {
        name: form.text("name"),
        avatar: form.take_file("avatar"),
    };
    let usecase = UpdateProfileUseCase {
        users: tenant.users(),
        storage: state.object_storage(),
    };
    usecase.execute(session.user_id, input).await?;

    let profile = GetProfileUseCase {
        users: tenant.users(),
        badges: tenant.badges(),
    }
    .execute(session.user_id)
    .await?;
    Ok(Json(profile.into()))
}

// ── POST /user/change-password ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn change_password(
    tenant: Tenant,
    session: SessionUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, LmsError> {
    let usecase = ChangePasswordUseCase {
        users: tenant.users(),
    };
    usecase
        .execute(session.user_id, &body.old_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── POST /user/verify, POST /user/reset ──────────────────────────────────────

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

async fn send_account_token(
    state: &AppState,
    tenant: &Tenant,
    kind: AccountTokenKind,
    email: &str,
) -> Result<(), LmsError> {
    let usecase = SendAccountTokenUseCase {
        users: tenant.users(),
        mail: state.mail_sender(),
        front_url: state.front_url.clone(),
        tenant: tenant.name().clone(),
    };
    usecase.execute(kind, email).await
}

pub async fn request_verification(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(body): Json<EmailRequest>,
) -> Result<impl IntoResponse, LmsError> {
    send_account_token(&state, &tenant, AccountTokenKind::Verify, &body.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "verification mail sent",
        }),
    ))
}

pub async fn complete_verification(
    tenant: Tenant,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, LmsError> {
    let usecase = CompleteVerificationUseCase {
        users: tenant.users(),
    };
    usecase.execute(&token).await?;
    Ok(Json(MessageResponse {
        message: "account verified",
    }))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(body): Json<EmailRequest>,
) -> Result<impl IntoResponse, LmsError> {
    send_account_token(&state, &tenant, AccountTokenKind::Reset, &body.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "password reset mail sent",
        }),
    ))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

pub async fn reset_password(
    tenant: Tenant,
    Path(token): Path<String>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, LmsError> {
    let usecase = ResetPasswordUseCase {
        users: tenant.users(),
    };
    usecase.execute(&token, &body.password).await?;
    Ok(Json(MessageResponse {
        message: "password updated",
    }))
}

// ── GET /user/leaderboard ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct LeaderboardEntry {
    pub rank: u64,
    pub id: Uuid,
    pub name: String,
    pub xp: i64,
    pub avatar_url: Option<String>,
    pub badges: Vec<Uuid>,
}

pub async fn leaderboard(
    tenant: Tenant,
    Query(page): Query<PageRequest>,
) -> Result<Json<Vec<LeaderboardEntry>>, LmsError> {
    let usecase = LeaderboardUseCase {
        users: tenant.users(),
        badges: tenant.badges(),
    };
    let first_rank = page.offset() + 1;
    let entries = usecase
        .execute(page)
        .await?
        .into_iter()
        .zip(first_rank..)
        .map(|(profile, rank)| LeaderboardEntry {
            rank,
            id: profile.user.id,
            name: profile.user.name,
            xp: profile.user.xp,
            avatar_url: profile.user.avatar.map(|a| a.public_url),
            badges: profile.badges,
        })
        .collect();
    Ok(Json(entries))
}
