use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{ApiError, ApiResult},
    models::{
        Account, AccountRolesView, Article, ArticleChanges, ArticleDetail, ArticleSubmission,
        LoginRequest, NewAccount, NewArticle, RegisterRequest, Role, TokenResponse,
        ToggleRoleRequest, UserProfile,
    },
    policy, sanitize,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

// --- Password policy helpers ---

/// Mirrors the configured identity policy: at least 8 characters with an
/// uppercase letter, a lowercase letter, a digit, and a non-alphanumeric
/// character.
fn check_password_policy(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long.");
    }
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());
    if !(has_upper && has_lower && has_digit && has_special) {
        return Err("Password must contain uppercase, lowercase, number, and special character.");
    }
    Ok(())
}

// Pragmatic email shape check; real address validation belongs to the mail
// round trip, not this service.
fn looks_like_email(value: &str) -> bool {
    let mut parts = value.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// Runs field validation and sanitization for a create/edit submission,
/// producing the storable field set. A validation failure echoes the
/// submission back so the caller can correct and resubmit; nothing has been
/// persisted at that point.
fn prepare_submission(submission: &ArticleSubmission) -> ApiResult<ArticleChanges> {
    let validated = policy::validate_submission(submission).map_err(|failure| {
        ApiError::rejected_submission(failure.field, failure.message, submission)
    })?;

    // Sanitization runs after validation and before persistence,
    // unconditionally.
    Ok(ArticleChanges {
        title: validated.title,
        body: sanitize::sanitize(&validated.body),
        start_date: validated.start_date,
        end_date: validated.end_date,
    })
}

// --- Public Handlers ---

/// list_articles
///
/// [Public Route] Lists the articles currently inside their visibility
/// window, most recently created first.
///
/// *Security*: the window filter is applied **unconditionally** at the
/// repository layer; an article outside `[start_date, end_date]` never
/// appears here.
#[utoipa::path(
    get,
    path = "/articles",
    responses((status = 200, description = "Currently visible articles", body = [Article]))
)]
pub async fn list_articles(State(state): State<AppState>) -> ApiResult<Json<Vec<Article>>> {
    let articles = state.repo.list_visible_articles(Utc::now()).await?;
    Ok(Json(articles))
}

/// get_article_detail
///
/// [Public Route] Retrieves a single article by id, enriched with the
/// contributor's display name when the owning account still exists.
///
/// An article outside its visibility window is indistinguishable from an
/// absent one on this surface: both return 404. Owners and admins can still
/// reach it via `GET /me/articles/{id}`.
#[utoipa::path(
    get,
    path = "/articles/{id}",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Found", body = ArticleDetail),
        (status = 404, description = "Unknown id or outside visibility window")
    )
)]
pub async fn get_article_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ArticleDetail>> {
    let article = state
        .repo
        .get_visible_article(id, Utc::now())
        .await?
        .ok_or(ApiError::NotFound)?;

    // Weak back-reference: resolved lazily, absent if the account is gone.
    let contributor_name = state
        .repo
        .find_account_by_username(&article.contributor_username)
        .await?
        .map(|a| format!("{} {}", a.first_name, a.last_name));

    Ok(Json(ArticleDetail {
        article,
        contributor_name,
    }))
}

/// register
///
/// [Public Route] Creates a new account. The password must satisfy the
/// policy and match its confirmation; the username is the email address.
/// New accounts hold no roles until an admin grants Contributor.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 409, description = "Username already taken"),
        (status = 422, description = "Policy violation")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    if !looks_like_email(&payload.email) {
        return Err(ApiError::validation("email", "A valid email is required."));
    }
    if payload.first_name.trim().is_empty() {
        return Err(ApiError::validation(
            "first_name",
            "First Name is required.",
        ));
    }
    if payload.last_name.trim().is_empty() {
        return Err(ApiError::validation("last_name", "Last Name is required."));
    }
    check_password_policy(&payload.password)
        .map_err(|msg| ApiError::validation("password", msg))?;
    if payload.password != payload.confirm_password {
        return Err(ApiError::validation(
            "confirm_password",
            "Passwords do not match.",
        ));
    }

    let password_hash = auth::hash_password(&payload.password)?;
    let account = state
        .repo
        .insert_account(NewAccount {
            username: payload.email.clone(),
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            password_hash,
            roles: vec![],
        })
        .await?;

    tracing::info!("registered account {}", account.username);
    Ok((StatusCode::CREATED, Json(UserProfile::from(account))))
}

/// login
///
/// [Public Route] Verifies credentials and issues a bearer token. Wrong
/// username, wrong password, and banned account all produce the same
/// generic 401 — no account enumeration.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Bad credentials or banned account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let account = state
        .repo
        .find_account_by_username(&payload.username)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if account.banned || !auth::verify_password(&payload.password, &account.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let token = auth::issue_token(&account, &state.config)?;
    Ok(Json(TokenResponse { token }))
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] The authenticated user's profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<UserProfile>> {
    let account = state
        .repo
        .find_account_by_id(user.id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(UserProfile::from(account)))
}

/// get_my_articles
///
/// [Authenticated Route] Lists all articles owned by the requesting user,
/// including those currently outside their visibility window.
#[utoipa::path(
    get,
    path = "/me/articles",
    responses((status = 200, description = "My articles", body = [Article]))
)]
pub async fn get_my_articles(
    user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Article>>> {
    let articles = state.repo.list_articles_by_username(&user.username).await?;
    Ok(Json(articles))
}

/// get_own_article
///
/// [Authenticated Route] Retrieves an article by id regardless of its
/// visibility window, for its owner or an admin. Other authenticated users
/// get an Authorization error — the article's existence is not hidden.
#[utoipa::path(
    get,
    path = "/me/articles/{id}",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Found", body = Article),
        (status = 403, description = "Not owner or admin"),
        (status = 404, description = "Unknown id")
    )
)]
pub async fn get_own_article(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Article>> {
    let article = state.repo.get_article(id).await?.ok_or(ApiError::NotFound)?;
    if !policy::authorize_mutation(Some(&user), &article).is_allowed() {
        return Err(ApiError::Authorization);
    }
    Ok(Json(article))
}

/// create_article
///
/// [Authenticated Route] Submits a new article. Requires the Contributor or
/// Admin role. Ownership is pinned to the acting user, overriding any
/// `contributor_username` supplied in the payload; the creation timestamp is
/// server-assigned.
#[utoipa::path(
    post,
    path = "/articles",
    request_body = ArticleSubmission,
    responses(
        (status = 201, description = "Created", body = Article),
        (status = 403, description = "Missing Contributor/Admin role"),
        (status = 422, description = "Validation failure, submission echoed back")
    )
)]
pub async fn create_article(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ArticleSubmission>,
) -> ApiResult<(StatusCode, Json<Article>)> {
    if !policy::authorize_create(Some(&user)).is_allowed() {
        return Err(ApiError::Authorization);
    }

    let fields = prepare_submission(&payload)?;

    let article = state
        .repo
        .insert_article(NewArticle {
            title: fields.title,
            body: fields.body,
            start_date: fields.start_date,
            end_date: fields.end_date,
            contributor_username: user.username.clone(),
        })
        .await?;

    tracing::info!(article_id = article.id, owner = %user.username, "article created");
    Ok((StatusCode::CREATED, Json(article)))
}

/// update_article
///
/// [Authenticated Route] Edits an article's title, body, and visibility
/// window. Only the owning contributor or an admin may edit; ownership and
/// creation timestamp are immutable.
#[utoipa::path(
    put,
    path = "/articles/{id}",
    params(("id" = i64, Path, description = "Article ID")),
    request_body = ArticleSubmission,
    responses(
        (status = 200, description = "Updated", body = Article),
        (status = 403, description = "Not owner or admin"),
        (status = 404, description = "Unknown id"),
        (status = 422, description = "Validation failure, submission echoed back")
    )
)]
pub async fn update_article(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ArticleSubmission>,
) -> ApiResult<Json<Article>> {
    let existing = state.repo.get_article(id).await?.ok_or(ApiError::NotFound)?;

    if !policy::authorize_mutation(Some(&user), &existing).is_allowed() {
        return Err(ApiError::Authorization);
    }

    let changes = prepare_submission(&payload)?;
    let updated = state.repo.update_article(id, changes).await?;

    tracing::info!(article_id = id, actor = %user.username, "article updated");
    Ok(Json(updated))
}

/// delete_article
///
/// [Authenticated Route] Permanently deletes an article. Only the owning
/// contributor or an admin may delete.
#[utoipa::path(
    delete,
    path = "/articles/{id}",
    params(("id" = i64, Path, description = "Article ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not owner or admin"),
        (status = 404, description = "Unknown id")
    )
)]
pub async fn delete_article(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let existing = state.repo.get_article(id).await?.ok_or(ApiError::NotFound)?;

    if !policy::authorize_mutation(Some(&user), &existing).is_allowed() {
        return Err(ApiError::Authorization);
    }

    state.repo.delete_article(id).await?;
    tracing::info!(article_id = id, actor = %user.username, "article deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- Admin Handlers ---

fn require_admin(user: &AuthUser) -> ApiResult<()> {
    if !user.is_admin() {
        return Err(ApiError::Authorization);
    }
    Ok(())
}

/// list_users
///
/// [Admin Route] Every account with its role names, ordered by username for
/// a stable enumeration.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "Accounts and roles", body = [AccountRolesView]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<AccountRolesView>>> {
    require_admin(&user)?;

    let views = state
        .repo
        .list_accounts()
        .await?
        .into_iter()
        .map(|account: Account| AccountRolesView {
            username: account.username,
            roles: account.roles,
        })
        .collect();

    Ok(Json(views))
}

/// update_user_roles
///
/// [Admin Route] Toggles the Contributor role on an account. Both grant and
/// revoke are idempotent: repeating a toggle is a no-op. An unknown
/// username is an error here, not a silent success.
#[utoipa::path(
    post,
    path = "/admin/users/roles",
    request_body = ToggleRoleRequest,
    responses(
        (status = 204, description = "Role membership now matches the request"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Unknown username")
    )
)]
pub async fn update_user_roles(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ToggleRoleRequest>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;

    let changed = if payload.is_contributor {
        state
            .repo
            .grant_role(&payload.username, Role::Contributor)
            .await?
    } else {
        state
            .repo
            .revoke_role(&payload.username, Role::Contributor)
            .await?
    };

    if changed {
        tracing::info!(
            username = %payload.username,
            is_contributor = payload.is_contributor,
            "contributor role toggled"
        );
    }
    Ok(StatusCode::NO_CONTENT)
}

/// ban_user
///
/// [Admin Route] Bans an account. Under the Hard policy the record is
/// removed permanently; under Soft it is flagged and can no longer
/// authenticate. Either way the account's articles keep their ownership
/// reference (orphaned under Hard).
#[utoipa::path(
    delete,
    path = "/admin/users/{username}",
    params(("username" = String, Path, description = "Account username")),
    responses(
        (status = 204, description = "Banned"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Unknown username"),
        (status = 500, description = "Removal failed; account untouched")
    )
)]
pub async fn ban_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    require_admin(&user)?;

    use crate::config::BanPolicy;
    match state.config.ban_policy {
        BanPolicy::Hard => state.repo.delete_account(&username).await?,
        BanPolicy::Soft => state.repo.set_banned(&username, true).await?,
    }

    tracing::info!(username = %username, policy = ?state.config.ban_policy, "account banned");
    Ok(StatusCode::NO_CONTENT)
}
