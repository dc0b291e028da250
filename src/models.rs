use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The two privileged roles recognized by the portal. A freshly registered
/// account holds neither and can only read published articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Role {
    /// May manage any article and administer account roles/bans.
    Admin,
    /// May author articles and edit/delete their own.
    Contributor,
}

impl Role {
    /// Canonical database spelling of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Contributor => "Contributor",
        }
    }

    /// Parses the database spelling back into a `Role`. Unknown strings are
    /// dropped by callers rather than treated as errors, so this returns an
    /// `Option` instead of a `Result`.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "Admin" => Some(Role::Admin),
            "Contributor" => Some(Role::Contributor),
            _ => None,
        }
    }
}

/// Account
///
/// The canonical identity record stored in the `accounts` table, together
/// with its role memberships from `account_roles`.
///
/// The `username` doubles as the account email and is the stable key that
/// articles reference for ownership.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Account {
    pub id: Uuid,
    /// Unique, email-formatted. Source of truth for article ownership.
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Argon2 PHC string. Never serialized out of the service.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    #[schema(ignore)]
    pub password_hash: String,
    pub roles: Vec<Role>,
    /// Soft-ban marker. A banned account fails authentication but its
    /// record (and its articles' ownership references) survive.
    pub banned: bool,
}

impl Account {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// AccountRow
///
/// Raw database row for `accounts` (Internal Use). Roles live in a separate
/// table and are attached by the repository to build the typed `Account`.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub banned: bool,
}

impl AccountRow {
    /// Attaches the role set fetched from `account_roles`. Unknown role
    /// strings in the table are ignored.
    pub fn into_account(self, role_names: Vec<String>) -> Account {
        let mut roles: Vec<Role> = role_names.iter().filter_map(|r| Role::parse(r)).collect();
        roles.sort();
        roles.dedup();
        Account {
            id: self.id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            password_hash: self.password_hash,
            roles,
            banned: self.banned,
        }
    }
}

/// Article
///
/// A blog article from the `articles` table. This is the primary data
/// structure for the visibility-window and ownership logic.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Article {
    pub id: i64,
    pub title: String,
    /// Rich text, already passed through the allow-list sanitizer. Raw
    /// submissions never reach this field.
    pub body: String,
    /// Server-assigned at creation, immutable thereafter.
    #[ts(type = "string")]
    pub create_date: DateTime<Utc>,
    /// Start of the public visibility window (inclusive).
    #[ts(type = "string")]
    pub start_date: DateTime<Utc>,
    /// End of the public visibility window (inclusive).
    #[ts(type = "string")]
    pub end_date: DateTime<Utc>,
    /// Owning contributor's username. Fixed at creation; the only link back
    /// to the account (no foreign key, account deletion never cascades here).
    pub contributor_username: String,
}

/// ArticleDetail
///
/// Public detail view: the article plus the lazily-resolved contributor
/// display name. `contributor_name` is `None` when the owning account has
/// been removed (orphaned ownership reference).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub article: Article,
    pub contributor_name: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// ArticleSubmission
///
/// Input payload for creating or editing an article. The same shape serves
/// both operations because the original form round-trips the full record.
///
/// Any `contributor_username` supplied here is discarded; ownership is taken
/// from the authenticated actor to prevent authorship spoofing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ArticleSubmission {
    pub title: String,
    pub body: Option<String>,
    #[ts(type = "string | null")]
    pub start_date: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub end_date: Option<DateTime<Utc>>,
    /// Ignored on input; present so a rejected submission can be echoed
    /// back to the caller unmodified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributor_username: Option<String>,
}

/// RegisterRequest
///
/// Input payload for the public registration endpoint (POST /register).
/// The password must satisfy the policy (min length 8, upper, lower, digit,
/// special character) and match its confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
}

/// LoginRequest
///
/// Input payload for POST /login. Credentials are verified against the
/// stored argon2 hash; the plaintext is never persisted or logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// TokenResponse
///
/// Output of a successful login: a bearer token for the Authorization header.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// ToggleRoleRequest
///
/// Admin payload for granting or revoking the Contributor role
/// (POST /admin/users/roles).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ToggleRoleRequest {
    pub username: String,
    pub is_contributor: bool,
}

// --- Admin & Profile Schemas (Output) ---

/// AccountRolesView
///
/// Projection for the admin user-management listing: one row per account
/// with its role names in a stable order.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AccountRolesView {
    pub username: String,
    pub roles: Vec<Role>,
}

/// UserProfile
///
/// Output schema for the authenticated user's profile (GET /me).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<Role>,
}

impl From<Account> for UserProfile {
    fn from(account: Account) -> Self {
        UserProfile {
            id: account.id,
            username: account.username,
            first_name: account.first_name,
            last_name: account.last_name,
            roles: account.roles,
        }
    }
}

// --- Internal Payloads (not part of the wire surface) ---

/// NewAccount
///
/// Insertion payload assembled by the registration handler and the seeder
/// after password hashing.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
}

/// NewArticle
///
/// Insertion payload: a validated, sanitized submission with ownership
/// already pinned to the acting user.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub body: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub contributor_username: String,
}

/// ArticleChanges
///
/// Update payload for the mutable article fields. `create_date` and
/// `contributor_username` are deliberately absent.
#[derive(Debug, Clone)]
pub struct ArticleChanges {
    pub title: String,
    pub body: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}
