use crate::{
    error::ApiError,
    models::{Account, AccountRow, Article, ArticleChanges, NewAccount, NewArticle, Role},
    policy,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

/// RepositoryError
///
/// Failure vocabulary of the persistence layer. Handlers convert these to
/// `ApiError` at the boundary; unanticipated database errors are logged
/// there and surfaced generically.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => ApiError::NotFound,
            RepositoryError::Conflict(msg) => ApiError::Conflict(msg),
            RepositoryError::Database(e) => {
                tracing::error!("repository failure: {:?}", e);
                ApiError::OperationFailed
            }
        }
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, allowing
/// the handlers to interact with the data layer without knowing the specific
/// implementation (Postgres, in-memory, etc.).
///
/// Authorization is deliberately *not* enforced here. The policy module
/// decides who may act; the repository only reads and writes. That keeps
/// "Authorization" and "NotFound" distinguishable at the handler level.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's async tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Article Retrieval ---
    /// Articles inside their visibility window at `now`, newest first.
    async fn list_visible_articles(&self, now: DateTime<Utc>) -> RepoResult<Vec<Article>>;
    /// Any article by id, window ignored. For owner/admin surfaces.
    async fn get_article(&self, id: i64) -> RepoResult<Option<Article>>;
    /// An article by id only while inside its window. For the anonymous
    /// detail view, where out-of-window equals absent.
    async fn get_visible_article(&self, id: i64, now: DateTime<Utc>)
    -> RepoResult<Option<Article>>;
    /// All articles owned by `username`, newest first, window ignored.
    async fn list_articles_by_username(&self, username: &str) -> RepoResult<Vec<Article>>;
    /// Seed support: idempotency probe by exact title.
    async fn find_article_by_title(&self, title: &str) -> RepoResult<Option<Article>>;

    // --- Article Mutation ---
    async fn insert_article(&self, article: NewArticle) -> RepoResult<Article>;
    /// Replaces the mutable fields. `NotFound` if the id is unknown.
    async fn update_article(&self, id: i64, changes: ArticleChanges) -> RepoResult<Article>;
    /// Hard delete. `NotFound` if the id is unknown.
    async fn delete_article(&self, id: i64) -> RepoResult<()>;

    // --- Accounts & Roles ---
    /// All accounts with roles attached, ordered by username for a stable
    /// enumeration.
    async fn list_accounts(&self) -> RepoResult<Vec<Account>>;
    async fn find_account_by_username(&self, username: &str) -> RepoResult<Option<Account>>;
    async fn find_account_by_id(&self, id: Uuid) -> RepoResult<Option<Account>>;
    /// `Conflict` when the username or email is already taken.
    async fn insert_account(&self, account: NewAccount) -> RepoResult<Account>;
    /// Idempotent grant. Returns whether the membership actually changed.
    /// `NotFound` for an unknown username.
    async fn grant_role(&self, username: &str, role: Role) -> RepoResult<bool>;
    /// Idempotent revoke, same contract as `grant_role`.
    async fn revoke_role(&self, username: &str, role: Role) -> RepoResult<bool>;
    /// Hard ban: removes the account record permanently.
    async fn delete_account(&self, username: &str) -> RepoResult<()>;
    /// Soft ban: flags the account without removing it.
    async fn set_banned(&self, username: &str, banned: bool) -> RepoResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

// Column list shared by every article query so RETURNING/SELECT stay in sync
// with the `Article` struct.
const ARTICLE_COLUMNS: &str = "id, title, body, create_date, start_date, end_date, contributor_username";

// Boot-time DDL, applied on startup the way the original migrated on boot.
// Roles cascade with their account; articles deliberately carry no foreign
// key so removing an account orphans (not destroys) its articles.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id UUID PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    banned BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE IF NOT EXISTS account_roles (
    account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    PRIMARY KEY (account_id, role)
);

CREATE TABLE IF NOT EXISTS articles (
    id BIGSERIAL PRIMARY KEY,
    title TEXT NOT NULL,
    body TEXT NOT NULL DEFAULT '',
    create_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    start_date TIMESTAMPTZ NOT NULL,
    end_date TIMESTAMPTZ NOT NULL,
    contributor_username TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_articles_window ON articles (start_date, end_date);
CREATE INDEX IF NOT EXISTS idx_articles_owner ON articles (contributor_username);
"#;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the schema DDL. Idempotent; called once at startup.
    pub async fn ensure_schema(&self) -> RepoResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn roles_for(&self, account_id: Uuid) -> RepoResult<Vec<String>> {
        let roles = sqlx::query_scalar::<_, String>(
            "SELECT role FROM account_roles WHERE account_id = $1 ORDER BY role",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn account_id_by_username(&self, username: &str) -> RepoResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM accounts WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_visible_articles(&self, now: DateTime<Utc>) -> RepoResult<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE start_date <= $1 AND end_date >= $1 \
             ORDER BY create_date DESC"
        );
        let articles = sqlx::query_as::<_, Article>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(articles)
    }

    async fn get_article(&self, id: i64) -> RepoResult<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1");
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    async fn get_visible_article(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE id = $1 AND start_date <= $2 AND end_date >= $2"
        );
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    async fn list_articles_by_username(&self, username: &str) -> RepoResult<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE contributor_username = $1 ORDER BY create_date DESC"
        );
        let articles = sqlx::query_as::<_, Article>(&sql)
            .bind(username)
            .fetch_all(&self.pool)
            .await?;
        Ok(articles)
    }

    async fn find_article_by_title(&self, title: &str) -> RepoResult<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE title = $1 LIMIT 1");
        let article = sqlx::query_as::<_, Article>(&sql)
            .bind(title)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    async fn insert_article(&self, article: NewArticle) -> RepoResult<Article> {
        let sql = format!(
            "INSERT INTO articles (title, body, start_date, end_date, contributor_username, create_date) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             RETURNING {ARTICLE_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Article>(&sql)
            .bind(article.title)
            .bind(article.body)
            .bind(article.start_date)
            .bind(article.end_date)
            .bind(article.contributor_username)
            .fetch_one(&self.pool)
            .await?;
        Ok(inserted)
    }

    async fn update_article(&self, id: i64, changes: ArticleChanges) -> RepoResult<Article> {
        let sql = format!(
            "UPDATE articles \
             SET title = $2, body = $3, start_date = $4, end_date = $5 \
             WHERE id = $1 \
             RETURNING {ARTICLE_COLUMNS}"
        );
        sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .bind(changes.title)
            .bind(changes.body)
            .bind(changes.start_date)
            .bind(changes.end_date)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_article(&self, id: i64) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_accounts(&self) -> RepoResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT id, username, email, first_name, last_name, password_hash, banned \
             FROM accounts ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            let roles = self.roles_for(row.id).await?;
            accounts.push(row.into_account(roles));
        }
        Ok(accounts)
    }

    async fn find_account_by_username(&self, username: &str) -> RepoResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, username, email, first_name, last_name, password_hash, banned \
             FROM accounts WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let roles = self.roles_for(row.id).await?;
                Ok(Some(row.into_account(roles)))
            }
            None => Ok(None),
        }
    }

    async fn find_account_by_id(&self, id: Uuid) -> RepoResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, username, email, first_name, last_name, password_hash, banned \
             FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let roles = self.roles_for(row.id).await?;
                Ok(Some(row.into_account(roles)))
            }
            None => Ok(None),
        }
    }

    async fn insert_account(&self, account: NewAccount) -> RepoResult<Account> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let insert = sqlx::query(
            "INSERT INTO accounts (id, username, email, first_name, last_name, password_hash, banned) \
             VALUES ($1, $2, $3, $4, $5, $6, FALSE)",
        )
        .bind(id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(&account.password_hash)
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert {
            if is_unique_violation(&e) {
                return Err(RepositoryError::Conflict(format!(
                    "account '{}' already exists",
                    account.username
                )));
            }
            return Err(e.into());
        }

        for role in &account.roles {
            sqlx::query(
                "INSERT INTO account_roles (account_id, role) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let mut roles = account.roles.clone();
        roles.sort();
        roles.dedup();
        Ok(Account {
            id,
            username: account.username,
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            password_hash: account.password_hash,
            roles,
            banned: false,
        })
    }

    async fn grant_role(&self, username: &str, role: Role) -> RepoResult<bool> {
        let account_id = self.account_id_by_username(username).await?;
        let result = sqlx::query(
            "INSERT INTO account_roles (account_id, role) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(account_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_role(&self, username: &str, role: Role) -> RepoResult<bool> {
        let account_id = self.account_id_by_username(username).await?;
        let result = sqlx::query("DELETE FROM account_roles WHERE account_id = $1 AND role = $2")
            .bind(account_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_account(&self, username: &str) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_banned(&self, username: &str, banned: bool) -> RepoResult<()> {
        let result = sqlx::query("UPDATE accounts SET banned = $2 WHERE username = $1")
            .bind(username)
            .bind(banned)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// --- In-memory implementation ---

#[derive(Default)]
struct MemoryState {
    accounts: Vec<Account>,
    articles: Vec<Article>,
    next_article_id: i64,
}

/// MemoryRepository
///
/// A full in-memory implementation of the `Repository` trait. It backs the
/// integration tests and lets the service run without a database locally;
/// every contract (idempotent role toggles, NotFound on unknown usernames,
/// window filtering) matches the Postgres implementation.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                accounts: vec![],
                articles: vec![],
                next_article_id: 1,
            }),
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory repository lock poisoned")
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_visible_articles(&self, now: DateTime<Utc>) -> RepoResult<Vec<Article>> {
        let state = self.locked();
        let mut visible: Vec<Article> = state
            .articles
            .iter()
            .filter(|a| policy::is_publicly_visible(a, now))
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.create_date.cmp(&a.create_date));
        Ok(visible)
    }

    async fn get_article(&self, id: i64) -> RepoResult<Option<Article>> {
        Ok(self.locked().articles.iter().find(|a| a.id == id).cloned())
    }

    async fn get_visible_article(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<Article>> {
        Ok(self
            .locked()
            .articles
            .iter()
            .find(|a| a.id == id && policy::is_publicly_visible(a, now))
            .cloned())
    }

    async fn list_articles_by_username(&self, username: &str) -> RepoResult<Vec<Article>> {
        let state = self.locked();
        let mut owned: Vec<Article> = state
            .articles
            .iter()
            .filter(|a| a.contributor_username == username)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.create_date.cmp(&a.create_date));
        Ok(owned)
    }

    async fn find_article_by_title(&self, title: &str) -> RepoResult<Option<Article>> {
        Ok(self
            .locked()
            .articles
            .iter()
            .find(|a| a.title == title)
            .cloned())
    }

    async fn insert_article(&self, article: NewArticle) -> RepoResult<Article> {
        let mut state = self.locked();
        let id = state.next_article_id;
        state.next_article_id += 1;
        let stored = Article {
            id,
            title: article.title,
            body: article.body,
            create_date: Utc::now(),
            start_date: article.start_date,
            end_date: article.end_date,
            contributor_username: article.contributor_username,
        };
        state.articles.push(stored.clone());
        Ok(stored)
    }

    async fn update_article(&self, id: i64, changes: ArticleChanges) -> RepoResult<Article> {
        let mut state = self.locked();
        let article = state
            .articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;
        article.title = changes.title;
        article.body = changes.body;
        article.start_date = changes.start_date;
        article.end_date = changes.end_date;
        Ok(article.clone())
    }

    async fn delete_article(&self, id: i64) -> RepoResult<()> {
        let mut state = self.locked();
        let before = state.articles.len();
        state.articles.retain(|a| a.id != id);
        if state.articles.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_accounts(&self) -> RepoResult<Vec<Account>> {
        let state = self.locked();
        let mut accounts = state.accounts.clone();
        accounts.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(accounts)
    }

    async fn find_account_by_username(&self, username: &str) -> RepoResult<Option<Account>> {
        Ok(self
            .locked()
            .accounts
            .iter()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn find_account_by_id(&self, id: Uuid) -> RepoResult<Option<Account>> {
        Ok(self.locked().accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn insert_account(&self, account: NewAccount) -> RepoResult<Account> {
        let mut state = self.locked();
        if state
            .accounts
            .iter()
            .any(|a| a.username == account.username || a.email == account.email)
        {
            return Err(RepositoryError::Conflict(format!(
                "account '{}' already exists",
                account.username
            )));
        }
        let mut roles = account.roles.clone();
        roles.sort();
        roles.dedup();
        let stored = Account {
            id: Uuid::new_v4(),
            username: account.username,
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            password_hash: account.password_hash,
            roles,
            banned: false,
        };
        state.accounts.push(stored.clone());
        Ok(stored)
    }

    async fn grant_role(&self, username: &str, role: Role) -> RepoResult<bool> {
        let mut state = self.locked();
        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.username == username)
            .ok_or(RepositoryError::NotFound)?;
        if account.roles.contains(&role) {
            return Ok(false);
        }
        account.roles.push(role);
        account.roles.sort();
        Ok(true)
    }

    async fn revoke_role(&self, username: &str, role: Role) -> RepoResult<bool> {
        let mut state = self.locked();
        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.username == username)
            .ok_or(RepositoryError::NotFound)?;
        let before = account.roles.len();
        account.roles.retain(|r| *r != role);
        Ok(account.roles.len() != before)
    }

    async fn delete_account(&self, username: &str) -> RepoResult<()> {
        let mut state = self.locked();
        let before = state.accounts.len();
        state.accounts.retain(|a| a.username != username);
        if state.accounts.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_banned(&self, username: &str, banned: bool) -> RepoResult<()> {
        let mut state = self.locked();
        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.username == username)
            .ok_or(RepositoryError::NotFound)?;
        account.banned = banned;
        Ok(())
    }
}
