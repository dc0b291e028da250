use axum::extract::{Path, State};
use axum::Json;
use blog_portal::{
    AppState,
    auth::AuthUser,
    config::{AppConfig, BanPolicy},
    error::ApiError,
    handlers,
    models::{ArticleSubmission, NewAccount, NewArticle, Role, ToggleRoleRequest},
    repository::{MemoryRepository, Repository, RepositoryState},
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

// --- Test Utilities ---

// Builds an AppState over a fresh in-memory repository, returning the
// typed handle as well so tests can inspect stored state directly.
fn test_state() -> (AppState, Arc<MemoryRepository>) {
    test_state_with_config(AppConfig::default())
}

fn test_state_with_config(config: AppConfig) -> (AppState, Arc<MemoryRepository>) {
    let repo = Arc::new(MemoryRepository::new());
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        config,
    };
    (state, repo)
}

async fn seed_account(repo: &MemoryRepository, username: &str, roles: Vec<Role>) -> AuthUser {
    let account = repo
        .insert_account(NewAccount {
            username: username.to_string(),
            email: username.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            // Not a real hash; these tests never go through login.
            password_hash: "unused".to_string(),
            roles,
        })
        .await
        .expect("seed account");
    AuthUser {
        id: account.id,
        username: account.username,
        roles: account.roles,
    }
}

fn submission(title: &str, start_days: i64, end_days: i64) -> ArticleSubmission {
    let now = Utc::now();
    ArticleSubmission {
        title: title.to_string(),
        body: Some("<p>body</p>".to_string()),
        start_date: Some(now + Duration::days(start_days)),
        end_date: Some(now + Duration::days(end_days)),
        contributor_username: None,
    }
}

// --- Article creation ---

#[tokio::test]
async fn create_with_inverted_dates_fails_validation_and_persists_nothing() {
    let (state, repo) = test_state();
    let contributor = seed_account(&repo, "c@c.c", vec![Role::Contributor]).await;

    let result = handlers::create_article(
        contributor,
        State(state),
        Json(submission("Bad window", 1, -1)),
    )
    .await;

    let err = result.expect_err("inverted window must be rejected");
    match err {
        ApiError::Validation {
            field, submission, ..
        } => {
            assert_eq!(field, "end_date");
            // The rejected submission is echoed back for correction.
            let echoed = submission.expect("submission echo");
            assert_eq!(echoed["title"], "Bad window");
        }
        other => panic!("expected Validation, got {other:?}"),
    }

    let stored = repo.list_articles_by_username("c@c.c").await.unwrap();
    assert!(stored.is_empty(), "no partial write on validation failure");
}

#[tokio::test]
async fn create_without_role_fails_authorization_and_persists_nothing() {
    let (state, repo) = test_state();
    let reader = seed_account(&repo, "r@r.r", vec![]).await;

    let result =
        handlers::create_article(reader, State(state), Json(submission("Nope", -1, 1))).await;

    assert!(matches!(result.unwrap_err(), ApiError::Authorization));
    assert!(repo.list_articles_by_username("r@r.r").await.unwrap().is_empty());
}

#[tokio::test]
async fn created_article_is_owned_by_actor_regardless_of_payload() {
    let (state, repo) = test_state();
    let contributor = seed_account(&repo, "c@c.c", vec![Role::Contributor]).await;

    let mut payload = submission("Mine", -1, 1);
    payload.contributor_username = Some("spoofed@evil.example".to_string());

    let (status, Json(article)) =
        handlers::create_article(contributor, State(state), Json(payload))
            .await
            .expect("create should succeed");

    assert_eq!(status, axum::http::StatusCode::CREATED);
    assert_eq!(article.contributor_username, "c@c.c");

    let stored = repo.get_article(article.id).await.unwrap().unwrap();
    assert_eq!(stored.contributor_username, "c@c.c");
}

#[tokio::test]
async fn created_body_is_sanitized_before_persistence() {
    let (state, repo) = test_state();
    let admin = seed_account(&repo, "a@a.a", vec![Role::Admin]).await;

    let mut payload = submission("Scripted", -1, 1);
    payload.body = Some("<p>ok</p><script>alert('xss')</script>".to_string());

    // Admin submissions are sanitized too.
    let (_, Json(article)) = handlers::create_article(admin, State(state), Json(payload))
        .await
        .expect("create should succeed");

    assert_eq!(article.body, "<p>ok</p>");
    let stored = repo.get_article(article.id).await.unwrap().unwrap();
    assert!(!stored.body.contains("<script"));
    assert!(!stored.body.contains("alert"));
}

// --- Editing and deleting ---

#[tokio::test]
async fn edit_rights_follow_ownership_and_admin_override() {
    let (state, repo) = test_state();
    let owner = seed_account(&repo, "c@c.c", vec![Role::Contributor]).await;
    let other = seed_account(&repo, "other@x.x", vec![Role::Contributor]).await;
    let admin = seed_account(&repo, "a@a.a", vec![Role::Admin]).await;

    let (_, Json(article)) = handlers::create_article(
        owner.clone(),
        State(state.clone()),
        Json(submission("Test", -1, 1)),
    )
    .await
    .expect("create");

    // Another contributor is denied with Authorization, not NotFound.
    let result = handlers::update_article(
        other,
        State(state.clone()),
        Path(article.id),
        Json(submission("Hijacked", -1, 1)),
    )
    .await;
    assert!(matches!(result.unwrap_err(), ApiError::Authorization));

    // The owner may edit.
    let Json(updated) = handlers::update_article(
        owner,
        State(state.clone()),
        Path(article.id),
        Json(submission("Renamed by owner", -1, 1)),
    )
    .await
    .expect("owner edit");
    assert_eq!(updated.title, "Renamed by owner");

    // An admin may edit any article; ownership does not move.
    let Json(updated) = handlers::update_article(
        admin,
        State(state),
        Path(article.id),
        Json(submission("Renamed by admin", -1, 1)),
    )
    .await
    .expect("admin edit");
    assert_eq!(updated.title, "Renamed by admin");
    assert_eq!(updated.contributor_username, "c@c.c");
    assert_eq!(updated.create_date, article.create_date);
}

#[tokio::test]
async fn edit_unknown_article_is_not_found() {
    let (state, repo) = test_state();
    let admin = seed_account(&repo, "a@a.a", vec![Role::Admin]).await;

    let result = handlers::update_article(
        admin,
        State(state),
        Path(9999),
        Json(submission("Ghost", -1, 1)),
    )
    .await;
    assert!(matches!(result.unwrap_err(), ApiError::NotFound));
}

#[tokio::test]
async fn delete_rights_follow_ownership() {
    let (state, repo) = test_state();
    let owner = seed_account(&repo, "c@c.c", vec![Role::Contributor]).await;
    let other = seed_account(&repo, "other@x.x", vec![Role::Contributor]).await;

    let (_, Json(article)) = handlers::create_article(
        owner.clone(),
        State(state.clone()),
        Json(submission("Doomed", -1, 1)),
    )
    .await
    .expect("create");

    let result = handlers::delete_article(other, State(state.clone()), Path(article.id)).await;
    assert!(matches!(result.unwrap_err(), ApiError::Authorization));
    assert!(repo.get_article(article.id).await.unwrap().is_some());

    let status = handlers::delete_article(owner, State(state), Path(article.id))
        .await
        .expect("owner delete");
    assert_eq!(status, axum::http::StatusCode::NO_CONTENT);
    assert!(repo.get_article(article.id).await.unwrap().is_none());
}

// --- Public visibility ---

#[tokio::test]
async fn public_listing_contains_only_in_window_articles_newest_first() {
    let (state, repo) = test_state();
    let now = Utc::now();

    for (title, start, end) in [
        ("current-older", now - Duration::days(2), now + Duration::days(1)),
        ("upcoming", now + Duration::days(1), now + Duration::days(2)),
        ("expired", now - Duration::days(9), now - Duration::days(1)),
        ("current-newer", now - Duration::days(1), now + Duration::days(1)),
    ] {
        repo.insert_article(NewArticle {
            title: title.to_string(),
            body: String::new(),
            start_date: start,
            end_date: end,
            contributor_username: "c@c.c".to_string(),
        })
        .await
        .unwrap();
    }

    let Json(listing) = handlers::list_articles(State(state)).await.expect("list");
    let titles: Vec<&str> = listing.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["current-newer", "current-older"]);
}

#[tokio::test]
async fn out_of_window_detail_is_not_found_for_public_but_readable_by_owner() {
    let (state, repo) = test_state();
    let owner = seed_account(&repo, "c@c.c", vec![Role::Contributor]).await;
    let now = Utc::now();

    let article = repo
        .insert_article(NewArticle {
            title: "Expired".to_string(),
            body: String::new(),
            start_date: now - Duration::days(9),
            end_date: now - Duration::days(1),
            contributor_username: "c@c.c".to_string(),
        })
        .await
        .unwrap();

    let result = handlers::get_article_detail(State(state.clone()), Path(article.id)).await;
    assert!(matches!(result.unwrap_err(), ApiError::NotFound));

    let Json(found) = handlers::get_own_article(owner, State(state), Path(article.id))
        .await
        .expect("owner should see own out-of-window article");
    assert_eq!(found.id, article.id);
}

#[tokio::test]
async fn public_detail_resolves_contributor_name_lazily() {
    let (state, repo) = test_state();
    seed_account(&repo, "c@c.c", vec![Role::Contributor]).await;
    let now = Utc::now();

    let article = repo
        .insert_article(NewArticle {
            title: "Visible".to_string(),
            body: String::new(),
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
            contributor_username: "c@c.c".to_string(),
        })
        .await
        .unwrap();

    let Json(detail) = handlers::get_article_detail(State(state.clone()), Path(article.id))
        .await
        .expect("detail");
    assert_eq!(detail.contributor_name.as_deref(), Some("Test User"));

    // Orphaned ownership: the account goes away, the article stays.
    repo.delete_account("c@c.c").await.unwrap();
    let Json(detail) = handlers::get_article_detail(State(state), Path(article.id))
        .await
        .expect("detail after orphaning");
    assert_eq!(detail.contributor_name, None);
    assert_eq!(detail.article.contributor_username, "c@c.c");
}

// --- Admin: roles ---

#[tokio::test]
async fn role_toggle_is_idempotent_both_ways() {
    let (state, repo) = test_state();
    let admin = seed_account(&repo, "a@a.a", vec![Role::Admin]).await;
    seed_account(&repo, "u@u.u", vec![]).await;

    let grant = ToggleRoleRequest {
        username: "u@u.u".to_string(),
        is_contributor: true,
    };
    for _ in 0..3 {
        handlers::update_user_roles(admin.clone(), State(state.clone()), Json(grant.clone()))
            .await
            .expect("grant");
    }
    let account = repo.find_account_by_username("u@u.u").await.unwrap().unwrap();
    assert_eq!(account.roles, vec![Role::Contributor]);

    let revoke = ToggleRoleRequest {
        username: "u@u.u".to_string(),
        is_contributor: false,
    };
    for _ in 0..2 {
        handlers::update_user_roles(admin.clone(), State(state.clone()), Json(revoke.clone()))
            .await
            .expect("revoke");
    }
    let account = repo.find_account_by_username("u@u.u").await.unwrap().unwrap();
    assert!(account.roles.is_empty());

    // Revoking an already-absent role is still a clean no-op.
    handlers::update_user_roles(admin, State(state), Json(revoke))
        .await
        .expect("revoke again");
}

#[tokio::test]
async fn role_toggle_on_unknown_username_is_not_found() {
    let (state, repo) = test_state();
    let admin = seed_account(&repo, "a@a.a", vec![Role::Admin]).await;

    let result = handlers::update_user_roles(
        admin,
        State(state),
        Json(ToggleRoleRequest {
            username: "ghost@x.x".to_string(),
            is_contributor: true,
        }),
    )
    .await;
    assert!(matches!(result.unwrap_err(), ApiError::NotFound));
}

#[tokio::test]
async fn user_listing_requires_admin_and_is_sorted() {
    let (state, repo) = test_state();
    let admin = seed_account(&repo, "z-admin@a.a", vec![Role::Admin]).await;
    let contributor = seed_account(&repo, "c@c.c", vec![Role::Contributor]).await;
    seed_account(&repo, "b@b.b", vec![]).await;

    let result = handlers::list_users(contributor, State(state.clone())).await;
    assert!(matches!(result.unwrap_err(), ApiError::Authorization));

    let Json(views) = handlers::list_users(admin, State(state)).await.expect("list");
    let usernames: Vec<&str> = views.iter().map(|v| v.username.as_str()).collect();
    assert_eq!(usernames, vec!["b@b.b", "c@c.c", "z-admin@a.a"]);
    assert_eq!(views[1].roles, vec![Role::Contributor]);
}

// --- Admin: bans ---

#[tokio::test]
async fn banning_unknown_username_is_not_found() {
    let (state, repo) = test_state();
    let admin = seed_account(&repo, "a@a.a", vec![Role::Admin]).await;

    let result = handlers::ban_user(admin, State(state), Path("ghost@x.x".to_string())).await;
    assert!(matches!(result.unwrap_err(), ApiError::NotFound));
}

#[tokio::test]
async fn hard_ban_removes_the_account() {
    let (state, repo) = test_state();
    let admin = seed_account(&repo, "a@a.a", vec![Role::Admin]).await;
    seed_account(&repo, "c@c.c", vec![Role::Contributor]).await;

    let status = handlers::ban_user(admin, State(state), Path("c@c.c".to_string()))
        .await
        .expect("ban");
    assert_eq!(status, axum::http::StatusCode::NO_CONTENT);
    assert!(repo.find_account_by_username("c@c.c").await.unwrap().is_none());
}

#[tokio::test]
async fn soft_ban_flags_the_account_instead() {
    let mut config = AppConfig::default();
    config.ban_policy = BanPolicy::Soft;
    let (state, repo) = test_state_with_config(config);
    let admin = seed_account(&repo, "a@a.a", vec![Role::Admin]).await;
    seed_account(&repo, "c@c.c", vec![Role::Contributor]).await;

    handlers::ban_user(admin, State(state), Path("c@c.c".to_string()))
        .await
        .expect("soft ban");

    let account = repo.find_account_by_username("c@c.c").await.unwrap().unwrap();
    assert!(account.banned);
}

#[tokio::test]
async fn ban_requires_admin() {
    let (state, repo) = test_state();
    let contributor = seed_account(&repo, "c@c.c", vec![Role::Contributor]).await;
    seed_account(&repo, "victim@x.x", vec![]).await;

    let result =
        handlers::ban_user(contributor, State(state), Path("victim@x.x".to_string())).await;
    assert!(matches!(result.unwrap_err(), ApiError::Authorization));
    assert!(repo.find_account_by_username("victim@x.x").await.unwrap().is_some());
}

// Ensure the AuthUser seeded ids stay unique across helpers.
#[tokio::test]
async fn seeded_accounts_have_distinct_ids() {
    let (_, repo) = test_state();
    let a = seed_account(&repo, "one@x.x", vec![]).await;
    let b = seed_account(&repo, "two@x.x", vec![]).await;
    assert_ne!(a.id, b.id);
    assert_ne!(a.id, Uuid::nil());
}
