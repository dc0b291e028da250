use chrono::{Duration, Utc};

use crate::{
    auth,
    config::AppConfig,
    error::ApiResult,
    models::{NewAccount, NewArticle, Role},
    repository::{Repository, RepositoryError},
};

/// Database seeding
///
/// Ensures the bootstrap accounts and one sample article exist, mirroring
/// the original startup seeding. Idempotent: existing accounts are left
/// untouched (their passwords are not rotated), and the sample article is
/// keyed by its title.

const ADMIN_USERNAME: &str = "a@a.a";
const CONTRIBUTOR_USERNAME: &str = "c@c.c";
const SAMPLE_TITLE: &str = "The Rise of AI in Everyday Life: Transforming the Future";

const SAMPLE_BODY: &str = "<p>Artificial Intelligence (AI) has rapidly become one of the most \
transformative technologies of the 21st century. From healthcare to finance, AI is \
revolutionizing industries, enhancing human capabilities, and reshaping the way we live and \
work.</p>\
<p>In healthcare, AI algorithms are now able to analyze medical images, predict patient \
outcomes, and assist doctors in diagnosing diseases with unprecedented accuracy. In finance, \
AI is helping detect fraudulent activities, optimize trading strategies, and provide better \
customer service.</p>\
<p>As we look to the future, the possibilities seem endless. The question is no longer \
whether AI will change our lives, but how we will adapt to this new, intelligent world.</p>";

async fn ensure_account(
    repo: &dyn Repository,
    username: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
    role: Role,
) -> ApiResult<()> {
    if repo.find_account_by_username(username).await?.is_some() {
        return Ok(());
    }

    let password_hash = auth::hash_password(password)?;
    let inserted = repo
        .insert_account(NewAccount {
            username: username.to_string(),
            email: username.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            password_hash,
            roles: vec![role],
        })
        .await;

    match inserted {
        Ok(_) => {
            tracing::info!("seeded account {username} with role {}", role.as_str());
            Ok(())
        }
        // Lost a race against a concurrent boot; the account exists now.
        Err(RepositoryError::Conflict(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// initialize
///
/// Runs the full seeding pass: admin account, contributor account, and the
/// sample article (owned by the contributor, visible for 7 days from now).
pub async fn initialize(repo: &dyn Repository, config: &AppConfig) -> ApiResult<()> {
    ensure_account(
        repo,
        ADMIN_USERNAME,
        "Admin",
        "User",
        &config.seed_admin_password,
        Role::Admin,
    )
    .await?;

    ensure_account(
        repo,
        CONTRIBUTOR_USERNAME,
        "Contributor",
        "User",
        &config.seed_contributor_password,
        Role::Contributor,
    )
    .await?;

    if repo.find_article_by_title(SAMPLE_TITLE).await?.is_none() {
        let now = Utc::now();
        repo.insert_article(NewArticle {
            title: SAMPLE_TITLE.to_string(),
            body: SAMPLE_BODY.to_string(),
            start_date: now,
            end_date: now + Duration::days(7),
            contributor_username: CONTRIBUTOR_USERNAME.to_string(),
        })
        .await?;
        tracing::info!("seeded sample article");
    }

    Ok(())
}
