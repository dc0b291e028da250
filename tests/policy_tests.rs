use blog_portal::{
    auth::AuthUser,
    models::{Article, ArticleSubmission, Role},
    policy::{self, Decision, DenyReason},
};
use chrono::{Duration, Utc};
use uuid::Uuid;

// --- Fixtures ---

fn article_with_window(start_offset_days: i64, end_offset_days: i64) -> Article {
    let now = Utc::now();
    Article {
        id: 1,
        title: "Test".to_string(),
        body: String::new(),
        create_date: now,
        start_date: now + Duration::days(start_offset_days),
        end_date: now + Duration::days(end_offset_days),
        contributor_username: "c@c.c".to_string(),
    }
}

fn user(username: &str, roles: Vec<Role>) -> AuthUser {
    AuthUser {
        id: Uuid::new_v4(),
        username: username.to_string(),
        roles,
    }
}

fn submission(start_days: i64, end_days: i64) -> ArticleSubmission {
    let now = Utc::now();
    ArticleSubmission {
        title: "Test".to_string(),
        body: Some("hello".to_string()),
        start_date: Some(now + Duration::days(start_days)),
        end_date: Some(now + Duration::days(end_days)),
        contributor_username: None,
    }
}

// --- Visibility window ---

#[test]
fn article_inside_window_is_visible() {
    let article = article_with_window(-1, 1);
    assert!(policy::is_publicly_visible(&article, Utc::now()));
}

#[test]
fn article_before_window_is_hidden() {
    let article = article_with_window(1, 2);
    assert!(!policy::is_publicly_visible(&article, Utc::now()));
}

#[test]
fn article_after_window_is_hidden() {
    let article = article_with_window(-2, -1);
    assert!(!policy::is_publicly_visible(&article, Utc::now()));
}

#[test]
fn window_bounds_are_inclusive() {
    let now = Utc::now();
    let mut article = article_with_window(0, 0);
    article.start_date = now;
    article.end_date = now;
    assert!(policy::is_publicly_visible(&article, now));
}

// --- Creation authorization ---

#[test]
fn contributor_may_create() {
    let actor = user("c@c.c", vec![Role::Contributor]);
    assert_eq!(policy::authorize_create(Some(&actor)), Decision::Allow);
}

#[test]
fn admin_may_create() {
    let actor = user("a@a.a", vec![Role::Admin]);
    assert_eq!(policy::authorize_create(Some(&actor)), Decision::Allow);
}

#[test]
fn plain_reader_may_not_create() {
    let actor = user("r@r.r", vec![]);
    assert_eq!(
        policy::authorize_create(Some(&actor)),
        Decision::Deny(DenyReason::MissingRole)
    );
}

#[test]
fn anonymous_may_not_create() {
    assert_eq!(
        policy::authorize_create(None),
        Decision::Deny(DenyReason::Anonymous)
    );
}

// --- Mutation authorization ---

#[test]
fn owner_may_mutate_own_article() {
    let article = article_with_window(-1, 1);
    let actor = user("c@c.c", vec![Role::Contributor]);
    assert_eq!(
        policy::authorize_mutation(Some(&actor), &article),
        Decision::Allow
    );
}

#[test]
fn admin_may_mutate_any_article() {
    let article = article_with_window(-1, 1);
    let actor = user("a@a.a", vec![Role::Admin]);
    assert_eq!(
        policy::authorize_mutation(Some(&actor), &article),
        Decision::Allow
    );
}

#[test]
fn other_contributor_may_not_mutate() {
    let article = article_with_window(-1, 1);
    let actor = user("other@x.x", vec![Role::Contributor]);
    assert_eq!(
        policy::authorize_mutation(Some(&actor), &article),
        Decision::Deny(DenyReason::NotOwner)
    );
}

#[test]
fn anonymous_may_not_mutate() {
    let article = article_with_window(-1, 1);
    assert_eq!(
        policy::authorize_mutation(None, &article),
        Decision::Deny(DenyReason::Anonymous)
    );
}

// --- Field validation ---

#[test]
fn valid_submission_passes() {
    let validated = policy::validate_submission(&submission(-1, 1)).expect("should validate");
    assert_eq!(validated.title, "Test");
    assert_eq!(validated.body, "hello");
}

#[test]
fn title_is_trimmed_and_required() {
    let mut s = submission(-1, 1);
    s.title = "  \t ".to_string();
    let failure = policy::validate_submission(&s).unwrap_err();
    assert_eq!(failure.field, "title");

    s.title = "  padded  ".to_string();
    let validated = policy::validate_submission(&s).expect("should validate");
    assert_eq!(validated.title, "padded");
}

#[test]
fn missing_dates_are_rejected() {
    let mut s = submission(-1, 1);
    s.start_date = None;
    assert_eq!(policy::validate_submission(&s).unwrap_err().field, "start_date");

    let mut s = submission(-1, 1);
    s.end_date = None;
    assert_eq!(policy::validate_submission(&s).unwrap_err().field, "end_date");
}

#[test]
fn end_before_start_is_rejected() {
    let failure = policy::validate_submission(&submission(1, -1)).unwrap_err();
    assert_eq!(failure.field, "end_date");
}

#[test]
fn equal_start_and_end_is_accepted() {
    let now = Utc::now();
    let s = ArticleSubmission {
        title: "Same-day".to_string(),
        body: None,
        start_date: Some(now),
        end_date: Some(now),
        contributor_username: None,
    };
    let validated = policy::validate_submission(&s).expect("equal dates are a valid window");
    assert_eq!(validated.body, "");
    assert_eq!(validated.start_date, validated.end_date);
}
