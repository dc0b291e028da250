use chrono::{DateTime, Utc};

use crate::{
    auth::AuthUser,
    models::{Article, ArticleSubmission, Role},
};

/// Visibility & Authorization Policy
///
/// Every mutating article handler calls into this module *before* touching
/// the repository, keeping the access rules in one transport-independent
/// place instead of scattering them across route attributes or SQL WHERE
/// clauses.

/// Decision
///
/// Outcome of an authorization check: either the operation may proceed, or
/// it is denied with a reason. The reason is for logs and tests; callers
/// surface a generic Authorization error to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No authenticated actor on a request that requires one.
    Anonymous,
    /// Actor is authenticated but holds neither Contributor nor Admin.
    MissingRole,
    /// Actor is neither the owning contributor nor an Admin.
    NotOwner,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// is_publicly_visible
///
/// The visibility-window predicate: an article is publicly visible exactly
/// while `start_date <= now <= end_date` (both bounds inclusive). The public
/// listing and the anonymous detail lookup must never show an article for
/// which this is false.
pub fn is_publicly_visible(article: &Article, now: DateTime<Utc>) -> bool {
    article.start_date <= now && article.end_date >= now
}

/// authorize_create
///
/// Article creation requires the Contributor or Admin role. The actor is
/// `None` for anonymous requests (which can only happen when the policy is
/// exercised outside the authenticated router, e.g. in tests).
pub fn authorize_create(actor: Option<&AuthUser>) -> Decision {
    match actor {
        None => Decision::Deny(DenyReason::Anonymous),
        Some(user) if user.has_role(Role::Contributor) || user.has_role(Role::Admin) => {
            Decision::Allow
        }
        Some(_) => Decision::Deny(DenyReason::MissingRole),
    }
}

/// authorize_mutation
///
/// Edit and delete are permitted to the owning contributor and to Admins.
/// Everyone else is denied; existence of the article is not hidden from
/// unauthorized callers, so the caller maps this to Authorization, never
/// NotFound.
pub fn authorize_mutation(actor: Option<&AuthUser>, article: &Article) -> Decision {
    match actor {
        None => Decision::Deny(DenyReason::Anonymous),
        Some(user) if user.has_role(Role::Admin) => Decision::Allow,
        Some(user) if user.username == article.contributor_username => Decision::Allow,
        Some(_) => Decision::Deny(DenyReason::NotOwner),
    }
}

/// ValidatedSubmission
///
/// A submission that passed field validation: title trimmed and non-empty,
/// both window dates present and correctly ordered. The body is still raw
/// here; sanitization happens after validation, before persistence.
#[derive(Debug, Clone)]
pub struct ValidatedSubmission {
    pub title: String,
    pub body: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// ValidationFailure
///
/// Names the first offending field. The handler echoes the in-progress
/// submission back alongside this so the caller can correct and resubmit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub field: &'static str,
    pub message: String,
}

impl ValidationFailure {
    fn new(field: &'static str, message: &str) -> Self {
        ValidationFailure {
            field,
            message: message.to_string(),
        }
    }
}

/// validate_submission
///
/// Field-level validation accompanying every create and edit. Checks run in
/// field order and stop at the first failure, matching the original form
/// behavior of reporting one error at a time.
pub fn validate_submission(
    submission: &ArticleSubmission,
) -> Result<ValidatedSubmission, ValidationFailure> {
    let title = submission.title.trim();
    if title.is_empty() {
        return Err(ValidationFailure::new("title", "Title is required."));
    }

    let start_date = submission
        .start_date
        .ok_or_else(|| ValidationFailure::new("start_date", "Start Date is required."))?;
    let end_date = submission
        .end_date
        .ok_or_else(|| ValidationFailure::new("end_date", "End Date is required."))?;

    if end_date < start_date {
        return Err(ValidationFailure::new(
            "end_date",
            "End Date must be after Start Date.",
        ));
    }

    Ok(ValidatedSubmission {
        title: title.to_string(),
        body: submission.body.clone().unwrap_or_default(),
        start_date,
        end_date,
    })
}
