/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated
/// modules. Access control is applied explicitly at the module level (via
/// Axum layers and in-handler policy checks), preventing accidental
/// exposure of protected endpoints.

/// Routes accessible to all users (anonymous, read-only, plus the identity
/// gateway). Handlers must enforce the visibility window at the repository
/// level.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware. Requires a
/// validated user session; role and ownership checks happen in the policy
/// module.
pub mod authenticated;

/// Routes restricted exclusively to users with the Admin role.
pub mod admin;
