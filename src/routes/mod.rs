/// Router Module Index
///
/// Organizes the application's routing into two areas. Access control is
/// applied explicitly where routes are mounted (via Axum layers), so a
/// route's guard status is visible in the router assembly rather than buried
/// in its handler.

/// The public content surface: front page, category/archive/tag listings,
/// post detail, search, and the comment submission endpoint. Commenting is
/// the one write operation here; it requires a logged-in caller through the
/// `CurrentUser` extractor rather than a route guard.
pub mod blog;

/// The account surface: the open login/register/logout flows plus the
/// guarded account area (home, own comments, profile editor).
pub mod account;
