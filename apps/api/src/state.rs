use std::sync::Arc;

use crate::auth::JwtVerifier;
use crate::review::service::ReviewService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub reviewer: Arc<ReviewService>,
    /// Token verifier. `None` when security is disabled (local development).
    pub auth: Option<Arc<JwtVerifier>>,
}
