//! # External Single Sign-On
//!
//! OIDC, GitHub OAuth and SAML login flows. Each flow is an explicit state
//! machine keyed by an unpredictable `state` parameter:
//!
//! ```text
//! idle -> redirecting -> awaiting-callback -> exchanging -> established
//! ```
//!
//! `begin_*` creates the state row and returns the redirect (idle through
//! awaiting-callback); the callback handler consumes the row exactly once
//! (exchanging) and establishes a session. Abandoned states expire and are
//! swept by maintenance.

pub mod github;
pub mod oidc;
pub mod saml;

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;

/// The outcome of a completed external login: who the user is and which
/// groups the IdP asserted for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedLogin {
    pub username: String,
    pub groups: Vec<String>,
}

/// Run an upstream IdP call, retrying once with backoff on failure before
/// surfacing the error.
pub(crate) async fn retry_once<T, F, Fut>(operation: F) -> Result<T, ApiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    match operation().await {
        Ok(value) => Ok(value),
        Err(first) => {
            tracing::warn!(error = %first, "IdP request failed, retrying once");
            tokio::time::sleep(Duration::from_millis(500)).await;
            operation().await
        }
    }
}
