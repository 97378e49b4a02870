//! Driving port for login/authentication use-cases.
//!
//! Inbound adapters call it to turn credentials into an identity profile
//! without knowing which identity provider stands behind it. Account
//! onboarding happens afterwards in the accounts service.

use async_trait::async_trait;

use crate::domain::{EmailAddress, Error, IdentityProfile, LoginCredentials};

/// Domain use-case port for authentication.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoginService: Send + Sync {
    /// Validate credentials and return the verified identity.
    async fn authenticate(&self, credentials: &LoginCredentials)
    -> Result<IdentityProfile, Error>;
}

/// Email address the fixture identity signs in with.
pub const FIXTURE_EMAIL: &str = "admin@forge.local";

/// Development authenticator.
///
/// `admin` / `password` authenticates as [`FIXTURE_EMAIL`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureLoginService;

#[async_trait]
impl LoginService for FixtureLoginService {
    async fn authenticate(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<IdentityProfile, Error> {
        if credentials.username() == "admin" && credentials.password() == "password" {
            let email = EmailAddress::new(FIXTURE_EMAIL)
                .map_err(|err| Error::internal(format!("invalid fixture email: {err}")))?;
            Ok(IdentityProfile {
                email,
                name: Some("Admin".to_owned()),
                image: None,
                github_id: None,
            })
        } else {
            Err(Error::unauthorized("invalid credentials"))
        }
    }
}
