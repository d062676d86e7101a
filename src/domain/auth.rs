//! Authentication domain types
//!
//! Request/response types for the identity-provider proxy, plus the
//! mapping from provider error codes to the small set of user-facing
//! sign-in messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sign in request
#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Authenticated user identity available application-wide for the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Auth response with tokens
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: User,
}

/// Session response
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub access_token: String,
    pub expires_at: i64,
}

/// Canonical sign-in failure categories. Every provider error code lands
/// in exactly one of these; the user never sees raw provider codes.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignInErrorKind {
    UnauthorizedDomain,
    LoginDisabled,
    UserNotFound,
    WrongPassword,
    InvalidCredential,
    RateLimited,
    NetworkFailure,
    Unknown,
}

impl SignInErrorKind {
    pub fn from_provider_code(code: &str) -> Self {
        match code {
            "auth/unauthorized-domain" => Self::UnauthorizedDomain,
            "auth/operation-not-allowed" => Self::LoginDisabled,
            "auth/user-not-found" => Self::UserNotFound,
            "auth/wrong-password" => Self::WrongPassword,
            "auth/invalid-credential" => Self::InvalidCredential,
            "auth/too-many-requests" => Self::RateLimited,
            "auth/network-request-failed" => Self::NetworkFailure,
            _ => Self::Unknown,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnauthorizedDomain => {
                "this deployment's domain is not authorized for sign-in; \
                 add it to the provider's allowed domains"
            }
            Self::LoginDisabled => {
                "email/password sign-in is not enabled for this project"
            }
            Self::UserNotFound => "no account exists for that email address",
            Self::WrongPassword => "the password is incorrect",
            Self::InvalidCredential => "the credential is invalid; check email and password",
            Self::RateLimited => {
                "too many attempts; the account is temporarily locked, try again later"
            }
            Self::NetworkFailure => "network problem while contacting the sign-in service",
            Self::Unknown => "an unknown authentication error occurred",
        }
    }
}

/// Error payload returned by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProviderErrorResponse {
    /// Provider code under whichever key this provider version used.
    pub fn provider_code(&self) -> &str {
        self.code
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("")
    }

    pub fn kind(&self) -> SignInErrorKind {
        SignInErrorKind::from_provider_code(self.provider_code())
    }
}

/// Token-bearing response from the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderAuthResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub user: ProviderUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    pub email: Option<String>,
    pub created_at: Option<String>,
}

impl From<ProviderUser> for User {
    fn from(pu: ProviderUser) -> Self {
        Self {
            id: pu.id,
            email: pu.email,
            created_at: pu.created_at.and_then(|s| s.parse().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_provider_codes_map_to_their_category() {
        let cases = [
            ("auth/unauthorized-domain", SignInErrorKind::UnauthorizedDomain),
            ("auth/operation-not-allowed", SignInErrorKind::LoginDisabled),
            ("auth/user-not-found", SignInErrorKind::UserNotFound),
            ("auth/wrong-password", SignInErrorKind::WrongPassword),
            ("auth/invalid-credential", SignInErrorKind::InvalidCredential),
            ("auth/too-many-requests", SignInErrorKind::RateLimited),
            ("auth/network-request-failed", SignInErrorKind::NetworkFailure),
        ];
        for (code, expected) in cases {
            assert_eq!(SignInErrorKind::from_provider_code(code), expected);
        }
    }

    #[test]
    fn unrecognized_codes_fall_back_to_unknown() {
        assert_eq!(
            SignInErrorKind::from_provider_code("auth/something-new"),
            SignInErrorKind::Unknown
        );
        assert_eq!(
            SignInErrorKind::from_provider_code(""),
            SignInErrorKind::Unknown
        );
    }

    #[test]
    fn error_payload_reads_code_from_either_key() {
        let legacy: ProviderErrorResponse =
            serde_json::from_str(r#"{"error": "auth/wrong-password"}"#).unwrap();
        assert_eq!(legacy.kind(), SignInErrorKind::WrongPassword);

        let current: ProviderErrorResponse =
            serde_json::from_str(r#"{"code": "auth/too-many-requests", "message": "x"}"#)
                .unwrap();
        assert_eq!(current.kind(), SignInErrorKind::RateLimited);
    }
}
