use crate::error::{AuthError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// Minimum length accepted for a new password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Returns true when `email` has the shape `local@domain.tld`.
///
/// ```
/// use core_auth::types::is_valid_email;
///
/// assert!(is_valid_email("clerk@duka.co"));
/// assert!(!is_valid_email("clerk@duka"));
/// assert!(!is_valid_email("clerk @duka.co"));
/// ```
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Role of an authenticated user.
///
/// The canonical form is lowercase. Parsing ignores case and surrounding
/// whitespace, so `"ADMIN"` and `" Admin "` both yield [`Role::Admin`].
///
/// # Examples
///
/// ```
/// use core_auth::Role;
///
/// let role: Role = " Merchant ".parse().unwrap();
/// assert_eq!(role, Role::Merchant);
/// assert_eq!(role.as_str(), "merchant");
/// assert_eq!(role.home_route(), "/merchant/dashboard");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Clerk,
    Admin,
    Merchant,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Clerk, Role::Admin, Role::Merchant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Clerk => "clerk",
            Role::Admin => "admin",
            Role::Merchant => "merchant",
        }
    }

    /// Landing route after sign-in for this role.
    pub fn home_route(&self) -> &'static str {
        match self {
            Role::Clerk => "/clerk/dashboard",
            Role::Admin => "/admin/dashboard",
            Role::Merchant => "/merchant/dashboard",
        }
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "clerk" => Ok(Role::Clerk),
            "admin" => Ok(Role::Admin),
            "merchant" => Ok(Role::Merchant),
            other => Err(AuthError::InvalidResponse(format!(
                "unknown role '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Profile of the signed-in user as returned by the backend.
///
/// Persisted as JSON under the `user` storage key, always with the
/// canonical lowercase role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Backend identifier; numeric ids are kept in their decimal form.
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserProfile {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

/// Access/refresh token pair owned by the session store.
///
/// # Security
///
/// The `Debug` implementation redacts both values.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Login credentials. Never persisted.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }

    /// Local checks performed before any request is sent.
    pub fn validate(&self) -> Result<()> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(AuthError::Validation(
                "Please provide a valid email address".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Fields submitted when accepting an invitation.
#[derive(Clone, Serialize)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegistrationForm {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("name", self.name.is_empty()),
            ("email", self.email.is_empty()),
            ("password", self.password.is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, empty)| empty.then_some(field))
        .collect();

        if !missing.is_empty() {
            return Err(AuthError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        if !is_valid_email(&self.email) {
            return Err(AuthError::Validation(
                "Please provide a valid email address".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Session lifecycle state.
///
/// # State Transitions
///
/// ```text
/// SignedOut --login / validate ok--> SignedIn
///     ^                                 |  ^
///     |   logout / refresh failure      v  |
///     +-------------------------- TokenRefreshing
///
/// SignedOut --initialize--> Validating --ok--> SignedIn
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    /// Startup validation against `/auth/me` is running
    Validating,
    SignedIn,
    /// A token refresh is in flight
    TokenRefreshing,
}

impl AuthState {
    /// Returns `true` for `SignedIn` and `TokenRefreshing`.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::SignedIn | AuthState::TokenRefreshing)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::SignedOut => write!(f, "Signed Out"),
            AuthState::Validating => write!(f, "Validating Session..."),
            AuthState::SignedIn => write!(f, "Signed In"),
            AuthState::TokenRefreshing => write!(f, "Refreshing Token..."),
        }
    }
}

/// Builds the login route carrying the page to return to after sign-in.
///
/// ```
/// use core_auth::login_redirect;
///
/// assert_eq!(
///     login_redirect("/admin/clerks"),
///     "/login?redirect=%2Fadmin%2Fclerks"
/// );
/// ```
pub fn login_redirect(return_to: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(return_to.as_bytes()).collect();
    format!("/login?redirect={}", encoded)
}
