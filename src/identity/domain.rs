// Identity domain types - pure, no storage access
use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in avatars, in the order the picker shows them.
pub const AVATAR_IDS: [&str; 7] = [
    "a1.png", "a2.png", "a3.png", "a4.png", "a5.png", "a6.png", "a7.png",
];

/// Base identifier used when a principal has no usable email.
pub const FALLBACK_USER_ID: &str = "user";

const MAX_USER_ID_LEN: usize = 64;
const MAX_DISPLAY_NAME_LEN: usize = 100;

/// Label shown for an owner without a display name.
pub const ANONYMOUS_LABEL: &str = "Anonymous";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Validate a user-chosen identifier (sign-up).
    pub fn parse(raw: &str) -> Result<Self, String> {
        let id = raw.trim();
        if id.is_empty() {
            return Err("User ID is required".into());
        }
        if id.chars().count() > MAX_USER_ID_LEN {
            return Err(format!(
                "User ID must be {} characters or less",
                MAX_USER_ID_LEN
            ));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err("User ID cannot contain spaces".into());
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvatarId(String);

impl AvatarId {
    /// Accepts only one of the built-in avatars.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        AVATAR_IDS
            .iter()
            .find(|id| **id == raw)
            .map(|id| Self(id.to_string()))
    }

    /// Blank input falls back to the default avatar; anything else must be built in.
    pub fn parse_or_default(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(Self::default()),
            Some(id) => Self::parse(id).ok_or_else(|| format!("Unknown avatar: {}", id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AvatarId {
    fn default() -> Self {
        Self(AVATAR_IDS[0].to_string())
    }
}

/// bcrypt hash of a password; never holds plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(plaintext: &str, cost: u32) -> Result<Self, bcrypt::BcryptError> {
        bcrypt::hash(plaintext, cost).map(Self)
    }

    pub fn from_stored(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Verify plaintext against the stored hash - constant-time via bcrypt
    pub fn verify(&self, plaintext: &str) -> bool {
        bcrypt::verify(plaintext, &self.0).unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

/// Authenticated identity handed over by an external identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub identity: String,
    pub email: Option<String>,
}

impl Principal {
    pub fn new(identity: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            identity: identity.into(),
            email: email
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_id: AvatarId,
    pub email: Option<String>,
    pub auth_identity: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<PasswordHash>,
}

impl User {
    /// Fresh user for a principal seen for the first time.
    pub fn from_principal(user_id: UserId, principal: &Principal) -> Self {
        Self {
            display_name: user_id.as_str().to_string(),
            user_id,
            avatar_id: AvatarId::default(),
            email: principal.email.clone(),
            auth_identity: Some(principal.identity.clone()),
            password_hash: None,
        }
    }

    /// Name shown next to this user's entries.
    pub fn label(&self) -> &str {
        owner_label(&self.display_name)
    }
}

pub fn owner_label(display_name: &str) -> &str {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        ANONYMOUS_LABEL
    } else {
        trimmed
    }
}

/// Normalize a display name; blank means "keep/derive something else".
pub fn clean_display_name(raw: &str) -> Result<Option<String>, String> {
    let name = raw.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(format!(
            "Display name must be {} characters or less",
            MAX_DISPLAY_NAME_LEN
        ));
    }
    Ok(Some(name.to_string()))
}

/// Base identifier for a new reconciled user: the email local-part, or the fallback token.
pub fn base_candidate(email: Option<&str>) -> String {
    email
        .filter(|e| e.contains('@'))
        .and_then(|e| e.split('@').next())
        .map(str::trim)
        .filter(|local| !local.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_USER_ID.to_string())
}

/// Candidate for the `attempt`-th probe: `base`, then `base2`, `base3`, ...
pub fn candidate_with_suffix(base: &str, attempt: u32) -> UserId {
    if attempt <= 1 {
        UserId::new(base)
    } else {
        UserId::new(format!("{}{}", base, attempt))
    }
}
