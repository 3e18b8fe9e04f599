// Identity service - maps principals and local credentials onto one canonical user

use crate::auth::session::Session;
use crate::db::RepositoryError;
use crate::error::{AppError, AppResult};
use crate::identity::domain::*;
use crate::identity::repository::{DynUserRepository, ProfileUpdate};

/// Upper bound on identifier probes for a single reconciliation.
const MAX_PROBES: u32 = 10_000;

/// Field changes requested by a profile edit.
#[derive(Debug, Default, Clone)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub avatar_id: Option<String>,
    pub new_password: Option<String>,
}

pub struct IdentityService {
    users: DynUserRepository,
    bcrypt_cost: u32,
}

impl IdentityService {
    pub fn new(users: DynUserRepository, bcrypt_cost: u32) -> Self {
        Self { users, bcrypt_cost }
    }

    /// Map an authenticated principal onto exactly one `User`, creating it if needed.
    pub async fn resolve_or_create_user(&self, principal: &Principal) -> AppResult<User> {
        if principal.identity.trim().is_empty() {
            return Err(AppError::Validation("Principal has no identity".into()));
        }

        // 1. Already linked
        if let Some(user) = self.users.find_by_identity(&principal.identity).await? {
            return Ok(user);
        }

        // 2. Known by email: attach the identity
        if let Some(user) = self.link_by_email(principal).await? {
            return Ok(user);
        }

        // 3. New user with a unique identifier
        let base = base_candidate(principal.email.as_deref());
        let mut attempt = 1;
        while attempt <= MAX_PROBES {
            let candidate = candidate_with_suffix(&base, attempt);
            if self.users.exists(&candidate).await? {
                attempt += 1;
                continue;
            }

            let user = User::from_principal(candidate, principal);
            match self.users.insert(&user).await {
                Ok(()) => {
                    tracing::info!(
                        user_id = %user.user_id,
                        identity = %principal.identity,
                        "Created user for new principal"
                    );
                    return Ok(user);
                }
                Err(RepositoryError::Conflict(detail)) => {
                    // Lost a race: another request may have created this principal
                    tracing::warn!(
                        candidate = %user.user_id,
                        %detail,
                        "Insert conflict during reconciliation"
                    );
                    if let Some(existing) =
                        self.users.find_by_identity(&principal.identity).await?
                    {
                        return Ok(existing);
                    }
                    if let Some(existing) = self.link_by_email(principal).await? {
                        return Ok(existing);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Internal(format!(
            "No free user ID for base {:?} after {} probes",
            base, MAX_PROBES
        )))
    }

    async fn link_by_email(&self, principal: &Principal) -> AppResult<Option<User>> {
        let Some(email) = principal.email.as_deref() else {
            return Ok(None);
        };
        let Some(mut user) = self.users.find_by_email(email).await? else {
            return Ok(None);
        };

        if user.auth_identity.as_deref() != Some(principal.identity.as_str()) {
            self.users
                .link_identity(&user.user_id, &principal.identity)
                .await?;
            tracing::info!(
                user_id = %user.user_id,
                identity = %principal.identity,
                "Linked principal to existing user by email"
            );
            user.auth_identity = Some(principal.identity.clone());
        }
        Ok(Some(user))
    }

    /// Sign Up: create a locally authenticated user.
    pub async fn create_user(
        &self,
        user_id: &str,
        password: &str,
        display_name: &str,
        avatar_id: &str,
    ) -> AppResult<User> {
        let user_id = UserId::parse(user_id).map_err(AppError::Validation)?;
        if password.is_empty() {
            return Err(AppError::Validation("Password is required".into()));
        }
        let avatar_id = AvatarId::parse_or_default(Some(avatar_id)).map_err(AppError::Validation)?;
        let display_name = clean_display_name(display_name)
            .map_err(AppError::Validation)?
            .unwrap_or_else(|| user_id.as_str().to_string());

        if self.users.exists(&user_id).await? {
            return Err(AppError::DuplicateIdentifier);
        }

        let password_hash = PasswordHash::new(password, self.bcrypt_cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let user = User {
            user_id,
            display_name,
            avatar_id,
            email: None,
            auth_identity: None,
            password_hash: Some(password_hash),
        };

        // The insert is the real uniqueness check; the probe above only saves a hash
        match self.users.insert(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.user_id, "User signed up");
                Ok(user)
            }
            Err(RepositoryError::Conflict(_)) => Err(AppError::DuplicateIdentifier),
            Err(e) => Err(e.into()),
        }
    }

    /// Sign In with a local credential pair.
    ///
    /// Returns `NotFound` for an unknown id and `InvalidCredential` for a bad
    /// password; callers facing end users should not tell the two apart.
    pub async fn authenticate(&self, user_id: &str, password: &str) -> AppResult<User> {
        let user = match self.users.find_by_id(&UserId::new(user_id.trim())).await? {
            Some(user) => user,
            None => {
                // Spend the same bcrypt work as a real verify
                let _ = PasswordHash::new(password, self.bcrypt_cost);
                return Err(AppError::NotFound);
            }
        };

        match &user.password_hash {
            Some(hash) if hash.verify(password) => Ok(user),
            Some(_) => Err(AppError::InvalidCredential),
            None => {
                let _ = PasswordHash::new(password, self.bcrypt_cost);
                Err(AppError::InvalidCredential)
            }
        }
    }

    /// Profile edit for the session's user. Blank display names keep the old one.
    pub async fn update_profile(
        &self,
        session: &Session,
        changes: ProfileChanges,
    ) -> AppResult<User> {
        let display_name = match changes.display_name.as_deref() {
            Some(raw) => clean_display_name(raw).map_err(AppError::Validation)?,
            None => None,
        };
        let avatar_id = match changes.avatar_id.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(
                AvatarId::parse(raw)
                    .ok_or_else(|| AppError::Validation(format!("Unknown avatar: {}", raw)))?,
            ),
            _ => None,
        };
        let password_hash = match changes.new_password.as_deref() {
            Some(pw) if !pw.is_empty() => Some(
                PasswordHash::new(pw, self.bcrypt_cost)
                    .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?,
            ),
            _ => None,
        };

        let user_id = &session.user.user_id;
        self.users
            .update_profile(
                user_id,
                &ProfileUpdate {
                    display_name,
                    avatar_id,
                    password_hash,
                },
            )
            .await?;

        tracing::info!(user_id = %user_id, "Profile updated");
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}
