pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{AvatarId, PasswordHash, Principal, User, UserId, AVATAR_IDS};
pub use repository::{DynUserRepository, SqliteUserRepository, UserRepository};
pub use service::{IdentityService, ProfileChanges};
