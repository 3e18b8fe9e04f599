// Object storage for activity photos - uploads are stored under generated names only

mod local;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

pub use self::local::LocalObjectStore;

/// Extensions accepted for uploaded images.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("Object not found: {0}")]
    NotFound(String),
}

/// An image as received from the caller.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Bytes,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// Storage backend for uploaded images
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under `name`, returning the public reference.
    async fn put(&self, name: &str, data: Bytes) -> Result<String, ObjectStoreError>;

    async fn get(&self, name: &str) -> Result<Bytes, ObjectStoreError>;

    /// Remove an object. Removing a missing object is not an error.
    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError>;

    /// Public reference for a stored name.
    fn public_ref(&self, name: &str) -> String;

    /// Recover the stored name from a public reference this store issued.
    fn name_from_ref(&self, reference: &str) -> Option<String>;
}

/// Type alias for Arc-wrapped store (for AppState)
pub type DynObjectStore = Arc<dyn ObjectStore>;

/// Pick the stored extension from the client's file name or content type.
pub fn image_extension(file_name: Option<&str>, content_type: Option<&str>) -> Option<&'static str> {
    let from_name = file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .and_then(|ext| ALLOWED_EXTENSIONS.iter().copied().find(|a| *a == ext));

    from_name.or_else(|| match content_type.map(|c| c.trim().to_ascii_lowercase()) {
        Some(c) if c == "image/jpeg" || c == "image/jpg" => Some("jpg"),
        Some(c) if c == "image/png" => Some("png"),
        _ => None,
    })
}

/// Fresh unique object name, e.g. `0190f3c2-...-7e1a.png`.
pub fn generate_object_name(extension: &str) -> String {
    format!("{}.{}", uuid::Uuid::now_v7(), extension)
}

/// Names this crate generates: one dot, ASCII alphanumerics and dashes only.
pub fn is_valid_object_name(name: &str) -> bool {
    let Some((stem, ext)) = name.split_once('.') else {
        return false;
    };
    !stem.is_empty()
        && stem.len() <= 64
        && stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && ALLOWED_EXTENSIONS.contains(&ext)
}
