use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;

use super::{is_valid_object_name, ObjectStore, ObjectStoreError};

/// Images kept as plain files in one directory.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, ObjectStoreError> {
        if !is_valid_object_name(name) {
            return Err(ObjectStoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<String, ObjectStoreError> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.root).await?;

        // create_new: a generated name must never overwrite an existing object
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &data).await?;
        tokio::io::AsyncWriteExt::flush(&mut file).await?;

        tracing::debug!(object = %name, size = data.len(), "Stored image");
        Ok(self.public_ref(name))
    }

    async fn get(&self, name: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(object = %name, "Deleted image");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_ref(&self, name: &str) -> String {
        format!("{}/{}", self.public_base, name)
    }

    fn name_from_ref(&self, reference: &str) -> Option<String> {
        let name = reference
            .strip_prefix(&self.public_base)?
            .strip_prefix('/')?;
        is_valid_object_name(name).then(|| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::generate_object_name;

    #[tokio::test]
    async fn test_put_get_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(tmp.path().join("uploads"), "/images");

        let name = generate_object_name("png");
        let reference = store.put(&name, Bytes::from_static(b"png-bytes")).await.unwrap();
        assert_eq!(reference, format!("/images/{}", name));

        let data = store.get(&name).await.unwrap();
        assert_eq!(&data[..], b"png-bytes");

        store.delete(&name).await.unwrap();
        assert!(matches!(
            store.get(&name).await,
            Err(ObjectStoreError::NotFound(_))
        ));

        // Deleting again is fine
        store.delete(&name).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_never_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(tmp.path(), "/images");

        let name = generate_object_name("jpg");
        store.put(&name, Bytes::from_static(b"one")).await.unwrap();
        assert!(store.put(&name, Bytes::from_static(b"two")).await.is_err());
        assert_eq!(&store.get(&name).await.unwrap()[..], b"one");
    }

    #[tokio::test]
    async fn test_traversal_names_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(tmp.path(), "/images");

        let result = store.put("../escape.png", Bytes::from_static(b"x")).await;
        assert!(matches!(result, Err(ObjectStoreError::InvalidName(_))));
        assert!(matches!(
            store.delete("../../etc/passwd").await,
            Err(ObjectStoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_name_from_ref() {
        let store = LocalObjectStore::new("/tmp/unused", "https://cdn.example/img/");
        assert_eq!(store.public_ref("abc-1.png"), "https://cdn.example/img/abc-1.png");
        assert_eq!(
            store.name_from_ref("https://cdn.example/img/abc-1.png").as_deref(),
            Some("abc-1.png")
        );
        assert_eq!(store.name_from_ref("https://elsewhere/abc-1.png"), None);
        assert_eq!(store.name_from_ref("https://cdn.example/img/../x.png"), None);
    }
}
