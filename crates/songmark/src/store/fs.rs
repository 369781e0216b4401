//! Filesystem-backed object store.
//!
//! Buckets are directories under a root; object keys map to relative
//! paths. Keys are validated before touching the filesystem so a hostile
//! key can never escape the root.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;

use super::ObjectStore;

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_name(bucket).map_err(|reason| StoreError::InvalidKey {
            key: bucket.to_string(),
            reason,
        })?;
        validate_key(key).map_err(|reason| StoreError::InvalidKey {
            key: key.to_string(),
            reason,
        })?;
        Ok(self.root.join(bucket).join(key))
    }
}

/// Bucket names are single path components.
fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty name".to_string());
    }
    if name.contains('/') || name.contains('\\') {
        return Err("contains path separators".to_string());
    }
    if name.contains("..") {
        return Err("contains path traversal".to_string());
    }
    Ok(())
}

/// Keys may contain forward slashes (logical folders) but must stay
/// relative and traversal-free.
fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("empty key".to_string());
    }
    if Path::new(key).is_absolute() || key.starts_with('/') {
        return Err("absolute path".to_string());
    }
    if key.contains('\\') {
        return Err("contains backslash".to_string());
    }
    if key.split('/').any(|segment| segment == ".." || segment.is_empty()) {
        return Err("contains path traversal or empty segment".to_string());
    }
    Ok(())
}

/// Classifies an I/O failure: connection-class errors are transient and
/// worth a reconnect-and-retry, the rest propagate as-is.
fn classify_io(bucket: &str, key: &str, e: std::io::Error) -> StoreError {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::TimedOut => StoreError::Transient {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: e,
        },
        _ => StoreError::Io {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: e,
        },
    }
}

impl ObjectStore for FsObjectStore {
    fn ensure_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        validate_name(bucket).map_err(|reason| StoreError::InvalidKey {
            key: bucket.to_string(),
            reason,
        })?;
        // create_dir_all is already "exists is success".
        std::fs::create_dir_all(self.root.join(bucket)).map_err(|e| StoreError::Bucket {
            bucket: bucket.to_string(),
            source: e,
        })
    }

    fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.ensure_bucket(bucket)?;
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| classify_io(bucket, key, e))?;
        }

        // Write to a sibling temp file then rename, so readers never
        // observe a partial object.
        let tmp = path.with_extension("part");
        let mut file = File::create(&tmp).map_err(|e| classify_io(bucket, key, e))?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| classify_io(bucket, key, e))?;
        drop(file);
        std::fs::rename(&tmp, &path).map_err(|e| classify_io(bucket, key, e))?;

        log::debug!(
            "Stored object {bucket}/{key} ({} bytes, {content_type})",
            bytes.len()
        );
        Ok(())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>, StoreError> {
        let path = self.object_path(bucket, key)?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(classify_io(bucket, key, e)),
        }
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(classify_io(bucket, key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::read_all;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsObjectStore) {
        let tmp = TempDir::new().unwrap();
        let store = FsObjectStore::new(tmp.path());
        (tmp, store)
    }

    #[test]
    fn test_put_get_roundtrip() {
        let (_tmp, store) = store();
        store
            .put("recordings", "p1/r1/audio.wav", b"payload", "audio/wav")
            .unwrap();

        let bytes = read_all(&store, "recordings", "p1/r1/audio.wav").unwrap();
        assert_eq!(bytes, b"payload");
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let (_tmp, store) = store();
        let err = match store.get("recordings", "nope.wav") {
            Ok(_) => panic!("expected error for missing object"),
            Err(e) => e,
        };
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_existing_and_missing() {
        let (_tmp, store) = store();
        store
            .put("spectrograms", "r1/spectrogram.png", b"png", "image/png")
            .unwrap();

        store.delete("spectrograms", "r1/spectrogram.png").unwrap();
        assert!(store.get("spectrograms", "r1/spectrogram.png").is_err());

        // Deleting again is still success.
        store.delete("spectrograms", "r1/spectrogram.png").unwrap();
    }

    #[test]
    fn test_ensure_bucket_idempotent() {
        let (_tmp, store) = store();
        store.ensure_bucket("recordings").unwrap();
        store.ensure_bucket("recordings").unwrap();
    }

    #[test]
    fn test_traversal_keys_rejected() {
        let (_tmp, store) = store();
        for key in ["../escape", "a/../../b", "/absolute", "a//b", ""] {
            let err = store.put("bucket", key, b"x", "text/plain").unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidKey { .. }),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_bad_bucket_names_rejected() {
        let (_tmp, store) = store();
        for bucket in ["a/b", "..", ""] {
            assert!(store.ensure_bucket(bucket).is_err(), "bucket {bucket:?}");
        }
    }

    #[test]
    fn test_overwrite_replaces_object() {
        let (_tmp, store) = store();
        store.put("b", "k", b"old", "text/plain").unwrap();
        store.put("b", "k", b"new", "text/plain").unwrap();
        assert_eq!(read_all(&store, "b", "k").unwrap(), b"new");
    }
}
