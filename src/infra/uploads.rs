//! Filesystem-backed blob storage for listing attachments.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::{
    fs,
    io::{AsyncWrite, AsyncWriteExt},
};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::application::repos::{
    BlobDescriptor, BlobStore, BlobStoreError, ByteStream, StoredBlob,
};

const SOURCE: &str = "infra::uploads::FilesystemBlobStore";

/// Blob store writing each blob to its own file below a root directory.
///
/// Locations have the form `YYYY/MM/DD/{id}.{ext}` and are always relative
/// to the root.
#[derive(Debug)]
pub struct FilesystemBlobStore {
    root: PathBuf,
    max_bytes: u64,
}

impl FilesystemBlobStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf, max_bytes: u64) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, max_bytes })
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, BlobStoreError> {
        let relative = Path::new(location);
        if location.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(BlobStoreError::InvalidLocation {
                location: location.to_string(),
            });
        }

        Ok(self.root.join(relative))
    }

    fn build_location(blob: &BlobDescriptor) -> String {
        let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
        let directory = format!("{year}/{:02}/{:02}", month as u8, day);
        match attachment_extension(&blob.name, &blob.mime) {
            Some(ext) => format!("{directory}/{}.{ext}", blob.id),
            None => format!("{directory}/{}", blob.id),
        }
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn save(
        &self,
        blob: &BlobDescriptor,
        content: ByteStream,
    ) -> Result<StoredBlob, BlobStoreError> {
        let location = Self::build_location(blob);
        let absolute = self.resolve(&location)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        let written = write_limited(&mut file, content, self.max_bytes).await;
        drop(file);

        let (total_bytes, checksum) = match written {
            Ok(outcome) => outcome,
            Err(err) => {
                let _ = fs::remove_file(&absolute).await;
                return Err(err);
            }
        };

        let size_bytes = i64::try_from(total_bytes).map_err(|_| BlobStoreError::TooLarge {
            limit: self.max_bytes,
        })?;

        debug!(
            target = SOURCE,
            location = %location,
            size_bytes,
            "blob stored"
        );

        Ok(StoredBlob {
            location,
            size_bytes,
            checksum,
        })
    }

    async fn load(&self, location: &str) -> Result<ByteStream, BlobStoreError> {
        let absolute = self.resolve(location)?;
        match fs::File::open(&absolute).await {
            Ok(file) => Ok(ReaderStream::new(file).boxed()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound {
                    location: location.to_string(),
                })
            }
            Err(err) => Err(BlobStoreError::Io(err)),
        }
    }

    async fn delete(&self, location: &str) -> Result<(), BlobStoreError> {
        let absolute = self.resolve(location)?;
        match fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound {
                    location: location.to_string(),
                })
            }
            Err(err) => Err(BlobStoreError::Io(err)),
        }
    }
}

/// Copies the stream into `sink`, hashing as it goes and stopping once more
/// than `max_bytes` arrive.
async fn write_limited<W>(
    sink: &mut W,
    mut content: ByteStream,
    max_bytes: u64,
) -> Result<(u64, String), BlobStoreError>
where
    W: AsyncWrite + Unpin,
{
    let mut hasher = Sha256::new();
    let mut total_bytes: u64 = 0;

    while let Some(chunk) = content.next().await {
        let chunk = chunk.map_err(BlobStoreError::Stream)?;
        if chunk.is_empty() {
            continue;
        }

        total_bytes = total_bytes.saturating_add(chunk.len() as u64);
        if total_bytes > max_bytes {
            return Err(BlobStoreError::TooLarge { limit: max_bytes });
        }

        sink.write_all(&chunk).await?;
        hasher.update(&chunk);
    }

    sink.flush().await?;

    if total_bytes == 0 {
        return Err(BlobStoreError::EmptyPayload);
    }

    Ok((total_bytes, hex::encode(hasher.finalize().as_slice())))
}

fn attachment_extension(name: &str, mime: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .or_else(|| {
            mime_guess::get_mime_extensions_str(mime)
                .and_then(|extensions| extensions.first())
                .map(|ext| (*ext).to_string())
        })
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::{TryStreamExt, stream};
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;

    fn content(chunks: Vec<&'static [u8]>) -> ByteStream {
        stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<_, std::io::Error>(Bytes::from_static(chunk))),
        )
        .boxed()
    }

    fn descriptor(name: &str, mime: &str) -> BlobDescriptor {
        BlobDescriptor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            mime: mime.to_string(),
        }
    }

    fn stored_files(root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir).expect("read dir") {
                let path = entry.expect("dir entry").path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        files
    }

    fn store(dir: &TempDir, max_bytes: u64) -> FilesystemBlobStore {
        FilesystemBlobStore::new(dir.path().to_path_buf(), max_bytes).expect("store")
    }

    #[tokio::test]
    async fn saved_blob_can_be_loaded_and_deleted() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir, 1024);
        let blob = descriptor("Photo.JPG", "image/jpeg");

        let stored = store
            .save(&blob, content(vec![b"hello ", b"world"]))
            .await
            .expect("save");

        assert!(stored.location.ends_with(&format!("{}.jpg", blob.id)));
        assert_eq!(stored.size_bytes, 11);
        assert_eq!(
            stored.checksum,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );

        let chunks: Vec<Bytes> = store
            .load(&stored.location)
            .await
            .expect("load")
            .try_collect()
            .await
            .expect("read");
        assert_eq!(chunks.concat(), b"hello world");

        store.delete(&stored.location).await.expect("delete");
        assert!(!store.resolve(&stored.location).expect("path").exists());
    }

    #[tokio::test]
    async fn extension_falls_back_to_mime() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir, 1024);
        let stored = store
            .save(&descriptor("manual", "application/pdf"), content(vec![b"%PDF"]))
            .await
            .expect("save");
        assert!(stored.location.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn empty_payload_is_rejected_and_removed() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir, 1024);
        let blob = descriptor("empty.txt", "text/plain");

        let err = store
            .save(&blob, content(vec![b"", b""]))
            .await
            .expect_err("empty payload");
        assert!(matches!(err, BlobStoreError::EmptyPayload));

        assert!(stored_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn oversized_payload_leaves_no_file() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir, 4);
        let blob = descriptor("big.bin", "application/octet-stream");

        let err = store
            .save(&blob, content(vec![b"abc", b"def"]))
            .await
            .expect_err("too large");
        assert!(matches!(err, BlobStoreError::TooLarge { limit: 4 }));

        assert!(stored_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn failing_stream_removes_partial_file() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir, 1024);
        let blob = descriptor("partial.txt", "text/plain");
        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("connection reset")),
        ])
        .boxed();

        let err = store.save(&blob, failing).await.expect_err("stream error");
        assert!(matches!(err, BlobStoreError::Stream(_)));

        assert!(stored_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn missing_blob_reports_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir, 1024);

        assert!(matches!(
            store.delete("2024/01/01/missing.txt").await,
            Err(BlobStoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.load("2024/01/01/missing.txt").await,
            Err(BlobStoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn traversal_locations_are_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir, 1024);

        for location in ["../escape.txt", "/etc/passwd", ""] {
            assert!(matches!(
                store.delete(location).await,
                Err(BlobStoreError::InvalidLocation { .. })
            ));
        }
    }
}
