use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

/// Files at or above this size are sent as a multipart upload.
pub const MULTIPART_THRESHOLD: u64 = 8 * 1024 * 1024;
pub const PART_SIZE: usize = 8 * 1024 * 1024;

pub fn uses_multipart(size: u64) -> bool {
    size >= MULTIPART_THRESHOLD
}

/// Read from `reader` until `buffer` is full or the input ends, feeding every
/// byte into `hasher`. Returns the number of bytes in the part; 0 means EOF.
pub async fn fill_part<R>(
    reader: &mut R,
    buffer: &mut [u8],
    hasher: &mut Sha256,
) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut n = 0;
    while n < buffer.len() {
        let read = reader.read(&mut buffer[n..]).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[n..n + read]);
        n += read;
    }
    Ok(n)
}

/// `None` when the service reports a time chrono cannot represent.
fn to_utc(d: aws_sdk_s3::primitives::DateTime) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp(d.secs(), d.subsec_nanos())
}

#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub key: String,
    pub size: u64,
    pub sha256: String,
}

/// One entry of a bucket listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
    pub e_tag: Option<String>,
}

impl fmt::Display for ObjectSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modified = self
            .last_modified
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        write!(f, "{}\t{}\t{}", self.key, self.size, modified)
    }
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Upload the file at `path` under `key`, replacing any existing object.
    async fn upload_file(&self, path: &Path, key: &str) -> Result<UploadReceipt>;

    /// Every object currently in the bucket, across all listing pages.
    async fn list_objects(&self) -> Result<Vec<ObjectSummary>>;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    async fn put_whole(&self, path: &Path, key: &str) -> Result<UploadReceipt> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let sha256 = hex::encode(Sha256::digest(&data));
        let size = data.len() as u64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .with_context(|| format!("PutObject {}/{} failed", self.bucket, key))?;

        Ok(UploadReceipt {
            key: key.to_string(),
            size,
            sha256,
        })
    }

    async fn put_multipart(&self, path: &Path, key: &str) -> Result<UploadReceipt> {
        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let multipart_upload_res = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("CreateMultipartUpload {}/{} failed", self.bucket, key))?;

        let upload_id = multipart_upload_res
            .upload_id()
            .ok_or_else(|| anyhow::anyhow!("No upload ID"))?;
        let mut part_number = 1;
        let mut completed_parts = Vec::new();
        let mut hasher = Sha256::new();
        let mut total_size = 0u64;
        let mut buffer = vec![0u8; PART_SIZE];

        loop {
            let n = fill_part(&mut file, &mut buffer, &mut hasher).await?;
            if n == 0 {
                break;
            }

            total_size += n as u64;
            debug!("uploading part {} ({} bytes) of {}", part_number, n, key);
            let upload_part_res = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .body(ByteStream::from(buffer[..n].to_vec()))
                .part_number(part_number)
                .send()
                .await
                .with_context(|| format!("UploadPart {} of {} failed", part_number, key))?;

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(upload_part_res.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );

            part_number += 1;
        }

        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await
            .with_context(|| format!("CompleteMultipartUpload {}/{} failed", self.bucket, key))?;

        Ok(UploadReceipt {
            key: key.to_string(),
            size: total_size,
            sha256: hex::encode(hasher.finalize()),
        })
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn upload_file(&self, path: &Path, key: &str) -> Result<UploadReceipt> {
        let size = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();

        if uses_multipart(size) {
            info!("📦 {} bytes, using multipart upload", size);
            self.put_multipart(path, key).await
        } else {
            self.put_whole(path, key).await
        }
    }

    async fn list_objects(&self) -> Result<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let res = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_continuation_token(continuation_token)
                .send()
                .await
                .with_context(|| format!("ListObjectsV2 on {} failed", self.bucket))?;

            if let Some(contents) = res.contents {
                for object in contents {
                    let Some(key) = object.key else { continue };
                    let last_modified = object.last_modified.and_then(to_utc);
                    objects.push(ObjectSummary {
                        key,
                        size: object.size.unwrap_or(0),
                        last_modified,
                        e_tag: object.e_tag,
                    });
                }
            }

            if res.is_truncated.unwrap_or(false) {
                continuation_token = res.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::pin::Pin;
    use std::task::{Context as TaskContext, Poll};
    use tokio::io::ReadBuf;

    /// Hands out at most `max` bytes per read.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        max: usize,
    }

    impl AsyncRead for Trickle {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let end = (this.pos + this.max)
                .min(this.data.len())
                .min(this.pos + buf.remaining());
            buf.put_slice(&this.data[this.pos..end]);
            this.pos = end;
            Poll::Ready(Ok(()))
        }
    }

    /// Split `reader` into parts the way a multipart upload does.
    async fn split_parts<R: AsyncRead + Unpin>(
        mut reader: R,
        part_size: usize,
    ) -> (Vec<usize>, String) {
        let mut buffer = vec![0u8; part_size];
        let mut hasher = Sha256::new();
        let mut sizes = Vec::new();
        loop {
            let n = fill_part(&mut reader, &mut buffer, &mut hasher)
                .await
                .unwrap();
            if n == 0 {
                break;
            }
            sizes.push(n);
        }
        (sizes, hex::encode(hasher.finalize()))
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_empty_input_has_no_parts() {
        let (sizes, hash) = split_parts(&b""[..], PART_SIZE).await;
        assert!(sizes.is_empty());
        assert_eq!(hash, hex::encode(Sha256::digest(b"")));
    }

    #[tokio::test]
    async fn test_exact_part_size_is_one_part() {
        let data = pattern(PART_SIZE);
        let (sizes, hash) = split_parts(&data[..], PART_SIZE).await;
        assert_eq!(sizes, vec![PART_SIZE]);
        assert_eq!(hash, hex::encode(Sha256::digest(&data)));
    }

    #[tokio::test]
    async fn test_one_byte_over_is_two_parts() {
        let data = pattern(PART_SIZE + 1);
        let (sizes, hash) = split_parts(&data[..], PART_SIZE).await;
        assert_eq!(sizes, vec![PART_SIZE, 1]);
        assert_eq!(hash, hex::encode(Sha256::digest(&data)));
    }

    #[tokio::test]
    async fn test_short_reads_still_fill_parts() {
        let data = pattern(1000);
        let reader = Trickle {
            data: data.clone(),
            pos: 0,
            max: 7,
        };
        let (sizes, hash) = split_parts(reader, 256).await;
        assert_eq!(sizes, vec![256, 256, 256, 232]);
        assert_eq!(hash, hex::encode(Sha256::digest(&data)));
    }

    #[test]
    fn test_multipart_threshold() {
        assert!(!uses_multipart(0));
        assert!(!uses_multipart(MULTIPART_THRESHOLD - 1));
        assert!(uses_multipart(MULTIPART_THRESHOLD));
        assert!(uses_multipart(MULTIPART_THRESHOLD + 1));
    }

    #[test]
    fn test_out_of_range_timestamp_is_dropped() {
        let far = aws_sdk_s3::primitives::DateTime::from_secs(i64::MAX);
        assert!(to_utc(far).is_none());

        let ok = aws_sdk_s3::primitives::DateTime::from_secs(1_677_672_000);
        assert_eq!(
            to_utc(ok),
            Some(chrono::Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_summary_display() {
        let summary = ObjectSummary {
            key: "games/pong.zip".to_string(),
            size: 42,
            last_modified: Some(chrono::Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap()),
            e_tag: None,
        };
        assert_eq!(
            summary.to_string(),
            "games/pong.zip\t42\t2023-03-01T12:00:00+00:00"
        );
    }

    #[test]
    fn test_summary_display_without_timestamp() {
        let summary = ObjectSummary {
            key: "k".to_string(),
            size: 0,
            last_modified: None,
            e_tag: Some("\"abc\"".to_string()),
        };
        assert_eq!(summary.to_string(), "k\t0\t-");
    }
}
