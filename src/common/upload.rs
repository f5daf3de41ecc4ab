use std::path::Path;

use anyhow::{anyhow, Result};
use axum::{body::Bytes, extract::multipart::Field};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::infrastructure::storage::s3::StorageService;

// S3 rejects non-final parts under 5MB.
const MIN_PART_SIZE: usize = 6 * 1024 * 1024;

pub struct MultipartUploader<'a> {
    storage: &'a StorageService,
    key: String,
    upload_id: String,
    parts: Vec<aws_sdk_s3::types::CompletedPart>,
    part_number: i32,
    buffer: Vec<u8>,
}

impl<'a> MultipartUploader<'a> {
    pub async fn new(storage: &'a StorageService, key: String, content_type: &str) -> Result<Self> {
        let upload_id = storage
            .create_multipart_upload(&key, content_type)
            .await
            .map_err(|e| anyhow!("Failed to initiate upload: {}", e))?;

        Ok(Self {
            storage,
            key,
            upload_id,
            parts: Vec::new(),
            part_number: 1,
            buffer: Vec::with_capacity(MIN_PART_SIZE),
        })
    }

    pub async fn write_chunk(&mut self, chunk: Bytes) -> Result<()> {
        self.buffer.extend_from_slice(&chunk);
        if self.buffer.len() >= MIN_PART_SIZE {
            self.flush_part().await?;
        }
        Ok(())
    }

    async fn flush_part(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let body = Bytes::from(std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(MIN_PART_SIZE),
        ));

        let part = self
            .storage
            .upload_part(&self.key, &self.upload_id, self.part_number, body)
            .await?;

        self.parts.push(part);
        self.part_number += 1;
        Ok(())
    }

    /// Complete the upload, or abort it if it cannot be completed.
    pub async fn finish(mut self) -> Result<String> {
        let completed = match self.flush_part().await {
            // S3 refuses to complete an upload without parts.
            Ok(()) if self.parts.is_empty() => Err(anyhow!("Upload {} is empty", self.key)),
            Ok(()) => {
                let parts = std::mem::take(&mut self.parts);
                self.storage
                    .complete_multipart_upload(&self.key, &self.upload_id, parts)
                    .await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = completed {
            error!("Upload error: {}", e);
            if let Err(abort_err) = self.abort().await {
                warn!(key = %self.key, error = %abort_err, "Failed to abort multipart upload");
            }
            return Err(e);
        }
        Ok(self.key)
    }

    pub async fn abort(&self) -> Result<()> {
        self.storage.abort_multipart_upload(&self.key, &self.upload_id).await
    }
}

fn check_content_type(field: &Field<'_>, prefix: &str) -> Result<String> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    if !content_type.starts_with(prefix) {
        return Err(anyhow!(
            "Invalid content type {}: only {}* allowed",
            content_type,
            prefix
        ));
    }
    Ok(content_type)
}

/// Stream a multipart field into the bucket under `key`. Returns the key.
pub async fn stream_to_s3(
    storage: &StorageService,
    mut field: Field<'_>,
    key: String,
    expected_prefix: &str,
) -> Result<String> {
    let content_type = check_content_type(&field, expected_prefix)?;
    let mut uploader = MultipartUploader::new(storage, key, &content_type).await?;

    while let Some(chunk) = field.next().await {
        let written = match chunk {
            Ok(chunk) => uploader.write_chunk(chunk).await,
            Err(e) => Err(anyhow!("Stream interrupted: {}", e)),
        };
        if let Err(e) = written {
            error!("Upload error: {}", e);
            uploader.abort().await?;
            return Err(e);
        }
    }

    uploader.finish().await
}

/// Stream a multipart field to `media_root/relative`. Returns `relative`.
pub async fn stream_to_file(
    media_root: &Path,
    mut field: Field<'_>,
    relative: String,
    expected_prefix: &str,
) -> Result<String> {
    check_content_type(&field, expected_prefix)?;

    let dest = media_root.join(&relative);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(&dest).await?;
    let mut total: u64 = 0;
    while let Some(chunk) = field.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(anyhow!("Stream interrupted: {}", e));
            }
        };
        file.write_all(&chunk).await?;
        total += chunk.len() as u64;
    }
    file.flush().await?;

    info!("⬆️ Stored {} bytes at {}", total, relative);
    Ok(relative)
}
