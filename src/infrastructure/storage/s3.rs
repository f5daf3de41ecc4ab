use std::path::Path;

use anyhow::{anyhow, Result};
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::settings::MinioConfig;

/// MinIO bucket holding uploaded source videos.
#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub fn new(minio: &MinioConfig) -> Self {
        let credentials = Credentials::new(&minio.access_key, &minio.secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(&minio.url)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        info!("✅ S3 client configured for {} (bucket {})", minio.url, minio.bucket);

        Self {
            client: Client::from_conf(config),
            bucket: minio.bucket.clone(),
        }
    }

    pub async fn create_multipart_upload(&self, key: &str, content_type: &str) -> Result<String> {
        let result = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| anyhow!("create_multipart_upload failed: {}", e))?;

        result
            .upload_id
            .ok_or_else(|| anyhow!("S3 returned no upload id for {}", key))
    }

    pub async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: bytes::Bytes,
    ) -> Result<CompletedPart> {
        let result = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| anyhow!("upload_part {} failed: {}", part_number, e))?;

        let e_tag = result
            .e_tag
            .ok_or_else(|| anyhow!("S3 returned no ETag for part {}", part_number))?;

        Ok(CompletedPart::builder()
            .e_tag(e_tag)
            .part_number(part_number)
            .build())
    }

    pub async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<()> {
        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| anyhow!("complete_multipart_upload failed: {}", e))?;

        Ok(())
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("delete_object {} failed: {}", key, e))?;

        Ok(())
    }

    pub async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| anyhow!("abort_multipart_upload failed: {}", e))?;

        Ok(())
    }

    /// Stream an object into `dest`. Returns the number of bytes written, or
    /// `None` when the key does not exist.
    pub async fn download_to_file(&self, key: &str, dest: &Path) -> Result<Option<u64>> {
        let object = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(object) => object,
            Err(SdkError::ServiceError(err)) if matches!(err.err(), GetObjectError::NoSuchKey(_)) => {
                return Ok(None);
            }
            Err(e) => return Err(anyhow!("get_object {} failed: {}", key, e)),
        };

        let mut body = object.body;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| anyhow!("S3 stream for {} interrupted: {}", key, e))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(Some(written))
    }
}
