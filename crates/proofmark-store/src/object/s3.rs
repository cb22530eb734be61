use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::{check_key, ObjectStore};
use crate::errors::{StoreError, StoreResult};

/// Amazon S3 bucket as an object store. Credentials come from the default
/// AWS provider chain.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    name: String,
    bucket: String,
    client: Client,
}

impl S3ObjectStore {
    pub async fn connect(region: &str, bucket: &str) -> Self {
        let cfg = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::with_client(Client::new(&cfg), bucket)
    }

    pub fn with_client(client: Client, bucket: &str) -> Self {
        Self {
            name: format!("s3://{bucket}"),
            bucket: bucket.to_string(),
            client,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn head_object(&self, key: &str) -> StoreResult<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        match res {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => Err(StoreError::transport("head_object", key, e)),
        }
    }

    async fn get_object(&self, key: &str) -> StoreResult<Vec<u8>> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        let out = match res {
            Ok(out) => out,
            Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_key()) => {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Err(e) => return Err(StoreError::transport("get_object", key, e)),
        };

        let body = out
            .body
            .collect()
            .await
            .map_err(|e| StoreError::transport("get_object", key, e))?;
        let bytes: bytes::Bytes = body.into_bytes();
        Ok(bytes.to_vec())
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<()> {
        check_key(key)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StoreError::transport("put_object", key, e))?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StoreError::transport("list_objects", prefix, e))?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));
        }
        keys.sort();
        Ok(keys)
    }
}
