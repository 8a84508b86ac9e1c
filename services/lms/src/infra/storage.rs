use uuid::Uuid;

use crate::domain::repository::ObjectStorage;
use crate::domain::types::{StoredAsset, Upload};
use crate::error::LmsError;

/// Object store reachable over plain HTTP `PUT`/`DELETE` (S3-compatible
/// gateways, CDN upload APIs). Assets are served from `public_url`.
#[derive(Clone)]
pub struct HttpObjectStorage {
    pub client: reqwest::Client,
    pub api_url: String,
    pub api_key: String,
    pub public_url: String,
}

fn storage_error(e: reqwest::Error) -> LmsError {
    tracing::warn!(error = %e, "object storage request failed");
    LmsError::ExternalService("storage")
}

/// File extension of `file_name`, lower-cased, limited to `[a-z0-9]`.
fn extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    (!ext.is_empty() && ext.len() <= 8 && ext.bytes().all(|b| b.is_ascii_alphanumeric()))
        .then_some(ext)
}

fn asset_id(folder: &str, file_name: &str) -> String {
    let id = Uuid::now_v7();
    match extension(file_name) {
        Some(ext) => format!("{folder}/{id}.{ext}"),
        None => format!("{folder}/{id}"),
    }
}

impl HttpObjectStorage {
    fn object_url(&self, asset_id: &str) -> String {
        format!("{}/{asset_id}", self.api_url.trim_end_matches('/'))
    }
}

impl ObjectStorage for HttpObjectStorage {
    async fn upload(&self, folder: &str, upload: Upload) -> Result<StoredAsset, LmsError> {
        let asset_id = asset_id(folder, &upload.file_name);
        self.client
            .put(self.object_url(&asset_id))
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, upload.content_type)
            .body(upload.bytes)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(storage_error)?;

        tracing::debug!(asset_id = %asset_id, "asset uploaded");
        let public_url = format!("{}/{asset_id}", self.public_url.trim_end_matches('/'));
        Ok(StoredAsset {
            asset_id,
            public_url,
        })
    }

    async fn delete(&self, asset_id: &str) -> Result<(), LmsError> {
        let response = self
            .client
            .delete(self.object_url(asset_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(storage_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        response.error_for_status().map_err(storage_error)?;
        Ok(())
    }
}
