//! Upload-then-write: an asset is uploaded first and removed again if the
//! record that references it cannot be written.

use std::future::Future;

use crate::domain::repository::ObjectStorage;
use crate::domain::types::{StoredAsset, Upload};
use crate::error::LmsError;

pub async fn upload_then_write<S, T, F, Fut>(
    storage: &S,
    folder: &str,
    upload: Upload,
    write: F,
) -> Result<T, LmsError>
where
    S: ObjectStorage,
    F: FnOnce(StoredAsset) -> Fut,
    Fut: Future<Output = Result<T, LmsError>>,
{
    let asset = storage.upload(folder, upload).await?;
    let asset_id = asset.asset_id.clone();
    match write(asset).await {
        Ok(value) => Ok(value),
        Err(e) => {
            delete_quietly(storage, &asset_id).await;
            Err(e)
        }
    }
}

/// Best-effort delete; failures are logged and swallowed.
pub async fn delete_quietly<S: ObjectStorage>(storage: &S, asset_id: &str) {
    if let Err(e) = storage.delete(asset_id).await {
        tracing::warn!(asset_id = %asset_id, error = %e, "failed to delete asset");
    }
}
