//! Client-side staging of a release and its artifact.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use lockstep_state::{sha256_hex, BlobStore, BlobStoreExt};
use tracing::info;

use crate::error::DeployResult;
use crate::identity::{required, ReleasePaths};
use crate::types::Release;

/// Uploads a release and its artifact so a deployer can verify them.
pub struct Stager {
    blobs: Arc<dyn BlobStore>,
}

impl Stager {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Stage `artifact` and `release`.
    ///
    /// Sets `function_sha256` from the artifact, stamps `created_at` if
    /// absent, then computes `release_sha256` and uploads the release. The
    /// release is uploaded last so the artifact it references always exists.
    pub async fn stage(
        &self,
        release: &mut Release,
        artifact: Bytes,
    ) -> DeployResult<ReleasePaths> {
        let bucket = required(&release.bucket, "bucket")?;
        let paths = ReleasePaths::new(
            &required(&release.account_id, "account_id")?,
            &required(&release.project_name, "project_name")?,
            &required(&release.config_name, "config_name")?,
            &required(&release.release_id, "release_id")?,
        );

        let function_sha256 = sha256_hex(&artifact);
        let size = artifact.len();
        self.blobs.put(&bucket, &paths.artifact, artifact).await?;
        info!(
            bucket = %bucket,
            key = %paths.artifact,
            bytes = size,
            sha256 = %function_sha256,
            "artifact staged"
        );

        release.function_sha256 = Some(function_sha256);
        if release.created_at.is_none() {
            release.created_at = Some(Utc::now());
        }
        release.release_sha256 = release.compute_sha256()?;

        self.blobs
            .put_struct(&bucket, &paths.staged_release, &*release)
            .await?;
        info!(
            bucket = %bucket,
            key = %paths.staged_release,
            sha256 = %release.release_sha256,
            "release staged"
        );

        Ok(paths)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lockstep_state::ObjectBlobStore;

    use super::*;
    use crate::error::DeployError;

    fn release() -> Release {
        Release {
            account_id: Some("000000000000".to_owned()),
            release_id: Some("r1".to_owned()),
            project_name: Some("p1".to_owned()),
            config_name: Some("c1".to_owned()),
            bucket: Some("bucket".to_owned()),
            ..Release::default()
        }
    }

    #[tokio::test]
    async fn stages_artifact_and_hashed_release() {
        let blobs = Arc::new(ObjectBlobStore::in_memory());
        let stager = Stager::new(blobs.clone());

        let mut release = release();
        let paths = stager
            .stage(&mut release, Bytes::from_static(b"zip"))
            .await
            .unwrap();

        assert_eq!(release.function_sha256.as_deref(), Some(sha256_hex(b"zip").as_str()));
        assert!(release.created_at.is_some());

        let staged: Release = blobs.get_struct("bucket", &paths.staged_release).await.unwrap();
        assert_eq!(staged.compute_sha256().unwrap(), release.release_sha256);
        assert_eq!(
            blobs.get_sha256("bucket", &paths.artifact).await.unwrap(),
            sha256_hex(b"zip")
        );
    }

    #[tokio::test]
    async fn refuses_release_without_bucket() {
        let stager = Stager::new(Arc::new(ObjectBlobStore::in_memory()));
        let mut release = Release {
            bucket: None,
            ..release()
        };
        let err = stager.stage(&mut release, Bytes::new()).await.unwrap_err();
        assert!(matches!(err, DeployError::MissingField { field: "bucket" }));
    }
}
