//! Implementation of the `lockstep stage` command.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use lockstep_control::{DeployerConfig, Stager};
use lockstep_state::ObjectBlobStore;

use super::{read_file, read_release, with_defaults, CommandError};

/// Stage the artifact and release, then print the staged release.
///
/// The printed document carries the generated UUID and both hashes; it is
/// what gets submitted for deployment.
pub async fn run(
    config: &DeployerConfig,
    release: &Path,
    artifact: &Path,
) -> Result<(), CommandError> {
    let mut release = with_defaults(config, read_release(release).await?);
    let artifact = Bytes::from(read_file(artifact).await?);

    let blobs = Arc::new(ObjectBlobStore::new(config.blob.clone()));
    let paths = Stager::new(blobs).stage(&mut release, artifact).await?;

    eprintln!("Staged {}", paths.release);
    println!("{}", serde_json::to_string_pretty(&release)?);
    Ok(())
}
