//! Implementation of the `lockstep hash` command.

use std::path::Path;

use lockstep_control::Release;
use lockstep_state::sha256_hex;

use super::{read_file, CommandError};

pub async fn run(file: &Path, release: bool) -> Result<(), CommandError> {
    println!("{}", digest(file, release).await?);
    Ok(())
}

async fn digest(file: &Path, release: bool) -> Result<String, CommandError> {
    let data = read_file(file).await?;
    if !release {
        return Ok(sha256_hex(&data));
    }

    let release: Release = serde_json::from_slice(&data).map_err(|source| CommandError::Decode {
        path: file.display().to_string(),
        source,
    })?;
    Ok(release.compute_sha256()?)
}
