//! Implementation of the `lockstep validate` command.

use std::path::Path;

use chrono::Utc;
use lockstep_control::{DeployerConfig, StatesLanguageValidator};

use super::{read_release, with_defaults, CommandError};

/// Run the structural checks a deployer would run before contacting anything.
pub async fn run(config: &DeployerConfig, file: &Path) -> Result<(), CommandError> {
    let release = with_defaults(config, read_release(file).await?);
    let identity =
        release.validate_attributes(&StatesLanguageValidator, Utc::now(), &config.freshness)?;

    println!("release   {}", identity.release_id());
    println!("function  {}", identity.function_arn());
    println!("workflow  {}", identity.workflow_arn());
    println!("artifact  {}/{}", identity.bucket(), identity.paths().artifact);
    println!("lock      {}/{}", identity.bucket(), identity.paths().lock);
    Ok(())
}
