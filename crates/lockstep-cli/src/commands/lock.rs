//! Implementation of the `lockstep lock` command.

use std::time::Duration;

use clap::{Args, Subcommand};
use lockstep_control::DeployerConfig;
use lockstep_state::{
    grab_lock_with, reclaim_lock, release_lock, BlobStore, LockAcquisition, ObjectBlobStore,
};

use super::CommandError;

#[derive(Args, Debug)]
pub struct LockTarget {
    /// Bucket holding the lock
    #[arg(long)]
    pub bucket: String,

    /// Lock key, `{account}/{project}/{config}/lock`
    #[arg(long)]
    pub path: String,

    /// Owner token
    #[arg(long)]
    pub token: String,
}

#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Take the lock
    Grab(LockTarget),

    /// Give the lock back if held by the token
    Release(LockTarget),

    /// Take over a lock left behind by a crashed deployment
    Reclaim {
        #[command(flatten)]
        target: LockTarget,

        /// Only reclaim a lock older than this many seconds
        #[arg(long, default_value_t = 900)]
        older_than_secs: u64,
    },
}

pub async fn run(config: &DeployerConfig, action: LockAction) -> Result<(), CommandError> {
    let blobs = ObjectBlobStore::new(config.blob.clone());
    println!("{}", apply(&blobs, config, action).await?);
    Ok(())
}

async fn apply(
    blobs: &dyn BlobStore,
    config: &DeployerConfig,
    action: LockAction,
) -> Result<&'static str, CommandError> {
    match action {
        LockAction::Grab(t) => {
            let acquisition =
                grab_lock_with(blobs, &t.bucket, &t.path, &t.token, &config.lock).await?;
            Ok(match acquisition {
                LockAcquisition::Acquired => "acquired",
                LockAcquisition::Reclaimed => "reclaimed",
                LockAcquisition::Held => "held by another owner",
            })
        }
        LockAction::Release(t) => {
            release_lock(blobs, &t.bucket, &t.path, &t.token).await?;
            Ok("released")
        }
        LockAction::Reclaim {
            target: t,
            older_than_secs,
        } => {
            let reclaimed = reclaim_lock(
                blobs,
                &t.bucket,
                &t.path,
                &t.token,
                Duration::from_secs(older_than_secs),
            )
            .await?;
            Ok(if reclaimed { "reclaimed" } else { "not stale" })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn target(token: &str) -> LockTarget {
        LockTarget {
            bucket: "bucket".to_owned(),
            path: "000000000000/p1/c1/lock".to_owned(),
            token: token.to_owned(),
        }
    }

    #[tokio::test]
    async fn grab_then_release() {
        let blobs = ObjectBlobStore::in_memory();
        let config = DeployerConfig::default();

        let grabbed = apply(&blobs, &config, LockAction::Grab(target("a"))).await.unwrap();
        assert_eq!(grabbed, "acquired");

        let again = apply(&blobs, &config, LockAction::Grab(target("b"))).await.unwrap();
        assert_eq!(again, "held by another owner");

        let err = apply(&blobs, &config, LockAction::Release(target("b"))).await.unwrap_err();
        assert!(matches!(err, CommandError::Lock(_)));

        let released = apply(&blobs, &config, LockAction::Release(target("a"))).await.unwrap();
        assert_eq!(released, "released");
    }

    #[tokio::test]
    async fn fresh_lock_is_not_reclaimed() {
        let blobs = ObjectBlobStore::in_memory();
        let config = DeployerConfig::default();
        apply(&blobs, &config, LockAction::Grab(target("a"))).await.unwrap();

        let result = apply(
            &blobs,
            &config,
            LockAction::Reclaim {
                target: target("b"),
                older_than_secs: 3600,
            },
        )
        .await
        .unwrap();
        assert_eq!(result, "not stale");
    }
}
