//! Release deployment and staging.
//!
//! [`ReleaseDeployer`] runs the deployer side of the protocol: validate, lock,
//! validate again, deploy, unlock. [`Stager`] runs the client side: upload the
//! artifact and the hashed release it will be checked against.

mod manager;
mod stager;

pub use manager::{Outcome, ReleaseDeployer};
pub use stager::Stager;
