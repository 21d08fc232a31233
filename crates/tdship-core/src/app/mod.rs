//! App - application services built on the domain and ports.
//!
//! # Components
//! - **retag_file**: rewrite a task definition file in place
//! - **Deployer**: describe -> sanitize -> register -> update-service per service

pub mod deploy;
pub mod retag;

pub use self::deploy::{DeployError, DeployReport, DeployStage, Deployer, ServiceOutcome};
pub use self::retag::{RetagFileError, render, retag_file};
