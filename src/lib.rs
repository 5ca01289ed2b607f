//! Command line tool for Red Hat OpenShift Service on AWS: a thin layer over
//! the cluster-management API and the AWS SDK.

pub mod client;
pub mod cloud;
pub mod commands;
pub mod config;
pub mod error;
pub mod idp;
pub mod keys;
pub mod models;
pub mod oidc;
pub mod output;
pub mod reporter;
pub mod runtime;

pub use error::{Result, RosaError};
