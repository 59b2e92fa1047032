//! # Registry Protocol Services
//!
//! The domain services behind the Terraform module-download and
//! provider-install protocols: latest-version selection, source URL
//! construction, analytics-token extraction and the SHA256SUMS pipeline.

pub mod modules;
pub mod providers;
