//! Interpretation of cluster status text.
//!
//! The cluster is only observable through command output. Every piece of
//! text parsing lives here so the brittle part of the contract is isolated:
//! - condition lines rendered by the status-conditions template
//! - the tabular pod listing
//! - the per-pod image listing
//! - the installed-package listing of a pod

mod extract;
mod images;
mod packages;
mod pods;

pub use extract::{extract, is_satisfied, Condition, ConditionCheck, ConditionSet};
pub use images::{parse_image_listing, ContainerImage, PodImages};
pub use packages::parse_package_listing;
pub use pods::{parse_pod_table, PodRow, PodTable};
