//! Utilities around the syncer

pub mod podhelper;

pub use podhelper::{get_vcluster_config, KubePodExecutor};
