//! Syncer configuration
//!
//! Built by the binary from CLI flags and environment; library users can
//! construct it directly.

use crate::error::{Error, Result};
use crate::syncer::persistentvolumes::DeletionPolicy;
use std::time::Duration;

/// Default instance suffix appended to every physical name
pub const DEFAULT_SUFFIX: &str = "vcluster";

/// Configuration for the remote exec helper
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Namespace of the tenant control-plane pod
    pub namespace: String,
    /// Tenant control-plane pod
    pub pod: String,
    /// Container running the syncer inside that pod
    pub container: String,
    /// Command printing the tenant kubeconfig
    pub command: Vec<String>,
    /// Delay between attempts
    pub poll_interval: Duration,
    /// Overall deadline
    pub timeout: Duration,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            pod: String::new(),
            container: "syncer".to_string(),
            command: vec!["cat".to_string(), "/root/.kube/config".to_string()],
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Configuration for the volume syncer
#[derive(Debug, Clone)]
pub struct SyncerConfig {
    /// Host namespace the tenant's objects are synced into
    pub target_namespace: String,
    /// Instance name appended to physical names
    pub suffix: String,
    /// What to do when one side of a pair disappears
    pub deletion_policy: DeletionPolicy,
    /// Periodic resync of every pair, in seconds
    pub resync_interval_secs: u64,
    /// Remote exec settings for fetching the tenant kubeconfig
    pub exec: ExecConfig,
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            target_namespace: String::new(),
            suffix: DEFAULT_SUFFIX.to_string(),
            deletion_policy: DeletionPolicy::default(),
            resync_interval_secs: 300,
            exec: ExecConfig::default(),
        }
    }
}

impl SyncerConfig {
    /// Defaults for a given target namespace
    pub fn new(target_namespace: impl Into<String>) -> Self {
        Self {
            target_namespace: target_namespace.into(),
            ..Default::default()
        }
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Reject configurations the name translation can't work with
    pub fn validate(&self) -> Result<()> {
        if self.target_namespace.is_empty() {
            return Err(Error::Configuration(
                "target namespace must not be empty".to_string(),
            ));
        }
        if self.suffix.is_empty() {
            return Err(Error::Configuration("suffix must not be empty".to_string()));
        }
        if self.resync_interval_secs == 0 {
            return Err(Error::Configuration(
                "resync interval must be at least one second".to_string(),
            ));
        }
        if self.exec.timeout < self.exec.poll_interval {
            return Err(Error::Configuration(format!(
                "exec timeout {:?} is shorter than the poll interval {:?}",
                self.exec.timeout, self.exec.poll_interval
            )));
        }
        Ok(())
    }
}
