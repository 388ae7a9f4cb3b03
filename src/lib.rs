//! Volume Syncer - Virtual Cluster PersistentVolume Synchronization
//!
//! Presents `PersistentVolume` objects to tenants on a virtual control plane
//! while the volumes themselves live on a shared host cluster.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────┐                    ┌───────────────────────────┐
//! │  Virtual control plane    │                    │  Host (physical) cluster  │
//! │  tenant PVs / PVCs        │                    │  translated PVs / PVCs    │
//! └─────────────┬─────────────┘                    └─────────────┬─────────────┘
//!               │              ┌──────────────────┐              │
//!               └──────────────┤   VolumeStore    ├──────────────┘
//!                              └────────┬─────────┘
//!                              ┌────────┴─────────┐
//!                              │ VolumeReconciler │  controller + host sweep
//!                              └────────┬─────────┘
//!                              ┌────────┴─────────┐
//!                              │   Sync Planner   │  which translation applies
//!                              └────────┬─────────┘
//!           ┌───────────────┬───────────┴───────────┬────────────────────┐
//!   ┌───────┴──────┐ ┌──────┴───────┐ ┌─────────────┴──────┐ ┌───────────┴────────┐
//!   │  translate   │ │  translate   │ │  translate_update  │ │ translate_update   │
//!   │  (forward)   │ │  _backwards  │ │  virtual → host    │ │ _backwards         │
//!   └──────────────┘ └──────────────┘ └────────────────────┘ └────────────────────┘
//!           names · semantic equality · object translator · ownership scope
//! ```
//!
//! # Modules
//!
//! - [`translate`]: identity translation, semantic equality, object shaping
//! - [`syncer`]: the volume translation engine and the machinery driving it
//! - [`domain`]: port traits between the engine and the outside world
//! - [`config`]: syncer configuration
//! - [`util`]: remote exec helper
//! - [`error`]: error types and handling

pub mod config;
pub mod domain;
pub mod error;
pub mod syncer;
pub mod translate;
pub mod util;

// Re-export commonly used types
pub use config::{ExecConfig, SyncerConfig};

pub use domain::ports::{ObjectTranslator, PodExecutor, ScopeClassifier, VolumeStore};

pub use error::{Error, ErrorAction, Result};

pub use syncer::{
    DeletionPolicy, KubeVolumeStore, MemoryVolumeStore, PersistentVolumeSyncer, SyncAction,
    SyncMetrics, SyncOutcome, VolumeReconciler,
};

pub use translate::{
    physical_name, physical_name_cluster_scoped, ClusterObjectTranslator, MarkerLabelClassifier,
    OwnershipScope,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
