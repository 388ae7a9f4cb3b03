//! Resource syncers
//!
//! The pure translation engine lives in [`persistentvolumes`]; the other
//! modules move its results between the two control planes.

pub mod controller;
pub mod locks;
pub mod memory;
pub mod metrics;
pub mod persistentvolumes;
pub mod reconciler;
pub mod store;
pub mod updated;

pub use locks::PairLocks;
pub use memory::MemoryVolumeStore;
pub use metrics::SyncMetrics;
pub use persistentvolumes::{DeletionPolicy, PersistentVolumeSyncer, SyncAction};
pub use reconciler::{SyncOutcome, VolumeReconciler};
pub use store::KubeVolumeStore;
pub use updated::Updated;
