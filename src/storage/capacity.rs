//! Capacity probes for the storage medium

use async_trait::async_trait;

use super::errors::{StorageError, StorageResult};
use super::models::StorageStats;

/// Reports total, free and used space of the medium holding the stores.
///
/// A probe that cannot get an answer from the platform must fail with a
/// `PermissionDenied` error rather than guess.
#[async_trait]
pub trait CapacityProbe: Send + Sync {
    /// Read the current capacity
    async fn check_storage_space(&self) -> StorageResult<StorageStats>;
}

/// Probe returning a fixed reading
#[derive(Debug, Clone)]
pub struct FixedCapacityProbe {
    stats: Option<StorageStats>,
}

impl FixedCapacityProbe {
    /// Probe that always reports the given totals
    pub fn new(total_space: u64, free_space: u64) -> Self {
        Self {
            stats: Some(StorageStats::new(total_space, free_space)),
        }
    }

    /// A probe whose platform never answers
    pub fn unavailable() -> Self {
        Self { stats: None }
    }
}

#[async_trait]
impl CapacityProbe for FixedCapacityProbe {
    async fn check_storage_space(&self) -> StorageResult<StorageStats> {
        self.stats
            .ok_or_else(|| StorageError::permission_denied("Storage capacity is unavailable"))
    }
}

#[cfg(feature = "disk")]
pub use disk::DiskCapacityProbe;

#[cfg(feature = "disk")]
mod disk {
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use sysinfo::Disks;
    use tracing::debug;

    use super::CapacityProbe;
    use crate::storage::errors::{StorageError, StorageResult};
    use crate::storage::models::StorageStats;

    /// Probe reading the disk that holds a data directory
    #[derive(Debug, Clone)]
    pub struct DiskCapacityProbe {
        data_dir: PathBuf,
    }

    impl DiskCapacityProbe {
        /// Probe the disk holding `data_dir`
        pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
            Self {
                data_dir: data_dir.into(),
            }
        }

        /// Canonical form of the nearest existing ancestor of the data dir
        fn resolved_dir(&self) -> PathBuf {
            self.data_dir
                .ancestors()
                .find_map(|dir| std::fs::canonicalize(dir).ok())
                .unwrap_or_else(|| self.data_dir.clone())
        }
    }

    /// Pick the mount point that is the longest prefix of `dir`
    pub(super) fn best_mount<'a, I>(dir: &Path, mounts: I) -> Option<usize>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        mounts
            .into_iter()
            .enumerate()
            .filter(|(_, mount)| dir.starts_with(mount))
            .max_by_key(|(_, mount)| mount.components().count())
            .map(|(index, _)| index)
    }

    #[async_trait]
    impl CapacityProbe for DiskCapacityProbe {
        async fn check_storage_space(&self) -> StorageResult<StorageStats> {
            let dir = self.resolved_dir();
            let disks = Disks::new_with_refreshed_list();
            let list = disks.list();

            let disk = best_mount(&dir, list.iter().map(|d| d.mount_point()))
                .and_then(|index| list.get(index))
                .ok_or_else(|| {
                    StorageError::permission_denied(format!(
                        "No disk found for {}",
                        dir.display()
                    ))
                })?;

            if disk.total_space() == 0 {
                return Err(StorageError::permission_denied(format!(
                    "Disk at {} reports no capacity",
                    disk.mount_point().display()
                )));
            }

            debug!(
                "Disk {} total={} available={}",
                disk.mount_point().display(),
                disk.total_space(),
                disk.available_space()
            );
            Ok(StorageStats::new(disk.total_space(), disk.available_space()))
        }
    }
}
