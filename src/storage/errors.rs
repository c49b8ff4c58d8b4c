//! Error types for the storage lifecycle system

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for storage lifecycle operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Fixed taxonomy of storage failures.
///
/// Serializes to the upper snake case wire names (`INSUFFICIENT_SPACE`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageErrorKind {
    /// Free space is below the configured minimum
    InsufficientSpace,
    /// The platform refused access to the storage medium
    PermissionDenied,
    /// Schema or store initialization failed in a way that signals unreadable data
    CorruptedData,
    /// Any failure while creating a backup
    BackupFailed,
    /// Any failure while restoring a backup
    RestoreFailed,
    /// Any failure while retiring old backups
    CleanupFailed,
}

impl StorageErrorKind {
    /// Every kind, in declaration order
    pub const ALL: [StorageErrorKind; 6] = [
        StorageErrorKind::InsufficientSpace,
        StorageErrorKind::PermissionDenied,
        StorageErrorKind::CorruptedData,
        StorageErrorKind::BackupFailed,
        StorageErrorKind::RestoreFailed,
        StorageErrorKind::CleanupFailed,
    ];

    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageErrorKind::InsufficientSpace => "INSUFFICIENT_SPACE",
            StorageErrorKind::PermissionDenied => "PERMISSION_DENIED",
            StorageErrorKind::CorruptedData => "CORRUPTED_DATA",
            StorageErrorKind::BackupFailed => "BACKUP_FAILED",
            StorageErrorKind::RestoreFailed => "RESTORE_FAILED",
            StorageErrorKind::CleanupFailed => "CLEANUP_FAILED",
        }
    }

    /// Whether a caller may retry or fall back without data loss
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageErrorKind::InsufficientSpace
                | StorageErrorKind::BackupFailed
                | StorageErrorKind::CleanupFailed
        )
    }

    /// Fixed user-facing advisory for this kind
    pub fn advisory(&self) -> &'static str {
        match self {
            StorageErrorKind::InsufficientSpace => {
                "Your device is running low on storage. Free up some space and try again."
            }
            StorageErrorKind::PermissionDenied => {
                "The app was denied access to storage. Check the app's storage permissions."
            }
            StorageErrorKind::CorruptedData => {
                "Some app data could not be read. Restore from a backup or reset the app data."
            }
            StorageErrorKind::BackupFailed => {
                "The backup could not be created. Your data is unchanged; try again later."
            }
            StorageErrorKind::RestoreFailed => {
                "The backup could not be restored. Data may be partially restored; try another backup."
            }
            StorageErrorKind::CleanupFailed => {
                "Old backups could not be removed. Your data is not affected."
            }
        }
    }
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory used for errors that are not a [`StorageError`]
pub const GENERIC_STORAGE_ADVISORY: &str =
    "An unexpected storage problem occurred. Restart the app and try again.";

/// A typed storage failure.
///
/// Built at the failure site and never mutated afterwards; the fields are only
/// reachable through accessors.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct StorageError {
    message: String,
    kind: StorageErrorKind,
    recoverable: bool,
}

impl StorageError {
    /// Create an error whose recoverable hint follows its kind
    pub fn new<S: Into<String>>(kind: StorageErrorKind, message: S) -> Self {
        Self {
            message: message.into(),
            kind,
            recoverable: kind.is_recoverable(),
        }
    }

    /// Create an insufficient space error
    pub fn insufficient_space<S: Into<String>>(message: S) -> Self {
        Self::new(StorageErrorKind::InsufficientSpace, message)
    }

    /// Create a permission denied error
    pub fn permission_denied<S: Into<String>>(message: S) -> Self {
        Self::new(StorageErrorKind::PermissionDenied, message)
    }

    /// Create a corrupted data error
    pub fn corrupted<S: Into<String>>(message: S) -> Self {
        Self::new(StorageErrorKind::CorruptedData, message)
    }

    /// Create a backup failure
    pub fn backup_failed<S: Into<String>>(message: S) -> Self {
        Self::new(StorageErrorKind::BackupFailed, message)
    }

    /// Create a restore failure
    pub fn restore_failed<S: Into<String>>(message: S) -> Self {
        Self::new(StorageErrorKind::RestoreFailed, message)
    }

    /// Create a cleanup failure
    pub fn cleanup_failed<S: Into<String>>(message: S) -> Self {
        Self::new(StorageErrorKind::CleanupFailed, message)
    }

    /// Human-readable message without the kind prefix
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The failure kind
    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    /// Check if this error is recoverable (caller may retry or fall back)
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Get a user-friendly advisory for this error
    pub fn user_friendly_message(&self) -> &'static str {
        self.kind.advisory()
    }
}
