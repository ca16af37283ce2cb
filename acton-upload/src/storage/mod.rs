//! Persistence of accepted uploads
//!
//! Only a [`crate::upload::ValidationResult`] can be stored, so nothing
//! reaches the disk without passing the validation pipeline first.
//!
//! Stored files are content-addressed:
//!
//! ```text
//! /var/lib/my-app/uploads/          (0700)
//! ├── secure_2cf24dba5fb0a30e_notes.txt   (0600)
//! └── secure_9f86d081884c7d65_photo.png   (0600)
//! ```

pub mod local;
pub mod types;

pub use local::SecureFileWriter;
pub use types::{StorageError, StorageResult};
