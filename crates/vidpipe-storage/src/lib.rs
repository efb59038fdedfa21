//! Object-store adapter for the vidpipe control plane.
//!
//! One facade over two backends: a local filesystem store for development
//! and an S3-compatible store (R2, MinIO, AWS) for production. The remote
//! backend additionally offers the multipart lifecycle and presigned URLs.

pub mod error;
pub mod keys;
pub mod local;
pub mod s3;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use keys::{folder_prefix, object_key, ObjectKind};
pub use local::LocalStore;
pub use s3::{S3Config, S3Store};
pub use store::{ObjectInfo, ObjectStore, RangedRead, StorageBackend, UploadedPart};
