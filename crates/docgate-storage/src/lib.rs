pub mod adapter;
pub mod memory;
pub mod pattern;
pub mod s3;
pub mod traits;

pub use adapter::{DirectoryListing, DocumentStore, TransferReport};
pub use memory::MemoryObjectStore;
pub use s3::{S3Config, S3ObjectStore};
pub use traits::{ByteStream, ObjectBody, ObjectStore};
