pub mod error;
pub mod key;
pub mod time;
pub mod types;

pub use error::{BackendError, BackendResult, ErrorKind, GatewayError, Result};
pub use key::{KeyMapper, ObjectKey};
pub use types::{FileEntry, ItemDetails, Listing, ObjectMeta};
