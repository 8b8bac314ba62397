#![forbid(unsafe_code)]

pub mod api;
pub mod error;
pub mod http;
pub mod memory;
pub mod records;

pub use api::ActivityBackend;
pub use error::BackendError;
pub use http::{HttpBackend, HttpBackendConfig};
pub use memory::{InMemoryBackend, demo_backend};
pub use records::{
    ActivityKindRecord, FeedbackRecord, ItemRecord, OpenSessionRequest, ResponseRecord,
    SessionRecord,
};
