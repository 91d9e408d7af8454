//! Message store implementations.

pub mod http;
pub mod inmemory;

pub use http::HttpMessageStore;
pub use inmemory::InMemoryMessageStore;
