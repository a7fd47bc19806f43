//! Impls - in-process implementations of the ports, for tests and the demo CLI.

pub mod inmem_store;
pub mod mock_provider;

pub use self::inmem_store::InMemoryEntityStore;
pub use self::mock_provider::{MOCK_PROVIDER_TYPE, MockProvider};
