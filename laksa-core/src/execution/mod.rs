//! Request execution: HTTP transport and the retry-driven executor.

pub mod executor;
pub mod transport;

pub use executor::RequestExecutor;
pub use transport::{HttpTransport, ProviderRequest, ProviderResponse, TransportPool};
