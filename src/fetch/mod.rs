pub mod fetcher;
pub mod headers;
pub mod transport;

pub use fetcher::{FetchEvent, FetchOutcome, FetchRequest, ResilientFetcher, RetryReason};
pub use headers::HeaderProfile;
pub use transport::{RawResponse, ReqwestTransport, Transport, TransportError};
