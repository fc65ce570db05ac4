pub mod assets;
pub mod config;
pub mod fetch;
pub mod status;
pub mod sync;
pub mod validation;

pub use assets::{AssetCache, AssetKind};
pub use fetch::{FetchError, Fetcher, RetryPolicy};
pub use sync::{Coordinator, SyncOutcome};
