mod error;
mod ledger;
mod models;
mod persist;
mod whitelist;

pub use error::{Result, StoreError};
pub use ledger::AssetLedger;
pub use models::{AddOutcome, PlayerName, RemoveOutcome};
pub use whitelist::Whitelist;
