pub mod error;
pub mod registry;
pub mod search_resolver;
pub mod selector;
pub mod watchlist;
pub mod whale_detector;

pub use error::RegistryError;
pub use registry::{AutoSelect, MergeSummary, SignalRegistry, UpsertOutcome};
pub use search_resolver::{SearchOutcome, SearchResolver};
pub use selector::{Filter, select};
pub use watchlist::fresh_watchlist_signals;
pub use whale_detector::WhaleDetector;
