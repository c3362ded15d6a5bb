use std::sync::Arc;

use common::models::signal::{REASON_PRICE_UNAVAILABLE, REASON_SEARCH};
use common::models::{Market, Signal};
use common::sources::QuoteSource;
use tracing::{info, warn};

use crate::error::RegistryError;
use crate::registry::SignalRegistry;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Already tracked; only the selection moved.
    Existing(Signal),
    /// Resolved through the quote source and inserted.
    Inserted(Signal),
    /// Lookup failed; a zero-priced placeholder was inserted.
    Degraded(Signal),
}

impl SearchOutcome {
    pub fn signal(&self) -> &Signal {
        match self {
            SearchOutcome::Existing(s) | SearchOutcome::Inserted(s) | SearchOutcome::Degraded(s) => s,
        }
    }
}

/// Resolves user-entered symbols into tracked, selected signals.
#[derive(Clone)]
pub struct SearchResolver {
    registry: SignalRegistry,
    quotes: Arc<dyn QuoteSource>,
}

impl SearchResolver {
    pub fn new(registry: SignalRegistry, quotes: Arc<dyn QuoteSource>) -> Self {
        Self { registry, quotes }
    }

    /// Always ends with a selected signal for a non-empty query. Unknown
    /// symbols and lookup failures produce a degraded placeholder rather than
    /// an error.
    pub async fn insert_from_search(&self, query: &str) -> Result<SearchOutcome, RegistryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RegistryError::EmptyQuery);
        }

        if let Some(existing) = self.registry.find(query).await {
            self.registry.select(&existing.id).await;
            return Ok(SearchOutcome::Existing(existing));
        }

        // Registry lock is not held across the lookup
        let quote = match self.quotes.fetch_single(query).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!("Quote lookup for {} failed: {:#}", query, e);
                None
            }
        };

        let (candidate, degraded) = match quote {
            Some(quote) => (
                Signal::new(
                    quote.symbol.clone(),
                    Market::classify(&quote.symbol),
                    quote.price,
                    quote.change_percent,
                    0.0,
                    vec![REASON_SEARCH.to_string()],
                ),
                false,
            ),
            None => (
                Signal::new(
                    query.to_uppercase(),
                    Market::Nyse,
                    0.0,
                    0.0,
                    0.0,
                    vec![REASON_SEARCH.to_string(), REASON_PRICE_UNAVAILABLE.to_string()],
                ),
                true,
            ),
        };

        let (signal, inserted) = self.registry.insert_and_select(candidate).await;
        if !inserted {
            return Ok(SearchOutcome::Existing(signal));
        }

        info!("Search added {} as {}", signal.symbol, signal.market);
        if degraded {
            Ok(SearchOutcome::Degraded(signal))
        } else {
            Ok(SearchOutcome::Inserted(signal))
        }
    }
}
