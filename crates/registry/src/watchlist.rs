use common::config::Watchlist;
use common::models::signal::{REASON_PRICE_UNAVAILABLE, REASON_WATCHLIST};
use common::models::{Quote, Signal};

/// One signal per watchlist entry, in watchlist order. Symbols the quote
/// backend skipped get a zero-valued placeholder.
pub fn fresh_watchlist_signals(watchlist: &Watchlist, quotes: &[Quote]) -> Vec<Signal> {
    watchlist
        .entries()
        .iter()
        .map(|entry| {
            match quotes.iter().find(|q| q.symbol.eq_ignore_ascii_case(&entry.symbol)) {
                Some(quote) => Signal::new(
                    entry.symbol.clone(),
                    entry.market,
                    quote.price,
                    quote.change_percent,
                    0.0,
                    vec![REASON_WATCHLIST.to_string()],
                ),
                None => Signal::new(
                    entry.symbol.clone(),
                    entry.market,
                    0.0,
                    0.0,
                    0.0,
                    vec![
                        REASON_WATCHLIST.to_string(),
                        REASON_PRICE_UNAVAILABLE.to_string(),
                    ],
                ),
            }
        })
        .collect()
}
