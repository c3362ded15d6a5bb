use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use common::models::{Signal, TradeUpdate, WhaleSignal};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::selector::{self, Filter};

/// One-shot auto-selection on the first successful batch merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoSelect {
    #[default]
    Pending,
    Fired,
}

#[derive(Debug, Default)]
struct Selection {
    selected_id: Option<String>,
    auto_select: AutoSelect,
}

#[derive(Debug, Default)]
struct RegistryState {
    signals: Vec<Signal>,
    selection: Selection,
}

impl RegistryState {
    fn position_by_symbol(&self, symbol: &str) -> Option<usize> {
        self.signals.iter().position(|s| s.matches_symbol(symbol))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub stream_owned: usize,
    pub user_added: usize,
    pub refreshed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated,
    Inserted,
}

/// The authoritative signal list plus selection state.
///
/// Every operation takes the single state lock for its whole
/// read-modify-write, so merges and upserts from different producers are
/// applied one after another and never against a stale copy. Callers do
/// their network I/O before calling in.
#[derive(Clone, Default)]
pub struct SignalRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the watchlist-tracked subset with `fresh`. Crypto signals and
    /// user-added signals are carried over untouched, in that order, ahead of
    /// the fresh watchlist.
    pub async fn merge_batch(&self, fresh: Vec<Signal>, canonical: &HashSet<String>) -> MergeSummary {
        let mut state = self.state.lock().await;

        let current = std::mem::take(&mut state.signals);
        let mut stream_owned = Vec::new();
        let mut user_added = Vec::new();
        let mut previous_ids: HashMap<String, String> = HashMap::new();

        for signal in current {
            if signal.market.is_crypto() {
                stream_owned.push(signal);
            } else if !canonical.contains(&signal.symbol.to_uppercase()) {
                user_added.push(signal);
            } else {
                previous_ids
                    .entry(signal.symbol.to_uppercase())
                    .or_insert(signal.id);
            }
        }

        // Keep ids stable across refreshes so a selected watchlist signal
        // stays selected.
        let fresh: Vec<Signal> = fresh
            .into_iter()
            .map(|mut signal| {
                if let Some(id) = previous_ids.remove(&signal.symbol.to_uppercase()) {
                    signal.id = id;
                }
                signal
            })
            .collect();

        let summary = MergeSummary {
            stream_owned: stream_owned.len(),
            user_added: user_added.len(),
            refreshed: fresh.len(),
        };

        if state.selection.auto_select == AutoSelect::Pending {
            if let Some(first) = fresh.first() {
                if state.selection.selected_id.is_none() {
                    info!("Auto-selecting {} ({})", first.symbol, first.id);
                    state.selection.selected_id = Some(first.id.clone());
                }
                state.selection.auto_select = AutoSelect::Fired;
            }
        }

        let mut merged = stream_owned;
        merged.extend(user_added);
        merged.extend(fresh);
        state.signals = merged;

        debug!(
            "Merged batch: {} stream, {} user, {} watchlist",
            summary.stream_owned, summary.user_added, summary.refreshed
        );
        summary
    }

    /// Applies a stream tick. Existing signals keep id, reasons, whale
    /// annotations and position; unseen symbols are prepended.
    pub async fn upsert(&self, update: &TradeUpdate) -> UpsertOutcome {
        let mut state = self.state.lock().await;

        match state.position_by_symbol(&update.symbol) {
            Some(idx) => {
                state.signals[idx].apply_trade(update);
                UpsertOutcome::Updated
            }
            None => {
                debug!("First sighting of {}", update.symbol);
                state.signals.insert(0, Signal::from_trade(update));
                UpsertOutcome::Inserted
            }
        }
    }

    /// Prepends a whale annotation to the signal tracking `symbol`. Returns
    /// false when no signal matches.
    pub async fn attach_whale_signal(&self, symbol: &str, whale_signal: WhaleSignal) -> bool {
        let mut state = self.state.lock().await;

        match state.position_by_symbol(symbol) {
            Some(idx) => {
                state.signals[idx].push_whale_signal(whale_signal);
                true
            }
            None => false,
        }
    }

    /// Case-insensitive lookup by symbol or id.
    pub async fn find(&self, query: &str) -> Option<Signal> {
        let state = self.state.lock().await;
        state
            .signals
            .iter()
            .find(|s| s.matches_symbol(query) || s.id.eq_ignore_ascii_case(query))
            .cloned()
    }

    /// Prepends `signal` and selects it. If a signal with the same symbol
    /// appeared in the meantime, that one is selected instead and returned
    /// with `false`.
    pub async fn insert_and_select(&self, signal: Signal) -> (Signal, bool) {
        let mut state = self.state.lock().await;

        if let Some(idx) = state.position_by_symbol(&signal.symbol) {
            let existing = state.signals[idx].clone();
            state.selection.selected_id = Some(existing.id.clone());
            return (existing, false);
        }

        state.selection.selected_id = Some(signal.id.clone());
        state.signals.insert(0, signal.clone());
        (signal, true)
    }

    /// Selects `id` if it is tracked.
    pub async fn select(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;

        let found = state
            .signals
            .iter()
            .find(|s| s.id.eq_ignore_ascii_case(id))
            .map(|s| s.id.clone());
        match found {
            Some(id) => {
                state.selection.selected_id = Some(id);
                true
            }
            None => false,
        }
    }

    /// May point at a signal that is no longer tracked.
    pub async fn selected_id(&self) -> Option<String> {
        self.state.lock().await.selection.selected_id.clone()
    }

    pub async fn selected(&self) -> Option<Signal> {
        let state = self.state.lock().await;
        let id = state.selection.selected_id.as_deref()?;
        state.signals.iter().find(|s| s.id == id).cloned()
    }

    pub async fn auto_select(&self) -> AutoSelect {
        self.state.lock().await.selection.auto_select
    }

    pub async fn snapshot(&self) -> Vec<Signal> {
        self.state.lock().await.signals.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.signals.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// `selector::select` over the current state and selection.
    pub async fn view(&self, filter: Filter) -> Vec<Signal> {
        let state = self.state.lock().await;
        selector::select(
            &state.signals,
            filter,
            state.selection.selected_id.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::signal::REASON_SEARCH;
    use common::models::Market;

    fn trade(symbol: &str, price: f64) -> TradeUpdate {
        TradeUpdate {
            symbol: symbol.to_string(),
            price,
            change_rate: 2.0,
            volume: 10.0,
            score: 60.0,
        }
    }

    fn stock(symbol: &str, price: f64) -> Signal {
        Signal::new(symbol, Market::classify(symbol), price, 0.5, 0.0, vec![])
    }

    fn canonical(symbols: &[&str]) -> HashSet<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    fn symbols(signals: &[Signal]) -> Vec<String> {
        signals.iter().map(|s| s.symbol.clone()).collect()
    }

    #[tokio::test]
    async fn test_merge_preserves_stream_and_user_signals() {
        let registry = SignalRegistry::new();
        registry.upsert(&trade("BTCUSDT", 60_000.0)).await;
        registry
            .attach_whale_signal("BTCUSDT", WhaleSignal::large_order("Executed BUY $900,000".into(), 0.9))
            .await;
        let (user, _) = registry
            .insert_and_select(Signal::new("BRK.B", Market::Nyse, 1.0, 0.0, 0.0, vec![REASON_SEARCH.into()]))
            .await;
        let before = registry.snapshot().await;

        let watch = canonical(&["AAPL", "005930.KS"]);
        let summary = registry
            .merge_batch(vec![stock("AAPL", 190.0), stock("005930.KS", 70_000.0)], &watch)
            .await;

        assert_eq!(summary, MergeSummary { stream_owned: 1, user_added: 1, refreshed: 2 });
        let after = registry.snapshot().await;
        assert_eq!(symbols(&after), ["BTCUSDT", "BRK.B", "AAPL", "005930.KS"]);

        let btc_before = before.iter().find(|s| s.symbol == "BTCUSDT").unwrap();
        assert_eq!(&after[0], btc_before);
        assert_eq!(after[1].id, user.id);
        assert_eq!(after[1].reasons, vec![REASON_SEARCH.to_string()]);
    }

    #[tokio::test]
    async fn test_watchlist_replacement_is_total() {
        let registry = SignalRegistry::new();
        let watch = canonical(&["AAPL", "NVDA"]);
        registry
            .merge_batch(vec![stock("AAPL", 100.0), stock("NVDA", 400.0)], &watch)
            .await;

        let fresh_aapl = Signal::new("AAPL", Market::Nasdaq, 190.5, -1.25, 0.0, vec![]);
        registry.merge_batch(vec![fresh_aapl.clone(), stock("NVDA", 0.0)], &watch).await;

        let after = registry.snapshot().await;
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].price, 190.5);
        assert_eq!(after[0].change_rate, -1.25);
        assert_eq!(after[0].score, fresh_aapl.score);
        assert_eq!(after[1].price, 0.0);
    }

    #[tokio::test]
    async fn test_watchlist_symbol_dropped_from_batch_disappears() {
        let registry = SignalRegistry::new();
        let watch = canonical(&["AAPL", "NVDA"]);
        registry
            .merge_batch(vec![stock("AAPL", 1.0), stock("NVDA", 1.0)], &watch)
            .await;
        registry.merge_batch(vec![stock("AAPL", 2.0)], &watch).await;

        assert_eq!(symbols(&registry.snapshot().await), ["AAPL"]);
    }

    #[tokio::test]
    async fn test_merge_never_duplicates_searched_watchlist_symbol() {
        let registry = SignalRegistry::new();
        registry.insert_and_select(stock("AAPL", 1.0)).await;

        let watch = canonical(&["AAPL"]);
        registry.merge_batch(vec![stock("AAPL", 2.0)], &watch).await;

        let after = registry.snapshot().await;
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].price, 2.0);
    }

    #[tokio::test]
    async fn test_merge_keeps_watchlist_ids_stable() {
        let registry = SignalRegistry::new();
        let watch = canonical(&["AAPL"]);
        registry.merge_batch(vec![stock("AAPL", 1.0)], &watch).await;
        let first_id = registry.snapshot().await[0].id.clone();

        registry.merge_batch(vec![stock("AAPL", 2.0)], &watch).await;

        assert_eq!(registry.snapshot().await[0].id, first_id);
        assert_eq!(registry.selected().await.unwrap().price, 2.0);
    }

    #[tokio::test]
    async fn test_auto_select_fires_once() {
        let registry = SignalRegistry::new();
        let watch = canonical(&["AAPL", "NVDA"]);
        assert_eq!(registry.auto_select().await, AutoSelect::Pending);

        // An empty batch does not consume the latch
        registry.merge_batch(vec![], &watch).await;
        assert_eq!(registry.auto_select().await, AutoSelect::Pending);
        assert_eq!(registry.selected_id().await, None);

        registry
            .merge_batch(vec![stock("AAPL", 1.0), stock("NVDA", 1.0)], &watch)
            .await;
        let aapl = registry.snapshot().await[0].clone();
        assert_eq!(registry.selected_id().await, Some(aapl.id.clone()));
        assert_eq!(registry.auto_select().await, AutoSelect::Fired);

        // Dropping the selected symbol leaves the selection dangling
        registry.merge_batch(vec![stock("NVDA", 1.0)], &watch).await;
        assert_eq!(registry.selected_id().await, Some(aapl.id));
        assert!(registry.selected().await.is_none());
    }

    #[tokio::test]
    async fn test_auto_select_respects_existing_selection() {
        let registry = SignalRegistry::new();
        let (searched, _) = registry.insert_and_select(stock("BRK.B", 1.0)).await;

        registry
            .merge_batch(vec![stock("AAPL", 1.0)], &canonical(&["AAPL"]))
            .await;

        assert_eq!(registry.selected_id().await, Some(searched.id));
        assert_eq!(registry.auto_select().await, AutoSelect::Fired);
    }

    #[tokio::test]
    async fn test_upsert_preserves_identity_and_position() {
        let registry = SignalRegistry::new();
        registry.upsert(&trade("BTCUSDT", 1.0)).await;
        registry.upsert(&trade("ETHUSDT", 1.0)).await;
        registry
            .attach_whale_signal("BTCUSDT", WhaleSignal::large_order("x".into(), 0.2))
            .await;
        let btc = registry.find("btcusdt").await.unwrap();

        let outcome = registry
            .upsert(&TradeUpdate {
                symbol: "BTCUSDT".to_string(),
                price: 65_000.0,
                change_rate: -3.0,
                volume: 99.0,
                score: 35.0,
            })
            .await;

        assert_eq!(outcome, UpsertOutcome::Updated);
        let signals = registry.snapshot().await;
        assert_eq!(symbols(&signals), ["ETHUSDT", "BTCUSDT"]);
        let updated = &signals[1];
        assert_eq!(updated.id, btc.id);
        assert_eq!(updated.reasons, btc.reasons);
        assert_eq!(updated.whale_signals, btc.whale_signals);
        assert_eq!(
            (updated.price, updated.change_rate, updated.volume, updated.score),
            (65_000.0, -3.0, 99.0, 35.0)
        );
    }

    #[tokio::test]
    async fn test_concurrent_upserts_and_merges_lose_nothing() {
        let registry = SignalRegistry::new();
        let watch = canonical(&["AAPL"]);

        let mut tasks = Vec::new();
        for i in 0..50 {
            let registry = registry.clone();
            let watch = watch.clone();
            tasks.push(tokio::spawn(async move {
                registry.upsert(&trade(&format!("COIN{}USDT", i), i as f64)).await;
                registry.merge_batch(vec![stock("AAPL", i as f64)], &watch).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let signals = registry.snapshot().await;
        assert_eq!(signals.len(), 51);
        assert_eq!(signals.iter().filter(|s| s.symbol == "AAPL").count(), 1);
        for i in 0..50 {
            let coin = registry.find(&format!("COIN{}USDT", i)).await.unwrap();
            assert_eq!(coin.price, i as f64);
        }
    }

    #[tokio::test]
    async fn test_attach_whale_signal_unknown_symbol() {
        let registry = SignalRegistry::new();
        assert!(
            !registry
                .attach_whale_signal("DOGEUSDT", WhaleSignal::large_order("x".into(), 0.1))
                .await
        );
    }

    #[tokio::test]
    async fn test_insert_and_select_rechecks_symbol() {
        let registry = SignalRegistry::new();
        let (first, inserted) = registry.insert_and_select(stock("TSLA", 250.0)).await;
        assert!(inserted);

        let (second, inserted) = registry.insert_and_select(stock("tsla", 0.0)).await;

        assert!(!inserted);
        assert_eq!(second.id, first.id);
        assert_eq!(second.price, 250.0);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.selected_id().await, Some(first.id));
    }

    #[tokio::test]
    async fn test_select_and_view() {
        let registry = SignalRegistry::new();
        registry.upsert(&trade("BTCUSDT", 1.0)).await;
        registry.merge_batch(vec![stock("005930.KS", 1.0)], &canonical(&["005930.KS"])).await;
        let btc = registry.find("BTCUSDT").await.unwrap();

        assert!(registry.select(&btc.id).await);
        assert!(!registry.select("missing").await);

        let view = registry.view(Filter::Kr).await;
        assert_eq!(symbols(&view), ["BTCUSDT", "005930.KS"]);
    }
}
