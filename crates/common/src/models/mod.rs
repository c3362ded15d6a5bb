use std::collections::VecDeque;

pub mod market;
pub mod quote;
pub mod signal;
pub mod stream;
pub mod whale;

pub use market::Market;
pub use quote::Quote;
pub use signal::Signal;
pub use stream::{Side, StreamEvent, TradeUpdate, WhaleEvent};
pub use whale::{WhaleAlert, WhaleKind, WhaleSignal};

/// Newest-first ring: prepend, then drop whatever falls past `cap`.
pub fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    buf.push_front(item);
    buf.truncate(cap);
}
