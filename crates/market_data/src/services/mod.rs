pub mod market_gateway;
pub mod quote_refresh;
pub mod stream_service;

pub use market_gateway::BinanceStream;
pub use quote_refresh::QuoteRefreshActor;
pub use stream_service::StreamActor;
