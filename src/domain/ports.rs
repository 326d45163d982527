use async_trait::async_trait;

use crate::domain::errors::EngineError;
use crate::domain::market::quote::PriceQuote;

/// An external source of gram-gold/FX price ticks. Implementations own
/// whatever transport (websocket, poll loop, replay file) feeds them;
/// `next_quote` blocks until one is available or the source is exhausted.
#[async_trait]
pub trait QuoteAdapter: Send + Sync {
    async fn next_quote(&mut self) -> Result<Option<PriceQuote>, EngineError>;
}
