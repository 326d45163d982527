pub mod candle;
pub mod instrument;
pub mod quote;
pub mod regime;
pub mod timeframe;

pub use candle::Candle;
pub use instrument::Instrument;
pub use quote::PriceQuote;
pub use timeframe::Timeframe;
