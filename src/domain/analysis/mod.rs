pub mod confidence;
pub mod record;
pub mod sub_analysis;

pub use confidence::Confidence;
pub use record::{AnalysisRecord, CurrencyRiskLevel, SignalDirection, SignalRecord, SignalStrength};
pub use sub_analysis::SubAnalysis;
