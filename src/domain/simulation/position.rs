use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::market::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn sign(&self) -> Decimal {
        match self {
            PositionSide::Long => Decimal::ONE,
            PositionSide::Short => -Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    DailyLossLimit,
    OppositeSignal,
    TrailingStop,
    MaxHoldDuration,
    ConfidenceDecay,
    VolatilitySpike,
}

/// A paper-traded position within one simulation. Opened atomically with a
/// capital debit from its timeframe's ledger; closed atomically with a
/// capital credit of the remaining size plus net P&L.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub sim_id: Uuid,
    pub timeframe: Timeframe,
    pub side: PositionSide,
    pub size_grams: Decimal,
    pub entry_price: Decimal,
    pub entry_ts: DateTime<Utc>,
    pub entry_commission: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub trailing_stop: Option<Decimal>,
    pub entry_confidence: Decimal,
    pub status: PositionStatus,
    pub exit_price: Option<Decimal>,
    pub exit_ts: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
    pub gross_pnl_tl: Option<Decimal>,
    pub gross_pnl_grams: Option<Decimal>,
    pub costs_tl: Option<Decimal>,
    pub net_pnl_tl: Option<Decimal>,
    pub net_pnl_grams: Option<Decimal>,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        sim_id: Uuid,
        timeframe: Timeframe,
        side: PositionSide,
        size_grams: Decimal,
        entry_price: Decimal,
        entry_ts: DateTime<Utc>,
        entry_commission: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
        entry_confidence: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sim_id,
            timeframe,
            side,
            size_grams,
            entry_price,
            entry_ts,
            entry_commission,
            stop_loss,
            take_profit,
            trailing_stop: None,
            entry_confidence,
            status: PositionStatus::Open,
            exit_price: None,
            exit_ts: None,
            exit_reason: None,
            gross_pnl_tl: None,
            gross_pnl_grams: None,
            costs_tl: None,
            net_pnl_tl: None,
            net_pnl_grams: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Closes the position, computing gross/net P&L in both TL and grams.
    /// `exit_commission` is the cost-model's exit leg; `half_spread` is
    /// applied against the market price before this call by the caller.
    pub fn close(
        &mut self,
        exit_price: Decimal,
        exit_ts: DateTime<Utc>,
        exit_commission: Decimal,
        current_gram_price: Decimal,
        reason: ExitReason,
    ) {
        let gross_pnl_tl = (exit_price - self.entry_price) * self.size_grams * self.side.sign();
        let costs_tl = self.entry_commission + exit_commission;
        let net_pnl_tl = gross_pnl_tl - costs_tl;

        self.status = PositionStatus::Closed;
        self.exit_price = Some(exit_price);
        self.exit_ts = Some(exit_ts);
        self.exit_reason = Some(reason);
        self.gross_pnl_tl = Some(gross_pnl_tl);
        self.gross_pnl_grams = Some(gross_pnl_tl / current_gram_price);
        self.costs_tl = Some(costs_tl);
        self.net_pnl_tl = Some(net_pnl_tl);
        self.net_pnl_grams = Some(net_pnl_tl / current_gram_price);
    }

    /// Amount to credit back to the timeframe's capital ledger on close:
    /// the original size plus the net P&L expressed in grams.
    pub fn settlement_grams(&self) -> Option<Decimal> {
        self.net_pnl_grams.map(|pnl| self.size_grams + pnl)
    }
}
