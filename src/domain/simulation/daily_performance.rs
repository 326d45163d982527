use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPerformance {
    pub sim_id: Uuid,
    pub date: NaiveDate,
    pub starting_capital: Decimal,
    pub ending_capital: Decimal,
    pub closed_trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub daily_pnl_grams: Decimal,
    pub daily_pnl_pct: Decimal,
}

impl DailyPerformance {
    pub fn opening(sim_id: Uuid, date: NaiveDate, starting_capital: Decimal) -> Self {
        Self {
            sim_id,
            date,
            starting_capital,
            ending_capital: starting_capital,
            closed_trades: 0,
            wins: 0,
            losses: 0,
            daily_pnl_grams: Decimal::ZERO,
            daily_pnl_pct: Decimal::ZERO,
        }
    }

    pub fn record_close(&mut self, net_pnl_grams: Decimal, ending_capital: Decimal) {
        self.closed_trades += 1;
        if net_pnl_grams >= Decimal::ZERO {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.daily_pnl_grams += net_pnl_grams;
        self.ending_capital = ending_capital;
        if self.starting_capital != Decimal::ZERO {
            self.daily_pnl_pct = self.daily_pnl_grams / self.starting_capital * Decimal::ONE_HUNDRED;
        }
    }

    pub fn has_breached_daily_loss_limit(&self, max_daily_loss_pct: Decimal) -> bool {
        self.starting_capital != Decimal::ZERO && -self.daily_pnl_pct >= max_daily_loss_pct * Decimal::ONE_HUNDRED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn record_close_updates_win_loss_counts() {
        let mut perf = DailyPerformance::opening(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), dec!(1000));
        perf.record_close(dec!(10), dec!(1010));
        perf.record_close(dec!(-5), dec!(1005));
        assert_eq!(perf.wins, 1);
        assert_eq!(perf.losses, 1);
        assert_eq!(perf.daily_pnl_grams, dec!(5));
    }

    #[test]
    fn breaches_daily_loss_limit_when_pct_exceeded() {
        let mut perf = DailyPerformance::opening(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), dec!(1000));
        perf.record_close(dec!(-60), dec!(940));
        assert!(perf.has_breached_daily_loss_limit(dec!(0.05)));
    }
}
