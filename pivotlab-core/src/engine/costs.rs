//! Slippage and commission.
//!
//! Slippage moves every fill against the trader by `slippage_bps` of the
//! reference price. Commission is `commission_bps` of fill notional, charged on
//! both legs and booked when the trade closes.

use crate::domain::{OpenPosition, Side};

const BPS: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub slippage_bps: f64,
    pub commission_bps: f64,
}

/// Costs of one closed round trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundTrip {
    pub exit_price: f64,
    pub gross_pnl: f64,
    pub commission: f64,
    pub slippage: f64,
    pub net_pnl: f64,
}

impl CostModel {
    pub fn new(slippage_bps: f64, commission_bps: f64) -> Self {
        Self {
            slippage_bps,
            commission_bps,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Buy higher for longs, sell lower for shorts.
    pub fn entry_fill(&self, side: Side, reference: f64) -> f64 {
        reference * (1.0 + side.sign() * self.slippage_bps / BPS)
    }

    /// Sell lower for longs, buy higher for shorts.
    pub fn exit_fill(&self, side: Side, reference: f64) -> f64 {
        reference * (1.0 - side.sign() * self.slippage_bps / BPS)
    }

    pub fn commission(&self, notional: f64) -> f64 {
        notional.abs() * self.commission_bps / BPS
    }

    /// Settle `position` against an exit reference price.
    ///
    /// Gross PnL is measured between reference prices so that
    /// `net = gross - commission - slippage` holds exactly.
    pub fn settle(&self, side: Side, position: &OpenPosition, exit_reference: f64) -> RoundTrip {
        let size = position.size;
        let exit_price = self.exit_fill(side, exit_reference);

        let gross_pnl = side.sign() * (exit_reference - position.entry_reference) * size;
        let slippage = ((position.entry_price - position.entry_reference).abs()
            + (exit_price - exit_reference).abs())
            * size;
        let commission =
            self.commission(position.entry_price * size) + self.commission(exit_price * size);

        RoundTrip {
            exit_price,
            gross_pnl,
            commission,
            slippage,
            net_pnl: gross_pnl - commission - slippage,
        }
    }
}
