//! Crossing detection
//!
//! Determines whether an incoming order is marketable against a resting
//! price level. Market orders carry no limit and cross everything.

use types::numeric::Price;
use types::order::Side;

/// Check if an incoming order can trade against a resting level.
///
/// A buy crosses when its limit is at or above the ask; a sell crosses
/// when its limit is at or below the bid. Without a limit (market order)
/// every level is marketable.
pub fn marketable(incoming_side: Side, incoming_limit: Option<Price>, resting_price: Price) -> bool {
    match (incoming_side, incoming_limit) {
        (_, None) => true,
        (Side::Buy, Some(limit)) => limit >= resting_price,
        (Side::Sell, Some(limit)) => limit <= resting_price,
    }
}
