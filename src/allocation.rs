//! Token allocation for a settled gig.
//!
//! A gig's total token is split into `n + 1` equal shares: one for each
//! performer and one kept back for shared equipment costs. Shares are rounded
//! to currency granularity exactly once, half away from zero. The difference
//! between what was collected and what is handed out is reported as
//! `undistributed`: positive when rounding kept a few cents back, negative
//! when it rounded up past the total. Its magnitude never exceeds half a cent
//! per share.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Decimal places kept for every token amount.
pub const TOKEN_DP: u32 = 2;

/// Rounds a token amount to two decimal places, halves away from zero.
pub fn round_token(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(TOKEN_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Trims every name, drops blanks and keeps only the first occurrence of a
/// repeated name.
pub fn normalize_performers<I, S>(performers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for name in performers {
        let name = name.as_ref().trim();
        if name.is_empty() || out.iter().any(|n| n == name) {
            continue;
        }
        out.push(name.to_string());
    }
    out
}

/// Result of splitting one gig's token total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub total_token: Decimal,
    pub performer_count: usize,
    pub total_shares: usize,
    pub share_per_person: Decimal,
    pub equipment_share: Decimal,
    /// `share_per_person * performer_count`
    pub distributed: Decimal,
    /// `total_token - distributed - equipment_share`, signed.
    pub undistributed: Decimal,
}

/// Splits `total_token` between `performers` and the equipment fund.
///
/// Fails with a validation error when the total is negative or when no
/// performer survives normalization.
pub fn allocate<I, S>(total_token: Decimal, performers: I) -> Result<Allocation>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if total_token.is_sign_negative() && !total_token.is_zero() {
        return Err(LedgerError::validation("total token cannot be negative"));
    }
    let performer_count = normalize_performers(performers).len();
    if performer_count == 0 {
        return Err(LedgerError::validation("at least one performer required"));
    }

    let total_shares = performer_count + 1;
    let share_per_person = round_token(total_token / Decimal::from(total_shares));
    let equipment_share = share_per_person;
    let distributed = share_per_person * Decimal::from(performer_count);
    let undistributed = total_token - distributed - equipment_share;

    Ok(Allocation {
        total_token,
        performer_count,
        total_shares,
        share_per_person,
        equipment_share,
        distributed,
        undistributed,
    })
}
