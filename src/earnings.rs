use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::allocation::{TOKEN_DP, allocate};
use crate::performance::{EventStatus, PerformanceEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberEarning {
    pub name: String,
    pub total: Decimal,
}

/// Totals across every settled gig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub done_events: usize,
    pub upcoming_events: usize,
    pub total_token: Decimal,
    pub paid_to_performers: Decimal,
    pub equipment_fund: Decimal,
    /// Signed rounding residual summed over all gigs.
    pub undistributed: Decimal,
    pub earnings: Vec<MemberEarning>,
}

// Stored share for a Done event. Rows that lost their share column get it
// recomputed from token and performers; rows that cannot be settled count as
// zero.
fn share_of(event: &PerformanceEvent) -> Option<Decimal> {
    if let Some(share) = event.shared_per_person {
        return Some(share);
    }
    match allocate(event.total_token?, &event.performers) {
        Ok(a) => Some(a.share_per_person),
        Err(e) => {
            log::warn!(
                "performance {} at {} is Done but has no usable share: {}",
                event.date,
                event.venue,
                e
            );
            None
        }
    }
}

/// Lifetime earnings per performer over the Done events in `events`.
///
/// Sorted by descending total; equal totals keep the order in which names
/// were first seen. Members who never played a Done gig are absent.
pub fn member_earnings(events: &[PerformanceEvent]) -> Vec<MemberEarning> {
    let mut earnings: Vec<MemberEarning> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for event in events.iter().filter(|e| e.status == EventStatus::Done) {
        let Some(share) = share_of(event) else {
            continue;
        };
        for name in event.performers.iter().map(|n| n.trim()) {
            if name.is_empty() {
                continue;
            }
            match seen.get(name).copied() {
                Some(i) => earnings[i].total += share,
                None => {
                    seen.insert(name.to_string(), earnings.len());
                    earnings.push(MemberEarning {
                        name: name.to_string(),
                        total: share,
                    });
                }
            }
        }
    }

    for e in earnings.iter_mut() {
        e.total = e.total.round_dp(TOKEN_DP);
    }
    // sort_by is stable, which keeps first-seen order among ties
    earnings.sort_by(|a, b| b.total.cmp(&a.total));
    earnings
}

pub fn summarize(events: &[PerformanceEvent]) -> LedgerSummary {
    let mut summary = LedgerSummary {
        done_events: 0,
        upcoming_events: 0,
        total_token: Decimal::ZERO,
        paid_to_performers: Decimal::ZERO,
        equipment_fund: Decimal::ZERO,
        undistributed: Decimal::ZERO,
        earnings: member_earnings(events),
    };

    for event in events {
        if event.status == EventStatus::Upcoming {
            summary.upcoming_events += 1;
            continue;
        }
        summary.done_events += 1;
        summary.total_token += event.total_token.unwrap_or_default();
        if let Some(share) = share_of(event) {
            summary.paid_to_performers += share * Decimal::from(event.performers.len());
            summary.equipment_fund += event.equipment_share.unwrap_or(share);
        }
    }
    summary.undistributed =
        summary.total_token - summary.paid_to_performers - summary.equipment_fund;
    summary
}
