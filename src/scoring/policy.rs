//! Repayment scoring policy engine
//!
//! Pure functions mapping a repayment event to a point award, driven by
//! tiered multiplier tables held in the configuration store. Deterministic,
//! no I/O: the reconciliation processor feeds it inputs and persists the
//! outcome.

use serde::{Deserialize, Serialize};

use crate::scoring::ScoreReason;

/// Lower bound of the credit score range
pub const MIN_SCORE: i32 = 300;

/// Upper bound of the credit score range
pub const MAX_SCORE: i32 = 850;

/// One band of the amount multiplier table. `max_amount: None` marks the
/// open-ended top tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountTier {
    pub min_amount: i64,
    pub max_amount: Option<i64>,
    pub multiplier: f64,
}

/// One band of the duration multiplier table, in days elapsed since
/// disbursement. Earlier repayment earns the higher multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationTier {
    pub min_days: i64,
    pub max_days: Option<i64>,
    pub multiplier: f64,
}

/// Repayment scoring policy, decoded from the configuration store
/// (`category = 'credit_score'`, `key = 'repayment_scoring'`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringPolicy {
    pub base_points: i32,
    pub amount_multipliers: Vec<AmountTier>,
    pub duration_multipliers: Vec<DurationTier>,
    pub max_points_per_transaction: i32,
    pub enable_partial_repayments: bool,
    pub min_points_for_partial_repayment: i32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            base_points: 10,
            amount_multipliers: vec![
                AmountTier {
                    min_amount: 0,
                    max_amount: Some(999),
                    multiplier: 0.5,
                },
                AmountTier {
                    min_amount: 1_000,
                    max_amount: Some(4_999),
                    multiplier: 1.0,
                },
                AmountTier {
                    min_amount: 5_000,
                    max_amount: Some(9_999),
                    multiplier: 1.5,
                },
                AmountTier {
                    min_amount: 10_000,
                    max_amount: Some(49_999),
                    multiplier: 2.0,
                },
                AmountTier {
                    min_amount: 50_000,
                    max_amount: None,
                    multiplier: 2.5,
                },
            ],
            duration_multipliers: vec![
                DurationTier {
                    min_days: 0,
                    max_days: Some(7),
                    multiplier: 2.0,
                },
                DurationTier {
                    min_days: 8,
                    max_days: Some(14),
                    multiplier: 1.5,
                },
                DurationTier {
                    min_days: 15,
                    max_days: Some(30),
                    multiplier: 1.0,
                },
                DurationTier {
                    min_days: 31,
                    max_days: None,
                    multiplier: 0.5,
                },
            ],
            max_points_per_transaction: 50,
            enable_partial_repayments: true,
            min_points_for_partial_repayment: 5,
        }
    }
}

/// Credit limit step curve, decoded from the configuration store
/// (`category = 'credit_score'`, `key = 'limit_curve'`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitCurve {
    pub tiers: Vec<LimitTier>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitTier {
    pub min_score: i32,
    pub limit: i64,
}

impl Default for LimitCurve {
    fn default() -> Self {
        Self {
            tiers: vec![
                LimitTier {
                    min_score: 300,
                    limit: 10_000,
                },
                LimitTier {
                    min_score: 450,
                    limit: 25_000,
                },
                LimitTier {
                    min_score: 550,
                    limit: 50_000,
                },
                LimitTier {
                    min_score: 650,
                    limit: 100_000,
                },
                LimitTier {
                    min_score: 750,
                    limit: 200_000,
                },
            ],
        }
    }
}

impl LimitCurve {
    /// Limit for a score: the highest tier whose `min_score` the score
    /// reaches. Scores below every tier take the bottom tier.
    pub fn limit_for(&self, score: i32) -> i64 {
        let mut best: Option<&LimitTier> = None;
        for tier in &self.tiers {
            if tier.min_score <= score
                && best.map_or(true, |b| tier.min_score > b.min_score)
            {
                best = Some(tier);
            }
        }
        best.or_else(|| self.tiers.iter().min_by_key(|t| t.min_score))
            .map(|t| t.limit)
            .unwrap_or(0)
    }
}

/// Repayment event fed to the policy engine
#[derive(Debug, Clone, Copy)]
pub struct AwardInput {
    /// Amount applied to the loan balance
    pub repayment_amount: i64,
    /// Days between disbursement and this repayment
    pub days_elapsed: i64,
    /// The repayment brought the outstanding balance to exactly zero
    pub is_full_repayment: bool,
}

/// Computed award with the factors that produced it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardBreakdown {
    pub points: i32,
    pub base_points: i32,
    pub amount_multiplier: f64,
    pub duration_multiplier: f64,
    /// Points before the per-transaction cap and partial gating
    pub raw_points: i32,
    pub capped: bool,
    pub reason: ScoreReason,
}

// Tier lookup: the containing tier wins. A value above every configured
// range takes the highest tier whose lower bound it reaches; a value below
// every range clamps to the bottom tier.
fn amount_multiplier(tiers: &[AmountTier], amount: i64) -> f64 {
    if let Some(tier) = tiers
        .iter()
        .find(|t| amount >= t.min_amount && t.max_amount.map_or(true, |max| amount <= max))
    {
        return tier.multiplier;
    }
    tiers
        .iter()
        .filter(|t| t.min_amount <= amount)
        .max_by_key(|t| t.min_amount)
        .or_else(|| tiers.iter().min_by_key(|t| t.min_amount))
        .map(|t| t.multiplier)
        .unwrap_or(1.0)
}

fn duration_multiplier(tiers: &[DurationTier], days: i64) -> f64 {
    if let Some(tier) = tiers
        .iter()
        .find(|t| days >= t.min_days && t.max_days.map_or(true, |max| days <= max))
    {
        return tier.multiplier;
    }
    tiers
        .iter()
        .filter(|t| t.min_days <= days)
        .max_by_key(|t| t.min_days)
        .or_else(|| tiers.iter().min_by_key(|t| t.min_days))
        .map(|t| t.multiplier)
        .unwrap_or(1.0)
}

/// Compute the point award for a repayment event.
///
/// `raw = base_points * amount_multiplier * duration_multiplier`, rounded,
/// then capped at `max_points_per_transaction`. Partial repayments award
/// nothing when the policy disables them, and floor to zero below
/// `min_points_for_partial_repayment`. Zero-point awards are still recorded
/// by the caller for audit continuity.
pub fn compute_award(input: &AwardInput, policy: &ScoringPolicy) -> AwardBreakdown {
    // Negative elapsed time (clock skew, missing disbursement stamp) clamps
    // to day zero rather than falling outside every tier.
    let days = input.days_elapsed.max(0);

    let amount_mult = amount_multiplier(&policy.amount_multipliers, input.repayment_amount);
    let duration_mult = duration_multiplier(&policy.duration_multipliers, days);

    let raw = (policy.base_points as f64 * amount_mult * duration_mult).round() as i32;
    let capped = raw > policy.max_points_per_transaction;
    let mut points = raw.min(policy.max_points_per_transaction);

    let is_partial = !input.is_full_repayment;
    if is_partial {
        if !policy.enable_partial_repayments {
            points = 0;
        } else if points < policy.min_points_for_partial_repayment {
            points = 0;
        }
    }

    let reason = if input.is_full_repayment {
        ScoreReason::LoanCompleted
    } else {
        ScoreReason::PartialRepayment
    };

    AwardBreakdown {
        points,
        base_points: policy.base_points,
        amount_multiplier: amount_mult,
        duration_multiplier: duration_mult,
        raw_points: raw,
        capped,
        reason,
    }
}

/// Clamp a score into the policy bounds
pub fn clamp_score(score: i64) -> i32 {
    score.clamp(MIN_SCORE as i64, MAX_SCORE as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn award(amount: i64, days: i64, full: bool) -> AwardBreakdown {
        compute_award(
            &AwardInput {
                repayment_amount: amount,
                days_elapsed: days,
                is_full_repayment: full,
            },
            &ScoringPolicy::default(),
        )
    }

    #[test]
    fn test_tier_selection_is_deterministic() {
        let a = award(5_000, 3, false);
        let b = award(5_000, 3, false);
        assert_eq!(a.points, b.points);
        assert_eq!(a.reason, b.reason);
    }

    #[test]
    fn test_partial_repayment_mid_tier() {
        // 5_000 sits in the 1.5x amount band; day 3 in the 2.0x duration band
        let breakdown = award(5_000, 3, false);
        assert_eq!(breakdown.amount_multiplier, 1.5);
        assert_eq!(breakdown.duration_multiplier, 2.0);
        assert_eq!(breakdown.points, 30);
        assert_eq!(breakdown.reason, ScoreReason::PartialRepayment);
    }

    #[test]
    fn test_full_repayment_reason() {
        let breakdown = award(5_000, 3, true);
        assert_eq!(breakdown.reason, ScoreReason::LoanCompleted);
        assert!(breakdown.points > 0);
    }

    #[test]
    fn test_cap_applies() {
        // 100_000 at day 0: 10 * 2.5 * 2.0 = 50, exactly the cap
        let at_cap = award(100_000, 0, true);
        assert_eq!(at_cap.points, 50);
        assert!(!at_cap.capped);

        let policy = ScoringPolicy {
            max_points_per_transaction: 20,
            ..ScoringPolicy::default()
        };
        let capped = compute_award(
            &AwardInput {
                repayment_amount: 100_000,
                days_elapsed: 0,
                is_full_repayment: true,
            },
            &policy,
        );
        assert_eq!(capped.points, 20);
        assert!(capped.capped);
    }

    #[test]
    fn test_partials_disabled_award_zero() {
        let policy = ScoringPolicy {
            enable_partial_repayments: false,
            ..ScoringPolicy::default()
        };
        let breakdown = compute_award(
            &AwardInput {
                repayment_amount: 100,
                days_elapsed: 1,
                is_full_repayment: false,
            },
            &policy,
        );
        assert_eq!(breakdown.points, 0);
        assert_eq!(breakdown.reason, ScoreReason::PartialRepayment);
    }

    #[test]
    fn test_small_partial_floors_to_zero() {
        // 100 at day 40: 10 * 0.5 * 0.5 = 2.5 -> 3, below the floor of 5
        let breakdown = award(100, 40, false);
        assert_eq!(breakdown.points, 0);
        assert_eq!(breakdown.raw_points, 3);
    }

    #[test]
    fn test_full_repayment_not_floored() {
        // Same computation as above, but a full repayment keeps its points
        let breakdown = award(100, 40, true);
        assert_eq!(breakdown.points, 3);
    }

    #[test]
    fn test_amount_above_top_tier_uses_top_tier() {
        let breakdown = award(10_000_000, 0, true);
        assert_eq!(breakdown.amount_multiplier, 2.5);
    }

    #[test]
    fn test_negative_days_clamp_to_day_zero() {
        let breakdown = award(5_000, -4, false);
        assert_eq!(breakdown.duration_multiplier, 2.0);
    }

    #[test]
    fn test_days_beyond_last_tier_use_last_tier() {
        let breakdown = award(5_000, 400, false);
        assert_eq!(breakdown.duration_multiplier, 0.5);
    }

    #[test]
    fn test_amount_below_all_tiers_clamps_to_bottom() {
        let policy = ScoringPolicy {
            amount_multipliers: vec![
                AmountTier {
                    min_amount: 1_000,
                    max_amount: Some(4_999),
                    multiplier: 1.0,
                },
                AmountTier {
                    min_amount: 5_000,
                    max_amount: None,
                    multiplier: 1.5,
                },
            ],
            ..ScoringPolicy::default()
        };
        let breakdown = compute_award(
            &AwardInput {
                repayment_amount: 50,
                days_elapsed: 0,
                is_full_repayment: true,
            },
            &policy,
        );
        assert_eq!(breakdown.amount_multiplier, 1.0);
    }

    #[test]
    fn test_clamp_score_bounds() {
        assert_eq!(clamp_score(200), MIN_SCORE);
        assert_eq!(clamp_score(500), 500);
        assert_eq!(clamp_score(9_000), MAX_SCORE);
    }

    #[test]
    fn test_limit_curve_steps() {
        let curve = LimitCurve::default();
        assert_eq!(curve.limit_for(300), 10_000);
        assert_eq!(curve.limit_for(500), 25_000);
        assert_eq!(curve.limit_for(650), 100_000);
        assert_eq!(curve.limit_for(850), 200_000);
        // Below the bottom tier clamps to it
        assert_eq!(curve.limit_for(100), 10_000);
    }

    #[test]
    fn test_limit_curve_monotonic() {
        let curve = LimitCurve::default();
        let mut prev = 0;
        for score in (300..=850).step_by(10) {
            let limit = curve.limit_for(score);
            assert!(limit >= prev, "curve must be non-decreasing");
            prev = limit;
        }
    }
}
