//! Loan lifecycle state machine
//!
//! Pure transition and repayment bookkeeping logic. No I/O here: the service
//! layer loads rows, calls into this module, and persists the outcome inside
//! its transaction.

use serde::Serialize;

use crate::error::ApiError;
use crate::loan::LoanStatus;

impl LoanStatus {
    /// The allowed transition table.
    ///
    /// `Disbursed -> Completed` is the compressed form of
    /// `Disbursed -> Repaying -> Completed` for a single repayment that
    /// settles the full balance before any partial payment arrived.
    pub fn can_transition_to(self, to: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, to),
            (Requested, Approved)
                | (Requested, Rejected)
                | (Approved, Disbursed)
                | (Disbursed, Repaying)
                | (Disbursed, Completed)
                | (Repaying, Repaying)
                | (Repaying, Completed)
                | (Repaying, Defaulted)
        )
    }
}

/// Validate a transition, failing with the current and attempted states.
/// Callers never retry this error automatically.
pub fn ensure_transition(from: LoanStatus, to: LoanStatus) -> Result<(), ApiError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(ApiError::InvalidLoanTransition { from, to })
    }
}

/// Principal handed to the borrower after interest is taken up front:
/// `amount - amount * bps / 10_000`, the integer-exact form of
/// `amount * (1 - rate / 100)` with rate% = bps / 100.
pub fn disbursed_amount(amount: i64, interest_rate_bps: i32) -> i64 {
    amount - amount * i64::from(interest_rate_bps) / 10_000
}

/// Outcome of applying a repayment to a loan's balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepaymentPlan {
    /// Portion of the submitted payment applied to the balance
    pub amount_applied: i64,
    pub new_amount_paid: i64,
    pub new_outstanding: i64,
    /// The repayment settled the balance exactly to zero
    pub completed: bool,
    /// The submitted payment exceeded the remaining balance; internal state
    /// was capped at `amount_due` and the excess flagged for auditing
    pub over_repayment: bool,
}

/// Compute the balance bookkeeping for a repayment of `payment` against a
/// loan with the given `amount_due` / `amount_paid`.
///
/// Valid only while the loan is `Disbursed` or `Repaying`; the caller checks
/// status. Rejects non-positive payments before any state is touched.
pub fn plan_repayment(
    status: LoanStatus,
    amount_due: i64,
    amount_paid: i64,
    payment: i64,
) -> Result<RepaymentPlan, ApiError> {
    if !matches!(status, LoanStatus::Disbursed | LoanStatus::Repaying) {
        return Err(ApiError::InvalidLoanTransition {
            from: status,
            to: LoanStatus::Repaying,
        });
    }
    if payment <= 0 {
        return Err(ApiError::InvalidAmount(format!(
            "repayment must be positive, got {}",
            payment
        )));
    }

    let remaining = (amount_due - amount_paid).max(0);
    let over_repayment = payment > remaining;
    let amount_applied = payment.min(remaining);
    let new_amount_paid = amount_paid + amount_applied;
    let new_outstanding = amount_due - new_amount_paid;

    Ok(RepaymentPlan {
        amount_applied,
        new_amount_paid,
        new_outstanding,
        completed: new_outstanding == 0,
        over_repayment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use LoanStatus::*;

    #[test]
    fn test_transition_table() {
        assert!(Requested.can_transition_to(Approved));
        assert!(Requested.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Disbursed));
        assert!(Disbursed.can_transition_to(Repaying));
        assert!(Repaying.can_transition_to(Completed));
        assert!(Repaying.can_transition_to(Defaulted));

        assert!(!Requested.can_transition_to(Disbursed));
        assert!(!Disbursed.can_transition_to(Approved));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Completed.can_transition_to(Repaying));
        assert!(!Defaulted.can_transition_to(Repaying));
    }

    #[test]
    fn test_ensure_transition_error_carries_states() {
        let err = ensure_transition(Disbursed, Approved).unwrap_err();
        match err {
            ApiError::InvalidLoanTransition { from, to } => {
                assert_eq!(from, Disbursed);
                assert_eq!(to, Approved);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_disbursed_amount() {
        // 15% up-front interest on 10_000
        assert_eq!(disbursed_amount(10_000, 1_500), 8_500);
        assert_eq!(disbursed_amount(10_000, 0), 10_000);
        assert_eq!(disbursed_amount(1, 1_500), 1);
    }

    #[test]
    fn test_partial_repayment() {
        let plan = plan_repayment(Repaying, 10_000, 0, 5_000).unwrap();
        assert_eq!(plan.amount_applied, 5_000);
        assert_eq!(plan.new_amount_paid, 5_000);
        assert_eq!(plan.new_outstanding, 5_000);
        assert!(!plan.completed);
        assert!(!plan.over_repayment);
    }

    #[test]
    fn test_full_repayment_completes() {
        let plan = plan_repayment(Repaying, 10_000, 5_000, 5_000).unwrap();
        assert_eq!(plan.new_amount_paid, 10_000);
        assert_eq!(plan.new_outstanding, 0);
        assert!(plan.completed);
        assert!(!plan.over_repayment);
    }

    #[test]
    fn test_over_repayment_caps_and_flags() {
        let plan = plan_repayment(Repaying, 10_000, 9_000, 5_000).unwrap();
        assert_eq!(plan.amount_applied, 1_000);
        assert_eq!(plan.new_amount_paid, 10_000);
        assert_eq!(plan.new_outstanding, 0);
        assert!(plan.completed);
        assert!(plan.over_repayment);
    }

    #[test]
    fn test_non_positive_payment_rejected() {
        assert!(plan_repayment(Repaying, 10_000, 0, 0).is_err());
        assert!(plan_repayment(Repaying, 10_000, 0, -5).is_err());
    }

    #[test]
    fn test_repayment_requires_disbursed_or_repaying() {
        assert!(plan_repayment(Requested, 10_000, 0, 100).is_err());
        assert!(plan_repayment(Approved, 10_000, 0, 100).is_err());
        assert!(plan_repayment(Completed, 10_000, 10_000, 100).is_err());
        assert!(plan_repayment(Disbursed, 10_000, 0, 100).is_ok());
    }

    #[test]
    fn test_amount_paid_monotonic() {
        let mut paid = 0;
        for payment in [1_000, 2_500, 4_000, 9_999] {
            let plan = plan_repayment(Repaying, 10_000, paid, payment).unwrap();
            assert!(plan.new_amount_paid >= paid);
            assert_eq!(plan.new_outstanding, (10_000 - plan.new_amount_paid).max(0));
            paid = plan.new_amount_paid;
        }
        assert_eq!(paid, 10_000);
    }
}
