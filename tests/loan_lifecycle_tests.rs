//! Loan lifecycle state machine tests
//!
//! These tests validate the transition table and the repayment bookkeeping
//! invariants without a live database: `outstanding = amount_due -
//! amount_paid`, never negative; `amount_paid` monotone non-decreasing;
//! over-repayments capped and flagged.

use microlend_server::error::ApiError;
use microlend_server::loan::{
    disbursed_amount, ensure_transition, plan_repayment, LoanStatus,
};
use microlend_server::scoring::{compute_award, AwardInput, ScoreReason, ScoringPolicy};

use LoanStatus::*;

// ============================================================================
// Transition table
// ============================================================================

#[test]
fn test_allowed_transitions() {
    assert!(ensure_transition(Requested, Approved).is_ok());
    assert!(ensure_transition(Requested, Rejected).is_ok());
    assert!(ensure_transition(Approved, Disbursed).is_ok());
    assert!(ensure_transition(Disbursed, Repaying).is_ok());
    assert!(ensure_transition(Repaying, Repaying).is_ok());
    assert!(ensure_transition(Repaying, Completed).is_ok());
    assert!(ensure_transition(Repaying, Defaulted).is_ok());
}

#[test]
fn test_terminal_states_accept_nothing() {
    for terminal in [Rejected, Completed, Defaulted] {
        for target in [Requested, Approved, Disbursed, Repaying, Completed, Defaulted] {
            assert!(
                ensure_transition(terminal, target).is_err(),
                "{terminal} -> {target} must be rejected"
            );
        }
    }
}

#[test]
fn test_approve_on_disbursed_loan_fails() {
    let err = ensure_transition(Disbursed, Approved).unwrap_err();
    match err {
        ApiError::InvalidLoanTransition { from, to } => {
            assert_eq!(from, Disbursed);
            assert_eq!(to, Approved);
        }
        other => panic!("expected InvalidLoanTransition, got {other:?}"),
    }
}

#[test]
fn test_requested_cannot_skip_approval() {
    assert!(ensure_transition(Requested, Disbursed).is_err());
    assert!(ensure_transition(Requested, Repaying).is_err());
    assert!(ensure_transition(Requested, Completed).is_err());
}

// ============================================================================
// Disbursement arithmetic
// ============================================================================

#[test]
fn test_disbursed_amount_takes_interest_up_front() {
    assert_eq!(disbursed_amount(10_000, 1_500), 8_500);
    assert_eq!(disbursed_amount(50_000, 1_000), 45_000);
    assert_eq!(disbursed_amount(10_000, 0), 10_000);
}

// ============================================================================
// Repayment bookkeeping: a loan of 10_000 repaid in two installments
// ============================================================================

#[test]
fn test_two_installments_complete_the_loan() {
    // First repayment of 5_000: half the balance remains
    let first = plan_repayment(Repaying, 10_000, 0, 5_000).unwrap();
    assert_eq!(first.new_outstanding, 5_000);
    assert!(!first.completed);
    assert!(!first.over_repayment);

    let first_award = compute_award(
        &AwardInput {
            repayment_amount: first.amount_applied,
            days_elapsed: 3,
            is_full_repayment: first.completed,
        },
        &ScoringPolicy::default(),
    );
    assert_eq!(first_award.reason, ScoreReason::PartialRepayment);
    assert!(first_award.points > 0);

    // Second repayment of 5_000: balance reaches exactly zero
    let second = plan_repayment(Repaying, 10_000, first.new_amount_paid, 5_000).unwrap();
    assert_eq!(second.new_outstanding, 0);
    assert!(second.completed);

    let second_award = compute_award(
        &AwardInput {
            repayment_amount: second.amount_applied,
            days_elapsed: 10,
            is_full_repayment: second.completed,
        },
        &ScoringPolicy::default(),
    );
    assert_eq!(second_award.reason, ScoreReason::LoanCompleted);
}

#[test]
fn test_outstanding_invariant_holds_across_any_sequence() {
    let amount_due = 10_000;
    let mut paid = 0;
    for payment in [1, 999, 2_000, 3_500, 10_000] {
        let plan = plan_repayment(Repaying, amount_due, paid, payment).unwrap();
        assert_eq!(plan.new_outstanding, (amount_due - plan.new_amount_paid).max(0));
        assert!(plan.new_outstanding >= 0);
        assert!(plan.new_amount_paid >= paid, "amount_paid must never decrease");
        assert!(plan.new_amount_paid <= amount_due);
        paid = plan.new_amount_paid;
        if plan.completed {
            break;
        }
    }
    assert_eq!(paid, amount_due);
}

#[test]
fn test_over_repayment_capped_and_flagged() {
    let plan = plan_repayment(Repaying, 10_000, 8_000, 5_000).unwrap();
    assert!(plan.over_repayment);
    assert_eq!(plan.amount_applied, 2_000);
    assert_eq!(plan.new_amount_paid, 10_000);
    assert_eq!(plan.new_outstanding, 0);
    assert!(plan.completed);
}

#[test]
fn test_zero_and_negative_repayments_rejected() {
    for payment in [0, -1, -10_000] {
        let err = plan_repayment(Repaying, 10_000, 0, payment).unwrap_err();
        assert!(matches!(err, ApiError::InvalidAmount(_)));
    }
}

#[test]
fn test_repayment_rejected_outside_repayable_states() {
    for status in [Requested, Approved, Rejected, Completed, Defaulted] {
        let err = plan_repayment(status, 10_000, 0, 1_000).unwrap_err();
        assert!(
            matches!(err, ApiError::InvalidLoanTransition { .. }),
            "repayment in {status} must fail with a transition error"
        );
    }
}

#[test]
fn test_full_repayment_straight_from_disbursed() {
    let plan = plan_repayment(Disbursed, 10_000, 0, 10_000).unwrap();
    assert!(plan.completed);
    assert!(ensure_transition(Disbursed, Completed).is_ok());
}
