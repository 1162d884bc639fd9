use super::common::*;
use crate::workflows::lending::domain::LoanStatus;
use crate::workflows::lending::intake::{
    loan_to_income_ratio, require_terminal, IntakeGuard, IntakePolicy, ValidationError,
};

#[test]
fn ratio_is_zero_when_income_is_zero() {
    assert_eq!(loan_to_income_ratio(5_000.0, 0.0), 0.0);
    assert!(!loan_to_income_ratio(5_000.0, 0.0).is_nan());
}

#[test]
fn prepare_derives_loan_to_income_ratio() {
    let prepared = IntakeGuard::default()
        .prepare(submission())
        .expect("valid submission");

    assert_eq!(prepared.loan.loan_percent_income, 0.25);
    assert_eq!(prepared.applicant.income, 60_000.0);
    assert_eq!(prepared.loan.loan_amount, 15_000.0);
}

#[test]
fn prepare_accepts_zero_income() {
    let prepared = IntakeGuard::default()
        .prepare(zero_income_submission())
        .expect("zero income is valid");

    assert_eq!(prepared.loan.loan_percent_income, 0.0);
}

#[test]
fn prepare_rejects_negative_income() {
    let mut submission = submission();
    submission.income = -1.0;

    match IntakeGuard::default().prepare(submission) {
        Err(ValidationError::InvalidAmount { field, .. }) => assert_eq!(field, "income"),
        other => panic!("expected invalid income, got {other:?}"),
    }
}

#[test]
fn prepare_rejects_non_finite_loan_amount() {
    let mut submission = submission();
    submission.loan.loan_amount = f64::NAN;

    match IntakeGuard::default().prepare(submission) {
        Err(ValidationError::InvalidAmount { field, .. }) => assert_eq!(field, "loan_amount"),
        other => panic!("expected invalid loan amount, got {other:?}"),
    }
}

#[test]
fn prepare_enforces_policy_age_window() {
    let guard = IntakeGuard::with_policy(IntakePolicy::new(21, 70));
    let mut submission = submission();
    submission.age = 19;

    match guard.prepare(submission) {
        Err(ValidationError::AgeOutOfRange { found, min, max }) => {
            assert_eq!((found, min, max), (19, 21, 70));
        }
        other => panic!("expected age violation, got {other:?}"),
    }
}

#[test]
fn inverted_policy_falls_back_to_defaults() {
    let guard = IntakeGuard::with_policy(IntakePolicy::new(70, 21));
    let mut youngest = submission();
    youngest.age = 18;
    guard.prepare(youngest).expect("default window admits 18");

    let mut oldest = submission();
    oldest.age = 121;
    match guard.prepare(oldest) {
        Err(ValidationError::AgeOutOfRange { min, max, .. }) => assert_eq!((min, max), (18, 120)),
        other => panic!("expected age violation, got {other:?}"),
    }
}

#[test]
fn prepare_rejects_ratio_that_overflows() {
    let mut submission = submission();
    submission.income = 1e-300;
    submission.loan.loan_amount = 1e20;

    match IntakeGuard::default().prepare(submission) {
        Err(ValidationError::UnboundedRatio {
            loan_amount,
            income,
        }) => {
            assert_eq!(loan_amount, 1e20);
            assert_eq!(income, 1e-300);
        }
        other => panic!("expected unbounded ratio, got {other:?}"),
    }
}

#[test]
fn prepare_rejects_credit_score_outside_scale() {
    let mut submission = submission();
    submission.credit_score = 900;

    assert!(matches!(
        IntakeGuard::default().prepare(submission),
        Err(ValidationError::CreditScoreOutOfRange(900))
    ));
}

#[test]
fn prepare_rejects_experience_longer_than_life() {
    let mut submission = submission();
    submission.employment_experience = 31;

    match IntakeGuard::default().prepare(submission) {
        Err(ValidationError::TenureExceedsAge { field, years, age }) => {
            assert_eq!(field, "employment_experience");
            assert_eq!((years, age), (31, 30));
        }
        other => panic!("expected tenure violation, got {other:?}"),
    }
}

#[test]
fn prepare_rejects_interest_rate_above_hundred_percent() {
    let mut submission = submission();
    submission.loan.loan_interest_rate = 140.0;

    assert!(matches!(
        IntakeGuard::default().prepare(submission),
        Err(ValidationError::InterestRateOutOfRange(_))
    ));
}

#[test]
fn only_terminal_statuses_are_transition_targets() {
    assert_eq!(
        require_terminal(LoanStatus::Approved),
        Ok(LoanStatus::Approved)
    );
    assert_eq!(
        require_terminal(LoanStatus::Rejected),
        Ok(LoanStatus::Rejected)
    );
    assert_eq!(
        require_terminal(LoanStatus::Pending),
        Err(ValidationError::NonTerminalTarget(LoanStatus::Pending))
    );
}

#[test]
fn only_decided_statuses_are_terminal() {
    assert!(!LoanStatus::Pending.is_terminal());
    assert!(LoanStatus::Approved.is_terminal());
    assert!(LoanStatus::Rejected.is_terminal());
}

#[test]
fn status_parses_exact_labels() {
    assert_eq!("Approved".parse::<LoanStatus>(), Ok(LoanStatus::Approved));
    assert_eq!(" Pending ".parse::<LoanStatus>(), Ok(LoanStatus::Pending));
    assert!("approved".parse::<LoanStatus>().is_err());
}
