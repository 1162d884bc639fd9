use crate::infra::LendingService;
use clap::Args;
use loanflow::config::ConfigError;
use loanflow::error::AppError;
use loanflow::workflows::lending::{
    ApplicationSubmission, AuditStore, DecisionConfig, DecisionEngine, Education, Gender,
    HomeOwnership, IdentityStore, InMemoryAuditStore, InMemoryIdentityStore,
    LoanApplicationService, LoanIntent, LoanRequest, StoreTimeouts,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Approval threshold for the demo decision (defaults to 0.75).
    #[arg(long)]
    pub(crate) threshold: Option<f64>,
    /// Annual applicant income. Defaults to 60000.
    #[arg(long)]
    pub(crate) income: Option<f64>,
    /// Requested loan amount. Defaults to 15000.
    #[arg(long)]
    pub(crate) loan_amount: Option<f64>,
    /// Mark the applicant as having defaulted on a previous loan.
    #[arg(long)]
    pub(crate) previous_defaults: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        threshold,
        income,
        loan_amount,
        previous_defaults,
    } = args;

    let decision = match threshold {
        Some(value) => DecisionConfig::new(value)
            .map_err(|_| ConfigError::InvalidThreshold(value.to_string()))?,
        None => DecisionConfig::default(),
    };

    let audit = Arc::new(InMemoryAuditStore::default());
    let identity: Arc<dyn IdentityStore> = Arc::new(InMemoryIdentityStore::default());
    let audit_store: Arc<dyn AuditStore> = audit.clone();
    let service: LendingService = LoanApplicationService::new(
        identity,
        audit_store,
        Arc::new(DecisionEngine::new(decision)),
        StoreTimeouts::default(),
    );

    println!("Loan lifecycle demo (in-memory stores)");
    let submission = demo_submission(
        income.unwrap_or(60_000.0),
        loan_amount.unwrap_or(15_000.0),
        previous_defaults,
    );

    let created = match service.create_application(submission).await {
        Ok(created) => created,
        Err(err) => {
            println!("  Submission rejected: {err}");
            return Ok(());
        }
    };
    let Some(loan) = created.record.loans.first().cloned() else {
        println!("  Identity store returned the person without a loan");
        return Ok(());
    };
    println!(
        "- Stored person {} with loan {} -> status {}",
        created.record.person_id, loan.loan_id, loan.loan_status
    );
    println!(
        "  Loan-to-income ratio: {:.2}",
        loan.terms.loan_percent_income
    );

    let evaluation = service.evaluate(loan.loan_id).await?;
    println!(
        "- Decision: {} (audit {})",
        evaluation.outcome.summary,
        if evaluation.loan.is_partial() {
            "stale"
        } else {
            "synced"
        }
    );

    let outcome = service.reconcile(loan.loan_id).await?;
    match serde_json::to_string(&outcome) {
        Ok(json) => println!("- Reconciliation: {json}"),
        Err(err) => println!("- Reconciliation payload unavailable: {err}"),
    }

    for snapshot in audit.documents() {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => println!("  Audit snapshot:\n{json}"),
            Err(err) => println!("  Audit snapshot unavailable: {err}"),
        }
    }

    Ok(())
}

fn demo_submission(income: f64, loan_amount: f64, previous_defaults: bool) -> ApplicationSubmission {
    ApplicationSubmission {
        age: 30,
        gender: Gender::Female,
        education: Education::Bachelor,
        income,
        employment_experience: 5,
        home_ownership: HomeOwnership::Rent,
        credit_score: 720,
        credit_history_length: 6,
        loan: LoanRequest {
            loan_amount,
            loan_interest_rate: 11.5,
            loan_intent: LoanIntent::Education,
            previous_loan_defaults: previous_defaults,
        },
    }
}
