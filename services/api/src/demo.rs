use crate::infra::{seed_demo_catalog, DEMO_CREATOR, DEMO_OFFER};
use affiliate_exchange::config::ApprovalConfig;
use affiliate_exchange::error::AppError;
use affiliate_exchange::marketplace::applications::{
    Application, ApplicationService, ApplicationServiceError, ApplicationSubmission,
    ApprovalPolicy, ApprovalWorker,
};
use affiliate_exchange::marketplace::tracking::{ClickMetadata, TrackingService};
use affiliate_exchange::marketplace::MarketplaceStore;
use chrono::Utc;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Optional pitch attached to the demo application.
    #[arg(long)]
    pub(crate) message: Option<String>,
    /// Preferred commission type (per_sale, per_lead, per_click, retainer, hybrid).
    #[arg(long)]
    pub(crate) commission: Option<String>,
    /// Number of simulated visitors following the issued link.
    #[arg(long, default_value_t = 3)]
    pub(crate) clicks: u32,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        message,
        commission,
        clicks,
    } = args;

    let store = Arc::new(MarketplaceStore::in_memory());
    seed_demo_catalog(&store)?;

    let service = Arc::new(ApplicationService::new(
        store.clone(),
        ApprovalPolicy::immediate(),
    ));
    let worker = ApprovalWorker::new(service.clone(), &ApprovalConfig::default());
    let tracking = TrackingService::new(store);

    println!("Affiliate exchange demo");

    let mut submission = ApplicationSubmission::new(DEMO_CREATOR, DEMO_OFFER);
    submission.message = message;
    submission.preferred_commission_type = commission;

    let application = match service.submit(submission) {
        Ok(application) => application,
        Err(err) => {
            println!("  Submission rejected: {}", err);
            return Ok(());
        }
    };
    println!("\nSubmitted");
    render_application(&application);

    let report = worker.run_once(Utc::now());
    println!(
        "\nApproval pass: {} approved, {} skipped, {} rescheduled, {} failed, {} abandoned",
        report.approved, report.skipped, report.rescheduled, report.failed, report.abandoned
    );

    let approved = match service.get(&application.id) {
        Ok(application) => application,
        Err(err) => {
            println!("  Application lookup failed: {}", err);
            return Ok(());
        }
    };
    render_application(&approved);

    let Some(code) = approved.tracking_code().cloned() else {
        println!("  No tracking link issued");
        return Ok(());
    };

    println!("\nSimulated clicks");
    for visitor in 0..clicks {
        let metadata = ClickMetadata {
            client_address: Some(format!("198.51.100.{}", visitor % 2 + 1)),
            user_agent: Some("affiliate-exchange-demo".to_string()),
            referrer: None,
        };
        match tracking.resolve(code.as_str(), metadata) {
            Ok(resolved) => println!(
                "  #{} -> 302 {} (clicks {}, unique {})",
                visitor + 1,
                resolved.destination_url,
                resolved.stats.click_count,
                resolved.stats.unique_click_count
            ),
            Err(err) => println!("  #{} -> {}", visitor + 1, err),
        }
    }

    report_transition("activate", service.activate(&application.id));
    report_transition("complete", service.complete(&application.id));

    match tracking.resolve(code.as_str(), ClickMetadata::default()) {
        Ok(_) => println!("  Link still redirects"),
        Err(err) => println!("  Link after completion: {}", err),
    }

    let payload = service
        .get(&application.id)
        .map_err(|err| err.to_string())
        .and_then(|application| {
            serde_json::to_string_pretty(&application.view()).map_err(|err| err.to_string())
        });
    match payload {
        Ok(json) => println!("\nFinal application payload:\n{}", json),
        Err(err) => println!("\nFinal application payload unavailable: {}", err),
    }

    Ok(())
}

fn report_transition(step: &str, result: Result<Application, ApplicationServiceError>) {
    match result {
        Ok(updated) => println!("\nStatus after {}: {}", step, updated.status),
        Err(err) => println!("\n{} failed: {}", step, err),
    }
}

fn render_application(application: &Application) {
    println!("  Application: {}", application.id);
    println!(
        "  Creator/offer: {} / {}",
        application.creator_id, application.offer_id
    );
    println!("  Status: {}", application.status);
    match &application.tracking {
        Some(tracking) => {
            println!("  Tracking code: {}", tracking.code);
            println!("  Tracking link: {}", tracking.link);
        }
        None => println!("  Tracking link: not issued yet"),
    }
}
