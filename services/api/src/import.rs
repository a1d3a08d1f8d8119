use crate::infra::InMemoryEngagementRepository;
use clap::Args;
use engagement_tracker::error::AppError;
use engagement_tracker::workflows::engagement::{
    EngagementDashboard, EngagementService, OwnerId, ScoringConfig, UploadReport,
    WeightConfiguration,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV analytics export to score
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Owner the imported records are attributed to
    #[arg(long, default_value = "cli")]
    pub(crate) owner: String,
    /// Points per like (default 1)
    #[arg(long)]
    pub(crate) like: Option<u32>,
    /// Points per retweet (default 2)
    #[arg(long)]
    pub(crate) retweet: Option<u32>,
    /// Points per reply (default 3)
    #[arg(long)]
    pub(crate) reply: Option<u32>,
    /// Points per mention (default 1)
    #[arg(long)]
    pub(crate) mention: Option<u32>,
    /// Number of top posts to print
    #[arg(long, default_value_t = 10)]
    pub(crate) top: usize,
}

impl ImportArgs {
    fn weights(&self) -> WeightConfiguration {
        let defaults = WeightConfiguration::default();
        WeightConfiguration::new(
            self.like.unwrap_or(defaults.like),
            self.retweet.unwrap_or(defaults.retweet),
            self.reply.unwrap_or(defaults.reply),
            self.mention.unwrap_or(defaults.mention),
        )
    }
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let raw = std::fs::read(&args.csv)?;
    let owner_id = OwnerId(args.owner.clone());
    let service = EngagementService::new(
        Arc::new(InMemoryEngagementRepository::default()),
        ScoringConfig::default(),
    );

    service.set_weights(&owner_id, args.weights())?;
    let report = service.upload(&owner_id, &raw)?;
    let dashboard = service.dashboard(&owner_id, Some(args.top))?;

    println!("Engagement import: {}", args.csv.display());
    render_report(&report);
    render_dashboard(&dashboard);
    Ok(())
}

fn render_report(report: &UploadReport) {
    println!("  Layout: {:?}", report.layout);
    println!(
        "  Records processed: {} (stored {}, superseded duplicates {}, storage failures {})",
        report.records_processed,
        report.records_stored,
        report.duplicates_superseded,
        report.storage_failures
    );
    if report.errors.is_empty() {
        println!("  Row errors: none");
    } else {
        println!("  Row errors:");
        for message in report.error_messages() {
            println!("    - {message}");
        }
    }
}

fn render_dashboard(dashboard: &EngagementDashboard) {
    let weights = dashboard.weights;
    println!(
        "\nPoint values: like {} / retweet {} / reply {} / mention {}",
        weights.like, weights.retweet, weights.reply, weights.mention
    );
    println!(
        "Total score {} across {} posts",
        dashboard.total_score, dashboard.record_count
    );
    if dashboard.posts.is_empty() {
        return;
    }

    println!("Top posts:");
    for (rank, record) in dashboard.posts.iter().enumerate() {
        let posted = record
            .posted_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "undated".to_string());
        let text = record.text.as_deref().unwrap_or("(no text)");
        println!(
            "  {:>2}. [{}] {} ({posted}) score {}",
            rank + 1,
            record.post_id.0,
            text,
            record.engagement_score
        );
        println!(
            "      likes {} / retweets {} / replies {} / mentions {}",
            record.counts.likes,
            record.counts.retweets,
            record.counts.replies,
            record.counts.mentions
        );
    }
}
