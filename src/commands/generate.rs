use crate::args::GenerateArgs;
use crate::commands::Out;
use crate::engine::{GenerationReport, Generator};
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use chrono::Local;
use tracing::warn;

/// Runs generation for every active rule and contract.
///
/// Failures that stop a single rule or contract are listed in the returned report and do not
/// make the command fail; the next run resumes from where that rule stopped.
///
/// # Errors
/// - Returns an `ErrorType::Fetch` error if rules, contracts or versions cannot be read.
pub async fn generate(config: &Config, args: &GenerateArgs) -> Result<Out<GenerationReport>> {
    let as_of = args.as_of().unwrap_or_else(|| Local::now().date_naive());
    let horizon_months = args.horizon_months().unwrap_or(config.horizon_months());
    let report = Generator::new(config.db())
        .with_horizon_months(horizon_months)
        .run(as_of)
        .await
        .pub_result(ErrorType::Fetch)?;
    for failure in &report.failures {
        warn!(
            "{} stopped at {}: {}",
            failure.subject, failure.period, failure.message
        );
    }
    Ok(Out::new(report.summary(), report))
}
