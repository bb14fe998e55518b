use std::time::Duration;

use switchyard_core::{Aggregator, DashboardResponse, SubjectId};

use crate::cli::DashboardArgs;
use crate::error::CliError;

pub async fn run(
    args: &DashboardArgs,
    aggregator: &Aggregator,
) -> Result<DashboardResponse, CliError> {
    let subject = SubjectId::new(args.subject.trim());
    if subject.as_str().is_empty() {
        return Err(CliError::Usage(String::from("subject must not be blank")));
    }

    let dashboard = match args.deadline_ms {
        Some(deadline_ms) => {
            let deadline = tokio::time::sleep(Duration::from_millis(deadline_ms));
            aggregator.dashboard_until(&subject, deadline).await?
        }
        None => aggregator.dashboard(&subject).await?,
    };

    Ok(dashboard)
}
