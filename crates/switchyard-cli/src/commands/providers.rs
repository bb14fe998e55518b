use serde::Serialize;

use switchyard_core::{Aggregator, ProviderId, ProviderStats, TransportKind, UseCase};

use crate::cli::ProvidersArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderRow {
    name: ProviderId,
    transport: TransportKind,
    budget_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<ProviderStats>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersListing {
    use_case: &'static str,
    providers: Vec<ProviderRow>,
}

pub fn run(args: &ProvidersArgs, aggregator: &Aggregator) -> Result<ProvidersListing, CliError> {
    let use_case: UseCase = args.use_case.parse()?;
    let metrics = aggregator.metrics();

    let providers = aggregator
        .registry()
        .snapshot(use_case)
        .into_iter()
        .map(|snapshot| ProviderRow {
            name: snapshot.name,
            transport: snapshot.transport,
            budget_ms: snapshot.budget.get().as_millis(),
            limit: snapshot.limit,
            stats: args.stats.then(|| metrics.provider(snapshot.name)),
        })
        .collect();

    Ok(ProvidersListing {
        use_case: use_case.as_str(),
        providers,
    })
}
