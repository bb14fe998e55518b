//! Aggregator configuration.
//!
//! Loaded from an optional JSON file (every field defaulted), then
//! overridden from the environment:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `SWITCHYARD_TRANSPORT` | default transport (`rest`, `graphql`, `grpc`, `mock`) |
//! | `SWITCHYARD_OUTBOUND_WORKERS` | outbound runtime worker threads |
//! | `SWITCHYARD_<PROVIDER>_URL` | URL for the provider's effective transport |
//! | `SWITCHYARD_<PROVIDER>_BUDGET_MS` | provider timeout budget |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregator::Aggregator;
use crate::pool::{OutboundPool, PoolSettings};
use crate::registry::{
    Budget, ProviderPolicy, ProviderRegistry, Upstreams, DEFAULT_BILLING_LIMIT,
    DEFAULT_CATALOG_LIMIT,
};
use crate::transport::{
    GraphQlSource, GrpcSource, HttpClient, ProviderEndpoints, ReqwestHttpClient, RestSource,
    ScriptedSource, TransportKind, UpstreamSource,
};
use crate::{ConfigError, ProviderId, SubjectDirectory, SubjectResolver, ValidationError};

/// Call policy and endpoints of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderConfig {
    pub budget_ms: u64,
    /// Overrides the top-level transport for this provider.
    pub transport: Option<TransportKind>,
    pub limit: Option<usize>,
    pub rest_url: String,
    pub graphql_url: String,
    pub grpc_url: String,
}

impl ProviderConfig {
    fn with_urls(rest_url: &str, graphql_url: &str, grpc_url: &str) -> Self {
        Self {
            budget_ms: 1_000,
            transport: None,
            limit: None,
            rest_url: rest_url.to_owned(),
            graphql_url: graphql_url.to_owned(),
            grpc_url: grpc_url.to_owned(),
        }
    }

    pub fn url_for(&self, transport: TransportKind) -> Option<&str> {
        match transport {
            TransportKind::Rest => Some(self.rest_url.as_str()),
            TransportKind::Graphql => Some(self.graphql_url.as_str()),
            TransportKind::Grpc => Some(self.grpc_url.as_str()),
            TransportKind::Mock => None,
        }
    }

    fn url_for_mut(&mut self, transport: TransportKind) -> Option<&mut String> {
        match transport {
            TransportKind::Rest => Some(&mut self.rest_url),
            TransportKind::Graphql => Some(&mut self.graphql_url),
            TransportKind::Grpc => Some(&mut self.grpc_url),
            TransportKind::Mock => None,
        }
    }
}

/// Fields present in a config file block. Absent fields keep the
/// provider's own default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderPatch {
    budget_ms: Option<u64>,
    transport: Option<TransportKind>,
    limit: Option<usize>,
    rest_url: Option<String>,
    graphql_url: Option<String>,
    grpc_url: Option<String>,
}

impl ProviderPatch {
    fn apply(self, base: &mut ProviderConfig) {
        if let Some(budget_ms) = self.budget_ms {
            base.budget_ms = budget_ms;
        }
        if self.transport.is_some() {
            base.transport = self.transport;
        }
        if self.limit.is_some() {
            base.limit = self.limit;
        }
        if let Some(url) = self.rest_url {
            base.rest_url = url;
        }
        if let Some(url) = self.graphql_url {
            base.graphql_url = url;
        }
        if let Some(url) = self.grpc_url {
            base.grpc_url = url;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProvidersPatch {
    profiles: Option<ProviderPatch>,
    subscription: Option<ProviderPatch>,
    billing: Option<ProviderPatch>,
    catalog: Option<ProviderPatch>,
}

impl From<ProvidersPatch> for ProvidersConfig {
    fn from(patch: ProvidersPatch) -> Self {
        let mut config = Self::default();
        let blocks = [
            (ProviderId::Profiles, patch.profiles),
            (ProviderId::Subscription, patch.subscription),
            (ProviderId::Billing, patch.billing),
            (ProviderId::Catalog, patch.catalog),
        ];
        for (provider, block) in blocks {
            if let Some(block) = block {
                block.apply(config.get_mut(provider));
            }
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProvidersPatch")]
pub struct ProvidersConfig {
    pub profiles: ProviderConfig,
    pub subscription: ProviderConfig,
    pub billing: ProviderConfig,
    pub catalog: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            profiles: ProviderConfig::with_urls(
                "http://profile-service:9300",
                "http://profile-service:9002",
                "http://profile-service:9301",
            ),
            subscription: ProviderConfig::with_urls(
                "http://subscription-and-billing-service:9400",
                "http://subscription-and-billing-service:9100",
                "http://subscription-and-billing-service:9101",
            ),
            billing: ProviderConfig {
                limit: Some(DEFAULT_BILLING_LIMIT),
                ..ProviderConfig::with_urls(
                    "http://subscription-and-billing-service:9100",
                    "http://subscription-and-billing-service:9100",
                    "http://subscription-and-billing-service:9101",
                )
            },
            catalog: ProviderConfig {
                limit: Some(DEFAULT_CATALOG_LIMIT),
                ..ProviderConfig::with_urls(
                    "http://content-management-service:9200",
                    "http://content-management-service:9200",
                    "http://content-management-service:9201",
                )
            },
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, provider: ProviderId) -> &ProviderConfig {
        match provider {
            ProviderId::Profiles => &self.profiles,
            ProviderId::Subscription => &self.subscription,
            ProviderId::Billing => &self.billing,
            ProviderId::Catalog => &self.catalog,
        }
    }

    pub fn get_mut(&mut self, provider: ProviderId) -> &mut ProviderConfig {
        match provider {
            ProviderId::Profiles => &mut self.profiles,
            ProviderId::Subscription => &mut self.subscription,
            ProviderId::Billing => &mut self.billing,
            ProviderId::Catalog => &mut self.catalog,
        }
    }
}

/// Top-level configuration of the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub outbound: PoolSettings,
    pub transport: TransportKind,
    pub providers: ProvidersConfig,
    /// JSON array of subject identities. The built-in demo directory is used
    /// when absent.
    pub subjects_path: Option<PathBuf>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            outbound: PoolSettings::default(),
            transport: TransportKind::Rest,
            providers: ProvidersConfig::default(),
            subjects_path: None,
        }
    }
}

impl AggregatorConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// File (when given), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_env_from(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides read through `lookup`.
    pub fn apply_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup("SWITCHYARD_TRANSPORT") {
            self.transport = value.parse()?;
        }

        if let Some(value) = lookup("SWITCHYARD_OUTBOUND_WORKERS") {
            self.outbound.worker_threads = parse_env("SWITCHYARD_OUTBOUND_WORKERS", &value)?;
        }

        for provider in ProviderId::ALL {
            let prefix = format!("SWITCHYARD_{}", provider.as_str().to_ascii_uppercase());
            let transport = self.transport_for(provider);
            let provider_config = self.providers.get_mut(provider);

            let budget_var = format!("{prefix}_BUDGET_MS");
            if let Some(value) = lookup(&budget_var) {
                provider_config.budget_ms = parse_env(&budget_var, &value)?;
            }

            if let Some(value) = lookup(&format!("{prefix}_URL")) {
                if let Some(url) = provider_config.url_for_mut(transport) {
                    *url = value;
                }
            }
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.outbound.validate()?;
        for provider in ProviderId::ALL {
            self.budget_for(provider)?;
        }
        Ok(())
    }

    /// Forces every provider onto the in-process scripted transport.
    pub fn with_mock_transport(mut self) -> Self {
        self.transport = TransportKind::Mock;
        for provider in ProviderId::ALL {
            self.providers.get_mut(provider).transport = None;
        }
        self
    }

    pub fn transport_for(&self, provider: ProviderId) -> TransportKind {
        self.providers
            .get(provider)
            .transport
            .unwrap_or(self.transport)
    }

    pub fn budget_for(&self, provider: ProviderId) -> Result<Budget, ValidationError> {
        Budget::from_millis(self.providers.get(provider).budget_ms).ok_or(
            ValidationError::ZeroBudget {
                provider: provider.as_str(),
            },
        )
    }

    pub fn endpoints(&self, transport: TransportKind) -> ProviderEndpoints {
        let url = |provider| {
            self.providers
                .get(provider)
                .url_for(transport)
                .unwrap_or_default()
                .to_owned()
        };
        ProviderEndpoints {
            profiles: url(ProviderId::Profiles),
            subscription: url(ProviderId::Subscription),
            billing: url(ProviderId::Billing),
            catalog: url(ProviderId::Catalog),
        }
    }

    pub fn resolver(&self) -> Result<Arc<dyn SubjectResolver>, ConfigError> {
        let directory = match &self.subjects_path {
            Some(path) => SubjectDirectory::from_json_file(path)?,
            None => SubjectDirectory::demo(),
        };
        Ok(Arc::new(directory))
    }

    /// Registry with one transport instance per distinct transport kind.
    /// gRPC channels are driven by the runtime behind `pool`.
    pub fn registry(&self, pool: &OutboundPool) -> Result<ProviderRegistry, ConfigError> {
        let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
        let mut built: Vec<(TransportKind, Arc<dyn UpstreamSource>)> = Vec::new();
        let mut source_for =
            |provider: ProviderId| -> Result<Arc<dyn UpstreamSource>, ConfigError> {
                let kind = self.transport_for(provider);
                let existing = built.iter().find(|(built_kind, _)| *built_kind == kind);
                if let Some((_, source)) = existing {
                    return Ok(Arc::clone(source));
                }
                let source = self.transport_source(kind, &http_client, pool)?;
                built.push((kind, Arc::clone(&source)));
                Ok(source)
            };

        let mut upstreams = Upstreams::uniform(source_for(ProviderId::Profiles)?);
        for provider in [ProviderId::Subscription, ProviderId::Billing, ProviderId::Catalog] {
            upstreams = upstreams.with(provider, source_for(provider)?);
        }

        let mut registry = ProviderRegistry::new(upstreams);
        for provider in ProviderId::ALL {
            let policy = ProviderPolicy {
                budget: self.budget_for(provider)?,
                limit: self.providers.get(provider).limit,
            };
            registry = registry.with_policy(provider, policy);
        }
        Ok(registry)
    }

    fn transport_source(
        &self,
        kind: TransportKind,
        http_client: &Arc<dyn HttpClient>,
        pool: &OutboundPool,
    ) -> Result<Arc<dyn UpstreamSource>, ConfigError> {
        let source: Arc<dyn UpstreamSource> = match kind {
            TransportKind::Rest => Arc::new(RestSource::new(
                Arc::clone(http_client),
                self.endpoints(kind),
            )),
            TransportKind::Graphql => Arc::new(GraphQlSource::new(
                Arc::clone(http_client),
                self.endpoints(kind),
            )),
            TransportKind::Grpc => Arc::new(GrpcSource::connect_lazy(
                &self.endpoints(kind),
                pool.handle(),
            )?),
            TransportKind::Mock => Arc::new(ScriptedSource::demo()),
        };
        Ok(source)
    }

    /// Builds the dedicated outbound pool and the aggregator on top of it.
    pub fn build(&self) -> Result<Aggregator, ConfigError> {
        let pool = Arc::new(OutboundPool::new(self.outbound)?);
        self.build_with_pool(pool)
    }

    pub fn build_with_pool(&self, pool: Arc<OutboundPool>) -> Result<Aggregator, ConfigError> {
        self.validate()?;
        let resolver = self.resolver()?;
        let registry = self.registry(&pool)?;

        info!(
            transports = ?registry.upstreams(),
            worker_threads = self.outbound.worker_threads,
            max_in_flight = self.outbound.max_in_flight,
            "aggregator configured"
        );

        Ok(Aggregator::new(resolver, registry, pool))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_owned(),
        value: value.to_owned(),
    })
}
