//! Ready-to-run graph assembled from settings

use crate::adapters::{CachedAdapter, RetryPolicy, RetryingAdapter, ThrottledAdapter};
use crate::error::Result;
use crate::prompts::PromptLibrary;
use crate::reviewer::ReviewerGatekeeper;
use crate::specialists::SpecialistNode;
use crate::supervisor::SupervisorSynthesizer;
use equity_core::{CapabilityAdapter, CapabilityRegistry, DataDomain, Subject};
use equity_llm::providers::{OpenAIConfig, OpenAIProvider};
use equity_llm::{LLMProvider, TextGenerator};
use equity_utils::{AdapterSettings, ConfigError, ProviderKind, ProviderSettings, Settings};
use equity_workflow::{AnalysisNode, GraphEngine, ReportSink, RunReport, WorkflowConfig};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The four specialists, reviewer and supervisor wired into a [`GraphEngine`]
pub struct EquityGraph {
    engine: GraphEngine,
    settings: Settings,
}

impl EquityGraph {
    pub fn builder(settings: Settings, registry: CapabilityRegistry) -> EquityGraphBuilder {
        EquityGraphBuilder::new(settings, registry)
    }

    /// Build with the provider named in `settings` and no report sink
    ///
    /// `registry` must hold an adapter for every data domain the roster
    /// reads; the text-generation adapter is supplied from the settings.
    pub fn from_settings(settings: Settings, registry: CapabilityRegistry) -> Result<Self> {
        Self::builder(settings, registry).build()
    }

    pub fn engine(&self) -> &GraphEngine {
        &self.engine
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Analyse one ticker (trimmed and upper-cased)
    pub async fn run(&self, ticker: &str) -> Result<RunReport> {
        let subject = Subject::new(ticker)?;
        info!(%subject, "Starting analysis");
        Ok(self.engine.run(subject).await?)
    }

    /// Analyse one ticker, aborting when `token` is cancelled
    pub async fn run_with_cancellation(
        &self,
        ticker: &str,
        token: CancellationToken,
    ) -> Result<RunReport> {
        let subject = Subject::new(ticker)?;
        Ok(self.engine.run_with_cancellation(subject, token).await?)
    }
}

/// Builder for [`EquityGraph`]
pub struct EquityGraphBuilder {
    settings: Settings,
    registry: CapabilityRegistry,
    provider: Option<Arc<dyn LLMProvider>>,
    sink: Option<Arc<dyn ReportSink>>,
    decorate: bool,
}

impl EquityGraphBuilder {
    pub fn new(settings: Settings, registry: CapabilityRegistry) -> Self {
        Self {
            settings,
            registry,
            provider: None,
            sink: None,
            decorate: true,
        }
    }

    /// Use this provider instead of the one named in the settings
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Hand every successful report to `sink`
    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Register data adapters as given, without cache, retry or throttle
    pub fn without_decorators(mut self) -> Self {
        self.decorate = false;
        self
    }

    pub fn build(self) -> Result<EquityGraph> {
        let settings = self.settings;
        settings.validate()?;

        let provider = match self.provider {
            Some(provider) => provider,
            None => build_provider(&settings.provider)?,
        };
        let prompts = Arc::new(PromptLibrary::new()?);

        let mut registry = if self.decorate {
            decorate(&self.registry, &settings.adapters)
        } else {
            self.registry
        };

        let generator = TextGenerator::new(provider, settings.provider.default_model());
        let reasoning: Arc<dyn CapabilityAdapter> =
            Arc::new(generator.with_model(settings.provider.reasoning_model()));
        if registry.register(Arc::new(generator)).is_some() {
            debug!("Replaced the registered text generation adapter");
        }

        let config = workflow_config(&settings)?;
        let nodes = config.roster.iter().map(|agent| {
            Arc::new(SpecialistNode::new(*agent, registry.clone(), prompts.clone()))
                as Arc<dyn AnalysisNode>
        });

        let mut engine = GraphEngine::builder(config.clone())
            .nodes(nodes)
            .gatekeeper(Arc::new(
                ReviewerGatekeeper::new(prompts.clone()).with_generator(reasoning.clone()),
            ))
            .synthesizer(Arc::new(SupervisorSynthesizer::new(reasoning, prompts)));
        if let Some(sink) = self.sink {
            engine = engine.sink(sink);
        }

        info!(
            provider = %settings.provider.provider,
            model = settings.provider.default_model(),
            reasoning_model = settings.provider.reasoning_model(),
            roster = ?config.roster,
            max_retries = config.max_retries,
            "Equity graph ready"
        );

        Ok(EquityGraph {
            engine: engine.build()?,
            settings,
        })
    }
}

/// OpenAI-compatible provider for the configured backend
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn LLMProvider>> {
    let api_key = || {
        settings
            .api_key
            .clone()
            .ok_or_else(|| {
                ConfigError::Missing(format!(
                    "AI_API_KEY (required by provider '{}')",
                    settings.provider
                ))
            })
    };

    let config = match settings.provider {
        ProviderKind::Ollama => OpenAIConfig::ollama(&settings.ollama_base_url),
        ProviderKind::Groq => OpenAIConfig::groq(api_key()?),
        ProviderKind::OpenAI => OpenAIConfig::new(api_key()?),
    }
    .with_timeout(settings.request_timeout_secs);

    Ok(Arc::new(OpenAIProvider::with_config(config)?))
}

/// Wrap every data adapter as cache(retry(throttle(adapter)))
fn decorate(registry: &CapabilityRegistry, settings: &AdapterSettings) -> CapabilityRegistry {
    let rate = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let policy = RetryPolicy::new(settings.max_retries, settings.retry_backoff());

    let mut decorated = CapabilityRegistry::new();
    for domain in registry.domains() {
        let Some(adapter) = registry.get(domain) else {
            continue;
        };
        if domain == DataDomain::TextGeneration {
            decorated.register(adapter);
            continue;
        }

        let ttl = match domain {
            DataDomain::FinancialStatements => settings.statements_cache_ttl_secs,
            DataDomain::MarketData => settings.market_cache_ttl_secs,
            _ => settings.news_cache_ttl_secs,
        };
        let throttled = Arc::new(ThrottledAdapter::new(adapter, rate));
        let retrying = Arc::new(RetryingAdapter::new(throttled, policy.clone()));
        decorated.register(Arc::new(CachedAdapter::new(retrying, Duration::from_secs(ttl))));
    }
    decorated
}

/// Workflow limits from settings; per-call deadlines leave room for one slow
/// provider request
fn workflow_config(settings: &Settings) -> Result<WorkflowConfig> {
    let defaults = WorkflowConfig::default();
    let request = Duration::from_secs(settings.provider.request_timeout_secs);

    let mut builder = WorkflowConfig::builder()
        .max_retries(settings.workflow.max_retries)
        .roster(settings.workflow.agents.iter().copied())
        .node_timeout(defaults.node_timeout.max(request.saturating_add(Duration::from_secs(60))))
        .review_timeout(defaults.review_timeout.max(request.saturating_add(Duration::from_secs(30))))
        .synthesis_timeout(
            defaults.synthesis_timeout.max(request.saturating_add(Duration::from_secs(60))),
        );
    if let Some(timeout) = settings.workflow.run_timeout() {
        builder = builder.run_timeout(timeout);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AgentsError;
    use crate::testing::{RoutingProvider, StaticAdapter};
    use equity_core::AgentId;
    use equity_workflow::{BranchOutcome, MemorySink, RunAbort};
    use serde_json::json;

    fn registry(news_up: bool) -> CapabilityRegistry {
        let news = if news_up {
            StaticAdapter::new(DataDomain::News, json!(["Strong quarter"]))
        } else {
            StaticAdapter::down(DataDomain::News)
        };
        CapabilityRegistry::new()
            .with(Arc::new(StaticAdapter::new(DataDomain::FinancialStatements, json!({"ebitda": 7.1}))))
            .with(Arc::new(StaticAdapter::new(DataDomain::MarketData, json!({"close": 52.0}))))
            .with(Arc::new(news))
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.adapters.retry_backoff_ms = 1;
        settings
    }

    #[tokio::test]
    async fn test_full_run_approves_every_specialist() {
        let provider = Arc::new(RoutingProvider::new());
        let sink = Arc::new(MemorySink::new());
        let graph = EquityGraph::builder(settings(), registry(true))
            .provider(provider.clone())
            .sink(sink.clone())
            .build()
            .unwrap();

        let report = graph.run("  wege3 ").await.unwrap();

        assert_eq!(report.subject.identifier(), "WEGE3");
        assert_eq!(report.document.body, "# Final report\nHold.");
        assert_eq!(report.branches.len(), 4);
        assert!(report.branches.iter().all(|b| b.outcome == BranchOutcome::Approved));
        assert_eq!(report.analysis_invocations, 4);
        assert_eq!(sink.len().await, 1);
        // 4 analyses, 4 reviews, 1 synthesis
        assert_eq!(provider.calls.load(std::sync::atomic::Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_dead_news_feed_exhausts_sentiment_only() {
        let mut settings = settings();
        settings.workflow.agents = vec![AgentId::Fundamentalist, AgentId::Sentiment];

        let graph = EquityGraph::builder(settings, registry(false))
            .provider(Arc::new(RoutingProvider::new()))
            .build()
            .unwrap();
        let report = graph.run("WEGE3").await.unwrap();

        let sentiment = report.branch(AgentId::Sentiment).unwrap();
        assert_eq!(sentiment.outcome, BranchOutcome::FailedExhausted);
        assert_eq!(sentiment.attempts, 3);
        assert!(report.document.includes(AgentId::Fundamentalist));
        assert!(!report.document.includes(AgentId::Sentiment));
    }

    #[tokio::test]
    async fn test_all_branches_exhausted_is_reported() {
        let mut settings = settings();
        settings.workflow.agents = vec![AgentId::Sentiment];
        settings.workflow.max_retries = 0;

        let graph = EquityGraph::builder(settings, registry(false))
            .provider(Arc::new(RoutingProvider::new()))
            .without_decorators()
            .build()
            .unwrap();

        let err = graph.run("WEGE3").await.unwrap_err();
        assert!(matches!(err, AgentsError::Run(RunAbort::AllBranchesExhausted { .. })));
    }

    #[tokio::test]
    async fn test_invalid_ticker() {
        let graph = EquityGraph::builder(settings(), registry(true))
            .provider(Arc::new(RoutingProvider::new()))
            .build()
            .unwrap();
        assert!(matches!(graph.run("   ").await, Err(AgentsError::InvalidTicker(_))));
    }

    #[test]
    fn test_adapter_lookup_is_deferred_to_branches() {
        // a missing data adapter fails its branch at run time
        let graph = EquityGraph::builder(settings(), CapabilityRegistry::new())
            .provider(Arc::new(RoutingProvider::new()))
            .build();
        assert!(graph.is_ok());
    }

    #[test]
    fn test_build_provider_per_backend() {
        let ollama = build_provider(&ProviderSettings::default()).unwrap();
        assert_eq!(ollama.name(), "ollama");

        let groq = ProviderSettings {
            provider: ProviderKind::Groq,
            api_key: Some("gsk_test".to_string()),
            ..ProviderSettings::default()
        };
        assert_eq!(build_provider(&groq).unwrap().name(), "groq");

        let keyless = ProviderSettings {
            provider: ProviderKind::OpenAI,
            ..ProviderSettings::default()
        };
        assert!(matches!(build_provider(&keyless), Err(AgentsError::Config(_))));
    }

    #[test]
    fn test_workflow_config_from_settings() {
        let mut settings = settings();
        settings.workflow.max_retries = 1;
        settings.workflow.run_timeout_secs = Some(900);
        settings.provider.request_timeout_secs = 300;

        let config = workflow_config(&settings).unwrap();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.run_timeout, Some(Duration::from_secs(900)));
        assert_eq!(config.node_timeout, Duration::from_secs(360));
        assert_eq!(config.review_timeout, Duration::from_secs(330));
    }

    #[test]
    fn test_extreme_limits_do_not_overflow() {
        let mut settings = settings();
        settings.provider.request_timeout_secs = u64::MAX;
        settings.workflow.run_timeout_secs = Some(u64::MAX);
        settings.adapters.max_retries = u32::MAX;

        let config = workflow_config(&settings).unwrap();
        assert_eq!(config.node_timeout, Duration::MAX);

        let decorated = decorate(&registry(true), &settings.adapters);
        assert_eq!(decorated.len(), 3);
    }

    #[tokio::test]
    async fn test_run_with_unschedulable_run_timeout() {
        let mut settings = settings();
        settings.workflow.run_timeout_secs = Some(u64::MAX);
        settings.provider.request_timeout_secs = u64::MAX;

        let graph = EquityGraph::builder(settings, registry(true))
            .provider(Arc::new(RoutingProvider::new()))
            .build()
            .unwrap();
        let report = graph.run("WEGE3").await.unwrap();
        assert_eq!(report.branches.len(), 4);
    }
}
