use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::actors::agent::AgentActorHandle;
use crate::actors::messages::AppError;
use crate::actors::traits::AgentActor;
use crate::brain::forecast::{AdditiveModel, ForecastModel, Forecaster};
use crate::brain::intent::{Intent, IntentClassifier};
use crate::brain::rules::{RuleEngine, RuleOutcome};
use crate::brain::trend::TrendAnalyzer;
use crate::charts::{ChartSink, FileChartSink};
use crate::config::AppConfig;
use crate::fallback::FallbackResponder;
use crate::health::HealthReport;
use crate::ingest::parse_csv;
use crate::models::{AnalysisResult, Dataset, NumericColumn, Query, TimestampColumn, UploadSummary};
use crate::store::DatasetStore;

/// The analysis service: owns the dataset store and routes each question to
/// exactly one handler.
///
/// Shared behind an `Arc`, every method takes `&self`; uploads and questions
/// may run concurrently.
pub struct ShipmentAnalyst {
    config: AppConfig,
    store: DatasetStore,
    classifier: IntentClassifier,
    rules: RuleEngine,
    trend: TrendAnalyzer,
    forecaster: Forecaster,
    fallback: FallbackResponder,
}

impl ShipmentAnalyst {
    /// Builds the production service: charts on disk, additive forecast
    /// model, agent fallback when an API key is configured.
    ///
    /// Must be called from within a Tokio runtime when the agent is enabled,
    /// since its actor task is spawned here.
    pub fn from_config(config: AppConfig) -> Result<Self, AppError> {
        config.check()?;
        let sink: Arc<dyn ChartSink> = Arc::new(FileChartSink::new(
            config.charts_dir.clone(),
            config.chart_url_prefix.clone(),
        ));
        let agent = AgentActorHandle::from_config(&config).map(|h| Arc::new(h) as Arc<dyn AgentActor>);
        if agent.is_none() {
            info!("No agent API key configured; unanswered questions will not be delegated");
        }
        Ok(Self::with_parts(config, sink, Arc::new(AdditiveModel::default()), agent))
    }

    /// Builds the service from explicit collaborators.
    pub fn with_parts(
        config: AppConfig,
        sink: Arc<dyn ChartSink>,
        model: Arc<dyn ForecastModel>,
        agent: Option<Arc<dyn AgentActor>>,
    ) -> Self {
        Self {
            config,
            store: DatasetStore::new(),
            classifier: IntentClassifier::new(),
            rules: RuleEngine::new(),
            trend: TrendAnalyzer::new(Arc::clone(&sink)),
            forecaster: Forecaster::new(model, sink),
            fallback: FallbackResponder::new(agent),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Validates `bytes` as a shipment CSV and makes it the current dataset.
    ///
    /// On failure the previously loaded dataset stays in force.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub fn upload(&self, bytes: &[u8]) -> Result<UploadSummary, AppError> {
        let dataset = parse_csv(bytes)?;
        let dataset = self.store.replace(dataset);
        Ok(UploadSummary {
            row_count: dataset.len(),
            column_names: dataset.columns.clone(),
        })
    }

    /// Answers one question against the dataset in force when the call starts.
    ///
    /// Fails only with [`AppError::NoDataset`]; every handler failure is
    /// reported through the result text instead.
    #[instrument(skip(self))]
    pub async fn ask(&self, question: &str, periods: Option<i64>) -> Result<AnalysisResult, AppError> {
        let dataset = self.store.snapshot().ok_or(AppError::NoDataset)?;
        let query = Query::new(question, self.config.resolve_periods(periods));
        let intent = self.classifier.classify(&query.question);
        info!(
            "Question classified as {} (keyword: {:?})",
            intent.intent, intent.matched_keyword
        );

        let result = match intent.intent {
            Intent::Forecast => self.run_forecast(dataset, query.periods).await,
            Intent::Trend => self.run_trend(dataset).await,
            Intent::Analysis => self.run_analysis(dataset, &query.question).await,
        };
        Ok(result)
    }

    pub fn health(&self) -> HealthReport {
        HealthReport::build(
            self.store.snapshot().map(|d| d.len()),
            self.fallback.is_configured(),
            &self.config.charts_dir,
        )
    }

    async fn run_forecast(&self, dataset: Arc<Dataset>, periods: u32) -> AnalysisResult {
        let forecaster = self.forecaster.clone();
        match tokio::task::spawn_blocking(move || forecaster.forecast(&dataset, periods)).await {
            Ok(result) => result,
            Err(e) => {
                error!("Forecast worker failed: {}", e);
                AnalysisResult::text(format!("Forecasting failed: {}", e))
            }
        }
    }

    async fn run_trend(&self, dataset: Arc<Dataset>) -> AnalysisResult {
        let trend = self.trend.clone();
        let task = tokio::task::spawn_blocking(move || {
            trend.trend_chart(&dataset, NumericColumn::GrossQuantity, TimestampColumn::ExitTime)
        });
        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Trend worker failed: {}", e);
                AnalysisResult::text(format!("Could not render the trend chart: {}", e))
            }
        }
    }

    async fn run_analysis(&self, dataset: Arc<Dataset>, question: &str) -> AnalysisResult {
        match self.rules.evaluate(&dataset, question) {
            RuleOutcome::Answered { rule, result } => {
                info!("Answered by rule {}", rule);
                result
            }
            outcome @ RuleOutcome::Unanswered => {
                self.fallback
                    .delegate(dataset, question, outcome.into_result())
                    .await
            }
        }
    }
}
