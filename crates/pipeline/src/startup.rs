//! Startup
//!
//! Loads artifacts and wires injectable components together. Every check
//! here is a configuration-integrity check: failure aborts startup.

use crate::config::PipelineConfig;
use crate::runner::Pipeline;
use crate::PipelineError;
use attestation::{
    AttestationDispatcher, AttestationSink, HttpSink, LogSink, MintTrigger, MqttMintTrigger,
};
use feature_engine::{FeatureNormalizer, FeatureSchema, NormalizationParameters};
use inference_engine::{load_model, Classifier, LabelVocabulary};
use obd_telemetry::SimulatedSource;
use std::sync::Arc;
use token_registry::{
    HttpRemoteRegistry, IdentifierIssuer, LocalRegistry, MemoryRegistry, RemoteRegistry,
    SqliteRegistry,
};
use tracing::{info, warn};

/// Build the feature normalizer, checking the stored feature order
pub fn build_normalizer(config: &PipelineConfig) -> Result<FeatureNormalizer, PipelineError> {
    let schema = FeatureSchema::new(config.model.feature_names.iter().cloned())?;
    let params = NormalizationParameters::load(&config.model.scaler_path)?;
    Ok(FeatureNormalizer::new(schema, params)?)
}

/// Load the model and vocabulary, checking both widths
pub fn build_classifier(
    config: &PipelineConfig,
    feature_count: usize,
) -> Result<Classifier, PipelineError> {
    let vocabulary = LabelVocabulary::load(&config.model.labels_path)?;
    let model = load_model(&config.model.model_path, feature_count)?;
    Ok(Classifier::new(model, vocabulary, feature_count)?)
}

/// Open the local registry and optional remote registry, and create the issuer
pub async fn build_issuer(config: &PipelineConfig) -> Result<IdentifierIssuer, PipelineError> {
    let local: Arc<dyn LocalRegistry> = match &config.issuer.registry_path {
        Some(path) => Arc::new(SqliteRegistry::open(path).await?),
        None => {
            warn!("No issuer.registry_path configured; issued ids will not survive restarts");
            Arc::new(MemoryRegistry::new())
        }
    };

    let remote: Option<Arc<dyn RemoteRegistry>> = match &config.remote_registry.url {
        Some(url) => Some(Arc::new(HttpRemoteRegistry::new(url, &config.remote_registry)?)),
        None => None,
    };

    let space = config.issuer.id_space().map_err(PipelineError::Setup)?;
    let issuer = IdentifierIssuer::new(
        local,
        remote,
        space,
        config.issuer.max_draws,
        config.retry.clone(),
    );

    Ok(match config.issuer.seed {
        Some(seed) => issuer.with_seed(seed),
        None => issuer,
    })
}

/// Create the attestation sink; log-only when no endpoint is configured
pub fn build_sink(config: &PipelineConfig) -> Result<Arc<dyn AttestationSink>, PipelineError> {
    match &config.sink.url {
        Some(url) => {
            let sink = HttpSink::new(url, &config.sink)
                .map_err(|e| PipelineError::Setup(format!("attestation sink: {}", e)))?;
            Ok(Arc::new(sink))
        }
        None => {
            info!("No sink.url configured; attestations are logged only");
            Ok(Arc::new(LogSink::new()))
        }
    }
}

/// Create the mint trigger when a broker is configured
pub fn build_mint(config: &PipelineConfig) -> Result<Option<Arc<dyn MintTrigger>>, PipelineError> {
    match &config.mint.broker_host {
        Some(host) => {
            let trigger = MqttMintTrigger::connect(host, &config.mint)
                .map_err(|e| PipelineError::Setup(format!("mint trigger: {}", e)))?;
            Ok(Some(Arc::new(trigger)))
        }
        None => Ok(None),
    }
}

/// Create the simulated telemetry source
pub fn build_source(config: &PipelineConfig) -> SimulatedSource {
    let interval = config.telemetry.interval();
    let source = match config.telemetry.seed {
        Some(seed) => SimulatedSource::seeded(interval, seed),
        None => SimulatedSource::new(interval),
    };
    match &config.telemetry.vehicle_id {
        Some(vin) => source.with_vehicle_id(vin.clone()),
        None => source,
    }
}

/// Build the complete pipeline from configuration
pub async fn build_pipeline(config: &PipelineConfig) -> Result<Pipeline, PipelineError> {
    let normalizer = build_normalizer(config)?;
    let classifier = build_classifier(config, normalizer.dimension())?;
    let issuer = build_issuer(config).await?;
    let sink = build_sink(config)?;
    let mint = build_mint(config)?;

    let dispatcher = AttestationDispatcher::new(Arc::new(issuer), sink, mint, config.retry.clone());

    info!(
        "Pipeline ready: {} features, {} labels, window {:?}",
        normalizer.dimension(),
        classifier.vocabulary().len(),
        config.window.duration()
    );

    Ok(Pipeline::new(
        normalizer,
        classifier,
        dispatcher,
        config.window.duration(),
    ))
}
