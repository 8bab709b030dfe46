use axum::{
    Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use claim_shield::{
    ClaimEvaluator, Classifier, EmbeddingProvider, EngineConfig, ExactIndex, FraudError,
    HashingEmbedder, LogisticClassifier, ReportGenerator, SEED_CASES, ScoreAggregator,
    TemplateReportGenerator, seed_index,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    models::{AddCaseRequest, AddCaseResponse, AnalyzeClaimRequest, AnalyzeClaimResponse},
    store::{AssessmentStore, InMemoryAssessmentStore, StoredAssessment},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "assessment_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn fraud_error(message: &str, e: &FraudError) -> ApiError {
    match e {
        FraudError::MalformedInput(details) => bad_request_error(message, details),
        FraudError::ExternalTimeout { .. } => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({
                "error": message,
                "details": e.to_string()
            })),
        ),
        _ => internal_error(message, &e.to_string()),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub evaluator: ClaimEvaluator,
    pub reporter: Arc<dyn ReportGenerator>,
    pub store: Arc<dyn AssessmentStore>,
}

impl AppState {
    pub fn new(
        evaluator: ClaimEvaluator,
        reporter: Arc<dyn ReportGenerator>,
        store: Arc<dyn AssessmentStore>,
    ) -> Self {
        Self {
            evaluator,
            reporter,
            store,
        }
    }
}

/// Builds every collaborator from configuration and seeds the case index.
pub async fn create_app_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let embedder = create_embedder(&config.engine);
    if embedder.dimension() != config.engine.embedding_dimension {
        warn!(
            configured = config.engine.embedding_dimension,
            provider = embedder.dimension(),
            "Embedding provider dimension overrides configuration"
        );
    }

    let index = Arc::new(ExactIndex::new(embedder.dimension())?);
    seed_index(index.as_ref(), embedder.as_ref(), SEED_CASES).await?;

    let aggregator =
        ScoreAggregator::from_classifier(load_classifier(&config.engine), config.engine.classifier_timeout);
    info!(strategy = aggregator.strategy_name(), "Score aggregator ready");

    let evaluator = ClaimEvaluator::new(index, embedder, aggregator, config.engine.clone())?;

    Ok(AppState::new(
        evaluator,
        create_report_generator(),
        Arc::new(InMemoryAssessmentStore::new()),
    ))
}

fn create_embedder(config: &EngineConfig) -> Arc<dyn EmbeddingProvider> {
    if let Some(embedder) = neural_embedder() {
        return embedder;
    }
    info!(dimension = config.embedding_dimension, "Using hashing embedder");
    Arc::new(HashingEmbedder::new(config.embedding_dimension))
}

#[cfg(feature = "fastembed")]
fn neural_embedder() -> Option<Arc<dyn EmbeddingProvider>> {
    match claim_shield::FastEmbedProvider::try_new() {
        Ok(provider) => Some(Arc::new(provider)),
        Err(e) => {
            warn!(error = %e, "Neural embedder unavailable, using hashing embedder");
            None
        }
    }
}

#[cfg(not(feature = "fastembed"))]
fn neural_embedder() -> Option<Arc<dyn EmbeddingProvider>> {
    None
}

fn load_classifier(config: &EngineConfig) -> Option<Arc<dyn Classifier>> {
    let Some(path) = config.model_path.as_ref() else {
        info!("FRAUD_MODEL_PATH not set, scoring with fallback formula");
        return None;
    };

    match LogisticClassifier::load(path) {
        Ok(model) => Some(Arc::new(model)),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Fraud model could not be loaded, scoring with fallback formula"
            );
            None
        }
    }
}

fn create_report_generator() -> Arc<dyn ReportGenerator> {
    if let Some(generator) = llm_report_generator() {
        info!("Using LLM report generation");
        return generator;
    }
    info!("Using template report generation (set OPENROUTER_API_KEY to enable LLM reports)");
    Arc::new(TemplateReportGenerator)
}

#[cfg(feature = "rig")]
fn llm_report_generator() -> Option<Arc<dyn ReportGenerator>> {
    claim_shield::LlmReportGenerator::from_env()
        .map(|generator| Arc::new(generator) as Arc<dyn ReportGenerator>)
}

#[cfg(not(feature = "rig"))]
fn llm_report_generator() -> Option<Arc<dyn ReportGenerator>> {
    None
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/analyze_claim", post(analyze_claim))
        .route("/assessment/{id}", get(get_assessment))
        .route("/cases", post(add_case))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "indexed_cases": state.evaluator.index().len(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Maps an unreadable JSON body onto the same 400 shape as validation errors.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>, message: &str) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected request body");
        bad_request_error(message, &rejection.body_text())
    })
}

async fn analyze_claim(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeClaimRequest>, JsonRejection>,
) -> ApiResult<AnalyzeClaimResponse> {
    let request = json_body(payload, "Failed to evaluate claim")?;
    info!(
        detections = request.damage.len(),
        invoice_items = request.invoice.items.len(),
        has_description = request.description.is_some(),
        "Processing analyze_claim request"
    );

    let evaluation = state.evaluator.evaluate(&request).await.map_err(|e| {
        warn!(error = %e, "Claim evaluation rejected");
        fraud_error("Failed to evaluate claim", &e)
    })?;

    let report = match state.reporter.generate(&evaluation.record).await {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "Report generation failed, using template report");
            TemplateReportGenerator::render(&evaluation.record)
        }
    };

    let stored = StoredAssessment {
        id: Uuid::new_v4().to_string(),
        created_at: chrono::Utc::now(),
        evaluation,
        report,
    };
    let response = AnalyzeClaimResponse::from_stored(&stored, &request);

    state.store.save(stored).await.map_err(|e| {
        error!(error = %e, "Failed to save assessment");
        internal_error("Failed to save assessment", &e.to_string())
    })?;

    info!(
        assessment_id = %response.assessment_id,
        fraud_score = response.fraud_score,
        "Claim analysis completed"
    );
    Ok(Json(response))
}

async fn get_assessment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StoredAssessment> {
    info!(assessment_id = %id, "Getting assessment");

    match state.store.get(&id).await {
        Ok(Some(assessment)) => Ok(Json(assessment)),
        Ok(None) => Err(not_found_error("Assessment not found", &id)),
        Err(e) => {
            error!(assessment_id = %id, error = %e, "Failed to load assessment");
            Err(internal_error("Failed to load assessment", &e.to_string()))
        }
    }
}

async fn add_case(
    State(state): State<AppState>,
    payload: Result<Json<AddCaseRequest>, JsonRejection>,
) -> ApiResult<AddCaseResponse> {
    let request = json_body(payload, "Failed to add case")?;
    let total_cases = state.evaluator.add_case(&request.text).await.map_err(|e| {
        warn!(error = %e, "Failed to add case");
        fraud_error("Failed to add case", &e)
    })?;
    Ok(Json(AddCaseResponse { total_cases }))
}
