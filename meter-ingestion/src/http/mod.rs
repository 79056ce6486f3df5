//! HTTP upload, query and export routes.

use std::{collections::BTreeMap, net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use meter_client::domain::{
    timestamp::parse_local, EnergyData, Measurement, Reading, ReadingType, SensorData, TimeSeries,
    UnknownReadingType,
};
use serde::Deserialize;
use time::PrimitiveDateTime;

use crate::{
    export::{self, GroupedValues, MeterExport},
    pipeline::PipelineError,
    query::EnergyDataService,
    sinks::JsonFileStore,
    sources::parse_energy_data,
    transform::{batch_fingerprint, InputFile, MeterBreakdown, Reconciler, SensorDataAssembler},
};

pub const PROCESSING_FAILED: &str = "could not process input";

#[derive(Clone)]
pub struct AppState {
    pub service: EnergyDataService,
    /// Reconciled series snapshots are written here when set.
    pub snapshots: Option<JsonFileStore>,
    pub reconciler: Reconciler,
    pub assembler: Arc<SensorDataAssembler>,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("could not process input: {0}")]
    Processing(String),
    #[error(transparent)]
    Store(#[from] PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            Self::Processing(detail) => {
                tracing::warn!(error = %detail, "rejecting upload");
                metrics::counter!("http_upload_failed_total").increment(1);
                (StatusCode::BAD_REQUEST, PROCESSING_FAILED).into_response()
            }
            Self::Store(e) => {
                tracing::error!(error = %e, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response()
            }
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/upload/series", post(upload_series))
        .route("/upload/sensor-data", post(upload_sensor_data))
        .route("/export/mapped-data", post(export_mapped_data))
        .route("/energy-data", get(all_energy_data))
        .route("/energy-data/meter", get(energy_data_by_meter))
        .route("/energy-data/meter/measurements", get(measurements_grouped))
        .route("/energy-data/meter/measurements/type", get(measurements_by_type))
        .route("/energy-data/meter/measurements/range", get(measurements_in_range))
        .route("/export/json", get(export_json))
        .route("/export/csv", get(export_csv))
        .route("/export/json/measurements", get(export_json_measurements))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

pub async fn serve(bind_addr: &str, app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http.bind_addr {bind_addr}: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP service listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn read_files(mut multipart: Multipart) -> ApiResult<Vec<InputFile>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Processing(e.to_string()))?
    {
        let name = field
            .file_name()
            .or(field.name())
            .unwrap_or("upload")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Processing(e.to_string()))?;
        files.push(InputFile::new(name, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::Processing("no files in upload".to_string()));
    }
    metrics::counter!("http_uploaded_files_total").increment(files.len() as u64);
    Ok(files)
}

async fn reconcile_upload(
    reconciler: Reconciler,
    files: Vec<InputFile>,
) -> ApiResult<BTreeMap<String, TimeSeries>> {
    tokio::task::spawn_blocking(move || reconciler.reconcile(&files))
        .await
        .map_err(|e| ApiError::Processing(e.to_string()))
}

/// Single-document upload; only the first file of the form is used.
async fn upload(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<Vec<EnergyData>>> {
    let files = read_files(multipart).await?;
    let file = files
        .first()
        .ok_or_else(|| ApiError::Processing("no files in upload".to_string()))?;
    if files.len() > 1 {
        tracing::warn!(ignored = files.len() - 1, "single-file upload received extra files");
    }
    let data = parse_energy_data(&file.bytes).map_err(|e| ApiError::Processing(e.to_string()))?;

    state.service.save(&data).await?;
    tracing::info!(
        file = %file.name,
        fingerprint = %file.fingerprint(),
        aggregates = data.len(),
        "stored uploaded document"
    );
    Ok(Json(data))
}

async fn upload_series(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<BTreeMap<String, Vec<Reading>>>> {
    let files = read_files(multipart).await?;
    let batch_id = batch_fingerprint(&files);
    let series = reconcile_upload(state.reconciler.clone(), files).await?;

    if let Some(store) = &state.snapshots {
        store.save_series(&series, &batch_id).await?;
    }

    Ok(Json(
        series
            .into_iter()
            .map(|(meter_id, s)| (meter_id, s.into_readings()))
            .collect(),
    ))
}

async fn upload_sensor_data(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<Vec<SensorData>>> {
    let files = read_files(multipart).await?;
    let assembler = state.assembler.clone();
    let data = tokio::task::spawn_blocking(move || assembler.assemble(&files))
        .await
        .map_err(|e| ApiError::Processing(e.to_string()))?;
    Ok(Json(data))
}

async fn export_mapped_data(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<BTreeMap<String, GroupedValues>>> {
    let files = read_files(multipart).await?;
    let series = reconcile_upload(state.reconciler.clone(), files).await?;
    Ok(Json(export::mapped_data(&series)))
}

#[derive(Debug, Deserialize)]
struct MeterParam {
    #[serde(rename = "meterId")]
    meter_id: String,
}

#[derive(Debug, Deserialize)]
struct OptionalMeterParam {
    #[serde(rename = "meterId")]
    meter_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TypeParams {
    #[serde(rename = "meterId")]
    meter_id: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RangeParams {
    #[serde(rename = "meterId")]
    meter_id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "startTime")]
    start_time: String,
    #[serde(rename = "endTime")]
    end_time: String,
}

fn parse_kind(raw: &str) -> ApiResult<ReadingType> {
    raw.parse()
        .map_err(|e: UnknownReadingType| ApiError::BadRequest(e.to_string()))
}

fn parse_time(field: &str, raw: &str) -> ApiResult<PrimitiveDateTime> {
    parse_local(raw).map_err(|e| ApiError::BadRequest(format!("invalid {field} '{raw}': {e}")))
}

async fn all_energy_data(State(state): State<AppState>) -> ApiResult<Json<Vec<EnergyData>>> {
    Ok(Json(state.service.all().await?))
}

async fn energy_data_by_meter(
    State(state): State<AppState>,
    Query(p): Query<MeterParam>,
) -> ApiResult<Json<Vec<EnergyData>>> {
    Ok(Json(state.service.by_meter(&p.meter_id).await?))
}

async fn measurements_grouped(
    State(state): State<AppState>,
    Query(p): Query<MeterParam>,
) -> ApiResult<Json<MeterBreakdown>> {
    Ok(Json(state.service.grouped(&p.meter_id).await?))
}

async fn measurements_by_type(
    State(state): State<AppState>,
    Query(p): Query<TypeParams>,
) -> ApiResult<Json<Vec<Measurement>>> {
    let kind = parse_kind(&p.kind)?;
    Ok(Json(state.service.measurements_by_type(&p.meter_id, kind).await?))
}

async fn measurements_in_range(
    State(state): State<AppState>,
    Query(p): Query<RangeParams>,
) -> ApiResult<Json<Vec<Measurement>>> {
    let kind = parse_kind(&p.kind)?;
    let start = parse_time("startTime", &p.start_time)?;
    let end = parse_time("endTime", &p.end_time)?;
    Ok(Json(
        state
            .service
            .measurements_in_range(&p.meter_id, kind, start, end)
            .await?,
    ))
}

async fn export_json(
    State(state): State<AppState>,
    Query(p): Query<OptionalMeterParam>,
) -> ApiResult<Json<Vec<MeterExport>>> {
    let data = state.service.all_or_by_meter(p.meter_id.as_deref()).await?;
    Ok(Json(export::json_by_meter(&data)))
}

async fn export_csv(
    State(state): State<AppState>,
    Query(p): Query<OptionalMeterParam>,
) -> ApiResult<Response> {
    let meter_id = p.meter_id.as_deref().filter(|id| !id.is_empty());
    let data = state.service.all_or_by_meter(meter_id).await?;
    let csv = export::csv_by_meter(&data).map_err(|e| PipelineError::Sink(e.to_string()))?;

    let file_name = match meter_id {
        Some(id) => format!("{id}.csv"),
        None => "energy_data.csv".to_string(),
    };
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
        ],
        csv,
    )
        .into_response())
}

async fn export_json_measurements(
    State(state): State<AppState>,
    Query(p): Query<MeterParam>,
) -> ApiResult<Json<GroupedValues>> {
    let breakdown = state.service.grouped(&p.meter_id).await?;
    Ok(Json(GroupedValues::from(&breakdown)))
}
