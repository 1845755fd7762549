//! HTTP surface: `/compile`, `/healthz`, `/metrics` and the read-only
//! artifact mount.

use std::{path::Path, sync::Arc};

use poem::{
    endpoint::StaticFilesEndpoint,
    get, handler,
    http::StatusCode,
    post,
    web::{Data, Json},
    Body, Endpoint, EndpointExt, IntoResponse, Response, Route,
};
use thiserror::Error;
use tokio::time;

use crate::{
    args,
    compiler::{CompileError, CompileTask, COMPILE_DEADLINE, OUTPUT_JS, OUTPUT_WASM},
    config::Config,
    gate::MemoryGate,
    metrics::Metrics,
    schemas::{CompileRequest, CompileResponse, Language},
    workspace::{self, Workspace},
};

pub fn app(config: Arc<Config>, gate: Arc<MemoryGate>, metrics: Arc<Metrics>) -> impl Endpoint {
    let mut route = Route::new()
        .at("/compile", post(compile))
        .at("/healthz", get(healthz))
        .at("/metrics", get(metrics_endpoint));
    if config.enable_static_artifacts {
        route = route.nest(
            config.artifacts_url_base(),
            StaticFilesEndpoint::new(config.artifacts_path()),
        );
    }
    route.data(config).data(gate).data(metrics)
}

#[handler]
fn healthz() -> &'static str {
    "ok"
}

#[handler]
fn metrics_endpoint(Data(metrics): Data<&Arc<Metrics>>) -> Response {
    match metrics.encode() {
        Ok(text) => text.into_response(),
        Err(err) => text_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

#[handler]
async fn compile(
    Data(config): Data<&Arc<Config>>,
    Data(gate): Data<&Arc<MemoryGate>>,
    Data(metrics): Data<&Arc<Metrics>>,
    body: Body,
) -> Response {
    metrics.compile_requests.inc();

    let bytes = match body.into_bytes().await {
        Ok(bytes) => bytes,
        Err(_) => return rejected(metrics, "invalid JSON"),
    };
    let request: CompileRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(_) => return rejected(metrics, "invalid JSON"),
    };
    if request.code.trim().is_empty() {
        return rejected(metrics, "code is required");
    }
    let Some(language) = Language::from_tag(&request.lang) else {
        return rejected(metrics, "type must be 'c' or 'cpp'");
    };

    // Reserve memory budget before touching the filesystem. The reservation
    // is released on drop, on every path out of this function.
    let _reservation = if config.enable_resource_gating {
        if let Err(err) = gate.ensure_budget() {
            metrics.outcome("failed");
            return text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("resource gating init failed: {err}"),
            );
        }
        let acquire = gate.acquire(config.job_memory_estimate());
        match time::timeout(COMPILE_DEADLINE, acquire).await {
            Ok(reservation) => Some(reservation),
            Err(_) => {
                metrics.outcome("canceled");
                return text_response(StatusCode::REQUEST_TIMEOUT, "resource wait canceled");
            }
        }
    } else {
        None
    };

    let id = workspace::new_job_id();
    let ws = match Workspace::create(config, &id).await {
        Ok(ws) => ws,
        Err(err) => {
            metrics.outcome("failed");
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    let result = run_job(config, &ws, language, &request).await;
    ws.cleanup().await;

    match result {
        Ok(()) => {
            metrics.outcome("success");
            let base = config.artifacts_url_base();
            Json(CompileResponse::success(
                id.clone(),
                format!("{base}/{id}/{OUTPUT_JS}"),
                format!("{base}/{id}/{OUTPUT_WASM}"),
            ))
            .into_response()
        }
        Err(JobError::CompileFailed(output)) => {
            metrics.outcome("compile_error");
            (
                StatusCode::BAD_REQUEST,
                Json(CompileResponse::failure(id, output)),
            )
                .into_response()
        }
        Err(err) => {
            metrics.outcome("failed");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

#[derive(Debug, Error)]
enum JobError {
    #[error("{0}")]
    Workspace(#[from] std::io::Error),
    #[error("failed to launch compiler: {0}")]
    Spawn(std::io::Error),
    #[error("failed to promote artifacts: {0}")]
    Promote(std::io::Error),
    #[error("compilation failed")]
    CompileFailed(String),
}

/// Write the source, run the compiler and promote the outputs. The caller
/// removes the job directory afterwards regardless of the result.
async fn run_job(
    config: &Config,
    ws: &Workspace,
    language: Language,
    request: &CompileRequest,
) -> Result<(), JobError> {
    ws.write_source(language.source_file(), &request.code)
        .await?;

    // The `-o` block rule in the filter guarantees the user cannot override
    // the forced output name.
    let mut compile_args = args::merge_and_filter(&config.default_args, &request.args);
    compile_args.push("-o".into());
    compile_args.push(OUTPUT_JS.into());

    let task = CompileTask {
        compiler: language.compiler(),
        source_file: language.source_file(),
        args: &compile_args,
        job_dir: ws.job_dir(),
        nsjail: config
            .nsjail_enabled
            .then(|| Path::new(config.nsjail_path.as_str())),
        deadline: COMPILE_DEADLINE,
    };

    let output = match task.run().await {
        Ok(output) => output,
        Err(err @ CompileError::DeadlineExceeded) => {
            return Err(JobError::CompileFailed(err.to_string()))
        }
        Err(CompileError::Io(err)) => return Err(JobError::Spawn(err)),
    };
    if !output.success {
        return Err(JobError::CompileFailed(output.output));
    }

    ws.promote(&[OUTPUT_JS, OUTPUT_WASM])
        .await
        .map_err(JobError::Promote)?;
    Ok(())
}

fn rejected(metrics: &Metrics, message: &'static str) -> Response {
    metrics.outcome("rejected");
    text_response(StatusCode::BAD_REQUEST, message)
}

fn text_response(status: StatusCode, message: impl Into<String>) -> Response {
    Response::builder().status(status).body(message.into())
}
