// HTTP surface: profile submission and record download.

use std::net::SocketAddr;
use std::path::Path as FsPath;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, SubmitError};
use crate::model::ProfileSubmission;
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResponse {
    pub status: &'static str,
    pub file: String,
}

pub fn app(store: RecordStore) -> Router {
    Router::new()
        .route("/api/profile", post(submit_profile))
        .route("/records/{*filename}", get(download_record))
        .layer(CorsLayer::permissive())
        .with_state(store)
}

/// Serve until the process is stopped.
pub async fn serve(store: RecordStore, bind: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    let addr = listener.local_addr()?;
    info!(
        %addr,
        records = %store.root().display(),
        "profile records service listening"
    );
    axum::serve(listener, app(store)).await?;
    Ok(())
}

/// POST /api/profile: validate, then append one row to the derived file.
async fn submit_profile(
    State(store): State<RecordStore>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, SubmitError> {
    let profile = ProfileSubmission::from_body(&body).inspect_err(|err| {
        debug!(%err, "profile rejected");
    })?;

    let file = profile.filename();
    let row = profile.into_row();
    let target = file.clone();
    let wrote_header = tokio::task::spawn_blocking(move || store.append(&target, &row))
        .await
        .map_err(|err| StoreError::Task(err.to_string()))
        .and_then(|res| res)
        .inspect_err(|err| error!(%file, %err, "could not store profile"))?;

    info!(%file, wrote_header, "profile stored");
    Ok(Json(SubmitResponse {
        status: "success",
        file,
    }))
}

/// GET /records/{*filename}: hand back a stored file as an attachment.
async fn download_record(
    State(store): State<RecordStore>,
    Path(filename): Path<String>,
) -> Response {
    let Some(path) = store.resolve(&filename) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(file = %path.display(), %err, "record download failed");
            return (StatusCode::NOT_FOUND, "not found").into_response();
        }
    };

    let basename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download");
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type(&path).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{basename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn content_type(path: &FsPath) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => "text/csv; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type(FsPath::new("A.csv")), "text/csv; charset=utf-8");
        assert_eq!(content_type(FsPath::new("A.CSV")), "text/csv; charset=utf-8");
        assert_eq!(content_type(FsPath::new("notes")), "application/octet-stream");
    }
}
