//! HTTP server: accept loop, routing, body handling.
//!
//! The surface is small enough that requests are routed by hand instead of
//! through a framework; multipart bodies are parsed with `multer` straight
//! off the hyper body stream.

use crate::controller::{ImageController, ListQuery, UploadedFile};
use crate::error::ApiError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use http_body_util::{BodyStream, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use palletscan_store::TaskStatus;
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// API route prefix.
const API_PREFIX: &str = "/api/v1";

/// Configuration for the HTTP API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address to bind to.
    pub bind_address: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".parse().expect("static address"),
        }
    }
}

/// HTTP API server.
pub struct HttpApiServer {
    config: ApiConfig,
    controller: Arc<ImageController>,
}

impl HttpApiServer {
    pub fn new(config: ApiConfig, controller: Arc<ImageController>) -> Self {
        Self { config, controller }
    }

    /// Run the accept loop until the process is stopped.
    pub async fn run(&self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(&self.config.bind_address).await?;
        info!("HTTP API listening on {}", self.config.bind_address);

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!("New connection from {}", peer_addr);

            let controller = Arc::clone(&self.controller);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let controller = Arc::clone(&controller);
                    async move { handle_request(req, controller).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    let err_str = err.to_string();
                    // Client disconnects mid-upload are routine, not errors.
                    if err_str.contains("connection closed before message completed") {
                        debug!("Client disconnected (normal): {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }
}

type ApiResponse = Response<Full<Bytes>>;

async fn handle_request(
    req: Request<Incoming>,
    controller: Arc<ImageController>,
) -> Result<ApiResponse, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("Handling {} {}", method, path);

    let Some(route) = path.strip_prefix(API_PREFIX) else {
        return Ok(error_response(StatusCode::NOT_FOUND, "Not Found"));
    };
    let route = route.to_string();

    let outcome = match (&method, route.as_str()) {
        (&Method::POST, "/images/upload") => handle_upload(req, &controller).await,
        (&Method::GET, "/results") => handle_list(&req, &controller).await,
        (&Method::GET, "/health") => Ok(json_response(
            StatusCode::OK,
            &controller.health_check().await,
        )),
        (&Method::GET, "/stats") => controller
            .get_storage_stats()
            .await
            .map(|stats| json_response(StatusCode::OK, &stats)),
        _ => match route.strip_prefix("/results/") {
            Some(task_id) if !task_id.is_empty() && !task_id.contains('/') => match method {
                Method::GET => controller
                    .get_result(task_id)
                    .await
                    .map(|payload| json_response(StatusCode::OK, &payload)),
                Method::DELETE => controller
                    .delete_result(task_id)
                    .await
                    .map(|message| json_response(StatusCode::OK, &message)),
                _ => Err(ApiError::NotFound("Not Found".to_string())),
            },
            _ => Err(ApiError::NotFound("Not Found".to_string())),
        },
    };

    Ok(outcome.unwrap_or_else(|err| error_response(err.status_code(), &err.to_string())))
}

/// Drain the multipart `file` field and hand it to the controller.
async fn handle_upload(
    req: Request<Incoming>,
    controller: &ImageController,
) -> Result<ApiResponse, ApiError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let boundary = multer::parse_boundary(&content_type)
        .map_err(|_| ApiError::Validation("Corpo multipart esperado".to_string()))?;

    let body_stream = BodyStream::new(req.into_body()).filter_map(|frame| async move {
        match frame {
            Ok(frame) => frame.into_data().ok().map(Ok),
            Err(err) => Some(Err(err)),
        }
    });
    let mut multipart = multer::Multipart::new(body_stream, boundary);

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let field_content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_default();

        // Enforce the size cap while draining, not after.
        let max_bytes = controller.max_upload_bytes();
        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::Validation(e.to_string()))?
        {
            if data.len() + chunk.len() > max_bytes {
                return Err(ApiError::TooLarge(format!(
                    "Arquivo muito grande. Tamanho máximo: {}MB",
                    max_bytes / (1024 * 1024)
                )));
            }
            data.extend_from_slice(&chunk);
        }

        let response = controller
            .upload_and_process(UploadedFile {
                filename,
                content_type: field_content_type,
                data: Bytes::from(data),
            })
            .await?;
        return Ok(json_response(StatusCode::OK, &response));
    }

    Err(ApiError::Validation("Campo 'file' ausente".to_string()))
}

async fn handle_list(
    req: &Request<Incoming>,
    controller: &ImageController,
) -> Result<ApiResponse, ApiError> {
    let query = parse_list_query(req.uri().query().unwrap_or_default())?;
    let page = controller.list_results(query).await?;
    Ok(json_response(StatusCode::OK, &page))
}

/// Parse `page`, `limit`, `status`, `start_date`, `end_date`.
fn parse_list_query(raw: &str) -> Result<ListQuery, ApiError> {
    let mut query = ListQuery {
        page: 1,
        limit: 50,
        ..Default::default()
    };

    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            "page" => {
                query.page = value
                    .parse()
                    .map_err(|_| ApiError::Validation("Parâmetro 'page' inválido".to_string()))?;
            }
            "limit" => {
                query.limit = value
                    .parse()
                    .map_err(|_| ApiError::Validation("Parâmetro 'limit' inválido".to_string()))?;
            }
            "status" => {
                let status: TaskStatus = value.parse().map_err(|_| {
                    ApiError::Validation(format!("Status desconhecido: {value}"))
                })?;
                query.status = Some(status);
            }
            "start_date" => query.start_date = Some(parse_date(&value)?),
            "end_date" => query.end_date = Some(parse_date(&value)?),
            _ => {}
        }
    }

    Ok(query)
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| ApiError::Validation(format!("Data inválida: {raw}")))
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> ApiResponse {
    let payload = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(payload)))
        .unwrap_or_default()
}

fn error_response(status: StatusCode, detail: &str) -> ApiResponse {
    json_response(status, &json!({"detail": detail}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_query_defaults() {
        let query = parse_list_query("").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 50);
        assert!(query.status.is_none());
        assert!(query.start_date.is_none());
    }

    #[test]
    fn test_parse_list_query_full() {
        let raw = "page=2&limit=3&status=completed&start_date=2025-06-01T00%3A00%3A00Z&end_date=2025-06-02T00%3A00%3A00Z";
        let query = parse_list_query(raw).unwrap();
        assert_eq!(query.page, 2);
        assert_eq!(query.limit, 3);
        assert_eq!(query.status, Some(TaskStatus::Completed));
        assert!(query.start_date.unwrap() < query.end_date.unwrap());
    }

    #[test]
    fn test_parse_list_query_rejects_bad_values() {
        assert!(parse_list_query("page=abc").is_err());
        assert!(parse_list_query("status=done").is_err());
        assert!(parse_list_query("start_date=yesterday").is_err());
    }

    #[test]
    fn test_json_response_sets_content_type() {
        let response = json_response(StatusCode::OK, &json!({"ok": true}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
