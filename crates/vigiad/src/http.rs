//! HTTP surface: routes, multipart parsing and HTML index.

use crate::catalog::ContactInfo;
use crate::error::ApiError;
use crate::service::{FaceService, PersonSummary, RecognizeResponse, RegisterResponse, Registration, ServiceStatus};
use crate::upload::Upload;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::path::PathBuf;
use std::sync::Arc;

const MSG_UPLOAD_TOO_LARGE: &str = "El archivo es demasiado grande.";

#[derive(Clone)]
struct AppState {
    service: Arc<FaceService>,
    index_path: Arc<PathBuf>,
}

/// Build the application router.
pub fn router(service: Arc<FaceService>, index_path: PathBuf, max_upload_bytes: usize) -> Router {
    let state = AppState {
        service,
        index_path: Arc::new(index_path),
    };

    Router::new()
        .route("/", get(index))
        .route("/recognize_face/", post(recognize_face))
        .route("/recognize_face", post(recognize_face))
        .route("/register_person/", post(register_person))
        .route("/register_person", post(register_person))
        .route("/status", get(status))
        .route("/people", get(people))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    tokio::fs::read_to_string(state.index_path.as_ref())
        .await
        .map(Html)
        .map_err(|e| {
            tracing::error!(path = %state.index_path.display(), error = %e, "failed to read index page");
            ApiError::internal("No se pudo cargar la página principal.")
        })
}

async fn recognize_face(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RecognizeResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            upload = Some(read_upload(field).await?);
        }
    }
    let upload = upload.ok_or_else(|| ApiError::unprocessable("Falta el archivo 'file'."))?;

    state.service.recognize(upload).await.map(Json)
}

async fn register_person(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RegisterResponse>, ApiError> {
    let mut name = None;
    let mut dangerous = false;
    let mut contact = ContactInfo::default();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(field_name) = field.name().map(str::to_owned) else {
            continue;
        };
        match field_name.as_str() {
            "files" => {
                let upload = read_upload(field).await?;
                // Browsers send an empty part when no file was picked.
                if !(upload.file_name.is_empty() && upload.bytes.is_empty()) {
                    files.push(upload);
                }
            }
            "nombre" => name = Some(read_text(field).await?),
            "peligroso" => {
                let raw = read_text(field).await?;
                dangerous = parse_form_bool(&raw).ok_or_else(|| {
                    ApiError::unprocessable(format!("Valor inválido para 'peligroso': {raw}"))
                })?;
            }
            "dni" => contact.dni = optional(read_text(field).await?),
            "domicilio" => contact.address = optional(read_text(field).await?),
            "correo_electronico" => contact.email = optional(read_text(field).await?),
            "celular" => contact.phone = optional(read_text(field).await?),
            "a_notificar" => contact.notify = optional(read_text(field).await?),
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }

    let name = name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::unprocessable("El campo 'nombre' es obligatorio."))?;

    let form = Registration {
        name,
        dangerous,
        contact,
        files,
    };
    state.service.register(form).await.map(Json)
}

async fn status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(state.service.status().await)
}

async fn people(State(state): State<AppState>) -> Json<Vec<PersonSummary>> {
    Json(state.service.people().await)
}

async fn read_upload(field: Field<'_>) -> Result<Upload, ApiError> {
    let file_name = field.file_name().unwrap_or_default().to_owned();
    let content_type = field.content_type().map(str::to_owned);
    let bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
    Ok(Upload {
        file_name,
        content_type,
        bytes,
    })
}

async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(multipart_error)
}

fn multipart_error(e: MultipartError) -> ApiError {
    let status = e.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!(error = %e, "upload exceeds the body limit");
        return ApiError::Multipart {
            status,
            detail: MSG_UPLOAD_TOO_LARGE.into(),
        };
    }
    tracing::warn!(error = %e, "malformed multipart request");
    ApiError::Multipart {
        status,
        detail: e.body_text(),
    }
}

fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Boolean form values as HTML forms and scripts send them.
fn parse_form_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{jpeg, service};
    use reqwest::multipart::{Form, Part};
    use serde_json::Value;
    use tempfile::TempDir;

    async fn serve(tmp: &TempDir) -> String {
        serve_with_limit(tmp, 1024 * 1024).await
    }

    async fn serve_with_limit(tmp: &TempDir, max_upload_bytes: usize) -> String {
        let svc = Arc::new(service(tmp));
        svc.reload_catalog().await.unwrap();
        let index = tmp.path().join("index.html");
        std::fs::write(&index, "<html>vigia</html>").unwrap();

        let app = router(svc, index, max_upload_bytes);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn photo_part(name: &str, colors: &[[u8; 3]]) -> Part {
        Part::bytes(jpeg(name, colors).bytes)
            .file_name(name.to_owned())
            .mime_str("image/jpeg")
            .unwrap()
    }

    #[test]
    fn test_parse_form_bool() {
        assert_eq!(parse_form_bool("True"), Some(true));
        assert_eq!(parse_form_bool("on"), Some(true));
        assert_eq!(parse_form_bool("0"), Some(false));
        assert_eq!(parse_form_bool(""), Some(false));
        assert_eq!(parse_form_bool("maybe"), None);
    }

    #[test]
    fn test_optional_blank_is_none() {
        assert_eq!(optional("  ".into()), None);
        assert_eq!(optional(" 123 ".into()), Some("123".into()));
    }

    #[tokio::test]
    async fn test_index_served() {
        let tmp = TempDir::new().unwrap();
        let base = serve(&tmp).await;
        let body = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert_eq!(body, "<html>vigia</html>");
    }

    #[tokio::test]
    async fn test_register_and_recognize_over_http() {
        let tmp = TempDir::new().unwrap();
        let base = serve(&tmp).await;
        let client = reqwest::Client::new();

        let form = Form::new()
            .text("nombre", "Bruno")
            .text("peligroso", "true")
            .text("a_notificar", "+54911")
            .text("dni", "")
            .part("files", photo_part("bruno.jpg", &[[255, 0, 0]]));
        let resp = client
            .post(format!("{base}/register_person/"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["imagenes_registradas"][0], "bruno.jpg");

        let form = Form::new().part("file", photo_part("camara.jpg", &[[255, 0, 0]]));
        let resp = client
            .post(format!("{base}/recognize_face/"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "reconocido");
        assert_eq!(body["detecciones"][0]["nombre"], "Bruno");
        assert_eq!(body["detecciones"][0]["peligroso"], true);
        assert_eq!(body["detecciones"][0]["a_notificar"], "+54911");
        assert_eq!(body["n8n_status"]["status"], "error");

        let people: Value = client
            .get(format!("{base}/people"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(people[0]["nombre"], "Bruno");
        assert_eq!(people[0]["dni"], Value::Null);
        assert!(people[0].get("face_encodings").is_none());
    }

    #[tokio::test]
    async fn test_recognize_rejects_png_name() {
        let tmp = TempDir::new().unwrap();
        let base = serve(&tmp).await;

        let form = Form::new().part("file", photo_part("foto.png", &[[255, 0, 0]]));
        let resp = reqwest::Client::new()
            .post(format!("{base}/recognize_face/"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], "Solo se permiten archivos .jpg o .jpeg.");
    }

    #[tokio::test]
    async fn test_recognize_missing_file_field() {
        let tmp = TempDir::new().unwrap();
        let base = serve(&tmp).await;

        let form = Form::new().text("otro", "x");
        let resp = reqwest::Client::new()
            .post(format!("{base}/recognize_face/"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_register_without_name() {
        let tmp = TempDir::new().unwrap();
        let base = serve(&tmp).await;

        let form = Form::new().part("files", photo_part("a.jpg", &[[255, 0, 0]]));
        let resp = reqwest::Client::new()
            .post(format!("{base}/register_person/"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let tmp = TempDir::new().unwrap();
        let base = serve_with_limit(&tmp, 1024).await;

        let part = Part::bytes(vec![0xAB; 4096])
            .file_name("grande.jpg")
            .mime_str("image/jpeg")
            .unwrap();
        let resp = reqwest::Client::new()
            .post(format!("{base}/recognize_face/"))
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], MSG_UPLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let tmp = TempDir::new().unwrap();
        let base = serve(&tmp).await;
        let body: Value = reqwest::get(format!("{base}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["people"], 0);
        assert_eq!(body["model"], "color-test");
        assert_eq!(body["webhook_configured"], false);
    }
}
