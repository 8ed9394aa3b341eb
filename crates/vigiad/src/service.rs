//! Recognition and registration workflows behind the HTTP routes.

use crate::catalog::{Catalog, CatalogStore, ContactInfo, PersonRecord, StoreError};
use crate::engine::EngineHandle;
use crate::error::ApiError;
use crate::recognition::{self, Detection, RecognitionStatus};
use crate::upload::{Upload, UploadRejection};
use crate::webhook::{WebhookClient, WebhookPayload, WebhookStatus};
use base64::Engine as _;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

const MSG_PROCESSED: &str = "Procesamiento de imagen completado.";
const MSG_PROCESSING_FAILED: &str = "Error interno del servidor al procesar la imagen.";
const MSG_NO_KNOWN_FACES: &str = "No se han cargado rostros conocidos. Asegúrese de que 'database.json' está configurado y las imágenes existen en 'known_faces'.";
const MSG_NO_FILES: &str = "Debe subir al menos una imagen.";
const MSG_NO_VALID_FACES: &str = "No se detectaron rostros válidos en ninguna de las imágenes proporcionadas. Por favor, sube imágenes claras de la cara.";
const MSG_DB_READ_FAILED: &str = "Error al leer la base de datos.";
const MSG_DB_WRITE_FAILED: &str = "Error al actualizar la base de datos.";

/// A person registration request.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub dangerous: bool,
    pub contact: ContactInfo,
    pub files: Vec<Upload>,
}

#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub message: String,
    #[serde(rename = "detecciones")]
    pub detections: Vec<Detection>,
    pub status: RecognitionStatus,
    pub n8n_status: WebhookStatus,
    #[serde(rename = "imagen_b64")]
    pub image_b64: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    #[serde(rename = "imagenes_registradas")]
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub version: &'static str,
    pub model: Option<String>,
    pub people: usize,
    pub encodings: usize,
    pub webhook_configured: bool,
    pub tolerance: f32,
}

/// A registered person as listed by the API, without embeddings.
#[derive(Debug, Serialize)]
pub struct PersonSummary {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "peligroso")]
    pub dangerous: bool,
    #[serde(flatten)]
    pub contact: ContactInfo,
    #[serde(rename = "imagenes")]
    pub images: Vec<String>,
    pub encodings: usize,
    pub id: Option<String>,
    #[serde(rename = "registrado_en")]
    pub registered_at: Option<String>,
}

pub struct FaceService {
    engine: EngineHandle,
    store: CatalogStore,
    webhook: WebhookClient,
    tolerance: f32,
    catalog: RwLock<Arc<Catalog>>,
    /// Serializes read-modify-write cycles on the database file.
    registration: Mutex<()>,
}

impl FaceService {
    pub fn new(engine: EngineHandle, store: CatalogStore, webhook: WebhookClient, tolerance: f32) -> Self {
        Self {
            engine,
            store,
            webhook,
            tolerance,
            catalog: RwLock::new(Arc::new(Catalog::default())),
            registration: Mutex::new(()),
        }
    }

    /// Current in-memory catalog snapshot.
    pub async fn catalog(&self) -> Arc<Catalog> {
        self.catalog.read().await.clone()
    }

    /// Reload the in-memory catalog from the database file.
    pub async fn reload_catalog(&self) -> Result<Arc<Catalog>, StoreError> {
        let records = self.with_store(CatalogStore::load_records).await?;
        Ok(self.install(records).await)
    }

    /// Run a store operation on the blocking pool.
    async fn with_store<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&CatalogStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(&store)).await?
    }

    async fn install(&self, records: Vec<PersonRecord>) -> Arc<Catalog> {
        let catalog = Arc::new(Catalog::from_records(records, self.engine.model_version()));
        *self.catalog.write().await = catalog.clone();
        tracing::info!(
            people = catalog.people_count(),
            encodings = catalog.faces().len(),
            "in-memory catalog updated"
        );
        catalog
    }

    /// Identify every face in an uploaded photo and relay the result.
    pub async fn recognize(&self, upload: Upload) -> Result<RecognizeResponse, ApiError> {
        upload.validate().map_err(|rejection| match rejection {
            UploadRejection::NotAnImage => ApiError::bad_request("El archivo debe ser una imagen válida."),
            UploadRejection::NotJpeg => ApiError::bad_request("Solo se permiten archivos .jpg o .jpeg."),
        })?;

        let catalog = self.catalog().await;
        if catalog.is_empty() {
            tracing::error!("recognition requested with an empty catalog");
            return Err(ApiError::internal(MSG_NO_KNOWN_FACES));
        }

        let image_b64 = base64::engine::general_purpose::STANDARD.encode(&upload.bytes);

        let probes = self.engine.encode_all(upload.bytes).await.map_err(|e| {
            tracing::error!(file = %upload.file_name, error = %e, "recognition failed");
            ApiError::internal(MSG_PROCESSING_FAILED)
        })?;

        let detections = recognition::recognize(&probes, &catalog, self.tolerance);
        let status = recognition::status(&detections);
        tracing::info!(
            file = %upload.file_name,
            faces = detections.len(),
            ?status,
            "photo processed"
        );

        let notify_number = recognition::first_notify_number(&detections).map(str::to_owned);
        let payload = WebhookPayload {
            filename: upload.file_name,
            detections,
            status,
            image_b64,
            notify_number,
        };
        let n8n_status = self.webhook.send(&payload).await;

        Ok(RecognizeResponse {
            message: MSG_PROCESSED.to_string(),
            detections: payload.detections,
            status,
            n8n_status,
            image_b64: payload.image_b64,
        })
    }

    /// Register a new person from one or more reference photos.
    pub async fn register(&self, form: Registration) -> Result<RegisterResponse, ApiError> {
        if form.name.trim().is_empty() {
            return Err(ApiError::unprocessable("El campo 'nombre' es obligatorio."));
        }
        if form.files.is_empty() {
            return Err(ApiError::bad_request(MSG_NO_FILES));
        }

        let _guard = self.registration.lock().await;

        let mut records = self
            .with_store(CatalogStore::read_records_for_update)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to read database");
                ApiError::internal(MSG_DB_READ_FAILED)
            })?;

        let lowered = form.name.to_lowercase();
        if records.iter().any(|p| p.name.to_lowercase() == lowered) {
            return Err(ApiError::bad_request(format!(
                "La persona con el nombre '{}' ya existe en la base de datos.",
                form.name
            )));
        }

        for file in &form.files {
            file.validate().map_err(|rejection| match rejection {
                UploadRejection::NotAnImage => ApiError::bad_request(format!(
                    "El archivo {} debe ser una imagen válida.",
                    file.file_name
                )),
                UploadRejection::NotJpeg => ApiError::bad_request(format!(
                    "Solo se permiten archivos .jpg o .jpeg para {}.",
                    file.file_name
                )),
            })?;
        }

        let mut images = Vec::new();
        let mut encodings = Vec::new();

        for file in form.files {
            let base_name = file.base_name();
            let processing_failed = || ApiError::internal(format!("Error al procesar o guardar la imagen {base_name}."));

            let embedding = self.engine.encode_best(file.bytes.clone()).await.map_err(|e| {
                tracing::error!(file = %base_name, error = %e, "failed to process registration photo");
                processing_failed()
            })?;

            let Some(embedding) = embedding else {
                tracing::warn!(
                    file = %base_name,
                    person = %form.name,
                    "no face found in photo; it will not be used for recognition"
                );
                continue;
            };

            let name = base_name.clone();
            let bytes = file.bytes;
            self.with_store(move |store| store.save_image(&name, &bytes))
                .await
                .map_err(|e| {
                    tracing::error!(file = %base_name, error = %e, "failed to save registration photo");
                    processing_failed()
                })?;
            tracing::info!(file = %base_name, person = %form.name, "photo processed and saved");

            encodings.push(embedding.values);
            images.push(base_name);
        }

        if encodings.is_empty() {
            return Err(ApiError::bad_request(MSG_NO_VALID_FACES));
        }

        records.push(PersonRecord {
            name: form.name.clone(),
            dangerous: form.dangerous,
            images: images.clone(),
            face_encodings: encodings,
            contact: form.contact,
            id: Some(uuid::Uuid::new_v4().to_string()),
            registered_at: Some(chrono::Utc::now().to_rfc3339()),
            model: self.engine.model_version().map(str::to_owned),
        });

        let records = self
            .with_store(move |store| store.save_records(&records).map(|()| records))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to write database");
                ApiError::internal(MSG_DB_WRITE_FAILED)
            })?;
        tracing::info!(person = %form.name, images = images.len(), "person registered");

        self.install(records).await;

        Ok(RegisterResponse {
            message: format!("Persona '{}' registrada exitosamente.", form.name),
            images,
        })
    }

    pub async fn status(&self) -> ServiceStatus {
        let catalog = self.catalog().await;
        ServiceStatus {
            version: env!("CARGO_PKG_VERSION"),
            model: self.engine.model_version().map(str::to_owned),
            people: catalog.people_count(),
            encodings: catalog.faces().len(),
            webhook_configured: self.webhook.is_configured(),
            tolerance: self.tolerance,
        }
    }

    pub async fn people(&self) -> Vec<PersonSummary> {
        self.catalog()
            .await
            .records()
            .iter()
            .map(|r| PersonSummary {
                name: r.name.clone(),
                dangerous: r.dangerous,
                contact: r.contact.clone(),
                images: r.images.clone(),
                encodings: r.face_encodings.len(),
                id: r.id.clone(),
                registered_at: r.registered_at.clone(),
            })
            .collect()
    }
}
