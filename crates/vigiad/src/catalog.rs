//! JSON-backed people catalog.
//!
//! The whole database is one JSON array of [`PersonRecord`]s, rewritten on
//! every registration. [`Catalog`] is the flattened in-memory view used for
//! matching.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vigia_core::{Embedding, KnownFace};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serializing database: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One registered person as persisted in the database file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonRecord {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "peligroso", default)]
    pub dangerous: bool,
    #[serde(rename = "imagenes", default)]
    pub images: Vec<String>,
    #[serde(rename = "face_encodings", default)]
    pub face_encodings: Vec<Vec<f32>>,
    #[serde(flatten)]
    pub contact: ContactInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "registrado_en", default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<String>,
    /// Embedding model that produced `face_encodings`.
    #[serde(rename = "modelo", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Optional personal metadata attached to a person.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContactInfo {
    #[serde(default)]
    pub dni: Option<String>,
    #[serde(rename = "domicilio", default)]
    pub address: Option<String>,
    #[serde(rename = "correo_electronico", default)]
    pub email: Option<String>,
    #[serde(rename = "celular", default)]
    pub phone: Option<String>,
    /// Number the automation should notify when this person is seen.
    #[serde(rename = "a_notificar", default)]
    pub notify: Option<String>,
}

/// Metadata looked up for a matched face.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonInfo {
    pub dangerous: bool,
    pub contact: ContactInfo,
}

/// In-memory matching view of the database.
#[derive(Debug, Default)]
pub struct Catalog {
    faces: Vec<KnownFace>,
    people: HashMap<String, PersonInfo>,
    records: Vec<PersonRecord>,
}

impl Catalog {
    /// Flatten records into one gallery entry per stored encoding.
    ///
    /// When `expected_model` is given, records tagged with a different
    /// embedding model are loaded but reported.
    pub fn from_records(records: Vec<PersonRecord>, expected_model: Option<&str>) -> Self {
        let mut faces = Vec::new();
        let mut people = HashMap::with_capacity(records.len());

        for record in &records {
            people.insert(
                record.name.clone(),
                PersonInfo {
                    dangerous: record.dangerous,
                    contact: record.contact.clone(),
                },
            );

            if record.face_encodings.is_empty() {
                tracing::warn!(
                    person = %record.name,
                    "no face encodings stored; person cannot be recognized"
                );
                continue;
            }

            match (expected_model, record.model.as_deref()) {
                (Some(expected), Some(model)) if expected != model => tracing::warn!(
                    person = %record.name,
                    stored = model,
                    expected,
                    "encodings were produced by a different model; matches will be unreliable"
                ),
                (Some(expected), None) => tracing::warn!(
                    person = %record.name,
                    expected,
                    "encodings carry no model tag; those of a different dimension never match"
                ),
                _ => {}
            }

            faces.extend(record.face_encodings.iter().map(|values| KnownFace {
                label: record.name.clone(),
                embedding: Embedding {
                    values: values.clone(),
                    model_version: record.model.clone(),
                },
            }));
        }

        Self {
            faces,
            people,
            records,
        }
    }

    pub fn faces(&self) -> &[KnownFace] {
        &self.faces
    }

    pub fn person(&self, name: &str) -> Option<&PersonInfo> {
        self.people.get(name)
    }

    pub fn records(&self) -> &[PersonRecord] {
        &self.records
    }

    pub fn people_count(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// File layout of the catalog: the database file plus the photo directory.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    db_path: PathBuf,
    known_faces_dir: PathBuf,
}

impl CatalogStore {
    pub fn new(db_path: impl Into<PathBuf>, known_faces_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            known_faces_dir: known_faces_dir.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Create the photo directory and the database's parent directory.
    pub fn ensure_layout(&self) -> Result<(), StoreError> {
        if !self.known_faces_dir.exists() {
            create_dir(&self.known_faces_dir)?;
            tracing::warn!(
                dir = %self.known_faces_dir.display(),
                "known faces directory created; register people to populate it"
            );
        }
        self.ensure_db_dir()
    }

    fn ensure_db_dir(&self) -> Result<(), StoreError> {
        match self.db_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
                create_dir(dir)?;
                tracing::info!(dir = %dir.display(), "database directory created");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Load all records for startup or reload.
    ///
    /// A missing database is created empty. Empty or malformed content is
    /// treated as an empty database.
    pub fn load_records(&self) -> Result<Vec<PersonRecord>, StoreError> {
        self.ensure_db_dir()?;
        if !self.db_path.exists() {
            tracing::warn!(
                path = %self.db_path.display(),
                "database file does not exist; creating an empty one"
            );
            self.save_records(&[])?;
            return Ok(Vec::new());
        }
        self.read_records_for_update()
    }

    /// Load all records ahead of a rewrite. A missing file is an empty database.
    pub fn read_records_for_update(&self) -> Result<Vec<PersonRecord>, StoreError> {
        let content = match std::fs::read_to_string(&self.db_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.db_path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&content) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!(
                    path = %self.db_path.display(),
                    error = %e,
                    "database file is malformed; treating it as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Rewrite the whole database atomically (temp file + rename).
    pub fn save_records(&self, records: &[PersonRecord]) -> Result<(), StoreError> {
        self.ensure_db_dir()?;
        let json = serde_json::to_string_pretty(records)?;

        let mut tmp = self.db_path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, json).map_err(|source| StoreError::Write {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.db_path).map_err(|source| StoreError::Write {
            path: self.db_path.clone(),
            source,
        })
    }

    /// Store a registration photo under `file_name` (already a bare basename).
    pub fn save_image(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        if !self.known_faces_dir.exists() {
            create_dir(&self.known_faces_dir)?;
        }
        let path = self.known_faces_dir.join(file_name);
        std::fs::write(&path, bytes).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

fn create_dir(dir: &Path) -> Result<(), StoreError> {
    std::fs::create_dir_all(dir).map_err(|source| StoreError::Write {
        path: dir.to_path_buf(),
        source,
    })
}
