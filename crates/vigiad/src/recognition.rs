use crate::catalog::Catalog;
use serde::Serialize;
use vigia_core::{Embedding, EuclideanMatcher, Matcher};

/// Name reported for faces that match nobody in the catalog.
pub const UNKNOWN_NAME: &str = "Desconocido";

/// Outcome for one face found in an uploaded photo.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Detection {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "peligroso")]
    pub dangerous: bool,
    #[serde(rename = "a_notificar")]
    pub notify: Option<String>,
}

impl Detection {
    fn unknown() -> Self {
        Self {
            name: UNKNOWN_NAME.to_string(),
            dangerous: false,
            notify: None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.name != UNKNOWN_NAME
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum RecognitionStatus {
    #[serde(rename = "reconocido")]
    Recognized,
    #[serde(rename = "no_reconocido")]
    NotRecognized,
}

/// Match every probe against the catalog.
pub fn recognize(probes: &[Embedding], catalog: &Catalog, tolerance: f32) -> Vec<Detection> {
    probes
        .iter()
        .map(|probe| {
            let result = EuclideanMatcher.compare(probe, catalog.faces(), tolerance);
            tracing::debug!(
                matched = result.matched,
                distance = ?result.distance,
                label = ?result.label,
                "face compared against catalog"
            );
            let Some(name) = result.label else {
                return Detection::unknown();
            };
            let info = catalog.person(&name).cloned().unwrap_or_default();
            Detection {
                name,
                dangerous: info.dangerous,
                notify: info.contact.notify,
            }
        })
        .collect()
}

pub fn status(detections: &[Detection]) -> RecognitionStatus {
    if detections.iter().any(Detection::is_known) {
        RecognitionStatus::Recognized
    } else {
        RecognitionStatus::NotRecognized
    }
}

/// Notification number of the first recognized person that has one.
pub fn first_notify_number(detections: &[Detection]) -> Option<&str> {
    detections
        .iter()
        .filter(|d| d.is_known())
        .filter_map(|d| d.notify.as_deref())
        .find(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ContactInfo, PersonRecord};

    fn person(name: &str, dangerous: bool, notify: Option<&str>, enc: Vec<f32>) -> PersonRecord {
        PersonRecord {
            name: name.into(),
            dangerous,
            images: vec![],
            face_encodings: vec![enc],
            contact: ContactInfo {
                notify: notify.map(str::to_owned),
                ..ContactInfo::default()
            },
            id: None,
            registered_at: None,
            model: None,
        }
    }

    fn catalog() -> Catalog {
        Catalog::from_records(
            vec![
                person("Ana", false, None, vec![1.0, 0.0, 0.0]),
                person("Bruno", true, Some("+54911"), vec![0.0, 1.0, 0.0]),
            ],
            None,
        )
    }

    #[test]
    fn test_recognize_mixed_faces() {
        let probes = vec![
            Embedding::new(vec![0.05, 0.95, 0.0]),
            Embedding::new(vec![0.0, 0.0, 1.0]),
            Embedding::new(vec![0.9, 0.1, 0.0]),
        ];
        let detections = recognize(&probes, &catalog(), 0.6);

        assert_eq!(
            detections,
            vec![
                Detection { name: "Bruno".into(), dangerous: true, notify: Some("+54911".into()) },
                Detection::unknown(),
                Detection { name: "Ana".into(), dangerous: false, notify: None },
            ]
        );
        assert_eq!(status(&detections), RecognitionStatus::Recognized);
        assert_eq!(first_notify_number(&detections), Some("+54911"));
    }

    #[test]
    fn test_untagged_encodings_of_other_dimension_never_match() {
        let catalog = Catalog::from_records(
            vec![person("Legacy", true, Some("+54911"), vec![0.6, 0.8])],
            Some("w600k_r50"),
        );
        let detections = recognize(&[Embedding::new(vec![0.6, 0.8, 0.9, -0.9])], &catalog, 1.10);
        assert_eq!(detections, vec![Detection::unknown()]);
        assert_eq!(status(&detections), RecognitionStatus::NotRecognized);
    }

    #[test]
    fn test_no_faces_is_not_recognized() {
        assert_eq!(status(&[]), RecognitionStatus::NotRecognized);
        assert_eq!(first_notify_number(&[]), None);
    }

    #[test]
    fn test_only_unknown_faces() {
        let detections = recognize(&[Embedding::new(vec![0.0, 0.0, 1.0])], &catalog(), 0.6);
        assert_eq!(status(&detections), RecognitionStatus::NotRecognized);
    }

    #[test]
    fn test_first_notify_skips_blank_numbers() {
        let detections = vec![
            Detection { name: "Ana".into(), dangerous: false, notify: Some(String::new()) },
            Detection { name: "Bruno".into(), dangerous: true, notify: Some("42".into()) },
        ];
        assert_eq!(first_notify_number(&detections), Some("42"));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(RecognitionStatus::NotRecognized).unwrap(),
            serde_json::json!("no_reconocido")
        );
    }
}
