// src/offline/annotation.rs
//! Action annotation export for the video annotation tool

use crate::config::constants::annotation::DEFAULT_OBJECT_ID;
use crate::config::AnnotationConfig;
use crate::error::OfflineError;
use crate::offline::io::LabeledSample;
use crate::offline::smoother::collapse_segments;
use crate::utils::time::offset_seconds;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const ANNOTATION_COLUMNS: [&str; 6] = ["start", "end", "action", "object", "color", "description"];

/// One labeled interval, in seconds from the start of the recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionAnnotation {
    pub start: f64,
    pub end: f64,
    pub action: u32,
    pub object: u32,
    pub color: String,
    pub description: String,
}

/// Action id and display color for one action name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLabel {
    pub name: String,
    pub id: u32,
    pub color: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelSetFile {
    action_label_data: Vec<ActionLabel>,
}

/// Action names (the part after `Pose.`) mapped to ids and colors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLabelSet {
    labels: BTreeMap<String, ActionLabel>,
}

impl ActionLabelSet {
    pub fn new(labels: impl IntoIterator<Item = ActionLabel>) -> Self {
        Self {
            labels: labels.into_iter().map(|label| (label.name.clone(), label)).collect(),
        }
    }

    /// Load `{"actionLabelData": [{"name", "id", "color"}, ...]}`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, OfflineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| OfflineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: LabelSetFile = serde_json::from_str(&content).map_err(|source| OfflineError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), labels = file.action_label_data.len(), "loaded action label set");
        Ok(Self::new(file.action_label_data))
    }

    /// Configured label set, or the built-in one
    pub fn from_config(config: &AnnotationConfig) -> Result<Self, OfflineError> {
        match &config.label_set_path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Look up a pose label such as `Pose.Fist`; labels without a namespace are
    /// looked up whole.
    pub fn lookup(&self, label: &str) -> Option<&ActionLabel> {
        let name = label.split_once('.').map_or(label, |(_, name)| name);
        self.labels.get(name)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for ActionLabelSet {
    fn default() -> Self {
        const BUILTIN: [(&str, u32, &str); 12] = [
            ("Pinch", 0, "#e6194b"),
            ("Fist", 1, "#3cb44b"),
            ("Flat", 2, "#ffe119"),
            ("IndexTap", 3, "#4363d8"),
            ("AllFingerTap", 4, "#f58231"),
            ("WristFlickUp", 5, "#911eb4"),
            ("WristFlickDown", 6, "#46f0f0"),
            ("WristFlickIn", 7, "#f032e6"),
            ("WristFlickOut", 8, "#bcf60c"),
            ("PinkyPinch", 9, "#008080"),
            ("Resting", 98, "#a9a9a9"),
            ("Unknown", 99, "#000000"),
        ];
        Self::new(BUILTIN.iter().map(|(name, id, color)| ActionLabel {
            name: name.to_string(),
            id: *id,
            color: color.to_string(),
        }))
    }
}

/// Turn each run of equal labels into one annotation.
///
/// A run ends where the next one starts; the final run ends at the last sample.
pub fn annotate(
    samples: &[LabeledSample],
    labels: &ActionLabelSet,
    object: u32,
) -> Result<Vec<ActionAnnotation>, OfflineError> {
    let Some(origin) = samples.first().map(|s| s.timestamp) else {
        return Ok(Vec::new());
    };
    let segments = collapse_segments(samples);

    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let action = labels.lookup(&segment.label).ok_or_else(|| OfflineError::UnmappedLabel {
                label: segment.label.clone(),
            })?;
            let end = segments.get(i + 1).map_or(segment.last, |next| next.first);
            Ok(ActionAnnotation {
                start: offset_seconds(segment.first, origin),
                end: offset_seconds(end, origin),
                action: action.id,
                object,
                color: action.color.clone(),
                description: String::new(),
            })
        })
        .collect()
}

/// Standalone `{"annotation": {"actionAnnotationList": [...]}}` document
pub fn annotation_document(annotations: &[ActionAnnotation]) -> Value {
    json!({ "annotation": { "actionAnnotationList": annotations } })
}

/// Replace `annotation.actionAnnotationList` in `template`, creating the path if needed
pub fn inject_into_template(mut template: Value, annotations: &[ActionAnnotation]) -> Value {
    let list = json!(annotations);
    if !template.is_object() {
        template = Value::Object(Map::new());
    }
    if let Value::Object(root) = &mut template {
        let annotation = root
            .entry("annotation")
            .or_insert_with(|| Value::Object(Map::new()));
        if !annotation.is_object() {
            *annotation = Value::Object(Map::new());
        }
        if let Value::Object(annotation) = annotation {
            annotation.insert("actionAnnotationList".to_string(), list);
        }
    }
    template
}

pub fn load_template<P: AsRef<Path>>(path: P) -> Result<Value, OfflineError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| OfflineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| OfflineError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_json<P: AsRef<Path>>(path: P, document: &Value) -> Result<(), OfflineError> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(document).map_err(|source| OfflineError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(|source| OfflineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "wrote annotation document");
    Ok(())
}

/// Write `start,end,action,object,color,description` rows
pub fn write_csv<P: AsRef<Path>>(path: P, annotations: &[ActionAnnotation]) -> Result<(), OfflineError> {
    let path = path.as_ref();
    let csv_error = |source: csv::Error| OfflineError::Csv {
        path: path.to_path_buf(),
        source,
    };

    // Header first; an empty list still gets one
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_error)?;
    writer.write_record(ANNOTATION_COLUMNS).map_err(csv_error)?;
    for annotation in annotations {
        writer.serialize(annotation).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| OfflineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), rows = annotations.len(), "wrote annotation table");
    Ok(())
}

/// Annotation exporter bound to a label set and object id
#[derive(Debug, Clone)]
pub struct AnnotationExporter {
    labels: ActionLabelSet,
    object: u32,
    template: Option<Value>,
}

impl AnnotationExporter {
    pub fn new(labels: ActionLabelSet) -> Self {
        Self {
            labels,
            object: DEFAULT_OBJECT_ID,
            template: None,
        }
    }

    pub fn from_config(config: &AnnotationConfig) -> Result<Self, OfflineError> {
        let mut exporter = Self::new(ActionLabelSet::from_config(config)?).with_object(config.object_id);
        if let Some(path) = &config.template_path {
            exporter = exporter.with_template(load_template(path)?);
        }
        Ok(exporter)
    }

    pub fn with_object(mut self, object: u32) -> Self {
        self.object = object;
        self
    }

    pub fn with_template(mut self, template: Value) -> Self {
        self.template = Some(template);
        self
    }

    pub fn annotate(&self, samples: &[LabeledSample]) -> Result<Vec<ActionAnnotation>, OfflineError> {
        annotate(samples, &self.labels, self.object)
    }

    pub fn document(&self, annotations: &[ActionAnnotation]) -> Value {
        match &self.template {
            Some(template) => inject_into_template(template.clone(), annotations),
            None => annotation_document(annotations),
        }
    }

    /// Annotate `samples` and write the JSON document to `path`
    pub fn export<P: AsRef<Path>>(&self, samples: &[LabeledSample], path: P) -> Result<Vec<ActionAnnotation>, OfflineError> {
        let annotations = self.annotate(samples)?;
        write_json(path, &self.document(&annotations))?;
        Ok(annotations)
    }
}

impl Default for AnnotationExporter {
    fn default() -> Self {
        Self::new(ActionLabelSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn samples(entries: &[(i64, &str)]) -> Vec<LabeledSample> {
        entries.iter().map(|(ts, label)| LabeledSample::new(*ts, *label)).collect()
    }

    #[test]
    fn test_runs_become_contiguous_intervals() {
        let input = samples(&[
            (1000, "Pose.Resting"),
            (1500, "Pose.Resting"),
            (2000, "Pose.Fist"),
            (2500, "Pose.Fist"),
            (3000, "Pose.Resting"),
            (4000, "Pose.Resting"),
        ]);
        let annotations = annotate(&input, &ActionLabelSet::default(), 0).unwrap();

        assert_eq!(annotations.len(), 3);
        assert_eq!((annotations[0].start, annotations[0].end), (0.0, 1.0));
        assert_eq!((annotations[1].start, annotations[1].end), (1.0, 2.0));
        assert_eq!((annotations[2].start, annotations[2].end), (2.0, 3.0));
        assert_eq!(annotations[1].action, 1);
        assert_eq!(annotations[2].action, 98);
        assert!(annotations.windows(2).all(|w| w[0].end == w[1].start));
        assert!(annotations.iter().all(|a| a.object == 0 && a.description.is_empty()));
    }

    #[test]
    fn test_unmapped_label_is_error() {
        let input = samples(&[(0, "Pose.Wave")]);
        match annotate(&input, &ActionLabelSet::default(), 0) {
            Err(OfflineError::UnmappedLabel { label }) => assert_eq!(label, "Pose.Wave"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_lookup_without_namespace() {
        let set = ActionLabelSet::default();
        assert_eq!(set.lookup("Fist").map(|l| l.id), Some(1));
        assert_eq!(set.lookup("Pose.PinkyPinch").map(|l| l.id), Some(9));
        assert!(set.lookup("Pose.").is_none());
    }

    #[test]
    fn test_load_label_set() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r##"{"actionLabelData": [{"name": "Fist", "id": 7, "color": "#123456"}]}"##,
        )
        .unwrap();

        let set = ActionLabelSet::load(&path).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.lookup("Pose.Fist").unwrap().color, "#123456");
    }

    #[test]
    fn test_template_injection_keeps_other_fields() {
        let template = json!({ "version": 2, "annotation": { "video": "a.mp4", "actionAnnotationList": [1] } });
        let annotations = annotate(&samples(&[(0, "Pose.Flat")]), &ActionLabelSet::default(), 0).unwrap();
        let document = inject_into_template(template, &annotations);

        assert_eq!(document["version"], 2);
        assert_eq!(document["annotation"]["video"], "a.mp4");
        assert_eq!(document["annotation"]["actionAnnotationList"][0]["action"], 2);
    }

    #[test]
    fn test_export_json_and_csv() {
        let dir = TempDir::new().unwrap();
        let input = samples(&[(0, "Pose.Pinch"), (250, "Pose.Resting")]);
        let exporter = AnnotationExporter::default().with_object(3);

        let json_path = dir.path().join("poses.json");
        let annotations = exporter.export(&input, &json_path).unwrap();
        let written: Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(written["annotation"]["actionAnnotationList"][0]["object"], 3);
        assert_eq!(written["annotation"]["actionAnnotationList"][1]["end"], 0.25);

        let csv_path = dir.path().join("annotations.csv");
        write_csv(&csv_path, &annotations).unwrap();
        let content = fs::read_to_string(&csv_path).unwrap();
        assert!(content.starts_with("start,end,action,object,color,description\n"));
        assert!(content.lines().nth(1).unwrap().ends_with(",0,3,#e6194b,"));
    }

    #[test]
    fn test_empty_csv_keeps_header() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("empty.csv");

        write_csv(&csv_path, &[]).unwrap();
        assert_eq!(
            fs::read_to_string(&csv_path).unwrap(),
            "start,end,action,object,color,description\n"
        );
    }
}
