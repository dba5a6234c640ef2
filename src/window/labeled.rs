// Labeled window - a window with labels, tags and a trainable flag
//
// Label values are restricted to text or numbers so that a labeled window
// set can always be written out as simple rows and columns.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::WindowError;

use super::{DataWindow, WindowPayload};

/// Label value: text or a finite number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Text(String),
    Number(f64),
}

impl LabelValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            LabelValue::Text(text) => Some(text),
            LabelValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            LabelValue::Number(n) => Some(*n),
            LabelValue::Text(_) => None,
        }
    }
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Text(text) => write!(f, "{}", text),
            LabelValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for LabelValue {
    fn from(text: &str) -> Self {
        LabelValue::Text(text.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(text: String) -> Self {
        LabelValue::Text(text)
    }
}

impl From<f64> for LabelValue {
    fn from(n: f64) -> Self {
        LabelValue::Number(n)
    }
}

pub type Labels = BTreeMap<String, LabelValue>;
pub type Tags = BTreeMap<String, String>;

fn validate_labels(labels: &Labels) -> Result<(), WindowError> {
    for (name, value) in labels {
        if name.is_empty() {
            return Err(WindowError::invalid("label names must not be empty"));
        }
        if let LabelValue::Number(n) = value {
            if !n.is_finite() {
                return Err(WindowError::invalid(format!(
                    "label '{}' has non-finite value {}",
                    name, n
                )));
            }
        }
    }
    Ok(())
}

/// Convert a JSON object into labels, rejecting anything but strings and numbers.
pub fn labels_from_json(value: &serde_json::Value) -> Result<Labels, WindowError> {
    let object = value
        .as_object()
        .ok_or_else(|| WindowError::invalid("labels must be a JSON object"))?;
    let mut labels = Labels::new();
    for (name, value) in object {
        let label = match value {
            serde_json::Value::String(text) => LabelValue::Text(text.clone()),
            serde_json::Value::Number(n) => LabelValue::Number(n.as_f64().ok_or_else(|| {
                WindowError::invalid(format!("label '{}' is not representable as f64", name))
            })?),
            other => {
                return Err(WindowError::invalid(format!(
                    "label '{}' must be a string or number, got {}",
                    name, other
                )))
            }
        };
        labels.insert(name.clone(), label);
    }
    validate_labels(&labels)?;
    Ok(labels)
}

/// A window paired with labels, tags and a trainable flag
pub struct LabeledWindow<P: WindowPayload> {
    window: Arc<DataWindow<P>>,
    labels: Labels,
    tags: Tags,
    trainable: bool,
}

impl<P: WindowPayload> LabeledWindow<P> {
    pub fn new(window: Arc<DataWindow<P>>, labels: Labels) -> Result<Self, WindowError> {
        validate_labels(&labels)?;
        Ok(Self {
            window,
            labels,
            tags: Tags::new(),
            trainable: true,
        })
    }

    /// Single-label convenience constructor
    pub fn with_label(
        window: Arc<DataWindow<P>>,
        name: &str,
        value: impl Into<LabelValue>,
    ) -> Result<Self, WindowError> {
        let mut labels = Labels::new();
        labels.insert(name.to_string(), value.into());
        Self::new(window, labels)
    }

    pub fn tagged(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn window(&self) -> &Arc<DataWindow<P>> {
        &self.window
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn label(&self, name: &str) -> Option<&LabelValue> {
        self.labels.get(name)
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn is_trainable(&self) -> bool {
        self.trainable
    }

    /// Replace the whole label set
    pub fn set_labels(&mut self, labels: Labels) -> Result<(), WindowError> {
        validate_labels(&labels)?;
        self.labels = labels;
        Ok(())
    }

    /// Replace the whole tag set
    pub fn set_tags(&mut self, tags: Tags) {
        self.tags = tags;
    }

    pub fn set_trainable(&mut self, trainable: bool) {
        self.trainable = trainable;
    }

    /// Same labels, tags and trainable flag over a different window
    pub fn with_window<Q: WindowPayload>(&self, window: Arc<DataWindow<Q>>) -> LabeledWindow<Q> {
        LabeledWindow {
            window,
            labels: self.labels.clone(),
            tags: self.tags.clone(),
            trainable: self.trainable,
        }
    }

    pub fn labels_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.labels).unwrap_or(serde_json::Value::Null)
    }
}

impl<P: WindowPayload> Clone for LabeledWindow<P> {
    fn clone(&self) -> Self {
        Self {
            window: Arc::clone(&self.window),
            labels: self.labels.clone(),
            tags: self.tags.clone(),
            trainable: self.trainable,
        }
    }
}

impl<P: WindowPayload> fmt::Debug for LabeledWindow<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabeledWindow")
            .field("window", &self.window)
            .field("labels", &self.labels)
            .field("tags", &self.tags)
            .field("trainable", &self.trainable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheContext;
    use crate::window::ScalarWindow;
    use serde_json::json;

    fn window(ctx: &CacheContext) -> Arc<ScalarWindow> {
        Arc::new(ScalarWindow::from_samples(ctx, 0.0, 100.0, vec![0.0; 10]).unwrap())
    }

    #[test]
    fn test_labels_and_defaults() {
        let ctx = CacheContext::default();
        let labeled = LabeledWindow::with_label(window(&ctx), "state", "normal").unwrap();
        assert_eq!(labeled.label("state").and_then(|v| v.as_text()), Some("normal"));
        assert!(labeled.is_trainable());
        assert!(labeled.tags().is_empty());
    }

    #[test]
    fn test_labels_from_json() {
        let labels = labels_from_json(&json!({ "state": "abnormal", "rpm": 1200 })).unwrap();
        assert_eq!(labels["rpm"].as_number(), Some(1200.0));
        assert_eq!(labels["state"], LabelValue::Text("abnormal".into()));

        assert!(labels_from_json(&json!({ "bad": [1, 2] })).is_err());
        assert!(labels_from_json(&json!({ "bad": null })).is_err());
        assert!(labels_from_json(&json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        let ctx = CacheContext::default();
        assert!(LabeledWindow::with_label(window(&ctx), "x", f64::NAN).is_err());
    }

    #[test]
    fn test_whole_field_replacement() {
        let ctx = CacheContext::default();
        let mut labeled = LabeledWindow::with_label(window(&ctx), "a", 1.0).unwrap();
        let mut replacement = Labels::new();
        replacement.insert("b".to_string(), "two".into());
        labeled.set_labels(replacement).unwrap();
        assert!(labeled.label("a").is_none());
        assert_eq!(labeled.label("b").map(|v| v.to_string()), Some("two".to_string()));

        labeled.set_trainable(false);
        assert!(!labeled.is_trainable());
    }

    #[test]
    fn test_with_window_keeps_metadata() {
        let ctx = CacheContext::default();
        let mut tags = Tags::new();
        tags.insert("sensor".to_string(), "mic-1".to_string());
        let mut labeled = LabeledWindow::with_label(window(&ctx), "a", 1.0)
            .unwrap()
            .tagged(tags);
        labeled.set_trainable(false);

        let other = window(&ctx);
        let moved = labeled.with_window(Arc::clone(&other));
        assert!(Arc::ptr_eq(moved.window(), &other));
        assert_eq!(moved.labels(), labeled.labels());
        assert_eq!(moved.tags()["sensor"], "mic-1");
        assert!(!moved.is_trainable());
    }

    #[test]
    fn test_labels_serialize_untagged() {
        let ctx = CacheContext::default();
        let labeled = LabeledWindow::with_label(window(&ctx), "rpm", 30.0).unwrap();
        assert_eq!(labeled.labels_json(), json!({ "rpm": 30.0 }));
    }
}
