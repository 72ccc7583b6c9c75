//! Categorical encoders fitted at training time

use serde::{Deserialize, Serialize};

/// Label encoder over a fixed, ordered class list
///
/// A label's code is its index in `classes`. Labels not seen during
/// training encode to 0 instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LabelEncoder {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    /// Code for a label seen during training
    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }

    /// Code for a label, 0 when unseen
    pub fn encode_or_default(&self, label: &str) -> f64 {
        match self.encode(label) {
            Some(code) => code as f64,
            None => {
                log::debug!("Unseen category '{}', encoding as 0", label);
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels_use_class_index() {
        let encoder = LabelEncoder::new(["ALO", "HAM", "VER"]);
        assert_eq!(encoder.encode("HAM"), Some(1));
        assert_eq!(encoder.encode_or_default("VER"), 2.0);
    }

    #[test]
    fn test_unseen_label_degrades_to_zero() {
        let encoder = LabelEncoder::new(["Ferrari", "Mercedes"]);
        assert_eq!(encoder.encode("Audi"), None);
        assert_eq!(encoder.encode_or_default("Audi"), 0.0);

        let empty = LabelEncoder::default();
        assert!(empty.classes.is_empty());
        assert_eq!(empty.encode_or_default("anything"), 0.0);
    }
}
