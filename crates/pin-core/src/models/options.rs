use serde::{Deserialize, Serialize};

/// A selectable attribute category, keyed by `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct AttributeOption {
    pub value: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl AttributeOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            kind: kind.into(),
        }
    }
}

/// One value of an attribute.
///
/// `id` is assigned by the local store when missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct OptionValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub attribute: String,
    pub value: String,
    pub visual: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl OptionValue {
    pub fn new(
        attribute: impl Into<String>,
        value: impl Into<String>,
        visual: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            attribute: attribute.into(),
            value: value.into(),
            visual: visual.into(),
            kind: kind.into(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_type_field_name() {
        let attr = AttributeOption::new("color", "Color", "swatch");
        assert_eq!(
            serde_json::to_value(&attr).unwrap(),
            json!({ "value": "color", "label": "Color", "type": "swatch" })
        );
    }

    #[test]
    fn test_option_without_id_parses() {
        let opt: OptionValue = serde_json::from_value(json!({
            "attribute": "color",
            "value": "red",
            "visual": "#ff0000",
            "type": "swatch"
        }))
        .unwrap();
        assert_eq!(opt.id, None);
        assert_eq!(opt.visual, "#ff0000");
    }
}
