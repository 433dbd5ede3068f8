use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// How much of a reference image survives into the output, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Strength(f64);

impl Strength {
    pub fn new(value: f64) -> Result<Self, String> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("strength {value} outside [0, 1]"))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Strength {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Strength> for f64 {
    fn from(value: Strength) -> Self {
        value.0
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role a reference image plays. Unrecognised roles are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UsageType {
    Identity,
    Pose,
    Style,
    Composition,
    ColorPalette,
    Lighting,
    Background,
    Expression,
    Clothing,
    Texture,
    EditBase,
    Other(String),
}

impl UsageType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Identity => "identity",
            Self::Pose => "pose",
            Self::Style => "style",
            Self::Composition => "composition",
            Self::ColorPalette => "color_palette",
            Self::Lighting => "lighting",
            Self::Background => "background",
            Self::Expression => "expression",
            Self::Clothing => "clothing",
            Self::Texture => "texture",
            Self::EditBase => "edit_base",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Advisory strength window. Values outside it are allowed.
    pub fn recommended_strength(&self) -> Option<(f64, f64)> {
        match self {
            Self::Identity => Some((0.75, 1.0)),
            Self::EditBase => Some((0.8, 1.0)),
            Self::Background | Self::Expression | Self::Clothing => Some((0.5, 0.9)),
            Self::Pose | Self::Composition => Some((0.4, 0.8)),
            Self::Style | Self::Lighting | Self::Texture => Some((0.3, 0.7)),
            Self::ColorPalette => Some((0.2, 0.6)),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for UsageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "identity" => Self::Identity,
            "pose" => Self::Pose,
            "style" => Self::Style,
            "composition" => Self::Composition,
            "color_palette" => Self::ColorPalette,
            "lighting" => Self::Lighting,
            "background" => Self::Background,
            "expression" => Self::Expression,
            "clothing" => Self::Clothing,
            "texture" => Self::Texture,
            "edit_base" => Self::EditBase,
            _ => Self::Other(value),
        }
    }
}

impl From<UsageType> for String {
    fn from(value: UsageType) -> Self {
        match value {
            UsageType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for UsageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().replace('_', " "))
    }
}

/// A declared image: `input_image`, `base_image`, or an entry of
/// `reference_images`. A bare string is shorthand for `{ "path": ... }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageRef {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_type: Option<UsageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<Strength>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

#[derive(Deserialize)]
struct ImageRefFields {
    path: String,
    #[serde(default)]
    usage_type: Option<UsageType>,
    #[serde(default)]
    strength: Option<Strength>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(flatten)]
    extra: IndexMap<String, Value>,
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        match raw {
            Value::String(path) => Ok(Self {
                path,
                ..Self::default()
            }),
            Value::Object(_) => {
                let fields: ImageRefFields =
                    serde_json::from_value(raw).map_err(serde::de::Error::custom)?;
                Ok(Self {
                    path: fields.path,
                    usage_type: fields.usage_type,
                    strength: fields.strength,
                    description: fields.description,
                    target: fields.target,
                    extra: fields.extra,
                })
            }
            other => Err(serde::de::Error::custom(format!(
                "image reference must be a path string or an object, got {other}"
            ))),
        }
    }
}

impl ImageRef {
    pub fn usage_label(&self) -> String {
        self.usage_type
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "reference".to_string())
    }

    /// Advisory note when `strength` sits outside the usage's usual window.
    pub fn strength_advisory(&self) -> Option<String> {
        let strength = self.strength?.value();
        let (low, high) = self.usage_type.as_ref()?.recommended_strength()?;
        if strength >= low && strength <= high {
            return None;
        }
        Some(format!(
            "strength {strength} for `{}` is outside the recommended {low}-{high} for {}",
            self.path,
            self.usage_label()
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ImageRef, Strength, UsageType};

    #[test]
    fn string_shorthand_becomes_path() -> anyhow::Result<()> {
        let image: ImageRef = serde_json::from_value(json!("portrait.jpg"))?;
        assert_eq!(image.path, "portrait.jpg");
        assert!(image.usage_type.is_none());
        assert_eq!(serde_json::to_value(&image)?, json!({ "path": "portrait.jpg" }));
        Ok(())
    }

    #[test]
    fn object_form_keeps_unknown_fields() -> anyhow::Result<()> {
        let image: ImageRef = serde_json::from_value(json!({
            "path": "face.png",
            "usage_type": "identity",
            "strength": 0.9,
            "crop_hint": "upper_body"
        }))?;
        assert_eq!(image.usage_type, Some(UsageType::Identity));
        assert_eq!(image.strength.map(Strength::value), Some(0.9));
        assert_eq!(image.extra["crop_hint"], json!("upper_body"));
        Ok(())
    }

    #[test]
    fn strength_out_of_range_is_rejected_with_reason() {
        for bad in [json!(1.2), json!(-0.1)] {
            let err = serde_json::from_value::<ImageRef>(json!({ "path": "a.png", "strength": bad }))
                .err()
                .map(|err| err.to_string())
                .unwrap_or_default();
            assert!(err.contains("outside [0, 1]"), "{err}");
        }
        assert!(Strength::new(0.0).is_ok());
        assert!(Strength::new(1.0).is_ok());
        assert!(Strength::new(f64::NAN).is_err());
    }

    #[test]
    fn unknown_usage_type_is_preserved() -> anyhow::Result<()> {
        let image: ImageRef =
            serde_json::from_value(json!({ "path": "a.png", "usage_type": "mood_board" }))?;
        assert_eq!(image.usage_type, Some(UsageType::Other("mood_board".to_string())));
        assert_eq!(serde_json::to_value(&image)?["usage_type"], json!("mood_board"));
        Ok(())
    }

    #[test]
    fn usage_type_spelling_survives_serialization() -> anyhow::Result<()> {
        for raw in ["color", "Color", "Identity", " style"] {
            let image: ImageRef =
                serde_json::from_value(json!({ "path": "a.png", "usage_type": raw }))?;
            assert_eq!(image.usage_type, Some(UsageType::Other(raw.to_string())));
            assert_eq!(serde_json::to_value(&image)?["usage_type"], json!(raw));
        }
        let known: ImageRef =
            serde_json::from_value(json!({ "path": "a.png", "usage_type": "color_palette" }))?;
        assert_eq!(known.usage_type, Some(UsageType::ColorPalette));
        Ok(())
    }

    #[test]
    fn advisory_only_outside_recommended_window() -> anyhow::Result<()> {
        let inside: ImageRef = serde_json::from_value(
            json!({ "path": "a.png", "usage_type": "style", "strength": 0.5 }),
        )?;
        assert!(inside.strength_advisory().is_none());
        let outside: ImageRef = serde_json::from_value(
            json!({ "path": "a.png", "usage_type": "identity", "strength": 0.2 }),
        )?;
        assert!(outside
            .strength_advisory()
            .map(|note| note.contains("recommended"))
            .unwrap_or(false));
        Ok(())
    }

    #[test]
    fn non_path_values_are_rejected() {
        assert!(serde_json::from_value::<ImageRef>(json!(42)).is_err());
        assert!(serde_json::from_value::<ImageRef>(json!({ "usage_type": "pose" })).is_err());
    }
}
