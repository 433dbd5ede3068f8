use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn expected(values: &[&str]) -> String {
    values.join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Domain {
    #[default]
    Photography,
    GraphicDesign,
    UiDesign,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Self::Photography, Self::GraphicDesign, Self::UiDesign];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photography => "photography",
            Self::GraphicDesign => "graphic_design",
            Self::UiDesign => "ui_design",
        }
    }
}

impl TryFrom<String> for Domain {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|domain| domain.as_str() == value)
            .ok_or_else(|| {
                let names = Self::ALL.map(Domain::as_str);
                format!(
                    "unsupported domain `{value}` (expected one of {})",
                    expected(&names)
                )
            })
    }
}

impl From<Domain> for String {
    fn from(value: Domain) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AspectRatio {
    Square,
    Portrait2x3,
    Landscape3x2,
    Portrait3x4,
    Landscape4x3,
    Portrait4x5,
    Landscape5x4,
    Portrait9x16,
    Landscape16x9,
    Ultrawide21x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 10] = [
        Self::Square,
        Self::Portrait2x3,
        Self::Landscape3x2,
        Self::Portrait3x4,
        Self::Landscape4x3,
        Self::Portrait4x5,
        Self::Landscape5x4,
        Self::Portrait9x16,
        Self::Landscape16x9,
        Self::Ultrawide21x9,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait2x3 => "2:3",
            Self::Landscape3x2 => "3:2",
            Self::Portrait3x4 => "3:4",
            Self::Landscape4x3 => "4:3",
            Self::Portrait4x5 => "4:5",
            Self::Landscape5x4 => "5:4",
            Self::Portrait9x16 => "9:16",
            Self::Landscape16x9 => "16:9",
            Self::Ultrawide21x9 => "21:9",
        }
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == value)
            .ok_or_else(|| {
                let names = Self::ALL.map(AspectRatio::as_str);
                format!(
                    "unsupported aspect_ratio `{value}` (expected one of {})",
                    expected(&names)
                )
            })
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ImageSize {
    #[default]
    OneK,
    TwoK,
    FourK,
}

impl ImageSize {
    pub const ALL: [ImageSize; 3] = [Self::OneK, Self::TwoK, Self::FourK];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }
}

impl TryFrom<String> for ImageSize {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == value)
            .ok_or_else(|| {
                let names = Self::ALL.map(ImageSize::as_str);
                format!(
                    "unsupported image_size `{value}` (expected one of {})",
                    expected(&names)
                )
            })
    }
}

impl From<ImageSize> for String {
    fn from(value: ImageSize) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SafetyFilter {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

impl SafetyFilter {
    pub const ALL: [SafetyFilter; 4] = [
        Self::BlockNone,
        Self::BlockOnlyHigh,
        Self::BlockMediumAndAbove,
        Self::BlockLowAndAbove,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlockNone => "block_none",
            Self::BlockOnlyHigh => "block_only_high",
            Self::BlockMediumAndAbove => "block_medium_and_above",
            Self::BlockLowAndAbove => "block_low_and_above",
        }
    }

    /// Threshold name understood by the Gemini `safetySettings` block.
    pub fn upstream_threshold(self) -> &'static str {
        match self {
            Self::BlockNone => "BLOCK_NONE",
            Self::BlockOnlyHigh => "BLOCK_ONLY_HIGH",
            Self::BlockMediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            Self::BlockLowAndAbove => "BLOCK_LOW_AND_ABOVE",
        }
    }
}

impl TryFrom<String> for SafetyFilter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|filter| filter.as_str() == value)
            .ok_or_else(|| {
                let names = Self::ALL.map(SafetyFilter::as_str);
                format!(
                    "unsupported safety_filter `{value}` (expected one of {})",
                    expected(&names)
                )
            })
    }
}

impl From<SafetyFilter> for String {
    fn from(value: SafetyFilter) -> Self {
        value.as_str().to_string()
    }
}

pub const MAX_STEPS: u32 = 150;
pub const MAX_GUIDANCE_SCALE: f64 = 30.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_filter: Option<SafetyFilter>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Meta {
    pub fn domain(&self) -> Domain {
        self.domain.unwrap_or_default()
    }

    pub fn image_size(&self) -> ImageSize {
        self.image_size.unwrap_or_default()
    }

    /// Range checks serde cannot express on plain numbers.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(steps) = self.steps {
            if !(1..=MAX_STEPS).contains(&steps) {
                return Err(format!("meta.steps {steps} outside [1, {MAX_STEPS}]"));
            }
        }
        if let Some(scale) = self.guidance_scale {
            if !scale.is_finite() || !(0.0..=MAX_GUIDANCE_SCALE).contains(&scale) {
                return Err(format!(
                    "meta.guidance_scale {scale} outside [0, {MAX_GUIDANCE_SCALE}]"
                ));
            }
        }
        Ok(())
    }
}
