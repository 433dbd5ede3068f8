use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::image_ref::ImageRef;
use super::meta::Meta;

type Extra = IndexMap<String, Value>;

/// The structured request describing one image to generate.
///
/// Every record keeps fields it does not know about in `extra`, so documents
/// written against newer prompt schemas survive a round trip untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_intent: Option<String>,
    pub meta: Meta,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subject: Vec<Subject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<Scene>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composition: Option<Composition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical: Option<Technical>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_rendering: Option<TextRendering>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_modifiers: Option<StyleModifiers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced: Option<Advanced>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphic_design: Option<GraphicDesign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_design: Option<UiDesign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_image: Option<ImageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_image: Option<ImageRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reference_images: Vec<ImageRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub edits: Vec<Edit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<Lock>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Where in the document an image reference was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    InputImage,
    Subject(usize),
    BaseImage,
    Reference(usize),
}

impl fmt::Display for ImageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputImage => f.write_str("input_image"),
            Self::Subject(idx) => write!(f, "subject[{idx}].input_image"),
            Self::BaseImage => f.write_str("base_image"),
            Self::Reference(idx) => write!(f, "reference_images[{idx}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredImage {
    pub origin: ImageOrigin,
    pub image: ImageRef,
}

impl PromptDocument {
    /// Image references in attachment order: `input_image`, each subject's
    /// `input_image`, `base_image`, then `reference_images`.
    pub fn declared_images(&self) -> Vec<DeclaredImage> {
        let mut out = Vec::new();
        if let Some(image) = self.input_image.as_ref() {
            out.push(DeclaredImage {
                origin: ImageOrigin::InputImage,
                image: image.clone(),
            });
        }
        for (idx, subject) in self.subject.iter().enumerate() {
            if let Some(image) = subject.input_image.as_ref() {
                out.push(DeclaredImage {
                    origin: ImageOrigin::Subject(idx),
                    image: image.clone(),
                });
            }
        }
        if let Some(image) = self.base_image.as_ref() {
            out.push(DeclaredImage {
                origin: ImageOrigin::BaseImage,
                image: image.clone(),
            });
        }
        for (idx, image) in self.reference_images.iter().enumerate() {
            out.push(DeclaredImage {
                origin: ImageOrigin::Reference(idx),
                image: image.clone(),
            });
        }
        out
    }

    pub fn is_hybrid(&self) -> bool {
        let has_single = self.input_image.is_some()
            || self.subject.iter().any(|subject| subject.input_image.is_some());
        has_single && (self.base_image.is_some() || !self.reference_images.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hair: Option<Hair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clothing: Vec<Garment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accessories: Vec<Accessory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_image: Option<ImageRef>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hair {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Garment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fabric: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Accessory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lighting: Option<Lighting>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub background_elements: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lighting {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Composition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_point: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Technical {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub film_stock: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextRendering {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleModifiers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aesthetic: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artist_reference: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Advanced {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub negative_prompt: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicDesign {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<DesignLayout>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<Hierarchy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<ColorScheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typography: Option<Typography>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<DesignElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_style: Option<VisualStyle>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignLayout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hierarchy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_focus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_flow: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScheme {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub palette_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Typography {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline_font: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_font: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignElement {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effects: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiDesign {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<UiLayout>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<UiComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_system: Option<ColorSystem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typography_system: Option<TypographySystem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_states: Option<InteractionStates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styling: Option<Styling>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iconography: Option<Iconography>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_system: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiLayout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiComponent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSystem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypographySystem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionStates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover_effect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_style: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Styling {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Iconography {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Value>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A localized change requested in precision-edit mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Edit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Elements that must come through an edit unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lock {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Lock {
    pub fn covers(&self, target: &str) -> bool {
        let target = target.trim();
        self.elements
            .iter()
            .any(|element| element.trim().eq_ignore_ascii_case(target))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ImageOrigin, PromptDocument};

    #[test]
    fn declared_images_follow_attachment_order() -> anyhow::Result<()> {
        let doc: PromptDocument = serde_json::from_value(json!({
            "reference_images": ["ref-a.png", { "path": "ref-b.png", "usage_type": "style" }],
            "base_image": "base.png",
            "subject": [
                { "name": "first" },
                { "name": "second", "input_image": { "path": "second.png", "usage_type": "identity" } }
            ],
            "input_image": "top.png"
        }))?;
        let declared = doc.declared_images();
        let paths: Vec<&str> = declared.iter().map(|row| row.image.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["top.png", "second.png", "base.png", "ref-a.png", "ref-b.png"]
        );
        assert_eq!(declared[1].origin, ImageOrigin::Subject(1));
        assert_eq!(declared[4].origin.to_string(), "reference_images[1]");
        assert!(doc.is_hybrid());
        Ok(())
    }

    #[test]
    fn unknown_fields_round_trip() -> anyhow::Result<()> {
        let raw = json!({
            "meta": { "aspect_ratio": "1:1", "lens_profile": "x" },
            "scene": { "location": "harbor", "sound": "gulls" },
            "future_section": { "anything": [1, 2, 3] }
        });
        let doc: PromptDocument = serde_json::from_value(raw.clone())?;
        assert_eq!(serde_json::to_value(&doc)?, raw);
        Ok(())
    }

    #[test]
    fn lock_matches_targets_case_insensitively() -> anyhow::Result<()> {
        let doc: PromptDocument =
            serde_json::from_value(json!({ "lock": { "elements": ["Face", "logo"] } }))?;
        let lock = doc.lock.unwrap_or_default();
        assert!(lock.covers("face"));
        assert!(lock.covers(" LOGO "));
        assert!(!lock.covers("background"));
        Ok(())
    }

    #[test]
    fn wrong_types_on_known_fields_fail() {
        assert!(serde_json::from_value::<PromptDocument>(json!({ "subject": "one" })).is_err());
        assert!(
            serde_json::from_value::<PromptDocument>(json!({ "scene": { "location": 5 } }))
                .is_err()
        );
    }
}
