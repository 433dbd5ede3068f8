mod document;
mod image_ref;
mod meta;
mod resolution;

pub use document::{
    Accessory, Advanced, ColorScheme, ColorSystem, Composition, DeclaredImage, DesignElement,
    DesignLayout, Edit, Garment, GraphicDesign, Hair, Hierarchy, Iconography, ImageOrigin,
    InteractionStates, Lighting, Lock, PromptDocument, Scene, StyleModifiers, Styling, Subject,
    Technical, TextRendering, Typography, TypographySystem, UiComponent, UiDesign, UiLayout,
    VisualStyle,
};
pub use image_ref::{ImageRef, Strength, UsageType};
pub use meta::{AspectRatio, Domain, ImageSize, Meta, SafetyFilter, MAX_GUIDANCE_SCALE, MAX_STEPS};
pub use resolution::{resolution, Resolution};
