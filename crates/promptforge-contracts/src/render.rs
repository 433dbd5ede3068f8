//! Turns a [`PromptDocument`] into the instruction text sent upstream.
//!
//! One line per section. Enum-like tokens (`golden_hour`, `rule_of_thirds`)
//! are spelled out with spaces; free text is passed through as written.

use serde_json::Value;

use crate::schema::{
    DeclaredImage, Domain, GraphicDesign, ImageOrigin, PromptDocument, Subject, UiDesign,
};

const UI_DESIGN_EXCLUDES: [&str; 10] = [
    "monitor",
    "computer screen",
    "device frame",
    "laptop",
    "phone frame",
    "tablet frame",
    "display bezel",
    "physical device",
    "realistic device rendering",
    "photograph of screen",
];

const ILLUSTRATION_EXCLUDES: [&str; 5] = [
    "photorealistic",
    "realistic lighting",
    "camera effects",
    "depth of field",
    "bokeh",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedPrompt {
    pub text: String,
    pub warnings: Vec<String>,
}

pub fn render_prompt(doc: &PromptDocument) -> RenderedPrompt {
    let mut lines = Vec::new();
    let mut warnings = Vec::new();

    if let Some(intent) = non_empty(doc.user_intent.as_deref()) {
        lines.push(intent.to_string());
    }
    let domain = doc.meta.domain();
    if let Some(quality) = non_empty(doc.meta.quality.as_deref()) {
        lines.push(format!("Style: {}", spaced(quality)));
    }

    match domain {
        Domain::Photography => lines.extend(photography_lines(doc)),
        Domain::GraphicDesign => {
            if let Some(design) = doc.graphic_design.as_ref() {
                lines.extend(graphic_design_lines(design));
            }
        }
        Domain::UiDesign => {
            if let Some(design) = doc.ui_design.as_ref() {
                lines.extend(ui_design_lines(design));
            }
        }
    }

    lines.extend(image_guidance_lines(doc, &mut warnings));

    if let Some(modifiers) = doc.style_modifiers.as_ref() {
        let mut parts = Vec::new();
        if let Some(medium) = non_empty(modifiers.medium.as_deref()) {
            parts.push(spaced(medium));
        }
        if !modifiers.aesthetic.is_empty() {
            parts.push(
                modifiers
                    .aesthetic
                    .iter()
                    .map(|item| spaced(item))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }
        if !modifiers.artist_reference.is_empty() {
            parts.push(format!(
                "in the style of {}",
                modifiers.artist_reference.join(", ")
            ));
        }
        push_section(&mut lines, "Style", &parts);
    }

    let mut avoid: Vec<String> = doc
        .advanced
        .as_ref()
        .map(|advanced| advanced.negative_prompt.clone())
        .unwrap_or_default();
    match domain {
        Domain::UiDesign => avoid.extend(UI_DESIGN_EXCLUDES.iter().map(|item| item.to_string())),
        Domain::GraphicDesign => {
            if matches!(
                doc.meta.quality.as_deref(),
                Some("vector_illustration" | "flat_illustration")
            ) {
                avoid.extend(ILLUSTRATION_EXCLUDES.iter().map(|item| item.to_string()));
            }
        }
        Domain::Photography => {}
    }
    if !avoid.is_empty() {
        lines.push(format!("Avoid: {}", avoid.join(", ")));
    }

    RenderedPrompt {
        text: lines.join("\n"),
        warnings,
    }
}

fn photography_lines(doc: &PromptDocument) -> Vec<String> {
    let mut lines = Vec::new();

    for (idx, subject) in doc.subject.iter().enumerate() {
        if let Some(description) = describe_subject(subject) {
            lines.push(format!("Subject {}: {description}", idx + 1));
        }
    }

    if let Some(scene) = doc.scene.as_ref() {
        let mut parts = Vec::new();
        if let Some(location) = non_empty(scene.location.as_deref()) {
            parts.push(format!("Location: {location}"));
        }
        if let Some(time) = non_empty(scene.time.as_deref()) {
            parts.push(format!("Time: {}", spaced(time)));
        }
        if let Some(weather) = non_empty(scene.weather.as_deref()) {
            parts.push(format!("Weather: {}", spaced(weather)));
        }
        if let Some(lighting) = scene.lighting.as_ref() {
            let light: Vec<String> = [lighting.kind.as_deref(), lighting.direction.as_deref()]
                .into_iter()
                .filter_map(non_empty)
                .map(spaced)
                .collect();
            if !light.is_empty() {
                parts.push(format!("Lighting: {}", light.join(", ")));
            }
        }
        if !scene.background_elements.is_empty() {
            parts.push(format!(
                "Background: {}",
                scene.background_elements.join(", ")
            ));
        }
        if !parts.is_empty() {
            lines.push(format!("Scene: {}", parts.join("; ")));
        }
    }

    if let Some(technical) = doc.technical.as_ref() {
        let mut parts = Vec::new();
        if let Some(camera) = non_empty(technical.camera_model.as_deref()) {
            parts.push(format!("Shot on {camera}"));
        }
        if let Some(lens) = non_empty(technical.lens.as_deref()) {
            parts.push(format!("{lens} lens"));
        }
        if let Some(aperture) = non_empty(technical.aperture.as_deref()) {
            parts.push(aperture.to_string());
        }
        if let Some(film) = non_empty(technical.film_stock.as_deref()) {
            parts.push(format!("{film} film look"));
        }
        push_section(&mut lines, "Technical", &parts);
    }

    if let Some(composition) = doc.composition.as_ref() {
        let mut parts = Vec::new();
        if let Some(framing) = non_empty(composition.framing.as_deref()) {
            parts.push(spaced(framing));
        }
        if let Some(angle) = non_empty(composition.angle.as_deref()) {
            parts.push(format!("{} angle", spaced(angle)));
        }
        if let Some(focus) = non_empty(composition.focus_point.as_deref()) {
            parts.push(format!("focus on {}", spaced(focus)));
        }
        push_section(&mut lines, "Composition", &parts);
    }

    if let Some(text) = doc.text_rendering.as_ref().filter(|text| text.enabled) {
        let mut parts = Vec::new();
        if let Some(content) = non_empty(text.text_content.as_deref()) {
            parts.push(format!("text \"{content}\""));
        }
        if let Some(placement) = non_empty(text.placement.as_deref()) {
            parts.push(format!("as {}", spaced(placement)));
        }
        if let Some(font) = non_empty(text.font_style.as_deref()) {
            parts.push(format!("in {} style", spaced(font)));
        }
        if let Some(color) = non_empty(text.color.as_deref()) {
            parts.push(format!("colored {color}"));
        }
        if !parts.is_empty() {
            lines.push(format!("Text: {}", parts.join(" ")));
        }
    }

    lines
}

fn describe_subject(subject: &Subject) -> Option<String> {
    let mut head = Vec::new();
    if let Some(name) = non_empty(subject.name.as_deref()) {
        head.push(name.to_string());
    }
    if let Some(kind) = non_empty(subject.kind.as_deref()) {
        head.push(format!("({kind})"));
    }
    if let Some(description) = non_empty(subject.description.as_deref()) {
        head.push(description.to_string());
    }

    let mut traits = Vec::new();
    if let Some(age) = subject.age.as_ref().and_then(value_text) {
        traits.push(age);
    }
    if let Some(gender) = non_empty(subject.gender.as_deref()) {
        traits.push(gender.to_string());
    }
    if let Some(hair) = subject.hair.as_ref() {
        let hair: Vec<String> = [hair.color.as_deref(), hair.style.as_deref()]
            .into_iter()
            .filter_map(non_empty)
            .map(spaced)
            .collect();
        if !hair.is_empty() {
            traits.push(format!("{} hair", hair.join(" ")));
        }
    }
    if let Some(pose) = non_empty(subject.pose.as_deref()) {
        traits.push(pose.to_string());
    }
    if let Some(expression) = non_empty(subject.expression.as_deref()) {
        traits.push(format!("{expression} expression"));
    }
    if let Some(position) = non_empty(subject.position.as_deref()) {
        traits.push(format!("positioned {}", spaced(position)));
    }
    let clothes: Vec<String> = subject
        .clothing
        .iter()
        .map(|garment| {
            joined_words([
                garment.color.as_deref(),
                garment.fabric.as_deref(),
                garment.item.as_deref(),
            ])
        })
        .filter(|text| !text.is_empty())
        .collect();
    if !clothes.is_empty() {
        traits.push(format!("wearing {}", clothes.join(", ")));
    }
    let accessories: Vec<String> = subject
        .accessories
        .iter()
        .map(|accessory| {
            joined_words([
                accessory.material.as_deref(),
                accessory.color.as_deref(),
                accessory.item.as_deref(),
            ])
        })
        .filter(|text| !text.is_empty())
        .collect();
    if !accessories.is_empty() {
        traits.push(format!("with {}", accessories.join(", ")));
    }

    if head.is_empty() && traits.is_empty() {
        return None;
    }
    let mut out = head.join(" ");
    for item in traits {
        if !out.is_empty() {
            out.push_str(", ");
        }
        out.push_str(&item);
    }
    Some(out)
}

fn graphic_design_lines(design: &GraphicDesign) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(kind) = non_empty(design.design_type.as_deref()) {
        lines.push(format!("Design: {}", spaced(kind)));
    }
    if let Some(layout) = design.layout.as_ref() {
        let parts = spaced_all([
            layout.grid_system.as_deref(),
            layout.alignment.as_deref(),
            layout.spacing.as_deref(),
            layout.balance.as_deref(),
        ]);
        push_section(&mut lines, "Layout", &parts);
    }
    if let Some(hierarchy) = design.hierarchy.as_ref() {
        let mut parts = Vec::new();
        if let Some(focus) = non_empty(hierarchy.primary_focus.as_deref()) {
            parts.push(format!("focus on {}", spaced(focus)));
        }
        if let Some(flow) = non_empty(hierarchy.visual_flow.as_deref()) {
            parts.push(format!("{} flow", spaced(flow)));
        }
        push_section(&mut lines, "Hierarchy", &parts);
    }
    if let Some(colors) = design.color_scheme.as_ref() {
        let mut parts = Vec::new();
        if let Some(palette) = non_empty(colors.palette_type.as_deref()) {
            parts.push(spaced(palette));
        }
        for (label, value) in [
            ("primary", colors.primary_color.as_deref()),
            ("secondary", colors.secondary_color.as_deref()),
            ("accent", colors.accent_color.as_deref()),
        ] {
            if let Some(value) = non_empty(value) {
                parts.push(format!("{label} {}", spaced(value)));
            }
        }
        push_section(&mut lines, "Colors", &parts);
    }
    if let Some(typography) = design.typography.as_ref() {
        let mut parts = Vec::new();
        if let Some(font) = non_empty(typography.headline_font.as_deref()) {
            parts.push(format!("headline: {}", spaced(font)));
        }
        if let Some(font) = non_empty(typography.body_font.as_deref()) {
            parts.push(format!("body: {}", spaced(font)));
        }
        push_section(&mut lines, "Typography", &parts);
    }
    let elements: Vec<String> = design
        .elements
        .iter()
        .filter(|element| !element.kind.trim().is_empty())
        .map(|element| {
            let mut text = spaced(&element.kind);
            if let Some(content) = non_empty(element.content.as_deref()) {
                text.push_str(&format!(" '{content}'"));
            }
            if let Some(style) = non_empty(element.style.as_deref()) {
                text.push_str(&format!(" ({})", spaced(style)));
            }
            if let Some(placement) = non_empty(element.placement.as_deref()) {
                text.push_str(&format!(" [{}]", spaced(placement)));
            }
            text
        })
        .collect();
    push_section(&mut lines, "Elements", &elements);
    if let Some(style) = design.visual_style.as_ref() {
        let mut parts = Vec::new();
        if let Some(mood) = non_empty(style.mood.as_deref()) {
            parts.push(mood.to_string());
        }
        if let Some(texture) = non_empty(style.texture.as_deref()) {
            parts.push(spaced(texture));
        }
        if let Some(effects) = non_empty(style.effects.as_deref()).filter(|value| *value != "none")
        {
            parts.push(spaced(effects));
        }
        push_section(&mut lines, "Style", &parts);
    }

    lines
}

fn ui_design_lines(design: &UiDesign) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(kind) = non_empty(design.component_type.as_deref()) {
        lines.push(format!("UI Component: {}", spaced(kind)));
    }
    if let Some(layout) = design.layout.as_ref() {
        let mut parts = Vec::new();
        if let Some(structure) = non_empty(layout.structure.as_deref()) {
            parts.push(spaced(structure));
        }
        if let Some(columns) = layout.columns.as_ref().and_then(value_text) {
            parts.push(format!("{columns} columns"));
        }
        if let Some(spacing) = non_empty(layout.spacing.as_deref()) {
            parts.push(spaced(spacing));
        }
        push_section(&mut lines, "Layout", &parts);
    }
    let components: Vec<String> = design
        .components
        .iter()
        .filter(|component| !component.kind.trim().is_empty())
        .map(|component| {
            let mut text = spaced(&component.kind);
            if let Some(variant) = non_empty(component.variant.as_deref()) {
                text.push_str(&format!(" ({variant})"));
            }
            if let Some(state) =
                non_empty(component.state.as_deref()).filter(|state| *state != "default")
            {
                text.push_str(&format!(" [{state}]"));
            }
            if let Some(size) = component.size.as_ref().and_then(value_text) {
                text.push_str(&format!(" size: {size}"));
            }
            if let Some(style) = non_empty(component.style.as_deref()) {
                text.push_str(&format!(" style: {}", spaced(style)));
            }
            text
        })
        .collect();
    push_section(&mut lines, "Components", &components);
    if let Some(colors) = design.color_system.as_ref() {
        let mut parts = Vec::new();
        if let Some(mode) = non_empty(colors.mode.as_deref()) {
            parts.push(spaced(mode));
        }
        if let Some(primary) = non_empty(colors.primary.as_deref()) {
            parts.push(format!("primary {primary}"));
        }
        push_section(&mut lines, "Colors", &parts);
    }
    if let Some(typography) = design.typography_system.as_ref() {
        let parts = spaced_all([
            typography.scale.as_deref(),
            typography.font_family.as_deref(),
        ]);
        push_section(&mut lines, "Typography", &parts);
    }
    if let Some(states) = design.interaction_states.as_ref() {
        let mut parts = Vec::new();
        if let Some(hover) = non_empty(states.hover_effect.as_deref()).filter(|v| *v != "none") {
            parts.push(format!("hover: {}", spaced(hover)));
        }
        if let Some(focus) = non_empty(states.focus_style.as_deref()).filter(|v| *v != "none") {
            parts.push(format!("focus: {}", spaced(focus)));
        }
        push_section(&mut lines, "Interactions", &parts);
    }
    if let Some(styling) = design.styling.as_ref() {
        let mut parts = Vec::new();
        if let Some(radius) = non_empty(styling.border_radius.as_deref()) {
            parts.push(format!("radius: {}", spaced(radius)));
        }
        if let Some(shadow) = non_empty(styling.shadow.as_deref()).filter(|v| *v != "none") {
            parts.push(spaced(shadow));
        }
        push_section(&mut lines, "Styling", &parts);
    }
    if let Some(icons) = design.iconography.as_ref() {
        let mut parts = Vec::new();
        if let Some(style) = non_empty(icons.style.as_deref()) {
            parts.push(style.to_string());
        }
        if let Some(size) = icons.size.as_ref().and_then(value_text) {
            parts.push(format!("{size} size"));
        }
        push_section(&mut lines, "Icons", &parts);
    }
    if let Some(system) = non_empty(design.design_system.as_deref()) {
        lines.push(format!("Design System: {}", spaced(system)));
    }

    lines
}

/// Lock, reference and edit instructions, in that priority order.
fn image_guidance_lines(doc: &PromptDocument, warnings: &mut Vec<String>) -> Vec<String> {
    let mut lines = Vec::new();

    let locked: Vec<&str> = doc
        .lock
        .as_ref()
        .map(|lock| {
            lock.elements
                .iter()
                .map(String::as_str)
                .filter(|item| !item.trim().is_empty())
                .collect()
        })
        .unwrap_or_default();
    if !locked.is_empty() {
        lines.push(format!("Preserve exactly: {}", locked.join(", ")));
    }

    let declared = doc.declared_images();
    for (idx, row) in declared.iter().enumerate() {
        lines.push(describe_reference(idx + 1, row));
    }

    for edit in &doc.edits {
        let target = non_empty(edit.target.as_deref());
        if let Some(target) = target {
            if doc.lock.as_ref().is_some_and(|lock| lock.covers(target)) {
                warnings.push(format!("edit on `{target}` dropped: target is locked"));
                continue;
            }
            let governed = declared.iter().any(|row| {
                row.image
                    .target
                    .as_deref()
                    .is_some_and(|governs| governs.trim().eq_ignore_ascii_case(target.trim()))
            });
            if governed {
                warnings.push(format!(
                    "edit on `{target}` dropped: a reference image governs it"
                ));
                continue;
            }
        }
        let mut text = String::from("Edit:");
        if let Some(action) = non_empty(edit.action.as_deref()) {
            text.push(' ');
            text.push_str(&spaced(action));
        }
        if let Some(target) = target {
            text.push(' ');
            text.push_str(&spaced(target));
        }
        if let Some(description) = non_empty(edit.description.as_deref()) {
            text.push_str(&format!(" ({description})"));
        }
        if text != "Edit:" {
            lines.push(text);
        }
    }

    lines
}

fn describe_reference(number: usize, row: &DeclaredImage) -> String {
    let image = &row.image;
    let role = match row.origin {
        ImageOrigin::BaseImage => "base image to edit".to_string(),
        ImageOrigin::Subject(idx) => format!("{} reference for subject {}", image.usage_label(), idx + 1),
        ImageOrigin::InputImage | ImageOrigin::Reference(_) => {
            format!("{} reference", image.usage_label())
        }
    };
    let mut text = format!("Image {number}: {role}");
    if let Some(strength) = image.strength {
        text.push_str(&format!(", strength {strength}"));
    }
    if let Some(target) = non_empty(image.target.as_deref()) {
        text.push_str(&format!(", applies to {}", spaced(target)));
    }
    if let Some(description) = non_empty(image.description.as_deref()) {
        text.push_str(&format!(" ({description})"));
    }
    text
}

fn push_section(lines: &mut Vec<String>, label: &str, parts: &[String]) {
    if !parts.is_empty() {
        lines.push(format!("{label}: {}", parts.join(", ")));
    }
}

fn spaced_all<const N: usize>(values: [Option<&str>; N]) -> Vec<String> {
    values.into_iter().filter_map(non_empty).map(spaced).collect()
}

fn joined_words<const N: usize>(values: [Option<&str>; N]) -> String {
    values
        .into_iter()
        .filter_map(non_empty)
        .collect::<Vec<_>>()
        .join(" ")
}

fn spaced(value: &str) -> String {
    value.trim().replace('_', " ")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
