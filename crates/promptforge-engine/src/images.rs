use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, ImageReader};
use promptforge_contracts::schema::DeclaredImage;
use promptforge_contracts::PipelineError;

/// A reference image read from disk, ready to attach to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    pub path: PathBuf,
    /// Declaration this file satisfies, e.g. `reference_images[0]`.
    /// `None` for supplied files no declaration asked for.
    pub declared_as: Option<String>,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub supplied_index: usize,
    pub declared_as: Option<String>,
}

/// Pairs declarations with supplied files.
///
/// Declared paths that name a supplied file bind to it directly; the rest
/// take the remaining supplied files in order. Leftover files come last.
pub fn bind_images(
    declared: &[DeclaredImage],
    supplied: &[PathBuf],
) -> Result<Vec<Binding>, PipelineError> {
    let mut used = vec![false; supplied.len()];
    let mut assigned: Vec<Option<usize>> = vec![None; declared.len()];

    for (slot, row) in declared.iter().enumerate() {
        let found = supplied
            .iter()
            .enumerate()
            .find(|(idx, path)| !used[*idx] && same_file(&row.image.path, path));
        if let Some((idx, _)) = found {
            used[idx] = true;
            assigned[slot] = Some(idx);
        }
    }

    for (slot, row) in declared.iter().enumerate() {
        if assigned[slot].is_some() {
            continue;
        }
        let Some(idx) = used.iter().position(|taken| !taken) else {
            return Err(PipelineError::MissingFile {
                declared: row.image.path.clone(),
                origin: row.origin.to_string(),
                supplied: supplied.len(),
            });
        };
        used[idx] = true;
        assigned[slot] = Some(idx);
    }

    let mut bindings: Vec<Binding> = declared
        .iter()
        .zip(assigned)
        .filter_map(|(row, idx)| {
            idx.map(|supplied_index| Binding {
                supplied_index,
                declared_as: Some(row.origin.to_string()),
            })
        })
        .collect();
    bindings.extend(
        used.iter()
            .enumerate()
            .filter(|(_, taken)| !**taken)
            .map(|(supplied_index, _)| Binding {
                supplied_index,
                declared_as: None,
            }),
    );
    Ok(bindings)
}

pub fn load_reference_images(
    declared: &[DeclaredImage],
    supplied: &[PathBuf],
) -> Result<Vec<LoadedImage>, PipelineError> {
    bind_images(declared, supplied)?
        .into_iter()
        .map(|binding| {
            let mut loaded = load_image(&supplied[binding.supplied_index])?;
            loaded.declared_as = binding.declared_as;
            Ok(loaded)
        })
        .collect()
}

pub fn load_image(path: &Path) -> Result<LoadedImage, PipelineError> {
    let unreadable = |reason: String| PipelineError::UnreadableImage {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = fs::read(path).map_err(|err| unreadable(err.to_string()))?;
    let format = match image::guess_format(&bytes) {
        Ok(format) => format,
        Err(_) => format_for_path(path)
            .ok_or_else(|| unreadable("not a recognised image format".to_string()))?,
    };
    let mime_type = mime_for_format(format)
        .ok_or_else(|| unreadable(format!("unsupported image format {format:?}")))?;
    let (width, height) = ImageReader::with_format(Cursor::new(bytes.as_slice()), format)
        .into_dimensions()
        .map_err(|err| unreadable(format!("cannot decode {mime_type}: {err}")))?;

    Ok(LoadedImage {
        path: path.to_path_buf(),
        declared_as: None,
        mime_type,
        width,
        height,
        bytes,
    })
}

fn same_file(declared: &str, supplied: &Path) -> bool {
    let declared = Path::new(declared.trim());
    if declared == supplied {
        return true;
    }
    match (declared.canonicalize(), supplied.canonicalize()) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

fn mime_for_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}

fn format_for_path(path: &Path) -> Option<ImageFormat> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some(ImageFormat::Png),
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        "webp" => Some(ImageFormat::WebP),
        "gif" => Some(ImageFormat::Gif),
        _ => None,
    }
}
