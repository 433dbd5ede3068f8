pub mod errors;
pub mod normalize;
pub mod render;
pub mod schema;

pub use errors::{ErrorClass, ErrorKind, PipelineError};
pub use normalize::{normalize, normalize_str, NormalizedPrompt};
pub use render::{render_prompt, RenderedPrompt};
