pub mod config;
pub mod images;
pub mod output;
pub mod pipeline;
pub mod providers;

pub use config::{ConfigResolver, ConfigSource, Settings};
pub use images::{load_reference_images, LoadedImage};
pub use output::{OutputWriter, DEFAULT_OUTPUT_DIR};
pub use pipeline::{GenerationOutcome, GenerationRequest, Pipeline, PreparedDispatch, Stage};
pub use providers::{
    DispatchRequest, DryrunProvider, GeminiProvider, GeneratedImage, ImageProvider,
    ImageProviderRegistry,
};
