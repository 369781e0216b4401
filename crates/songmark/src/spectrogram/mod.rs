pub mod palette;
pub mod render;
pub mod stft;

pub use render::{render, ParameterSnapshot, RenderParams, RenderedImage};
