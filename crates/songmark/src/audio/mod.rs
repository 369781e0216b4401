pub mod decoder;

pub use decoder::{decode_wav, DecodedAudio};
