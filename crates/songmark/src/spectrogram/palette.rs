//! Viridis color mapping for spectrogram intensity.

use std::sync::OnceLock;

/// Anchor colors of the viridis colormap at evenly spaced positions.
/// The full 256-entry table is linearly interpolated from these.
const ANCHORS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [72, 40, 120],
    [62, 74, 137],
    [49, 104, 142],
    [38, 130, 142],
    [31, 158, 137],
    [53, 183, 121],
    [109, 205, 89],
    [253, 231, 37],
];

fn lut() -> &'static [[u8; 3]; 256] {
    static LUT: OnceLock<[[u8; 3]; 256]> = OnceLock::new();
    LUT.get_or_init(|| {
        let mut table = [[0u8; 3]; 256];
        let segments = ANCHORS.len() - 1;
        for (i, entry) in table.iter_mut().enumerate() {
            let pos = i as f32 / 255.0 * segments as f32;
            let seg = (pos.floor() as usize).min(segments - 1);
            let t = pos - seg as f32;
            let (a, b) = (ANCHORS[seg], ANCHORS[seg + 1]);
            for ch in 0..3 {
                entry[ch] =
                    (a[ch] as f32 + (b[ch] as f32 - a[ch] as f32) * t).round() as u8;
            }
        }
        table
    })
}

/// Maps a normalized intensity to an RGB viridis color.
pub fn viridis(intensity: u8) -> [u8; 3] {
    lut()[intensity as usize]
}
