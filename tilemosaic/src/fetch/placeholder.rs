//! Magenta placeholder tiles for missing imagery.
//!
//! When missing-tile handling is enabled, a 404 produces a solid magenta tile
//! with the HTTP status code drawn in black, so holes in the mosaic are easy
//! to spot. Placeholders are memoized per `(status, width, height)`.

use std::sync::OnceLock;

use dashmap::DashMap;
use image::{Rgba, RgbaImage};

/// Placeholder fill colour.
pub const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Colour of the status digits.
const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// 3x5 block glyphs for the digits 0-9, one row per entry, MSB on the left.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

const GLYPH_WIDTH: u32 = 3;
const GLYPH_HEIGHT: u32 = 5;
const GLYPH_GAP: u32 = 1;

type PlaceholderKey = (u16, u32, u32);

fn cache() -> &'static DashMap<PlaceholderKey, RgbaImage> {
    static CACHE: OnceLock<DashMap<PlaceholderKey, RgbaImage>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Returns the placeholder tile for a status code and size.
pub fn placeholder_tile(status: u16, width: u32, height: u32) -> RgbaImage {
    cache()
        .entry((status, width, height))
        .or_insert_with(|| render_placeholder(status, width, height))
        .clone()
}

fn render_placeholder(status: u16, width: u32, height: u32) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(width, height, PLACEHOLDER_COLOR);

    let digits: Vec<usize> = status
        .to_string()
        .bytes()
        .map(|b| usize::from(b - b'0'))
        .collect();
    let cells_wide = digits.len() as u32 * (GLYPH_WIDTH + GLYPH_GAP) - GLYPH_GAP;

    // Leave one glyph-cell margin on each side.
    let scale = (width / (cells_wide + 2)).min(height / (GLYPH_HEIGHT + 2));
    if scale == 0 {
        return image;
    }

    let origin_x = (width - cells_wide * scale) / 2;
    let origin_y = (height - GLYPH_HEIGHT * scale) / 2;

    for (index, digit) in digits.iter().enumerate() {
        let glyph_x = origin_x + index as u32 * (GLYPH_WIDTH + GLYPH_GAP) * scale;
        for (row, bits) in DIGITS[*digit].iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let x0 = glyph_x + col * scale;
                let y0 = origin_y + row as u32 * scale;
                for y in y0..y0 + scale {
                    for x in x0..x0 + scale {
                        image.put_pixel(x, y, TEXT_COLOR);
                    }
                }
            }
        }
    }

    image
}
