//! Prescription image preparation for the vision model.
//!
//! Pipeline: decode, bounded-width downscale, grayscale, CLAHE, unsharp mask,
//! percentile stretch, PNG. The goal is handwriting legibility for the model,
//! nothing here reads text.

use std::io::Cursor;

use image::imageops::{ self, FilterType };
use image::{ DynamicImage, GenericImageView, GrayImage, ImageFormat };
use log::debug;
use thiserror::Error;

const SHARPEN_SIGMA: f32 = 1.0;
const SHARPEN_THRESHOLD: i32 = 2;

/// Share of pixels clipped at each end by [`normalize`].
const NORMALIZE_TAIL: f64 = 0.01;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Image upload is empty")]
    Empty,

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("PNG encoding failed: {0}")]
    Encode(#[source] image::ImageError),
}

#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    /// Images wider than this are downscaled; narrower ones are left as-is.
    pub max_width: u32,
    /// CLAHE tile edge in pixels.
    pub tile_size: u32,
    /// CLAHE maximum histogram slope. Zero disables clipping.
    pub clip_limit: f32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            max_width: 2000,
            tile_size: 50,
            clip_limit: 3.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    options: PreprocessOptions,
}

impl ImagePreprocessor {
    pub fn new(options: PreprocessOptions) -> Self {
        Self { options }
    }

    /// Raw upload bytes in, grayscale PNG bytes out.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<Vec<u8>, PreprocessError> {
        if bytes.is_empty() {
            return Err(PreprocessError::Empty);
        }

        let img = image::load_from_memory(bytes).map_err(PreprocessError::Decode)?;
        let (orig_w, orig_h) = img.dimensions();

        let (w, h) = fit_width(orig_w, orig_h, self.options.max_width);
        let img = if (w, h) == (orig_w, orig_h) {
            img
        } else {
            img.resize_exact(w, h, FilterType::CatmullRom)
        };

        let gray = img.to_luma8();
        let gray = clahe(&gray, self.options.tile_size, self.options.clip_limit);
        let gray = imageops::unsharpen(&gray, SHARPEN_SIGMA, SHARPEN_THRESHOLD);
        let gray = normalize(gray);

        let png = encode_png(gray)?;
        debug!(
            "Image preprocessed: {}x{} -> {}x{}, {} -> {} bytes",
            orig_w,
            orig_h,
            w,
            h,
            bytes.len(),
            png.len()
        );
        Ok(png)
    }
}

/// Target size for a width bound, keeping aspect ratio and never enlarging.
pub fn fit_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if max_width == 0 || width <= max_width {
        return (width, height);
    }
    let scaled = ((height as f64) * (max_width as f64)) / (width as f64);
    (max_width, (scaled.round() as u32).max(1))
}

/// Contrast-limited adaptive histogram equalization.
///
/// Each `tile_size` square gets its own clipped-histogram mapping; pixels blend
/// the mappings of the four nearest tile centres bilinearly.
pub fn clahe(img: &GrayImage, tile_size: u32, clip_limit: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let tile = tile_size.max(1);
    let tiles_x = w.div_ceil(tile);
    let tiles_y = h.div_ceil(tile);

    let mut maps = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let (x0, y0) = (tx * tile, ty * tile);
            let (x1, y1) = ((x0 + tile).min(w), (y0 + tile).min(h));
            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[img.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            maps.push(tile_mapping(&mut hist, (x1 - x0) * (y1 - y0), clip_limit));
        }
    }

    let map_at = |tx: usize, ty: usize| &maps[ty * (tiles_x as usize) + tx];

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        let (ty0, ty1, wy) = neighbours(y, tile, tiles_y);
        for x in 0..w {
            let (tx0, tx1, wx) = neighbours(x, tile, tiles_x);
            let v = img.get_pixel(x, y)[0] as usize;

            let top = lerp(map_at(tx0, ty0)[v], map_at(tx1, ty0)[v], wx);
            let bottom = lerp(map_at(tx0, ty1)[v], map_at(tx1, ty1)[v], wx);
            let value = top + (bottom - top) * wy;
            out.put_pixel(x, y, image::Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

fn tile_mapping(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    if clip_limit > 0.0 {
        let limit = ((clip_limit * (area as f32)) / 256.0).ceil().max(1.0) as u32;
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }
        let share = excess / 256;
        let remainder = (excess % 256) as usize;
        for (i, bin) in hist.iter_mut().enumerate() {
            *bin += share + u32::from(i < remainder);
        }
    }

    let mut map = [0u8; 256];
    let scale = 255.0 / (area.max(1) as f32);
    let mut cdf = 0u32;
    for (i, count) in hist.iter().enumerate() {
        cdf += count;
        map[i] = ((cdf as f32) * scale).round().min(255.0) as u8;
    }
    map
}

/// Tile indices on either side of a pixel along one axis and the weight of the far one.
fn neighbours(pos: u32, tile: u32, count: u32) -> (usize, usize, f32) {
    let g = ((pos as f32) + 0.5) / (tile as f32) - 0.5;
    if g <= 0.0 {
        return (0, 0, 0.0);
    }
    let lo = (g.floor() as u32).min(count - 1);
    let hi = (lo + 1).min(count - 1);
    let weight = if hi == lo { 0.0 } else { g - (lo as f32) };
    (lo as usize, hi as usize, weight)
}

fn lerp(a: u8, b: u8, t: f32) -> f32 {
    (a as f32) + ((b as f32) - (a as f32)) * t
}

/// Stretches the 1st..99th percentile of intensities to the full range.
pub fn normalize(mut img: GrayImage) -> GrayImage {
    let total = (img.width() as f64) * (img.height() as f64);
    if total == 0.0 {
        return img;
    }
    let mut hist = [0u64; 256];
    for p in img.pixels() {
        hist[p[0] as usize] += 1;
    }

    let mut cumulative = 0u64;
    let mut low = None;
    let mut high = 255u8;
    for (value, count) in hist.iter().enumerate() {
        cumulative += count;
        let share = (cumulative as f64) / total;
        if low.is_none() && share > NORMALIZE_TAIL {
            low = Some(value as u8);
        }
        if share >= 1.0 - NORMALIZE_TAIL {
            high = value as u8;
            break;
        }
    }
    let low = low.unwrap_or(0);
    if high <= low {
        return img;
    }

    let range = (high - low) as f32;
    for p in img.pixels_mut() {
        let stretched = (((p[0] as f32) - (low as f32)) * 255.0) / range;
        p[0] = stretched.round().clamp(0.0, 255.0) as u8;
    }
    img
}

fn encode_png(img: GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(PreprocessError::Encode)?;
    Ok(cursor.into_inner())
}
