//! Image assets and the geometric transforms applied to them.
//!
//! Everything here is pure pixel work: decode, orientation correction,
//! rotation, fit/fill composition, and the text overlay used by the error
//! screen. All outputs are RGBA so compositing over a background is always
//! valid.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ab_glyph::{Font, FontVec, GlyphId, PxScale, ScaleFont, point};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::error::Error;

/// Canvas color behind letterboxed and rotated content.
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// The two screens shipped with the frame itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinImage {
    MissingImages,
    ErrorScreen,
}

impl BuiltinImage {
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::MissingImages => "missing_images.png",
            Self::ErrorScreen => "error.png",
        }
    }
}

/// Where an asset's pixels came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    File(PathBuf),
    Builtin(BuiltinImage),
}

/// A decoded image plus its provenance. Produced here, owned by the
/// controller while it is the active image.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub image: RgbaImage,
    pub origin: Origin,
}

impl ImageAsset {
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

/// Decode `path` into an RGBA asset, correcting EXIF orientation.
///
/// # Errors
/// [`Error::Decode`] for unreadable or corrupt files.
pub fn load(path: &Path) -> Result<ImageAsset, Error> {
    let decoded = image::open(path).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let orientation = read_exif_orientation(path).unwrap_or(1);
    let image = apply_orientation(decoded.to_rgba8(), orientation);
    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        orientation,
        "loaded image"
    );
    Ok(ImageAsset {
        image,
        origin: Origin::File(path.to_path_buf()),
    })
}

/// Load one of the built-in fallback screens from the builtin asset
/// directory.
pub fn load_builtin(builtin_dir: &Path, which: BuiltinImage) -> Result<ImageAsset, Error> {
    let path = builtin_dir.join(which.file_name());
    let decoded = image::open(&path).map_err(|source| Error::Decode {
        path: path.clone(),
        source,
    })?;
    Ok(ImageAsset {
        image: decoded.to_rgba8(),
        origin: Origin::Builtin(which),
    })
}

/// Opaque background frame used as the last-resort error surface.
#[must_use]
pub fn blank(size: (u32, u32)) -> ImageAsset {
    ImageAsset {
        image: RgbaImage::from_pixel(size.0.max(1), size.1.max(1), BACKGROUND),
        origin: Origin::Builtin(BuiltinImage::ErrorScreen),
    }
}

fn read_exif_orientation(path: &Path) -> Option<u16> {
    let f = fs::File::open(path).ok()?;
    let mut buf = BufReader::new(f);
    let reader = exif::Reader::new().read_from_container(&mut buf).ok()?;
    use exif::{In, Tag, Value};
    let field = reader.get_field(Tag::Orientation, In::PRIMARY)?;
    match &field.value {
        Value::Short(arr) if !arr.is_empty() => Some(arr[0]),
        Value::Long(arr) if !arr.is_empty() => Some(arr[0] as u16),
        _ => Some(1),
    }
}

fn apply_orientation(img: RgbaImage, orientation: u16) -> RgbaImage {
    match orientation {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    }
}

/// Rotate clockwise by `degrees` (normalized modulo 360).
///
/// Multiples of 90 are lossless. Other angles expand the canvas so no
/// pixels are lost, filling uncovered corners with the background color.
#[must_use]
pub fn rotate(asset: ImageAsset, degrees: i64) -> ImageAsset {
    let angle = degrees.rem_euclid(360) as u32;
    let image = match angle {
        0 => asset.image,
        90 => imageops::rotate90(&asset.image),
        180 => imageops::rotate180(&asset.image),
        270 => imageops::rotate270(&asset.image),
        _ => rotate_expanded(&asset.image, angle as f32),
    };
    ImageAsset {
        image,
        origin: asset.origin,
    }
}

fn rotate_expanded(src: &RgbaImage, degrees: f32) -> RgbaImage {
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let (w, h) = (src.width() as f32, src.height() as f32);
    let out_w = (w * cos.abs() + h * sin.abs()).ceil().max(1.0) as u32;
    let out_h = (w * sin.abs() + h * cos.abs()).ceil().max(1.0) as u32;
    let mut out = RgbaImage::from_pixel(out_w, out_h, BACKGROUND);
    let (cx, cy) = (w / 2.0, h / 2.0);
    let (ox, oy) = (out_w as f32 / 2.0, out_h as f32 / 2.0);
    // Inverse-map each output pixel back onto the source.
    for y in 0..out_h {
        for x in 0..out_w {
            let dx = x as f32 + 0.5 - ox;
            let dy = y as f32 + 0.5 - oy;
            let sx = cos * dx + sin * dy + cx;
            let sy = cos * dy - sin * dx + cy;
            if sx >= 0.0 && sy >= 0.0 {
                let (sx, sy) = (sx as u32, sy as u32);
                if sx < src.width() && sy < src.height() {
                    out.put_pixel(x, y, *src.get_pixel(sx, sy));
                }
            }
        }
    }
    out
}

/// Scale down (never up) to wholly fit inside `target`, centered on an
/// opaque background of exactly `target`.
#[must_use]
pub fn fit(asset: &ImageAsset, target: (u32, u32)) -> ImageAsset {
    let (tw, th) = target;
    let (w, h) = asset.size();
    let scale = (tw as f32 / w as f32).min(th as f32 / h as f32).min(1.0);
    let dest_w = ((w as f32 * scale).round().max(1.0) as u32).min(tw);
    let dest_h = ((h as f32 * scale).round().max(1.0) as u32).min(th);
    let scaled = if (dest_w, dest_h) == (w, h) {
        asset.image.clone()
    } else {
        imageops::resize(&asset.image, dest_w, dest_h, FilterType::Triangle)
    };
    let mut canvas = RgbaImage::from_pixel(tw, th, BACKGROUND);
    let dx = i64::from((tw - dest_w) / 2);
    let dy = i64::from((th - dest_h) / 2);
    imageops::overlay(&mut canvas, &scaled, dx, dy);
    ImageAsset {
        image: canvas,
        origin: asset.origin.clone(),
    }
}

/// Scale to cover `target`, then center-crop to exactly `target`.
#[must_use]
pub fn fill(asset: &ImageAsset, target: (u32, u32)) -> ImageAsset {
    let (tw, th) = target;
    let (w, h) = asset.size();
    let scale = (tw as f32 / w as f32).max(th as f32 / h as f32);
    let dest_w = ((w as f32 * scale).ceil() as u32).max(tw);
    let dest_h = ((h as f32 * scale).ceil() as u32).max(th);
    let scaled = imageops::resize(&asset.image, dest_w, dest_h, FilterType::Triangle);
    let x = (dest_w - tw) / 2;
    let y = (dest_h - th) / 2;
    let cropped = imageops::crop_imm(&scaled, x, y, tw, th).to_image();
    ImageAsset {
        image: cropped,
        origin: asset.origin.clone(),
    }
}

/// Draw `text` onto the asset at `position`, wrapping at the right edge.
///
/// Used for error-screen composition, so it must not fail: when no system
/// font can be found the asset is returned untouched.
#[must_use]
pub fn overlay_text(asset: ImageAsset, text: &str, position: (u32, u32)) -> ImageAsset {
    let Some(font) = system_font() else {
        warn!("no system sans-serif font found, skipping text overlay");
        return asset;
    };
    let mut image = asset.image;
    draw_text(&mut image, font, text, position);
    ImageAsset {
        image,
        origin: asset.origin,
    }
}

fn system_font() -> Option<&'static FontVec> {
    static FONT: OnceLock<Option<FontVec>> = OnceLock::new();
    FONT.get_or_init(load_system_font).as_ref()
}

fn load_system_font() -> Option<FontVec> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    let id = db.query(&fontdb::Query {
        families: &[fontdb::Family::SansSerif],
        ..fontdb::Query::default()
    })?;
    db.with_face_data(id, |data, index| {
        FontVec::try_from_vec_and_index(data.to_vec(), index).ok()
    })?
}

fn draw_text(img: &mut RgbaImage, font: &FontVec, text: &str, position: (u32, u32)) {
    let scale = PxScale::from(22.0);
    let scaled = font.as_scaled(scale);
    let line_height = scaled.height() + scaled.line_gap();
    let left = position.0 as f32;
    let mut caret = point(left, position.1 as f32 + scaled.ascent());
    let mut prev: Option<GlyphId> = None;

    for ch in text.chars() {
        if ch == '\n' {
            caret = point(left, caret.y + line_height);
            prev = None;
            continue;
        }
        let id = scaled.glyph_id(ch);
        let advance = scaled.h_advance(id);
        if caret.x + advance > img.width() as f32 {
            caret = point(left, caret.y + line_height);
            prev = None;
        }
        if let Some(p) = prev {
            caret.x += scaled.kern(p, id);
        }
        let glyph = id.with_scale_and_position(scale, caret);
        if let Some(outline) = font.outline_glyph(glyph) {
            let bounds = outline.px_bounds();
            outline.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i32 + gx as i32;
                let y = bounds.min.y as i32 + gy as i32;
                if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
                    let px = img.get_pixel_mut(x as u32, y as u32);
                    let a = (coverage.clamp(0.0, 1.0) * 255.0) as u16;
                    // Blend the background toward black by coverage.
                    for c in 0..3 {
                        px[c] = ((u16::from(px[c]) * (255 - a)) / 255) as u8;
                    }
                    px[3] = 255;
                }
            });
        }
        caret.x += advance;
        prev = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(w: u32, h: u32) -> ImageAsset {
        ImageAsset {
            image: RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255])),
            origin: Origin::File(PathBuf::from("test.png")),
        }
    }

    #[test]
    fn fit_never_upscales_and_centers() {
        let out = fit(&asset(100, 50), (400, 400));
        assert_eq!(out.size(), (400, 400));
        // Content stays 100x50, centered: margins 150/150 and 175/175.
        assert_eq!(out.image.get_pixel(200, 200).0, [10, 20, 30, 255]);
        assert_eq!(out.image.get_pixel(149, 200).0, [255, 255, 255, 255]);
        assert_eq!(out.image.get_pixel(200, 174).0, [255, 255, 255, 255]);
    }

    #[test]
    fn fit_downscales_with_equal_margins() {
        let out = fit(&asset(800, 400), (400, 400));
        assert_eq!(out.size(), (400, 400));
        // Scaled to 400x200, letterboxed top and bottom by 100 each.
        assert_eq!(out.image.get_pixel(0, 99).0, [255, 255, 255, 255]);
        assert_eq!(out.image.get_pixel(0, 300).0, [255, 255, 255, 255]);
        assert_eq!(out.image.get_pixel(200, 200).0[0..3], [10, 20, 30]);
    }

    #[test]
    fn fill_output_is_exactly_target_size() {
        for (w, h) in [(10, 10), (300, 40), (40, 300), (640, 400)] {
            let out = fill(&asset(w, h), (640, 400));
            assert_eq!(out.size(), (640, 400));
        }
    }

    #[test]
    fn quarter_turns_swap_dimensions() {
        let out = rotate(asset(100, 50), 90);
        assert_eq!(out.size(), (50, 100));
        let back = rotate(rotate(out, 90), 180);
        assert_eq!(back.size(), (100, 50));
    }

    #[test]
    fn rotate_normalizes_angle() {
        assert_eq!(rotate(asset(100, 50), 450).size(), (50, 100));
        assert_eq!(rotate(asset(100, 50), -270).size(), (50, 100));
        assert_eq!(rotate(asset(100, 50), 0).size(), (100, 50));
    }

    #[test]
    fn odd_angle_rotation_expands_canvas() {
        let out = rotate(asset(100, 100), 45);
        let (w, h) = out.size();
        assert!(w > 100 && h > 100);
        // Corners fall outside the rotated content and take the background.
        assert_eq!(out.image.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    fn quad() -> RgbaImage {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([1, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([2, 0, 0, 255]));
        img.put_pixel(0, 1, Rgba([3, 0, 0, 255]));
        img.put_pixel(1, 1, Rgba([4, 0, 0, 255]));
        img
    }

    fn corners(img: &RgbaImage) -> [u8; 4] {
        [
            img.get_pixel(0, 0).0[0],
            img.get_pixel(1, 0).0[0],
            img.get_pixel(0, 1).0[0],
            img.get_pixel(1, 1).0[0],
        ]
    }

    #[test]
    fn orientation_correction_covers_all_exif_cases() {
        // Corner markers after correcting each of the 8 EXIF orientations.
        let cases: [(u16, [u8; 4]); 8] = [
            (1, [1, 2, 3, 4]),
            (2, [2, 1, 4, 3]),
            (3, [4, 3, 2, 1]),
            (4, [3, 4, 1, 2]),
            (5, [1, 3, 2, 4]),
            (6, [3, 1, 4, 2]),
            (7, [4, 2, 3, 1]),
            (8, [2, 4, 1, 3]),
        ];
        for (orientation, expected) in cases {
            let out = apply_orientation(quad(), orientation);
            assert_eq!(corners(&out), expected, "orientation {orientation}");
        }
    }

    #[test]
    fn unknown_orientation_passes_through() {
        assert_eq!(corners(&apply_orientation(quad(), 0)), [1, 2, 3, 4]);
        assert_eq!(corners(&apply_orientation(quad(), 9)), [1, 2, 3, 4]);
    }

    #[test]
    fn overlay_text_preserves_dimensions() {
        let out = overlay_text(asset(200, 100), "hello\nworld", (28, 36));
        assert_eq!(out.size(), (200, 100));
    }

    #[test]
    fn transforms_preserve_origin() {
        let out = fill(&fit(&rotate(asset(64, 64), 90), (32, 32)), (16, 16));
        assert_eq!(out.origin, Origin::File(PathBuf::from("test.png")));
    }
}
