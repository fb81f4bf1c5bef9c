//! Image resampling and projection-boundary overlay.
//!
//! [`remap`] is the resample primitive that applies [`RemapTables`] to a
//! fisheye frame. [`draw_polygon`] traces which part of the fisheye frame a
//! set of tables samples from.

use image::{Rgb, RgbImage};

use crate::frame::OverlayStyle;
use crate::lens::RemapTables;

#[derive(thiserror::Error, Debug)]
pub enum ImageIoError {
    #[error("Failed to load image {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("Failed to save image {path}: {reason}")]
    Save { path: String, reason: String },
}

/// Load an image file as 8-bit RGB.
pub fn load_image(image_path: &str) -> Result<RgbImage, ImageIoError> {
    let img = image::open(image_path).map_err(|e| ImageIoError::Load {
        path: image_path.to_string(),
        reason: e.to_string(),
    })?;

    Ok(img.to_rgb8())
}

/// Save an image; the format follows the file extension.
pub fn save_image(image: &RgbImage, path: &str) -> Result<(), ImageIoError> {
    image.save(path).map_err(|e| ImageIoError::Save {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Resample `image` through `tables` with bilinear interpolation.
///
/// The output has the shape of the tables. Output pixels whose source
/// coordinate is invalid or falls outside `image` are black.
pub fn remap(image: &RgbImage, tables: &RemapTables) -> RgbImage {
    let mut out = RgbImage::new(tables.width(), tables.height());
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 {
        return out;
    }
    let (max_x, max_y) = ((w - 1) as f32, (h - 1) as f32);

    for (col, row, pixel) in out.enumerate_pixels_mut() {
        let Some((x, y)) = tables.source(col, row) else {
            continue;
        };
        if x > max_x || y > max_y {
            continue;
        }

        let x0 = x.floor() as u32;
        let y0 = y.floor() as u32;
        let x1 = (x0 + 1).min(w - 1);
        let y1 = (y0 + 1).min(h - 1);
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let p00 = image.get_pixel(x0, y0);
        let p10 = image.get_pixel(x1, y0);
        let p01 = image.get_pixel(x0, y1);
        let p11 = image.get_pixel(x1, y1);

        let mut value = [0u8; 3];
        for (c, v) in value.iter_mut().enumerate() {
            let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
            let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
            *v = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
        }
        *pixel = Rgb(value);
    }

    out
}

/// Copy of `image` with the outline of the region sampled by `tables`.
///
/// The outline connects the source coordinates of the table border in order.
/// Border pixels without a valid source break the outline; the walk wraps
/// around, so the closing segment joins the last border pixel to the first
/// whenever both are valid.
pub fn draw_polygon(image: &RgbImage, tables: &RemapTables, style: &OverlayStyle) -> RgbImage {
    let mut img = image.clone();
    let color = Rgb(style.color);
    let radius = (style.thickness / 2) as i32;

    let points: Vec<Option<(i32, i32)>> = tables
        .border()
        .into_iter()
        .map(|(col, row)| {
            tables
                .source(col, row)
                .map(|(x, y)| (x.round() as i32, y.round() as i32))
        })
        .collect();

    let mut previous: Option<(i32, i32)> = None;
    for point in &points {
        match (previous, point) {
            (Some(prev), Some(point)) => draw_line(&mut img, prev, *point, radius, color),
            (None, Some(point)) => stamp(&mut img, *point, radius, color),
            _ => {}
        }
        previous = *point;
    }

    if points.len() > 2 {
        if let (Some(Some(last)), Some(Some(first))) = (points.last(), points.first()) {
            draw_line(&mut img, *last, *first, radius, color);
        }
    }

    img
}

/// Bresenham line from `from` to `to`, stamping a disc at every step.
fn draw_line(img: &mut RgbImage, from: (i32, i32), to: (i32, i32), radius: i32, color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        stamp(img, (x, y), radius, color);
        if (x, y) == to {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Draw a small filled disc, clipped to the image.
fn stamp(img: &mut RgbImage, center: (i32, i32), radius: i32, color: Rgb<u8>) {
    let (width, height) = (img.width() as i32, img.height() as i32);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                let x = center.0 + dx;
                let y = center.1 + dy;

                if x >= 0 && x < width && y >= 0 && y < height {
                    img.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::INVALID_COORDINATE;
    use nalgebra::DMatrix;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 7]))
    }

    fn tables_from_fn<F: Fn(usize, usize) -> (f32, f32)>(w: usize, h: usize, f: F) -> RemapTables {
        let map_x = DMatrix::from_fn(h, w, |r, c| f(r, c).0);
        let map_y = DMatrix::from_fn(h, w, |r, c| f(r, c).1);
        RemapTables::new(map_x, map_y).unwrap()
    }

    #[test]
    fn test_remap_identity_tables() {
        let image = gradient_image(6, 4);
        let tables = tables_from_fn(6, 4, |r, c| (c as f32, r as f32));
        assert_eq!(remap(&image, &tables), image);
    }

    #[test]
    fn test_remap_bilinear_midpoint() {
        let image = gradient_image(4, 4);
        let tables = tables_from_fn(1, 1, |_, _| (1.5, 2.5));
        let out = remap(&image, &tables);
        // halfway between x=1,2 (10, 20) and y=2,3 (20, 30)
        assert_eq!(out.get_pixel(0, 0), &Rgb([15, 25, 7]));
    }

    #[test]
    fn test_remap_invalid_and_outside_are_black() {
        let image = gradient_image(4, 4);
        let tables = tables_from_fn(2, 1, |_, c| {
            if c == 0 {
                (INVALID_COORDINATE, 1.0)
            } else {
                (3.5, 1.0)
            }
        });
        let out = remap(&image, &tables);
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_polygon_outlines_region_and_keeps_input() {
        let image = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        // 3x3 output sampling the square [5, 15] x [5, 15]
        let tables = tables_from_fn(3, 3, |r, c| (5.0 + 5.0 * c as f32, 5.0 + 5.0 * r as f32));
        let style = OverlayStyle {
            color: [0, 255, 0],
            thickness: 1,
        };
        let drawn = draw_polygon(&image, &tables, &style);

        assert_eq!(drawn.get_pixel(5, 5), &Rgb([0, 255, 0]));
        assert_eq!(drawn.get_pixel(10, 5), &Rgb([0, 255, 0]));
        assert_eq!(drawn.get_pixel(15, 15), &Rgb([0, 255, 0]));
        // left edge
        assert_eq!(drawn.get_pixel(5, 12), &Rgb([0, 255, 0]));
        // interior untouched
        assert_eq!(drawn.get_pixel(10, 10), &Rgb([0, 0, 0]));
        // the input is not modified
        assert_eq!(image.get_pixel(5, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_polygon_joins_runs_across_the_start() {
        let image = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        // the middle of the right column has no source
        let tables = tables_from_fn(3, 3, |r, c| {
            if (r, c) == (1, 2) {
                (INVALID_COORDINATE, INVALID_COORDINATE)
            } else {
                (5.0 + 5.0 * c as f32, 5.0 + 5.0 * r as f32)
            }
        });
        let style = OverlayStyle {
            color: [0, 255, 0],
            thickness: 1,
        };
        let drawn = draw_polygon(&image, &tables, &style);

        // left edge closes the outline from the last border pixel to the first
        assert_eq!(drawn.get_pixel(5, 7), &Rgb([0, 255, 0]));
        assert_eq!(drawn.get_pixel(12, 15), &Rgb([0, 255, 0]));
        // right edge stays open around the invalid entry
        assert_eq!(drawn.get_pixel(15, 10), &Rgb([0, 0, 0]));
    }
}
