use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::otsu_level;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::geometry::{approximate_polygon_dp, arc_length, min_area_rect};
use imageproc::point::Point;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::config::RectifierConfig;

#[derive(Debug, Error)]
pub enum RectifyError {
    #[error("Failed to load image: {0}")]
    ImageUnreadable(#[from] image::ImageError),
    #[error("No receipt region found: {0}")]
    NoReceiptRegion(String),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Load an image file and return the binarized, perspective-corrected receipt.
pub fn rectify_file(path: &Path, config: &RectifierConfig) -> Result<GrayImage, RectifyError> {
    let img = image::open(path)?;
    rectify(&img, config)
}

/// Decode raw image bytes (JPEG / PNG / …) and rectify them.
pub fn rectify_bytes(data: &[u8], config: &RectifierConfig) -> Result<GrayImage, RectifyError> {
    let img = image::load_from_memory(data)?;
    rectify(&img, config)
}

/// Paper mask → closing → dominant outer contour → quadrilateral → warp → Otsu.
pub fn rectify(img: &DynamicImage, config: &RectifierConfig) -> Result<GrayImage, RectifyError> {
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(RectifyError::NoReceiptRegion("image is empty".into()));
    }

    let mask = binarize(&gray, config.invert_mask);
    let divisor = config.closing_divisor.max(1);
    let closed = close_rect(&mask, (width / divisor).max(1), (height / divisor).max(1));

    let region = largest_region(&closed, config.min_region_fraction)?;
    let corners = order_corners(quadrilateral(&region, config.approx_epsilon_ratio));
    debug!(?corners, "Receipt quadrilateral");

    let warped = warp_quad(&gray, corners)?;
    Ok(binarize(&warped, false))
}

/// Encode a grayscale image as PNG, for engines that take encoded bytes.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, RectifyError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| RectifyError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Global Otsu threshold. Pixels above the level become white, or black when `inverted`.
fn binarize(gray: &GrayImage, inverted: bool) -> GrayImage {
    let level = otsu_level(gray);
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        let above = pixel[0] > level;
        pixel[0] = if above != inverted { 255 } else { 0 };
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Morph {
    Dilate,
    Erode,
}

/// Morphological closing of a binary mask with a `kw` × `kh` rectangle.
fn close_rect(mask: &GrayImage, kw: u32, kh: u32) -> GrayImage {
    let dilated = rect_filter(mask, kw, kh, Morph::Dilate);
    rect_filter(&dilated, kw, kh, Morph::Erode)
}

// A rectangle is separable: one pass along rows, one along columns.
fn rect_filter(img: &GrayImage, kw: u32, kh: u32, op: Morph) -> GrayImage {
    let rows = line_filter(img, kw, op, true);
    line_filter(&rows, kh, op, false)
}

fn line_filter(img: &GrayImage, k: u32, op: Morph, horizontal: bool) -> GrayImage {
    let (w, h) = img.dimensions();
    let (len, lines) = if horizontal { (w, h) } else { (h, w) };
    let k = k.max(1);
    // Erosion uses the reflected window so that closing never shrinks the mask.
    let (before, after) = match op {
        Morph::Dilate => ((k - 1) / 2, k / 2),
        Morph::Erode => (k / 2, (k - 1) / 2),
    };

    let mut out = GrayImage::new(w, h);
    let mut prefix = vec![0u32; len as usize + 1];
    for line in 0..lines {
        let at = |i: u32| if horizontal { (i, line) } else { (line, i) };
        for i in 0..len {
            let (x, y) = at(i);
            prefix[i as usize + 1] = prefix[i as usize] + u32::from(img.get_pixel(x, y)[0] > 0);
        }
        for i in 0..len {
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(len - 1);
            let set = prefix[hi as usize + 1] - prefix[lo as usize];
            let on = match op {
                Morph::Dilate => set > 0,
                Morph::Erode => set == hi - lo + 1,
            };
            let (x, y) = at(i);
            out.put_pixel(x, y, Luma([if on { 255 } else { 0 }]));
        }
    }
    out
}

/// Largest outer contour covering at least `min_fraction` of the image.
fn largest_region(mask: &GrayImage, min_fraction: f64) -> Result<Vec<Point<i32>>, RectifyError> {
    let (w, h) = mask.dimensions();
    let min_area = min_fraction * f64::from(w) * f64::from(h);

    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| {
            let area = polygon_area(&c.points);
            (c.points, area)
        })
        .filter(|(_, area)| *area >= min_area)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(points, _)| points)
        .ok_or_else(|| {
            RectifyError::NoReceiptRegion(format!(
                "no contour covers {:.0}% of the image",
                min_fraction * 100.0
            ))
        })
}

/// Shoelace area of a closed polygon.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y))
        .sum();
    twice.unsigned_abs() as f64 / 2.0
}

/// Four corner points: the simplified polygon when it has exactly four
/// vertices, otherwise the minimum-area bounding rectangle.
fn quadrilateral(contour: &[Point<i32>], epsilon_ratio: f64) -> [(f32, f32); 4] {
    let epsilon = epsilon_ratio * arc_length(contour, true);
    let mut approx = approximate_polygon_dp(contour, epsilon, true);
    if approx.len() > 1 && approx.first() == approx.last() {
        approx.pop();
    }
    let points: [Point<i32>; 4] = match <[Point<i32>; 4]>::try_from(approx) {
        Ok(quad) => quad,
        Err(_) => min_area_rect(contour),
    };
    points.map(|p| (p.x as f32, p.y as f32))
}

/// Order as top-left, top-right, bottom-right, bottom-left.
///
/// Top-left has the smallest `x + y` and bottom-right the largest; top-right
/// has the smallest `y - x` and bottom-left the largest.
fn order_corners(points: [(f32, f32); 4]) -> [(f32, f32); 4] {
    let pick = |key: fn(&(f32, f32)) -> f32, largest: bool| {
        let mut ordered = points;
        ordered.sort_by(|a, b| key(a).total_cmp(&key(b)));
        if largest {
            ordered[3]
        } else {
            ordered[0]
        }
    };
    let sum = |p: &(f32, f32)| p.0 + p.1;
    let diff = |p: &(f32, f32)| p.1 - p.0;
    [
        pick(sum, false),
        pick(diff, false),
        pick(sum, true),
        pick(diff, true),
    ]
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Map the quadrilateral onto an upright rectangle sized by its longer edges.
fn warp_quad(gray: &GrayImage, corners: [(f32, f32); 4]) -> Result<GrayImage, RectifyError> {
    let [tl, tr, br, bl] = corners;
    let width = (distance(br, bl) as u32).max(distance(tr, tl) as u32);
    let height = (distance(tr, br) as u32).max(distance(tl, bl) as u32);
    if width < 2 || height < 2 {
        return Err(RectifyError::NoReceiptRegion(format!(
            "degenerate quadrilateral {width}x{height}"
        )));
    }

    let (right, bottom) = ((width - 1) as f32, (height - 1) as f32);
    let target = [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)];
    let projection = Projection::from_control_points(corners, target).ok_or_else(|| {
        RectifyError::NoReceiptRegion("corners do not define a perspective transform".into())
    })?;

    let mut out = GrayImage::new(width, height);
    warp_into(gray, &projection, Interpolation::Bilinear, Luma([255u8]), &mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;
    use imageproc::drawing::draw_polygon_mut;

    /// Light background with a dark rectangle spanning `from..to` on both axes.
    fn photo(size: u32, from: u32, to: u32) -> DynamicImage {
        let img: GrayImage = ImageBuffer::from_fn(size, size, |x, y| {
            let inside = (from..to).contains(&x) && (from..to).contains(&y);
            Luma([if inside { 30 } else { 220 }])
        });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn crops_dominant_region() {
        let out = rectify(&photo(100, 10, 90), &RectifierConfig::default()).unwrap();
        assert!((70..=81).contains(&out.width()), "width was {}", out.width());
        assert!((70..=81).contains(&out.height()), "height was {}", out.height());
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    /// Light `size`² field with a dark filled polygon.
    fn polygon_photo(size: u32, corners: &[(i32, i32)]) -> DynamicImage {
        let mut img: GrayImage = ImageBuffer::from_pixel(size, size, Luma([220u8]));
        let poly: Vec<Point<i32>> = corners.iter().map(|&(x, y)| Point::new(x, y)).collect();
        draw_polygon_mut(&mut img, &poly, Luma([30u8]));
        DynamicImage::ImageLuma8(img)
    }

    fn dark_share(img: &GrayImage) -> f64 {
        let dark = img.pixels().filter(|p| p[0] == 0).count();
        dark as f64 / f64::from(img.width() * img.height())
    }

    #[test]
    fn straightens_skewed_quadrilateral() {
        let skewed = polygon_photo(200, &[(30, 10), (180, 25), (170, 190), (15, 175)]);
        let out = rectify(&skewed, &RectifierConfig::default()).unwrap();

        // Edges are ~151/156 wide and ~165/166 tall.
        assert!((140..=160).contains(&out.width()), "width was {}", out.width());
        assert!((155..=175).contains(&out.height()), "height was {}", out.height());
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(dark_share(&out) > 0.9, "dark share was {}", dark_share(&out));
    }

    #[test]
    fn octagon_falls_back_to_bounding_rectangle() {
        let octagon = [(20, 0), (60, 0), (80, 20), (80, 60), (60, 80), (20, 80), (0, 60), (0, 20)];
        let contour: Vec<Point<i32>> = octagon.iter().map(|&(x, y)| Point::new(x, y)).collect();
        let corners = order_corners(quadrilateral(&contour, 0.02));
        let expected = [(0.0, 0.0), (80.0, 0.0), (80.0, 80.0), (0.0, 80.0)];
        for (got, want) in corners.iter().zip(expected) {
            assert!(
                (got.0 - want.0).abs() <= 1.0 && (got.1 - want.1).abs() <= 1.0,
                "corners were {corners:?}"
            );
        }
    }

    #[test]
    fn rectifies_notched_region_through_bounding_rectangle() {
        let octagon = [(25, 5), (75, 5), (95, 25), (95, 75), (75, 95), (25, 95), (5, 75), (5, 25)];
        let out = rectify(&polygon_photo(100, &octagon), &RectifierConfig::default()).unwrap();

        assert!((85..=95).contains(&out.width()), "width was {}", out.width());
        assert!((85..=95).contains(&out.height()), "height was {}", out.height());
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
        // Cut corners lie inside the rectangle but outside the paper.
        assert_eq!(out.get_pixel(0, 0)[0], 255);
        assert_eq!(out.get_pixel(out.width() / 2, out.height() / 2)[0], 0);
    }

    #[test]
    fn small_region_is_not_a_receipt() {
        let err = rectify(&photo(100, 40, 60), &RectifierConfig::default()).unwrap_err();
        assert!(matches!(err, RectifyError::NoReceiptRegion(_)));
    }

    #[test]
    fn undecodable_bytes_are_unreadable() {
        let err = rectify_bytes(b"not an image", &RectifierConfig::default()).unwrap_err();
        assert!(matches!(err, RectifyError::ImageUnreadable(_)));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let err = rectify_file(&dir.path().join("nope.png"), &RectifierConfig::default())
            .unwrap_err();
        assert!(matches!(err, RectifyError::ImageUnreadable(_)));
    }

    #[test]
    fn closing_bridges_narrow_gaps() {
        let mask: GrayImage = ImageBuffer::from_fn(20, 5, |x, _| {
            Luma([if x == 8 || x == 9 { 0 } else { 255 }])
        });
        let closed = close_rect(&mask, 5, 1);
        assert_eq!(closed.get_pixel(8, 2)[0], 255);
        assert_eq!(closed.get_pixel(9, 2)[0], 255);
    }

    #[test]
    fn closing_keeps_wide_gaps() {
        let mask: GrayImage =
            ImageBuffer::from_fn(30, 3, |x, _| Luma([if (10..20).contains(&x) { 0 } else { 255 }]));
        let closed = close_rect(&mask, 5, 1);
        assert_eq!(closed.get_pixel(15, 1)[0], 0);
    }

    #[test]
    fn corners_are_ordered_clockwise_from_top_left() {
        let shuffled = [(90.0, 88.0), (12.0, 10.0), (8.0, 92.0), (95.0, 5.0)];
        assert_eq!(
            order_corners(shuffled),
            [(12.0, 10.0), (95.0, 5.0), (90.0, 88.0), (8.0, 92.0)]
        );
    }

    #[test]
    fn shoelace_area_of_square() {
        let square = [Point::new(0, 0), Point::new(10, 0), Point::new(10, 10), Point::new(0, 10)];
        assert_eq!(polygon_area(&square), 100.0);
    }

    #[test]
    fn encode_png_writes_png_header() {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([200u8]));
        let bytes = encode_png(&img).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }
}
