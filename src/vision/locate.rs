//! Template location by normalized cross-correlation
//!
//! Plain image correlation over a captured frame: no feature detection, no
//! OCR. Color matching averages the per-channel scores; grayscale matching
//! runs on the luma plane. A multi-scale sweep compensates for moderate UI
//! scaling before the caller gives up on a template.

use image::{GrayImage, ImageBuffer, Luma, RgbaImage};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use log::debug;

use crate::control::Point;

/// Options for a single-scale template search.
#[derive(Debug, Clone, Copy)]
pub struct LocateOptions {
    /// Minimum correlation score in `[0, 1]` to accept the best placement.
    pub confidence: f32,
    /// Match on luma only instead of averaging RGB channel scores.
    pub grayscale: bool,
}

impl LocateOptions {
    pub fn color(confidence: f32) -> Self {
        Self {
            confidence,
            grayscale: false,
        }
    }

    pub fn grayscale(confidence: f32) -> Self {
        Self {
            confidence,
            grayscale: true,
        }
    }
}

/// Locate `template` inside `frame`. Returns the center of the best
/// placement (frame-relative) if it clears the confidence threshold.
pub fn locate_in(frame: &RgbaImage, template: &RgbaImage, opts: &LocateOptions) -> Option<Point> {
    if !fits(frame, template.width(), template.height()) {
        return None;
    }
    let (score, center) = if opts.grayscale {
        best_match_gray(
            &image::imageops::grayscale(frame),
            &image::imageops::grayscale(template),
        )?
    } else {
        best_match_color(frame, template)?
    };
    if score >= opts.confidence {
        Some(center)
    } else {
        debug!("template best score {score:.3} below {:.2}", opts.confidence);
        None
    }
}

/// Multi-scale sweep: resize the template by each factor, keep the single
/// best score across scales, then apply the confidence ladder high to low.
pub fn locate_scaled(
    frame: &RgbaImage,
    template: &RgbaImage,
    confidences: &[f32],
    scales: &[f32],
) -> Option<Point> {
    let frame_gray = image::imageops::grayscale(frame);
    let template_gray = image::imageops::grayscale(template);

    let mut best: Option<(f32, Point)> = None;
    for &scale in scales {
        let tw = (template_gray.width() as f32 * scale).round() as u32;
        let th = (template_gray.height() as f32 * scale).round() as u32;
        if tw < 8 || th < 8 || !fits(frame, tw, th) {
            continue;
        }
        let resized = image::imageops::resize(
            &template_gray,
            tw,
            th,
            image::imageops::FilterType::Triangle,
        );
        if let Some((score, center)) = best_match_gray(&frame_gray, &resized) {
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, center));
            }
        }
    }

    let (score, center) = best?;
    for &confidence in confidences {
        if score >= confidence {
            return Some(center);
        }
    }
    debug!("scaled template best score {score:.3} below all thresholds");
    None
}

fn fits(frame: &RgbaImage, tw: u32, th: u32) -> bool {
    tw >= 1 && th >= 1 && tw <= frame.width() && th <= frame.height()
}

fn best_match_gray(frame: &GrayImage, template: &GrayImage) -> Option<(f32, Point)> {
    let scores = match_template(
        frame,
        template,
        MatchTemplateMethod::CrossCorrelationNormalized,
    );
    let extremes = find_extremes(&scores);
    let (x, y) = extremes.max_value_location;
    Some((
        extremes.max_value,
        center_of(x, y, template.width(), template.height()),
    ))
}

fn best_match_color(frame: &RgbaImage, template: &RgbaImage) -> Option<(f32, Point)> {
    let mut combined: Option<ImageBuffer<Luma<f32>, Vec<f32>>> = None;
    for channel in 0..3 {
        let frame_ch = extract_channel(frame, channel);
        let template_ch = extract_channel(template, channel);
        let scores = match_template(
            &frame_ch,
            &template_ch,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        combined = Some(match combined {
            None => scores,
            Some(mut acc) => {
                for (a, s) in acc.pixels_mut().zip(scores.pixels()) {
                    a[0] += s[0];
                }
                acc
            }
        });
    }
    let mut scores = combined?;
    for p in scores.pixels_mut() {
        p[0] /= 3.0;
    }
    let extremes = find_extremes(&scores);
    let (x, y) = extremes.max_value_location;
    Some((
        extremes.max_value,
        center_of(x, y, template.width(), template.height()),
    ))
}

fn extract_channel(image: &RgbaImage, channel: usize) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y)[channel]])
    })
}

fn center_of(x: u32, y: u32, tw: u32, th: u32) -> Point {
    Point::new((x + tw / 2) as i32, (y + th / 2) as i32)
}
