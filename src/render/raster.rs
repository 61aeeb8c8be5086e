//! Software raster canvas over an RGBA buffer

use std::path::Path;

use glam::Vec2;
use image::{imageops, RgbaImage};

use super::{Canvas, Color};
use crate::avatar::Sprite;
use crate::error::{Fushigi2dError, RenderError};
use crate::features::normalize_angle;

/// Double-buffered RGBA canvas. Drawing goes to the back buffer;
/// [`Canvas::present`] copies it to the front buffer.
#[derive(Debug, Clone)]
pub struct RasterCanvas {
    back: RgbaImage,
    front: RgbaImage,
    frames_presented: u64,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Result<Self, Fushigi2dError> {
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyCanvas { width, height }.into());
        }
        Ok(Self {
            back: RgbaImage::new(width, height),
            front: RgbaImage::new(width, height),
            frames_presented: 0,
        })
    }

    /// Most recently presented frame
    pub fn frame(&self) -> &RgbaImage {
        &self.front
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Write the most recently presented frame to a PNG file
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), Fushigi2dError> {
        let path = path.as_ref();
        self.front
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| RenderError::Snapshot(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Saved frame {} to {}", self.frames_presented, path.display());
        Ok(())
    }
}

impl Canvas for RasterCanvas {
    fn size(&self) -> (u32, u32) {
        self.back.dimensions()
    }

    fn fill(&mut self, color: Color) {
        for pixel in self.back.pixels_mut() {
            *pixel = color;
        }
    }

    fn blit(&mut self, image: &Sprite, top_left: Vec2) {
        imageops::overlay(
            &mut self.back,
            image,
            top_left.x.round() as i64,
            top_left.y.round() as i64,
        );
    }

    fn present(&mut self) -> Result<(), Fushigi2dError> {
        self.front.clone_from(&self.back);
        self.frames_presented += 1;
        Ok(())
    }
}

/// Rotate clockwise (y down) about the image centre, nearest-neighbour.
pub fn rotate(image: &RgbaImage, degrees: f32) -> RgbaImage {
    let angle = normalize_angle(degrees);
    if angle == 0.0 {
        return image.clone();
    }
    if angle == 90.0 {
        return imageops::rotate90(image);
    }
    if angle == 180.0 {
        return imageops::rotate180(image);
    }
    if angle == -90.0 {
        return imageops::rotate270(image);
    }

    let (w, h) = image.dimensions();
    let (sin, cos) = angle.to_radians().sin_cos();
    let (wf, hf) = (w as f32, h as f32);
    let out_w = ((wf * cos.abs() + hf * sin.abs()).ceil() as u32).max(1);
    let out_h = ((wf * sin.abs() + hf * cos.abs()).ceil() as u32).max(1);

    let src_center = Vec2::new(wf, hf) / 2.0;
    let dst_center = Vec2::new(out_w as f32, out_h as f32) / 2.0;

    let mut out = RgbaImage::new(out_w, out_h);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - dst_center;
        // inverse of the clockwise rotation
        let sx = d.x * cos + d.y * sin + src_center.x;
        let sy = -d.x * sin + d.y * cos + src_center.y;
        if sx >= 0.0 && sy >= 0.0 && sx < wf && sy < hf {
            *pixel = *image.get_pixel(sx as u32, sy as u32);
        }
    }
    out
}
