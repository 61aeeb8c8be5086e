//! Rendering module
//!
//! An abstract 2D canvas, a software raster implementation of it, and the
//! compositor that layers the rig's sprites onto it.

pub mod compositor;
pub mod raster;

use glam::Vec2;
use image::Rgba;

use crate::avatar::Sprite;
use crate::error::Fushigi2dError;

pub use compositor::Compositor;
pub use raster::RasterCanvas;

/// RGBA colour
pub type Color = Rgba<u8>;

/// Render target for the compositor.
///
/// Angles are degrees, positive clockwise on screen (y grows downward), the
/// same convention as the shoulder roll.
pub trait Canvas {
    /// Canvas size in pixels
    fn size(&self) -> (u32, u32);

    /// Fill the whole canvas with one colour
    fn fill(&mut self, color: Color);

    /// Draw `image` with its top-left corner at `top_left`, alpha blended
    fn blit(&mut self, image: &Sprite, top_left: Vec2);

    /// Draw `image` centred on `center`
    fn blit_centered(&mut self, image: &Sprite, center: Vec2) {
        let half = Vec2::new(image.width() as f32, image.height() as f32) / 2.0;
        self.blit(image, center - half);
    }

    /// Rotate `image` about its centre. The result grows to fit the rotated
    /// bounds; uncovered pixels are transparent.
    fn rotate(&self, image: &Sprite, degrees: f32) -> Sprite {
        raster::rotate(image, degrees)
    }

    /// Publish the frame drawn since the last call
    fn present(&mut self) -> Result<(), Fushigi2dError>;
}

impl<C: Canvas + ?Sized> Canvas for &mut C {
    fn size(&self) -> (u32, u32) {
        (**self).size()
    }

    fn fill(&mut self, color: Color) {
        (**self).fill(color)
    }

    fn blit(&mut self, image: &Sprite, top_left: Vec2) {
        (**self).blit(image, top_left)
    }

    fn blit_centered(&mut self, image: &Sprite, center: Vec2) {
        (**self).blit_centered(image, center)
    }

    fn rotate(&self, image: &Sprite, degrees: f32) -> Sprite {
        (**self).rotate(image, degrees)
    }

    fn present(&mut self) -> Result<(), Fushigi2dError> {
        (**self).present()
    }
}
