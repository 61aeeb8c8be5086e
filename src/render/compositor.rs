//! Layers the rig's sprites onto a canvas

use glam::Vec2;

use super::{Canvas, Color};
use crate::avatar::{AvatarState, Sprite, SpriteTable, Transform2D};
use crate::config::Config;

/// What is drawn behind the avatar
#[derive(Debug, Clone)]
pub enum Background {
    Color(Color),
    Image(Sprite),
}

/// Draws one [`AvatarState`] per frame: background, eyes, mouth, body.
#[derive(Debug)]
pub struct Compositor {
    sprites: SpriteTable,
    background: Background,
    rotation_offset: f32,
}

impl Compositor {
    pub fn new(sprites: SpriteTable, background: Background, rotation_offset: f32) -> Self {
        Self {
            sprites,
            background,
            rotation_offset,
        }
    }

    /// Build from configuration, with an already loaded background image if
    /// one is configured
    pub fn from_config(sprites: SpriteTable, background_image: Option<Sprite>, config: &Config) -> Self {
        let background = match background_image {
            Some(image) => Background::Image(image),
            None => Background::Color(image::Rgba(config.window.background_color)),
        };
        Self::new(sprites, background, config.avatar.rotation_offset_degrees)
    }

    pub fn sprites(&self) -> &SpriteTable {
        &self.sprites
    }

    /// Draw a full frame into the canvas back buffer. Does not present.
    pub fn draw<C: Canvas + ?Sized>(&self, canvas: &mut C, state: &AvatarState) {
        match &self.background {
            Background::Color(color) => canvas.fill(*color),
            Background::Image(image) => canvas.blit(image, Vec2::ZERO),
        }

        for key in state.layers() {
            self.draw_layer(canvas, self.sprites.get(key), state.body());
        }
    }

    fn draw_layer<C: Canvas + ?Sized>(&self, canvas: &mut C, sprite: &Sprite, transform: &Transform2D) {
        let half = Vec2::new(sprite.width() as f32, sprite.height() as f32) / 2.0;
        let center = transform.position + half;
        let rotated = canvas.rotate(sprite, transform.angle_degrees + self.rotation_offset);
        canvas.blit_centered(&rotated, center);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::assets::tests::solid_table;
    use crate::avatar::{Expression, EyeState, HandPose, MouthState};
    use crate::error::Fushigi2dError;
    use crate::render::RasterCanvas;
    use image::Rgba;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Fill(Color),
        Blit { shade: u8, center: Vec2 },
        Rotate(f32),
    }

    #[derive(Default)]
    struct RecordingCanvas {
        ops: std::cell::RefCell<Vec<Op>>,
        presented: usize,
    }

    impl Canvas for RecordingCanvas {
        fn size(&self) -> (u32, u32) {
            (500, 500)
        }

        fn fill(&mut self, color: Color) {
            self.ops.get_mut().push(Op::Fill(color));
        }

        fn blit(&mut self, image: &Sprite, top_left: Vec2) {
            let half = Vec2::new(image.width() as f32, image.height() as f32) / 2.0;
            self.ops.get_mut().push(Op::Blit {
                shade: image.get_pixel(0, 0)[0],
                center: top_left + half,
            });
        }

        fn rotate(&self, image: &Sprite, degrees: f32) -> Sprite {
            self.ops.borrow_mut().push(Op::Rotate(degrees));
            image.clone()
        }

        fn present(&mut self) -> Result<(), Fushigi2dError> {
            self.presented += 1;
            Ok(())
        }
    }

    fn state(eyes: EyeState, mouth: MouthState, hand: HandPose, body: Transform2D) -> AvatarState {
        let expression = Expression {
            eyes,
            mouth,
            face_tracked: true,
        };
        AvatarState::new(expression, hand, body)
    }

    fn shade(table: &SpriteTable, key: crate::avatar::SpriteKey) -> u8 {
        table.get(key).get_pixel(0, 0)[0]
    }

    #[test]
    fn test_layer_order_and_placement() {
        let table = solid_table(10);
        let expected: Vec<u8> = [
            crate::avatar::SpriteKey::Blink,
            crate::avatar::SpriteKey::MouthU,
            crate::avatar::SpriteKey::Wave1,
        ]
        .into_iter()
        .map(|key| shade(&table, key))
        .collect();

        let green = Rgba([0, 255, 0, 255]);
        let compositor = Compositor::new(table, Background::Color(green), 180.0);
        let mut canvas = RecordingCanvas::default();
        let body = Transform2D::new(Vec2::new(20.0, 30.0), 15.0);

        compositor.draw(&mut canvas, &state(EyeState::Blink, MouthState::U, HandPose::Near, body));

        let ops = canvas.ops.into_inner();
        assert_eq!(ops[0], Op::Fill(green));

        let blits: Vec<_> = ops
            .iter()
            .filter_map(|op| match op {
                Op::Blit { shade, center } => Some((*shade, *center)),
                _ => None,
            })
            .collect();
        assert_eq!(blits.iter().map(|b| b.0).collect::<Vec<_>>(), expected);
        // centre is position + size / 2
        assert!(blits.iter().all(|b| b.1 == Vec2::new(25.0, 35.0)));

        let rotations: Vec<_> = ops
            .iter()
            .filter_map(|op| match op {
                Op::Rotate(d) => Some(*d),
                _ => None,
            })
            .collect();
        assert_eq!(rotations, vec![195.0; 3]);
        assert_eq!(canvas.presented, 0);
    }

    #[test]
    fn test_hand_anchors_are_not_drawn() {
        let compositor = Compositor::new(solid_table(4), Background::Color(Rgba([0, 255, 0, 255])), 180.0);
        let body = Transform2D::at(10.0, 10.0);
        let base = state(EyeState::Open, MouthState::Idle, HandPose::Far, body);

        let mut still = RecordingCanvas::default();
        compositor.draw(&mut still, &base);
        let mut moved = RecordingCanvas::default();
        compositor.draw(&mut moved, &base.with_hands(Vec2::new(300.0, 40.0), Vec2::new(-80.0, 90.0)));

        assert_eq!(still.ops.into_inner(), moved.ops.into_inner());
    }

    #[test]
    fn test_background_image_drawn_first() {
        let background = image::RgbaImage::from_pixel(4, 4, Rgba([7, 7, 7, 255]));
        let compositor = Compositor::new(solid_table(4), Background::Image(background), 0.0);
        let mut canvas = RecordingCanvas::default();

        compositor.draw(&mut canvas, &AvatarState::default());

        let ops = canvas.ops.into_inner();
        assert_eq!(
            ops[0],
            Op::Blit {
                shade: 7,
                center: Vec2::new(2.0, 2.0)
            }
        );
        assert!(!ops.iter().any(|op| matches!(op, Op::Fill(_))));
    }

    #[test]
    fn test_body_layer_occludes_face_layers() {
        let table = solid_table(4);
        let body_shade = shade(&table, crate::avatar::SpriteKey::IdleBody);
        let compositor = Compositor::new(table, Background::Color(Rgba([0, 255, 0, 255])), 0.0);

        let mut canvas = RasterCanvas::new(8, 8).unwrap();
        let body = Transform2D::at(2.0, 2.0);
        compositor.draw(&mut canvas, &state(EyeState::Open, MouthState::A, HandPose::Lowered, body));
        canvas.present().unwrap();

        let frame = canvas.frame();
        assert_eq!(frame.get_pixel(3, 3)[0], body_shade);
        assert_eq!(*frame.get_pixel(0, 0), Rgba([0, 255, 0, 255]));
        assert_eq!(*frame.get_pixel(6, 6), Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn test_from_config_uses_fill_color() {
        let config = Config::default();
        let compositor = Compositor::from_config(solid_table(2), None, &config);
        assert!(matches!(
            compositor.background,
            Background::Color(Rgba([0, 255, 0, 255]))
        ));
        assert_eq!(compositor.rotation_offset, 180.0);
    }
}
