//! Viewport placement for a video inside a surface.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn full(width: i32, height: i32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// Scale the video to cover the whole surface, keeping its aspect ratio, centered.
///
/// The overflowing dimension extends past the surface on both sides (negative `x`/`y`),
/// so the video gets cropped rather than letterboxed. Unknown video size (either side 0)
/// or an empty surface falls back to the full surface.
pub fn cover(surface_w: i32, surface_h: i32, video_w: i32, video_h: i32) -> Viewport {
    if video_w <= 0 || video_h <= 0 || surface_w <= 0 || surface_h <= 0 {
        return Viewport::full(surface_w.max(0), surface_h.max(0));
    }

    let video_aspect = video_w as f32 / video_h as f32;
    let surface_aspect = surface_w as f32 / surface_h as f32;

    let (width, height) = if surface_aspect > video_aspect {
        (surface_w, (surface_w as f32 / video_aspect) as i32)
    } else {
        ((surface_h as f32 * video_aspect) as i32, surface_h)
    };

    Viewport {
        x: (surface_w - width) / 2,
        y: (surface_h - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_aspect_fills_exactly() {
        assert_eq!(cover(1920, 1080, 1280, 720), Viewport::full(1920, 1080));
    }

    #[test]
    fn wide_surface_crops_top_and_bottom() {
        let vp = cover(1000, 500, 400, 400);
        assert_eq!(vp.width, 1000);
        assert_eq!(vp.height, 1000);
        assert_eq!((vp.x, vp.y), (0, -250));
    }

    #[test]
    fn tall_surface_crops_the_sides() {
        let vp = cover(500, 1000, 1920, 1080);
        assert_eq!(vp.height, 1000);
        assert_eq!(vp.width, 1777);
        assert!(vp.x < 0);
        assert_eq!(vp.y, 0);
    }

    #[test]
    fn unknown_video_size_uses_the_surface() {
        assert_eq!(cover(640, 480, 0, 720), Viewport::full(640, 480));
        assert_eq!(cover(0, 0, 1280, 720), Viewport::full(0, 0));
    }
}
