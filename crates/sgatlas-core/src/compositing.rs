use image::{Rgba, RgbaImage};

/// Copies `src` into `canvas` with its top-left at (dx, dy). Pixels past the canvas edge are
/// dropped. With `outlines`, a red 1px border is drawn over the copied area for debugging.
pub fn blit_rgba(src: &RgbaImage, canvas: &mut RgbaImage, dx: u32, dy: u32, outlines: bool) {
    let (cw, ch) = canvas.dimensions();
    let (sw, sh) = src.dimensions();
    let rw = sw.min(cw.saturating_sub(dx));
    let rh = sh.min(ch.saturating_sub(dy));
    for yy in 0..rh {
        for xx in 0..rw {
            canvas.put_pixel(dx + xx, dy + yy, *src.get_pixel(xx, yy));
        }
    }

    if outlines && rw > 0 && rh > 0 {
        let red = Rgba([255, 0, 0, 255]);
        for xx in 0..rw {
            canvas.put_pixel(dx + xx, dy, red);
            canvas.put_pixel(dx + xx, dy + rh - 1, red);
        }
        for yy in 0..rh {
            canvas.put_pixel(dx, dy + yy, red);
            canvas.put_pixel(dx + rw - 1, dy + yy, red);
        }
    }
}

/// Copies the `w` x `h` block at (sx, sy) out of `src`, clamped to its bounds.
pub fn crop_rgba(src: &RgbaImage, sx: u32, sy: u32, w: u32, h: u32) -> RgbaImage {
    let (iw, ih) = src.dimensions();
    let w = w.min(iw.saturating_sub(sx));
    let h = h.min(ih.saturating_sub(sy));
    image::imageops::crop_imm(src, sx, sy, w, h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blit_clips_at_canvas_edge() {
        let src = RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 255]));
        let mut canvas = RgbaImage::new(4, 4);
        blit_rgba(&src, &mut canvas, 2, 2, false);
        assert_eq!(canvas.get_pixel(3, 3), &Rgba([1, 2, 3, 255]));
        assert_eq!(canvas.get_pixel(1, 1), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn crop_clamps_to_source() {
        let src = RgbaImage::new(4, 2);
        let out = crop_rgba(&src, 3, 0, 5, 5);
        assert_eq!(out.dimensions(), (1, 2));
    }
}
