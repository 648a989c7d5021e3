use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::classification::is_normal_label;
use crate::detection::{BoundingBox, Detection};

/// Box and label colour for error classes.
const ERROR_COLOR: Rgb<u8> = Rgb([220, 30, 30]);

/// Box and label colour for the normal printing state.
const NORMAL_COLOR: Rgb<u8> = Rgb([30, 180, 30]);

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Border thickness in pixels, drawn outwards from the box edge.
const BOX_THICKNESS: i32 = 3;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_ADVANCE: u32 = 6;
const LABEL_SCALE: u32 = 2;
const LABEL_PADDING: u32 = 2;
const LABEL_HEIGHT: u32 = GLYPH_HEIGHT * LABEL_SCALE + 2 * LABEL_PADDING;

/// Draw detection boxes and their "label confidence" tags onto an RGB copy
/// of `frame`.
///
/// Boxes are clipped to the frame. Inverted or empty boxes, and boxes
/// entirely outside the frame, are skipped along with their tags. A tag sits
/// above its box, or just inside it when the box touches the top edge.
pub fn render(frame: &DynamicImage, detections: &[Detection]) -> RgbImage {
    let mut canvas = frame.to_rgb8();
    let (width, height) = canvas.dimensions();
    let mut tags = Vec::new();

    for detection in detections {
        let bbox = detection.bounding_box;
        // Also rejects NaN corners.
        if !(bbox.xmax > bbox.xmin && bbox.ymax > bbox.ymin) {
            continue;
        }
        let Some(anchor) = clipped_rect(&bbox, 0.0, width, height) else {
            continue;
        };

        let color = if is_normal_label(&detection.label) {
            NORMAL_COLOR
        } else {
            ERROR_COLOR
        };
        for thickness in 0..BOX_THICKNESS {
            if let Some(rect) = clipped_rect(&bbox, thickness as f32, width, height) {
                draw_hollow_rect_mut(&mut canvas, rect, color);
            }
        }
        tags.push((anchor, label_text(detection), color));
    }

    // Tags go on last so no neighbouring box is drawn over them.
    for (anchor, text, color) in &tags {
        draw_label(&mut canvas, *anchor, text, *color);
    }

    canvas
}

fn label_text(detection: &Detection) -> String {
    format!("{} {:.2}", detection.label, detection.confidence)
}

fn clipped_rect(bbox: &BoundingBox, grow: f32, width: u32, height: u32) -> Option<Rect> {
    let left = (bbox.xmin - grow).max(0.0) as u32;
    let top = (bbox.ymin - grow).max(0.0) as u32;
    let right = (bbox.xmax + grow).min(width as f32).max(0.0) as u32;
    let bottom = (bbox.ymax + grow).min(height as f32).max(0.0) as u32;

    // Rect::of_size panics on a zero side.
    if right <= left || bottom <= top {
        return None;
    }

    Some(Rect::at(left as i32, top as i32).of_size(right - left, bottom - top))
}

fn draw_label(canvas: &mut RgbImage, anchor: Rect, text: &str, background: Rgb<u8>) {
    let glyphs: Vec<char> = text.chars().flat_map(char::to_uppercase).collect();
    let label_width = glyphs.len() as u32 * GLYPH_ADVANCE * LABEL_SCALE + 2 * LABEL_PADDING;

    let left = anchor.left();
    let top = if anchor.top() >= LABEL_HEIGHT as i32 {
        anchor.top() - LABEL_HEIGHT as i32
    } else {
        anchor.top()
    };
    // Out-of-canvas parts are clipped by imageproc.
    draw_filled_rect_mut(
        canvas,
        Rect::at(left, top).of_size(label_width, LABEL_HEIGHT),
        background,
    );

    let mut x = left + LABEL_PADDING as i32;
    let y = top + LABEL_PADDING as i32;
    for ch in glyphs {
        for (row, bits) in glyph_rows(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                    let px = x + (col * LABEL_SCALE) as i32;
                    let py = y + (row as u32 * LABEL_SCALE) as i32;
                    draw_filled_rect_mut(
                        canvas,
                        Rect::at(px, py).of_size(LABEL_SCALE, LABEL_SCALE),
                        TEXT_COLOR,
                    );
                }
            }
        }
        x += (GLYPH_ADVANCE * LABEL_SCALE) as i32;
    }
}

/// 5x7 bitmap rows for an upper-case character. Anything outside the table
/// renders as '?'.
fn glyph_rows(ch: char) -> [u8; 7] {
    match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '.' => [0, 0, 0, 0, 0, 0b00110, 0b00110],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '_' => [0, 0, 0, 0, 0, 0, 0b11111],
        ' ' => [0; 7],
        _ => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0, 0b00100],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(label: &str, confidence: f32, corners: [f32; 4]) -> Detection {
        Detection {
            label: label.to_string(),
            confidence,
            bounding_box: BoundingBox::from_corners(corners),
        }
    }

    fn has_text_in_rows(canvas: &RgbImage, rows: std::ops::Range<u32>) -> bool {
        rows.flat_map(|y| (0..canvas.width()).map(move |x| (x, y)))
            .any(|(x, y)| *canvas.get_pixel(x, y) == TEXT_COLOR)
    }

    #[test]
    fn draws_box_border_without_touching_interior() {
        let frame = DynamicImage::new_rgb8(200, 80);
        let canvas = render(&frame, &[detection("spaghetti", 0.5, [10.0, 30.0, 60.0, 70.0])]);

        assert_eq!(canvas.dimensions(), (200, 80));
        assert_eq!(*canvas.get_pixel(10, 30), ERROR_COLOR);
        assert_eq!(*canvas.get_pixel(35, 50), Rgb([0, 0, 0]));
    }

    #[test]
    fn label_is_written_above_the_box() {
        let frame = DynamicImage::new_rgb8(200, 80);
        let canvas = render(&frame, &[detection("spaghetti", 0.5, [10.0, 30.0, 60.0, 70.0])]);

        let label_top = 30 - LABEL_HEIGHT;
        assert_eq!(*canvas.get_pixel(10, label_top), ERROR_COLOR);
        assert!(has_text_in_rows(&canvas, label_top..30));
        // Nothing is written above the tag.
        assert!(!has_text_in_rows(&canvas, 0..label_top));
    }

    #[test]
    fn label_moves_inside_a_box_touching_the_top_edge() {
        let frame = DynamicImage::new_rgb8(200, 80);
        let canvas = render(&frame, &[detection("warping", 0.9, [4.0, 0.0, 80.0, 60.0])]);

        assert!(has_text_in_rows(&canvas, 0..LABEL_HEIGHT));
        assert!(!has_text_in_rows(&canvas, LABEL_HEIGHT..80));
    }

    #[test]
    fn normal_state_is_drawn_in_its_own_colour() {
        let frame = DynamicImage::new_rgb8(200, 80);
        let canvas = render(
            &frame,
            &[
                detection("Imprimiendo", 0.9, [10.0, 30.0, 60.0, 70.0]),
                detection("stringing", 0.8, [120.0, 30.0, 180.0, 70.0]),
            ],
        );

        assert_eq!(*canvas.get_pixel(10, 50), NORMAL_COLOR);
        assert_eq!(*canvas.get_pixel(120, 50), ERROR_COLOR);
    }

    #[test]
    fn out_of_frame_and_degenerate_boxes_are_skipped() {
        let frame = DynamicImage::new_rgb8(16, 16);
        let detections = [
            detection("spaghetti", 0.5, [50.0, 50.0, 80.0, 80.0]),
            detection("spaghetti", 0.5, [5.0, 5.0, 5.0, 5.0]),
            detection("spaghetti", 0.5, [9.0, 9.0, 2.0, 2.0]),
            detection("spaghetti", 0.5, [f32::NAN, 0.0, 4.0, 4.0]),
        ];

        let canvas = render(&frame, &detections);

        assert!(canvas.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn boxes_are_clipped_to_frame() {
        let frame = DynamicImage::new_rgb8(40, 40);
        let canvas = render(&frame, &[detection("blob", 0.3, [-5.0, -5.0, 100.0, 100.0])]);
        assert_eq!(*canvas.get_pixel(39, 39), ERROR_COLOR);
    }

    #[test]
    fn characters_outside_the_font_render_as_question_mark() {
        assert_eq!(glyph_rows('É'), glyph_rows('?'));
        assert_ne!(glyph_rows('E'), glyph_rows('?'));
    }
}
