// src/draw.rs
//
// Burns track boxes into a frame for the annotated stream. Box color
// is keyed by track id so an object keeps its color across frames.

use crate::error::ExportError;
use crate::pipeline::snapshot::TrackObservation;
use crate::types::Frame;
use image::{Rgb, RgbImage};

const PALETTE: [[u8; 3]; 6] = [
    [230, 60, 60],   // red
    [60, 200, 60],   // green
    [70, 100, 230],  // blue
    [230, 200, 40],  // yellow
    [200, 70, 200],  // magenta
    [60, 200, 200],  // cyan
];

const STROKE: i32 = 2;

pub(crate) fn frame_to_image(frame: &Frame) -> Result<RgbImage, ExportError> {
    RgbImage::from_raw(frame.width as u32, frame.height as u32, frame.data.clone())
        .ok_or(ExportError::FrameBuffer(frame.width, frame.height))
}

/// Copy of the frame with every track's current box stroked in.
pub fn annotate_frame(frame: &Frame, tracks: &[TrackObservation]) -> Result<RgbImage, ExportError> {
    let mut img = frame_to_image(frame)?;
    for track in tracks {
        stroke_rect(&mut img, track);
    }
    Ok(img)
}

fn stroke_rect(img: &mut RgbImage, track: &TrackObservation) {
    let color = Rgb(PALETTE[track.id as usize % PALETTE.len()]);
    let (w, h) = (img.width() as i32, img.height() as i32);
    let bbox = track.bbox;

    let x1 = bbox.x;
    let y1 = bbox.y;
    let x2 = bbox.x2();
    let y2 = bbox.y2();

    for t in 0..STROKE {
        // Horizontal edges.
        for x in x1..=x2 {
            put(img, w, h, x, y1 + t, color);
            put(img, w, h, x, y2 - t, color);
        }
        // Vertical edges.
        for y in y1..=y2 {
            put(img, w, h, x1 + t, y, color);
            put(img, w, h, x2 - t, y, color);
        }
    }
}

#[inline]
fn put(img: &mut RgbImage, w: i32, h: i32, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < w && y < h {
        img.put_pixel(x as u32, y as u32, color);
    }
}
