//! Debug skeleton drawn over the camera frame.

use crate::types::{LandmarkSet, VideoFrame, HAND_CONNECTIONS};

const BONE_COLOR: [u8; 3] = [255, 255, 255];
const JOINT_COLOR: [u8; 3] = [255, 48, 48];
const JOINT_RADIUS: i64 = 2;

/// Draw the hand's bones and joints onto an RGB frame. Landmarks outside the
/// image are clipped; connections to missing landmarks are skipped.
pub fn draw_landmarks(frame: &mut VideoFrame, landmarks: &LandmarkSet) {
    let to_px = |i: usize| {
        landmarks.get(i).map(|p| {
            (
                (p.x * frame.width as f32).round() as i64,
                (p.y * frame.height as f32).round() as i64,
            )
        })
    };

    let bones: Vec<((i64, i64), (i64, i64))> = HAND_CONNECTIONS
        .iter()
        .filter_map(|&(a, b)| Some((to_px(a)?, to_px(b)?)))
        .collect();
    let joints: Vec<(i64, i64)> = (0..landmarks.len()).filter_map(to_px).collect();

    for (a, b) in bones {
        draw_line(frame, a, b, BONE_COLOR);
    }
    for (x, y) in joints {
        for dy in -JOINT_RADIUS..=JOINT_RADIUS {
            for dx in -JOINT_RADIUS..=JOINT_RADIUS {
                if dx * dx + dy * dy <= JOINT_RADIUS * JOINT_RADIUS {
                    frame.put_pixel(x + dx, y + dy, JOINT_COLOR);
                }
            }
        }
    }
}

/// Bresenham.
fn draw_line(frame: &mut VideoFrame, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: [u8; 3]) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);
    // Bound the walk so absurd coordinates can't stall the loop.
    let max_steps = (dx - dy + 1).min(4 * (frame.width as i64 + frame.height as i64));
    for _ in 0..max_steps {
        frame.put_pixel(x, y, color);
        if x == x1 && y == y1 {
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
