use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

// ─── Keys ───────────────────────────────────────────────────────────────────

/// One of the five press targets, in panel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    C,
    D,
    E,
    F,
    G,
}

impl Key {
    pub const ALL: [Key; 5] = [Key::C, Key::D, Key::E, Key::F, Key::G];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Key::C => "C",
            Key::D => "D",
            Key::E => "E",
            Key::F => "F",
            Key::G => "G",
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered subset of keys. Iteration always follows `Key::ALL` order,
/// regardless of insertion order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeySet(u8);

impl KeySet {
    pub const EMPTY: KeySet = KeySet(0);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b1_1111)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn insert(&mut self, key: Key) {
        self.0 |= 1 << key.index();
    }

    pub fn contains(self, key: Key) -> bool {
        self.0 & (1 << key.index()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Keys in `self` that are not in `other`.
    pub fn difference(self, other: KeySet) -> KeySet {
        KeySet(self.0 & !other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = Key> {
        Key::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<Key> for KeySet {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        let mut set = KeySet::EMPTY;
        for key in iter {
            set.insert(key);
        }
        set
    }
}

impl fmt::Display for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        let labels: Vec<&str> = self.iter().map(Key::label).collect();
        f.write_str(&labels.join(" "))
    }
}

/// Binding of one key to its fingertip landmark and note frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyBinding {
    pub fingertip: usize,
    pub frequency_hz: f64,
}

/// The key table, fixed at startup and passed by reference to whoever needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyLayout {
    bindings: [KeyBinding; 5],
}

impl KeyLayout {
    pub fn new(bindings: [KeyBinding; 5]) -> Self {
        Self { bindings }
    }

    pub fn binding(&self, key: Key) -> KeyBinding {
        self.bindings[key.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, KeyBinding)> + '_ {
        Key::ALL.into_iter().map(move |k| (k, self.bindings[k.index()]))
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        let mut bindings = [KeyBinding { fingertip: 0, frequency_hz: 0.0 }; 5];
        for key in Key::ALL {
            bindings[key.index()] = KeyBinding {
                fingertip: FINGER_TIPS[key.index()],
                frequency_hz: NOTE_FREQS_HZ[key.index()],
            };
        }
        Self { bindings }
    }
}

// ─── Hand landmarks ─────────────────────────────────────────────────────────

/// One normalized hand landmark. `x` and `y` are in 0.0–1.0 image space
/// (`y` grows downward); `z` is relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Landmarks for one tracked hand. Index `WRIST` is the wrist.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LandmarkSet {
    pub points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn wrist(&self) -> Option<&Landmark> {
        self.get(WRIST)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ─── Video frames ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb,
    Bgr,
}

/// Packed 8-bit, 3-channel image.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 3);
        Self { width, height, format, data }
    }

    pub fn filled(width: u32, height: u32, format: PixelFormat, px: [u8; 3]) -> Self {
        let data = px.repeat(width as usize * height as usize);
        Self { width, height, format, data }
    }

    /// Flip left-to-right in place, so on-screen motion matches the user's.
    pub fn mirror_horizontal(&mut self) {
        let row_len = self.width as usize * 3;
        if row_len == 0 {
            return;
        }
        for row in self.data.chunks_exact_mut(row_len) {
            let w = self.width as usize;
            for x in 0..w / 2 {
                let (a, b) = (x * 3, (w - 1 - x) * 3);
                for c in 0..3 {
                    row.swap(a + c, b + c);
                }
            }
        }
    }

    /// Channel-swap to RGB. No-op for frames already in RGB.
    pub fn into_rgb(mut self) -> Self {
        if self.format == PixelFormat::Bgr {
            for px in self.data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            self.format = PixelFormat::Rgb;
        }
        self
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    pub fn put_pixel(&mut self, x: i64, y: i64, px: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        self.data[i..i + 3].copy_from_slice(&px);
    }
}

// ─── Session clock ──────────────────────────────────────────────────────────

/// Monotonic clock for the session.
#[derive(Clone)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Constants ──────────────────────────────────────────────────────────────

/// Wrist landmark index.
pub const WRIST: usize = 0;
/// Number of landmarks in a full hand.
pub const HAND_LANDMARKS: usize = 21;
/// Thumb, index, middle, ring, pinky tips, bound to C, D, E, F, G.
pub const FINGER_TIPS: [usize; 5] = [4, 8, 12, 16, 20];
pub const NOTE_FREQS_HZ: [f64; 5] = [261.63, 293.66, 329.63, 349.23, 392.00];

pub const SAMPLE_RATE: u32 = 44_100;
pub const NOTE_DURATION_SECS: f64 = 0.3;

pub const CAPTURE_WIDTH: u32 = 640;
pub const CAPTURE_HEIGHT: u32 = 480;

/// UI refresh period.
pub const REFRESH_INTERVAL_MS: u64 = 15;
/// Delay between a close request and window teardown.
pub const CLOSE_GRACE_MS: u64 = 200;
/// Added to the frame interval before inverting it.
pub const FPS_EPSILON: f64 = 1e-5;

/// MediaPipe hand topology, used for the debug skeleton.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1), (1, 2), (2, 3), (3, 4),
    (0, 5), (5, 6), (6, 7), (7, 8),
    (5, 9), (9, 10), (10, 11), (11, 12),
    (9, 13), (13, 14), (14, 15), (15, 16),
    (13, 17), (17, 18), (18, 19), (19, 20),
    (0, 17),
];
