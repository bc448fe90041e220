use crate::types::{KeyLayout, KeySet, LandmarkSet};

/// Derive the pressed keys from one frame's hand landmarks.
///
/// A key is pressed when its fingertip sits strictly below the wrist in
/// image space (`tip.y > wrist.y`). Keys are evaluated independently. No
/// hand, no wrist point, or a missing fingertip all read as "not pressed".
pub fn map_keys(layout: &KeyLayout, landmarks: Option<&LandmarkSet>) -> KeySet {
    let mut pressed = KeySet::EMPTY;
    let Some(lm) = landmarks else {
        return pressed;
    };
    let Some(wrist) = lm.wrist() else {
        return pressed;
    };

    for (key, binding) in layout.iter() {
        if let Some(tip) = lm.get(binding.fingertip) {
            if tip.y > wrist.y {
                pressed.insert(key);
            }
        }
    }
    pressed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Key, Landmark, FINGER_TIPS, HAND_LANDMARKS};

    /// Hand with the wrist at y=0.5 and every point above it.
    fn open_hand() -> LandmarkSet {
        let mut points = vec![Landmark::new(0.5, 0.3); HAND_LANDMARKS];
        points[0] = Landmark::new(0.5, 0.5);
        LandmarkSet::new(points)
    }

    fn with_tips_at(ys: [f32; 5]) -> LandmarkSet {
        let mut hand = open_hand();
        for (i, &tip) in FINGER_TIPS.iter().enumerate() {
            hand.points[tip].y = ys[i];
        }
        hand
    }

    #[test]
    fn test_no_hand_is_empty() {
        assert!(map_keys(&KeyLayout::default(), None).is_empty());
    }

    #[test]
    fn test_open_hand_presses_nothing() {
        let hand = open_hand();
        assert!(map_keys(&KeyLayout::default(), Some(&hand)).is_empty());
    }

    #[test]
    fn test_tip_below_wrist_is_pressed() {
        let hand = with_tips_at([0.3, 0.7, 0.3, 0.9, 0.3]);
        let keys: Vec<Key> = map_keys(&KeyLayout::default(), Some(&hand)).iter().collect();
        assert_eq!(keys, vec![Key::D, Key::F]);
    }

    #[test]
    fn test_equal_height_is_not_pressed() {
        let hand = with_tips_at([0.5, 0.5, 0.5, 0.5, 0.5]);
        assert!(map_keys(&KeyLayout::default(), Some(&hand)).is_empty());

        let hand = with_tips_at([0.5, 0.5001, 0.5, 0.5, 0.5]);
        let keys: Vec<Key> = map_keys(&KeyLayout::default(), Some(&hand)).iter().collect();
        assert_eq!(keys, vec![Key::D]);
    }

    #[test]
    fn test_all_pressed_in_key_order() {
        let hand = with_tips_at([0.9, 0.8, 0.7, 0.6, 0.55]);
        let keys: Vec<Key> = map_keys(&KeyLayout::default(), Some(&hand)).iter().collect();
        assert_eq!(keys, Key::ALL.to_vec());
    }

    #[test]
    fn test_deterministic() {
        let hand = with_tips_at([0.9, 0.1, 0.7, 0.2, 0.8]);
        let layout = KeyLayout::default();
        let first = map_keys(&layout, Some(&hand));
        for _ in 0..10 {
            assert_eq!(map_keys(&layout, Some(&hand)), first);
        }
    }

    #[test]
    fn test_keys_are_independent() {
        // Moving one fingertip only ever changes its own key.
        let layout = KeyLayout::default();
        let base = with_tips_at([0.9, 0.1, 0.9, 0.1, 0.9]);
        let before = map_keys(&layout, Some(&base));
        let mut moved = base.clone();
        moved.points[FINGER_TIPS[1]].y = 0.9;
        let after = map_keys(&layout, Some(&moved));
        assert_eq!(after.difference(before).iter().collect::<Vec<_>>(), vec![Key::D]);
        assert!(before.difference(after).is_empty());
    }

    #[test]
    fn test_partial_landmark_set() {
        // Only wrist + thumb tip present.
        let mut points = vec![Landmark::new(0.5, 0.5); 5];
        points[4] = Landmark::new(0.5, 0.8);
        let hand = LandmarkSet::new(points);
        let keys: Vec<Key> = map_keys(&KeyLayout::default(), Some(&hand)).iter().collect();
        assert_eq!(keys, vec![Key::C]);

        assert!(map_keys(&KeyLayout::default(), Some(&LandmarkSet::default())).is_empty());
    }

    #[test]
    fn test_nan_is_never_pressed() {
        let hand = with_tips_at([f32::NAN, 0.9, 0.3, 0.3, 0.3]);
        let keys: Vec<Key> = map_keys(&KeyLayout::default(), Some(&hand)).iter().collect();
        assert_eq!(keys, vec![Key::D]);
    }
}
