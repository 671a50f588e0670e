//! Aspect-ratio classification.

/// Canonical ratios, checked in order.
const CANONICAL_RATIOS: &[(&str, u32, u32)] = &[
    ("16:9", 16, 9),
    ("4:3", 4, 3),
    ("3:2", 3, 2),
    ("1:1", 1, 1),
    ("21:9", 21, 9),
    ("9:16", 9, 16),
    ("3:4", 3, 4),
    ("2:3", 2, 3),
    ("9:21", 9, 21),
];

/// Maximum absolute difference for a canonical match.
const CANONICAL_TOLERANCE: f64 = 0.05;

/// Reduced terms above which an unmatched ratio snaps to a coarse bucket.
const COARSE_BUCKET_MIN_TERM: u32 = 100;

pub fn gcd(a: u32, b: u32) -> u32 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Classify `width:height` into a display label such as `"16:9"`.
///
/// 1. Within 0.05 of a canonical ratio: that label.
/// 2. Otherwise, if both reduced terms exceed 100: a coarse bucket.
/// 3. Otherwise: the exact reduced fraction.
///
/// Returns `None` when either dimension is zero.
pub fn aspect_ratio_label(width: u32, height: u32) -> Option<String> {
    if width == 0 || height == 0 {
        return None;
    }
    let divisor = gcd(width, height);
    let (reduced_w, reduced_h) = (width / divisor, height / divisor);
    let ratio = width as f64 / height as f64;

    for (label, w, h) in CANONICAL_RATIOS {
        let canonical = *w as f64 / *h as f64;
        if (ratio - canonical).abs() <= CANONICAL_TOLERANCE {
            return Some((*label).to_string());
        }
    }

    if reduced_w > COARSE_BUCKET_MIN_TERM && reduced_h > COARSE_BUCKET_MIN_TERM {
        let bucket = if ratio >= 1.7 {
            "16:9"
        } else if ratio >= 1.3 {
            "4:3"
        } else if ratio >= 0.9 {
            "1:1"
        } else if ratio >= 0.7 {
            "3:4"
        } else {
            "9:16"
        };
        return Some(bucket.to_string());
    }

    Some(format!("{reduced_w}:{reduced_h}"))
}
