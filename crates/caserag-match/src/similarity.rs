//! Per-category similarity measures.

use caserag_core::types::Category;

/// Euclidean distance between two equal-length vectors.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            // Widen before subtracting; the f32 difference can overflow.
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Cosine similarity; 0.0 when either vector has zero magnitude.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0f64;
    let mut norm_a = 0f64;
    let mut norm_b = 0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// CODE similarity: `1 / (1 + L2)`, in (0, 1].
pub fn code_similarity(a: &[f32], b: &[f32]) -> f64 {
    1.0 / (1.0 + l2_distance(a, b))
}

/// TEXT similarity: cosine rescaled to [0, 1]. The cosine is clamped to
/// [-1, 1] first; rounding on near-parallel vectors can push it past 1.
pub fn text_similarity(a: &[f32], b: &[f32]) -> f64 {
    (cosine(a, b).clamp(-1.0, 1.0) + 1.0) / 2.0
}

/// The similarity measure of `category` applied to `a` and `b`.
pub fn score(category: Category, a: &[f32], b: &[f32]) -> f64 {
    match category {
        Category::Code => code_similarity(a, b),
        Category::Text => text_similarity(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_of_unit_step_is_one() {
        assert!((l2_distance(&[0.0], &[1.0]) - 1.0).abs() < 1e-9);
        assert!((l2_distance(&[3.0, 4.0], &[0.0, 0.0]) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn code_similarity_matches_reference_values() {
        // L2 distance 1.0 halves the score.
        assert!((code_similarity(&[0.0], &[1.0]) - 0.5).abs() < 1e-9);
        // Identical vectors score exactly 1.
        assert!((code_similarity(&[0.3, 0.7], &[0.3, 0.7]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn text_similarity_matches_reference_values() {
        // cos((1,0), (0.8,0.6)) = 0.8, rescaled to 0.9. The inputs are f32
        // so the tolerance is wider than for the exact cases below.
        assert!((text_similarity(&[1.0, 0.0], &[0.8, 0.6]) - 0.9).abs() < 1e-6);
        assert!((text_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!((text_similarity(&[1.0, 0.0], &[-1.0, 0.0]) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn zero_magnitude_text_vectors_land_mid_scale() {
        assert!((text_similarity(&[0.0, 0.0], &[1.0, 0.0]) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn extreme_magnitude_vectors_keep_a_finite_distance() {
        let d = l2_distance(&[f32::MAX], &[-f32::MAX]);
        assert!(d.is_finite(), "l2 distance {} for finite inputs", d);
        let code = code_similarity(&[f32::MAX], &[-f32::MAX]);
        assert!(code > 0.0 && code <= 1.0, "CODE score {} out of (0,1]", code);
    }

    #[test]
    fn scores_stay_in_their_documented_ranges() {
        let samples: Vec<Vec<f32>> = vec![
            vec![0.0, 0.0, 0.0],
            vec![1.0, -2.0, 3.0],
            vec![-0.5, 0.5, 0.25],
            vec![1000.0, 0.0, -1000.0],
            vec![f32::MAX, -f32::MAX, 0.0],
        ];
        for a in &samples {
            for b in &samples {
                let code = code_similarity(a, b);
                assert!(code > 0.0 && code <= 1.0, "CODE score {} out of (0,1]", code);
                let text = text_similarity(a, b);
                assert!((0.0..=1.0).contains(&text), "TEXT score {} out of [0,1]", text);
            }
        }
    }
}
