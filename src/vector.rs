use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Euclidean,
    Cosine,
}

impl Metric {
    /// Calculate distance. LOWER is ALWAYS closer/better.
    /// Euclidean returns the SQUARED distance to avoid sqrt().
    #[inline(always)]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Euclidean => {
                let mut sum = 0.0;
                let remainder_start = a.len() - a.len() % 8;

                // Unroll 8 so LLVM can fill a 256-bit lane
                for (ac, bc) in a.chunks_exact(8).zip(b.chunks_exact(8)) {
                    let mut lane = 0.0;
                    for i in 0..8 {
                        let d = ac[i] - bc[i];
                        lane += d * d;
                    }
                    sum += lane;
                }
                for i in remainder_start..a.len().min(b.len()) {
                    let d = a[i] - b[i];
                    sum += d * d;
                }
                sum
            }
            Metric::Cosine => {
                let mut dot = 0.0;
                let mut norm_a = 0.0;
                let mut norm_b = 0.0;
                let remainder_start = a.len() - a.len() % 8;

                for (ac, bc) in a.chunks_exact(8).zip(b.chunks_exact(8)) {
                    for i in 0..8 {
                        dot += ac[i] * bc[i];
                        norm_a += ac[i] * ac[i];
                        norm_b += bc[i] * bc[i];
                    }
                }
                for i in remainder_start..a.len().min(b.len()) {
                    dot += a[i] * b[i];
                    norm_a += a[i] * a[i];
                    norm_b += b[i] * b[i];
                }

                if norm_a == 0.0 || norm_b == 0.0 { return 1.0; }
                1.0 - (dot / (norm_a.sqrt() * norm_b.sqrt()))
            }
        }
    }

    /// Score as reported by the store. HIGHER is closer.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => 1.0 - self.distance(a, b),
            Metric::Euclidean => -self.distance(a, b).sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_scores_one() {
        let v: Vec<f32> = (0..19).map(|i| i as f32 * 0.1 + 0.05).collect();
        let score = Metric::Cosine.score(&v, &v);
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_scores_zero() {
        let a = [1.0, 0.0, 0.0];
        let b = [0.0, 1.0, 0.0];
        assert!(Metric::Cosine.score(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_is_maximally_distant() {
        assert_eq!(Metric::Cosine.distance(&[0.0; 4], &[1.0; 4]), 1.0);
    }

    #[test]
    fn euclidean_is_squared_and_handles_remainder() {
        let a = vec![0.0; 10];
        let mut b = vec![0.0; 10];
        b[9] = 3.0;
        b[0] = 4.0;
        assert_eq!(Metric::Euclidean.distance(&a, &b), 25.0);
        assert_eq!(Metric::Euclidean.score(&a, &b), -5.0);
    }
}
