//! Dominant color extraction via k-means clustering.
//!
//! The region is downscaled, near-white background pixels are masked out,
//! and the remaining pixels are clustered in RGB space. Each cluster is
//! reported as the average of its member pixels, most populous first.

use crate::types::Rgb;
use image::imageops::{self, FilterType};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

// --- Named constants ---
pub const DEFAULT_CLUSTERS: usize = 3;
const DEFAULT_MAX_SIDE: u32 = 80;
const DEFAULT_MAX_ITERATIONS: usize = 50;
const DEFAULT_SEED: u64 = 0x7ea5_1647;
/// Pixels with every channel at or above this value count as background.
const WHITE_MASK_FLOOR: u8 = 240;

#[derive(Error, Debug)]
pub enum QuantizeError {
    #[error("empty region ({width}x{height})")]
    EmptyRegion { width: u32, height: u32 },
    #[error("no pixels left after masking background")]
    AllMasked,
    #[error("cluster count must be at least 1")]
    NoClusters,
}

/// One dominant color of a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominantColor {
    pub color: Rgb,
    /// Fraction of the clustered pixels that fell into this color, in [0, 1].
    pub share: f32,
}

/// Extracts dominant colors from an image region.
pub trait ColorQuantizer {
    /// Return dominant colors ordered most prominent first.
    fn dominant_colors(&self, region: &RgbImage) -> Result<Vec<DominantColor>, QuantizeError>;
}

/// K-means quantizer with deterministic k-means++ seeding.
#[derive(Debug, Clone)]
pub struct KmeansQuantizer {
    clusters: usize,
    max_side: u32,
    max_iterations: usize,
    seed: u64,
}

impl Default for KmeansQuantizer {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTERS)
    }
}

impl KmeansQuantizer {
    pub fn new(clusters: usize) -> Self {
        Self {
            clusters,
            max_side: DEFAULT_MAX_SIDE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_side(mut self, max_side: u32) -> Self {
        self.max_side = max_side.max(1);
        self
    }

    /// Downscale so the longer side is at most `max_side`.
    fn downscale(&self, region: &RgbImage) -> Option<RgbImage> {
        let (w, h) = region.dimensions();
        let longest = w.max(h);
        if longest <= self.max_side {
            return None;
        }
        let scale = self.max_side as f32 / longest as f32;
        let new_w = ((w as f32 * scale).round() as u32).max(1);
        let new_h = ((h as f32 * scale).round() as u32).max(1);
        Some(imageops::resize(region, new_w, new_h, FilterType::Triangle))
    }
}

impl ColorQuantizer for KmeansQuantizer {
    fn dominant_colors(&self, region: &RgbImage) -> Result<Vec<DominantColor>, QuantizeError> {
        if self.clusters == 0 {
            return Err(QuantizeError::NoClusters);
        }
        let (width, height) = region.dimensions();
        if width == 0 || height == 0 {
            return Err(QuantizeError::EmptyRegion { width, height });
        }

        let scaled = self.downscale(region);
        let source = scaled.as_ref().unwrap_or(region);

        let pixels: Vec<[f32; 3]> = source
            .pixels()
            .filter(|p| !p.0.iter().all(|&c| c >= WHITE_MASK_FLOOR))
            .map(|p| [p.0[0] as f32, p.0[1] as f32, p.0[2] as f32])
            .collect();

        if pixels.is_empty() {
            return Err(QuantizeError::AllMasked);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centers = seed_centers(&pixels, self.clusters, &mut rng);
        let assignments = lloyd(&pixels, &mut centers, self.max_iterations);

        let (sums, counts) = accumulate(&pixels, &assignments, centers.len());

        let total = pixels.len() as f32;
        let mut colors: Vec<(usize, DominantColor)> = sums
            .iter()
            .zip(&counts)
            .filter(|(_, n)| **n > 0)
            .map(|(sum, &n)| {
                let mean = |c: usize| (sum[c] / n as f64).round().clamp(0.0, 255.0) as u8;
                (
                    n,
                    DominantColor {
                        color: Rgb::new(mean(0), mean(1), mean(2)),
                        share: n as f32 / total,
                    },
                )
            })
            .collect();

        // stable: ties keep seeding order
        colors.sort_by(|a, b| b.0.cmp(&a.0));

        tracing::trace!(
            width,
            height,
            clustered = pixels.len(),
            colors = colors.len(),
            "quantized region"
        );

        Ok(colors.into_iter().map(|(_, c)| c).collect())
    }
}

fn distance_sq(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn nearest(pixel: &[f32; 3], centers: &[[f32; 3]]) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (i, center) in centers.iter().enumerate() {
        let d = distance_sq(pixel, center);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Per-cluster channel sums and member counts.
fn accumulate(pixels: &[[f32; 3]], assignments: &[usize], k: usize) -> (Vec<[f64; 3]>, Vec<usize>) {
    let mut sums = vec![[0.0f64; 3]; k];
    let mut counts = vec![0usize; k];
    for (pixel, &cluster) in pixels.iter().zip(assignments) {
        for c in 0..3 {
            sums[cluster][c] += pixel[c] as f64;
        }
        counts[cluster] += 1;
    }
    (sums, counts)
}

/// k-means++ seeding. Returns fewer than `k` centers when the pixels have
/// fewer distinct colors than `k`.
fn seed_centers(pixels: &[[f32; 3]], k: usize, rng: &mut StdRng) -> Vec<[f32; 3]> {
    let mut centers = Vec::with_capacity(k);
    centers.push(pixels[rng.gen_range(0..pixels.len())]);

    while centers.len() < k {
        let weights: Vec<f32> = pixels.iter().map(|p| nearest(p, &centers).1).collect();
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            break;
        }

        let target = rng.gen::<f32>() * total;
        let mut acc = 0.0f32;
        let mut chosen = pixels.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            acc += w;
            if acc >= target && *w > 0.0 {
                chosen = i;
                break;
            }
        }
        if weights[chosen] <= 0.0 {
            break;
        }
        centers.push(pixels[chosen]);
    }

    centers
}

/// Lloyd iterations until assignments stop changing. Returns the final
/// assignment of every pixel; `centers` end up at the cluster means.
fn lloyd(pixels: &[[f32; 3]], centers: &mut [[f32; 3]], max_iterations: usize) -> Vec<usize> {
    let mut assignments = vec![usize::MAX; pixels.len()];

    for _ in 0..max_iterations.max(1) {
        let mut changed = false;
        for (pixel, slot) in pixels.iter().zip(assignments.iter_mut()) {
            let (cluster, _) = nearest(pixel, centers);
            if *slot != cluster {
                *slot = cluster;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let (sums, counts) = accumulate(pixels, &assignments, centers.len());
        for ((center, sum), &n) in centers.iter_mut().zip(&sums).zip(&counts) {
            if n > 0 {
                for c in 0..3 {
                    center[c] = (sum[c] / n as f64) as f32;
                }
            }
        }
    }

    assignments
}
