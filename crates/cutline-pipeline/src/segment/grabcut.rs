//! Polygon-guided refinement with GrabCut.
//!
//! The user outlines the subject with a polygon. Pixels outside it are
//! certain background; pixels inside are probably foreground. Colour
//! mixture models for both classes and a contrast-sensitive smoothness
//! term are alternately re-estimated and minimised with a graph cut.
//!
//! Only the polygon's pixels become graph nodes. Background neighbours
//! are fixed, so their smoothness cost folds into the sink capacity.

use image::{DynamicImage, RgbImage};
use tracing::{debug, instrument};

use super::gmm::{Gmm, squared_distance};
use super::maxflow::FlowGraph;
use crate::contour::rasterize;
use crate::types::{Contour, Mask, PipelineError, PixelPoint};

/// Estimate / cut rounds.
pub const GRABCUT_ITERATIONS: usize = 5;

/// A refinement smaller than this fraction of the polygon is discarded in
/// favour of the polygon itself.
pub const MIN_REFINED_RATIO: f64 = 0.1;

/// Smoothness weight.
const GAMMA: f64 = 50.0;

/// Minimum background margin around the polygon, in pixels.
const MIN_MARGIN_PX: u32 = 10;

/// Background margin as a fraction of the polygon's larger side.
const MARGIN_RATIO: f64 = 0.1;

/// Forward half of the 8-neighbourhood; each pair is visited once.
const FORWARD: [(i64, i64); 4] = [(1, 0), (0, 1), (1, 1), (-1, 1)];

/// Fill a polygon into a `width` x `height` mask.
#[must_use]
pub fn polygon_mask(polygon: &[PixelPoint], width: u32, height: u32) -> Mask {
    rasterize(&Contour::new(polygon.to_vec()), width, height)
}

/// Refine a user-drawn polygon into a foreground mask.
///
/// Returns the GrabCut result if it covers at least
/// [`MIN_REFINED_RATIO`] of the polygon's area, otherwise the polygon's
/// own mask.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidPolygon`] for fewer than 3 points.
#[instrument(skip(source, polygon), fields(points = polygon.len()))]
pub fn refine_with_polygon(
    source: &DynamicImage,
    polygon: &[PixelPoint],
) -> Result<Mask, PipelineError> {
    if polygon.len() < 3 {
        return Err(PipelineError::InvalidPolygon(polygon.len()));
    }
    let (w, h) = (source.width(), source.height());
    let seed = polygon_mask(polygon, w, h);
    let seed_area = seed.foreground_count();
    let Some(region) = Region::around(&seed) else {
        return Ok(seed);
    };

    #[allow(clippy::cast_precision_loss)]
    let min_area = MIN_REFINED_RATIO * seed_area as f64;
    let rgb = source.to_rgb8();
    match grabcut(&rgb, &seed, region) {
        #[allow(clippy::cast_precision_loss)]
        Some(refined) if refined.foreground_count() as f64 >= min_area => {
            debug!(
                seed_area,
                refined_area = refined.foreground_count(),
                "polygon refined"
            );
            Ok(refined)
        }
        _ => {
            debug!(seed_area, "refinement too small, using polygon");
            Ok(seed)
        }
    }
}

/// Working rectangle: the seed's extent plus a background margin, clipped
/// to the image. `x1` and `y1` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl Region {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn around(seed: &Mask) -> Option<Self> {
        let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0, 0);
        for y in 0..seed.height() {
            for x in 0..seed.width() {
                if seed.is_foreground(x, y) {
                    x0 = x0.min(x);
                    y0 = y0.min(y);
                    x1 = x1.max(x + 1);
                    y1 = y1.max(y + 1);
                }
            }
        }
        if x1 == 0 {
            return None;
        }
        let side = f64::from((x1 - x0).max(y1 - y0));
        let margin = ((side * MARGIN_RATIO) as u32).max(MIN_MARGIN_PX);
        Some(Self {
            x0: x0.saturating_sub(margin),
            y0: y0.saturating_sub(margin),
            x1: (x1 + margin).min(seed.width()),
            y1: (y1 + margin).min(seed.height()),
        })
    }

    const fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    const fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

/// Run GrabCut inside `region`. `None` if there are no background samples
/// to learn from.
fn grabcut(rgb: &RgbImage, seed: &Mask, region: Region) -> Option<Mask> {
    let (rw, rh) = (region.width() as usize, region.height() as usize);
    let mut colors = Vec::with_capacity(rw * rh);
    let mut node_of = vec![usize::MAX; rw * rh];
    let mut pixel_of = Vec::new();
    for y in region.y0..region.y1 {
        for x in region.x0..region.x1 {
            let idx = colors.len();
            colors.push(rgb.get_pixel(x, y).0.map(f64::from));
            if seed.is_foreground(x, y) {
                node_of[idx] = pixel_of.len();
                pixel_of.push(idx);
            }
        }
    }
    let background: Vec<[f64; 3]> = colors
        .iter()
        .zip(&node_of)
        .filter(|&(_, &n)| n == usize::MAX)
        .map(|(c, _)| *c)
        .collect();
    if background.is_empty() || pixel_of.is_empty() {
        return None;
    }

    let neighbourhood = Neighbourhood::build(&colors, &node_of, pixel_of.len(), rw, rh);

    let unknown: Vec<[f64; 3]> = pixel_of.iter().map(|&i| colors[i]).collect();
    let mut fg_model = Gmm::fit(&unknown)?;
    let mut bg_model = Gmm::fit(&background)?;
    let mut labels = vec![true; pixel_of.len()];

    for iteration in 0..GRABCUT_ITERATIONS {
        let fg_samples: Vec<[f64; 3]> = unknown
            .iter()
            .zip(&labels)
            .filter(|&(_, &fg)| fg)
            .map(|(c, _)| *c)
            .collect();
        let bg_samples: Vec<[f64; 3]> = background
            .iter()
            .copied()
            .chain(unknown.iter().zip(&labels).filter(|&(_, &fg)| !fg).map(|(c, _)| *c))
            .collect();
        let fg_assign: Vec<usize> = fg_samples.iter().map(|c| fg_model.most_likely(*c)).collect();
        let bg_assign: Vec<usize> = bg_samples.iter().map(|c| bg_model.most_likely(*c)).collect();
        let Some(next_fg) = Gmm::learn(&fg_samples, &fg_assign) else {
            debug!(iteration, "foreground vanished");
            break;
        };
        fg_model = next_fg;
        bg_model = Gmm::learn(&bg_samples, &bg_assign)?;

        let mut graph = FlowGraph::new(pixel_of.len());
        for (node, c) in unknown.iter().enumerate() {
            graph.add_terminal(
                node,
                bg_model.cost(*c),
                fg_model.cost(*c) + neighbourhood.fixed_background[node],
            );
        }
        for &(p, q, weight) in &neighbourhood.links {
            graph.add_edge(p, q, weight, weight);
        }
        labels = graph.min_cut();
        debug!(
            iteration,
            foreground = labels.iter().filter(|&&fg| fg).count(),
            fg_components = fg_model.component_count(),
            bg_components = bg_model.component_count(),
            "grabcut iteration"
        );
    }

    Some(Mask::from_fn(seed.width(), seed.height(), |x, y| {
        if x < region.x0 || y < region.y0 || x >= region.x1 || y >= region.y1 {
            return false;
        }
        let node = node_of[(y - region.y0) as usize * rw + (x - region.x0) as usize];
        node != usize::MAX && labels[node]
    }))
}

/// Smoothness structure of the unknown pixels.
struct Neighbourhood {
    /// Links between two unknown pixels: `(node, node, weight)`.
    links: Vec<(usize, usize, f64)>,
    /// Per node, the summed weight of links to fixed background pixels.
    fixed_background: Vec<f64>,
}

impl Neighbourhood {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn build(colors: &[[f64; 3]], node_of: &[usize], nodes: usize, rw: usize, rh: usize) -> Self {
        let neighbour = |x: usize, y: usize, (dx, dy): (i64, i64)| -> Option<usize> {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            (nx >= 0 && ny >= 0 && (nx as usize) < rw && (ny as usize) < rh)
                .then(|| ny as usize * rw + nx as usize)
        };

        let mut sum = 0.0;
        let mut pairs = 0usize;
        for y in 0..rh {
            for x in 0..rw {
                for dir in FORWARD {
                    if let Some(q) = neighbour(x, y, dir) {
                        sum += squared_distance(colors[y * rw + x], colors[q]);
                        pairs += 1;
                    }
                }
            }
        }
        let beta = if sum > 0.0 {
            pairs as f64 / (2.0 * sum)
        } else {
            0.0
        };

        let mut links = Vec::new();
        let mut fixed_background = vec![0.0; nodes];
        for y in 0..rh {
            for x in 0..rw {
                let p = y * rw + x;
                for dir in FORWARD {
                    let Some(q) = neighbour(x, y, dir) else {
                        continue;
                    };
                    let distance = if dir.0 != 0 && dir.1 != 0 {
                        std::f64::consts::SQRT_2
                    } else {
                        1.0
                    };
                    let weight =
                        GAMMA / distance * (-beta * squared_distance(colors[p], colors[q])).exp();
                    match (node_of[p], node_of[q]) {
                        (usize::MAX, usize::MAX) => {}
                        (np, usize::MAX) => fixed_background[np] += weight,
                        (usize::MAX, nq) => fixed_background[nq] += weight,
                        (np, nq) => links.push((np, nq, weight)),
                    }
                }
            }
        }

        Self {
            links,
            fixed_background,
        }
    }
}
