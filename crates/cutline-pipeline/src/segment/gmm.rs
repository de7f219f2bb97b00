//! Full-covariance Gaussian mixture colour models.

/// Components per mixture.
pub const COMPONENTS: usize = 5;

/// Variance added to each diagonal entry of a near-singular covariance.
const REGULARIZATION: f64 = 0.01;

/// Determinants at or below this are treated as singular.
const SINGULAR_DET: f64 = 1e-9;

/// Lloyd iterations of the k-means initialisation.
const KMEANS_ITERATIONS: usize = 10;

/// Densities are floored here so the data term stays finite.
const MIN_DENSITY: f64 = 1e-300;

type Color = [f64; 3];
type Matrix = [[f64; 3]; 3];

#[derive(Debug, Clone, Copy, PartialEq)]
struct Component {
    weight: f64,
    mean: Color,
    inverse: Matrix,
    /// `1 / sqrt((2π)³ · det Σ)`.
    norm: f64,
}

impl Component {
    fn density(&self, c: Color) -> f64 {
        let d = [c[0] - self.mean[0], c[1] - self.mean[1], c[2] - self.mean[2]];
        let mut mahalanobis = 0.0;
        for (i, row) in self.inverse.iter().enumerate() {
            let r = row[0].mul_add(d[0], row[1].mul_add(d[1], row[2] * d[2]));
            mahalanobis += d[i] * r;
        }
        self.norm * (-0.5 * mahalanobis).exp()
    }
}

/// A Gaussian mixture over RGB colours.
#[derive(Debug, Clone, PartialEq)]
pub struct Gmm {
    components: Vec<Component>,
}

impl Gmm {
    /// Initialise from `samples` with deterministic k-means, or `None` if
    /// there are no samples.
    pub fn fit(samples: &[Color]) -> Option<Self> {
        let labels = kmeans_labels(samples)?;
        Self::learn(samples, &labels)
    }

    /// Maximum-likelihood mixture for samples already assigned to
    /// components, or `None` if there are no samples.
    #[allow(clippy::cast_precision_loss)]
    pub fn learn(samples: &[Color], labels: &[usize]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut count = [0usize; COMPONENTS];
        let mut sum = [[0.0f64; 3]; COMPONENTS];
        let mut prod = [[[0.0f64; 3]; 3]; COMPONENTS];
        for (c, &k) in samples.iter().zip(labels) {
            let k = k.min(COMPONENTS - 1);
            count[k] += 1;
            for i in 0..3 {
                sum[k][i] += c[i];
                for j in 0..3 {
                    prod[k][i][j] += c[i] * c[j];
                }
            }
        }

        let total = samples.len() as f64;
        let components = (0..COMPONENTS)
            .filter(|&k| count[k] > 0)
            .map(|k| {
                let n = count[k] as f64;
                let mean = sum[k].map(|s| s / n);
                let mut cov = [[0.0; 3]; 3];
                for i in 0..3 {
                    for j in 0..3 {
                        cov[i][j] = prod[k][i][j] / n - mean[i] * mean[j];
                    }
                }
                let mut det = determinant(&cov);
                if det <= SINGULAR_DET {
                    for (i, row) in cov.iter_mut().enumerate() {
                        row[i] += REGULARIZATION;
                    }
                    det = determinant(&cov);
                }
                // A regularized covariance stays positive definite.
                let det = det.max(SINGULAR_DET);
                Component {
                    weight: n / total,
                    mean,
                    inverse: inverse(&cov, det),
                    norm: 1.0 / ((2.0 * std::f64::consts::PI).powi(3) * det).sqrt(),
                }
            })
            .collect();
        Some(Self { components })
    }

    /// Mixture density at `c`, floored to stay positive.
    pub fn density(&self, c: Color) -> f64 {
        self.components
            .iter()
            .map(|k| k.weight * k.density(c))
            .sum::<f64>()
            .max(MIN_DENSITY)
    }

    /// Negative log-likelihood of `c`.
    pub fn cost(&self, c: Color) -> f64 {
        -self.density(c).ln()
    }

    /// Index of the component most likely to have produced `c`.
    pub fn most_likely(&self, c: Color) -> usize {
        self.components
            .iter()
            .enumerate()
            .map(|(i, k)| (i, k.weight * k.density(c)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(0, |(i, _)| i)
    }

    /// Number of non-empty components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

/// k-means cluster labels with centers seeded at brightness quantiles.
fn kmeans_labels(samples: &[Color]) -> Option<Vec<usize>> {
    if samples.is_empty() {
        return None;
    }
    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.sort_by(|&a, &b| brightness(samples[a]).total_cmp(&brightness(samples[b])));
    let mut centers: Vec<Color> = (0..COMPONENTS)
        .map(|k| samples[order[k * (samples.len() - 1) / (COMPONENTS - 1)]])
        .collect();

    let mut labels = vec![0usize; samples.len()];
    for _ in 0..KMEANS_ITERATIONS {
        for (label, c) in labels.iter_mut().zip(samples) {
            *label = nearest(&centers, *c);
        }
        let mut sum = [[0.0f64; 3]; COMPONENTS];
        let mut count = [0usize; COMPONENTS];
        for (c, &k) in samples.iter().zip(&labels) {
            count[k] += 1;
            for i in 0..3 {
                sum[k][i] += c[i];
            }
        }
        for k in 0..COMPONENTS {
            if count[k] > 0 {
                #[allow(clippy::cast_precision_loss)]
                let n = count[k] as f64;
                centers[k] = sum[k].map(|s| s / n);
            }
        }
    }
    Some(labels)
}

fn nearest(centers: &[Color], c: Color) -> usize {
    centers
        .iter()
        .enumerate()
        .map(|(i, m)| (i, squared_distance(*m, c)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(i, _)| i)
}

/// Squared Euclidean distance between two colours.
pub fn squared_distance(a: Color, b: Color) -> f64 {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    d[0].mul_add(d[0], d[1].mul_add(d[1], d[2] * d[2]))
}

fn brightness(c: Color) -> f64 {
    c[0] + c[1] + c[2]
}

fn determinant(m: &Matrix) -> f64 {
    m[0][0].mul_add(
        m[1][1].mul_add(m[2][2], -(m[1][2] * m[2][1])),
        (-m[0][1]).mul_add(
            m[1][0].mul_add(m[2][2], -(m[1][2] * m[2][0])),
            m[0][2] * m[1][0].mul_add(m[2][1], -(m[1][1] * m[2][0])),
        ),
    )
}

fn inverse(m: &Matrix, det: f64) -> Matrix {
    let cofactor = |r0: usize, r1: usize, c0: usize, c1: usize| {
        m[r0][c0].mul_add(m[r1][c1], -(m[r0][c1] * m[r1][c0]))
    };
    [
        [
            cofactor(1, 2, 1, 2) / det,
            -cofactor(0, 2, 1, 2) / det,
            cofactor(0, 1, 1, 2) / det,
        ],
        [
            -cofactor(1, 2, 0, 2) / det,
            cofactor(0, 2, 0, 2) / det,
            -cofactor(0, 1, 0, 2) / det,
        ],
        [
            cofactor(1, 2, 0, 1) / det,
            -cofactor(0, 2, 0, 1) / det,
            cofactor(0, 1, 0, 1) / det,
        ],
    ]
}
