//! Collocation point generation.
//!
//! A [`DomainSampler`] turns a box [`Domain`] into point sets for the
//! interior, for each face, or for an arbitrary sub-domain in which some
//! coordinates are pinned (the sub-domain of a boundary condition).
//!
//! Axes that are pinned or degenerate contribute their single value; the
//! remaining (free) axes are sampled according to the [`SamplingStrategy`].

use log::debug;
use np_core::{Error, Point, Real, Result};
use np_math::SobolRsg;
use np_symbolic::{Domain, Face, Side};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Relative tolerance used to decide whether a grid reaches the upper bound.
const GRID_TOLERANCE: Real = 1e-9;

/// Largest number of points a grid may produce.
const MAX_GRID_POINTS: usize = 10_000_000;

// ── Strategy ──────────────────────────────────────────────────────────────────

/// How collocation points are chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SamplingStrategy {
    /// Deterministic Cartesian grid with step `dx`: a single value is
    /// broadcast to every axis, otherwise one value per domain axis.
    Grid {
        /// Step per axis.
        dx: Vec<Real>,
    },
    /// `points` independent uniform samples, redrawn on every call.
    Stochastic {
        /// Number of points.
        points: usize,
    },
    /// The first `points` points of a Sobol sequence.
    QuasiRandom {
        /// Number of points.
        points: usize,
    },
}

impl SamplingStrategy {
    /// A grid with the same step on every axis.
    pub fn grid(dx: Real) -> Self {
        Self::Grid { dx: vec![dx] }
    }

    /// A grid with one step per axis.
    pub fn grid_per_axis(dx: Vec<Real>) -> Self {
        Self::Grid { dx }
    }

    /// Uniform random sampling.
    pub fn stochastic(points: usize) -> Self {
        Self::Stochastic { points }
    }

    /// Sobol sampling.
    pub fn quasi_random(points: usize) -> Self {
        Self::QuasiRandom { points }
    }

    /// `true` if repeated calls produce different points.
    pub fn is_random(&self) -> bool {
        matches!(self, Self::Stochastic { .. })
    }

    fn step_for(&self, axis: usize, dimension: usize) -> Result<Real> {
        let Self::Grid { dx } = self else {
            return Err(Error::InvalidArgument("not a grid strategy".into()));
        };
        let step = match dx.len() {
            1 => dx[0],
            n if n == dimension => dx[axis],
            n => {
                return Err(Error::InvalidArgument(format!(
                    "grid step has {n} entries for a {dimension}-dimensional domain"
                )))
            }
        };
        if !(step > 0.0 && step.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "grid step must be positive and finite, got {step}"
            )));
        }
        Ok(step)
    }
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::grid(0.1)
    }
}

// ── Sampler ───────────────────────────────────────────────────────────────────

/// Generates collocation points over a domain.
#[derive(Debug, Clone, Copy)]
pub struct DomainSampler<'d> {
    domain: &'d Domain,
}

impl<'d> DomainSampler<'d> {
    /// A sampler for `domain`.
    pub fn new(domain: &'d Domain) -> Self {
        Self { domain }
    }

    /// Points covering the whole domain.
    pub fn sample<R: Rng + ?Sized>(&self, strategy: &SamplingStrategy, rng: &mut R) -> Result<Vec<Point>> {
        self.sample_subdomain(&[], strategy, rng)
    }

    /// Points on one face of the domain.
    pub fn sample_face<R: Rng + ?Sized>(
        &self,
        face: &Face,
        strategy: &SamplingStrategy,
        rng: &mut R,
    ) -> Result<Vec<Point>> {
        let axis = self.domain.index_of(&face.variable).ok_or_else(|| {
            Error::InvalidArgument(format!("'{}' is not a domain variable", face.variable))
        })?;
        let interval = self.domain.axes()[axis].interval;
        let value = match face.side {
            Side::Lower => interval.lower(),
            Side::Upper => interval.upper(),
        };
        self.sample_subdomain(&[(axis, value)], strategy, rng)
    }

    /// Points on every face, tagged with the face. Degenerate axes have no
    /// faces of their own.
    pub fn sample_faces<R: Rng + ?Sized>(
        &self,
        strategy: &SamplingStrategy,
        rng: &mut R,
    ) -> Result<Vec<(Face, Vec<Point>)>> {
        let mut out = Vec::new();
        for axis in self.domain.axes() {
            if axis.interval.is_degenerate() {
                continue;
            }
            for face in [Face::lower(axis.variable.clone()), Face::upper(axis.variable.clone())] {
                let points = self.sample_face(&face, strategy, rng)?;
                out.push((face, points));
            }
        }
        Ok(out)
    }

    /// Points of the sub-domain in which axis `i` is pinned to `v` for every
    /// `(i, v)` in `fixed`.
    pub fn sample_subdomain<R: Rng + ?Sized>(
        &self,
        fixed: &[(usize, Real)],
        strategy: &SamplingStrategy,
        rng: &mut R,
    ) -> Result<Vec<Point>> {
        let dimension = self.domain.dimension();
        let mut base: Point = Vec::with_capacity(dimension);
        let mut free = Vec::new();
        for (i, axis) in self.domain.axes().iter().enumerate() {
            if let Some(&(_, v)) = fixed.iter().find(|(a, _)| *a == i) {
                base.push(v);
            } else {
                base.push(axis.interval.lower());
                if !axis.interval.is_degenerate() {
                    free.push(i);
                }
            }
        }
        if let Some(&(a, _)) = fixed.iter().find(|(a, _)| *a >= dimension) {
            return Err(Error::InvalidArgument(format!(
                "axis {a} out of range for a {dimension}-dimensional domain"
            )));
        }

        let points = match strategy {
            SamplingStrategy::Grid { .. } => self.grid(&base, &free, strategy)?,
            SamplingStrategy::Stochastic { points } => {
                check_count(*points)?;
                if free.is_empty() {
                    vec![base]
                } else {
                    (0..*points)
                        .map(|_| {
                            let mut p = base.clone();
                            for &i in &free {
                                p[i] = self.domain.axes()[i].interval.map_unit(rng.gen::<Real>());
                            }
                            p
                        })
                        .collect()
                }
            }
            SamplingStrategy::QuasiRandom { points } => {
                check_count(*points)?;
                if free.is_empty() {
                    vec![base]
                } else {
                    let mut sobol = SobolRsg::new(free.len(), 0)?;
                    (0..*points)
                        .map(|_| {
                            let u = sobol.next_sequence();
                            let mut p = base.clone();
                            for (&i, &ui) in free.iter().zip(&u) {
                                p[i] = self.domain.axes()[i].interval.map_unit(ui);
                            }
                            p
                        })
                        .collect()
                }
            }
        };
        debug!(
            "sampled {} points ({} free axes, {} pinned)",
            points.len(),
            free.len(),
            fixed.len()
        );
        Ok(points)
    }

    fn grid(&self, base: &[Real], free: &[usize], strategy: &SamplingStrategy) -> Result<Vec<Point>> {
        let mut points = vec![base.to_vec()];
        for &i in free {
            let step = strategy.step_for(i, self.domain.dimension())?;
            let interval = self.domain.axes()[i].interval;
            let values = grid_axis(interval.lower(), interval.upper(), step)?;
            if points.len().saturating_mul(values.len()) > MAX_GRID_POINTS {
                return Err(Error::InvalidArgument(format!(
                    "grid would have more than {MAX_GRID_POINTS} points"
                )));
            }
            points = points
                .into_iter()
                .flat_map(|p| {
                    values.iter().map(move |&v| {
                        let mut q = p.clone();
                        q[i] = v;
                        q
                    })
                })
                .collect();
        }
        // Steps are validated even when every axis is pinned.
        if free.is_empty() {
            for i in 0..self.domain.dimension() {
                strategy.step_for(i, self.domain.dimension())?;
            }
        }
        Ok(points)
    }
}

fn check_count(points: usize) -> Result<()> {
    if points == 0 {
        return Err(Error::InvalidArgument(
            "sampling strategy must request at least one point".into(),
        ));
    }
    Ok(())
}

/// `lower + i·dx` for every `i` with `lower + i·dx ≤ upper` (within a
/// tolerance relative to the span), snapping the last value onto `upper`.
fn grid_axis(lower: Real, upper: Real, dx: Real) -> Result<Vec<Real>> {
    let span = upper - lower;
    let tolerance = GRID_TOLERANCE * span;
    let steps = ((span + tolerance) / dx).floor();
    if !(steps < MAX_GRID_POINTS as Real) {
        return Err(Error::InvalidArgument(format!(
            "step {dx} over a span of {span} gives more than {MAX_GRID_POINTS} grid points"
        )));
    }
    let count = steps as usize + 1;
    let mut values: Vec<Real> = (0..count).map(|i| lower + i as Real * dx).collect();
    if let Some(last) = values.last_mut() {
        if (*last - upper).abs() <= tolerance {
            *last = upper;
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use np_symbolic::DomainAxis;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn unit_interval() -> Domain {
        Domain::new(vec![DomainAxis::new("x", 0.0, 1.0).unwrap()]).unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0)
    }

    #[test]
    fn unit_grid_has_eleven_points() {
        let d = unit_interval();
        let pts = DomainSampler::new(&d).sample(&SamplingStrategy::grid(0.1), &mut rng()).unwrap();
        assert_eq!(pts.len(), 11);
        for (i, p) in pts.iter().enumerate() {
            assert!((p[0] - i as Real * 0.1).abs() < 1e-9, "point {i}: {}", p[0]);
        }
        assert_eq!(pts[10][0], 1.0);
    }

    #[test]
    fn boundary_of_unit_interval_has_two_points() {
        let d = unit_interval();
        let faces = DomainSampler::new(&d)
            .sample_faces(&SamplingStrategy::grid(0.1), &mut rng())
            .unwrap();
        let points: Vec<Point> = faces.into_iter().flat_map(|(_, p)| p).collect();
        assert_eq!(points, vec![vec![0.0], vec![1.0]]);
    }

    #[test]
    fn grid_on_a_rectangle() {
        let d = Domain::new(vec![
            DomainAxis::new("x", 0.0, 1.0).unwrap(),
            DomainAxis::new("t", 0.0, 2.0).unwrap(),
        ])
        .unwrap();
        let s = DomainSampler::new(&d);
        let pts = s.sample(&SamplingStrategy::grid_per_axis(vec![0.5, 1.0]), &mut rng()).unwrap();
        assert_eq!(pts.len(), 9);
        let edge = s
            .sample_face(&Face::lower("t"), &SamplingStrategy::grid(0.25), &mut rng())
            .unwrap();
        assert_eq!(edge.len(), 5);
        assert!(edge.iter().all(|p| p[1] == 0.0));
    }

    #[test]
    fn degenerate_axes() {
        let d = Domain::new(vec![
            DomainAxis::new("x", 0.0, 1.0).unwrap(),
            DomainAxis::new("y", 0.5, 0.5).unwrap(),
        ])
        .unwrap();
        let pts = DomainSampler::new(&d).sample(&SamplingStrategy::grid(0.5), &mut rng()).unwrap();
        assert_eq!(pts, vec![vec![0.0, 0.5], vec![0.5, 0.5], vec![1.0, 0.5]]);

        let point = Domain::new(vec![DomainAxis::new("x", 2.0, 2.0).unwrap()]).unwrap();
        for strategy in [
            SamplingStrategy::grid(0.1),
            SamplingStrategy::stochastic(10),
            SamplingStrategy::quasi_random(10),
        ] {
            let pts = DomainSampler::new(&point).sample(&strategy, &mut rng()).unwrap();
            assert_eq!(pts, vec![vec![2.0]]);
        }
    }

    #[test]
    fn invalid_strategies() {
        let d = unit_interval();
        let s = DomainSampler::new(&d);
        for bad in [
            SamplingStrategy::grid(0.0),
            SamplingStrategy::grid(-0.1),
            SamplingStrategy::grid(Real::NAN),
            SamplingStrategy::grid_per_axis(vec![0.1, 0.1]),
            SamplingStrategy::stochastic(0),
            SamplingStrategy::quasi_random(0),
        ] {
            assert!(
                matches!(s.sample(&bad, &mut rng()), Err(Error::InvalidArgument(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn stochastic_points_are_reseedable() {
        let d = unit_interval();
        let s = DomainSampler::new(&d);
        let a = s.sample(&SamplingStrategy::stochastic(20), &mut rng()).unwrap();
        let b = s.sample(&SamplingStrategy::stochastic(20), &mut rng()).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|p| (0.0..=1.0).contains(&p[0])));
    }

    #[test]
    fn quasi_random_is_deterministic() {
        let d = unit_interval();
        let s = DomainSampler::new(&d);
        let mut r1 = StdRng::seed_from_u64(1);
        let mut r2 = StdRng::seed_from_u64(2);
        let a = s.sample(&SamplingStrategy::quasi_random(8), &mut r1).unwrap();
        let b = s.sample(&SamplingStrategy::quasi_random(8), &mut r2).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0], vec![0.5]);
    }

    #[test]
    fn oversized_grids_are_rejected() {
        let line = unit_interval();
        let err = DomainSampler::new(&line)
            .sample(&SamplingStrategy::grid(1e-12), &mut rng())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{err:?}");

        // 10 001 points per axis is fine on its own, not as a square.
        let square = Domain::new(vec![
            DomainAxis::new("x", 0.0, 1.0).unwrap(),
            DomainAxis::new("y", 0.0, 1.0).unwrap(),
        ])
        .unwrap();
        let s = DomainSampler::new(&square);
        assert_eq!(s.sample_face(&Face::lower("x"), &SamplingStrategy::grid(1e-4), &mut rng()).unwrap().len(), 10_001);
        assert!(matches!(
            s.sample(&SamplingStrategy::grid(1e-4), &mut rng()),
            Err(Error::InvalidArgument(_))
        ));
    }

    proptest! {
        #[test]
        fn grid_hits_both_ends(lower in -10.0..10.0_f64, len in 0.1..10.0_f64, n in 1usize..200) {
            let upper = lower + len;
            let values = grid_axis(lower, upper, len / n as Real).unwrap();
            prop_assert_eq!(values.len(), n + 1);
            prop_assert_eq!(values[0], lower);
            prop_assert_eq!(values[n], upper);
        }

        #[test]
        fn grid_stays_inside(lower in -10.0..10.0_f64, len in 0.1..10.0_f64, dx in 0.01..5.0_f64) {
            let values = grid_axis(lower, lower + len, dx).unwrap();
            prop_assert!(!values.is_empty());
            prop_assert!(values.iter().all(|&v| v >= lower && v <= lower + len * (1.0 + 1e-9)));
        }
    }
}
