/// An ordered sequence of time-stamped snapshots, `t0 < t1 < ... < tn`.
///
/// Spec §3 (Motion Primitive): "Ordered sequence of >= 2 primitive snapshots
/// paired with times... sample-time is resolved by linear interpolation
/// between adjacent snapshots."
#[derive(Clone, Debug)]
pub struct Motion<T> {
    /// Parallel to `snapshots`; strictly increasing.
    times: Vec<f32>,
    snapshots: Vec<T>,
}

impl<T> Motion<T> {
    pub fn new(snapshots: Vec<(f32, T)>) -> Self {
        debug_assert!(snapshots.len() >= 2, "a Motion needs at least two snapshots");
        debug_assert!(
            snapshots.windows(2).all(|w| w[0].0 < w[1].0),
            "motion times must be strictly increasing"
        );
        let (times, snapshots) = snapshots.into_iter().unzip();
        Self { times, snapshots }
    }

    pub fn single(t: f32, value: T) -> StaticOrMotion<T> {
        StaticOrMotion::Static(t, value)
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }

    pub fn snapshots(&self) -> &[T] {
        &self.snapshots
    }

    pub fn first(&self) -> &T {
        &self.snapshots[0]
    }

    /// Find the bracketing pair of snapshots for `t` and the interpolation
    /// factor `alpha` between them, clamped to the motion's time range.
    pub fn bracket(&self, t: f32) -> (usize, usize, f32) {
        if t <= self.times[0] {
            return (0, 0, 0.0);
        }
        let last = self.times.len() - 1;
        if t >= self.times[last] {
            return (last, last, 0.0);
        }
        for i in 0..last {
            let (t0, t1) = (self.times[i], self.times[i + 1]);
            if t >= t0 && t <= t1 {
                let alpha = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
                return (i, i + 1, alpha);
            }
        }
        (last, last, 0.0)
    }
}

/// Either a single time-independent value or a genuinely time-varying one.
///
/// Most primitives in a scene are static; wrapping every one of them in a
/// two-element `Motion` would double allocation for the common case, so the
/// scheduler and gprim layer carry this enum instead (spec §9: motion
/// primitives "wrap a slice of variants with monotonic times rather than
/// templated inheritance" — the non-motion case is the zero-width slice).
#[derive(Clone, Debug)]
pub enum StaticOrMotion<T> {
    Static(f32, T),
    Moving(Motion<T>),
}

impl<T> StaticOrMotion<T> {
    pub fn is_moving(&self) -> bool {
        matches!(self, StaticOrMotion::Moving(_))
    }

    pub fn at_time0(&self) -> &T {
        match self {
            StaticOrMotion::Static(_, v) => v,
            StaticOrMotion::Moving(m) => m.first(),
        }
    }
}

/// Linearly interpolate a camera-space position between two motion
/// snapshots. Spec §4.4: "if MP.motion: positions := lerp(MP[t_i],
/// MP[t_{i+1}], alpha(s.time))".
pub fn lerp_time(a: vek::Vec3<f32>, b: vek::Vec3<f32>, alpha: f32) -> vek::Vec3<f32> {
    a + (b - a) * alpha
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_clamps_outside_range() {
        let m = Motion::new(vec![(0.0, 'a'), (1.0, 'b')]);
        assert_eq!(m.bracket(-1.0), (0, 0, 0.0));
        assert_eq!(m.bracket(2.0), (1, 1, 0.0));
    }

    #[test]
    fn bracket_interpolates_midpoint() {
        let m = Motion::new(vec![(0.0, 'a'), (1.0, 'b'), (2.0, 'c')]);
        let (i0, i1, alpha) = m.bracket(1.5);
        assert_eq!((i0, i1), (1, 2));
        assert!((alpha - 0.5).abs() < 1e-6);
    }

    #[test]
    fn lerp_time_midpoint() {
        let a = vek::Vec3::new(0.0, 0.0, 0.0);
        let b = vek::Vec3::new(2.0, 4.0, 6.0);
        let mid = lerp_time(a, b, 0.5);
        assert_eq!(mid, vek::Vec3::new(1.0, 2.0, 3.0));
    }
}
