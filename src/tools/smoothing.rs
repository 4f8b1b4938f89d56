use std::collections::VecDeque;

use egui::Pos2;

/// Live smoothing of pointer samples: a moving average where newer samples weigh more
#[derive(Debug, Clone)]
pub(crate) struct RecencySmoother {
    window: VecDeque<Pos2>,
    size: usize,
}

impl RecencySmoother {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(size),
            size: size.max(1),
        }
    }

    /// Add a raw sample and return the smoothed position
    pub(crate) fn push(&mut self, sample: Pos2) -> Pos2 {
        if self.window.len() == self.size {
            self.window.pop_front();
        }
        self.window.push_back(sample);

        let mut total = 0.0;
        let mut x = 0.0;
        let mut y = 0.0;
        for (i, p) in self.window.iter().enumerate() {
            let weight = (i + 1) as f32;
            total += weight;
            x += p.x * weight;
            y += p.y * weight;
        }
        Pos2::new(x / total, y / total)
    }
}

/// Velocity (view pixels per millisecond) at which a stroke thins to half of its range
const VELOCITY_HALF_LIFE: f32 = 1.2;
/// Fastest strokes keep this fraction of the base width
const MIN_WIDTH_RATIO: f32 = 0.45;

/// Stroke width from pointer speed and pressure.
///
/// Faster strokes get thinner, saturating smoothly toward `MIN_WIDTH_RATIO` of `base`.
pub(crate) fn dynamic_width(base: f32, velocity: f32, pressure: f32, pressure_sensitive: bool) -> f32 {
    let velocity = if velocity.is_finite() { velocity.max(0.0) } else { 0.0 };
    let decay = (-velocity * std::f32::consts::LN_2 / VELOCITY_HALF_LIFE).exp();
    let speed_factor = MIN_WIDTH_RATIO + (1.0 - MIN_WIDTH_RATIO) * decay;
    let pressure_factor = if pressure_sensitive {
        0.4 + 0.6 * pressure.clamp(0.0, 1.0)
    } else {
        1.0
    };
    base * speed_factor * pressure_factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    #[test]
    fn test_recent_samples_weigh_more() {
        let mut smoother = RecencySmoother::new(3);
        smoother.push(pos2(0.0, 0.0));
        let p = smoother.push(pos2(3.0, 0.0));
        // (0*1 + 3*2) / 3
        assert_eq!(p, pos2(2.0, 0.0));
    }

    #[test]
    fn test_window_is_bounded() {
        let mut smoother = RecencySmoother::new(2);
        smoother.push(pos2(100.0, 0.0));
        smoother.push(pos2(0.0, 0.0));
        let p = smoother.push(pos2(0.0, 0.0));
        assert_eq!(p, pos2(0.0, 0.0));
    }

    #[test]
    fn test_width_saturates_with_speed() {
        let slow = dynamic_width(4.0, 0.0, 1.0, true);
        let fast = dynamic_width(4.0, 100.0, 1.0, true);
        assert_eq!(slow, 4.0);
        assert!((fast - 4.0 * MIN_WIDTH_RATIO).abs() < 1e-3);
        let half = dynamic_width(4.0, VELOCITY_HALF_LIFE, 1.0, false);
        assert!(half < slow && half > fast);
    }

    #[test]
    fn test_pressure_scales_width() {
        assert!(dynamic_width(4.0, 0.0, 0.2, true) < dynamic_width(4.0, 0.0, 0.9, true));
        assert_eq!(dynamic_width(4.0, 0.0, 0.2, false), 4.0);
    }
}
