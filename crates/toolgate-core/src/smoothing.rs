//! Exponential moving average over a scalar signal.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ema {
    alpha: f64,
    value: f64,
}

impl Ema {
    /// `alpha` is clamped to `[0, 1]`; 1 tracks the last signal exactly, 0 never moves.
    pub fn new(alpha: f64, initial: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            value: initial,
        }
    }

    pub fn update(&mut self, signal: f64) -> f64 {
        self.value = self.value * (1.0 - self.alpha) + signal * self.alpha;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_moves_toward_signal() {
        let mut ema = Ema::new(0.5, 0.0);
        assert_eq!(ema.update(1.0), 0.5);
        assert_eq!(ema.update(1.0), 0.75);
        assert_eq!(ema.update(0.0), 0.375);
    }

    #[test]
    fn alpha_is_clamped() {
        assert_eq!(Ema::new(3.0, 0.0).alpha(), 1.0);
        assert_eq!(Ema::new(-1.0, 0.2).alpha(), 0.0);
    }
}
