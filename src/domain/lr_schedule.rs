// ============================================================
// Layer 3 — Step Learning-Rate Schedule
// ============================================================
// lr(e) = base_lr · gamma^⌊e / step_size⌋
//
// `e` is the number of times `step()` has been called. The
// driver calls it once per epoch, right after the training
// pass, so epoch 1 trains at base_lr.

#[derive(Debug, Clone, Copy)]
pub struct StepLr {
    base_lr:   f64,
    step_size: usize,
    gamma:     f64,
    steps:     usize,
}

impl StepLr {
    /// A `step_size` of 0 is treated as 1.
    pub fn new(base_lr: f64, step_size: usize, gamma: f64) -> Self {
        Self { base_lr, step_size: step_size.max(1), gamma, steps: 0 }
    }

    /// Learning rate for the next training pass.
    pub fn current(&self) -> f64 {
        self.base_lr * self.gamma.powi((self.steps / self.step_size) as i32)
    }

    /// Advance by one epoch and return the new rate.
    pub fn step(&mut self) -> f64 {
        self.steps += 1;
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decays_every_step_size_epochs() {
        let mut sched = StepLr::new(1e-3, 2, 0.1);
        assert_eq!(sched.current(), 1e-3);
        assert_eq!(sched.step(), 1e-3);
        assert!((sched.step() - 1e-4).abs() < 1e-15);
        assert!((sched.step() - 1e-4).abs() < 1e-15);
        assert!((sched.step() - 1e-5).abs() < 1e-16);
    }

    #[test]
    fn test_zero_step_size_decays_every_epoch() {
        let mut sched = StepLr::new(1.0, 0, 0.5);
        assert_eq!(sched.step(), 0.5);
        assert_eq!(sched.step(), 0.25);
    }
}
