// ============================================================
// Layer 3 — Early Stopping State Machine
// ============================================================
// Tracks validation loss across epochs and decides whether the
// run continues, stops early, or is done.
//
//   Running ──val < best──▶ Improved   (save checkpoint)
//      │                       │
//      └──val >= best──▶ Stalled ──patience == max──▶ Stopped
//
//   epoch budget exhausted without Stopped ──▶ Done
//
// On Improved the patience counter is reset only when the drop
// exceeds `eps_loss`. A smaller drop still moves the best loss
// and the checkpoint, but leaves patience where it was.

/// The state the driver is in after observing an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    /// No validation loss observed yet.
    Running,
    /// Validation loss beat the previous best; the checkpoint must be saved.
    Improved,
    /// No improvement; patience was incremented.
    Stalled,
    /// Patience reached its maximum. Terminal.
    Stopped,
    /// Epoch budget exhausted. Terminal.
    Done,
}

impl TrainingPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Done)
    }
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    best_loss:    f64,
    best_epoch:   usize,
    patience:     usize,
    patience_max: usize,
    eps_loss:     f64,
    phase:        TrainingPhase,
}

impl EarlyStopping {
    pub fn new(patience_max: usize, eps_loss: f64) -> Self {
        Self {
            best_loss: f64::INFINITY,
            best_epoch: 0,
            patience: 0,
            patience_max,
            eps_loss,
            phase: TrainingPhase::Running,
        }
    }

    /// Feed the validation loss of `epoch` (1-based) and return the new phase.
    ///
    /// Observing after a terminal phase is a no-op that returns that phase.
    pub fn observe(&mut self, epoch: usize, val_loss: f64) -> TrainingPhase {
        if self.phase.is_terminal() {
            return self.phase;
        }

        self.phase = if val_loss < self.best_loss {
            if self.best_loss - val_loss > self.eps_loss {
                self.patience = 0;
            }
            self.best_loss  = val_loss;
            self.best_epoch = epoch;
            TrainingPhase::Improved
        } else {
            self.patience += 1;
            if self.patience >= self.patience_max {
                TrainingPhase::Stopped
            } else {
                TrainingPhase::Stalled
            }
        };

        tracing::debug!(
            "epoch {} val_loss={:.4} → {:?} (patience {}/{})",
            epoch, val_loss, self.phase, self.patience, self.patience_max,
        );
        self.phase
    }

    /// Mark the epoch budget as exhausted. Keeps `Stopped` if already stopped.
    pub fn finish(&mut self) -> TrainingPhase {
        if self.phase != TrainingPhase::Stopped {
            self.phase = TrainingPhase::Done;
        }
        self.phase
    }

    pub fn best_loss(&self) -> f64 { self.best_loss }

    pub fn best_epoch(&self) -> usize { self.best_epoch }

    pub fn patience(&self) -> usize { self.patience }

    pub fn patience_max(&self) -> usize { self.patience_max }

    pub fn phase(&self) -> TrainingPhase { self.phase }
}
