/// Counts whole seconds while running.
///
/// The count survives stop/start cycles and only resets with a new instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElapsedTimer {
    elapsed_seconds: u64,
    running: bool,
}

impl ElapsedTimer {
    /// Create a stopped timer at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting. Returns `false` if already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        true
    }

    /// Stop counting. Returns `false` if already stopped.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        true
    }

    /// Advance by one second if running; returns the new count
    pub fn tick(&mut self) -> Option<u64> {
        if !self.running {
            return None;
        }
        self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
        Some(self.elapsed_seconds)
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
