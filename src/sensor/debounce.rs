/// Consecutive-sample debouncer for one binary signal.
///
/// A raw value different from the accepted one must be seen on `threshold`
/// consecutive samples before it replaces the accepted value. The first
/// sample ever seen is accepted immediately since there is nothing to retain.
#[derive(Debug, Clone)]
pub struct Debouncer {
    threshold: u32,
    accepted: Option<bool>,
    candidate: bool,
    streak: u32,
}

impl Debouncer {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            accepted: None,
            candidate: false,
            streak: 0,
        }
    }

    pub fn accepted(&self) -> Option<bool> {
        self.accepted
    }

    /// Feed one raw sample; returns the new accepted value when it changed
    pub fn sample(&mut self, raw: bool) -> Option<bool> {
        let Some(accepted) = self.accepted else {
            self.accepted = Some(raw);
            return Some(raw);
        };

        if raw == accepted {
            self.streak = 0;
            return None;
        }

        if self.streak > 0 && raw == self.candidate {
            self.streak += 1;
        } else {
            self.candidate = raw;
            self.streak = 1;
        }

        if self.streak >= self.threshold {
            self.accepted = Some(raw);
            self.streak = 0;
            Some(raw)
        } else {
            None
        }
    }
}
