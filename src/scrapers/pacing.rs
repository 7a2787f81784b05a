use rand::Rng;
use std::thread;
use std::time::Duration;
use tracing::debug;

use super::traits::Pacer;
use super::types::DelayRange;

/// Sleeps for a uniformly random time within the requested range
pub struct RandomPacer {
    default: DelayRange,
}

impl RandomPacer {
    pub fn new(default: DelayRange) -> Self {
        Self { default }
    }
}

impl Pacer for RandomPacer {
    fn pause(&self, range: DelayRange) {
        let secs = if range.max > range.min {
            rand::thread_rng().gen_range(range.min..=range.max)
        } else {
            range.min
        };
        debug!("Pausing {:.2}s", secs);
        thread::sleep(Duration::from_secs_f64(secs));
    }

    fn pause_default(&self) {
        self.pause(self.default);
    }
}

/// Never sleeps
#[cfg(test)]
pub struct NoPause;

#[cfg(test)]
impl Pacer for NoPause {
    fn pause(&self, _range: DelayRange) {}

    fn pause_default(&self) {}
}
