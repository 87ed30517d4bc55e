//! Timed repetition of a prepared launch.

use crate::error::HarnessError;
use kernelsuite_kernels::Launch;
use std::time::{Duration, Instant};

/// Source of elapsed time for one measured region.
pub trait Timer {
    fn start(&mut self);
    fn stop(&mut self) -> Duration;
}

/// [`Instant`]-backed timer.
#[derive(Debug, Default)]
pub struct MonotonicTimer {
    started: Option<Instant>,
}

impl Timer for MonotonicTimer {
    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn stop(&mut self) -> Duration {
        self.started
            .take()
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }
}

/// Run `launch` `reps` times inside one measured region. The region closes
/// after `synchronize`, so device and pool work is included.
///
/// `reps == 0` never starts the timer and returns zero. A zero reading for
/// any other count is a [`HarnessError::Clock`] failure.
pub fn run_timed<T: Timer + ?Sized>(
    launch: &mut dyn Launch,
    reps: usize,
    timer: &mut T,
) -> Result<Duration, HarnessError> {
    if reps == 0 {
        return Ok(Duration::ZERO);
    }
    timer.start();
    for _ in 0..reps {
        launch.run_rep()?;
    }
    launch.synchronize()?;
    let elapsed = timer.stop();
    if elapsed.is_zero() {
        return Err(HarnessError::Clock { reps });
    }
    Ok(elapsed)
}
