//! Bounded readiness polling
//!
//! The only retry mechanism in the system: appliers that register a daemon
//! may need to wait for it to come up before the engine's verification probe
//! runs. Fixed attempt count, fixed interval, never unbounded.

use anyhow::Result;
use std::time::Duration;

/// Fixed-interval, fixed-attempt wait for a condition
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPoll {
    pub attempts: u32,
    pub interval: Duration,
}

impl ReadinessPoll {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Poll `check` until it returns true or attempts run out
    ///
    /// Returns `Ok(false)` when the condition never held; errors from the
    /// check propagate immediately. Sleeps between attempts, not after the
    /// last one.
    pub fn wait_for<F>(&self, mut check: F) -> Result<bool>
    where
        F: FnMut() -> Result<bool>,
    {
        for attempt in 0..self.attempts {
            if check()? {
                return Ok(true);
            }
            if attempt + 1 < self.attempts {
                std::thread::sleep(self.interval);
            }
        }
        Ok(false)
    }
}

impl Default for ReadinessPoll {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(attempts: u32) -> ReadinessPoll {
        ReadinessPoll::new(attempts, Duration::from_millis(0))
    }

    #[test]
    fn returns_true_when_condition_holds() {
        let mut calls = 0;
        let ready = quick(5)
            .wait_for(|| {
                calls += 1;
                Ok(calls >= 3)
            })
            .unwrap();
        assert!(ready);
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_after_attempts() {
        let mut calls = 0;
        let ready = quick(4)
            .wait_for(|| {
                calls += 1;
                Ok(false)
            })
            .unwrap();
        assert!(!ready);
        assert_eq!(calls, 4);
    }

    #[test]
    fn check_errors_propagate() {
        let result = quick(3).wait_for(|| anyhow::bail!("tool exploded"));
        assert!(result.is_err());
    }
}
