use std::time::Duration;

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Fixed-delay retry: up to `max_attempts` tries with the same pause between
/// each. There is no backoff growth.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    sleep: fn(Duration),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(DEFAULT_ATTEMPTS, DEFAULT_DELAY)
    }
}

impl RetryPolicy {
    /// `max_attempts` below 1 is treated as 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            delay,
            sleep: std::thread::sleep,
        }
    }

    /// Same attempt budget, no waiting.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy::new(max_attempts, Duration::ZERO).with_sleep(|_| {})
    }

    #[cfg(test)]
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[cfg(test)]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it succeeds or the budget is spent. `on_retry` sees the
    /// 1-based number of the failed attempt and its error before each pause.
    /// The error of the final attempt is returned as is.
    pub fn run<T, E, F, R>(&self, mut op: F, mut on_retry: R) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        R: FnMut(u32, &E),
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    on_retry(attempt, &e);
                    (self.sleep)(self.delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts(), 3);
        assert_eq!(p.delay(), Duration::from_secs(5));
    }

    #[test]
    fn gives_up_after_budget() {
        let calls = Cell::new(0);
        let mut retries = Vec::new();
        let result: Result<(), String> = RetryPolicy::immediate(3).run(
            || {
                calls.set(calls.get() + 1);
                Err(format!("boom {}", calls.get()))
            },
            |n, e| retries.push((n, e.clone())),
        );
        assert_eq!(calls.get(), 3);
        assert_eq!(result.unwrap_err(), "boom 3");
        assert_eq!(
            retries,
            vec![(1, "boom 1".to_string()), (2, "boom 2".to_string())]
        );
    }

    #[test]
    fn stops_on_first_success() {
        let calls = Cell::new(0);
        let result: Result<u32, &str> = RetryPolicy::immediate(3).run(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 2 {
                    Err("flaky")
                } else {
                    Ok(calls.get())
                }
            },
            |_, _| {},
        );
        assert_eq!(result, Ok(2));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let calls = Cell::new(0);
        let _: Result<(), ()> = RetryPolicy::immediate(0).run(
            || {
                calls.set(calls.get() + 1);
                Err(())
            },
            |_, _| {},
        );
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn sleeps_between_attempts_only() {
        thread_local!(static SLEPT: Cell<u32> = const { Cell::new(0) });
        fn count(_: Duration) {
            SLEPT.with(|s| s.set(s.get() + 1));
        }

        let policy = RetryPolicy::new(3, Duration::from_secs(5)).with_sleep(count);
        let _: Result<(), ()> = policy.run(|| Err(()), |_, _| {});
        assert_eq!(SLEPT.with(|s| s.get()), 2);
    }
}
