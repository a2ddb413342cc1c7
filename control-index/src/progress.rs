//! Progress reporting contract
//!
//! Fire-and-forget notifications threaded through a rebuild. The index never
//! reads anything back from a sink.

/// Receives `(current, total, message)` checkpoints
pub trait Progress {
    fn progress(&mut self, current: usize, total: usize, message: &str);
}

impl<F> Progress for F
where
    F: FnMut(usize, usize, &str),
{
    fn progress(&mut self, current: usize, total: usize, message: &str) {
        self(current, total, message)
    }
}

/// Sink that ignores every checkpoint
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn progress(&mut self, _current: usize, _total: usize, _message: &str) {}
}

/// Sink that forwards checkpoints to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn progress(&mut self, current: usize, total: usize, message: &str) {
        log::info!("[{:5.1}%] {}", percent(current, total), message);
    }
}

/// Completion percentage, 0 when total is 0
pub fn percent(current: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        current as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_sink() {
        let mut calls = Vec::new();
        {
            let mut sink = |c: usize, t: usize, m: &str| calls.push((c, t, m.to_string()));
            sink.progress(1, 2, "half");
        }
        assert_eq!(calls, vec![(1, 2, "half".to_string())]);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(50, 200), 25.0);
    }
}
