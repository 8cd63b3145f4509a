//! Byte-based progress tracking.
//!
//! `ProgressReader` counts bytes as they are pulled from the input file and
//! reports the running total. `PercentTracker` turns that total into the
//! monotonic percentage stream handed to progress observers.

use std::io::Read;

/// A reader wrapper that tracks bytes read and calls a progress callback.
pub struct ProgressReader<R: Read> {
    reader: R,
    callback: Box<dyn FnMut(u64)>,
    bytes_read: u64,
}

impl<R: Read> ProgressReader<R> {
    /// The callback receives the total bytes read so far after each read.
    pub fn new<F>(reader: R, callback: F) -> Self
    where
        F: FnMut(u64) + 'static,
    {
        Self {
            reader,
            callback: Box::new(callback),
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.bytes_read += n as u64;
        (self.callback)(self.bytes_read);
        Ok(n)
    }
}

/// One progress notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub bytes: u64,
    pub total: u64,
    pub percent: f64,
}

/// Produces non-decreasing percentages in steps of at least one percent,
/// always ending with exactly 100.
#[derive(Debug, Clone)]
pub struct PercentTracker {
    total: u64,
    last: Option<f64>,
}

impl PercentTracker {
    pub fn new(total: u64) -> Self {
        Self { total, last: None }
    }

    pub fn percent_of(&self, bytes: u64) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (bytes as f64 * 100.0 / self.total as f64).min(100.0)
        }
    }

    /// New percentage worth reporting for `bytes`, if any.
    pub fn update(&mut self, bytes: u64) -> Option<f64> {
        let percent = self.percent_of(bytes);
        match self.last {
            Some(last) if percent < last + 1.0 && !(percent >= 100.0 && last < 100.0) => None,
            _ => {
                self.last = Some(percent);
                Some(percent)
            }
        }
    }

    /// Final 100% notification, unless it was already reported.
    pub fn complete(&mut self) -> Option<f64> {
        match self.last {
            Some(last) if last >= 100.0 => None,
            _ => {
                self.last = Some(100.0);
                Some(100.0)
            }
        }
    }
}

/// A [`PercentTracker`] bound to the observer it reports to.
pub struct ProgressReporter {
    tracker: PercentTracker,
    callback: Box<dyn FnMut(Progress)>,
}

impl ProgressReporter {
    pub fn new(total: u64, callback: Box<dyn FnMut(Progress)>) -> Self {
        Self {
            tracker: PercentTracker::new(total),
            callback,
        }
    }

    pub fn report(&mut self, bytes: u64) {
        if let Some(percent) = self.tracker.update(bytes) {
            (self.callback)(Progress {
                bytes,
                total: self.tracker.total,
                percent,
            });
        }
    }

    /// Called once the input is exhausted, even if the byte count fell short
    /// of the file size.
    pub fn complete(&mut self) {
        if let Some(percent) = self.tracker.complete() {
            let total = self.tracker.total;
            (self.callback)(Progress {
                bytes: total,
                total,
                percent,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_progress_reader_counts_bytes() {
        let seen = Rc::new(Cell::new(0));
        let sink = seen.clone();
        let mut reader = ProgressReader::new(&b"hello world"[..], move |n| sink.set(n));
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(seen.get(), 4);
        assert_eq!(reader.bytes_read(), 4);
    }

    #[test]
    fn test_percent_is_monotonic_and_ends_at_100() {
        let mut tracker = PercentTracker::new(1000);
        let mut reported = Vec::new();
        for bytes in [0, 5, 10, 15, 500, 400, 999, 1000] {
            if let Some(p) = tracker.update(bytes) {
                reported.push(p);
            }
        }
        assert_eq!(tracker.complete(), None);
        assert!(reported.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(reported, vec![0.0, 1.0, 50.0, 99.9, 100.0]);
    }

    #[test]
    fn test_reporter_completes_short_reads() {
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut reporter =
            ProgressReporter::new(200, Box::new(move |p: Progress| sink.borrow_mut().push(p.percent)));
        reporter.report(100);
        reporter.report(101);
        reporter.complete();
        reporter.complete();
        assert_eq!(*seen.borrow(), vec![50.0, 100.0]);
    }

    #[test]
    fn test_empty_input_completes() {
        let mut tracker = PercentTracker::new(0);
        assert_eq!(tracker.complete(), Some(100.0));
        assert_eq!(tracker.update(0), None);
    }
}
