//! Fixed-capacity latency sample ring.

/// Ring buffer of latency samples in seconds.
///
/// Holds at most `capacity` samples, overwriting the oldest once full, and
/// separately counts every sample ever pushed. Memory is bounded by the
/// capacity no matter how many samples arrive.
#[derive(Debug, Clone)]
pub struct LatencyRing {
    samples: Vec<f64>,
    capacity: usize,
    /// Index the next overwrite lands on once the ring is full.
    next: usize,
    total: u64,
}

impl LatencyRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            next: 0,
            total: 0,
        }
    }

    pub fn push(&mut self, seconds: f64) {
        self.total += 1;
        if self.samples.len() < self.capacity {
            self.samples.push(seconds);
        } else {
            self.samples[self.next] = seconds;
            self.next = (self.next + 1) % self.capacity;
        }
    }

    /// Samples ever observed, including ones the ring has since dropped.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Samples currently retained.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean over the retained window, 0.0 when empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Maximum over the retained window, 0.0 when empty.
    pub fn max(&self) -> f64 {
        self.samples.iter().copied().fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_up_to_capacity() {
        let mut ring = LatencyRing::new(4);
        for i in 0..3 {
            ring.push(i as f64);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.total(), 3);
    }

    #[test]
    fn test_overwrites_oldest_when_full() {
        let mut ring = LatencyRing::new(3);
        for i in 1..=5 {
            ring.push(i as f64);
        }
        // Window holds the newest three samples: 3, 4, 5.
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.total(), 5);
        assert_eq!(ring.max(), 5.0);
        assert!((ring.average() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_keeps_counting_past_capacity() {
        let mut ring = LatencyRing::new(8);
        for _ in 0..1000 {
            ring.push(0.25);
        }
        assert_eq!(ring.len(), 8);
        assert_eq!(ring.total(), 1000);
    }

    #[test]
    fn test_empty_ring_reports_zeroes() {
        let ring = LatencyRing::new(4);
        assert!(ring.is_empty());
        assert_eq!(ring.average(), 0.0);
        assert_eq!(ring.max(), 0.0);
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let mut ring = LatencyRing::new(0);
        ring.push(1.0);
        ring.push(2.0);
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.total(), 2);
        assert_eq!(ring.max(), 2.0);
    }
}
