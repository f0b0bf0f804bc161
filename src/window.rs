use std::collections::VecDeque;

/// Bounded recent-history buffer over scalar samples. Oldest samples are
/// evicted on overflow; the buffer never exceeds its capacity. Owned
/// exclusively by one session monitor, which provides the locking.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Ordered copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<f32> {
        self.samples.iter().copied().collect()
    }

    pub fn average(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }

    /// Fraction of samples strictly above `threshold`; 0.0 when empty.
    pub fn ratio_above(&self, threshold: f32) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let above = self.samples.iter().filter(|&&v| v > threshold).count();
        above as f32 / self.samples.len() as f32
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn push_evicts_oldest_at_capacity() {
        let mut window = RollingWindow::new(3);
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            window.push(value);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.snapshot(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut window = RollingWindow::new(10);
        for i in 0..1000 {
            window.push(i as f32);
        }
        assert_eq!(window.len(), 10);
        assert_eq!(window.snapshot().first(), Some(&990.0));
    }

    #[test]
    fn average_and_ratio() {
        let mut window = RollingWindow::new(10);
        for value in [0.9, 0.9, 0.1, 0.1] {
            window.push(value);
        }
        assert!((window.average() - 0.5).abs() < 1e-6);
        assert!((window.ratio_above(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_window_queries() {
        let window = RollingWindow::new(5);
        assert!(window.is_empty());
        assert_eq!(window.average(), 0.0);
        assert_eq!(window.ratio_above(0.5), 0.0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut window = RollingWindow::new(0);
        window.push(1.0);
        window.push(2.0);
        assert_eq!(window.snapshot(), vec![2.0]);
    }
}
