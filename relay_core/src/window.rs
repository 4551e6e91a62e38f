//! Fixed-capacity FIFO of recent error samples.
//!
//! The window starts empty and grows to `capacity`; after that every push
//! evicts the oldest sample. Contents are always exposed oldest-to-newest as
//! one contiguous slice so the weight estimator can read them without copying.

/// Sliding window over the last `capacity` errors.
#[derive(Debug, Clone)]
pub struct ErrorWindow {
    // Live samples are `buf[start..]`. The backing vector is compacted once
    // `start` reaches `capacity`, which keeps pushes amortized O(1).
    buf: Vec<f64>,
    start: usize,
    capacity: usize,
}

impl ErrorWindow {
    /// Create an empty window. A capacity of 0 is treated as 1.
    ///
    /// Nothing is allocated up front; the buffer grows as samples arrive.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::new(),
            start: 0,
            capacity,
        }
    }

    /// Append `value`, evicting the oldest sample when full, and return the
    /// current contents.
    pub fn push(&mut self, value: f64) -> &[f64] {
        self.buf.push(value);
        if self.buf.len() - self.start > self.capacity {
            self.start += 1;
        }
        if self.start >= self.capacity {
            self.buf.drain(..self.start);
            self.start = 0;
        }
        self.as_slice()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.buf[self.start..]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Arithmetic mean of the contents; 0 for an empty window.
    pub fn mean(&self) -> f64 {
        crate::util::mean(self.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_then_slides() {
        let mut w = ErrorWindow::new(3);
        assert!(w.is_empty());
        assert_eq!(w.push(1.0), &[1.0]);
        assert_eq!(w.push(2.0), &[1.0, 2.0]);
        assert_eq!(w.push(3.0), &[1.0, 2.0, 3.0]);
        assert_eq!(w.push(4.0), &[2.0, 3.0, 4.0]);
        assert_eq!(w.push(5.0), &[3.0, 4.0, 5.0]);
        assert_eq!(w.push(6.0), &[4.0, 5.0, 6.0]);
        assert_eq!(w.push(7.0), &[5.0, 6.0, 7.0]);
        assert_eq!(w.len(), 3);
    }

    #[test]
    fn mean_of_contents() {
        let mut w = ErrorWindow::new(2);
        assert_eq!(w.mean(), 0.0);
        w.push(10.0);
        w.push(0.0);
        w.push(4.0);
        assert_eq!(w.mean(), 2.0);
    }

    #[test]
    fn huge_capacity_allocates_lazily() {
        let mut w = ErrorWindow::new(1usize << 40);
        assert_eq!(w.capacity(), 1usize << 40);
        assert_eq!(w.push(1.5), &[1.5]);
        assert_eq!(w.push(2.5), &[1.5, 2.5]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut w = ErrorWindow::new(0);
        w.push(1.0);
        assert_eq!(w.push(2.0), &[2.0]);
        assert_eq!(w.capacity(), 1);
    }
}
