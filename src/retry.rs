/// Retransmission budget for the one outstanding packet.
///
/// Consumed on every timeout (or unusable reply) and refilled whenever the
/// transfer makes progress.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Retry {
    max: u8,
    remaining: u8,
}

impl Retry {
    pub fn new(max: u8) -> Self {
        Self {
            max,
            remaining: max,
        }
    }

    pub fn reset(&mut self) {
        self.remaining = self.max;
    }

    /// Takes one retry, returning `false` once the budget is spent.
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn attempt(&self) -> u8 {
        self.max - self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_runs_out() {
        let mut retry = Retry::new(3);
        assert!(retry.consume());
        assert!(retry.consume());
        assert!(retry.consume());
        assert_eq!(retry.attempt(), 3);
        assert!(!retry.consume());
        assert!(!retry.consume());
    }

    #[test]
    fn reset_refills() {
        let mut retry = Retry::new(2);
        assert!(retry.consume());
        assert!(retry.consume());
        retry.reset();
        assert_eq!(retry.attempt(), 0);
        assert!(retry.consume());
    }

    #[test]
    fn zero_retries() {
        let mut retry = Retry::new(0);
        assert!(!retry.consume());
    }
}
