//! Warm-up gate: records are withheld until enough bars have been processed
//! for every exported column to be defined.

/// Warmup state tracker
#[derive(Debug, Clone)]
pub struct WarmupState {
    warmup_bars: usize,
    bars_processed: usize,
}

impl WarmupState {
    pub fn new(warmup_bars: usize) -> Self {
        Self {
            warmup_bars,
            bars_processed: 0,
        }
    }

    /// Use the configured override when present, otherwise the feature
    /// set's own requirement.
    pub fn resolve(configured: Option<usize>, required: usize) -> Self {
        Self::new(configured.unwrap_or(required))
    }

    pub fn process_bar(&mut self) {
        self.bars_processed += 1;
    }

    pub fn is_warm(&self) -> bool {
        self.bars_processed >= self.warmup_bars
    }

    pub fn bars_until_warm(&self) -> usize {
        self.warmup_bars.saturating_sub(self.bars_processed)
    }

    pub fn warmup_bars(&self) -> usize {
        self.warmup_bars
    }

    pub fn bars_processed(&self) -> usize {
        self.bars_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_state() {
        let mut warmup = WarmupState::new(20);
        assert!(!warmup.is_warm());
        assert_eq!(warmup.bars_until_warm(), 20);

        for _ in 0..19 {
            warmup.process_bar();
        }
        assert!(!warmup.is_warm());
        assert_eq!(warmup.bars_until_warm(), 1);

        warmup.process_bar();
        assert!(warmup.is_warm());
        assert_eq!(warmup.bars_until_warm(), 0);
        assert_eq!(warmup.bars_processed(), 20);
    }

    #[test]
    fn test_zero_warmup() {
        let warmup = WarmupState::new(0);
        assert!(warmup.is_warm());
        assert_eq!(warmup.bars_until_warm(), 0);
    }

    #[test]
    fn override_wins_over_requirement() {
        assert_eq!(WarmupState::resolve(Some(5), 251).warmup_bars(), 5);
        assert_eq!(WarmupState::resolve(None, 251).warmup_bars(), 251);
    }
}
