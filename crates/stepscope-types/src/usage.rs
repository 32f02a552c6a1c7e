use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Resource counters reported for one model request.
///
/// Sums are exact `u64` addition per field. Counters come straight from the
/// log, so a sum that would overflow saturates at `u64::MAX` instead of
/// panicking or wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_creation: u64,
}

impl TokenUsage {
    pub const ZERO: TokenUsage = TokenUsage {
        input: 0,
        output: 0,
        cache_read: 0,
        cache_creation: 0,
    };

    pub fn new(input: u64, output: u64, cache_read: u64, cache_creation: u64) -> Self {
        Self {
            input,
            output,
            cache_read,
            cache_creation,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Tokens that occupy the context window: fresh input plus both cache buckets.
    pub fn context_tokens(&self) -> u64 {
        self.input
            .saturating_add(self.cache_read)
            .saturating_add(self.cache_creation)
    }

    pub fn total(&self) -> u64 {
        self.context_tokens().saturating_add(self.output)
    }

    pub fn saturating_add(self, other: TokenUsage) -> TokenUsage {
        TokenUsage {
            input: self.input.saturating_add(other.input),
            output: self.output.saturating_add(other.output),
            cache_read: self.cache_read.saturating_add(other.cache_read),
            cache_creation: self.cache_creation.saturating_add(other.cache_creation),
        }
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, other: TokenUsage) -> TokenUsage {
        self.saturating_add(other)
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: TokenUsage) {
        *self = *self + other;
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = TokenUsage>>(iter: I) -> Self {
        iter.fold(TokenUsage::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a TokenUsage> for TokenUsage {
    fn sum<I: Iterator<Item = &'a TokenUsage>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_tokens_excludes_output() {
        let usage = TokenUsage::new(10, 99, 20, 30);
        assert_eq!(usage.context_tokens(), 60);
        assert_eq!(usage.total(), 159);
    }

    #[test]
    fn test_sum_is_per_field() {
        let parts = [
            TokenUsage::new(1, 2, 3, 4),
            TokenUsage::new(10, 20, 30, 40),
            TokenUsage::new(100, 200, 300, 400),
        ];
        let total: TokenUsage = parts.iter().sum();
        assert_eq!(total, TokenUsage::new(111, 222, 333, 444));
    }

    #[test]
    fn test_overflowing_sum_saturates() {
        let parts = [TokenUsage::new(u64::MAX, 1, 0, 0), TokenUsage::new(1, 1, 0, 0)];
        let total: TokenUsage = parts.iter().sum();
        assert_eq!(total, TokenUsage::new(u64::MAX, 2, 0, 0));

        let wide = TokenUsage::new(u64::MAX, u64::MAX, u64::MAX, 1);
        assert_eq!(wide.context_tokens(), u64::MAX);
        assert_eq!(wide.total(), u64::MAX);
    }

    #[test]
    fn test_default_is_zero() {
        assert!(TokenUsage::default().is_zero());
    }
}
