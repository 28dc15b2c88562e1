use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use loyalty_types::RedemptionCode;

use crate::clock::{Clock, SystemClock};

/// Produces candidate redemption codes. The engine collision-checks each
/// candidate against the store and asks again on a hit, so implementations
/// only need sufficient entropy, not guaranteed uniqueness.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> RedemptionCode;
}

/// Timestamp-plus-entropy codes: base-36 millisecond timestamp, a dash, six
/// random base-36 characters, uppercased (e.g. `M2X9K1QZ-A7B3C9`).
pub struct TimestampCodeGenerator {
    clock: Arc<dyn Clock>,
}

impl TimestampCodeGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for TimestampCodeGenerator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl CodeGenerator for TimestampCodeGenerator {
    fn generate(&self) -> RedemptionCode {
        let millis = self.clock.now().timestamp_millis().max(0) as u64;
        let mut rng = rand::thread_rng();
        let suffix: String = (0..6)
            .map(|_| {
                let digit = rng.gen_range(0..36u32);
                char::from_digit(digit, 36).unwrap_or('0')
            })
            .collect();
        RedemptionCode::new(format!("{}-{}", to_base36(millis), suffix).to_uppercase())
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while value > 0 {
        let digit = (value % 36) as u32;
        digits.push(char::from_digit(digit, 36).unwrap_or('0'));
        value /= 36;
    }
    digits.iter().rev().collect()
}

/// Replays a fixed list of codes, repeating the last one once exhausted.
/// Test support for collision behavior.
pub struct FixedCodeGenerator {
    codes: Vec<RedemptionCode>,
    next: AtomicUsize,
}

impl FixedCodeGenerator {
    pub fn new(codes: Vec<RedemptionCode>) -> Self {
        Self {
            codes,
            next: AtomicUsize::new(0),
        }
    }
}

impl CodeGenerator for FixedCodeGenerator {
    fn generate(&self) -> RedemptionCode {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        self.codes
            .get(index)
            .or_else(|| self.codes.last())
            .cloned()
            .unwrap_or_else(|| RedemptionCode::new("0"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_uppercase_with_dash() {
        let generator = TimestampCodeGenerator::default();
        let code = generator.generate();
        assert!(code.as_str().contains('-'));
        assert_eq!(code.as_str(), code.as_str().to_uppercase());
    }

    #[test]
    fn generated_codes_differ() {
        let generator = TimestampCodeGenerator::default();
        let a = generator.generate();
        let b = generator.generate();
        // Same millisecond is possible; the random suffix still separates them.
        assert_ne!(a, b);
    }

    #[test]
    fn base36_round_trip_against_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(36 * 36 + 1), "101");
    }

    #[test]
    fn empty_fixed_generator_falls_back_to_a_constant() {
        let generator = FixedCodeGenerator::new(Vec::new());
        assert_eq!(generator.generate().as_str(), "0");
        assert_eq!(generator.generate().as_str(), "0");
    }

    #[test]
    fn fixed_generator_replays_then_repeats_last() {
        let generator = FixedCodeGenerator::new(vec![
            RedemptionCode::new("AAA"),
            RedemptionCode::new("BBB"),
        ]);
        assert_eq!(generator.generate().as_str(), "AAA");
        assert_eq!(generator.generate().as_str(), "BBB");
        assert_eq!(generator.generate().as_str(), "BBB");
    }
}
