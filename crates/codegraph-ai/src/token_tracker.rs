use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// Accumulates token usage across the calls made by one orchestrator run (§4.5).
///
/// The specification describes this as "thread-scoped"; since the orchestrator's calls are
/// async and may hop executor threads between awaits, this is realized as a value owned by
/// the orchestrator instance rather than a `thread_local!`, which would silently stop
/// accumulating across an await point.
#[derive(Default)]
pub struct TokenTracker {
    usage: Mutex<TokenUsage>,
}

impl TokenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, input_tokens: usize, output_tokens: usize) {
        let mut usage = self.usage.lock();
        usage.input_tokens += input_tokens as u64;
        usage.output_tokens += output_tokens as u64;
        usage.total_tokens += (input_tokens + output_tokens) as u64;
    }

    pub fn usage(&self) -> TokenUsage {
        *self.usage.lock()
    }
}

/// `n < 1,000 → n`; `1,000 ≤ n < 1,000,000 → "NK"` (one decimal iff non-integer);
/// `≥ 1,000,000 → "NM"` (one decimal) (§4.5).
pub fn format(n: u64) -> String {
    if n < 1_000 {
        return n.to_string();
    }
    if n < 1_000_000 {
        return scaled(n as f64 / 1_000.0, "K");
    }
    scaled(n as f64 / 1_000_000.0, "M")
}

fn scaled(value: f64, suffix: &str) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract().abs() < f64::EPSILON {
        format!("{}{suffix}", rounded as i64)
    } else {
        format!("{rounded:.1}{suffix}")
    }
}

/// `"240K/1M"`-style progress string, plus the rounded percentage (§4.5).
pub fn progress(current: u64, max: u64) -> (String, u64) {
    let capped = current.min(max);
    let percentage = if max == 0 {
        0
    } else {
        ((100.0 * capped as f64 / max as f64).round()) as u64
    };
    (format!("{}/{}", format(current), format(max)), percentage)
}

pub fn is_near_limit(current: u64, max: u64, ratio: f64) -> bool {
    if max == 0 {
        return true;
    }
    (current as f64 / max as f64) >= ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_leaves_small_numbers_unscaled() {
        assert_eq!(format(999), "999");
    }

    #[test]
    fn format_scales_thousands_without_decimal_when_exact() {
        assert_eq!(format(240_000), "240K");
    }

    #[test]
    fn format_scales_thousands_with_one_decimal_when_inexact() {
        assert_eq!(format(1_500), "1.5K");
    }

    #[test]
    fn format_drops_the_decimal_when_rounding_lands_on_a_whole_number() {
        assert_eq!(format(1_001), "1K");
    }

    #[test]
    fn format_scales_millions() {
        assert_eq!(format(1_000_000), "1M");
        assert_eq!(format(2_500_000), "2.5M");
    }

    #[test]
    fn progress_renders_and_rounds_percentage() {
        let (text, pct) = progress(240_000, 1_000_000);
        assert_eq!(text, "240K/1M");
        assert_eq!(pct, 24);
    }

    #[test]
    fn progress_caps_current_at_max() {
        let (_, pct) = progress(2_000_000, 1_000_000);
        assert_eq!(pct, 100);
    }

    #[test]
    fn is_near_limit_triggers_at_ratio() {
        assert!(is_near_limit(900_000, 1_000_000, 0.9));
        assert!(!is_near_limit(800_000, 1_000_000, 0.9));
    }

    #[test]
    fn tracker_accumulates_across_calls() {
        let tracker = TokenTracker::new();
        tracker.record(100, 50);
        tracker.record(200, 75);
        let usage = tracker.usage();
        assert_eq!(usage.input_tokens, 300);
        assert_eq!(usage.output_tokens, 125);
        assert_eq!(usage.total_tokens, 425);
    }
}
