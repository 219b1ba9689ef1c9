//! Display strings for policy pickers, kept apart from the policy enums.

use crate::policy::{FrequencyPolicy, RetentionPolicy};

const FREQUENCY_LABELS: [(FrequencyPolicy, &str); 6] = [
    (FrequencyPolicy::Manual, "Manual only"),
    (FrequencyPolicy::Hourly, "Every hour"),
    (FrequencyPolicy::Every2h, "Every 2 hours"),
    (FrequencyPolicy::Every6h, "Every 6 hours"),
    (FrequencyPolicy::Every12h, "Every 12 hours"),
    (FrequencyPolicy::Daily, "Once a day"),
];

/// Retention choices offered to users, in picker order.
pub const RETENTION_OPTIONS: [RetentionPolicy; 5] = [
    RetentionPolicy::MaxSnapshots(15),
    RetentionPolicy::MaxSnapshots(30),
    RetentionPolicy::MaxSnapshots(50),
    RetentionPolicy::MaxSnapshots(100),
    RetentionPolicy::Unbounded,
];

pub fn frequency_label(policy: FrequencyPolicy) -> &'static str {
    FREQUENCY_LABELS
        .iter()
        .find(|(p, _)| *p == policy)
        .map_or("Manual only", |(_, label)| label)
}

pub fn retention_label(policy: RetentionPolicy) -> String {
    match policy {
        RetentionPolicy::MaxSnapshots(max) => format!("Keep last {}", max),
        RetentionPolicy::Unbounded => "Keep everything".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_frequency_has_label() {
        for policy in FrequencyPolicy::ALL {
            assert!(FREQUENCY_LABELS.iter().any(|(p, _)| *p == policy));
        }
        assert_eq!(frequency_label(FrequencyPolicy::Every6h), "Every 6 hours");
    }

    #[test]
    fn test_retention_labels() {
        assert_eq!(retention_label(RetentionPolicy::MaxSnapshots(15)), "Keep last 15");
        assert_eq!(retention_label(RetentionPolicy::Unbounded), "Keep everything");
        assert_eq!(RETENTION_OPTIONS.last(), Some(&RetentionPolicy::Unbounded));
    }
}
