//! Byte-size helpers for log lines and size comparisons.

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Formats a byte count as a short human-readable string ("1.50 MB").
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", safe_div(bytes as f64, GB as f64))
    } else if bytes >= MB {
        format!("{:.2} MB", safe_div(bytes as f64, MB as f64))
    } else if bytes >= KB {
        format!("{:.2} KB", safe_div(bytes as f64, KB as f64))
    } else {
        format!("{} B", bytes)
    }
}

/// Percentage of `before` saved by shrinking to `after`. Negative when the file grew.
pub fn reduction_percent(before: u64, after: u64) -> f64 {
    safe_div(before as f64 - after as f64, before as f64) * 100.0
}

/// Checks that two sizes agree within `tolerance` (0.01 means 1%).
pub fn sizes_within_tolerance(actual: u64, expected: u64, tolerance: f64) -> bool {
    if expected == 0 {
        return actual == 0;
    }
    let diff = (actual as f64 - expected as f64).abs();
    diff / expected as f64 <= tolerance
}

pub fn sizes_within_1_percent(actual: u64, expected: u64) -> bool {
    sizes_within_tolerance(actual, expected, 0.01)
}
