use chrono::{DateTime, Local, Utc};

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Formats a byte count using the largest binary unit that keeps the value
/// at or above one, rounded to at most two decimal places.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", trim_decimal(rounded), SIZE_UNITS[unit])
}

/// Renders a timestamp in the local timezone.
pub fn format_date(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Groups digits in threes: `1234567` becomes `1,234,567`.
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Percent label used next to progress bars, e.g. `42.5%`.
pub fn format_percent(value: f32) -> String {
    format!("{:.1}%", value)
}

// Two decimals at most, without trailing zeros: 1.50 -> "1.5", 2.00 -> "2".
fn trim_decimal(value: f64) -> String {
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0');
    text.trim_end_matches('.').to_string()
}
