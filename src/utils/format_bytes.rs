//! Human-readable byte sizes for reports.

const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Format `bytes` with binary units, e.g. `1.50 KB (1536 Bytes)`. Negative values keep their sign.
pub fn format_bytes(bytes: i64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let abs = bytes.unsigned_abs() as f64;
    let exponent = ((abs.ln() / 1024f64.ln()).floor() as usize).min(UNITS.len() - 1);
    let value = abs / 1024f64.powi(exponent as i32);
    let sign = if bytes < 0 { "-" } else { "" };
    format!(
        "{sign}{value:.decimals$} {} ({bytes} Bytes)",
        UNITS[exponent]
    )
}

/// Whole megabytes, rounded.
pub fn bytes_to_mb(bytes: u64) -> u64 {
    (bytes as f64 / (1024.0 * 1024.0)).round() as u64
}
