//! One-minute load average, for the remote-dispatch guard.

/// Returns the 1-minute load average, or 0.0 where it cannot be read.
pub fn one_minute() -> f64 {
    read_proc().unwrap_or(0.0)
}

#[cfg(target_os = "linux")]
fn read_proc() -> Option<f64> {
    let text = std::fs::read_to_string("/proc/loadavg").ok()?;
    text.split_whitespace().next()?.parse().ok()
}

#[cfg(not(target_os = "linux"))]
fn read_proc() -> Option<f64> {
    None
}

#[cfg(test)]
#[path = "loadavg.test.rs"]
mod tests;
