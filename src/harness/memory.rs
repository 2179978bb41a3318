//! Peak resident memory tracking.
//!
//! On Linux the kernel exposes the process peak RSS as `VmHWM` in
//! `/proc/self/status`, and writing `5` to `/proc/self/clear_refs` resets
//! it, which lets the harness measure each method from a clean baseline.
//! On other platforms both operations degrade to no-ops and the harness
//! reports zero peak memory.

/// Reset the peak-RSS watermark. Returns false when the platform does not
/// support resetting.
pub fn reset_peak_rss() -> bool {
    #[cfg(target_os = "linux")]
    {
        std::fs::write("/proc/self/clear_refs", "5").is_ok()
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

/// Current peak resident set size in megabytes, if the platform exposes it.
#[must_use]
pub fn peak_rss_mb() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_hwm_kb(&status).map(|kb| kb as f64 / 1024.0)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(target_os = "linux")]
fn parse_vm_hwm_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find(|line| line.starts_with("VmHWM:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse().ok())
}
