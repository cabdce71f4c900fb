//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `coursepulse_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("coursepulse_core ping={}", coursepulse_core::ping());
    println!("coursepulse_core version={}", coursepulse_core::core_version());
}
