//! Example: Report both capacity tiers for one or more volumes
//!
//! Run with: cargo run -p volcap --example report -- / /Volumes/External

use volcap::{UntieredPolicy, VolumeCapacityProbe};

fn main() {
    let probe = VolumeCapacityProbe::new().with_untiered_policy(UntieredPolicy::Degrade);
    println!("Backend: {}", probe.backend_name());
    println!("{:-<60}", "");

    let mut paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        paths.push("/".to_string());
    }

    for path in &paths {
        match probe.query(path) {
            Ok(report) => {
                let note = if report.is_degraded() { " (untiered)" } else { "" };
                println!(
                    "{:<24} important {:>10}  opportunistic {:>10}  purgeable {:>10}{}",
                    path,
                    format_size(report.important_available_bytes()),
                    format_size(report.opportunistic_available_bytes()),
                    format_size(report.purgeable_bytes()),
                    note
                );
            }
            Err(e) => eprintln!("{path}: {e}"),
        }
    }
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1000;
    const MB: u64 = KB * 1000;
    const GB: u64 = MB * 1000;

    if bytes >= GB {
        format!("{:.1}G", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}M", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}K", bytes as f64 / KB as f64)
    } else {
        format!("{bytes}B")
    }
}
