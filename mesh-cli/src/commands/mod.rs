//! CLI command implementations.

pub mod lesson;
pub mod progress;
pub mod quiz;
pub mod status;
pub mod sync;
pub mod transfer;

/// Format a millisecond timestamp relative to now.
pub fn format_timestamp(ts_ms: u64) -> String {
    let now = mesh_types::now_millis() / 1000;
    let diff = now.saturating_sub(ts_ms / 1000);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_timestamp_works() {
        let now = mesh_types::now_millis();

        assert_eq!(format_timestamp(now), "just now");
        assert!(format_timestamp(now - 120_000).contains("minutes"));
        assert!(format_timestamp(now - 7_200_000).contains("hours"));
        assert!(format_timestamp(now - 172_800_000).contains("days"));
    }
}
