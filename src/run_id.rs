//! Run identifiers scope one run's transport files and default container name.

use std::time::{SystemTime, UNIX_EPOCH};

/// `dojo-<image>-<unix seconds>-<random>`, safe to use as a container name
/// and as part of a file name.
pub fn generate(image: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("dojo-{}-{}-{}", sanitize_image_name(image), now, random_suffix())
}

/// Lower-case the image reference and replace anything outside `[a-z0-9_.-]` with `-`.
pub fn sanitize_image_name(image: &str) -> String {
    image
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn random_suffix() -> u32 {
    let mut buf = [0u8; 4];
    match getrandom::fill(&mut buf) {
        Ok(()) => u32::from_le_bytes(buf) % 100_000,
        Err(_) => std::process::id() % 100_000,
    }
}
