//! Platform detection for tuning defaults.

use log::info;
use std::path::Path;
use std::sync::OnceLock;

/// Fallback data-cache budget when nothing better is known.
pub const DEFAULT_DCACHE_BYTES: usize = 32 * 1024;

/// Environment override for the data-cache budget, in bytes.
pub const DCACHE_ENV: &str = "QCONV_DCACHE_BYTES";

static DCACHE: OnceLock<usize> = OnceLock::new();

/// Level-1 data cache size used as the default tiling budget.
///
/// Resolved once per process: `QCONV_DCACHE_BYTES`, then Linux sysfs, then
/// [`DEFAULT_DCACHE_BYTES`].
pub fn data_cache_bytes() -> usize {
    *DCACHE.get_or_init(|| {
        if let Some(v) = std::env::var(DCACHE_ENV).ok().and_then(|s| s.trim().parse::<usize>().ok()) {
            if v > 0 {
                info!("data cache budget from {}: {} bytes", DCACHE_ENV, v);
                return v;
            }
        }
        if let Some(v) = sysfs_l1d_bytes(Path::new("/sys/devices/system/cpu/cpu0/cache")) {
            info!("detected L1 data cache: {} bytes", v);
            return v;
        }
        info!("data cache size unknown, using {} bytes", DEFAULT_DCACHE_BYTES);
        DEFAULT_DCACHE_BYTES
    })
}

fn sysfs_l1d_bytes(root: &Path) -> Option<usize> {
    for idx in 0..8 {
        let dir = root.join(format!("index{}", idx));
        let level = std::fs::read_to_string(dir.join("level")).ok()?;
        let kind = std::fs::read_to_string(dir.join("type")).unwrap_or_default();
        if level.trim() == "1" && kind.trim() == "Data" {
            let size = std::fs::read_to_string(dir.join("size")).ok()?;
            return parse_cache_size(&size);
        }
    }
    None
}

/// Parse sysfs cache sizes such as `"48K"`, `"1M"` or `"32768"`.
pub fn parse_cache_size(s: &str) -> Option<usize> {
    let s = s.trim();
    let (digits, mult) = match s.chars().last()? {
        'K' | 'k' => (&s[..s.len() - 1], 1024),
        'M' | 'm' => (&s[..s.len() - 1], 1024 * 1024),
        _ => (s, 1),
    };
    let n: usize = digits.trim().parse().ok()?;
    if n == 0 {
        return None;
    }
    n.checked_mul(mult)
}
