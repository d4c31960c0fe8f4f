//! Retainer coordinator: decides, once a retainer node finishes, whether the
//! soft target it gates gets promoted into the executable set.
//!
//! The sentinel-file protocol is what lets this decision be made from the
//! parent process without a channel into the (already-exited) retainer
//! child: `retain()`/`mdl.retain()` writes `retain.flag` into the retainer's
//! own node directory, and this module reads it back after the retainer
//! completes.

use std::path::Path;

use mdl_store::RETAIN_SENTINEL_FILE_NAME;

/// Whether the retainer's node directory contains a retain sentinel.
pub fn sentinel_present(retainer_node_dir: &Path) -> bool {
    retainer_node_dir.join(RETAIN_SENTINEL_FILE_NAME).exists()
}

/// A soft target is promoted iff its retainer succeeded and signalled
/// retain. A failed retainer never promotes, regardless of any stray
/// sentinel left on disk.
pub fn should_promote(retainer_succeeded: bool, sentinel_present: bool) -> bool {
    retainer_succeeded && sentinel_present
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_present_detects_the_flag_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!sentinel_present(dir.path()));
        std::fs::write(dir.path().join(RETAIN_SENTINEL_FILE_NAME), b"1").unwrap();
        assert!(sentinel_present(dir.path()));
    }

    #[test]
    fn promotion_requires_both_success_and_sentinel() {
        assert!(should_promote(true, true));
        assert!(!should_promote(true, false));
        assert!(!should_promote(false, true));
        assert!(!should_promote(false, false));
    }
}
