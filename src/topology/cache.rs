//! Invalidation hook for containers holding structures derived from a patch.

use super::sync::Structure;

/// Containers that cache structures built from a mesh patch.
///
/// Editing the patch directly (through `patch_mut` or a linked patch) leaves
/// the container unaware of the change; call one of these afterwards.
pub trait InvalidateCache {
    /// Downgrade the listed structures from `Current` to `Stale`.
    fn invalidate_structures(&mut self, structures: &[Structure]);

    /// Downgrade every derived structure.
    fn invalidate_cache(&mut self) {
        self.invalidate_structures(&Structure::ALL);
    }
}
