use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;

static ID_GEN: Lazy<AtomicUsize> = Lazy::new(|| AtomicUsize::new(1));

/// Generate scheduler id.
pub(crate) fn gen_id() -> usize {
    ID_GEN.fetch_add(1, Ordering::AcqRel)
}
