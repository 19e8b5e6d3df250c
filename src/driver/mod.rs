//! Driver façades: the single-owner glue between the codecs/engines and
//! the command layer (§5, §4.8's create/extract entry points).
//!
//! Each driver holds the only mutable reference to its arena/resolver
//! for the duration of one operation, per the §5 resource model. The
//! optional progress callback fires synchronously at named phase
//! boundaries and must not be held across operations; cancellation is
//! checked at the same boundaries.

pub mod archive;
pub mod link;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

/// Invoked synchronously at phase boundaries with a phase name and a
/// rough 0..=100 completion estimate.
pub type ProgressCallback<'a> = dyn FnMut(&str, u8) + 'a;

pub(crate) fn report(progress: &mut Option<&mut ProgressCallback<'_>>, phase: &str, percent: u8) {
    if let Some(callback) = progress.as_mut() {
        callback(phase, percent);
    }
}

pub(crate) fn check_cancelled(cancel: Option<&AtomicBool>) -> Result<()> {
    if let Some(flag) = cancel {
        if flag.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
    }
    Ok(())
}
