//! Ambient access to the nearest provider's handle.

use crate::provider::UnreadCountHandle;
use crate::{UnreadError, UnreadResult};

tokio::task_local! {
    pub(crate) static UNREAD_COUNT: UnreadCountHandle;
}

/// The handle of the enclosing provider scope, if any.
pub fn try_use_unread_count() -> UnreadResult<UnreadCountHandle> {
    UNREAD_COUNT
        .try_with(UnreadCountHandle::clone)
        .map_err(|_| UnreadError::OutsideProvider)
}

/// The handle of the enclosing provider scope.
///
/// # Panics
///
/// Panics when called outside [`crate::UnreadCountProvider::scope`] or
/// [`crate::UnreadCountProvider::spawn_scoped`]. Use [`try_use_unread_count`]
/// to handle that case instead.
pub fn use_unread_count() -> UnreadCountHandle {
    match try_use_unread_count() {
        Ok(handle) => handle,
        Err(e) => panic!("{e}"),
    }
}
