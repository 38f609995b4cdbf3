use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// A configuration value that can be replaced while readers are active.
///
/// Readers take a snapshot with [`Reloadable::current`] and keep using it for
/// the whole operation; a concurrent [`Reloadable::replace`] never shows them a
/// half-updated value.
pub struct Reloadable<T> {
    inner: ArcSwap<T>,
}

impl<T> Reloadable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// Snapshot of the current value
    pub fn current(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Publish a new value, returning the one it replaced
    pub fn replace(&self, value: T) -> Arc<T> {
        self.inner.swap(Arc::new(value))
    }
}

impl<T: Default> Default for Reloadable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Reloadable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reloadable").field(&*self.inner.load()).finish()
    }
}
