/// Helper macro for locking items, propagating poisoned locks as [`crate::Error::LockError`]
///
/// ```rust, ignore
///  let mut state = lock!(self.state);
///  state.add(record);
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)?
    };
}
