#![allow(unused_macros)]

/// Helper macro for reading locked items
///
/// Evaluates to a `Result` holding the read guard, mapping lock poisoning to
/// [`crate::Error::LockError`].
///
/// ```rust, ignore
///  let table = read_lock!(self.table)?;
///  println!("{}", table.len());
/// ```
macro_rules! read_lock {
    ($rwlock:expr) => {
        $rwlock.read().map_err(|_| crate::Error::LockError)
    };
}

/// Helper macro for writing to locked items
///
/// Evaluates to a `Result` holding the write guard, mapping lock poisoning to
/// [`crate::Error::LockError`].
///
/// ```rust, ignore
///  let mut table = write_lock!(self.table)?;
///  table.reserve_one()?;
/// ```
macro_rules! write_lock {
    ($rwlock:expr) => {
        $rwlock.write().map_err(|_| crate::Error::LockError)
    };
}
