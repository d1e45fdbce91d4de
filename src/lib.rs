pub mod api_client;
pub mod config;
pub mod disk;
pub mod error;
pub mod feedback;
pub mod format;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod upload;
pub mod viewer;

pub use api_client::{ApiClient, RemoteData};
pub use error::ClientError;
pub use session::Session;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a state mutex, recovering the data if a previous holder panicked.
/// All shared state here is plain data that stays consistent between writes.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
