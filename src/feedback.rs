//! Where failures go.
//!
//! Background refreshes report to [`BackgroundFailureLog`], which only logs
//! and keeps a short history. User actions report to [`ForegroundError`], a
//! single dismissible message shown by the front end.

use crate::error::ClientError;
use crate::lock;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

const DEFAULT_HISTORY: usize = 32;

#[derive(Debug, Clone)]
pub struct BackgroundFailure {
    pub source: &'static str,
    pub message: String,
    pub at: DateTime<Local>,
}

pub struct BackgroundFailureLog {
    capacity: usize,
    recent: Mutex<VecDeque<BackgroundFailure>>,
}

impl Default for BackgroundFailureLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY)
    }
}

impl BackgroundFailureLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            recent: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, source: &'static str, err: &ClientError) {
        warn!("Background {} failed: {}", source, err);

        let mut recent = lock(&self.recent);
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(BackgroundFailure {
            source,
            message: err.to_string(),
            at: Local::now(),
        });
    }

    pub fn recent(&self) -> Vec<BackgroundFailure> {
        lock(&self.recent).iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.recent).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The one global error message. A newer failure replaces the older one.
#[derive(Default)]
pub struct ForegroundError {
    message: Mutex<Option<String>>,
}

impl ForegroundError {
    pub fn raise(&self, action: &str, err: &ClientError) {
        error!("{} failed: {}", action, err);
        *lock(&self.message) = Some(err.to_string());
    }

    pub fn current(&self) -> Option<String> {
        lock(&self.message).clone()
    }

    pub fn dismiss(&self) {
        *lock(&self.message) = None;
    }
}

#[derive(Default)]
pub struct ErrorChannels {
    pub background: Arc<BackgroundFailureLog>,
    pub foreground: ForegroundError,
}
