use crate::api_client::RemoteData;
use crate::error::ClientError;
use crate::lock;
use crate::models::DiskSpaceInfo;
use chrono::{DateTime, Local};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum DiskSpaceView {
    /// Nothing fetched yet.
    Unknown,
    /// The first fetch failed.
    Unavailable,
    Known {
        info: DiskSpaceInfo,
        fetched_at: DateTime<Local>,
        /// Set when later refreshes failed and `info` is the last good value.
        stale: bool,
    },
}

impl DiskSpaceView {
    pub fn label(&self) -> String {
        match self {
            DiskSpaceView::Unknown => "Disk space: loading...".to_string(),
            DiskSpaceView::Unavailable => "Disk space: unavailable".to_string(),
            DiskSpaceView::Known { info, stale, .. } => format!(
                "Disk space: {} free of {} ({:.1}% used){}",
                info.free_space.formatted,
                info.total_space.formatted,
                info.usage_percentage,
                if *stale { " (stale)" } else { "" }
            ),
        }
    }

    pub fn usage_fraction(&self) -> Option<f32> {
        match self {
            DiskSpaceView::Known { info, .. } => {
                Some((info.usage_percentage / 100.0).clamp(0.0, 1.0))
            }
            _ => None,
        }
    }
}

pub struct DiskSpaceMonitor {
    view: Mutex<DiskSpaceView>,
}

impl Default for DiskSpaceMonitor {
    fn default() -> Self {
        Self {
            view: Mutex::new(DiskSpaceView::Unknown),
        }
    }
}

impl DiskSpaceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> DiskSpaceView {
        lock(&self.view).clone()
    }

    /// Replaces the snapshot wholesale. A failure never blanks a known value.
    pub async fn refresh(&self, client: &dyn RemoteData) -> Result<(), ClientError> {
        let result = client.fetch_disk_space().await;

        let mut view = lock(&self.view);
        match result {
            Ok(info) => {
                *view = DiskSpaceView::Known {
                    info,
                    fetched_at: Local::now(),
                    stale: false,
                };
                Ok(())
            }
            Err(e) => {
                match &mut *view {
                    DiskSpaceView::Known { stale, .. } => *stale = true,
                    other => *other = DiskSpaceView::Unavailable,
                }
                Err(e)
            }
        }
    }
}
