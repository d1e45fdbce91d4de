//! Pagination state for the file currently being viewed.
//!
//! [`DataViewer`] is a plain state machine: every transition that needs data
//! returns a [`PageRequest`], and the caller feeds the answer back through
//! [`DataViewer::apply`]. Requests carry a sequence number so an answer that
//! arrives after a newer request was issued is dropped instead of
//! overwriting fresher data.

use crate::error::ClientError;
use crate::models::{FileId, FileStatus, PagedResult, Row, UploadedFile};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub seq: u64,
    pub file_id: FileId,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageApplied {
    Displayed,
    Discarded,
}

/// What the data area should show right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerDisplay<'a> {
    NoSelection,
    NotReady(FileStatus),
    Loading,
    Page(&'a PagedResult),
}

impl ViewerDisplay<'_> {
    pub fn placeholder(&self) -> Option<String> {
        match self {
            ViewerDisplay::NoSelection => {
                Some("Select a completed file to view its data.".to_string())
            }
            ViewerDisplay::NotReady(status) => Some(format!(
                "File is {}. Data will be available once processing is complete.",
                status
            )),
            ViewerDisplay::Loading => Some("Loading data...".to_string()),
            ViewerDisplay::Page(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataViewer {
    selected: Option<UploadedFile>,
    page: u32,
    page_size: u32,
    current: Option<PagedResult>,
    loading: bool,
    issued: u64,
}

impl DataViewer {
    pub fn new(page_size: u32) -> Self {
        Self {
            selected: None,
            page: 1,
            page_size: page_size.max(1),
            current: None,
            loading: false,
            issued: 0,
        }
    }

    pub fn selected(&self) -> Option<&UploadedFile> {
        self.selected.as_ref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn current(&self) -> Option<&PagedResult> {
        self.current.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn display(&self) -> ViewerDisplay<'_> {
        match (&self.selected, &self.current) {
            (None, _) => ViewerDisplay::NoSelection,
            (Some(file), _) if !file.is_completed() => ViewerDisplay::NotReady(file.status),
            (Some(_), Some(page)) => ViewerDisplay::Page(page),
            (Some(_), None) => ViewerDisplay::Loading,
        }
    }

    /// Selecting always starts from page one. Files that are not completed
    /// are shown with a placeholder and never fetched.
    pub fn select(&mut self, file: UploadedFile) -> Option<PageRequest> {
        let switching = self
            .selected
            .as_ref()
            .map_or(true, |f| f.file_id != file.file_id);
        if switching {
            self.current = None;
        }
        self.selected = Some(file);
        self.page = 1;
        self.issue()
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.current = None;
        self.page = 1;
        self.invalidate();
    }

    /// Clears the view when `id` is the selected file.
    pub fn clear_if_selected(&mut self, id: &FileId) -> bool {
        if self.selected.as_ref().is_some_and(|f| &f.file_id == id) {
            self.clear();
            true
        } else {
            false
        }
    }

    pub fn go_to_page(&mut self, page: u32) -> Option<PageRequest> {
        if page == 0 || page == self.page {
            return None;
        }
        self.page = page;
        self.issue()
    }

    /// Gated by the server's `has_next` flag on the displayed page.
    pub fn next_page(&mut self) -> Option<PageRequest> {
        let current = self.current.as_ref()?;
        if !current.has_next || self.loading {
            return None;
        }
        let target = current.page + 1;
        self.go_to_page(target)
    }

    /// Gated by the server's `has_previous` flag on the displayed page.
    pub fn previous_page(&mut self) -> Option<PageRequest> {
        let current = self.current.as_ref()?;
        if !current.has_previous || self.loading {
            return None;
        }
        let target = current.page.saturating_sub(1);
        self.go_to_page(target)
    }

    /// A new page size invalidates the old page numbering: back to page one.
    pub fn set_page_size(&mut self, page_size: u32) -> Option<PageRequest> {
        if page_size == 0 || page_size == self.page_size {
            return None;
        }
        self.page_size = page_size;
        self.page = 1;
        self.issue()
    }

    /// Picks up status changes for the selected file from a fresh registry
    /// listing. Returns a request when the file has just become completed.
    pub fn sync_selection(&mut self, files: &[UploadedFile]) -> Option<PageRequest> {
        let selected = self.selected.as_ref()?;
        let latest = files.iter().find(|f| f.file_id == selected.file_id)?;
        let became_ready = !selected.is_completed() && latest.is_completed();

        self.selected = Some(latest.clone());
        if became_ready {
            debug!("{} finished processing, loading page {}", latest.file_id, self.page);
            self.issue()
        } else {
            None
        }
    }

    /// Applies the answer to `seq`. Answers to superseded requests are
    /// discarded, errors included.
    pub fn apply(
        &mut self,
        seq: u64,
        result: Result<PagedResult, ClientError>,
    ) -> Result<PageApplied, ClientError> {
        if seq != self.issued {
            debug!("Discarding page response {} (latest is {})", seq, self.issued);
            return Ok(PageApplied::Discarded);
        }

        self.loading = false;
        match result {
            Ok(page) => {
                self.page = page.page;
                self.current = Some(page);
                Ok(PageApplied::Displayed)
            }
            Err(e) => {
                // keep the page number in step with what is still displayed
                if let Some(current) = &self.current {
                    self.page = current.page;
                }
                Err(e)
            }
        }
    }

    fn invalidate(&mut self) {
        self.issued += 1;
        self.loading = false;
    }

    fn issue(&mut self) -> Option<PageRequest> {
        self.invalidate();

        let file = self.selected.as_ref()?;
        if !file.is_completed() {
            return None;
        }

        self.loading = true;
        Some(PageRequest {
            seq: self.issued,
            file_id: file.file_id.clone(),
            page: self.page,
            page_size: self.page_size,
        })
    }
}

/// Text of one cell; null and missing values render empty.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        // whole floats print without a trailing ".0"
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() => f.to_string(),
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

/// Lays rows out in column order so every row has one cell per header.
pub fn table_rows(columns: &[String], data: &[Row]) -> Vec<Vec<String>> {
    data.iter()
        .map(|row| columns.iter().map(|c| cell_text(row.get(c))).collect())
        .collect()
}
