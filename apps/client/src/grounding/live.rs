use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct LiveDocuments {
    job_description: Option<String>,
    resume_text: Option<String>,
}

/// Document text held by the running session only. Never persisted.
///
/// Cloning shares the same slot, so the workflow and the resolver see the
/// same values.
#[derive(Debug, Clone, Default)]
pub struct LiveContext {
    inner: Arc<RwLock<LiveDocuments>>,
}

impl LiveContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_description(&self) -> Option<String> {
        non_blank(self.read().job_description.as_deref())
    }

    pub fn resume_text(&self) -> Option<String> {
        non_blank(self.read().resume_text.as_deref())
    }

    pub fn set_job_description(&self, text: impl Into<String>) {
        self.write().job_description = Some(text.into());
    }

    pub fn set_resume_text(&self, text: impl Into<String>) {
        self.write().resume_text = Some(text.into());
    }

    pub fn clear_job_description(&self) {
        self.write().job_description = None;
    }

    pub fn clear_resume_text(&self) {
        self.write().resume_text = None;
    }

    pub fn clear(&self) {
        *self.write() = LiveDocuments::default();
    }

    // A panicked writer leaves plain strings behind; the data is still usable.
    fn read(&self) -> RwLockReadGuard<'_, LiveDocuments> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LiveDocuments> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn non_blank(text: Option<&str>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let live = LiveContext::new();
        let view = live.clone();
        live.set_job_description("Data Engineer");
        assert_eq!(view.job_description().as_deref(), Some("Data Engineer"));

        view.clear();
        assert_eq!(live.job_description(), None);
    }

    #[test]
    fn test_clearing_one_slot_keeps_the_other() {
        let live = LiveContext::new();
        live.set_job_description("JD");
        live.set_resume_text("CV");

        live.clear_job_description();
        assert_eq!(live.job_description(), None);
        assert_eq!(live.resume_text().as_deref(), Some("CV"));
    }

    #[test]
    fn test_blank_values_read_as_absent() {
        let live = LiveContext::new();
        live.set_resume_text("  \n ");
        assert_eq!(live.resume_text(), None);
    }
}
