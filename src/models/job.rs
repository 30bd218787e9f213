use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{GeneratedImage, GenerationRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Idle,
    Generating,
    Success,
    Error,
}

/// One slide waiting for background images. The batch sequencer never stores
/// these; it reads them and reports [`JobUpdate`]s to the owner.
#[derive(Debug, Clone)]
pub struct SlideJob {
    pub id: String,
    pub request: GenerationRequest,
    pub variant_count: usize,
    pub status: JobStatus,
    pub results: Vec<GeneratedImage>,
    pub error_message: Option<String>,
}

impl SlideJob {
    pub fn new(request: GenerationRequest, variant_count: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request,
            variant_count,
            status: JobStatus::Idle,
            results: Vec::new(),
            error_message: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Jobs that were never run, failed last time, or have nothing to show.
    pub fn is_pending(&self) -> bool {
        matches!(self.status, JobStatus::Idle | JobStatus::Error) || self.results.is_empty()
    }

    pub fn apply(&mut self, update: JobUpdate) {
        match update {
            JobUpdate::Generating => {
                self.status = JobStatus::Generating;
                self.error_message = None;
            }
            JobUpdate::Succeeded(images) => {
                self.status = JobStatus::Success;
                self.results = images;
                self.error_message = None;
            }
            JobUpdate::Failed(message) => {
                self.status = JobStatus::Error;
                self.error_message = Some(message);
            }
        }
    }
}

/// Status transition reported for a job during a batch run.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    Generating,
    Succeeded(Vec<GeneratedImage>),
    Failed(String),
}

impl JobUpdate {
    pub fn status(&self) -> JobStatus {
        match self {
            JobUpdate::Generating => JobStatus::Generating,
            JobUpdate::Succeeded(_) => JobStatus::Success,
            JobUpdate::Failed(_) => JobStatus::Error,
        }
    }
}
