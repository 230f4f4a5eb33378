use crate::error::InterviewError;
use std::ops::RangeInclusive;

/// Interview length the console accepts, in minutes.
pub const DURATION_RANGE_MINUTES: RangeInclusive<u32> = 3..=60;
pub const DEFAULT_DURATION_MINUTES: u32 = 10;

/// What the user fills in before the interview starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSetup {
    pub job_role: String,
    pub skills: String,
    pub projects: String,
    pub duration_minutes: u32,
}

impl Default for SessionSetup {
    fn default() -> Self {
        Self {
            job_role: String::new(),
            skills: String::new(),
            projects: String::new(),
            duration_minutes: DEFAULT_DURATION_MINUTES,
        }
    }
}

impl SessionSetup {
    pub fn new(job_role: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            job_role: job_role.into(),
            duration_minutes,
            ..Self::default()
        }
    }

    pub fn with_skills(mut self, skills: impl Into<String>) -> Self {
        self.skills = skills.into();
        self
    }

    pub fn with_projects(mut self, projects: impl Into<String>) -> Self {
        self.projects = projects.into();
        self
    }

    /// Checks the preconditions for starting an interview.
    pub fn validate(&self) -> Result<(), InterviewError> {
        if self.job_role.trim().is_empty() {
            return Err(InterviewError::Validation(
                "Please enter a Job Role to start the interview.".to_string(),
            ));
        }
        if self.duration_minutes == 0 {
            return Err(InterviewError::Validation(
                "Please set a valid interview duration.".to_string(),
            ));
        }
        Ok(())
    }

    pub fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }
}
