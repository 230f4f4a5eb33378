/// Control token the interviewer is asked to append to its final message.
pub const COMPLETION_TOKEN: &str = "[[INTERVIEW_COMPLETE]]";

/// Wrap-up phrases recognised when the model forgets the control token.
/// The list is a heuristic and not exhaustive.
pub const DEFAULT_MARKERS: &[&str] = &[
    "concludes our mock interview",
    "this was the final part of our session",
    "feedback session is complete",
];

/// Result of inspecting one AI reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    /// Reply text with any control token removed.
    pub text: String,
    pub completed: bool,
}

/// Decides whether an AI reply ends the interview.
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    markers: Vec<String>,
}

impl Default for CompletionDetector {
    fn default() -> Self {
        Self::with_markers(DEFAULT_MARKERS.iter().copied())
    }
}

impl CompletionDetector {
    pub fn with_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn inspect(&self, reply: &str) -> Inspection {
        if reply.contains(COMPLETION_TOKEN) {
            return Inspection {
                text: reply.replace(COMPLETION_TOKEN, "").trim_end().to_string(),
                completed: true,
            };
        }

        let lower = reply.to_lowercase();
        let completed = self.markers.iter().any(|m| lower.contains(m.as_str()));
        if completed {
            tracing::debug!("Completion detected from a wrap-up phrase");
        }
        Inspection {
            text: reply.to_string(),
            completed,
        }
    }
}
