use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// File stem of the interviewer instructions override.
pub const SYSTEM_PROMPT_KEY: &str = "system_prompt";
/// File stem of the wrap-up phrase list, one phrase per line.
pub const COMPLETION_MARKERS_KEY: &str = "completion_markers";

/// Prompt overrides read from a directory of Markdown files, keyed by file stem.
#[derive(Debug, Clone, Default)]
pub struct PromptSet {
    prompts: HashMap<String, String>,
}

impl PromptSet {
    pub fn load(dir_path: &Path) -> Result<Self> {
        let prompts = load_prompts(dir_path)?;
        if let Some(template) = prompts.get(SYSTEM_PROMPT_KEY) {
            if !template.contains("{job_role}") {
                tracing::warn!(
                    "{}.md has no {{job_role}} placeholder; the role will not reach the interviewer",
                    SYSTEM_PROMPT_KEY
                );
            }
        }
        Ok(Self { prompts })
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.prompts.get(key).map(String::as_str)
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.get(SYSTEM_PROMPT_KEY)
    }

    /// Non-empty lines of the marker file, if one was provided.
    pub fn completion_markers(&self) -> Option<Vec<String>> {
        let markers: Vec<String> = self
            .get(COMPLETION_MARKERS_KEY)?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        (!markers.is_empty()).then_some(markers)
    }
}

pub fn load_prompts(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem for prompt file")?
                .to_string();

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

            tracing::debug!("Loaded prompt '{}'", prompt_key);
            prompts.insert(prompt_key, content);
        }
    }

    Ok(prompts)
}
