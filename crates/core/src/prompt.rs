use crate::completion::COMPLETION_TOKEN;
use crate::setup::SessionSetup;

/// The first message sent after the session opens, to get the interviewer talking.
pub const BOOTSTRAP_MESSAGE: &str = "Hello! Please start the interview.";

/// Shown (and spoken) in place of a reply when a turn fails.
pub const APOLOGY_MESSAGE: &str =
    "Sorry, I encountered an error processing your request. Please try again.";

/// Rendered for optional fields the user left empty.
pub const NOT_SPECIFIED: &str = "Not specified.";

/// Built-in interviewer instructions. Placeholders in braces are replaced by
/// [`render_system_prompt`].
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are "MentorAI", a friendly and professional AI interviewer who helps people practice for job interviews.
The candidate is applying for the role of: "{job_role}".
The interview should last about {duration_minutes} minutes. Pace your questions to fit this timeframe.

Information provided by the candidate:
- Key Skills: {skills}
- Projects Overview: {projects}

Follow these steps:
1. When the candidate asks you to start the interview, introduce yourself briefly (for example: "Hello! I'm MentorAI, your practice interviewer for the {job_role} role. We have about {duration_minutes} minutes. Let's begin.") and IMMEDIATELY ask the first question. Do not wait for more input first.
2. Ask behavioral or general technical questions suited to the "{job_role}" role. Where natural, draw on the skills and projects above. Vary the question types.
3. After each answer, give brief constructive feedback (1-3 sentences), then move on to the next question.
4. Ask about 3-5 questions in total, fewer if the {duration_minutes}-minute limit is approaching.
5. When time is nearly up, or after feedback on your final planned question, say something like "Alright, that was the final question for this part. Now, let's move on to some overall feedback on our session."
6. Then give overall qualitative feedback on the whole interview in 3-5 sentences, covering strengths and areas for improvement.
7. Finish politely, for example: "That covers the main feedback points. This concludes our mock interview and feedback session for today. Keep up the good work!" Do not offer to continue. End your final message with the exact token {completion_token} on its own line.
8. Stay encouraging, supportive and professional.
9. Never ask for personally identifiable information such as name, email, age or location.
10. Keep responses concise and focused on the interview.
11. If the candidate goes off topic, steer the conversation back to the mock interview.
"#;

/// Interpolates the session setup into `template`.
///
/// Empty optional fields render as [`NOT_SPECIFIED`] so the model never sees a
/// dangling label.
pub fn render_system_prompt(template: &str, setup: &SessionSetup) -> String {
    template
        .replace("{job_role}", setup.job_role.trim())
        .replace("{skills}", or_not_specified(&setup.skills))
        .replace("{projects}", or_not_specified(&setup.projects))
        .replace("{duration_minutes}", &setup.duration_minutes.to_string())
        .replace("{completion_token}", COMPLETION_TOKEN)
}

fn or_not_specified(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        NOT_SPECIFIED
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_fields_are_interpolated() {
        let setup = SessionSetup::new("Backend Engineer", 15)
            .with_skills("Rust, PostgreSQL")
            .with_projects("A payments API");

        let prompt = render_system_prompt(DEFAULT_SYSTEM_PROMPT, &setup);

        assert!(prompt.contains("\"Backend Engineer\""));
        assert!(prompt.contains("about 15 minutes"));
        assert!(prompt.contains("Key Skills: Rust, PostgreSQL"));
        assert!(prompt.contains("Projects Overview: A payments API"));
        assert!(prompt.contains(COMPLETION_TOKEN));
        assert!(!prompt.contains('{'), "no placeholder should survive: {prompt}");
    }

    #[test]
    fn empty_optional_fields_render_placeholder() {
        let setup = SessionSetup::new("Designer", 5).with_skills("  ");
        let prompt = render_system_prompt(DEFAULT_SYSTEM_PROMPT, &setup);

        assert!(prompt.contains("Key Skills: Not specified."));
        assert!(prompt.contains("Projects Overview: Not specified."));
    }

    #[test]
    fn custom_templates_use_the_same_placeholders() {
        let setup = SessionSetup::new("SRE", 30);
        let prompt = render_system_prompt("{job_role}/{duration_minutes}/{skills}", &setup);
        assert_eq!(prompt, "SRE/30/Not specified.");
    }
}
