//! Icon generation and task suggestions on top of the Messages API.

use crate::client::AnthropicClient;
use crate::messages::{DEFAULT_MODEL, MessagesRequest};
use futures::future::{self, BoxFuture};
use tasklists_core::environment::{AssistantError, IconGenerator, TaskSuggester};
use tasklists_core::model::Icon;

const ICON_SYSTEM: &str = "You are a minimalist graphic designer.";

const SUGGEST_SYSTEM: &str = "You are a helpful task management assistant.";

/// Upper bound on suggestions taken from one response.
pub const MAX_SUGGESTIONS: usize = 10;

fn icon_prompt(topic: &str) -> String {
    format!(
        "Create a simple, modern, single-color vector icon that represents the concept of \"{topic}\".\n\n\
         The output must be a valid SVG string. The SVG should be clean, scalable, and use \
         'currentColor' for the fill color so it can adapt to the theme. Do not include any \
         width or height attributes on the <svg> tag itself. Set the viewBox to \"0 0 24 24\". \
         Reply with the SVG markup only."
    )
}

fn suggest_prompt(existing: &[String]) -> String {
    let mut prompt = String::from(
        "Given the following list of tasks, suggest additional related tasks that would help \
         the user comprehensively cover all aspects of their project. Reply with one task per \
         line and nothing else.\n\nCurrent Tasks:\n",
    );
    for text in existing {
        prompt.push_str("- ");
        prompt.push_str(text);
        prompt.push('\n');
    }
    prompt.push_str("\nSuggested Tasks:\n");
    prompt
}

/// Returns the first `<svg ...>...</svg>` element in `text`.
///
/// ```
/// use tasklists_assistant::extract_svg;
///
/// let reply = "Sure! ```svg\n<svg viewBox=\"0 0 24 24\"><path d=\"M1 1\"/></svg>\n```";
/// assert_eq!(
///     extract_svg(reply).as_deref(),
///     Some("<svg viewBox=\"0 0 24 24\"><path d=\"M1 1\"/></svg>")
/// );
/// assert_eq!(extract_svg("no icon here"), None);
/// ```
#[must_use]
pub fn extract_svg(text: &str) -> Option<String> {
    let start = text.find("<svg")?;
    let end = start + text[start..].find("</svg>")? + "</svg>".len();
    Some(text[start..end].to_string())
}

/// Splits a reply into one suggestion per line.
///
/// Bullets (`-`, `*`, `•`) and list numbering (`1.`, `2)`) are stripped.
/// When any line carries such a marker, lines before the first one are
/// preamble and dropped. Headings (lines ending in `:`), blank lines and
/// duplicates are dropped too.
///
/// ```
/// use tasklists_assistant::parse_suggestions;
///
/// let reply = "Sure! Here are some ideas:\n1. Buy sunscreen\n2. Pack a hat";
/// assert_eq!(parse_suggestions(reply), ["Buy sunscreen", "Pack a hat"]);
/// ```
#[must_use]
pub fn parse_suggestions(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|line| !line.is_empty()).collect();
    let first_item = lines
        .iter()
        .position(|line| strip_marker(line).is_some())
        .unwrap_or(0);

    let mut suggestions: Vec<String> = Vec::new();
    for &line in &lines[first_item..] {
        let item = strip_marker(line).unwrap_or(line);
        if item.is_empty() || item.ends_with(':') || suggestions.iter().any(|seen| seen == item) {
            continue;
        }
        suggestions.push(item.to_string());
        if suggestions.len() == MAX_SUGGESTIONS {
            break;
        }
    }
    suggestions
}

/// The text after a bullet or list number, if `line` starts with one.
fn strip_marker(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix(['-', '*', '•']) {
        return Some(rest.trim_start_matches(['-', '*', '•']).trim());
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix(['.', ')']).map(str::trim)
}

/// [`IconGenerator`] and [`TaskSuggester`] backed by Claude.
#[derive(Clone, Debug)]
pub struct ClaudeAssistant {
    client: AnthropicClient,
    model: String,
    max_tokens: u32,
}

impl ClaudeAssistant {
    /// Wraps a client, using the default model.
    #[must_use]
    pub fn new(client: AnthropicClient) -> Self {
        Self {
            client,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
        }
    }

    /// Builder: Set model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder: Set max tokens
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    async fn ask(&self, system: &str, prompt: String) -> Result<String, AssistantError> {
        let request = MessagesRequest::single_turn(self.model.as_str(), self.max_tokens, system, prompt);
        let response = self.client.messages(request).await?;
        tracing::debug!(
            id = %response.id,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Claude replied"
        );
        if response.truncated() {
            tracing::warn!(max_tokens = self.max_tokens, "Claude reply hit the token cap");
        }
        Ok(response.text())
    }
}

impl IconGenerator for ClaudeAssistant {
    fn generate_icon<'a>(&'a self, topic: &'a str) -> BoxFuture<'a, Result<Icon, AssistantError>> {
        Box::pin(async move {
            let reply = self.ask(ICON_SYSTEM, icon_prompt(topic)).await?;
            let svg = extract_svg(&reply).ok_or_else(|| {
                AssistantError::InvalidResponse("reply contains no <svg> element".to_string())
            })?;
            tracing::debug!(topic, bytes = svg.len(), "Generated list icon");
            Ok(Icon::new(svg))
        })
    }
}

impl TaskSuggester for ClaudeAssistant {
    fn suggest_tasks<'a>(
        &'a self,
        existing: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<String>, AssistantError>> {
        Box::pin(async move {
            let reply = self.ask(SUGGEST_SYSTEM, suggest_prompt(existing)).await?;
            let suggestions = parse_suggestions(&reply);
            tracing::debug!(count = suggestions.len(), "Received task suggestions");
            Ok(suggestions)
        })
    }
}

/// Stand-in used when no API key is configured: every request fails with
/// [`AssistantError::Unavailable`], which sends callers down their
/// fallback paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineAssistant;

impl IconGenerator for OfflineAssistant {
    fn generate_icon<'a>(&'a self, _topic: &'a str) -> BoxFuture<'a, Result<Icon, AssistantError>> {
        Box::pin(future::ready(Err(AssistantError::Unavailable(
            "no API key configured".to_string(),
        ))))
    }
}

impl TaskSuggester for OfflineAssistant {
    fn suggest_tasks<'a>(
        &'a self,
        _existing: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<String>, AssistantError>> {
        Box::pin(future::ready(Err(AssistantError::Unavailable(
            "no API key configured".to_string(),
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svg_needs_a_closing_tag() {
        assert_eq!(extract_svg("<svg viewBox=\"0 0 24 24\">"), None);
    }

    #[test]
    fn svg_takes_the_first_element() {
        let text = "<svg>a</svg> and <svg>b</svg>";
        assert_eq!(extract_svg(text).as_deref(), Some("<svg>a</svg>"));
    }

    #[test]
    fn suggestions_strip_bullets_and_numbers() {
        let reply = "Here you go:\n\n- Pack sunscreen\n2. Book hotel\n3) Renew passport\n* Pack sunscreen\n";
        assert_eq!(parse_suggestions(reply), ["Pack sunscreen", "Book hotel", "Renew passport"]);
    }

    #[test]
    fn suggestion_preamble_and_headings_are_dropped() {
        let reply = "Great list! A few more to consider.\n\nTravel:\n- Buy adapters\nAt home:\n- Water plants\n";
        assert_eq!(parse_suggestions(reply), ["Buy adapters", "Water plants"]);
    }

    #[test]
    fn unmarked_replies_keep_every_line() {
        let reply = "Suggested Tasks:\nBuy adapters\nWater plants\n";
        assert_eq!(parse_suggestions(reply), ["Buy adapters", "Water plants"]);
    }

    #[test]
    fn suggestions_are_capped() {
        let reply: String = (0..20).map(|n| format!("Task {n}\n")).collect();
        assert_eq!(parse_suggestions(&reply).len(), MAX_SUGGESTIONS);
    }

    #[test]
    fn suggest_prompt_lists_every_task() {
        let prompt = suggest_prompt(&["Buy tickets".to_string(), "Pack".to_string()]);
        assert!(prompt.contains("- Buy tickets\n- Pack\n"));
    }

    #[test]
    fn icon_prompt_names_the_topic() {
        assert!(icon_prompt("Groceries").contains("\"Groceries\""));
    }
}
