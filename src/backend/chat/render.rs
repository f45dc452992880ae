/**
 * Rendering Collaborator
 *
 * The router never formats outbound fragments itself: it fills a parameter
 * map and asks a `Renderer` for the text. Rendering is a pure function
 * owned outside the core; the plain implementation here produces compact
 * line-oriented fragments and is what the server binary and the tests use.
 */
use std::collections::HashMap;

/// Parameters handed to the renderer for one fragment
pub type RenderParams = HashMap<&'static str, String>;

/// The closed set of fragment templates the router requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// User-list entry for the currently viewed peer
    UserEntryActive,
    /// User-list entry for any other user, with unread badge
    UserEntryPassive,
    /// A message authored by the receiving session's own user
    MessageSelf,
    /// A message authored by someone else
    MessageOther,
}

/// Pure fragment rendering
pub trait Renderer: Send + Sync {
    fn render(&self, template: Template, params: &RenderParams) -> String;
}

/// Line-oriented renderer with no markup
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainRenderer;

impl PlainRenderer {
    pub fn new() -> Self {
        Self
    }
}

fn param<'a>(params: &'a RenderParams, key: &str) -> &'a str {
    params.get(key).map(String::as_str).unwrap_or("")
}

impl Renderer for PlainRenderer {
    fn render(&self, template: Template, params: &RenderParams) -> String {
        match template {
            Template::UserEntryActive => {
                format!("> {}\n", param(params, "name"))
            }
            Template::UserEntryPassive => {
                let count = param(params, "count");
                if count.is_empty() {
                    format!("  {} ({})\n", param(params, "name"), param(params, "username"))
                } else {
                    format!(
                        "  {} ({}) [{}]\n",
                        param(params, "name"),
                        param(params, "username"),
                        count
                    )
                }
            }
            Template::MessageSelf => format!(
                "[{} {}] me: {}{}\n",
                param(params, "id"),
                param(params, "date_str"),
                param(params, "body"),
                attachment_suffix(params),
            ),
            Template::MessageOther => format!(
                "[{} {}] {}: {}{}\n",
                param(params, "id"),
                param(params, "date_str"),
                param(params, "title"),
                param(params, "body"),
                attachment_suffix(params),
            ),
        }
    }
}

fn attachment_suffix(params: &RenderParams) -> String {
    match params.get("attachment") {
        Some(attachment) => format!(" <file:{attachment}>"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&'static str, &str)]) -> RenderParams {
        pairs
            .iter()
            .map(|(k, v)| (*k, v.to_string()))
            .collect()
    }

    #[test]
    fn test_active_entry() {
        let out = PlainRenderer.render(
            Template::UserEntryActive,
            &params(&[("name", "Broadcast ")]),
        );
        assert_eq!(out, "> Broadcast \n");
    }

    #[test]
    fn test_passive_entry_hides_zero_count() {
        let out = PlainRenderer.render(
            Template::UserEntryPassive,
            &params(&[("name", "Alice Smith"), ("username", "alice"), ("count", "")]),
        );
        assert_eq!(out, "  Alice Smith (alice)\n");
    }

    #[test]
    fn test_passive_entry_shows_count() {
        let out = PlainRenderer.render(
            Template::UserEntryPassive,
            &params(&[("name", "Alice Smith"), ("username", "alice"), ("count", "3")]),
        );
        assert!(out.contains("[3]"));
    }

    #[test]
    fn test_message_other_carries_title() {
        let out = PlainRenderer.render(
            Template::MessageOther,
            &params(&[
                ("id", "42"),
                ("date_str", "2024-01-01 10:00"),
                ("title", "Alice Smith"),
                ("body", "hello"),
            ]),
        );
        assert!(out.contains("Alice Smith: hello"));
    }

    #[test]
    fn test_file_message_suffix() {
        let out = PlainRenderer.render(
            Template::MessageSelf,
            &params(&[("body", "notes.txt (2 KiB)"), ("attachment", "abc")]),
        );
        assert!(out.contains("<file:abc>"));
    }
}
