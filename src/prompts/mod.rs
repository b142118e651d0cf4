//! Prompts for note generation
//!
//! This module builds the system prompt that fixes the note format, the user
//! prompt wrapping the combined document text, and the combined text itself.

pub mod notes_prompt;

use crate::providers::Message;

/// Width of the `=` banner placed around each file name
pub const BANNER_WIDTH: usize = 50;

/// Concatenates normalized texts with a banner per file
///
/// Each section is `\n=====\nFILE: <name>\n=====\n<text>\n`, in input order.
///
/// # Examples
///
/// ```
/// use notetion::prompts::combine_documents;
///
/// let combined = combine_documents([("a.txt", "alpha")]);
/// assert!(combined.contains("FILE: a.txt"));
/// assert!(combined.ends_with("alpha\n"));
/// ```
pub fn combine_documents<'a, I>(documents: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let banner = "=".repeat(BANNER_WIDTH);
    let mut combined = String::new();
    for (name, text) in documents {
        combined.push('\n');
        combined.push_str(&banner);
        combined.push_str("\nFILE: ");
        combined.push_str(name);
        combined.push('\n');
        combined.push_str(&banner);
        combined.push('\n');
        combined.push_str(text);
        combined.push('\n');
    }
    combined
}

/// Builds the message list sent to the provider for one session
///
/// # Examples
///
/// ```
/// use notetion::prompts::build_messages;
///
/// let messages = build_messages("FILE: lecture.txt\n...");
/// assert_eq!(messages.len(), 2);
/// assert_eq!(messages[0].role, "system");
/// ```
pub fn build_messages(prompt_text: &str) -> Vec<Message> {
    vec![
        Message::system(notes_prompt::SYSTEM_PROMPT),
        Message::user(notes_prompt::user_prompt(prompt_text)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_documents_preserves_order() {
        let combined = combine_documents([("one.txt", "first"), ("two.json", "second")]);
        let first = combined.find("FILE: one.txt").unwrap();
        let second = combined.find("FILE: two.json").unwrap();
        assert!(first < second);
        assert_eq!(combined.matches(&"=".repeat(BANNER_WIDTH)).count(), 4);
    }

    #[test]
    fn test_combine_documents_empty() {
        assert_eq!(combine_documents(std::iter::empty()), "");
    }

    #[test]
    fn test_build_messages_embeds_content() {
        let messages = build_messages("the lecture body");
        assert!(messages[1].content.contains("the lecture body"));
        assert_eq!(messages[1].role, "user");
    }
}
