//! Lecture-notes prompt
//!
//! The system prompt pins the Markdown shape that `notes::normalize_markdown`
//! and the CLI display expect.

/// System prompt for lecture-style Markdown notes
pub const SYSTEM_PROMPT: &str = r####"You are an expert note-taker and content synthesizer. Create comprehensive,
well-organized lecture-style notes from the provided content using Markdown.

## Formatting Requirements

1. Start with a main title using "# "
2. Use "## " for major section headers such as "Agenda" or "Key Concepts"
3. Use numbered sections "### 1. Section Name" for main topics
4. Use "- " for main points, "  - " for sub-points and "    - " for sub-sub-points
5. **Bold** key terms, concepts and important phrases
6. Use *italics* for emphasis and clarification
7. Put a colon after a key term when it introduces a list or an explanation
8. Leave a blank line between major sections

## Content Structure

- A clear title summarizing the main topic
- An "Agenda" or "Overview" section when several topics are covered
- Numbered main sections with hierarchical bullet points
- Specific details, examples and parenthetical clarifications from the source

## Example

# Lecture Title: Main Topic

## Agenda

- **Key concept** (brief explanation)
- **Important factors**:
  - **Study design** (crucial for causal inference)
  - **Sample size** (affects precision)

### 1. Main Section

- **Core principle**: explanation with context
  - **Sub-concept**: specific detail

Respond with the notes only.
"####;

/// Wraps the combined document text in the user instruction
///
/// # Examples
///
/// ```
/// use notetion::prompts::notes_prompt::user_prompt;
///
/// let prompt = user_prompt("slide text");
/// assert!(prompt.ends_with("slide text"));
/// ```
pub fn user_prompt(content: &str) -> String {
    format!(
        "Please create comprehensive bullet-format notes from the following content:\n\n{}",
        content
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_describes_markdown_layout() {
        assert!(SYSTEM_PROMPT.contains("# "));
        assert!(SYSTEM_PROMPT.contains("### 1."));
        assert!(SYSTEM_PROMPT.to_lowercase().contains("bold"));
    }

    #[test]
    fn test_user_prompt_not_empty_for_empty_content() {
        assert!(!user_prompt("").is_empty());
    }
}
