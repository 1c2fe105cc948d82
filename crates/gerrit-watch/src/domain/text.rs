//! Column truncation and keyword highlighting for free text.

/// Character budget of the subject column.
pub const SUBJECT_WIDTH: usize = 60;

/// Character budget of the comment column.
pub const COMMENT_WIDTH: usize = 50;

const ELLIPSIS: &str = "...";

const POSITIVE_WORDS: [&str; 3] = ["succeeded", "success", "successful"];
const NEGATIVE_WORDS: [&str; 3] = ["failure", "failed", "fails"];

/// Cut `text` to `budget` characters, appending `...` when anything was dropped.
///
/// The result never exceeds `budget + 3` characters.
pub fn truncate(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        None => text.to_owned(),
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
    }
}

/// Rendering hint for a fragment of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Positive,
    Negative,
}

/// A fragment of highlighted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub text: &'a str,
    pub tone: Tone,
}

fn tone_of(word: &str) -> Tone {
    let lower = word.to_lowercase();
    if POSITIVE_WORDS.contains(&lower.as_str()) {
        Tone::Positive
    } else if NEGATIVE_WORDS.contains(&lower.as_str()) {
        Tone::Negative
    } else {
        Tone::Plain
    }
}

/// Split text on word boundaries and tag the words of the success/failure vocabulary.
///
/// Separators are kept as plain fragments, so concatenating every fragment
/// yields the input unchanged.
pub fn highlight(text: &str) -> Vec<Fragment<'_>> {
    let mut fragments = Vec::new();
    let mut start = 0;
    let mut in_word = false;

    for (idx, ch) in text.char_indices() {
        let is_word = ch.is_alphanumeric() || ch == '_';
        if idx > 0 && is_word != in_word {
            push_fragment(&mut fragments, &text[start..idx], in_word);
            start = idx;
        }
        in_word = is_word;
    }
    if start < text.len() {
        push_fragment(&mut fragments, &text[start..], in_word);
    }
    fragments
}

fn push_fragment<'a>(fragments: &mut Vec<Fragment<'a>>, text: &'a str, is_word: bool) {
    let tone = if is_word { tone_of(text) } else { Tone::Plain };
    fragments.push(Fragment { text, tone });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_within_budget_is_untouched() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("", 0), "");
    }

    #[test]
    fn test_truncate_appends_ellipsis() {
        let out = truncate("a fairly long comment body", 8);
        assert_eq!(out, "a fairly...");
        assert_eq!(out.chars().count(), 11);
    }

    #[test]
    fn test_truncate_never_exceeds_budget_plus_three() {
        let text = "ünïcödé text with multibyte characters ✓✓✓";
        for budget in 0..text.chars().count() + 2 {
            assert!(truncate(text, budget).chars().count() <= budget + 3);
        }
    }

    #[test]
    fn test_failure_is_tagged_negative() {
        let fragments = highlight("failure in build step");
        assert_eq!(
            fragments[0],
            Fragment {
                text: "failure",
                tone: Tone::Negative
            }
        );
        assert!(fragments[1..].iter().all(|f| f.tone == Tone::Plain));
    }

    #[test]
    fn test_highlight_is_case_insensitive_and_lossless() {
        let text = "Build SUCCESSFUL, tests: Failed!";
        let fragments = highlight(text);
        let tones: Vec<_> = fragments
            .iter()
            .filter(|f| f.tone != Tone::Plain)
            .map(|f| (f.text, f.tone))
            .collect();
        assert_eq!(
            tones,
            vec![("SUCCESSFUL", Tone::Positive), ("Failed", Tone::Negative)]
        );
        let rebuilt: String = fragments.iter().map(|f| f.text).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_partial_words_do_not_match() {
        assert!(highlight("successor failures")
            .iter()
            .all(|f| f.tone == Tone::Plain));
    }
}
