/// Variety pass: finishing transforms applied to composed text.
///
/// Normalises whitespace, capitalises sentence starts and trims the text
/// to its character budget without ever cutting a word in half.

/// The finishing pass applied to every segment before it is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarietyPass {
    budget: usize,
}

impl VarietyPass {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    /// Join fragments into finished segment text.
    pub fn apply(&self, fragments: &[String]) -> String {
        let joined = fragments
            .iter()
            .flat_map(|f| f.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ");
        trim_to_budget(&capitalize_sentences(&joined), self.budget)
    }
}

/// Uppercase the first letter of the text and of every sentence in it.
pub fn capitalize_sentences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_sentence_start = true;
    for c in text.chars() {
        if at_sentence_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            at_sentence_start = false;
            continue;
        }
        if matches!(c, '.' | '!' | '?') {
            at_sentence_start = true;
        } else if !c.is_whitespace() && c != '"' && c != '\'' {
            at_sentence_start = false;
        }
        out.push(c);
    }
    out
}

/// Cut `text` to at most `budget` characters at the nearest preceding word
/// boundary. A single word longer than the budget is kept whole.
pub fn trim_to_budget(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }

    let mut kept = String::new();
    let mut kept_chars = 0;
    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        let needed = if kept.is_empty() { word_chars } else { kept_chars + 1 + word_chars };
        if needed > budget {
            if kept.is_empty() {
                kept.push_str(word);
            }
            break;
        }
        if !kept.is_empty() {
            kept.push(' ');
        }
        kept.push_str(word);
        kept_chars = needed;
    }

    kept.trim_end_matches([',', ';', ':']).to_string()
}
