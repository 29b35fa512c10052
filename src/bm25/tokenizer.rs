//! Tokenizer: lowercase, split on non-alphanumeric boundaries.
//!
//! No stemming and no stop-word list; linguistic analysis is out of scope.
//! Uses a single lowercased buffer with byte spans so tokenizing allocates
//! once regardless of token count.

/// Tokenized text: owns the lowercased buffer, exposes `&str` slices via
/// byte spans.
pub struct Tokens {
    buffer: String,
    spans: Vec<(u32, u32)>,
}

impl Tokens {
    /// Iterates over the token slices in order of appearance.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.spans
            .iter()
            .map(|&(s, e)| &self.buffer[s as usize..e as usize])
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether no tokens were produced.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Splits `text` into lowercased alphanumeric runs.
pub fn tokenize(text: &str) -> Tokens {
    let buffer = text.to_lowercase();
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in buffer.char_indices() {
        if c.is_alphanumeric() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            spans.push((s as u32, i as u32));
        }
    }
    if let Some(s) = start {
        spans.push((s as u32, buffer.len() as u32));
    }

    Tokens { buffer, spans }
}
