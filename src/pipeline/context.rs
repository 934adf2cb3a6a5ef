//! Running context for the Refine strategy.
//!
//! Each chunk's request carries the summaries of the chunks before it, so
//! the model keeps terminology and numbering consistent. The context only
//! ever holds the most recent `max_chars` characters; older material falls
//! off the front, starting at a line boundary when one is available.

/// Tail-bounded accumulation of previous summary fragments.
#[derive(Debug, Clone, Default)]
pub struct RunningContext {
    max_chars: usize,
    text: String,
}

impl RunningContext {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            text: String::new(),
        }
    }

    /// Append a fragment, then trim from the front to stay within bounds.
    pub fn push(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() || self.max_chars == 0 {
            return;
        }
        if !self.text.is_empty() {
            self.text.push_str("\n\n");
        }
        self.text.push_str(fragment);

        let len = self.text.chars().count();
        if len <= self.max_chars {
            return;
        }
        let drop = len - self.max_chars;
        let Some((cut, _)) = self.text.char_indices().nth(drop) else {
            self.text.clear();
            return;
        };
        let mut tail = &self.text[cut..];
        // Start on a fresh line unless that would throw everything away.
        if let Some(nl) = tail.find('\n') {
            if !tail[nl + 1..].trim().is_empty() {
                tail = &tail[nl + 1..];
            }
        }
        self.text = tail.trim_start().to_string();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// The context to attach to the next request, if there is any.
    pub fn current(&self) -> Option<String> {
        (!self.text.is_empty()).then(|| self.text.clone())
    }
}
