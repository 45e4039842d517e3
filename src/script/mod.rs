//! Recitation script navigation
//!
//! The text a user reads aloud, structured as paragraphs of sentences with
//! a cursor that walks it one sentence at a time. The cursor's current
//! sentence is what callers hand to the text segment uploader.

/// One paragraph of the script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    sentences: Vec<String>,
}

impl Paragraph {
    pub fn new(sentences: Vec<String>) -> Self {
        Self { sentences }
    }

    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }
}

/// Position of the cursor within a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptPosition {
    pub paragraph: usize,
    pub sentence: usize,
}

/// A script to be recited, as paragraphs of sentences.
///
/// Empty paragraphs are discarded on construction so every position a
/// cursor can reach names a real sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDocument {
    paragraphs: Vec<Paragraph>,
}

impl ScriptDocument {
    pub fn new(paragraphs: Vec<Paragraph>) -> Self {
        Self {
            paragraphs: paragraphs
                .into_iter()
                .filter(|p| !p.sentences.is_empty())
                .collect(),
        }
    }

    /// Build a script from plain text: paragraphs are separated by blank
    /// lines, sentences end at `.`, `!` or `?`.
    pub fn from_text(text: &str) -> Self {
        let paragraphs = text
            .split("\n\n")
            .map(|block| Paragraph::new(split_sentences(block)))
            .collect();
        Self::new(paragraphs)
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    /// Total number of sentence positions in the script.
    pub fn sentence_count(&self) -> usize {
        self.paragraphs.iter().map(|p| p.sentences.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    /// Cursor positioned at the first sentence.
    pub fn cursor(&self) -> ScriptCursor<'_> {
        ScriptCursor {
            document: self,
            position: ScriptPosition {
                paragraph: 0,
                sentence: 0,
            },
        }
    }
}

fn split_sentences(block: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in block.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Sentence-by-sentence cursor over a script.
///
/// `advance` refuses to move past the last sentence and `retreat` refuses
/// to move before the first; both report whether they moved.
#[derive(Debug, Clone)]
pub struct ScriptCursor<'a> {
    document: &'a ScriptDocument,
    position: ScriptPosition,
}

impl<'a> ScriptCursor<'a> {
    /// The sentence under the cursor; `None` only for an empty script.
    pub fn current(&self) -> Option<&'a str> {
        self.document
            .paragraphs
            .get(self.position.paragraph)?
            .sentences
            .get(self.position.sentence)
            .map(String::as_str)
    }

    pub fn position(&self) -> ScriptPosition {
        self.position
    }

    /// Move to the next sentence. Returns false at the end of the script.
    pub fn advance(&mut self) -> bool {
        let Some(paragraph) = self.document.paragraphs.get(self.position.paragraph) else {
            return false;
        };

        if self.position.sentence + 1 < paragraph.sentences.len() {
            self.position.sentence += 1;
            true
        } else if self.position.paragraph + 1 < self.document.paragraphs.len() {
            self.position.paragraph += 1;
            self.position.sentence = 0;
            true
        } else {
            false
        }
    }

    /// Move to the previous sentence. Returns false at the start.
    pub fn retreat(&mut self) -> bool {
        if self.position.sentence > 0 {
            self.position.sentence -= 1;
            true
        } else if self.position.paragraph > 0 {
            self.position.paragraph -= 1;
            self.position.sentence = self.document.paragraphs[self.position.paragraph]
                .sentences
                .len()
                .saturating_sub(1);
            true
        } else {
            false
        }
    }
}
