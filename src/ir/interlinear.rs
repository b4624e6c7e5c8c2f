//! Interlinear lines - one reference, N named token layers

use super::parallel::AlignedUnit;
use crate::reference::Ref;
use serde::{Deserialize, Serialize};

/// One named layer (source text, transliteration, gloss, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlinearLayer {
    pub name: String,
    pub tokens: Vec<String>,
}

/// A per-reference line. Layers need not have equal token counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlinearLine {
    #[serde(rename = "ref")]
    pub reference: Ref,
    pub layers: Vec<InterlinearLayer>,
}

impl InterlinearLine {
    pub fn new(reference: Ref) -> Self {
        Self {
            reference,
            layers: Vec::new(),
        }
    }

    pub fn with_layer(mut self, name: impl Into<String>, tokens: Vec<String>) -> Self {
        self.layers.push(InterlinearLayer {
            name: name.into(),
            tokens,
        });
        self
    }

    /// Build a line from an aligned unit, one whitespace-tokenized layer per
    /// corpus in `layer_order`. Corpora without text become empty layers.
    pub fn from_aligned_unit(unit: &AlignedUnit, layer_order: &[&str]) -> Self {
        layer_order.iter().fold(Self::new(unit.reference.clone()), |line, corpus_id| {
            let tokens = unit
                .text(corpus_id)
                .map(|t| t.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            line.with_layer(*corpus_id, tokens)
        })
    }

    pub fn layer(&self, name: &str) -> Option<&InterlinearLayer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Token at `index` in every layer; `None` where a layer is shorter
    pub fn column(&self, index: usize) -> Vec<Option<&str>> {
        self.layers
            .iter()
            .map(|l| l.tokens.get(index).map(String::as_str))
            .collect()
    }

    /// Token count of the longest layer
    pub fn width(&self) -> usize {
        self.layers.iter().map(|l| l.tokens.len()).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_uneven_layers() {
        let line = InterlinearLine::new(Ref::verse("John", 1, 1))
            .with_layer("greek", tokens("Ἐν ἀρχῇ ἦν ὁ λόγος"))
            .with_layer("translit", tokens("en archē ēn ho logos"))
            .with_layer("gloss", tokens("in beginning was the word"))
            .with_layer("english", tokens("In the beginning was the Word"));

        assert_eq!(line.width(), 6);
        assert_eq!(line.layer("translit").unwrap().tokens[1], "archē");
        assert_eq!(line.column(5), vec![None, None, None, Some("Word")]);
        assert_eq!(line.column(0)[0], Some("Ἐν"));
    }

    #[test]
    fn test_from_aligned_unit() {
        let unit = AlignedUnit::new(Ref::verse("Gen", 1, 1))
            .with_text("LXX", "En archē epoiēsen")
            .with_text("KJV", "In the beginning");
        let line = InterlinearLine::from_aligned_unit(&unit, &["LXX", "KJV", "VUL"]);

        assert_eq!(line.layers.len(), 3);
        assert_eq!(line.layer("LXX").unwrap().tokens.len(), 3);
        assert!(line.layer("VUL").unwrap().tokens.is_empty());
        assert_eq!(line.width(), 3);
    }
}
