use std::collections::BTreeMap;

/// One parsed markup element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepNode {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<StepNode>,
    /// Concatenated, decoded character data directly inside this element.
    pub text: String,
    /// 1-based line of the opening tag.
    pub line: usize,
}

impl StepNode {
    pub fn new(tag: impl Into<String>, line: usize) -> Self {
        Self {
            tag: tag.into(),
            line,
            ..Self::default()
        }
    }

    /// Attribute lookup, ignoring ASCII case of the name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }
}
