/* Nested line structure: the output format handed back to callers */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    Nested(Lines),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lines(Vec<Line>);

impl Lines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl Into<String>) {
        self.0.push(Line::Text(text.into()));
    }

    pub fn nest(&mut self, block: Lines) {
        self.0.push(Line::Nested(block));
    }

    pub fn append(&mut self, other: Lines) {
        self.0.extend(other.0);
    }

    pub fn blank(&mut self) {
        self.line("");
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Line> {
        self.0.iter()
    }

    /// All text lines, depth-first, without indentation.
    pub fn flatten(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.walk(0, &mut |_, text| out.push(text.to_string()));
        out
    }

    /// Renders with `indent` repeated once per nesting level. Empty lines
    /// carry no indentation.
    pub fn render(&self, indent: &str) -> String {
        let mut out = String::new();
        self.walk(0, &mut |depth, text| {
            if !text.is_empty() {
                for _ in 0..depth {
                    out.push_str(indent);
                }
                out.push_str(text);
            }
            out.push('\n');
        });
        out
    }

    fn walk(&self, depth: usize, f: &mut dyn FnMut(usize, &str)) {
        for line in &self.0 {
            match line {
                Line::Text(text) => f(depth, text),
                Line::Nested(inner) => inner.walk(depth + 1, f),
            }
        }
    }
}
