//! Built-in agent tools.
//!
//! The tool set is a fixed, closed registry: tool names requested by an
//! agent definition resolve to `ToolKind` variants at handle construction,
//! and unresolvable names are dropped. Dispatch is over the enum, not trait
//! objects, so the full capability set is visible in one place.

use std::path::Path;

/// A named capability an agent can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    WebSearch,
    Calculator,
    FileReader,
}

impl ToolKind {
    /// All registered tools.
    pub const ALL: [ToolKind; 3] = [
        ToolKind::WebSearch,
        ToolKind::Calculator,
        ToolKind::FileReader,
    ];

    /// Resolve a tool name from an agent definition.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "web_search" => Some(Self::WebSearch),
            "calculator" => Some(Self::Calculator),
            "file_reader" => Some(Self::FileReader),
            _ => None,
        }
    }

    /// The unique name of this tool.
    pub fn name(&self) -> &'static str {
        match self {
            Self::WebSearch => "web_search",
            Self::Calculator => "calculator",
            Self::FileReader => "file_reader",
        }
    }

    /// A description of what this tool does.
    pub fn description(&self) -> &'static str {
        match self {
            Self::WebSearch => "Search the web for a query and summarize the results",
            Self::Calculator => "Evaluate a basic arithmetic expression",
            Self::FileReader => "Read the contents of a file by path",
        }
    }

    /// Execute the tool against a single text input.
    pub fn run(&self, input: &str) -> String {
        match self {
            Self::WebSearch => format!("Web search results for: {}", input),
            Self::Calculator => match evaluate(input) {
                Some(result) => format_number(result),
                None => "Invalid mathematical expression".to_string(),
            },
            Self::FileReader => match std::fs::read_to_string(Path::new(input.trim())) {
                Ok(contents) => contents,
                Err(_) => "File not found or cannot be read".to_string(),
            },
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Resolve a list of requested tool names, dropping anything unknown.
pub fn resolve_tools(names: &[String]) -> Vec<ToolKind> {
    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        match ToolKind::from_name(name) {
            Some(tool) => resolved.push(tool),
            None => tracing::debug!("Dropping unknown tool name: {}", name),
        }
    }
    resolved
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Evaluate `+ - * /` expressions with parentheses and unary minus.
fn evaluate(input: &str) -> Option<f64> {
    let tokens: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expression()?;
    if parser.pos == parser.tokens.len() {
        Some(value)
    } else {
        None
    }
}

struct Parser {
    tokens: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expression(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                '+' => {
                    self.bump();
                    value += self.term()?;
                }
                '-' => {
                    self.bump();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn term(&mut self) -> Option<f64> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                '*' => {
                    self.bump();
                    value *= self.factor()?;
                }
                '/' => {
                    self.bump();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return None;
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn factor(&mut self) -> Option<f64> {
        match self.peek()? {
            '-' => {
                self.bump();
                Some(-self.factor()?)
            }
            '(' => {
                self.bump();
                let value = self.expression()?;
                if self.bump()? != ')' {
                    return None;
                }
                Some(value)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                    self.bump();
                }
                let text: String = self.tokens[start..self.pos].iter().collect();
                text.parse().ok()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_names_and_drops_unknown() {
        let names = vec![
            "calculator".to_string(),
            "teleport".to_string(),
            "web_search".to_string(),
        ];
        let resolved = resolve_tools(&names);
        assert_eq!(resolved, vec![ToolKind::Calculator, ToolKind::WebSearch]);
    }

    #[test]
    fn name_round_trip() {
        for tool in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(tool.name()), Some(tool));
        }
    }

    #[test]
    fn calculator_evaluates_arithmetic() {
        let calc = ToolKind::Calculator;
        assert_eq!(calc.run("2 + 3 * 4"), "14");
        assert_eq!(calc.run("(2 + 3) * 4"), "20");
        assert_eq!(calc.run("-5 + 2"), "-3");
        assert_eq!(calc.run("7 / 2"), "3.5");
        assert_eq!(calc.run("1 / 0"), "Invalid mathematical expression");
        assert_eq!(calc.run("two plus two"), "Invalid mathematical expression");
        assert_eq!(calc.run("1 + "), "Invalid mathematical expression");
    }

    #[test]
    fn file_reader_reads_and_reports_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "hello").unwrap();

        let reader = ToolKind::FileReader;
        assert_eq!(reader.run(path.to_str().unwrap()), "hello");
        assert_eq!(
            reader.run("/no/such/file"),
            "File not found or cannot be read"
        );
    }
}
