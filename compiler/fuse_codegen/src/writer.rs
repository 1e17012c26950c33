//! Buffered output with indentation tracking.
//!
//! Indentation is inserted lazily when the first text of a line is written,
//! so callers can build a line from many small pieces and only decide at the
//! end whether to break it.

use std::collections::BTreeSet;

const INDENT: &str = "    ";

/// Text sink shared by every backend.
#[derive(Debug, Default)]
pub struct CodeWriter {
    /// Current indentation level.
    indent: usize,
    /// Generated text.
    output: String,
    /// Whether nothing has been written on the current line yet.
    at_line_start: bool,
    /// Headers or modules the current artifact needs.
    includes: BTreeSet<String>,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self {
            indent: 0,
            output: String::with_capacity(4096),
            at_line_start: true,
            includes: BTreeSet::new(),
        }
    }

    /// Increase indentation level.
    pub fn indent(&mut self) {
        self.indent += 1;
    }

    /// Decrease indentation level.
    pub fn dedent(&mut self) {
        debug_assert!(self.indent > 0, "dedent called with zero indent");
        self.indent = self.indent.saturating_sub(1);
    }

    /// Append text, indenting first if this starts a line.
    pub fn write(&mut self, s: &str) {
        let mut lines = s.split('\n');
        if let Some(first) = lines.next() {
            self.write_fragment(first);
        }
        for line in lines {
            self.newline();
            self.write_fragment(line);
        }
    }

    fn write_fragment(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if self.at_line_start {
            for _ in 0..self.indent {
                self.output.push_str(INDENT);
            }
            self.at_line_start = false;
        }
        self.output.push_str(s);
    }

    pub fn write_char(&mut self, c: char) {
        let mut buf = [0; 4];
        self.write(c.encode_utf8(&mut buf));
    }

    /// Append text and end the line.
    pub fn writeln(&mut self, s: &str) {
        self.write(s);
        self.newline();
    }

    /// End the current line.
    pub fn newline(&mut self) {
        self.output.push('\n');
        self.at_line_start = true;
    }

    /// `{`, end of line, one level deeper.
    pub fn open_block(&mut self) {
        self.writeln("{");
        self.indent();
    }

    /// One level shallower, `}` on its own line.
    pub fn close_block(&mut self) {
        self.dedent();
        self.writeln("}");
    }

    /// Record a header or module the artifact depends on.
    pub fn include(&mut self, name: &str) {
        if !self.includes.contains(name) {
            self.includes.insert(name.to_string());
        }
    }

    pub fn includes(&self) -> &BTreeSet<String> {
        &self.includes
    }

    /// Take the include set, leaving it empty.
    pub fn take_includes(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.includes)
    }

    /// Number of bytes generated so far.
    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// Take the generated output.
    pub fn take_output(&mut self) -> String {
        self.at_line_start = true;
        std::mem::take(&mut self.output)
    }
}

/// Body of a C string literal, without the quotes.
pub fn escape_c(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        push_c_escaped(&mut result, c, '"');
    }
    result
}

/// `"..."` in C syntax.
pub fn c_string_literal(s: &str) -> String {
    format!("\"{}\"", escape_c(s))
}

/// `'c'` in C syntax.
pub fn c_char_literal(c: char) -> String {
    let mut result = String::from("'");
    push_c_escaped(&mut result, c, '\'');
    result.push('\'');
    result
}

fn push_c_escaped(out: &mut String, c: char, quote: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\\' => out.push_str("\\\\"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        // Octal escapes stop after three digits, hex escapes do not.
        c if c.is_ascii_control() => out.push_str(&format!("\\{:03o}", u32::from(c))),
        c => out.push(c),
    }
}

/// Body of a Python string literal, without the quotes.
pub fn escape_py(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        push_py_escaped(&mut result, c);
    }
    result
}

/// `"..."` in Python syntax.
pub fn py_string_literal(s: &str) -> String {
    format!("\"{}\"", escape_py(s))
}

pub(crate) fn push_py_escaped(out: &mut String, c: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\\' => out.push_str("\\\\"),
        '"' => out.push_str("\\\""),
        c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", u32::from(c))),
        c => out.push(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn indent_is_lazy() {
        let mut out = CodeWriter::new();
        out.writeln("line1");
        out.indent();
        out.write("a");
        out.write(" + b");
        out.newline();
        out.newline();
        out.indent();
        out.writeln("line3");
        out.dedent();
        out.dedent();
        out.writeln("line4");
        assert_eq!(out.take_output(), "line1\n    a + b\n\n        line3\nline4\n");
    }

    #[test]
    fn blocks_indent_their_body() {
        let mut out = CodeWriter::new();
        out.write("if (x) ");
        out.open_block();
        out.writeln("y();");
        out.close_block();
        assert_eq!(out.take_output(), "if (x) {\n    y();\n}\n");
    }

    #[test]
    fn embedded_newlines_are_indented() {
        let mut out = CodeWriter::new();
        out.indent();
        out.write("a\nb\n");
        assert_eq!(out.take_output(), "    a\n    b\n");
    }

    #[test]
    fn includes_are_sorted_and_unique() {
        let mut out = CodeWriter::new();
        out.include("string.h");
        out.include("stdlib.h");
        out.include("string.h");
        let includes: Vec<_> = out.take_includes().into_iter().collect();
        assert_eq!(includes, vec!["stdlib.h", "string.h"]);
        assert!(out.includes().is_empty());
    }

    #[test]
    fn c_escapes() {
        assert_eq!(c_string_literal("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(escape_c("\u{1}7"), "\\0017");
        assert_eq!(c_char_literal('\''), "'\\''");
        assert_eq!(c_char_literal('"'), "'\"'");
    }

    #[test]
    fn py_escapes() {
        assert_eq!(py_string_literal("tab\there"), "\"tab\\there\"");
        assert_eq!(escape_py("\u{7f}"), "\\x7f");
    }

    proptest! {
        #[test]
        fn escaped_c_has_no_raw_controls_or_quotes(s in ".*") {
            let escaped = escape_c(&s);
            prop_assert!(!escaped.chars().any(|c| c.is_ascii_control()));
            let mut backslashes = 0;
            for c in escaped.chars() {
                if c == '"' {
                    prop_assert!(backslashes % 2 == 1);
                }
                backslashes = if c == '\\' { backslashes + 1 } else { 0 };
            }
        }

        #[test]
        fn escaped_py_has_no_raw_controls(s in ".*") {
            prop_assert!(!escape_py(&s).chars().any(|c| c.is_ascii_control()));
        }
    }
}
