//! Rendering error reports for the terminal.

use ppload_source::LineSource;

use crate::error::{PreprocessError, SourceError};
use crate::report::{ErrorReport, ReportedError};

/// Trait for rendering error reports into formatted output strings.
pub trait ReportRenderer {
    /// Renders a single report, resolving frame lines through `lines`.
    fn render(&self, report: &ErrorReport, lines: &dyn LineSource) -> String;
}

/// Renders reports in a traceback-style terminal format.
///
/// Produces output like:
/// ```text
/// Traceback (most recent call last):
///   File "/app/main.ppy", line 3, in <module>
///     print('1' + 1)
/// error: unsupported operand types
/// ```
///
/// Source errors print their location and offending line with a caret, and
/// internal failures are prefixed with an `Internal error:` banner.
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn label(&self, text: &str) -> String {
        if self.color {
            format!("\x1b[1;31m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn render_source_error(&self, out: &mut String, err: &SourceError) {
        out.push_str(&format!(
            "  File \"{}\", line {}\n",
            err.path.display(),
            err.line
        ));
        if let Some(text) = &err.text {
            let trimmed = text.trim_start();
            let indent = text.len() - trimmed.len();
            out.push_str(&format!("    {trimmed}\n"));
            let caret_col = (err.column as usize).saturating_sub(1).saturating_sub(indent);
            out.push_str(&format!("    {}^\n", " ".repeat(caret_col)));
        }
    }
}

impl ReportRenderer for TerminalRenderer {
    fn render(&self, report: &ErrorReport, lines: &dyn LineSource) -> String {
        let mut out = String::new();

        if report.internal {
            out.push_str(&self.label("Internal error:"));
            out.push('\n');
        }

        if !report.frames.is_empty() {
            out.push_str("Traceback (most recent call last):\n");
            for frame in &report.frames {
                out.push_str(&format!(
                    "  File \"{}\", line {}, in {}\n",
                    frame.file.display(),
                    frame.line,
                    frame.function
                ));
                if let Some(text) = lines.line(&frame.file, frame.line) {
                    out.push_str(&format!("    {}\n", text.trim()));
                }
            }
        }

        let message = match &report.error {
            ReportedError::Syntax(err) | ReportedError::Preprocess(PreprocessError::Source(err)) => {
                self.render_source_error(&mut out, err);
                err.message.clone()
            }
            ReportedError::Preprocess(err) => err.to_string(),
            ReportedError::Runtime { message } | ReportedError::Internal { message } => {
                message.clone()
            }
        };
        out.push_str(&format!("{}: {message}\n", self.label("error")));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Frame;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    struct MapLines(HashMap<(PathBuf, u32), String>);

    impl LineSource for MapLines {
        fn line(&self, path: &Path, line: u32) -> Option<String> {
            self.0.get(&(path.to_path_buf(), line)).cloned()
        }
    }

    fn no_lines() -> MapLines {
        MapLines(HashMap::new())
    }

    #[test]
    fn render_syntax_error() {
        let err = SourceError::new("invalid syntax", "/app/syntax_error.ppy", 4, 15)
            .with_text("print(\"hello\")!");
        let report = ErrorReport {
            error: ReportedError::Syntax(err),
            frames: Vec::new(),
            internal: false,
        };
        let output = TerminalRenderer::new(false).render(&report, &no_lines());
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "  File \"/app/syntax_error.ppy\", line 4");
        assert_eq!(lines[1].trim(), "print(\"hello\")!");
        assert_eq!(lines[2], format!("    {}^", " ".repeat(14)));
        assert_eq!(lines[3], "error: invalid syntax");
    }

    #[test]
    fn render_runtime_trace() {
        let mut map = HashMap::new();
        map.insert(
            (PathBuf::from("/app/type_error.ppy"), 3),
            "    print('1' + 1)".to_string(),
        );
        let report = ErrorReport {
            error: ReportedError::Runtime {
                message: "unsupported operand types".to_string(),
            },
            frames: vec![Frame::new("/app/type_error.ppy", 3, "<module>")],
            internal: false,
        };
        let output = TerminalRenderer::new(false).render(&report, &MapLines(map));
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "Traceback (most recent call last):");
        assert_eq!(lines[2].trim(), "print('1' + 1)");
        assert_eq!(lines[3], "error: unsupported operand types");
    }

    #[test]
    fn render_internal_banner() {
        let report = ErrorReport {
            error: ReportedError::Runtime {
                message: "boom".to_string(),
            },
            frames: vec![Frame::new("/lib/runner", 1, "main")],
            internal: true,
        };
        let output = TerminalRenderer::new(false).render(&report, &no_lines());
        assert!(output.starts_with("Internal error:\n"));
    }

    #[test]
    fn render_non_zero_exit() {
        let report = ErrorReport {
            error: ReportedError::Preprocess(PreprocessError::NonZeroExit { code: 1 }),
            frames: Vec::new(),
            internal: false,
        };
        let output = TerminalRenderer::new(false).render(&report, &no_lines());
        assert_eq!(output, "error: preprocessor exit code is not zero (1)\n");
    }

    #[test]
    fn color_wraps_labels() {
        let report = ErrorReport {
            error: ReportedError::Runtime {
                message: "boom".to_string(),
            },
            frames: Vec::new(),
            internal: false,
        };
        let output = TerminalRenderer::new(true).render(&report, &no_lines());
        assert!(output.contains("\x1b[1;31merror\x1b[0m: boom"));
    }
}
