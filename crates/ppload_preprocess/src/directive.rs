//! A small line-preserving directive engine.
//!
//! Supported directives, each on its own line:
//!
//! ```text
//! #define NAME [value]    value is expanded once, at definition time
//! #undef NAME
//! #include "file"        resolved against the including file's directory
//! #ifdef NAME / #ifndef NAME / #else / #endif
//! #error message
//! ```
//!
//! Directive lines and lines in inactive branches become empty lines, so the
//! output always has as many lines as the input. Other lines starting with `#`
//! are left alone. Included files contribute definitions only: any other
//! active text in them is an error, because it could not be placed without
//! shifting line numbers.

use std::path::{Path, PathBuf};

use ppload_diagnostics::Location;

use crate::engine::{EngineFault, Expansion, MacroEngine, UNTERMINATED};
use crate::state::MacroState;

const MAX_INCLUDE_DEPTH: usize = 32;

/// The built-in engine. Stateless; all definitions live in [`MacroState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveEngine;

impl DirectiveEngine {
    /// Creates the engine.
    pub fn new() -> Self {
        Self
    }
}

impl MacroEngine for DirectiveEngine {
    fn expand(
        &self,
        text: &str,
        origin: &Path,
        state: &mut MacroState,
    ) -> Result<Expansion, EngineFault> {
        let mut run = Run {
            state,
            includes: Vec::new(),
            stack: vec![origin.to_path_buf()],
            last_directive: None,
        };
        let out = run.unit(text, origin, true)?;
        Ok(Expansion::new(out, run.includes))
    }
}

struct Branch {
    active: bool,
    seen_else: bool,
    line: u32,
}

struct Run<'s> {
    state: &'s mut MacroState,
    includes: Vec<PathBuf>,
    stack: Vec<PathBuf>,
    last_directive: Option<Location>,
}

impl Run<'_> {
    /// Processes one file. With `emit` unset, active text is rejected.
    fn unit(&mut self, text: &str, path: &Path, emit: bool) -> Result<String, EngineFault> {
        let mut out = String::with_capacity(text.len());
        let mut branches: Vec<Branch> = Vec::new();

        for (idx, raw) in text.split_inclusive('\n').enumerate() {
            let line_no = idx as u32 + 1;
            let (content, ending) = split_ending(raw);
            let active = branches.iter().all(|b| b.active);
            let fault = |column: usize, message: String| EngineFault::Directive {
                path: path.to_path_buf(),
                line: line_no,
                column: column as u32 + 1,
                message,
            };

            let Some((column, directive, arg)) = parse_directive(content) else {
                if active && emit {
                    out.push_str(&substitute(content, self.state));
                } else if active && !content.trim().is_empty() {
                    return Err(fault(0, "included files may only contain directives".to_string()));
                }
                out.push_str(ending);
                continue;
            };

            match directive {
                "ifdef" | "ifndef" => {
                    let name = macro_name(arg).ok_or_else(|| {
                        fault(column, format!("#{directive} expects a macro name"))
                    })?;
                    let defined = self.state.is_defined(name);
                    branches.push(Branch {
                        active: if directive == "ifdef" { defined } else { !defined },
                        seen_else: false,
                        line: line_no,
                    });
                }
                "else" => {
                    let branch = branches
                        .last_mut()
                        .filter(|b| !b.seen_else)
                        .ok_or_else(|| fault(column, "#else without #ifdef".to_string()))?;
                    branch.active = !branch.active;
                    branch.seen_else = true;
                }
                "endif" => {
                    branches
                        .pop()
                        .ok_or_else(|| fault(column, "#endif without #ifdef".to_string()))?;
                }
                _ if !active => {}
                "define" => {
                    let (name, value) = split_name(arg);
                    let name = macro_name(name)
                        .ok_or_else(|| fault(column, "#define expects a macro name".to_string()))?;
                    let value = substitute(value.trim(), self.state);
                    self.state.define(name, value);
                }
                "undef" => {
                    let name = macro_name(arg)
                        .ok_or_else(|| fault(column, "#undef expects a macro name".to_string()))?;
                    self.state.undefine(name);
                }
                "include" => {
                    let target = include_target(arg)
                        .ok_or_else(|| fault(column, "malformed #include".to_string()))?;
                    self.last_directive = Some(Location {
                        path: path.to_path_buf(),
                        line: line_no,
                    });
                    self.include(path, target, |message| fault(column, message))?;
                }
                "error" => {
                    let message = if arg.trim().is_empty() {
                        "#error".to_string()
                    } else {
                        arg.trim().to_string()
                    };
                    return Err(fault(column, message));
                }
                _ => {
                    // Not ours; leave it in place.
                    if emit {
                        out.push_str(content);
                    }
                    out.push_str(ending);
                    continue;
                }
            }

            self.last_directive = Some(Location {
                path: path.to_path_buf(),
                line: line_no,
            });
            out.push_str(ending);
        }

        if let Some(open) = branches.last() {
            return Err(EngineFault::Directive {
                path: path.to_path_buf(),
                line: open.line,
                column: 1,
                message: format!("{UNTERMINATED} #ifdef"),
            });
        }
        Ok(out)
    }

    fn include(
        &mut self,
        from: &Path,
        target: &str,
        fault: impl Fn(String) -> EngineFault,
    ) -> Result<(), EngineFault> {
        let dir = from.parent().unwrap_or_else(|| Path::new(""));
        let resolved = dir.join(target);

        if self.stack.len() >= MAX_INCLUDE_DEPTH {
            return Err(EngineFault::Internal {
                message: format!("include depth limit of {MAX_INCLUDE_DEPTH} exceeded"),
                last_directive: self.last_directive.clone(),
            });
        }
        if self.stack.contains(&resolved) {
            return Err(fault(format!(
                "include cycle through {}",
                resolved.display()
            )));
        }
        let content = std::fs::read_to_string(&resolved)
            .map_err(|e| fault(format!("cannot include {}: {e}", resolved.display())))?;

        tracing::trace!(
            target = "ppload.preprocess",
            from = %from.display(),
            include = %resolved.display(),
            "including file"
        );
        self.includes.push(resolved.clone());
        self.stack.push(resolved.clone());
        self.unit(&content, &resolved, false)?;
        self.stack.pop();
        Ok(())
    }
}

/// Splits a line into its content and its line ending.
fn split_ending(raw: &str) -> (&str, &str) {
    if let Some(content) = raw.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = raw.strip_suffix('\n') {
        (content, "\n")
    } else {
        (raw, "")
    }
}

/// Returns `(column of '#', directive name, argument text)` for directive lines.
fn parse_directive(line: &str) -> Option<(usize, &str, &str)> {
    let trimmed = line.trim_start();
    let column = line.len() - trimmed.len();
    let body = trimmed.strip_prefix('#')?.trim_start();
    let (name, arg) = split_name(body);
    Some((column, name, arg))
}

fn split_name(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], &text[pos..]),
        None => (text, ""),
    }
}

fn macro_name(text: &str) -> Option<&str> {
    let name = text.trim();
    let mut chars = name.chars();
    let first = chars.next()?;
    if (first.is_alphabetic() || first == '_') && chars.all(|c| c.is_alphanumeric() || c == '_') {
        Some(name)
    } else {
        None
    }
}

fn include_target(arg: &str) -> Option<&str> {
    let arg = arg.trim();
    let inner = if let Some(rest) = arg.strip_prefix('"') {
        rest.strip_suffix('"')?
    } else if let Some(rest) = arg.strip_prefix('<') {
        rest.strip_suffix('>')?
    } else {
        arg
    };
    (!inner.is_empty()).then_some(inner)
}

/// Replaces defined identifiers outside string literals and comments.
fn substitute(line: &str, state: &MacroState) -> String {
    if state.is_empty() {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len());
    let mut chars = line.char_indices().peekable();
    let mut quote: Option<char> = None;

    while let Some((start, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
            }
            '#' => {
                out.push_str(&line[start..]);
                break;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        end = i + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let ident = &line[start..end];
                out.push_str(state.get(ident).unwrap_or(ident));
            }
            _ => out.push(c),
        }
    }
    out
}
