use crate::SourceFile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error kind, as printed in diagnostics.
///
/// `Lex` and `Parse` come from the frontends, the middle four from the
/// compiler, `Io`/`RecordTooLong` from the driver, `Runtime` from the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Lex,
    Parse,
    ReadOnlyGlobal,
    UnsupportedNode,
    BytecodeOverflow,
    Io,
    RecordTooLong,
    Runtime,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex => write!(f, "lex"),
            Self::Parse => write!(f, "parse"),
            Self::ReadOnlyGlobal => write!(f, "read-only global"),
            Self::UnsupportedNode => write!(f, "unsupported node"),
            Self::BytecodeOverflow => write!(f, "bytecode overflow"),
            Self::Io => write!(f, "io"),
            Self::RecordTooLong => write!(f, "record too long"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

/// A structured ZED diagnostic.
///
/// Carries the raw byte offset; line and column are resolved against the
/// cached [`SourceFile`] only when the diagnostic is rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    /// Byte offset into the program text (0 when no location applies).
    pub offset: u16,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(kind: ErrorKind, message: impl Into<String>, offset: u16) -> Self {
        Self {
            kind,
            message: message.into(),
            offset,
        }
    }

    /// Render as `<filename>:<line>:<col>: <kind>: <msg>`.
    pub fn render(&self, file: &SourceFile) -> String {
        let (line, col) = file.line_col(self.offset);
        format!("{}:{}:{}: {}: {}", file.name, line, col, self.kind, self.message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_resolves_line_and_col() {
        let src = SourceFile::new("p.zed", "let x = 1;\n@rnum = 5;\n");
        let d = Diagnostic::new(ErrorKind::ReadOnlyGlobal, "cannot assign to @rnum", 11);
        assert_eq!(
            d.render(&src),
            "p.zed:2:1: read-only global: cannot assign to @rnum"
        );
    }

    #[test]
    fn display_without_source() {
        let d = Diagnostic::new(ErrorKind::Io, "no such file", 0);
        assert_eq!(format!("{d}"), "io: no such file");
    }

    #[test]
    fn serializes_to_json() {
        let d = Diagnostic::new(ErrorKind::BytecodeOverflow, "jump target", 9);
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"bytecode_overflow\""));
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, ErrorKind::BytecodeOverflow);
        assert_eq!(back.offset, 9);
    }
}
