//! Local file handling for the CLI: statement files, context files and
//! the confirmation prompt.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::{EnrichError, EnrichResult};

/// Which command an output file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// SQL statements (add-comments, delete-comments).
    Statements,
    /// Retrieved comments (get-comments).
    Comments,
}

/// `<database>_comments.sql`, or `.txt` for retrieved comments.
pub fn default_output_path(database: &str, kind: OutputKind) -> PathBuf {
    let extension = match kind {
        OutputKind::Statements => "sql",
        OutputKind::Comments => "txt",
    };
    PathBuf::from(format!("{database}_comments.{extension}"))
}

/// Write one statement per line.
pub fn write_statements(path: &Path, statements: &[String]) -> EnrichResult<()> {
    let mut content = String::new();
    for statement in statements {
        content.push_str(statement);
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}

/// Split file content into statements on `;` followed by a newline.
///
/// Statements are trimmed and empty ones dropped. A comment literal that
/// itself contains `;` + newline is split too.
pub fn split_statements(content: &str) -> Vec<String> {
    content
        .split(";\n")
        .map(|s| s.trim().trim_end_matches(';').trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Read and split a statement file.
pub fn read_statements(path: &Path) -> EnrichResult<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        EnrichError::invalid_input(format!("failed to read {}: {e}", path.display()))
    })?;
    Ok(split_statements(&content.replace("\r\n", "\n")))
}

/// Concatenate comma-separated context files, each preceded by a
/// `-- Context from file: <path> --` header. Blank input yields an empty
/// string.
pub fn read_context_files(paths: &str) -> EnrichResult<String> {
    let mut combined = String::new();
    for path in paths.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let content = fs::read_to_string(path).map_err(|e| {
            EnrichError::invalid_input(format!("failed to read context file '{path}': {e}"))
        })?;
        combined.push_str(&format!("\n-- Context from file: {path} --\n"));
        combined.push_str(&content);
    }
    Ok(combined)
}

/// Ask whether to apply `description`; only `yes` / `y` confirm.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, description: &str) -> io::Result<bool> {
    writeln!(output, "\n-------------------------------------------------------------")?;
    writeln!(output, "Generated {description}:")?;
    write!(output, "Do you want to apply these changes to the database? (yes/no): ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "yes" | "y"))
}
