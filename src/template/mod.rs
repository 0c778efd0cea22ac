mod scanner;

use scanner::{OPEN, find_close, find_open};

use crate::error::SqlMapperError;

/// Positional placeholder style emitted by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderStyle {
    /// `?` markers (SQLite, and the canonical compiled form).
    #[default]
    Question,
    /// PostgreSQL-style `$1`, `$2`, ...
    Numbered,
}

/// A template rewritten to positional placeholders.
///
/// `param_names[i]` supplies bind position `i + 1`; that order is the only link between a name
/// and its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStatement {
    text: String,
    param_names: Vec<String>,
}

impl CompiledStatement {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    #[must_use]
    pub fn param_count(&self) -> usize {
        self.param_names.len()
    }
}

/// Compile a `#{name}` template into `?` placeholders.
///
/// ```rust
/// use sql_mapper::template::compile;
///
/// let stmt = compile("insert into t values(#{a},#{b})").unwrap();
/// assert_eq!(stmt.text(), "insert into t values(?,?)");
/// assert_eq!(stmt.param_names(), ["a", "b"]);
/// ```
///
/// # Errors
/// Returns `SqlMapperError::CompileError` for an open marker without a closing `}`, an empty
/// name, or a name containing another open marker.
pub fn compile(template: &str) -> Result<CompiledStatement, SqlMapperError> {
    compile_with_style(template, PlaceholderStyle::Question)
}

/// Compile a template, rendering positional markers in `style`.
///
/// A `}` that is not preceded by an open marker is ordinary text.
///
/// # Errors
/// See [`compile`].
pub fn compile_with_style(
    template: &str,
    style: PlaceholderStyle,
) -> Result<CompiledStatement, SqlMapperError> {
    let bytes = template.as_bytes();
    let mut text = String::with_capacity(template.len());
    let mut param_names = Vec::new();
    let mut cursor = 0;

    while let Some(open) = find_open(bytes, cursor) {
        let name_start = open + OPEN.len();
        let close = find_close(bytes, name_start).ok_or_else(|| {
            SqlMapperError::CompileError(format!(
                "unterminated placeholder at byte {open} in template: {template}"
            ))
        })?;

        // Both markers are ASCII, so these slice bounds sit on char boundaries.
        let name = template[name_start..close].trim();
        if name.is_empty() {
            return Err(SqlMapperError::CompileError(format!(
                "empty placeholder name at byte {open} in template: {template}"
            )));
        }
        if name.contains("#{") {
            return Err(SqlMapperError::CompileError(format!(
                "nested placeholder '{name}' in template: {template}"
            )));
        }

        text.push_str(&template[cursor..open]);
        param_names.push(name.to_string());
        match style {
            PlaceholderStyle::Question => text.push('?'),
            PlaceholderStyle::Numbered => {
                text.push('$');
                text.push_str(&param_names.len().to_string());
            }
        }
        cursor = close + 1;
    }
    text.push_str(&template[cursor..]);

    Ok(CompiledStatement { text, param_names })
}
