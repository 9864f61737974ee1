//! Best-effort, line-oriented scanner for schema text.
//!
//! [`parse`] never fails. Lines that do not fit the current block are ignored or read as
//! whatever they most resemble; nothing is validated. The scan keeps at most one open block
//! ([`CurrentBlock`]) and a block only ends when the next `model`/`enum` declaration starts
//! or the input runs out. Closing braces do not close anything.
//!
//! Relation detection only sees models that were already closed when a field is read, so a
//! field typed by a model declared further down the file is not a relation.

use crate::schema::{Enum, Field, Model, ParsedSchema};

const MODEL_KEYWORD: &str = "model";
const ENUM_KEYWORD: &str = "enum";
const PRIMARY_KEY_MARKER: &str = "@id";
const TYPE_MODIFIERS: [char; 3] = ['?', '[', ']'];

/// The block the scanner is currently inside of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CurrentBlock {
    #[default]
    None,
    OpenModel(Model),
    OpenEnum(Enum),
}

/// An entity that a scan step closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completed {
    Model(Model),
    Enum(Enum),
}

impl CurrentBlock {
    /// Consumes one source line. `done` is the result accumulated so far and is only read
    /// (for relation detection); the caller appends whatever this step completes.
    pub fn step(self, line: &str, done: &ParsedSchema) -> (CurrentBlock, Option<Completed>) {
        let trimmed = line.trim();

        if let Some((keyword, name, inline)) = declaration(trimmed) {
            let completed = self.close();
            let mut next = match keyword {
                MODEL_KEYWORD => CurrentBlock::OpenModel(Model::new(name)),
                _ => CurrentBlock::OpenEnum(Enum::new(name)),
            };
            // `model A { b B }` style declarations carry body content on the same line.
            if let Some(inline) = inline {
                next = next.body_line(inline, done, completed.as_ref());
            }
            return (next, completed);
        }

        (self.body_line(trimmed, done, None), None)
    }

    /// Ends the current block, yielding its entity.
    pub fn close(self) -> Option<Completed> {
        match self {
            CurrentBlock::None => None,
            CurrentBlock::OpenModel(model) => Some(Completed::Model(model)),
            CurrentBlock::OpenEnum(enum_def) => Some(Completed::Enum(enum_def)),
        }
    }

    fn body_line(
        self,
        trimmed: &str,
        done: &ParsedSchema,
        pending: Option<&Completed>,
    ) -> CurrentBlock {
        match self {
            CurrentBlock::OpenModel(mut model) => {
                let content = strip_trailing_brace(trimmed);
                // Only an interior space marks a field line; tabs alone do not
                if content.contains(' ') {
                    model.fields.push(parse_field(content, |ty| {
                        done.models.iter().any(|m| m.name == ty)
                            || matches!(pending, Some(Completed::Model(m)) if m.name == ty)
                    }));
                }
                CurrentBlock::OpenModel(model)
            }
            CurrentBlock::OpenEnum(mut enum_def) => {
                if !trimmed.is_empty() && !trimmed.starts_with('}') {
                    let value = strip_trailing_brace(trimmed);
                    if !value.is_empty() {
                        enum_def.values.push(value.to_string());
                    }
                }
                CurrentBlock::OpenEnum(enum_def)
            }
            CurrentBlock::None => CurrentBlock::None,
        }
    }
}

/// Parses schema text into models and enums, in source order.
pub fn parse(text: &str) -> ParsedSchema {
    let mut schema = ParsedSchema::default();
    let mut current = CurrentBlock::None;

    for line in text.lines() {
        let (next, completed) = current.step(line, &schema);
        push_completed(&mut schema, completed);
        current = next;
    }
    push_completed(&mut schema, current.close());

    tracing::trace!(
        "[Parser] {} models, {} enums, {} relations",
        schema.models.len(),
        schema.enums.len(),
        schema.relation_count()
    );
    schema
}

fn push_completed(schema: &mut ParsedSchema, completed: Option<Completed>) {
    match completed {
        Some(Completed::Model(model)) => schema.models.push(model),
        Some(Completed::Enum(enum_def)) => schema.enums.push(enum_def),
        None => {}
    }
}

/// Recognizes any line starting with `model` or `enum`, so `modelId Int` inside a model body
/// opens a new model named `Int`. Returns the keyword, the declared name (the second token,
/// empty when missing) and any body text following a `{` on the same line.
fn declaration(trimmed: &str) -> Option<(&'static str, &str, Option<&str>)> {
    let keyword = if trimmed.starts_with(MODEL_KEYWORD) {
        MODEL_KEYWORD
    } else if trimmed.starts_with(ENUM_KEYWORD) {
        ENUM_KEYWORD
    } else {
        return None;
    };
    let name = trimmed.split_whitespace().nth(1).unwrap_or("");
    let name = name.split('{').next().unwrap_or("");

    let inline = trimmed
        .split_once('{')
        .map(|(_, rest)| rest.trim())
        .filter(|rest| !strip_trailing_brace(rest).is_empty());
    Some((keyword, name, inline))
}

fn parse_field(content: &str, is_model: impl Fn(&str) -> bool) -> Field {
    let mut tokens = content.split_whitespace();
    let name = tokens.next().unwrap_or("").to_string();
    let declared_type = tokens.next().unwrap_or("");
    let remainder = content
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest)
        .unwrap_or("");

    let raw_type: String = declared_type
        .chars()
        .filter(|c| !TYPE_MODIFIERS.contains(c))
        .collect();

    Field {
        is_relation: is_model(&raw_type),
        is_nullable: declared_type.contains('?'),
        is_primary_key: remainder.contains(PRIMARY_KEY_MARKER),
        name,
        raw_type,
    }
}

fn strip_trailing_brace(s: &str) -> &str {
    s.strip_suffix('}').map(str::trim_end).unwrap_or(s)
}
