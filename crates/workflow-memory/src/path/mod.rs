//! Dotted/bracketed path expressions used by `WorkflowMemory::get`
//!
//! `a.b[2].c` parses to `[Key("a"), Key("b"), Index(2), Key("c")]`. The empty
//! path parses to no steps at all and addresses the root value. The parser
//! and resolver are both total: malformed syntax and type/shape mismatches
//! are reported as typed errors, never a panic.

use crate::error::{MemoryError, Result};
use crate::value::Value;

/// One step of a parsed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Key(String),
    Index(usize),
}

/// Parse a dotted/bracketed path into its steps.
pub fn parse(path: &str) -> Result<Vec<Step>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }

    let mut steps = Vec::new();
    let mut chars = path.chars().peekable();
    let mut key = String::new();

    let flush_key =
        |key: &mut String, steps: &mut Vec<Step>, path: &str| -> Result<()> {
            if key.is_empty() {
                return Err(MemoryError::invalid_path(path, "empty key segment"));
            }
            steps.push(Step::Key(std::mem::take(key)));
            Ok(())
        };

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                flush_key(&mut key, &mut steps, path)?;
            }
            '[' => {
                if !key.is_empty() {
                    flush_key(&mut key, &mut steps, path)?;
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        Some(other) => {
                            return Err(MemoryError::invalid_path(
                                path,
                                format!("unexpected character {other:?} in index"),
                            ));
                        }
                        None => {
                            return Err(MemoryError::invalid_path(path, "unterminated '['"));
                        }
                    }
                }
                if digits.is_empty() {
                    return Err(MemoryError::invalid_path(path, "empty index"));
                }
                let index: usize = digits
                    .parse()
                    .map_err(|_| MemoryError::invalid_path(path, "non-numeric index"))?;
                steps.push(Step::Index(index));

                // After a closing bracket the next character, if any, must
                // start a new step (either '.' or '[').
                if let Some(&next) = chars.peek() {
                    if next != '.' && next != '[' {
                        return Err(MemoryError::invalid_path(
                            path,
                            "expected '.' or '[' after ']'",
                        ));
                    }
                }
            }
            ']' => {
                return Err(MemoryError::invalid_path(path, "unmatched ']'"));
            }
            _ => key.push(c),
        }
    }

    if !key.is_empty() {
        flush_key(&mut key, &mut steps, path)?;
    }

    Ok(steps)
}

/// Walk `root` along `steps`, returning a reference to the addressed value.
pub fn resolve<'v>(root: &'v Value, steps: &[Step]) -> Result<&'v Value> {
    let mut current = root;
    for step in steps {
        current = match (step, current) {
            (Step::Key(k), Value::Map(m)) => {
                m.get(k).ok_or_else(|| MemoryError::not_found(k.clone()))?
            }
            (Step::Index(i), Value::Array(a)) => {
                a.get(*i).ok_or_else(|| MemoryError::not_found(format!("[{i}]")))?
            }
            (Step::Key(k), other) => {
                return Err(MemoryError::invalid_path(
                    k.clone(),
                    format!("cannot index a {} with a key", other.kind()),
                ));
            }
            (Step::Index(i), other) => {
                return Err(MemoryError::invalid_path(
                    format!("[{i}]"),
                    format!("cannot index a {} with an index", other.kind()),
                ));
            }
        };
    }
    Ok(current)
}

/// Parse `path` and resolve it against `root`, returning a deep clone of the
/// addressed value. Callers get an owned value rather than a borrow tied to
/// whatever lock guards `root`.
pub fn get(root: &Value, path: &str) -> Result<Value> {
    let steps = parse(path)?;
    resolve(root, &steps).cloned()
}
