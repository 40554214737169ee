//! Single-pass template parser
//!
//! Produces an immutable [`ParsedTemplate`] that can be rendered any number
//! of times. Parsing is O(source length): one forward scan, no backtracking.
//!
//! Supported syntax:
//! - `{{name}}` — variable interpolation, dotted paths reach into mappings
//! - `{{#if name}}...{{else}}...{{/if}}` — conditional sections
//! - `{{#each name}}...{{/each}}` — iteration, exposing `{{this}}` and
//!   `{{@index}}` inside the body
//! - `{{!-- ... --}}` — comments, removed from output

use crate::error::{EngineError, Result};

/// One node of the parsed template tree.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    Text(String),
    Variable {
        path: String,
        offset: usize,
    },
    If {
        guard: String,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
    Each {
        path: String,
        offset: usize,
        body: Vec<Node>,
    },
}

/// An open section while parsing.
enum Frame {
    If {
        guard: String,
        offset: usize,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
        in_else: bool,
    },
    Each {
        path: String,
        offset: usize,
        body: Vec<Node>,
    },
}

/// A parsed, immutable template ready for rendering.
///
/// Immutability is what makes the parsed form safe to share across concurrent
/// renders without locking.
#[derive(Debug, Clone)]
pub struct ParsedTemplate {
    pub(crate) nodes: Vec<Node>,
}

impl ParsedTemplate {
    /// Parse template source, rejecting malformed input before any render.
    pub fn parse(source: &str) -> Result<Self> {
        let mut root: Vec<Node> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut pos = 0;

        while let Some(found) = source[pos..].find("{{") {
            let tag_start = pos + found;
            if tag_start > pos {
                push_text(&mut root, &mut stack, &source[pos..tag_start]);
            }

            // Comments may contain "}}", so they terminate on "--}}" only.
            if source[tag_start + 2..].starts_with("!--") {
                match source[tag_start + 5..].find("--}}") {
                    Some(end) => {
                        pos = tag_start + 5 + end + 4;
                        continue;
                    }
                    None => {
                        return Err(EngineError::MalformedTemplate {
                            message: "unterminated comment".to_string(),
                            offset: tag_start,
                        });
                    }
                }
            }

            let inner_start = tag_start + 2;
            let Some(end) = source[inner_start..].find("}}") else {
                return Err(EngineError::MalformedTemplate {
                    message: "unterminated tag".to_string(),
                    offset: tag_start,
                });
            };
            let inner = source[inner_start..inner_start + end].trim();
            pos = inner_start + end + 2;

            let (head, tail) = inner
                .split_once(char::is_whitespace)
                .unwrap_or((inner, ""));

            if head == "#if" {
                let guard = tail.trim();
                if !is_valid_name(guard) {
                    return Err(EngineError::MalformedTemplate {
                        message: format!("invalid #if guard `{guard}`"),
                        offset: tag_start,
                    });
                }
                stack.push(Frame::If {
                    guard: guard.to_string(),
                    offset: tag_start,
                    then_branch: Vec::new(),
                    else_branch: Vec::new(),
                    in_else: false,
                });
            } else if head == "#each" {
                let path = tail.trim();
                if !is_valid_name(path) {
                    return Err(EngineError::MalformedTemplate {
                        message: format!("invalid #each target `{path}`"),
                        offset: tag_start,
                    });
                }
                stack.push(Frame::Each {
                    path: path.to_string(),
                    offset: tag_start,
                    body: Vec::new(),
                });
            } else if inner == "else" {
                match stack.last_mut() {
                    Some(Frame::If { in_else, .. }) if !*in_else => *in_else = true,
                    _ => {
                        return Err(EngineError::MalformedTemplate {
                            message: "{{else}} outside an open {{#if}}".to_string(),
                            offset: tag_start,
                        });
                    }
                }
            } else if inner == "/if" {
                match stack.pop() {
                    Some(Frame::If {
                        guard,
                        then_branch,
                        else_branch,
                        ..
                    }) => push_node(
                        &mut root,
                        &mut stack,
                        Node::If {
                            guard,
                            then_branch,
                            else_branch,
                        },
                    ),
                    _ => {
                        return Err(EngineError::MalformedTemplate {
                            message: "{{/if}} without matching {{#if}}".to_string(),
                            offset: tag_start,
                        });
                    }
                }
            } else if inner == "/each" {
                match stack.pop() {
                    Some(Frame::Each { path, offset, body }) => {
                        push_node(&mut root, &mut stack, Node::Each { path, offset, body })
                    }
                    _ => {
                        return Err(EngineError::MalformedTemplate {
                            message: "{{/each}} without matching {{#each}}".to_string(),
                            offset: tag_start,
                        });
                    }
                }
            } else if inner.starts_with('#') || inner.starts_with('/') {
                return Err(EngineError::MalformedTemplate {
                    message: format!("unknown section tag `{inner}`"),
                    offset: tag_start,
                });
            } else {
                if !is_valid_name(inner) {
                    return Err(EngineError::MalformedTemplate {
                        message: format!("invalid variable tag `{inner}`"),
                        offset: tag_start,
                    });
                }
                push_node(
                    &mut root,
                    &mut stack,
                    Node::Variable {
                        path: inner.to_string(),
                        offset: tag_start,
                    },
                );
            }
        }

        if let Some(frame) = stack.last() {
            let (kind, offset) = match frame {
                Frame::If { offset, .. } => ("{{#if}}", *offset),
                Frame::Each { offset, .. } => ("{{#each}}", *offset),
            };
            return Err(EngineError::MalformedTemplate {
                message: format!("unterminated {kind} section"),
                offset,
            });
        }

        if pos < source.len() {
            root.push(Node::Text(source[pos..].to_string()));
        }

        Ok(ParsedTemplate { nodes: root })
    }
}

/// Sink for the next node: the innermost open section, or the root.
fn push_node(root: &mut Vec<Node>, stack: &mut Vec<Frame>, node: Node) {
    let sink = match stack.last_mut() {
        Some(Frame::If {
            then_branch,
            else_branch,
            in_else,
            ..
        }) => {
            if *in_else {
                else_branch
            } else {
                then_branch
            }
        }
        Some(Frame::Each { body, .. }) => body,
        None => root,
    };
    sink.push(node);
}

fn push_text(root: &mut Vec<Node>, stack: &mut Vec<Frame>, text: &str) {
    push_node(root, stack, Node::Text(text.to_string()));
}

/// Names are non-empty dotted identifiers; `@index` is the loop counter.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '-'))
}
