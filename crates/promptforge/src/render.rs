//! Template rendering against caller bindings
//!
//! Rendering walks the parsed tree and is all-or-nothing: any error is
//! returned before partial output can escape.

use crate::error::{EngineError, Result};
use crate::parser::{Node, ParsedTemplate};
use crate::value::{Bindings, Value};

/// Output context declared by the caller. Markup escapes interpolated values;
/// the default is raw text since prompts are usually plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputContext {
    #[default]
    Raw,
    Markup,
}

/// One enclosing `{{#each}}` iteration.
struct LoopScope {
    element: Value,
    index: usize,
}

struct Renderer<'a> {
    bindings: &'a Bindings,
    context: OutputContext,
    scopes: Vec<LoopScope>,
    out: String,
}

impl ParsedTemplate {
    /// Render against bindings in the given output context.
    pub fn render(&self, bindings: &Bindings, context: OutputContext) -> Result<String> {
        let mut renderer = Renderer {
            bindings,
            context,
            scopes: Vec::new(),
            out: String::new(),
        };
        renderer.render_nodes(&self.nodes)?;
        Ok(renderer.out)
    }
}

impl Renderer<'_> {
    fn render_nodes(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Variable { path, offset } => {
                    let value =
                        self.lookup(path)
                            .ok_or_else(|| EngineError::MissingVariable {
                                name: path.clone(),
                                offset: *offset,
                            })?;
                    let text = value.to_display_string();
                    match self.context {
                        OutputContext::Raw => self.out.push_str(&text),
                        OutputContext::Markup => push_escaped(&mut self.out, &text),
                    }
                }
                Node::If {
                    guard,
                    then_branch,
                    else_branch,
                } => {
                    // Absence of a guard variable is a valid falsy signal
                    let truthy = self.lookup(guard).map(|v| v.is_truthy()).unwrap_or(false);
                    let branch = if truthy { then_branch } else { else_branch };
                    self.render_nodes(branch)?;
                }
                Node::Each { path, offset, body } => {
                    let value =
                        self.lookup(path)
                            .ok_or_else(|| EngineError::MissingVariable {
                                name: path.clone(),
                                offset: *offset,
                            })?;
                    let Value::Sequence(items) = value else {
                        return Err(EngineError::NotIterable {
                            name: path.clone(),
                            offset: *offset,
                        });
                    };
                    for (index, element) in items.into_iter().enumerate() {
                        self.scopes.push(LoopScope { element, index });
                        let result = self.render_nodes(body);
                        self.scopes.pop();
                        result?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve a dotted path: `this`/`@index` come from the innermost loop,
    /// everything else from the root bindings.
    fn lookup(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        match head {
            "this" => self.scopes.last()?.element.get_path(&rest).cloned(),
            "@index" => {
                if !rest.is_empty() {
                    return None;
                }
                Some(Value::Number(self.scopes.last()?.index as f64))
            }
            name => self.bindings.get(name)?.get_path(&rest).cloned(),
        }
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
}

/// Parse and render in one call, raw output context.
pub fn render(source: &str, bindings: &Bindings) -> Result<String> {
    render_with(source, bindings, OutputContext::Raw)
}

/// Parse and render in one call with an explicit output context.
pub fn render_with(source: &str, bindings: &Bindings, context: OutputContext) -> Result<String> {
    ParsedTemplate::parse(source)?.render(bindings, context)
}
