//! Action-creator registry and evaluation of remote action specifications.
//!
//! The registry is declared as a [`CreatorTree`] (possibly behind a deferred
//! constructor) and flattened into an indexed list the first time it is
//! needed. Remote clients refer to creators by index.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::action::Action;
use crate::error::EvalError;
use crate::protocol::{ActionSpec, CreatorCall};

pub type CreatorFn = Arc<dyn Fn(&[Value]) -> Result<Action, String> + Send + Sync>;

/// A flattened, callable action creator.
#[derive(Clone)]
pub struct ActionCreator {
    /// Dotted path through the namespaces it was declared in.
    pub name: String,
    /// Parameter names, shown by the remote client.
    pub args: Vec<String>,
    func: CreatorFn,
}

impl ActionCreator {
    pub fn call(&self, args: &[Value]) -> Result<Action, EvalError> {
        (self.func)(args).map_err(EvalError::Creator)
    }

    pub fn descriptor(&self) -> CreatorDescriptor {
        CreatorDescriptor {
            name: self.name.clone(),
            args: self.args.clone(),
        }
    }
}

impl fmt::Debug for ActionCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCreator")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// What the remote client is told about a creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorDescriptor {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Clone)]
enum CreatorNode {
    Creator { args: Vec<String>, func: CreatorFn },
    Namespace(CreatorTree),
}

/// Declared action creators, grouped in namespaces.
#[derive(Clone, Default)]
pub struct CreatorTree {
    nodes: BTreeMap<String, CreatorNode>,
}

impl CreatorTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn creator<F>(mut self, name: impl Into<String>, args: &[&str], func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Action, String> + Send + Sync + 'static,
    {
        self.nodes.insert(
            name.into(),
            CreatorNode::Creator {
                args: args.iter().map(|a| a.to_string()).collect(),
                func: Arc::new(func),
            },
        );
        self
    }

    pub fn namespace(mut self, name: impl Into<String>, tree: CreatorTree) -> Self {
        self.nodes.insert(name.into(), CreatorNode::Namespace(tree));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Debug for CreatorTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.keys()).finish()
    }
}

/// Flatten a tree into the indexed registry, depth first in name order.
pub fn get_actions_array(tree: &CreatorTree) -> Vec<ActionCreator> {
    let mut out = Vec::new();
    flatten_into(tree, "", &mut out);
    out
}

fn flatten_into(tree: &CreatorTree, prefix: &str, out: &mut Vec<ActionCreator>) {
    for (key, node) in &tree.nodes {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match node {
            CreatorNode::Creator { args, func } => out.push(ActionCreator {
                name,
                args: args.clone(),
                func: func.clone(),
            }),
            CreatorNode::Namespace(inner) => flatten_into(inner, &name, out),
        }
    }
}

/// Where the registry comes from.
pub enum ActionCreatorSource {
    Tree(CreatorTree),
    /// Built on first use.
    Deferred(Box<dyn FnOnce() -> CreatorTree + Send>),
}

impl ActionCreatorSource {
    pub fn deferred<F>(build: F) -> Self
    where
        F: FnOnce() -> CreatorTree + Send + 'static,
    {
        ActionCreatorSource::Deferred(Box::new(build))
    }

    fn materialize(self) -> CreatorTree {
        match self {
            ActionCreatorSource::Tree(tree) => tree,
            ActionCreatorSource::Deferred(build) => build(),
        }
    }
}

impl From<CreatorTree> for ActionCreatorSource {
    fn from(tree: CreatorTree) -> Self {
        ActionCreatorSource::Tree(tree)
    }
}

impl fmt::Debug for ActionCreatorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionCreatorSource::Tree(tree) => f.debug_tuple("Tree").field(tree).finish(),
            ActionCreatorSource::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// Registry state: declared but not yet flattened, or ready to use.
#[derive(Debug)]
pub enum ActionCreators {
    Unresolved(ActionCreatorSource),
    Resolved(Vec<ActionCreator>),
}

impl ActionCreators {
    pub fn new(source: impl Into<ActionCreatorSource>) -> Self {
        ActionCreators::Unresolved(source.into())
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ActionCreators::Resolved(_))
    }

    /// Flatten the source on first call; later calls return the same registry.
    pub fn resolve(&mut self) -> &[ActionCreator] {
        if let ActionCreators::Unresolved(_) = self {
            let taken = std::mem::replace(self, ActionCreators::Resolved(Vec::new()));
            if let ActionCreators::Unresolved(source) = taken {
                let registry = get_actions_array(&source.materialize());
                debug!(count = registry.len(), "resolved action creators");
                *self = ActionCreators::Resolved(registry);
            }
        }
        match &*self {
            ActionCreators::Resolved(registry) => registry,
            ActionCreators::Unresolved(_) => &[],
        }
    }
}

/// Turn a remote specification into a concrete action.
pub fn eval_action(spec: &ActionSpec, registry: Option<&[ActionCreator]>) -> Result<Action, EvalError> {
    match spec {
        ActionSpec::Literal(action) => Ok(action.clone()),
        ActionSpec::Expression(source) => {
            let value = interpret(source).map_err(EvalError::InvalidExpression)?;
            if !value.is_object() {
                return Err(EvalError::InvalidExpression(format!(
                    "`{source}` is not an action object"
                )));
            }
            serde_json::from_value(value).map_err(|e| EvalError::InvalidExpression(e.to_string()))
        }
        ActionSpec::Call(call) => {
            let registry = registry.ok_or(EvalError::NoActionCreators)?;
            eval_call(call, registry)
        }
        ActionSpec::Unsupported(value) => Err(EvalError::UnsupportedPayload(value.to_string())),
    }
}

fn eval_call(call: &CreatorCall, registry: &[ActionCreator]) -> Result<Action, EvalError> {
    let creator = registry
        .get(call.selected)
        .ok_or(EvalError::UnknownCreator(call.selected))?;
    if let Some(name) = call.name.as_ref().filter(|name| **name != creator.name) {
        return Err(EvalError::NotAFunction(name.clone()));
    }

    let mut args = call
        .args
        .iter()
        .map(|arg| {
            interpret(arg).map_err(|reason| EvalError::InvalidArgument {
                arg: arg.clone(),
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(rest) = &call.rest {
        let rest_value = interpret(rest).map_err(|reason| EvalError::InvalidArgument {
            arg: rest.clone(),
            reason,
        })?;
        match rest_value {
            Value::Array(items) => args.extend(items),
            _ => return Err(EvalError::RestNotArray),
        }
    }

    creator.call(&args)
}

/// Argument and expression sources are JSON5 literals.
fn interpret(source: &str) -> Result<Value, String> {
    json5::from_str::<Value>(source).map_err(|e| e.to_string())
}
