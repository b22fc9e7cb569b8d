//! Newick trees as pruning plans.
//!
//! A [`TreePlan`] is everything a [`Partition`](crate::libs::partition::Partition)
//! needs to evaluate a tree: post-order operations, one branch length per
//! matrix slot and the edge on which to combine the two halves.

use crate::libs::partition::Operation;
use nom::{
    branch::alt,
    bytes::complete::{is_not, take_until, take_while},
    character::complete::{char, multispace0},
    combinator::{cut, map, opt},
    error::{context, ContextError, ErrorKind, FromExternalError, ParseError},
    multi::{many0, separated_list1},
    number::complete::double,
    sequence::{delimited, preceded},
    IResult, Offset, Parser,
};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum NewickError {
    /// Syntax error, with 1-based position
    Parse {
        message: String,
        line: usize,
        column: usize,
        snippet: String,
    },
    /// Leaf name not among the tip names
    UnknownTip(String),
    /// Leaf name used twice
    DuplicateTip(String),
    /// Tip name absent from the tree
    MissingTip(String),
    UnnamedLeaf,
    /// A non-root node without a branch length
    MissingLength(String),
    /// A node whose child count cannot be pruned pairwise
    Multifurcation { node: String, children: usize },
}

impl fmt::Display for NewickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewickError::Parse {
                message,
                line,
                column,
                snippet,
            } => write!(
                f,
                "Newick parse error at line {}, column {}: {}\nSnippet: \"{}\"",
                line, column, message, snippet
            ),
            NewickError::UnknownTip(name) => write!(f, "leaf '{}' has no sequence", name),
            NewickError::DuplicateTip(name) => write!(f, "leaf '{}' appears twice", name),
            NewickError::MissingTip(name) => write!(f, "sequence '{}' is not in the tree", name),
            NewickError::UnnamedLeaf => write!(f, "tree has an unnamed leaf"),
            NewickError::MissingLength(node) => write!(f, "node {} has no branch length", node),
            NewickError::Multifurcation { node, children } => write!(
                f,
                "node {} has {} children; only binary nodes and a binary or ternary root are supported",
                node, children
            ),
        }
    }
}

impl std::error::Error for NewickError {}

// --- Parser ---

/// First failure position plus the contexts it was reached through
#[derive(Debug)]
struct Failure<'a> {
    at: &'a str,
    kind: ErrorKind,
    contexts: Vec<&'static str>,
}

impl<'a> ParseError<&'a str> for Failure<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Failure {
            at: input,
            kind,
            contexts: Vec::new(),
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a> ContextError<&'a str> for Failure<'a> {
    fn add_context(_input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.contexts.push(ctx);
        other
    }
}

impl<'a, E> FromExternalError<&'a str, E> for Failure<'a> {
    fn from_external_error(input: &'a str, kind: ErrorKind, _e: E) -> Self {
        Failure::from_error_kind(input, kind)
    }
}

type PResult<'a, O> = IResult<&'a str, O, Failure<'a>>;

#[derive(Debug)]
struct ParsedNode {
    name: Option<String>,
    length: Option<f64>,
    children: Vec<ParsedNode>,
}

impl ParsedNode {
    fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("'{}'", name),
            None => format!("with {} children", self.children.len()),
        }
    }
}

fn ws<'a, F, O>(inner: F) -> impl Parser<&'a str, Output = O, Error = Failure<'a>>
where
    F: Parser<&'a str, Output = O, Error = Failure<'a>>,
{
    delimited(multispace0, inner, multispace0)
}

fn label(input: &str) -> PResult<'_, String> {
    let quoted = delimited(
        char('\''),
        map(is_not("'"), |s: &str| s.to_string()),
        char('\''),
    );
    let plain = map(take_while(|c: char| !"():;,[]'".contains(c)), |s: &str| {
        s.trim().to_string()
    });
    context("label", alt((quoted, plain))).parse(input)
}

fn comments(input: &str) -> PResult<'_, ()> {
    map(
        many0(ws(delimited(char('['), take_until("]"), char(']')))),
        |_| (),
    )
    .parse(input)
}

fn length(input: &str) -> PResult<'_, f64> {
    context("branch length", preceded(ws(char(':')), cut(ws(double)))).parse(input)
}

fn subtree(input: &str) -> PResult<'_, ParsedNode> {
    let (input, children) = context(
        "children",
        opt(delimited(
            ws(char('(')),
            separated_list1(ws(char(',')), subtree),
            cut(ws(char(')'))),
        )),
    )
    .parse(input)?;
    let (input, name) = ws(label).parse(input)?;
    let (input, _) = comments(input)?;
    let (input, length) = opt(length).parse(input)?;
    let (input, _) = comments(input)?;

    let node = ParsedNode {
        name: Some(name).filter(|n| !n.is_empty()),
        length,
        children: children.unwrap_or_default(),
    };
    Ok((input, node))
}

fn parse(input: &str) -> Result<ParsedNode, NewickError> {
    let mut tree = (ws(subtree), context("terminator", cut(ws(char(';')))));
    match tree.parse(input) {
        Ok((_, (root, _))) => Ok(root),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(locate(input, e)),
        Err(nom::Err::Incomplete(_)) => Err(NewickError::Parse {
            message: "incomplete input".to_string(),
            line: 0,
            column: 0,
            snippet: String::new(),
        }),
    }
}

fn locate(input: &str, e: Failure) -> NewickError {
    let offset = input.offset(e.at);
    let prefix = &input[..offset];
    let line = prefix.matches('\n').count() + 1;
    let column = offset - prefix.rfind('\n').map(|p| p + 1).unwrap_or(0) + 1;

    let mut message = format!("{:?}", e.kind);
    for ctx in e.contexts.iter() {
        message.push_str(&format!(" in {}", ctx));
    }

    NewickError::Parse {
        message,
        line,
        column,
        snippet: e.at.chars().take(30).collect(),
    }
}

// --- Plan ---

/// The edge where the final likelihood is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub left: usize,
    pub right: usize,
    pub left_matrix: usize,
    pub right_matrix: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreePlan {
    /// Number of tips; tip `i` is `tip_names[i]`
    pub tips: usize,
    /// Internal CLV buffers used by the operations
    pub clv_buffers: usize,
    /// Post-order pruning steps
    pub operations: Vec<Operation>,
    /// Branch length of every matrix slot
    pub branch_lengths: Vec<f64>,
    pub edge: Edge,
}

impl TreePlan {
    /// Plan the evaluation of `newick` with leaves matched to `tip_names`.
    ///
    /// A binary root is evaluated across its two child branches. A ternary
    /// root (unrooted tree) joins its first two children into one extra
    /// buffer, evaluated against the third child through a zero-length slot.
    ///
    /// ```
    /// use plk::libs::newick::TreePlan;
    ///
    /// let names = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    /// let plan = TreePlan::from_newick("((A:0.1,B:0.2):0.05,C:0.3);", &names).unwrap();
    /// assert_eq!(plan.operations.len(), 1);
    /// assert_eq!(plan.branch_lengths, vec![0.1, 0.2, 0.05, 0.3]);
    /// assert_eq!((plan.edge.left, plan.edge.right), (3, 2));
    /// ```
    pub fn from_newick(newick: &str, tip_names: &[String]) -> Result<Self, NewickError> {
        let root = parse(newick)?;

        let mut planner = Planner {
            index: tip_names
                .iter()
                .enumerate()
                .map(|(i, n)| (n.as_str(), i))
                .collect(),
            seen: vec![false; tip_names.len()],
            next_buffer: tip_names.len(),
            operations: Vec::new(),
            lengths: Vec::new(),
        };

        let edge = match root.children.as_slice() {
            [a, b] => {
                let (left, left_matrix) = planner.visit(a)?;
                let (right, right_matrix) = planner.visit(b)?;
                Edge {
                    left,
                    right,
                    left_matrix,
                    right_matrix,
                }
            }
            [a, b, c] => {
                let (a, sa) = planner.visit(a)?;
                let (b, sb) = planner.visit(b)?;
                let (right, right_matrix) = planner.visit(c)?;
                let left = planner.join(a, sa, b, sb);
                let left_matrix = planner.slot(0.0);
                Edge {
                    left,
                    right,
                    left_matrix,
                    right_matrix,
                }
            }
            children => {
                return Err(NewickError::Multifurcation {
                    node: "root".to_string(),
                    children: children.len(),
                })
            }
        };

        if let Some(i) = planner.seen.iter().position(|s| !s) {
            return Err(NewickError::MissingTip(tip_names[i].clone()));
        }

        Ok(TreePlan {
            tips: tip_names.len(),
            clv_buffers: planner.next_buffer - tip_names.len(),
            operations: planner.operations,
            branch_lengths: planner.lengths,
            edge,
        })
    }

    /// Number of matrix slots used
    pub fn prob_matrices(&self) -> usize {
        self.branch_lengths.len()
    }

    /// Slot indices `0..prob_matrices()`
    pub fn slots(&self) -> Vec<usize> {
        (0..self.branch_lengths.len()).collect()
    }
}

struct Planner<'a> {
    index: HashMap<&'a str, usize>,
    seen: Vec<bool>,
    next_buffer: usize,
    operations: Vec<Operation>,
    lengths: Vec<f64>,
}

impl Planner<'_> {
    /// Emit the operations of the subtree; returns its buffer and the slot of
    /// the branch above it.
    fn visit(&mut self, node: &ParsedNode) -> Result<(usize, usize), NewickError> {
        let buffer = match node.children.as_slice() {
            [] => {
                let name = node.name.as_deref().ok_or(NewickError::UnnamedLeaf)?;
                let tip = *self
                    .index
                    .get(name)
                    .ok_or_else(|| NewickError::UnknownTip(name.to_string()))?;
                if self.seen[tip] {
                    return Err(NewickError::DuplicateTip(name.to_string()));
                }
                self.seen[tip] = true;
                tip
            }
            [a, b] => {
                let (a, sa) = self.visit(a)?;
                let (b, sb) = self.visit(b)?;
                self.join(a, sa, b, sb)
            }
            children => {
                return Err(NewickError::Multifurcation {
                    node: node.describe(),
                    children: children.len(),
                })
            }
        };

        let length = node
            .length
            .ok_or_else(|| NewickError::MissingLength(node.describe()))?;
        Ok((buffer, self.slot(length)))
    }

    fn join(&mut self, a: usize, sa: usize, b: usize, sb: usize) -> usize {
        let parent = self.next_buffer;
        self.next_buffer += 1;
        self.operations.push(Operation::new(parent, a, sa, b, sb));
        parent
    }

    fn slot(&mut self, length: f64) -> usize {
        self.lengths.push(length);
        self.lengths.len() - 1
    }
}
