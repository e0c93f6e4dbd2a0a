//! Boolean conditions used by `If` / `While` steps.
//!
//! Grammar, loosest first: `or`, `and`, `not`, `( ... )`, atomic predicate.
//! The connectives are found by a case-insensitive, whitespace-delimited
//! keyword match at parenthesis depth 0, not by a tokenizer, so predicate
//! arguments must not themselves contain ` and ` / ` or ` / `not `.
//!
//! Anything that matches no known predicate evaluates to `true` and is logged.
//! Existing programs rely on that to get past conditions nobody implemented.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::warn;

use crate::types::{ClassJob, ItemId, ItemQuality, ObjectiveId};
use crate::world::{Character, Inventory, QuestLedger, Services};

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            _ => None,
        }
    }

    pub fn apply(self, lhs: u32, rhs: u32) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    IsQuestCompleted(ObjectiveId),
    HasQuest(ObjectiveId),
    HasItem(ItemId),
    HqHasAtLeast(ItemId, u32),
    NqHasAtLeast(ItemId, u32),
    /// Neither completed nor currently held.
    IsQuestAcceptQualified(ObjectiveId),
    QuestStep {
        objective: ObjectiveId,
        op: CompareOp,
        value: u32,
    },
    ClassLevel {
        class: ClassJob,
        op: CompareOp,
        value: u32,
    },
    CurrentClassLevel {
        op: CompareOp,
        value: u32,
    },
    ClassIs {
        class: ClassJob,
        negated: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Or(Vec<Condition>),
    And(Vec<Condition>),
    Not(Box<Condition>),
    Literal(bool),
    Atom(Predicate),
    Unknown(String),
}

impl Condition {
    /// Text of every sub-expression that matched no predicate.
    pub fn unknowns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_unknowns(&mut out);
        out
    }

    fn collect_unknowns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Or(parts) | Condition::And(parts) => {
                parts.iter().for_each(|p| p.collect_unknowns(out))
            }
            Condition::Not(inner) => inner.collect_unknowns(out),
            Condition::Unknown(text) => out.push(text),
            Condition::Literal(_) | Condition::Atom(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

pub fn parse_condition(expression: &str) -> Condition {
    let decoded = decode_comparisons(expression);
    parse_expr(decoded.trim())
}

fn decode_comparisons(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn parse_expr(s: &str) -> Condition {
    let s = s.trim();

    let parts = split_top_level(s, "or");
    if parts.len() > 1 {
        return Condition::Or(parts.into_iter().map(parse_expr).collect());
    }

    let parts = split_top_level(s, "and");
    if parts.len() > 1 {
        return Condition::And(parts.into_iter().map(parse_expr).collect());
    }

    if let Some(rest) = strip_not(s) {
        return Condition::Not(Box::new(parse_expr(rest)));
    }

    if let Some(inner) = strip_group(s) {
        return parse_expr(inner);
    }

    if s.eq_ignore_ascii_case("true") {
        return Condition::Literal(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Condition::Literal(false);
    }

    match parse_atom(s) {
        Some(p) => Condition::Atom(p),
        None => Condition::Unknown(s.to_string()),
    }
}

/// Split on `<ws>keyword<ws>` at depth 0, case-insensitively.
fn split_top_level<'a>(s: &'a str, keyword: &str) -> Vec<&'a str> {
    let bytes = s.as_bytes();
    let kw = keyword.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            b if depth == 0 && b.is_ascii_whitespace() => {
                let mut j = i;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                let end = j + kw.len();
                if end < bytes.len()
                    && bytes[j..end].eq_ignore_ascii_case(kw)
                    && bytes[end].is_ascii_whitespace()
                {
                    parts.push(&s[start..i]);
                    let mut k = end;
                    while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                        k += 1;
                    }
                    start = k;
                    i = k;
                    continue;
                }
                i = j;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

fn strip_not(s: &str) -> Option<&str> {
    let head = s.get(..3)?;
    if !head.eq_ignore_ascii_case("not") {
        return None;
    }
    let rest = &s[3..];
    match rest.bytes().next() {
        Some(b) if b.is_ascii_whitespace() || b == b'(' => Some(rest.trim_start()),
        _ => None,
    }
}

/// `( inner )` when the opening paren closes at the very end.
fn strip_group(s: &str) -> Option<&str> {
    if !s.starts_with('(') || !s.ends_with(')') {
        return None;
    }
    let mut depth = 0i32;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 && i != s.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then(|| &s[1..s.len() - 1])
}

// ---------------------------------------------------------------------------
// Atomic predicates
// ---------------------------------------------------------------------------

struct Patterns {
    unary: Regex,
    binary: Regex,
    quest_step: Regex,
    class_level: Regex,
    current_level: Regex,
    class_name: Regex,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| Patterns {
        unary: Regex::new(
            r"^(IsQuestCompleted|HasQuest|HasItem|IsQuestAcceptQualified)\(\s*(\d+)\s*\)$",
        )
        .unwrap(),
        binary: Regex::new(r"^(HqHasAtLeast|NqHasAtLeast)\(\s*(\d+)\s*,\s*(\d+)\s*\)$").unwrap(),
        quest_step: Regex::new(r"^GetQuestStep\(\s*(\d+)\s*\)\s*(==|!=|<=|>=|<|>)\s*(\d+)$")
            .unwrap(),
        class_level: Regex::new(
            r"^Levels\[\s*(?:ClassJobType\.)?(\w+)\s*\]\s*(==|!=|<=|>=|<|>)\s*(\d+)$",
        )
        .unwrap(),
        current_level: Regex::new(r"^CurrentClassLevel\s*(==|!=|<=|>=|<|>)\s*(\d+)$").unwrap(),
        class_name: Regex::new(r"^ClassName\s*(==|!=)\s*(?:ClassJobType\.)?(\w+)$").unwrap(),
    })
}

fn parse_atom(s: &str) -> Option<Predicate> {
    let p = patterns();

    if let Some(c) = p.unary.captures(s) {
        let id: u32 = c[2].parse().ok()?;
        return Some(match &c[1] {
            "IsQuestCompleted" => Predicate::IsQuestCompleted(id),
            "HasQuest" => Predicate::HasQuest(id),
            "HasItem" => Predicate::HasItem(id),
            _ => Predicate::IsQuestAcceptQualified(id),
        });
    }

    if let Some(c) = p.binary.captures(s) {
        let id: u32 = c[2].parse().ok()?;
        let count: u32 = c[3].parse().ok()?;
        return Some(if &c[1] == "HqHasAtLeast" {
            Predicate::HqHasAtLeast(id, count)
        } else {
            Predicate::NqHasAtLeast(id, count)
        });
    }

    if let Some(c) = p.quest_step.captures(s) {
        return Some(Predicate::QuestStep {
            objective: c[1].parse().ok()?,
            op: CompareOp::parse(&c[2])?,
            value: c[3].parse().ok()?,
        });
    }

    if let Some(c) = p.class_level.captures(s) {
        return Some(Predicate::ClassLevel {
            class: c[1].parse().ok()?,
            op: CompareOp::parse(&c[2])?,
            value: c[3].parse().ok()?,
        });
    }

    if let Some(c) = p.current_level.captures(s) {
        return Some(Predicate::CurrentClassLevel {
            op: CompareOp::parse(&c[1])?,
            value: c[2].parse().ok()?,
        });
    }

    if let Some(c) = p.class_name.captures(s) {
        return Some(Predicate::ClassIs {
            class: c[2].parse().ok()?,
            negated: &c[1] == "!=",
        });
    }

    None
}

// ---------------------------------------------------------------------------
// PredicateEvaluator
// ---------------------------------------------------------------------------

/// Evaluates conditions against live world state. Nothing is cached: every
/// call re-parses the text and re-queries the collaborators.
#[derive(Clone)]
pub struct PredicateEvaluator {
    ledger: Arc<dyn QuestLedger>,
    inventory: Arc<dyn Inventory>,
    character: Arc<dyn Character>,
}

impl PredicateEvaluator {
    pub fn new(
        ledger: Arc<dyn QuestLedger>,
        inventory: Arc<dyn Inventory>,
        character: Arc<dyn Character>,
    ) -> Self {
        Self {
            ledger,
            inventory,
            character,
        }
    }

    pub fn from_services(services: &Services) -> Self {
        Self::new(
            Arc::clone(&services.ledger),
            Arc::clone(&services.inventory),
            Arc::clone(&services.character),
        )
    }

    pub fn evaluate(&self, expression: &str) -> bool {
        self.eval(&parse_condition(expression))
    }

    pub fn eval(&self, condition: &Condition) -> bool {
        match condition {
            Condition::Or(parts) => parts.iter().any(|p| self.eval(p)),
            Condition::And(parts) => parts.iter().all(|p| self.eval(p)),
            Condition::Not(inner) => !self.eval(inner),
            Condition::Literal(v) => *v,
            Condition::Atom(p) => self.eval_predicate(p),
            Condition::Unknown(text) => {
                warn!(expression = %text, "unrecognized condition, treating as true");
                true
            }
        }
    }

    fn eval_predicate(&self, predicate: &Predicate) -> bool {
        match *predicate {
            Predicate::IsQuestCompleted(id) => self.ledger.is_objective_completed(id),
            Predicate::HasQuest(id) => self.ledger.has_objective(id),
            Predicate::HasItem(id) => self.inventory.item_count(id, ItemQuality::Any) > 0,
            Predicate::HqHasAtLeast(id, n) => self.inventory.item_count(id, ItemQuality::High) >= n,
            Predicate::NqHasAtLeast(id, n) => {
                self.inventory.item_count(id, ItemQuality::Normal) >= n
            }
            Predicate::IsQuestAcceptQualified(id) => {
                !self.ledger.is_objective_completed(id) && !self.ledger.has_objective(id)
            }
            Predicate::QuestStep {
                objective,
                op,
                value,
            } => op.apply(self.ledger.objective_step(objective), value),
            Predicate::ClassLevel { class, op, value } => {
                op.apply(self.character.level(class), value)
            }
            Predicate::CurrentClassLevel { op, value } => {
                let level = self
                    .character
                    .current_class()
                    .map(|c| self.character.level(c))
                    .unwrap_or(0);
                op.apply(level, value)
            }
            Predicate::ClassIs { class, negated } => {
                (self.character.current_class() == Some(class)) != negated
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
