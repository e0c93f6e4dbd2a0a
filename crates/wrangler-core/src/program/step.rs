use std::time::Duration;

use super::node::StepNode;
use crate::interaction::InteractionKind;
use crate::types::{ActorId, ClassJob, ObjectiveId, Position, ZoneId};

/// Container tags whose children run in order.
const BLOCK_TAGS: &[&str] = &["Profile", "Order", "Steps", "Sequence"];

/// Typed view of a [`StepNode`].
///
/// Attribute problems are kept as [`Step::Invalid`] instead of failing the
/// whole program: a bad leaf is skipped at run time like any other failing
/// leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    If {
        condition: String,
        body: Vec<Step>,
    },
    While {
        condition: String,
        body: Vec<Step>,
    },
    Craft {
        json: String,
    },
    GoTo {
        zone: ZoneId,
        location: Position,
    },
    ChangeClass {
        class: ClassJob,
    },
    Wait {
        duration: Duration,
    },
    LoadProfile {
        path: String,
    },
    Interact {
        kind: InteractionKind,
        actor: ActorId,
        objective: ObjectiveId,
        zone: ZoneId,
        location: Position,
        timeout: Option<Duration>,
        option: Option<u32>,
    },
    Log {
        message: String,
    },
    Name(String),
    Block(Vec<Step>),
    Unknown {
        tag: String,
        line: usize,
    },
    Invalid {
        tag: String,
        line: usize,
        reason: String,
    },
}

impl Step {
    pub fn from_node(node: &StepNode) -> Step {
        match build(node) {
            Ok(step) => step,
            Err(reason) => Step::Invalid {
                tag: node.tag.clone(),
                line: node.line,
                reason,
            },
        }
    }

    /// Children of the root element, in order.
    pub fn program_body(root: &StepNode) -> Vec<Step> {
        root.children.iter().map(Step::from_node).collect()
    }

    pub fn tag(&self) -> &str {
        match self {
            Step::If { .. } => "If",
            Step::While { .. } => "While",
            Step::Craft { .. } => "Craft",
            Step::GoTo { .. } => "GoTo",
            Step::ChangeClass { .. } => "ChangeClass",
            Step::Wait { .. } => "Wait",
            Step::LoadProfile { .. } => "LoadProfile",
            Step::Interact { kind, .. } => match kind {
                InteractionKind::Acquire => "PickupQuest",
                InteractionKind::Deliver => "TurnIn",
                InteractionKind::Dialog => "TalkTo",
            },
            Step::Log { .. } => "Log",
            Step::Name(_) => "Name",
            Step::Block(_) => "Block",
            Step::Unknown { tag, .. } | Step::Invalid { tag, .. } => tag,
        }
    }

    pub fn children(&self) -> &[Step] {
        match self {
            Step::If { body, .. } | Step::While { body, .. } | Step::Block(body) => body,
            _ => &[],
        }
    }
}

fn build(node: &StepNode) -> Result<Step, String> {
    let tag = node.tag.as_str();
    let body = || node.children.iter().map(Step::from_node).collect::<Vec<_>>();

    let step = match tag.to_ascii_lowercase().as_str() {
        "if" => Step::If {
            condition: required(node, "Condition")?.to_string(),
            body: body(),
        },
        "while" => Step::While {
            condition: required(node, "Condition")?.to_string(),
            body: body(),
        },
        "craft" => Step::Craft {
            json: match node.attr("Json") {
                Some(j) => j.to_string(),
                None if !node.text.is_empty() => node.text.clone(),
                None => return Err("missing attribute 'Json'".into()),
            },
        },
        "goto" => Step::GoTo {
            zone: number(node, "ZoneId")?,
            location: position(node)?,
        },
        "changeclass" => Step::ChangeClass {
            class: required(node, "Class")?
                .parse::<ClassJob>()
                .map_err(|e| e.to_string())?,
        },
        "wait" => Step::Wait {
            duration: wait_duration(node)?,
        },
        "loadprofile" => Step::LoadProfile {
            path: required(node, "Path")?.to_string(),
        },
        "talkto" => interact(node, InteractionKind::Dialog)?,
        "pickupquest" => interact(node, InteractionKind::Acquire)?,
        "turnin" => interact(node, InteractionKind::Deliver)?,
        "log" => Step::Log {
            message: node
                .attr("Message")
                .map(str::to_string)
                .unwrap_or_else(|| node.text.clone()),
        },
        "name" => Step::Name(node.text.clone()),
        _ if BLOCK_TAGS.iter().any(|b| node.is(b)) => Step::Block(body()),
        _ => Step::Unknown {
            tag: tag.to_string(),
            line: node.line,
        },
    };
    Ok(step)
}

fn required<'n>(node: &'n StepNode, name: &str) -> Result<&'n str, String> {
    node.attr(name)
        .ok_or_else(|| format!("missing attribute '{name}'"))
}

fn number<T: std::str::FromStr>(node: &StepNode, name: &str) -> Result<T, String> {
    let raw = required(node, name)?;
    raw.trim()
        .parse()
        .map_err(|_| format!("attribute '{name}' is not a number: '{raw}'"))
}

fn optional_number<T: std::str::FromStr>(node: &StepNode, name: &str) -> Result<Option<T>, String> {
    match node.attr(name) {
        Some(_) => number(node, name).map(Some),
        None => Ok(None),
    }
}

fn position(node: &StepNode) -> Result<Position, String> {
    required(node, "Location")?.parse()
}

fn wait_duration(node: &StepNode) -> Result<Duration, String> {
    if let Some(ms) = optional_number::<u64>(node, "Milliseconds")? {
        return Ok(Duration::from_millis(ms));
    }
    if let Some(secs) = optional_number::<f64>(node, "Seconds")? {
        return Duration::try_from_secs_f64(secs)
            .map_err(|e| format!("invalid wait of {secs} seconds: {e}"));
    }
    Err("Wait needs 'Seconds' or 'Milliseconds'".into())
}

fn interact(node: &StepNode, kind: InteractionKind) -> Result<Step, String> {
    Ok(Step::Interact {
        kind,
        actor: number(node, "ActorId")?,
        objective: optional_number(node, "ObjectiveId")?.unwrap_or(0),
        zone: number(node, "ZoneId")?,
        location: position(node)?,
        timeout: optional_number::<u64>(node, "Timeout")?.map(Duration::from_secs),
        option: optional_number(node, "Option")?,
    })
}
