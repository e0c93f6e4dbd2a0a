use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::step::Step;
use super::{load_program, Program};
use crate::cancel::CancellationSignal;
use crate::config::{InterpreterConfig, TimingConfig};
use crate::crafting::OrderBatch;
use crate::error::{Result, WranglerError};
use crate::interaction::{InteractionOutcome, InteractionRequest, Interactor};
use crate::predicate::PredicateEvaluator;
use crate::status::StatusBus;
use crate::switch::ClassSwitcher;
use crate::world::Services;

/// What happened during one program run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub steps_executed: usize,
    pub soft_failures: usize,
    pub loop_ceilings_hit: usize,
    pub unknown_tags: usize,
}

struct Frame {
    base_dir: PathBuf,
    depth: usize,
}

/// Walks a step tree and dispatches leaves to the collaborators.
///
/// A failing leaf is logged and skipped; only cancellation stops a run early.
pub struct StepInterpreter {
    services: Services,
    evaluator: PredicateEvaluator,
    interactor: Interactor,
    switcher: ClassSwitcher,
    status: StatusBus,
    config: InterpreterConfig,
}

impl StepInterpreter {
    pub fn new(
        services: Services,
        status: StatusBus,
        timing: TimingConfig,
        config: InterpreterConfig,
    ) -> Self {
        Self {
            evaluator: PredicateEvaluator::from_services(&services),
            interactor: Interactor::new(services.clone(), timing.clone()),
            switcher: ClassSwitcher::new(&services, timing),
            services,
            status,
            config,
        }
    }

    /// `true` when the program ran to the end, `false` when cancelled.
    pub async fn run(&self, program: &Program, cancel: &CancellationSignal) -> bool {
        self.execute(program, cancel).await.is_ok()
    }

    /// Like [`StepInterpreter::run`] but returns the run statistics.
    /// The only error is [`WranglerError::Cancelled`].
    pub async fn execute(
        &self,
        program: &Program,
        cancel: &CancellationSignal,
    ) -> Result<RunReport> {
        let name = program.name.as_deref().unwrap_or("<unnamed>");
        info!(program = name, steps = program.steps.len(), "program started");
        let frame = Frame {
            base_dir: program.base_dir.clone(),
            depth: 0,
        };
        let mut report = RunReport::default();
        match self.run_steps(&program.steps, &frame, cancel, &mut report).await {
            Ok(()) => {
                info!(
                    program = name,
                    steps = report.steps_executed,
                    failures = report.soft_failures,
                    "program finished"
                );
                Ok(report)
            }
            Err(e) => {
                info!(program = name, steps = report.steps_executed, "program cancelled");
                Err(e)
            }
        }
    }

    fn run_steps<'a>(
        &'a self,
        steps: &'a [Step],
        frame: &'a Frame,
        cancel: &'a CancellationSignal,
        report: &'a mut RunReport,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for step in steps {
                cancel.check()?;
                report.steps_executed += 1;
                match self.run_step(step, frame, cancel, report).await {
                    Ok(()) => {}
                    Err(WranglerError::Cancelled) => return Err(WranglerError::Cancelled),
                    Err(e) => {
                        report.soft_failures += 1;
                        warn!(tag = step.tag(), error = %e, "step failed, continuing");
                    }
                }
            }
            Ok(())
        })
    }

    async fn run_step(
        &self,
        step: &Step,
        frame: &Frame,
        cancel: &CancellationSignal,
        report: &mut RunReport,
    ) -> Result<()> {
        match step {
            Step::If { condition, body } => {
                if self.evaluator.evaluate(condition) {
                    self.run_steps(body, frame, cancel, report).await?;
                }
            }
            Step::While { condition, body } => {
                let limit = self.config.while_iteration_limit;
                let mut iterations = 0u32;
                while self.evaluator.evaluate(condition) {
                    if iterations >= limit {
                        warn!(condition = %condition, limit, "while loop hit its iteration ceiling");
                        report.loop_ceilings_hit += 1;
                        break;
                    }
                    iterations += 1;
                    self.run_steps(body, frame, cancel, report).await?;
                    tokio::task::yield_now().await;
                    cancel.check()?;
                }
            }
            Step::Craft { json } => {
                let batch = OrderBatch::from_json(json)?;
                self.status.publish_directive("Crafting", batch.summary());
                let submitted = cancel.guard(self.services.crafting.submit_order(&batch)).await?;
                if !submitted {
                    return Err(order_failure(&batch));
                }
            }
            Step::GoTo { zone, location } => {
                let arrived = cancel
                    .guard(self.services.navigation.go_to(*zone, *location))
                    .await?;
                if !arrived {
                    return Err(WranglerError::Navigation { zone: *zone });
                }
            }
            Step::ChangeClass { class } => {
                if !self.switcher.switch_and_equip(*class, cancel).await? {
                    return Err(WranglerError::ClassSwitch {
                        class: class.to_string(),
                    });
                }
            }
            Step::Wait { duration } => cancel.sleep(*duration).await?,
            Step::LoadProfile { path } => {
                self.run_include(path, frame, cancel, report).await?;
            }
            Step::Interact {
                kind,
                actor,
                objective,
                zone,
                location,
                timeout,
                option,
            } => {
                let mut req = match timeout {
                    Some(t) => InteractionRequest::new(*actor, *objective, *zone, *location, *t),
                    None => self.interactor.request(*actor, *objective, *zone, *location),
                };
                req.dialog_option = *option;
                match self.interactor.run(*kind, req, cancel).await {
                    InteractionOutcome::Succeeded => {}
                    InteractionOutcome::Cancelled => return Err(WranglerError::Cancelled),
                    InteractionOutcome::NavigationFailed => {
                        return Err(WranglerError::Navigation { zone: *zone })
                    }
                    InteractionOutcome::TimedOut => {
                        return Err(WranglerError::InteractionTimeout {
                            actor: *actor,
                            objective: *objective,
                        })
                    }
                }
            }
            Step::Log { message } => {
                info!(message = %message, "program log");
                self.status.log(message.clone());
            }
            Step::Name(_) => {}
            Step::Block(body) => self.run_steps(body, frame, cancel, report).await?,
            Step::Unknown { tag, line } => {
                report.unknown_tags += 1;
                warn!(tag = %tag, line, "unknown tag, skipping");
            }
            Step::Invalid { tag, line, reason } => {
                return Err(WranglerError::Parse {
                    source_name: tag.clone(),
                    line: *line,
                    message: reason.clone(),
                });
            }
        }
        Ok(())
    }

    async fn run_include(
        &self,
        path: &str,
        frame: &Frame,
        cancel: &CancellationSignal,
        report: &mut RunReport,
    ) -> Result<()> {
        let full = resolve(&frame.base_dir, path);
        let depth = frame.depth + 1;
        if depth > self.config.max_include_depth {
            return Err(WranglerError::IncludeDepth {
                path: full.display().to_string(),
                depth,
                limit: self.config.max_include_depth,
            });
        }
        let program = load_program(&full)?;
        debug!(path = %full.display(), depth, "entering sub-program");
        let child = Frame {
            base_dir: program.base_dir.clone(),
            depth,
        };
        self.run_steps(&program.steps, &child, cancel, report).await
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn order_failure(batch: &OrderBatch) -> WranglerError {
    let (item, amount) = batch
        .orders()
        .first()
        .map(|o| (o.item, o.amount))
        .unwrap_or_default();
    WranglerError::Order {
        item,
        amount,
        reason: "crafting service reported failure".into(),
    }
}
