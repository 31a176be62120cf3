//! Prompt Templating Engine.
//!
//! The instructions sent to the generation backend live in
//! `apps/api/templates/*.md.j2`. They are embedded at build time and can be
//! overridden at runtime from a directory, so the business rules they encode
//! (item counts, structure, tone) can be edited without a redeploy.

use std::path::Path;

use minijinja::{context, Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::records::Record;

const QUESTIONNAIRE_TEMPLATE: &str = include_str!("../../templates/questionnaire.md.j2");
const SWOT_TEMPLATE: &str = include_str!("../../templates/swot.md.j2");
const ACTION_PLAN_TEMPLATE: &str = include_str!("../../templates/action_plan.md.j2");

/// Selects the template and output shape of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Questionnaire,
    Swot,
    ActionPlan,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Questionnaire, TaskKind::Swot, TaskKind::ActionPlan];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Questionnaire => "questionnaire",
            TaskKind::Swot => "swot",
            TaskKind::ActionPlan => "action_plan",
        }
    }

    /// File name of the template inside an override directory.
    pub fn template_file(&self) -> String {
        format!("{}.md.j2", self.as_str())
    }
}

/// The three prompt templates, loaded once at startup.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    questionnaire: String,
    swot: String,
    action_plan: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            questionnaire: QUESTIONNAIRE_TEMPLATE.to_string(),
            swot: SWOT_TEMPLATE.to_string(),
            action_plan: ACTION_PLAN_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Loads templates from `dir`, falling back to the embedded copy for any
    /// file that is not present. The result is syntax-checked.
    pub fn load(dir: Option<&Path>) -> anyhow::Result<Self> {
        let mut templates = Self::default();

        if let Some(dir) = dir {
            for kind in TaskKind::ALL {
                let path = dir.join(kind.template_file());
                if !path.is_file() {
                    continue;
                }
                let source = std::fs::read_to_string(&path).map_err(|e| {
                    anyhow::anyhow!("Failed to read prompt template {}: {e}", path.display())
                })?;
                info!("Using prompt template override {}", path.display());
                *templates.slot_mut(kind) = source;
            }
        }

        templates.validate()?;
        Ok(templates)
    }

    /// Compiles every template so syntax errors surface at startup.
    pub fn validate(&self) -> anyhow::Result<()> {
        let env = environment();
        for kind in TaskKind::ALL {
            env.template_from_str(self.source(kind)).map_err(|e| {
                anyhow::anyhow!("Prompt template '{}' is invalid: {e}", kind.as_str())
            })?;
        }
        Ok(())
    }

    pub fn source(&self, kind: TaskKind) -> &str {
        match kind {
            TaskKind::Questionnaire => &self.questionnaire,
            TaskKind::Swot => &self.swot,
            TaskKind::ActionPlan => &self.action_plan,
        }
    }

    fn slot_mut(&mut self, kind: TaskKind) -> &mut String {
        match kind {
            TaskKind::Questionnaire => &mut self.questionnaire,
            TaskKind::Swot => &mut self.swot,
            TaskKind::ActionPlan => &mut self.action_plan,
        }
    }

    /// Renders the instruction text for `kind`.
    ///
    /// Only present record fields reach the prompt. `action_plan` requires a
    /// non-blank `prior_output` (the SWOT analysis it builds on).
    pub fn render(
        &self,
        kind: TaskKind,
        record: &Record,
        evidence_text: &str,
        prior_output: Option<&str>,
    ) -> Result<String, AppError> {
        let swot_analysis = prior_output.map(str::trim).unwrap_or_default();
        if kind == TaskKind::ActionPlan && swot_analysis.is_empty() {
            return Err(AppError::Precondition(
                "An action plan requires a non-empty SWOT analysis".to_string(),
            ));
        }

        let ctx = context! {
            business_name => record.business_name(),
            business_info => record.describe(),
            detailed_qa => evidence_text,
            swot_analysis => swot_analysis,
        };

        environment()
            .render_str(self.source(kind), ctx)
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!(
                    "Failed to render '{}' prompt: {e}",
                    kind.as_str()
                ))
            })
    }
}

fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
