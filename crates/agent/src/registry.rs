use std::fmt;

use crate::invoke::AgentOutput;
use crate::llm::OutputShape;
use crate::prompts;
use crate::tools::RUN_SQL_TOOL;
use courtside_core::domain::schemas::{
    FrontDeskReply, IntentDecision, KnowledgeAnswer, ModeratedText, SqlResult,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentRole {
    IntentJudge,
    SqlAgent,
    KnowledgeAgent,
    FrontDesk,
    Moderator,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] =
        [Self::IntentJudge, Self::SqlAgent, Self::KnowledgeAgent, Self::FrontDesk, Self::Moderator];

    pub fn name(&self) -> &'static str {
        match self {
            Self::IntentJudge => "Intent Judge",
            Self::SqlAgent => "SQL Agent",
            Self::KnowledgeAgent => "Knowledge Agent",
            Self::FrontDesk => "Front Desk Agent",
            Self::Moderator => "Agents Response Moderator",
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::IntentJudge => 0,
            Self::SqlAgent => 1,
            Self::KnowledgeAgent => 2,
            Self::FrontDesk => 3,
            Self::Moderator => 4,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentSpec {
    pub role: AgentRole,
    pub model: String,
    pub instructions: &'static str,
    pub output: OutputShape,
    pub tools: Vec<&'static str>,
}

impl AgentSpec {
    fn standard(role: AgentRole, model: &str) -> Self {
        let (instructions, output, tools) = match role {
            AgentRole::IntentJudge => {
                (prompts::INTENT_JUDGE, IntentDecision::output_shape(), Vec::new())
            }
            AgentRole::SqlAgent => (prompts::SQL_AGENT, SqlResult::output_shape(), Vec::new()),
            AgentRole::KnowledgeAgent => {
                (prompts::KNOWLEDGE_AGENT, KnowledgeAnswer::output_shape(), Vec::new())
            }
            AgentRole::FrontDesk => {
                (prompts::FRONT_DESK, FrontDeskReply::output_shape(), Vec::new())
            }
            AgentRole::Moderator => {
                (prompts::MODERATOR, ModeratedText::output_shape(), vec![RUN_SQL_TOOL])
            }
        };

        Self { role, model: model.to_string(), instructions, output, tools }
    }
}

/// Immutable role table, built once at startup and shared by every turn.
#[derive(Clone, Debug)]
pub struct AgentRegistry {
    specs: [AgentSpec; 5],
}

impl AgentRegistry {
    pub fn standard(model: &str) -> Self {
        Self { specs: AgentRole::ALL.map(|role| AgentSpec::standard(role, model)) }
    }

    pub fn get(&self, role: AgentRole) -> &AgentSpec {
        &self.specs[role.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentSpec> {
        self.specs.iter()
    }
}
