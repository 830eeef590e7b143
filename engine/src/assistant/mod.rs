//! Conversational assistant
//!
//! Ties the planner, executor, and formatter together behind one `answer`
//! call and keeps a short per-user conversation history so follow-up
//! questions plan in context. Planning failures turn into a localized
//! apology instead of an error; execution failures are already contained
//! inside the result bundle.

use crate::executor::PlanExecutor;
use crate::formatter;
use crate::llm::Message;
use crate::locale;
use crate::planner::QueryPlanner;
use sdk::types::Answer;
use sdk::BridgeErrorExt;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Conversation turns kept per user.
const HISTORY_TURNS: usize = 10;

/// One question/answer exchange
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

pub struct Assistant {
    planner: QueryPlanner,
    executor: PlanExecutor,
    history: Mutex<HashMap<String, Vec<ChatTurn>>>,
}

impl Assistant {
    pub fn new(planner: QueryPlanner, executor: PlanExecutor) -> Self {
        Self {
            planner,
            executor,
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Answer one question for one user. Never returns an error: anything
    /// that goes wrong becomes a localized apology or a partial answer.
    pub async fn answer(&self, question: &str, user_id: &str) -> Answer {
        let locale = locale::detect(question);
        let context = self.context_messages(user_id).await;

        let plan = match self.planner.plan(question, locale, &context).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!("Planning failed for user '{}': {} ({})", user_id, e, e.user_hint());
                let answer = formatter::planning_failure(&e, locale);
                self.record(user_id, question, &answer).await;
                return answer;
            }
        };

        tracing::info!(
            "Plan {} for user '{}': {} step(s)",
            plan.id,
            user_id,
            plan.steps.len()
        );

        let bundle = self.executor.execute(&plan).await;
        let answer = formatter::format(&bundle, locale);
        self.record(user_id, question, &answer).await;
        answer
    }

    /// Recent turns of one user, oldest first.
    pub async fn turns(&self, user_id: &str) -> Vec<ChatTurn> {
        let history = self.history.lock().await;
        history.get(user_id).cloned().unwrap_or_default()
    }

    async fn context_messages(&self, user_id: &str) -> Vec<Message> {
        let history = self.history.lock().await;
        history
            .get(user_id)
            .map(|turns| {
                turns
                    .iter()
                    .flat_map(|t| {
                        [
                            Message::user(&t.question),
                            Message::assistant(&t.answer),
                        ]
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn record(&self, user_id: &str, question: &str, answer: &Answer) {
        let mut history = self.history.lock().await;
        let turns = history.entry(user_id.to_string()).or_default();
        turns.push(ChatTurn {
            question: question.to_string(),
            answer: answer.text.clone(),
            at: chrono::Utc::now(),
        });
        if turns.len() > HISTORY_TURNS {
            let excess = turns.len() - HISTORY_TURNS;
            turns.drain(..excess);
        }
    }
}
