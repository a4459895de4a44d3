//! Grounded prompt assembly
//!
//! Retrieved chunks become a context block of `[Source p.X] text` entries; the
//! context, the question and a few recent conversation turns are then laid
//! into a fixed template that tells the model to answer only from the context
//! and cite every fact.

use crate::retrieval::RetrievedChunk;
use serde::{Deserialize, Serialize};

/// Turns folded into the prompt unless configured otherwise
pub const DEFAULT_HISTORY_TURNS: usize = 3;

/// Speaker of a conversation turn. Roles other than user and assistant are
/// kept verbatim and rendered upper-cased like the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    User,
    Assistant,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Other(role) => role,
        }
    }
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        match role.to_lowercase().as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Other(role),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(role) => role,
            known => known.as_str().to_string(),
        }
    }
}

/// A prior turn supplied by the caller; the server keeps no sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Concatenate chunks in retrieval order as `[Source p.<page>] <text>\n\n`
pub fn build_context(results: &[RetrievedChunk]) -> String {
    let mut context = String::new();
    for result in results {
        context.push_str(&format!(
            "[Source p.{}] {}\n\n",
            result.chunk.page_label(),
            result.chunk.text
        ));
    }
    context
}

/// Fixed prompt template with a configurable persona
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    assistant_role: String,
    source_document: String,
    history_turns: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            assistant_role: "Cotton Pest and Disease Management expert assistant".to_string(),
            source_document: "ICAR-CICR Advisory document".to_string(),
            history_turns: DEFAULT_HISTORY_TURNS,
        }
    }
}

impl PromptBuilder {
    pub fn new(
        assistant_role: impl Into<String>,
        source_document: impl Into<String>,
        history_turns: usize,
    ) -> Self {
        Self {
            assistant_role: assistant_role.into(),
            source_document: source_document.into(),
            history_turns,
        }
    }

    /// Render the generation prompt
    pub fn build(&self, query: &str, context: &str, history: &[ConversationTurn]) -> String {
        let conversation_history = self.format_history(history);

        format!(
            "You are a {role}. Answer the following question using ONLY the provided context from the {document}.
{conversation_history}
Guidelines:
- Provide accurate, actionable information for cotton farmers
- Cite sources using [Source p.X] format for every fact
- If the context doesn't contain the answer, clearly state that
- Be concise but comprehensive
- Use bullet points for multiple items
- Focus on practical recommendations
- Consider the conversation history to provide contextually relevant answers

Context:
{context}

Question: {query}

Answer:",
            role = self.assistant_role,
            document = self.source_document,
        )
    }

    /// The last `history_turns` turns as `ROLE: content` lines; empty when there
    /// is no history.
    fn format_history(&self, history: &[ConversationTurn]) -> String {
        if history.is_empty() || self.history_turns == 0 {
            return String::new();
        }

        let start = history.len().saturating_sub(self.history_turns);
        let mut block = String::from("\n\nPrevious conversation:\n");
        for turn in &history[start..] {
            block.push_str(&format!(
                "{}: {}\n",
                turn.role.as_str().to_uppercase(),
                turn.content
            ));
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Chunk;
    use serde_json::{json, Map, Value};

    fn retrieved(text: &str, metadata: Value) -> RetrievedChunk {
        RetrievedChunk {
            position: 0,
            chunk: Chunk::new(text, metadata.as_object().cloned().unwrap_or_else(Map::new)),
            distance: 0.0,
        }
    }

    #[test]
    fn test_context_single_chunk() {
        let results = vec![retrieved(
            "Pink bollworm is controlled by pheromone traps.",
            json!({"page": 12}),
        )];
        assert_eq!(
            build_context(&results),
            "[Source p.12] Pink bollworm is controlled by pheromone traps.\n\n"
        );
    }

    #[test]
    fn test_context_markers_in_order() {
        let results = vec![
            retrieved("first", json!({"page_label": "iv", "page": 3})),
            retrieved("second", json!({})),
            retrieved("third", json!({"page": 7})),
        ];
        let context = build_context(&results);

        assert_eq!(context.matches("[Source p.").count(), 3);
        let first = context.find("[Source p.iv] first").unwrap();
        let second = context.find("[Source p.?] second").unwrap();
        let third = context.find("[Source p.7] third").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_context_empty() {
        assert_eq!(build_context(&[]), "");
    }

    #[test]
    fn test_prompt_sections_in_order() {
        let builder = PromptBuilder::default();
        let prompt = builder.build("How to control whitefly?", "[Source p.4] Use yellow traps.\n\n", &[]);

        let persona = prompt.find("Cotton Pest and Disease Management expert").unwrap();
        let guidelines = prompt.find("Guidelines:").unwrap();
        let context = prompt.find("Context:\n[Source p.4] Use yellow traps.").unwrap();
        let question = prompt.find("Question: How to control whitefly?").unwrap();
        assert!(persona < guidelines && guidelines < context && context < question);
        assert!(prompt.ends_with("Answer:"));
        assert!(!prompt.contains("Previous conversation"));
    }

    #[test]
    fn test_prompt_keeps_last_three_turns() {
        let builder = PromptBuilder::default();
        let history = vec![
            ConversationTurn::user("oldest question"),
            ConversationTurn::assistant("oldest answer"),
            ConversationTurn::user("What about whitefly?"),
            ConversationTurn::assistant("Use yellow sticky traps."),
        ];
        let prompt = builder.build("And the dosage?", "ctx", &history);

        assert!(prompt.contains("Previous conversation:\n"));
        assert!(!prompt.contains("oldest question"));
        assert!(prompt.contains("ASSISTANT: oldest answer\n"));
        assert!(prompt.contains("USER: What about whitefly?\n"));
        assert!(prompt.contains("ASSISTANT: Use yellow sticky traps.\n"));
        assert!(prompt.find("Previous conversation").unwrap() < prompt.find("Guidelines:").unwrap());
    }

    #[test]
    fn test_unknown_role_rendered_upper_case() {
        let turns: Vec<ConversationTurn> = serde_json::from_str(
            r#"[{"role": "system", "content": "Farmer grows Bt cotton"},
                {"role": "Assistant", "content": "Noted."}]"#,
        )
        .unwrap();
        assert_eq!(turns[0].role, Role::Other("system".to_string()));
        assert_eq!(turns[1].role, Role::Assistant);

        let prompt = PromptBuilder::default().build("Which pests?", "ctx", &turns);
        assert!(prompt.contains("SYSTEM: Farmer grows Bt cotton\n"));
        assert!(prompt.contains("ASSISTANT: Noted.\n"));

        let echoed = serde_json::to_value(&turns[0]).unwrap();
        assert_eq!(echoed["role"], "system");
    }

    #[test]
    fn test_persona_restricts_answers_to_context() {
        let prompt = PromptBuilder::default().build("q", "ctx", &[]);
        assert!(prompt.starts_with(
            "You are a Cotton Pest and Disease Management expert assistant. \
             Answer the following question using ONLY the provided context from the ICAR-CICR Advisory document."
        ));
    }

    #[test]
    fn test_turn_role_defaults_to_user() {
        let turn: ConversationTurn = serde_json::from_str(r#"{"content": "hi"}"#).unwrap();
        assert_eq!(turn.role, Role::User);
    }
}
