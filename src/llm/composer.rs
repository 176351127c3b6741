use std::fmt;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::providers::traits::CompletionProvider;

/// Prompt sent to the model. The model may only use the supplied context.
pub const PROMPT_TEMPLATE: &str =
    "Answer the question based only on the following context:\n{context}\nQuestion: {question}\n";

/// Final answer text returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Fills the template in a single pass, so placeholder-like text inside the
/// context or the question is copied verbatim.
pub fn build_prompt<S: AsRef<str>>(question: &str, context_chunks: &[S]) -> String {
    let context = context_chunks
        .iter()
        .map(|chunk| chunk.as_ref())
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = String::with_capacity(PROMPT_TEMPLATE.len() + context.len() + question.len());
    let mut rest = PROMPT_TEMPLATE;
    while let Some(open) = rest.find('{') {
        prompt.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix("{context}") {
            prompt.push_str(&context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{question}") {
            prompt.push_str(question);
            rest = after;
        } else {
            prompt.push('{');
            rest = &tail[1..];
        }
    }
    prompt.push_str(rest);
    prompt
}

/// Turns a question and its retrieved context into an answer.
#[derive(Clone)]
pub struct AnswerComposer {
    provider: Arc<dyn CompletionProvider>,
}

impl AnswerComposer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub async fn compose<S: AsRef<str> + Sync>(
        &self,
        question: &str,
        context_chunks: &[S],
    ) -> Result<Answer, PipelineError> {
        let prompt = build_prompt(question, context_chunks);
        log::debug!(
            "Prompt with {} context chunks, {} chars",
            context_chunks.len(),
            prompt.chars().count()
        );

        let raw = self
            .provider
            .complete(&prompt)
            .await
            .map_err(|e| PipelineError::GenerationFailure(e.to_string()))?;

        let text = raw.trim();
        if text.is_empty() {
            return Err(PipelineError::GenerationFailure(
                "model returned an empty answer".to_string(),
            ));
        }

        Ok(Answer {
            text: text.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingModel;

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt(
            "How many customers?",
            &["summary.customer_count: 12", "summary.region: global"],
        );
        assert_eq!(
            prompt,
            "Answer the question based only on the following context:\n\
             summary.customer_count: 12\nsummary.region: global\n\
             Question: How many customers?\n"
        );
    }

    #[test]
    fn test_prompt_contains_only_question_and_chunks() {
        let chunks = ["a: 1\nb: 2", "c: 3"];
        let question = "what is c?";
        let prompt = build_prompt(question, &chunks);

        assert!(prompt.contains(question));
        for chunk in &chunks {
            assert!(prompt.contains(chunk));
        }
        let stripped = prompt
            .replacen(&chunks.join("\n"), "", 1)
            .replacen(question, "", 1);
        assert_eq!(
            stripped,
            "Answer the question based only on the following context:\n\nQuestion: \n"
        );
    }

    #[test]
    fn test_placeholders_in_input_are_not_expanded() {
        let prompt = build_prompt("why {context}?", &["value: {question}"]);
        assert!(prompt.contains("value: {question}\n"));
        assert!(prompt.contains("Question: why {context}?\n"));
    }

    #[tokio::test]
    async fn test_compose_trims_answer() {
        let model = RecordingModel::replying("\n  There are 12 customers.  \n");
        let composer = AnswerComposer::new(model.clone());

        let answer = composer
            .compose("How many customers?", &["summary.customer_count: 12".to_string()])
            .await
            .unwrap();
        assert_eq!(answer.text, "There are 12 customers.");
        assert_eq!(answer.to_string(), "There are 12 customers.");

        let prompt = model.last_prompt().unwrap();
        assert!(prompt.starts_with("Answer the question based only on the following context:"));
        assert!(prompt.contains("summary.customer_count: 12"));
    }

    #[tokio::test]
    async fn test_compose_multibyte_context() {
        let model = RecordingModel::replying("Zoë");
        let composer = AnswerComposer::new(model.clone());
        let answer = composer.compose("Who lives in Zürich?", &["city: Zürich\nname: Zoë"]).await.unwrap();
        assert_eq!(answer.text, "Zoë");
        assert!(model.last_prompt().unwrap().contains("city: Zürich\nname: Zoë\nQuestion: Who lives in Zürich?\n"));
    }

    #[tokio::test]
    async fn test_generation_failure() {
        let composer = AnswerComposer::new(RecordingModel::failing("connection refused"));
        let err = composer.compose("q", &["c"]).await.unwrap_err();
        match err {
            PipelineError::GenerationFailure(message) => assert!(message.contains("connection refused")),
            other => panic!("expected GenerationFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blank_answer_is_failure() {
        let composer = AnswerComposer::new(RecordingModel::replying("   \n"));
        let err = composer.compose("q", &["c"]).await.unwrap_err();
        assert!(matches!(err, PipelineError::GenerationFailure(_)));
    }
}
