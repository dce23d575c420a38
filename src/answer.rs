//! Grounded answer synthesis.
//!
//! Chat answers and organization summaries are built from retrieved context
//! only. When retrieval comes back empty the LLM is not called and a fixed
//! "no information" message is returned instead. LLM failures become a
//! visible message in the response body, never an error.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{Config, RetrievalConfig};
use crate::index::{retrieve_or_empty, VectorIndex};
use crate::llm::{ChatMessage, ChatModel, SamplingParams};

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Es,
    En,
}

impl Language {
    /// Parses a language code; anything other than `en` is Spanish.
    pub fn parse(code: Option<&str>) -> Self {
        match code.map(|c| c.trim().to_ascii_lowercase()) {
            Some(c) if c == "en" => Language::En,
            _ => Language::Es,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Language::Es => "Spanish",
            Language::En => "English",
        }
    }

    pub fn no_information(self) -> &'static str {
        match self {
            Language::Es => "No pude encontrar esta información en los documentos cargados.",
            Language::En => "I couldn’t find this information in your uploaded documents.",
        }
    }

    pub fn llm_error(self) -> &'static str {
        match self {
            Language::Es => "Se produjo un error al comunicarse con la IA. Inténtelo de nuevo más tarde.",
            Language::En => "An error occurred while communicating with the AI. Please try again later.",
        }
    }

    pub fn summary_no_information(self, country_name: &str) -> String {
        match self {
            Language::Es => format!(
                "<p>No hay documentos disponibles para generar un resumen de {}.</p>",
                country_name
            ),
            Language::En => format!(
                "<p>No documents are available to summarize for {}.</p>",
                country_name
            ),
        }
    }

    pub fn summary_error(self) -> &'static str {
        match self {
            Language::Es => "<p>Error al generar el resumen.</p>",
            Language::En => "<p>Error generating summary.</p>",
        }
    }

    /// Section headings of the HTML summary, in order.
    pub fn summary_headings(self) -> [&'static str; 4] {
        match self {
            Language::Es => [
                "Resumen general",
                "Proyectos y actividades",
                "Resultados clave",
                "Desafíos y recomendaciones",
            ],
            Language::En => [
                "Overview",
                "Projects and activities",
                "Key results",
                "Challenges and recommendations",
            ],
        }
    }
}

/// Topical queries issued for a summary, one per section.
pub const SUMMARY_QUERIES: [&str; 4] = [
    "mission, objectives and general overview of the organization",
    "main projects, programs and activities",
    "results, indicators and achievements",
    "challenges, risks and recommendations",
];

pub fn chat_messages(query: &str, context: &str, lang: Language) -> Vec<ChatMessage> {
    let system = format!(
        "You are a helpful research assistant. Answer the user's question based \
         only on the document excerpts provided. Do not use any external knowledge. \
         If the excerpts do not contain the answer, respond exactly with: \"{}\". \
         Your final response must be in {}.",
        lang.no_information(),
        lang.name()
    );
    let user = format!(
        "Document excerpts:\n---\n{}\n---\n\nQuestion: {}",
        context,
        query.trim()
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

pub fn summary_messages(country_name: &str, context: &str, lang: Language) -> Vec<ChatMessage> {
    let headings = lang
        .summary_headings()
        .iter()
        .map(|h| format!("<h3>{}</h3>", h))
        .collect::<Vec<_>>()
        .join("\n");
    let system = format!(
        "You write structured HTML summaries of an organization's documents. Use \
         only the document excerpts provided; never add external knowledge. Reply \
         with an HTML fragment (no <html> or <body>, no markdown). Use exactly these \
         section headings, in this order, each followed by <p> or <ul> content:\n{}\n\
         Omit any section the excerpts do not support. Write in {}.",
        headings,
        lang.name()
    );
    let user = format!(
        "Organization in {}.\n\nDocument excerpts:\n---\n{}\n---",
        country_name.trim(),
        context
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Answers chat and summary requests from an optional index and a chat model.
#[derive(Clone)]
pub struct Answerer {
    index: Option<VectorIndex>,
    chat: Arc<dyn ChatModel>,
    retrieval: RetrievalConfig,
    params: SamplingParams,
}

impl Answerer {
    pub fn new(index: Option<VectorIndex>, chat: Arc<dyn ChatModel>, config: &Config) -> Self {
        Self {
            index,
            chat,
            retrieval: config.retrieval.clone(),
            params: SamplingParams::from_config(&config.llm),
        }
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    pub async fn answer_query(&self, query: &str, org_id: &str, lang: Language) -> String {
        let context = retrieve_or_empty(
            self.index.as_ref(),
            query,
            org_id,
            self.retrieval.top_k,
        )
        .await;
        if context.is_empty() {
            return lang.no_information().to_string();
        }

        let messages = chat_messages(query, &context.join(CONTEXT_SEPARATOR), lang);
        match self.chat.complete(&messages, self.params).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::error!(org_id, model = self.chat.model(), error = %e, "chat completion failed");
                lang.llm_error().to_string()
            }
        }
    }

    pub async fn summarize_org(&self, org_id: &str, country_name: &str, lang: Language) -> String {
        let context = self.summary_context(org_id).await;
        if context.is_empty() {
            return lang.summary_no_information(country_name);
        }

        let messages = summary_messages(country_name, &context.join(CONTEXT_SEPARATOR), lang);
        match self.chat.complete(&messages, self.params).await {
            Ok(html) => strip_code_fence(&html),
            Err(e) => {
                tracing::error!(org_id, model = self.chat.model(), error = %e, "summary completion failed");
                lang.summary_error().to_string()
            }
        }
    }

    /// Up to `summary_per_query` chunks per topical query, first
    /// `summary_max_chunks` overall. A chunk already taken by an earlier
    /// query is skipped and the query reaches further down its ranking, so
    /// repeats never shrink the context below the cap.
    async fn summary_context(&self, org_id: &str) -> Vec<String> {
        let per_query = self.retrieval.summary_per_query;
        let max_chunks = self.retrieval.summary_max_chunks;
        let mut seen = HashSet::new();
        let mut context = Vec::new();
        for query in SUMMARY_QUERIES {
            if context.len() >= max_chunks {
                break;
            }
            let texts = retrieve_or_empty(
                self.index.as_ref(),
                query,
                org_id,
                per_query + seen.len(),
            )
            .await;
            let fresh: Vec<String> = texts
                .into_iter()
                .filter(|t| !seen.contains(t))
                .take(per_query.min(max_chunks - context.len()))
                .collect();
            for text in fresh {
                seen.insert(text.clone());
                context.push(text);
            }
        }
        context
    }
}

/// Models sometimes wrap HTML in a markdown fence despite instructions.
fn strip_code_fence(text: &str) -> String {
    let t = text.trim();
    if let Some(rest) = t.strip_prefix("```") {
        let body = rest.strip_prefix("html").unwrap_or(rest);
        let body = body.strip_suffix("```").unwrap_or(body);
        return body.trim().to_string();
    }
    t.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_falls_back_to_spanish() {
        assert_eq!(Language::parse(None), Language::Es);
        assert_eq!(Language::parse(Some("fr")), Language::Es);
        assert_eq!(Language::parse(Some("EN")), Language::En);
        assert_eq!(Language::parse(Some("es")), Language::Es);
    }

    #[test]
    fn chat_prompt_embeds_context_and_language() {
        let messages = chat_messages("  What is X? ", "ctx one\n\n---\n\nctx two", Language::En);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("English"));
        assert!(messages[0].content.contains(Language::En.no_information()));
        assert!(messages[1].content.contains("ctx one\n\n---\n\nctx two"));
        assert!(messages[1].content.ends_with("Question: What is X?"));
    }

    #[test]
    fn summary_prompt_lists_headings() {
        let messages = summary_messages("Perú", "ctx", Language::Es);
        for heading in Language::Es.summary_headings() {
            assert!(messages[0].content.contains(&format!("<h3>{}</h3>", heading)));
        }
        assert!(messages[1].content.contains("Perú"));
    }

    #[test]
    fn code_fences_are_removed() {
        assert_eq!(strip_code_fence("```html\n<h3>A</h3>\n```"), "<h3>A</h3>");
        assert_eq!(strip_code_fence("  <p>x</p> "), "<p>x</p>");
    }
}
