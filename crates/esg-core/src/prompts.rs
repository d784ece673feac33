//! Prompt construction for search, extraction, intent classification and
//! question answering.

use std::fmt::Write as _;

use crate::{
  llm::Prompt,
  research::truncate_chars,
  schema::Category,
  store::{NewSource, Source},
};

/// Per-source cap in the extraction prompt, in characters.
pub const EXTRACTION_SOURCE_CHARS: usize = 5_000;
/// Cap on all source content in the extraction prompt, in characters.
pub const EXTRACTION_TOTAL_CHARS: usize = 15_000;
/// Sources used as answer context, newest first.
pub const RAG_SOURCES: usize = 3;
/// Per-source cap in the answer context, in characters.
pub const RAG_SOURCE_CHARS: usize = 3_000;

const SOURCE_SEPARATOR: &str = "\n\n---\n\n";

pub fn search_query(company: &str) -> String {
  format!(
    "{company} sustainability ESG report environmental social governance practices"
  )
}

pub fn extraction_prompt(company: &str, sources: &[NewSource]) -> Prompt {
  let content = sources
    .iter()
    .map(|s| {
      format!(
        "Source: {}\n{}",
        s.url,
        truncate_chars(&s.text, EXTRACTION_SOURCE_CHARS)
      )
    })
    .collect::<Vec<_>>()
    .join(SOURCE_SEPARATOR);
  let content = truncate_chars(&content, EXTRACTION_TOTAL_CHARS);

  let mut metric_list = String::new();
  for category in Category::ALL {
    let _ = writeln!(metric_list, "{category}:");
    for name in category.metric_names() {
      let _ = writeln!(metric_list, "  - {name}");
    }
  }

  let user = format!(
    "Analyze the following content about {company} and score its sustainability \
     practices.\n\n\
     For every metric below give a value from 0 to 100 (0 very poor, 50 average, \
     100 excellent) and a confidence from 0 to 1 (0 no evidence, 1 verified \
     data). Use the exact metric names.\n\n\
     {metric_list}\n\
     Return only a JSON object of this shape:\n\
     {{\"metrics\": [{{\"category\": \"Environmental|Social|Governance\", \
     \"metric_name\": \"...\", \"value\": 0, \"confidence\": 0.0, \
     \"evidence\": \"short quote or summary\"}}]}}\n\n\
     CONTENT:\n{content}\n"
  );

  Prompt::new(
    "You are a sustainability metrics extraction expert. Return only valid JSON.",
    user,
  )
}

pub fn intent_prompt(text: &str, known: &[String]) -> Prompt {
  let known = if known.is_empty() { "none".to_owned() } else { known.join(", ") };
  let user = format!(
    "Classify the message for a sustainability analysis assistant.\n\n\
     Return a JSON object: {{\"intent\": \"analyze|compare|rag_question|show_score|\
     report|delete|list|clear|unknown\", \"companies\": [\"...\"], \"question\": \
     \"the question for rag_question, otherwise null\"}}\n\n\
     - analyze: research and score one or more companies\n\
     - compare: compare two or more companies\n\
     - rag_question: a specific question about one company\n\
     - show_score: show a company's scores, strengths and weaknesses\n\
     - report: a downloadable report for one company, or a comparison report\n\
     - delete: remove companies from the database\n\
     - list: list analyzed companies\n\
     - clear: remove everything\n\n\
     Companies already analyzed: {known}\n\n\
     MESSAGE:\n{text}\n"
  );
  Prompt::new(
    "You are an intent classification expert for a sustainability chatbot. Return only \
     valid JSON.",
    user,
  )
}

/// Context from the [`RAG_SOURCES`] newest of `sources`, which are expected
/// newest first.
pub fn rag_prompt(company: &str, question: &str, sources: &[Source]) -> Prompt {
  let context = sources
    .iter()
    .take(RAG_SOURCES)
    .map(|s| format!("Source: {}\n{}", s.url, truncate_chars(&s.text, RAG_SOURCE_CHARS)))
    .collect::<Vec<_>>()
    .join(SOURCE_SEPARATOR);

  let user = format!(
    "Research content about {company}:\n\n{context}\n\n\
     Question: {question}\n\n\
     Answer from the research content above. Be specific and cite the sources \
     where possible. If the content does not cover the question, say so.\n"
  );
  Prompt::new(
    format!(
      "You are a sustainability analyst answering questions about {company} from the \
       provided research content only."
    ),
    user,
  )
}
