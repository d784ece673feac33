//! Intent classification: free text to an [`Intent`] plus the company names it
//! mentions.
//!
//! [`classify_rules`] is deterministic and needs no collaborators.
//! [`classify_with_model`] asks an [`Extractor`] for a JSON classification and
//! falls back to the rules when the call fails or the answer is unusable.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tracing::{debug, warn};

use crate::{company::normalize_name, llm::Extractor, prompts, validate::extract_json};

// ─── Vocabulary ──────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
  Analyze,
  Compare,
  RagQuestion,
  ShowScore,
  Report,
  Delete,
  List,
  Clear,
  Unknown,
}

impl Intent {
  /// Parse an intent label, mapping the older fine-grained labels onto the
  /// fixed vocabulary. Returns `None` for labels outside both.
  pub fn from_label(label: &str) -> Option<Self> {
    let label = label.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    match label.as_str() {
      "show_details"
      | "show_environmental"
      | "show_social"
      | "show_governance"
      | "show_strengths_weaknesses" => Some(Self::ShowScore),
      "list_companies" => Some(Self::List),
      "download_pdf" | "download" | "download_report" | "export" | "pdf" => Some(Self::Report),
      other => other.parse().ok(),
    }
  }

  /// How many company names the intent needs before it can run.
  pub fn min_companies(self) -> usize {
    match self {
      Self::Compare => 2,
      Self::Analyze | Self::RagQuestion | Self::ShowScore | Self::Report | Self::Delete => 1,
      Self::List | Self::Clear | Self::Unknown => 0,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
  pub intent:    Intent,
  /// Normalised names, in the order they were mentioned, without duplicates.
  pub companies: Vec<String>,
  /// The user's question, for [`Intent::RagQuestion`].
  pub question:  Option<String>,
}

impl Classification {
  fn new(intent: Intent, companies: Vec<String>) -> Self {
    Self { intent, companies, question: None }
  }

  pub fn lacks_companies(&self) -> bool {
    self.companies.len() < self.intent.min_companies()
  }
}

/// Which classifier the pipeline uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterMode {
  #[default]
  Rules,
  Model,
}

// ─── Rule classifier ─────────────────────────────────────────────────────────

const DELETE_VERBS: &[&str] = &["delete", "remove", "forget", "drop"];
const CLEAR_VERBS: &[&str] = &["clear", "reset", "wipe"];
/// Words that can follow a clear or delete verb without naming a company.
const CLEAR_FILLER: &[&str] = &[
  "all", "everything", "the", "a", "an", "data", "database", "db", "companies", "company",
  "every", "of", "my", "our", "this", "stored", "entire", "analyses", "records", "history",
  "list", "it", "please",
];
/// Trailing words that name a company's records rather than the company.
const RECORD_WORDS: &[&str] = &[
  "data", "analysis", "analyses", "record", "records", "score", "scores", "history", "info",
  "information", "entry", "entries", "results", "report", "reports", "pdf",
];
const REPORT_VERBS: &[&str] = &["download", "export"];
const REPORT_REQUESTS: &[&str] = &[
  "generate", "create", "make", "produce", "build", "write", "get", "give me", "send me", "i want",
  "i need",
];
const ANALYZE_VERBS: &[&str] = &[
  "analyze", "analyse", "check out", "check", "research", "evaluate", "assess", "look up",
  "look into", "rate", "score",
];
const QUESTION_WORDS: &[&str] = &[
  "how", "what", "what's", "why", "does", "do", "is", "are", "which", "who", "when", "where",
  "can", "could", "will", "would", "should", "has", "have", "did",
];
const GREETINGS: &[&str] = &[
  "hi", "hello", "hey", "thanks", "thank you", "ok", "okay", "yes", "no", "help", "bye",
  "good morning", "good evening",
];
const LIST_PHRASES: &[&str] = &[
  "all companies",
  "which companies",
  "what companies",
  "show companies",
  "companies analyzed",
  "companies analysed",
  "analyzed companies",
  "analysed companies",
  "companies in the database",
];
/// Capitalised words that never start a company name.
const STOPWORDS: &[&str] = &[
  "how", "what", "why", "does", "do", "is", "are", "which", "who", "when", "where", "can",
  "could", "will", "would", "should", "has", "have", "did", "tell", "show", "give", "compare",
  "analyze", "analyse", "check", "research", "evaluate", "assess", "rate", "delete", "remove",
  "please", "i", "the", "a", "an", "esg", "score", "scores", "rating", "and", "vs", "versus",
  "me", "my", "its", "their", "environmental", "social", "governance", "download", "export",
  "generate", "create", "report", "pdf", "comparison", "sustainability",
];

/// Classify `text` without a model. `known` holds the names already in the
/// store and is used to recognise mentions and restore their spelling.
pub fn classify_rules(text: &str, known: &[String]) -> Classification {
  let text = text.trim();
  let lower = text.to_ascii_lowercase();
  let core = lower.trim_end_matches(['.', '!', '?']).trim();

  if core.is_empty() {
    return Classification::new(Intent::Unknown, Vec::new());
  }

  // "clear Tesla" deletes one company; only a bare or filler-only remainder
  // clears the store.
  if let Some(rest) = strip_verb(core, CLEAR_VERBS) {
    if names_nothing(rest) {
      return Classification::new(Intent::Clear, Vec::new());
    }
    return Classification::new(Intent::Delete, record_names(text, rest, known));
  }

  if let Some(rest) = strip_verb(core, DELETE_VERBS) {
    if !rest.is_empty() && names_nothing(rest) {
      return Classification::new(Intent::Clear, Vec::new());
    }
  }

  if core == "list" || core.starts_with("list ") || LIST_PHRASES.iter().any(|p| core.contains(p)) {
    return Classification::new(Intent::List, Vec::new());
  }

  let asks_for_report = ["report", "reports", "pdf"]
    .iter()
    .any(|w| find_word(core, w).is_some());
  if strip_verb(core, REPORT_VERBS).is_some()
    || (asks_for_report && strip_verb(core, REPORT_REQUESTS).is_some())
  {
    return Classification::new(Intent::Report, report_names(text, core, known));
  }

  if let Some(rest) = strip_verb(core, DELETE_VERBS) {
    return Classification::new(Intent::Delete, record_names(text, rest, known));
  }

  if let Some(rest) = strip_verb(core, &["compare"]) {
    let names = split_names(tail(text, rest), known, &[" to ", " against "]);
    return Classification::new(Intent::Compare, names);
  }
  if core.contains(" vs ")
    || core.contains(" vs. ")
    || core.contains(" versus ")
    || find_word(core, "compare").is_some()
    || find_word(core, "comparison").is_some()
  {
    let names = if core.contains(" vs") || core.contains(" versus ") {
      split_names(text.trim_end_matches(['.', '!', '?']), known, &[])
    } else {
      mentioned_names(text, known)
    };
    return Classification::new(Intent::Compare, names);
  }

  let asks_for_score = ["score", "scores", "rating"]
    .iter()
    .any(|w| find_word(core, w).is_some());
  if asks_for_score && (strip_verb(core, ANALYZE_VERBS).is_none() || is_question(text, core)) {
    return Classification::new(Intent::ShowScore, mentioned_names(text, known));
  }

  if is_question(text, core) {
    return Classification {
      intent:    Intent::RagQuestion,
      companies: mentioned_names(text, known),
      question:  Some(text.to_owned()),
    };
  }

  if let Some(rest) = strip_verb(core, ANALYZE_VERBS) {
    let names = split_names(tail(text, rest), known, &[]);
    return Classification::new(Intent::Analyze, names);
  }

  let is_greeting = GREETINGS.contains(&core)
    || core
      .split_whitespace()
      .next()
      .is_some_and(|w| GREETINGS.contains(&w.trim_end_matches([',', '!'])));
  if core.split_whitespace().count() <= 4 && !is_greeting {
    let names = split_names(text.trim_end_matches(['.', '!']), known, &[]);
    if !names.is_empty() {
      return Classification::new(Intent::Analyze, names);
    }
  }

  Classification::new(Intent::Unknown, Vec::new())
}

fn is_question(text: &str, core: &str) -> bool {
  text.ends_with('?')
    || core
      .split_whitespace()
      .next()
      .is_some_and(|w| QUESTION_WORDS.contains(&w))
}

/// True when everything after a clear or delete verb is filler such as
/// "all the data". An empty remainder names nothing.
fn names_nothing(rest: &str) -> bool {
  rest
    .split_whitespace()
    .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
    .filter(|w| !w.is_empty())
    .all(|w| CLEAR_FILLER.contains(&w))
}

/// If `core` starts with one of `verbs` as a whole word, the remainder.
fn strip_verb<'a>(core: &'a str, verbs: &[&str]) -> Option<&'a str> {
  verbs.iter().find_map(|verb| {
    let rest = core.strip_prefix(verb)?;
    (rest.is_empty() || rest.starts_with(' ')).then(|| rest.trim_start())
  })
}

/// The suffix of `text` matching the lowered suffix `rest`.
///
/// The lowered text is produced with ASCII-only case folding, so byte offsets
/// line up with the original.
fn tail<'a>(text: &'a str, rest: &str) -> &'a str {
  let text = text.trim_end_matches(['.', '!', '?']).trim_end();
  text.get(text.len().saturating_sub(rest.len())..).unwrap_or_default()
}

// ─── Name extraction ─────────────────────────────────────────────────────────

const SEPARATORS: &[&str] = &[",", " and ", " vs. ", " vs ", " versus ", " with ", " & ", ";"];

/// Split a fragment that is nothing but a list of names.
fn split_names(fragment: &str, known: &[String], extra: &[&str]) -> Vec<String> {
  let mut pieces = vec![fragment.to_owned()];
  for sep in SEPARATORS.iter().chain(extra) {
    pieces = pieces
      .into_iter()
      .flat_map(|piece| split_ignoring_case(&piece, sep))
      .collect();
  }

  let mut names = Vec::new();
  for piece in pieces {
    if let Some(name) = clean_name(&piece) {
      push_unique(&mut names, canonical(&name, known));
    }
  }

  // A known name with "and" in it ("Johnson and Johnson") is split above.
  let mentions = known_mentions(fragment, known);
  if !mentions.is_empty() && names.iter().any(|n| !known_contains(known, n)) {
    let mut merged = mentions;
    for name in names {
      let covered = merged.iter().any(|m| {
        let m = m.to_ascii_lowercase();
        find_word(&m, &name.to_ascii_lowercase()).is_some()
      });
      if !covered {
        push_unique(&mut merged, name);
      }
    }
    return merged;
  }
  names
}

/// Names listed after a verb, without trailing record words: "Tesla's data"
/// names Tesla.
fn record_names(text: &str, rest: &str, known: &[String]) -> Vec<String> {
  let mut names = Vec::new();
  for name in split_names(tail(text, rest), known, &[]) {
    let mut words: Vec<&str> = name.split_whitespace().collect();
    while words.len() > 1
      && words
        .last()
        .is_some_and(|w| RECORD_WORDS.contains(&w.to_ascii_lowercase().as_str()))
    {
      words.pop();
    }
    if words.len() > 1 && words[0].eq_ignore_ascii_case("all") {
      words.remove(0);
    }
    let names_records_only = words.iter().all(|w| {
      let w = w.to_ascii_lowercase();
      CLEAR_FILLER.contains(&w.as_str()) || RECORD_WORDS.contains(&w.as_str())
    });
    if names_records_only {
      continue;
    }
    if let Some(name) = clean_name(&words.join(" ")) {
      push_unique(&mut names, canonical(&name, known));
    }
  }
  names
}

/// Names for a report request: the list after "for", "on" or "of" or after
/// the verb, otherwise any names mentioned.
fn report_names(text: &str, core: &str, known: &[String]) -> Vec<String> {
  let listed = ["for", "on", "of"]
    .iter()
    .find_map(|word| find_word(core, word).map(|at| core[at + word.len()..].trim_start()))
    .or_else(|| strip_verb(core, REPORT_VERBS))
    .map(|rest| record_names(text, rest, known))
    .unwrap_or_default();
  if listed.is_empty() {
    mentioned_names(text, known)
  } else {
    listed
  }
}

/// Names mentioned somewhere in free text: known names first, otherwise runs
/// of capitalised words.
fn mentioned_names(text: &str, known: &[String]) -> Vec<String> {
  let mentions = known_mentions(text, known);
  if !mentions.is_empty() {
    return mentions;
  }

  fn flush(run: &mut Vec<&str>, names: &mut Vec<String>) {
    if let Some(name) = clean_name(&run.join(" ")) {
      push_unique(names, name);
    }
    run.clear();
  }

  let mut names = Vec::new();
  let mut run: Vec<&str> = Vec::new();

  for token in text.split_whitespace() {
    let word = strip_possessive(token.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''));
    let word = word.trim_matches('\'');
    let capitalised = word.chars().next().is_some_and(char::is_uppercase);
    let stop = STOPWORDS.contains(&word.to_ascii_lowercase().as_str());

    if capitalised && !stop {
      run.push(word);
      // Trailing punctuation or a possessive ends the name.
      if token.ends_with([',', '?', '.', '!', ';', ':']) || word.len() + 2 <= token.len() {
        flush(&mut run, &mut names);
      }
    } else {
      flush(&mut run, &mut names);
    }
  }
  flush(&mut run, &mut names);
  names
}

/// Known names occurring in `text` as whole words, in order of appearance.
fn known_mentions(text: &str, known: &[String]) -> Vec<String> {
  let haystack = text.to_ascii_lowercase();
  let mut found: Vec<(usize, &String)> = known
    .iter()
    .filter_map(|name| find_word(&haystack, &name.to_ascii_lowercase()).map(|at| (at, name)))
    .collect();
  found.sort_by_key(|(at, name)| (*at, std::cmp::Reverse(name.len())));

  let mut names = Vec::new();
  for (_, name) in found {
    push_unique(&mut names, name.clone());
  }
  names
}

/// Byte offset of the first whole-word occurrence of `needle`.
fn find_word(haystack: &str, needle: &str) -> Option<usize> {
  if needle.is_empty() {
    return None;
  }
  let mut from = 0;
  while let Some(offset) = haystack.get(from..)?.find(needle) {
    let start = from + offset;
    let end = start + needle.len();
    let before = haystack[..start].chars().next_back();
    let after = haystack[end..].chars().next();
    if !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric) {
      return Some(start);
    }
    from = end;
  }
  None
}

fn split_ignoring_case(piece: &str, sep: &str) -> Vec<String> {
  let lower = piece.to_ascii_lowercase();
  let mut parts = Vec::new();
  let mut last = 0;
  for (at, _) in lower.match_indices(sep) {
    parts.push(piece[last..at].to_owned());
    last = at + sep.len();
  }
  parts.push(piece[last..].to_owned());
  parts
}

fn clean_name(piece: &str) -> Option<String> {
  let trimmed = piece.trim_matches(|c: char| {
    c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '"' | '\'' | '(' | ')')
  });
  let trimmed = strip_possessive(trimmed);
  let trimmed = trimmed
    .strip_prefix("the ")
    .or_else(|| trimmed.strip_prefix("The "))
    .unwrap_or(trimmed);
  let trimmed = trimmed
    .strip_suffix(" please")
    .or_else(|| trimmed.strip_suffix(" for me"))
    .unwrap_or(trimmed);
  normalize_name(trimmed).ok()
}

fn strip_possessive(word: &str) -> &str {
  word
    .strip_suffix("'s")
    .or_else(|| word.strip_suffix("\u{2019}s"))
    .unwrap_or(word)
}

/// The stored spelling of `name` if it is known.
fn canonical(name: &str, known: &[String]) -> String {
  known
    .iter()
    .find(|k| k.eq_ignore_ascii_case(name))
    .cloned()
    .unwrap_or_else(|| name.to_owned())
}

fn known_contains(known: &[String], name: &str) -> bool {
  known.iter().any(|k| k.eq_ignore_ascii_case(name))
}

fn push_unique(names: &mut Vec<String>, name: String) {
  if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
    names.push(name);
  }
}

// ─── Model classifier ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ModelClassification {
  intent:    String,
  #[serde(default)]
  companies: Vec<String>,
  #[serde(default)]
  question:  Option<String>,
}

/// Normalise a model's JSON classification. `None` when the output is not
/// usable.
pub fn parse_model_output(raw: &str, text: &str, known: &[String]) -> Option<Classification> {
  let parsed: ModelClassification = serde_json::from_value(extract_json(raw)?).ok()?;
  let intent = Intent::from_label(&parsed.intent)?;

  let mut companies = Vec::new();
  for name in &parsed.companies {
    if let Ok(name) = normalize_name(name) {
      push_unique(&mut companies, canonical(&name, known));
    }
  }

  let question = (intent == Intent::RagQuestion).then(|| {
    parsed
      .question
      .filter(|q| !q.trim().is_empty())
      .unwrap_or_else(|| text.trim().to_owned())
  });

  Some(Classification { intent, companies, question })
}

pub async fn classify_with_model<E: Extractor>(
  model: &E,
  text: &str,
  known: &[String],
) -> Classification {
  let prompt = prompts::intent_prompt(text, known);
  match model.extract_json(&prompt).await {
    Ok(raw) => match parse_model_output(&raw, text, known) {
      Some(classification) => {
        debug!(intent = %classification.intent, "model classified message");
        classification
      }
      None => {
        warn!("model returned an unusable classification; using rules");
        classify_rules(text, known)
      }
    },
    Err(e) => {
      warn!(error = %e, "model classification failed; using rules");
      classify_rules(text, known)
    }
  }
}
