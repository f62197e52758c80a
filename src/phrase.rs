//! Requirement phrasing.
//!
//! Rewrites a raw requirement row ("Export audit logs as CSV") into a
//! declarative statement about the product ("ION does Export audit logs as
//! CSV") so that the requirements table reads like manual text once it is
//! embedded. The rewrite looks at the grammatical role of the first word,
//! judged from a tagging of the first three words only:
//!
//! | First word | Opted in | Not opted in |
//! |------------|----------|--------------|
//! | verb | `<P> does …` | `<P> does not …` |
//! | noun | `<P> provides …` | `<P> does not provide …` |
//! | adjective | `<P> has …` | `<P> does not have …` |
//! | other | `<P> does: …` | `<P> does not: …` |
//!
//! Tagging goes through the [`PosTagger`] trait. [`LexiconTagger`] is the
//! built-in backend.

use serde::Serialize;

/// Number of leading tokens handed to the tagger.
const TAG_WINDOW: usize = 3;

/// Coarse grammatical role of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Verb,
    Noun,
    Adjective,
    Other,
}

/// A token together with the role the tagger assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedToken {
    pub text: String,
    pub role: Role,
}

/// Part-of-speech tagging backend.
///
/// Receives the tokens of a short window and returns one tag per token, in
/// order. Implementations may use the neighbouring tokens as context.
pub trait PosTagger: Send + Sync {
    fn classify(&self, tokens: &[&str]) -> Vec<TaggedToken>;
}

/// Role of the first token, decided from a tagging of `tokens`.
///
/// For each role the first token carrying it is found; the first token's
/// role is the first of verb, noun, adjective whose first carrier has the
/// same text as the first token.
pub fn first_token_role(tagger: &dyn PosTagger, tokens: &[&str]) -> Role {
    let Some(first) = tokens.first() else {
        return Role::Other;
    };
    let tagged = tagger.classify(tokens);

    let first_of = |role: Role| {
        tagged
            .iter()
            .find(|t| t.role == role)
            .map(|t| t.text.as_str())
    };

    for role in [Role::Verb, Role::Noun, Role::Adjective] {
        if first_of(role) == Some(*first) {
            return role;
        }
    }
    Role::Other
}

/// Phrase a requirement as a statement about `product`.
///
/// Only the first three whitespace-delimited tokens are inspected; the full
/// requirement text is embedded unchanged.
pub fn phrase(tagger: &dyn PosTagger, product: &str, requirement: &str, has_opt_in: bool) -> String {
    let window: Vec<&str> = requirement.split_whitespace().take(TAG_WINDOW).collect();

    match (first_token_role(tagger, &window), has_opt_in) {
        (Role::Verb, true) => format!("{} does {}", product, requirement),
        (Role::Verb, false) => format!("{} does not {}", product, requirement),
        (Role::Noun, true) => format!("{} provides {}", product, requirement),
        (Role::Noun, false) => format!("{} does not provide {}", product, requirement),
        (Role::Adjective, true) => format!("{} has {}", product, requirement),
        (Role::Adjective, false) => format!("{} does not have {}", product, requirement),
        (Role::Other, true) => format!("{} does: {}", product, requirement),
        (Role::Other, false) => format!("{} does not: {}", product, requirement),
    }
}

/// Rewrite an incoming prompt so it reads as a capability question.
///
/// Only the first token is tagged: a verb becomes `have ability to <verb> …`,
/// a noun or adjective `have <word> …`, anything else `provide <word> …`.
pub fn rewrite_prompt(tagger: &dyn PosTagger, prompt: &str) -> String {
    let mut parts = prompt.splitn(2, ' ');
    let first = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();

    let role = first_token_role(tagger, &[first]);
    let lowered = first.to_lowercase();
    match role {
        Role::Verb => format!("have ability to {} {}", lowered, rest),
        Role::Noun | Role::Adjective => format!("have {} {}", lowered, rest),
        Role::Other => format!("provide {}  {}", lowered, rest),
    }
}

// ============ Lexicon tagger ============

const VERBS: &[&str] = &[
    "accept", "access", "add", "adjust", "alert", "allow", "analyze", "apply", "approve", "archive",
    "assign", "audit", "authenticate", "authorize", "automate", "backup", "block", "build",
    "calculate", "capture", "change", "check", "collect", "compare", "configure", "connect",
    "control", "convert", "copy", "create", "customize", "define", "delete", "deploy", "detect",
    "disable", "display", "distribute", "download", "edit", "enable", "encrypt", "enforce",
    "ensure", "enter", "establish", "export", "filter", "flag", "generate", "grant", "group",
    "handle", "hide", "highlight", "identify", "import", "include", "integrate", "link", "list",
    "load", "lock", "log", "maintain", "manage", "map", "merge", "migrate", "modify", "monitor",
    "move", "notify", "offer", "open", "perform", "permit", "prevent", "print", "process",
    "produce", "prompt", "protect", "provide", "publish", "query", "receive", "record", "recover",
    "reject", "remove", "rename", "render", "replace", "report", "request", "require", "restore",
    "restrict", "retain", "retrieve", "return", "review", "revoke", "run", "save", "scale",
    "scan", "schedule", "search", "select", "send", "set", "share", "show", "sign", "sort",
    "store", "submit", "support", "sync", "synchronize", "track", "transfer", "trigger", "update",
    "upload", "use", "validate", "verify", "view",
];

const NOUNS: &[&str] = &[
    "ability", "access", "account", "api", "approval", "audit", "authentication", "backup",
    "barcode", "batch", "calendar", "capability", "certificate", "checklist", "compliance",
    "configuration", "dashboard", "data", "database", "document", "documentation", "encryption",
    "equipment", "feature", "field", "file", "form", "functionality", "history", "integration",
    "interface", "inventory", "label", "license", "log", "maintenance", "mechanism", "module",
    "notification", "option", "password", "permission", "platform", "policy", "portal",
    "procedure", "process", "product", "quality", "record", "report", "role", "sensor", "server",
    "service", "signature", "software", "sso", "storage", "support", "system", "template",
    "tool", "traceability", "training", "user", "users", "validation", "vendor", "version",
    "workflow",
];

const ADJECTIVES: &[&str] = &[
    "accessible", "accurate", "active", "additional", "advanced", "automatic", "available",
    "basic", "built-in", "centralized", "compatible", "compliant", "configurable",
    "customizable", "digital", "electronic", "encrypted", "external", "flexible", "full",
    "graphical", "high", "integrated", "internal", "intuitive", "live", "local", "manual",
    "mobile", "multiple", "native", "offline", "online", "open", "real-time", "remote",
    "responsive", "robust", "scalable", "secure", "single", "standard", "unlimited",
    "user-friendly", "visual",
];

const OTHER: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "all", "any", "each", "every", "some",
    "no", "not", "and", "or", "but", "if", "when", "where", "while", "for", "to", "of", "in",
    "on", "at", "by", "with", "from", "as", "it", "its", "we", "our", "you", "your", "they",
    "their", "is", "are", "be", "can", "must", "should", "shall", "will", "may", "does", "do",
    "has", "have",
];

const VERB_SUFFIXES: &[&str] = &["ize", "ise", "ify", "ate"];
const NOUN_SUFFIXES: &[&str] = &["tion", "sion", "ment", "ness", "ity", "ance", "ence", "ing"];
const ADJECTIVE_SUFFIXES: &[&str] = &["able", "ible", "al", "ive", "ous", "ful", "less", "ic"];

/// Deterministic word-list tagger with suffix rules for unknown words.
///
/// Lookup order for a token is: closed-class words, verbs, nouns,
/// adjectives, then suffix rules. Numbers are always [`Role::Other`].
#[derive(Debug, Default, Clone)]
pub struct LexiconTagger;

impl LexiconTagger {
    pub fn new() -> Self {
        Self
    }

    fn role_of(word: &str) -> Role {
        let w = normalize(word);
        if w.is_empty() || w.chars().any(|c| c.is_ascii_digit()) {
            return Role::Other;
        }
        if OTHER.contains(&w.as_str()) {
            return Role::Other;
        }
        if VERBS.contains(&w.as_str()) {
            return Role::Verb;
        }
        if NOUNS.contains(&w.as_str()) {
            return Role::Noun;
        }
        if ADJECTIVES.contains(&w.as_str()) {
            return Role::Adjective;
        }
        if ends_with_any(&w, VERB_SUFFIXES) {
            return Role::Verb;
        }
        if ends_with_any(&w, NOUN_SUFFIXES) {
            return Role::Noun;
        }
        if ends_with_any(&w, ADJECTIVE_SUFFIXES) {
            return Role::Adjective;
        }
        Role::Other
    }
}

impl PosTagger for LexiconTagger {
    fn classify(&self, tokens: &[&str]) -> Vec<TaggedToken> {
        tokens
            .iter()
            .map(|t| TaggedToken {
                text: strip_punctuation(t).to_string(),
                role: Self::role_of(t),
            })
            .collect()
    }
}

/// The word without surrounding punctuation, as a tokenizer would split it.
fn strip_punctuation(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
}

fn normalize(word: &str) -> String {
    strip_punctuation(word).to_lowercase()
}

fn ends_with_any(word: &str, suffixes: &[&str]) -> bool {
    suffixes
        .iter()
        .any(|s| word.len() > s.len() + 2 && word.ends_with(s))
}
