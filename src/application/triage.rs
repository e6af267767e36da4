//! Decides which threads still need a reply.
//!
//! Each heuristic is a [`SkipRule`]. Rules are evaluated in the precedence
//! order of the reason they report (resolved, bot author, trivial content,
//! already answered), and the first match wins. Extra rules can be
//! registered with [`SkipClassifier::with_rule`] without disturbing that
//! order.

use crate::domain::{Comment, SkipReason, Thread, ThreadClassification};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref ACTIONABLE_RE: Regex = Regex::new(
        r"(?i)\b(fix|change|remove|add|rename|move|update|use|replace|extract|avoid|consider|should|must|please|why|what|how|missing|wrong|bug|typo|test)\w*\b"
    )
    .expect("actionable verb regex");
}

const TRIVIAL_PHRASES: &[&str] = &[
    "lgtm",
    "+1",
    ":+1:",
    "👍",
    "✅",
    "✔",
    "✔️",
    "nice",
    "thanks",
    "thank you",
    "looks good",
    "looks good to me",
    "ship it",
    ":shipit:",
];

const DEFAULT_BOTS: &[&str] = &[
    "github-actions",
    "dependabot",
    "renovate",
    "codecov",
    "sonarcloud",
    "coderabbitai",
    "copilot-pull-request-reviewer",
    "gemini-code-assist",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierOptions {
    /// Logins treated as automation in addition to `*[bot]` accounts
    pub bot_authors: Vec<String>,
    /// Single comments shorter than this (in chars) with no actionable
    /// wording count as trivial
    pub trivial_max_length: usize,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            bot_authors: DEFAULT_BOTS.iter().map(|s| s.to_string()).collect(),
            trivial_max_length: 20,
        }
    }
}

/// One skip heuristic.
pub trait SkipRule: Send + Sync {
    fn reason(&self) -> SkipReason;
    fn applies(&self, thread: &Thread, pr_author: &str) -> bool;
}

pub struct ResolvedRule;

impl SkipRule for ResolvedRule {
    fn reason(&self) -> SkipReason {
        SkipReason::Resolved
    }

    fn applies(&self, thread: &Thread, _pr_author: &str) -> bool {
        thread.resolved
    }
}

pub struct BotAuthorRule {
    logins: Vec<String>,
}

impl BotAuthorRule {
    pub fn new<I, S>(logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            logins: logins
                .into_iter()
                .map(|l| normalize_login(l.as_ref()))
                .collect(),
        }
    }

    fn is_bot(&self, comment: &Comment) -> bool {
        comment.author_is_bot
            || comment.author.to_lowercase().ends_with("[bot]")
            || self.logins.contains(&normalize_login(&comment.author))
    }
}

impl SkipRule for BotAuthorRule {
    fn reason(&self) -> SkipReason {
        SkipReason::BotAuthor
    }

    fn applies(&self, thread: &Thread, _pr_author: &str) -> bool {
        !thread.comments.is_empty() && thread.comments.iter().all(|c| self.is_bot(c))
    }
}

pub struct TrivialContentRule {
    max_length: usize,
}

impl TrivialContentRule {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn is_trivial(&self, body: &str) -> bool {
        let text = body
            .trim()
            .trim_end_matches(['.', '!', ' '])
            .to_lowercase();
        if text.is_empty() || TRIVIAL_PHRASES.contains(&text.as_str()) {
            return true;
        }
        text.chars().count() < self.max_length && !text.contains('?') && !ACTIONABLE_RE.is_match(&text)
    }
}

impl SkipRule for TrivialContentRule {
    fn reason(&self) -> SkipReason {
        SkipReason::TrivialContent
    }

    fn applies(&self, thread: &Thread, _pr_author: &str) -> bool {
        thread.is_single_comment() && thread.root().is_some_and(|c| self.is_trivial(&c.body))
    }
}

/// The PR author spoke last, so the ball is in the reviewer's court.
pub struct AlreadyAnsweredRule;

impl SkipRule for AlreadyAnsweredRule {
    fn reason(&self) -> SkipReason {
        SkipReason::AlreadyAnswered
    }

    fn applies(&self, thread: &Thread, pr_author: &str) -> bool {
        !pr_author.is_empty() && thread.last_comment().is_some_and(|c| c.author == pr_author)
    }
}

pub struct SkipClassifier {
    pr_author: String,
    rules: Vec<Box<dyn SkipRule>>,
}

impl SkipClassifier {
    pub fn new(pr_author: impl Into<String>, options: &ClassifierOptions) -> Self {
        Self {
            pr_author: pr_author.into(),
            rules: vec![
                Box::new(ResolvedRule),
                Box::new(BotAuthorRule::new(&options.bot_authors)),
                Box::new(TrivialContentRule::new(options.trivial_max_length)),
                Box::new(AlreadyAnsweredRule),
            ],
        }
    }

    /// Register an additional heuristic. It runs after existing rules with
    /// the same reason and before rules of lower precedence.
    pub fn with_rule(mut self, rule: Box<dyn SkipRule>) -> Self {
        self.rules.push(rule);
        self.rules.sort_by_key(|r| r.reason());
        self
    }

    pub fn classify(&self, thread: &Thread) -> ThreadClassification {
        self.rules
            .iter()
            .find(|rule| rule.applies(thread, &self.pr_author))
            .map(|rule| ThreadClassification::skip(&thread.thread_id, rule.reason()))
            .unwrap_or_else(|| ThreadClassification::needs_response(&thread.thread_id))
    }

    pub fn classify_all(&self, threads: &[Thread]) -> Vec<ThreadClassification> {
        threads.iter().map(|t| self.classify(t)).collect()
    }
}

fn normalize_login(login: &str) -> String {
    login.trim().trim_end_matches("[bot]").to_lowercase()
}
