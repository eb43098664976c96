use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dialoguer::console::user_attended;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};

pub static PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {human_pos:>7}/{human_len:7} {msg}";
pub static SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:2.cyan/blue} {msg}";
pub static SPINNER_TOTALS_TEMPLATE: &str = "{spinner:2.cyan/blue} {msg}: {human_pos}";
pub static BYTES_PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {decimal_bytes:>7}/{decimal_total_bytes:7} @ {decimal_bytes_per_sec} [eta: {eta}] {msg}";


pub fn new_spinner(message: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(SPINNER_TEMPLATE).expect("Invalid spinner template");
    ProgressBar::new_spinner().with_message(message.to_string()).with_style(style)
}

pub fn new_progress_bar(total: usize, message: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(PROGRESS_TEMPLATE).expect("Invalid progress bar template");
    ProgressBar::new(total as u64)
        .with_message(message.to_string())
        .with_style(style)
}

pub fn new_progress_bar_bytes(total: u64, message: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(BYTES_PROGRESS_TEMPLATE).expect("Invalid progress bar template");
    ProgressBar::new(total).with_message(message.to_string()).with_style(style)
}

pub fn new_spinner_totals(message: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(SPINNER_TOTALS_TEMPLATE).expect("Invalid spinner template");
    ProgressBar::new_spinner().with_message(message.to_string()).with_style(style)
}


/// Cooperative cancellation shared by the pipeline stages.
///
/// The token is checked once per row in streaming loops and once per batch in
/// the bulk loaders, so a signal stops a run at the next checkpoint rather
/// than mid-statement.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}


/// Truncate to a byte budget without splitting a UTF-8 sequence.
pub fn truncate_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Truncate to a character budget, appending an ellipsis when anything
/// was cut. The ellipsis counts against the budget.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}


pub enum EmptyNamesChoice {
    /// Continue the source, falling back per-row.
    UseFallback,
    /// Skip this source and move to the next one.
    SkipSource,
    /// Fail the whole run.
    AbortRun,
}

/// The two narrow operator interactions the pipeline has. Implemented as a
/// trait so the pipeline can be driven non-interactively under test.
pub trait Prompter {
    fn empty_names(&self, source_id: i32) -> EmptyNamesChoice;
    fn confirm_archive(&self, chosen: &str, alternatives: &[String]) -> bool;
}

/// Interactive prompts on a terminal. When no TTY is attached every prompt
/// resolves to its default so unattended runs never block.
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn empty_names(&self, source_id: i32) -> EmptyNamesChoice {
        if !user_attended() {
            return EmptyNamesChoice::UseFallback;
        }

        let answer: String = Input::new()
            .with_prompt(format!(
                "Source {source_id} has rows without a parsed name string. Continue with the verbatim name? [Y]es/[n]o/[a]bort"
            ))
            .allow_empty(true)
            .interact_text()
            .unwrap_or_default();

        match answer.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            None | Some('y') => EmptyNamesChoice::UseFallback,
            Some('n') => EmptyNamesChoice::SkipSource,
            Some('a') => EmptyNamesChoice::AbortRun,
            Some(_) => EmptyNamesChoice::UseFallback,
        }
    }

    fn confirm_archive(&self, chosen: &str, alternatives: &[String]) -> bool {
        if !user_attended() {
            return true;
        }

        Confirm::new()
            .with_prompt(format!("Several archives match; use {chosen}? (others: {})", alternatives.join(", ")))
            .default(true)
            .interact()
            .unwrap_or(true)
    }
}

/// Answers every prompt with its default. Used by tests and by callers that
/// explicitly opt out of interaction.
pub struct AssumeDefaults;

impl Prompter for AssumeDefaults {
    fn empty_names(&self, _source_id: i32) -> EmptyNamesChoice {
        EmptyNamesChoice::UseFallback
    }

    fn confirm_archive(&self, _chosen: &str, _alternatives: &[String]) -> bool {
        true
    }
}
