//! Terminal rendering for compaction results and estimates.

use colored::Colorize;

use crate::compaction::{CompactionBranch, CompactionOutcome};
use crate::message::{Message, Role};

/// Format a message for terminal display with role label and colors.
pub fn format_message(msg: &Message) -> String {
    let label = format_role_label(msg);
    let body = format_body(&msg.text(), &msg.role);
    format!("{}\n{}", label, body)
}

fn format_role_label(msg: &Message) -> String {
    let seq = msg
        .sequence_number
        .map(|s| format!(" #{s}"))
        .unwrap_or_default();
    let label = match msg.role {
        Role::User => format!("{}", "user:".green().bold()),
        Role::Assistant => format!("{}", "assistant:".cyan().bold()),
        Role::System => format!("{}", "system:".dimmed()),
        Role::Tool => format!("{}", "tool:".yellow()),
    };
    format!("{label} {}{}", msg.id.dimmed(), seq.dimmed())
}

fn format_body(text: &str, role: &Role) -> String {
    match role {
        Role::User => text.to_string(),
        Role::Assistant => render_markdown_lite(text),
        _ => text.dimmed().to_string(),
    }
}

/// One-line description of the compaction branch taken.
pub fn describe_branch(branch: CompactionBranch) -> &'static str {
    match branch {
        CompactionBranch::Untouched => "fits, sent unchanged",
        CompactionBranch::Trimmed => "trimmed oldest messages",
        CompactionBranch::ReusedSummary => "reused stored summary",
        CompactionBranch::ExtendedSummary => "extended stored summary",
        CompactionBranch::FreshSummary => "generated new summary",
    }
}

/// Header block summarizing a compaction outcome.
pub fn format_outcome_header(outcome: &CompactionOutcome, model: &str, threshold: usize) -> String {
    let branch = describe_branch(outcome.branch);
    let branch = match outcome.branch {
        CompactionBranch::Untouched => branch.green(),
        CompactionBranch::ReusedSummary => branch.cyan(),
        _ => branch.yellow(),
    };

    let mut lines = vec![
        format!("{} {}", "model:".bold(), model),
        format!("{} {}", "result:".bold(), branch),
        format!(
            "{} {} {} {}",
            "tokens:".bold(),
            format_number(outcome.tokens_before),
            "->".dimmed(),
            format_token_usage(outcome.tokens_after, threshold)
        ),
        format!(
            "{} {}",
            "messages:".bold(),
            outcome.final_messages.len()
        ),
    ];

    if let Some(meta) = &outcome.summary {
        lines.push(format!(
            "{} through {} (#{}){}",
            "summary:".bold(),
            meta.summary.covered_until_message_id.cyan(),
            meta.summary.covered_until_sequence,
            if meta.used_existing {
                " [reused]".dimmed().to_string()
            } else {
                String::new()
            }
        ));
    }

    if outcome.tokens_after > threshold {
        lines.push(format!(
            "{} still over budget; the newest message alone exceeds it",
            "warning:".yellow().bold()
        ));
    }

    lines.join("\n")
}

/// Minimal markdown renderer for terminal output.
/// Not a full parser. Handles the three most common patterns
/// in LLM output: bold, inline code, and fenced code blocks.
pub fn render_markdown_lite(text: &str) -> String {
    let mut output = String::new();
    let mut in_code_block = false;

    for line in text.lines() {
        if line.starts_with("```") {
            if in_code_block {
                in_code_block = false;
                output.push('\n');
            } else {
                in_code_block = true;
                let lang = line.trim_start_matches('`');
                if !lang.is_empty() {
                    output.push_str(&format!("  {}\n", lang.dimmed()));
                }
            }
            continue;
        }

        if in_code_block {
            output.push_str(&format!("  {}\n", line.dimmed()));
            continue;
        }

        output.push_str(&render_inline(line));
        output.push('\n');
    }

    if output.ends_with('\n') {
        output.pop();
    }
    output
}

/// Handle **bold** and `inline code` within a single line.
fn render_inline(line: &str) -> String {
    let mut result = String::new();
    let chars: Vec<char> = line.chars().collect();
    let len = chars.len();
    let mut i = 0;

    while i < len {
        if i + 1 < len && chars[i] == '*' && chars[i + 1] == '*' {
            if let Some(end) = find_closing(&chars, i + 2, &['*', '*']) {
                let bold_text: String = chars[i + 2..end].iter().collect();
                result.push_str(&bold_text.bold().to_string());
                i = end + 2;
                continue;
            }
        }

        if chars[i] == '`' {
            if let Some(end) = find_closing(&chars, i + 1, &['`']) {
                let code_text: String = chars[i + 1..end].iter().collect();
                result.push_str(&code_text.dimmed().to_string());
                i = end + 1;
                continue;
            }
        }

        result.push(chars[i]);
        i += 1;
    }

    result
}

fn find_closing(chars: &[char], start: usize, pat: &[char]) -> Option<usize> {
    if start > chars.len() {
        return None;
    }
    chars[start..]
        .windows(pat.len())
        .position(|w| w == pat)
        .map(|offset| start + offset)
}

/// Format a token count against a limit. Example: "1,234 / 128,000"
pub fn format_token_usage(used: usize, limit: usize) -> String {
    format!("{} / {}", format_number(used), format_number(limit))
}

/// Thousands-separated integer. Example: "128,000"
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
