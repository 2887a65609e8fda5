/// Console output: clone progress, change previews and the push
/// confirmation prompt.
use std::sync::Mutex;

use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};

use wekit_core::clone::CloneReport;
use wekit_core::push::{CardChange, ChangeKind, PushReport};
use wekit_core::{CloneEvent, EventSink, PushEvent};

/// Event sink that renders clone progress with an indicatif bar and push
/// progress as plain lines.
pub struct ConsoleSink {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        ConsoleSink {
            bar: Mutex::new(None),
        }
    }

    pub fn finish(&self) {
        let Ok(mut bar) = self.bar.lock() else {
            return;
        };
        if let Some(bar) = bar.take() {
            bar.finish_and_clear();
        }
    }

    fn println(&self, line: String) {
        let Ok(bar) = self.bar.lock() else {
            return;
        };
        match bar.as_ref() {
            Some(bar) => bar.println(line),
            None => println!("{}", line),
        }
    }
}

impl EventSink for ConsoleSink {
    fn clone_event(&self, event: CloneEvent) {
        match event {
            CloneEvent::BoardsSelected { total, selected } => {
                println!("Cloning {} of {} boards", selected, total);
                let bar = ProgressBar::new(selected as u64);
                bar.set_style(
                    ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                        .expect("valid progress template"),
                );
                if let Ok(mut slot) = self.bar.lock() {
                    *slot = Some(bar);
                }
            }
            CloneEvent::FilterMatchedNothing { filter } => {
                self.println(format!(
                    "{} no boards matched '{}'",
                    style("warning:").yellow().bold(),
                    filter
                ));
            }
            CloneEvent::BoardStarted { title } => {
                if let Ok(bar) = self.bar.lock() {
                    if let Some(bar) = bar.as_ref() {
                        bar.set_message(title);
                    }
                }
            }
            CloneEvent::BoardFinished {
                title,
                lists,
                cards,
            } => {
                self.println(format!(
                    "{} {} ({} lists, {} cards)",
                    style("cloned").green(),
                    title,
                    lists,
                    cards
                ));
                if let Ok(bar) = self.bar.lock() {
                    if let Some(bar) = bar.as_ref() {
                        bar.inc(1);
                    }
                }
            }
            CloneEvent::BoardFailed { title, reason } => {
                self.println(format!(
                    "{} board {}: {}",
                    style("failed").red().bold(),
                    title,
                    reason
                ));
                if let Ok(bar) = self.bar.lock() {
                    if let Some(bar) = bar.as_ref() {
                        bar.inc(1);
                    }
                }
            }
            CloneEvent::ListFailed {
                board,
                list,
                reason,
            } => {
                self.println(format!(
                    "{} list {} of {}: {}",
                    style("failed").red().bold(),
                    list,
                    board,
                    reason
                ));
            }
            CloneEvent::CardFailed { card, reason } => {
                self.println(format!(
                    "{} card {}: {}",
                    style("failed").red().bold(),
                    card,
                    reason
                ));
            }
            CloneEvent::CacheSkipped { name, reason } => {
                self.println(format!(
                    "{} {} not available ({})",
                    style("skipped").yellow(),
                    name,
                    reason
                ));
            }
            CloneEvent::SectionSkipped {
                card,
                section,
                reason,
            } => {
                self.println(format!(
                    "{} {} of {} ({})",
                    style("skipped").yellow(),
                    section,
                    card,
                    reason
                ));
            }
        }
    }

    fn push_event(&self, event: PushEvent) {
        match event {
            PushEvent::ChangesDetected { .. } => {}
            PushEvent::ChangeApplied { description } => {
                println!("{} {}", style("applied").green(), description);
            }
            PushEvent::ChangeFailed {
                description,
                reason,
            } => {
                println!(
                    "{} {}: {}",
                    style("failed").red().bold(),
                    description,
                    reason
                );
            }
        }
    }
}

/// Grouped change preview, one block per change kind.
pub fn preview(changes: &[CardChange]) {
    println!();
    println!(
        "{}",
        style(format!("{} pending change(s)", changes.len())).bold()
    );
    for kind in [
        ChangeKind::Create,
        ChangeKind::Update,
        ChangeKind::Move,
        ChangeKind::Delete,
    ] {
        let group: Vec<&CardChange> = changes.iter().filter(|c| c.kind() == kind).collect();
        if group.is_empty() {
            continue;
        }
        println!();
        println!("{} ({})", style(kind.label()).bold(), group.len());
        for change in group {
            println!("  {}", change);
        }
    }
    println!();
}

/// Detailed rendering with old and new content per change.
pub fn diff_detail(changes: &[CardChange]) {
    for change in changes {
        match change {
            CardChange::Create { file, new } => {
                println!(
                    "{} '{}' in {} ({})",
                    style("create").green().bold(),
                    new.title,
                    new.list_name,
                    file.display()
                );
                for line in new.body.lines() {
                    println!("  {}", style(format!("+ {}", line)).green());
                }
            }
            CardChange::Update { card_id, old, new } => {
                println!(
                    "{} '{}' ({})",
                    style("update").yellow().bold(),
                    new.title,
                    card_id
                );
                if old.title != new.title {
                    println!("  title: {} -> {}", old.title, new.title);
                }
                if old.body != new.body {
                    for line in old.body.lines() {
                        println!("  {}", style(format!("- {}", line)).red());
                    }
                    for line in new.body.lines() {
                        println!("  {}", style(format!("+ {}", line)).green());
                    }
                }
            }
            CardChange::Move {
                card_id,
                title,
                old_list,
                new_list,
            } => {
                println!(
                    "{} '{}' ({}): {} -> {}",
                    style("move").cyan().bold(),
                    title,
                    card_id,
                    old_list,
                    new_list
                );
            }
            CardChange::Delete {
                card_id,
                title,
                list_name,
            } => {
                println!(
                    "{} '{}' ({}) in {}",
                    style("archive").red().bold(),
                    title,
                    card_id,
                    list_name
                );
            }
        }
        println!();
    }
}

pub fn confirm_push(count: usize) -> bool {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Apply {} change(s) to the remote board?", count))
        .default(false)
        .interact()
        .unwrap_or(false)
}

pub fn clone_summary(report: &CloneReport) {
    println!();
    println!(
        "Cloned {} board(s), {} list(s), {} card(s) into {}",
        report.boards,
        report.lists,
        report.cards,
        report.host_dir.display()
    );
    if report.failures > 0 {
        println!(
            "{} {} item(s) could not be cloned (see warnings above)",
            style("warning:").yellow().bold(),
            report.failures
        );
    }
}

pub fn push_summary(report: &PushReport) {
    println!();
    if report.success() {
        println!(
            "{} applied {} change(s)",
            style("done:").green().bold(),
            report.applied
        );
    } else {
        println!(
            "{} applied {} of {} change(s)",
            style("incomplete:").red().bold(),
            report.applied,
            report.total
        );
        for failure in &report.failures {
            println!("  {} ({})", failure.change, failure.reason);
        }
    }
}
