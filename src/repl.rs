//! Line-oriented editing session over one playlist.

use std::collections::BTreeSet;
use std::error::Error;
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use log::warn;
use tracklist::backends::{LibraryBackend, PlaylistBackend};
use tracklist::config::Config;
use tracklist::playlist_session::PlaylistSession;
use tracklist::search::SearchState;

use crate::cli::{print_entries, sort_label, SortArg};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ReplLine {
    #[command(subcommand)]
    command: ReplCommand,
}

#[derive(Subcommand, Debug)]
enum ReplCommand {
    /// Search the library and append the best hit
    Add {
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(long)]
        all: bool,
    },
    /// Search the library; `pick` appends from the results
    Find { query: Vec<String> },
    /// Append search results by their number
    Pick {
        #[arg(required = true)]
        numbers: Vec<usize>,
    },
    /// Remove entries by order, or the selection when none are given
    Rm { orders: Vec<usize> },
    /// Move the entry at FROM so it lands at TO
    Mv { from: usize, to: usize },
    /// Move the selected entries to drop gap GAP
    MvSel { gap: usize },
    /// Toggle entries in the selection
    Sel {
        orders: Vec<usize>,
        #[arg(long, conflicts_with = "none")]
        all: bool,
        #[arg(long)]
        none: bool,
    },
    Undo,
    Redo,
    /// Sort the view; repeating the column flips the direction
    Sort {
        #[arg(value_enum)]
        column: SortArg,
    },
    /// Filter the view; no text clears it
    Filter { text: Vec<String> },
    Rename {
        #[arg(required = true)]
        name: Vec<String>,
    },
    Show,
    /// Reload from the server, dropping local history
    Refresh,
    #[command(alias = "exit")]
    Quit,
}

pub fn run<B, L>(
    mut session: PlaylistSession<B>,
    library: &L,
    config: &Config,
) -> Result<(), Box<dyn Error>>
where
    B: PlaylistBackend + 'static,
    L: LibraryBackend,
{
    show(&session);
    let mut search = SearchState::new(Duration::from_millis(config.search.debounce_ms));
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{}> ", session.editor().playlist().name);
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        if line.trim().is_empty() {
            session.poll_outcomes();
            report_status(&mut session);
            continue;
        }

        let parsed = match ReplLine::try_parse_from(line.split_whitespace()) {
            Ok(parsed) => parsed,
            Err(err) => {
                let _ = err.print();
                continue;
            }
        };
        if matches!(parsed.command, ReplCommand::Quit) {
            break;
        }
        if let Err(err) = execute(&mut session, &mut search, library, parsed.command) {
            println!("error: {err}");
        }
        session.poll_outcomes();
        report_status(&mut session);
    }

    let timeout = Duration::from_secs(config.editor.save_timeout_secs);
    if !session.flush(timeout) {
        warn!("Exiting with unsaved playlist changes");
    }
    report_status(&mut session);
    Ok(())
}

fn execute<B, L>(
    session: &mut PlaylistSession<B>,
    search: &mut SearchState,
    library: &L,
    command: ReplCommand,
) -> Result<(), Box<dyn Error>>
where
    B: PlaylistBackend + 'static,
    L: LibraryBackend,
{
    match command {
        ReplCommand::Find { query } => {
            search.input(&query.join(" "), Instant::now());
            run_search(search, library)?;
            for (number, hit) in search.results().iter().enumerate() {
                println!("{number:>4}  {}", hit.label());
            }
            return Ok(());
        }
        ReplCommand::Pick { numbers } => {
            let picked: Vec<_> = numbers
                .iter()
                .filter_map(|number| search.results().get(*number).cloned())
                .collect();
            if picked.len() != numbers.len() {
                println!("Only {} search result(s) to pick from", search.results().len());
                return Ok(());
            }
            session.apply(|editor| editor.add_tracks(picked));
        }
        ReplCommand::Add { query, all } => {
            let mut hits = library.search_library(&query.join(" "))?;
            if !all {
                hits.truncate(1);
            }
            if !session.apply(|editor| editor.add_tracks(hits)) {
                println!("No library matches");
                return Ok(());
            }
        }
        ReplCommand::Rm { orders } => {
            let changed = if orders.is_empty() {
                session.apply(|editor| editor.remove_selected())
            } else {
                let orders: BTreeSet<usize> = orders.into_iter().collect();
                session.apply(|editor| editor.remove_orders(&orders))
            };
            if !changed {
                println!("Nothing removed");
                return Ok(());
            }
        }
        ReplCommand::Mv { from, to } => {
            session.try_apply(|editor| editor.move_entry(from, to))?;
        }
        ReplCommand::MvSel { gap } => {
            session.try_apply(|editor| editor.move_selected(gap))?;
        }
        ReplCommand::Sel { orders, all, none } => {
            let editor = session.editor_mut();
            if all {
                editor.select_all();
            } else if none {
                editor.clear_selection();
            }
            for order in orders {
                editor.toggle_selection(order);
            }
        }
        ReplCommand::Undo => {
            if !session.undo() {
                println!("Nothing to undo");
                return Ok(());
            }
        }
        ReplCommand::Redo => {
            if !session.redo() {
                println!("Nothing to redo");
                return Ok(());
            }
        }
        ReplCommand::Sort { column } => session.editor_mut().set_sort(column.into()),
        ReplCommand::Filter { text } => session.editor_mut().set_filter(&text.join(" ")),
        ReplCommand::Rename { name } => {
            let name = name.join(" ");
            session.rename(&name)?;
        }
        ReplCommand::Show => {}
        ReplCommand::Refresh => session.refresh()?,
        ReplCommand::Quit => return Ok(()),
    }
    show(session);
    Ok(())
}

/// Waits out the debounce window, then runs whatever ticket it yields.
fn run_search<L: LibraryBackend>(
    search: &mut SearchState,
    library: &L,
) -> Result<(), Box<dyn Error>> {
    if let Some(deadline) = search.deadline() {
        std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
    }
    if let Some(ticket) = search.poll(Instant::now()) {
        let hits = library.search_library(&ticket.query)?;
        search.accept(&ticket, hits);
    }
    Ok(())
}

fn show<B: PlaylistBackend + 'static>(session: &PlaylistSession<B>) {
    let editor = session.editor();
    let mut flags = vec![sort_label(editor.sort())];
    if !editor.filter().is_empty() {
        flags.push(format!("filter '{}'", editor.filter()));
    }
    if !editor.reorder_allowed() {
        flags.push("reorder locked".to_string());
    }
    println!(
        "{} ({} entries, {} selected; {})",
        editor.playlist().name,
        editor.entries().len(),
        editor.selection().len(),
        flags.join(", ")
    );
    print_entries(&editor.view(), Some(editor.selection()));
}

fn report_status<B: PlaylistBackend + 'static>(session: &mut PlaylistSession<B>) {
    let editor = session.editor_mut();
    if let Some(status) = editor.status() {
        println!("{status}");
        editor.clear_status();
    }
}
