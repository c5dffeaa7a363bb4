//! HostTune CLI - Host Tuning Profile Management
//!
//! Applies vendor-provided tuning profiles to a running Linux host.

use clap::Parser;
use hosttune::app::TuneApp;
use hosttune::config::{CliArgs, Commands, NoteCommand, OutputFormat, SolutionCommand, TunePaths};
use hosttune::error::{HostTuneError, Result};
use hosttune::report;
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();

    // Handle result
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    let mut app = TuneApp::launch(TunePaths::default())?;

    match &args.command {
        Commands::Note { action } => handle_note(&mut app, action, &args),
        Commands::Solution { action } => handle_solution(&mut app, action, &args),
        Commands::Revert { target } => cmd_revert_all(&mut app, target, &args),
    }
}

/// Apply and revert change system state; refuse early without root
fn require_root() -> Result<()> {
    if !hosttune::system::is_user_root() {
        return Err(HostTuneError::NotRoot);
    }
    Ok(())
}

fn handle_note(app: &mut TuneApp, action: &NoteCommand, args: &CliArgs) -> Result<()> {
    match action {
        NoteCommand::List => cmd_note_list(app),
        NoteCommand::Applied => {
            for id in app.applied_notes() {
                println!("{}", id);
            }
            Ok(())
        }
        NoteCommand::Enabled => {
            for id in &app.tune_for_notes {
                println!("{}", id);
            }
            Ok(())
        }
        NoteCommand::Verify { id } => cmd_note_verify(app, id.as_deref(), args),
        NoteCommand::Simulate { id } => cmd_note_simulate(app, id, args),
        NoteCommand::Apply { id } => {
            require_root()?;
            app.tune_note(id)?;
            if !args.quiet {
                println!("note {} applied", id);
                remember_message(app);
            }
            Ok(())
        }
        NoteCommand::Revert { id } => {
            require_root()?;
            app.revert_note(id)?;
            if !args.quiet {
                println!("note {} reverted", id);
            }
            Ok(())
        }
        NoteCommand::Show { id } => cmd_note_show(app, id),
    }
}

fn handle_solution(app: &mut TuneApp, action: &SolutionCommand, args: &CliArgs) -> Result<()> {
    match action {
        SolutionCommand::List => {
            for name in app.all_solutions.sorted_names() {
                let notes = app.solution_notes(&name)?;
                println!("{:<20} {}", name, notes.join(" "));
            }
            Ok(())
        }
        SolutionCommand::Enabled => {
            for name in &app.tune_for_solutions {
                println!("{}", name);
            }
            Ok(())
        }
        SolutionCommand::Verify { name } => cmd_solution_verify(app, name.as_deref(), args),
        SolutionCommand::Apply { name } => {
            require_root()?;
            let applied = app.tune_solution(name)?;
            if !args.quiet {
                if applied.is_empty() {
                    println!("all notes of solution {} were already applied", name);
                } else {
                    println!("solution {} applied ({} notes)", name, applied.len());
                }
                remember_message(app);
            }
            Ok(())
        }
        SolutionCommand::Revert { name } => {
            require_root()?;
            app.revert_solution(name)?;
            if !args.quiet {
                println!("solution {} reverted", name);
            }
            Ok(())
        }
    }
}

fn cmd_note_list(app: &TuneApp) -> Result<()> {
    println!("All notes (+ denotes enabled notes, * denotes applied notes):");
    let applied = app.applied_notes();
    for id in app.all_notes.sorted_ids() {
        let marker = if applied.iter().any(|a| a == &id) {
            '*'
        } else if app.tune_for_notes.iter().any(|n| n == &id) {
            '+'
        } else {
            ' '
        };
        let name = app
            .all_notes
            .get(&id)
            .map(|n| n.name())
            .unwrap_or_default();
        let headline = name.lines().next().unwrap_or("");
        println!(" {} {:<12} {}", marker, id, headline);
    }
    Ok(())
}

fn cmd_note_verify(app: &TuneApp, id: Option<&str>, args: &CliArgs) -> Result<()> {
    let (unsatisfied, comparisons) = match id {
        Some(id) => {
            let comparison = app.verify_note(id)?;
            let unsatisfied = if comparison.is_compliant() {
                Vec::new()
            } else {
                vec![id.to_string()]
            };
            (unsatisfied, vec![comparison])
        }
        None => app.verify_all()?,
    };

    if comparisons.is_empty() {
        println!("No notes applied, nothing to verify.");
        return Ok(());
    }

    match args.format {
        OutputFormat::Json => {
            let report = report::verify_report(&comparisons);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            let mut stdout = std::io::stdout();
            let colored = console::Term::stdout().is_term();
            report::print_verify_table(&mut stdout, &comparisons, colored)
                .map_err(HostTuneError::from)?;
            if unsatisfied.is_empty() {
                println!("\nThe running system is currently well-tuned according to all applied notes.");
            }
        }
    }

    if !unsatisfied.is_empty() {
        return Err(HostTuneError::NotCompliant(unsatisfied.join(", ")));
    }
    Ok(())
}

fn cmd_note_simulate(app: &TuneApp, id: &str, args: &CliArgs) -> Result<()> {
    let comparison = app.simulate_note(id)?;
    match args.format {
        OutputFormat::Json => {
            let report = report::simulate_report(&comparison);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!(
                "If you run `hosttune note apply {}`, the following changes will be applied to your system:\n",
                id
            );
            let mut stdout = std::io::stdout();
            report::print_simulate_table(&mut stdout, &comparison).map_err(HostTuneError::from)?;
        }
    }
    Ok(())
}

fn cmd_note_show(app: &TuneApp, id: &str) -> Result<()> {
    let settings = app.note_by_id(id)?;
    let content = std::fs::read_to_string(&settings.conf_file_path)
        .map_err(|e| HostTuneError::io(&settings.conf_file_path, e))?;
    println!("Content of note {}:\n{}", id, content);
    Ok(())
}

fn cmd_solution_verify(app: &TuneApp, name: Option<&str>, args: &CliArgs) -> Result<()> {
    let names: Vec<String> = match name {
        Some(n) => vec![n.to_string()],
        None => app.tune_for_solutions.clone(),
    };
    if names.is_empty() {
        println!("No solutions enabled, nothing to verify.");
        return Ok(());
    }

    let mut comparisons = Vec::new();
    let mut unsatisfied = Vec::new();
    for name in &names {
        for id in app.solution_notes(name)? {
            let comparison = app.verify_note(&id)?;
            if !comparison.is_compliant() {
                unsatisfied.push(id.clone());
            }
            comparisons.push(comparison);
        }
    }

    match args.format {
        OutputFormat::Json => {
            let report = report::verify_report(&comparisons);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            let mut stdout = std::io::stdout();
            let colored = console::Term::stdout().is_term();
            report::print_verify_table(&mut stdout, &comparisons, colored)
                .map_err(HostTuneError::from)?;
        }
    }

    if !unsatisfied.is_empty() {
        return Err(HostTuneError::NotCompliant(unsatisfied.join(", ")));
    }
    Ok(())
}

fn cmd_revert_all(app: &mut TuneApp, target: &str, args: &CliArgs) -> Result<()> {
    if target != "all" {
        return Err(HostTuneError::config(format!(
            "unknown revert target '{}', only 'all' is supported",
            target
        )));
    }
    require_root()?;
    let had_notes = !app.applied_notes().is_empty();
    if had_notes && !args.quiet {
        println!("Reverting all notes and solutions, this may take some time...");
    }
    app.revert_all()?;
    if had_notes && !args.quiet {
        println!("Parameters tuned by the notes and solutions have been successfully reverted.");
    }
    Ok(())
}

fn remember_message(app: &TuneApp) {
    if !app.applied_notes().is_empty() {
        println!("\nRemember: tuned values are not persistent across reboots; re-apply after booting or enable a boot-time apply in your init system.");
    }
}
