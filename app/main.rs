use std::{
    env::current_dir,
    io::{stdout, Write},
    process::exit,
};

use clap::{Parser, Subcommand};
use history::Workspace;
use serde::Serialize;
use serde_json::json;

#[derive(Parser, Debug)]
struct Arguments {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(about = "summarizes the unpublished changes")]
    Status,
    #[clap(about = "shows the changed files and folders")]
    Changes,
    #[clap(about = "lists the published snapshots, newest first")]
    Snapshots,
    #[clap(about = "publish the current changes as a new snapshot")]
    Publish {
        #[arg(short, long, help = "name for this snapshot")]
        name: Option<String>,
    },
    #[clap(about = "revert changes to their last published content")]
    Discard {
        #[arg(long, help = "discard every change", conflicts_with = "paths")]
        all: bool,
        #[arg(help = "changed paths to discard", required_unless_present = "all")]
        paths: Vec<String>,
    },
    #[clap(about = "overwrite a file with its content in a snapshot")]
    Restore { id: String, path: String },
    #[clap(about = "show one snapshot")]
    Show { id: String },
    #[clap(about = "print a file's content in a snapshot")]
    Cat { id: String, path: String },
    #[clap(about = "list the snapshots that recorded a file")]
    History { path: String },
    #[clap(about = "delete a snapshot, keeping its content")]
    Delete { id: String },
    #[clap(about = "keep only the newest snapshots")]
    Cleanup {
        #[arg(short, long, help = "number of snapshots to keep")]
        keep: usize,
    },
}

fn print_json<A: Serialize>(thing: &A) -> history::Result<()> {
    let mut out = stdout();
    serde_json::to_writer_pretty(&mut out, thing)?;
    writeln!(out)?;
    Ok(())
}

fn run(cmd: Command) -> history::Result<()> {
    let workspace = Workspace::open(current_dir()?)?;
    use Command::*;
    match cmd {
        Status => print_json(&workspace.status()?),
        Changes => print_json(&workspace.changes()?),
        Snapshots => print_json(&workspace.snapshots()?),
        Publish { name } => print_json(&workspace.publish(name.as_deref())?),
        Discard { all, paths } => {
            let target = if all {
                history::Discard::All
            } else {
                history::Discard::Paths(paths)
            };
            let restored = workspace.discard(target)?;
            print_json(&json!({ "restored": restored }))
        }
        Restore { id, path } => {
            let written = workspace.restore_file(&id, &path)?;
            print_json(&json!({ "path": path, "bytesWritten": written }))
        }
        Show { id } => print_json(&workspace.snapshot(&id)?),
        Cat { id, path } => {
            let content = workspace.snapshot_file(&id, &path)?;
            stdout().write_all(&content)?;
            Ok(())
        }
        History { path } => print_json(&workspace.file_history(&path)?),
        Delete { id } => {
            let deleted = workspace.delete_snapshot(&id)?;
            print_json(&json!({ "id": id, "deleted": deleted }))
        }
        Cleanup { keep } => print_json(&workspace.cleanup(keep)?),
    }
}

fn main() {
    env_logger::init();
    let args = Arguments::parse();
    if let Err(err) = run(args.cmd) {
        eprintln!("error: {}", err);
        exit(1);
    }
}
