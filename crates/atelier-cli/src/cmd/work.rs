use anyhow::bail;
use atelier_core::{Database, WorkType};
use clap::Subcommand;

use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum WorkSubcommand {
    /// Start a new work
    Create {
        name: String,
        /// skill, agent, or orchestration
        #[arg(long = "type")]
        work_type: String,
        /// Pattern id to start from
        #[arg(long)]
        from_pattern: Option<i64>,
    },
    /// List all works
    List,
    /// Show one work and its staged files
    Show { id: i64 },
    /// Delete a work, its sessions, and its staged files
    Delete { id: i64 },
}

pub fn run(db: &Database, subcommand: WorkSubcommand, json: bool) -> anyhow::Result<()> {
    let works = db.works();
    match subcommand {
        WorkSubcommand::Create {
            name,
            work_type,
            from_pattern,
        } => {
            let work_type = work_type.parse::<WorkType>()?;
            let work = works.create(&name, work_type, from_pattern)?;
            if json {
                print_json(&work)?;
            } else {
                println!("created work {}: {} ({})", work.id, work.name, work.work_type);
            }
        }
        WorkSubcommand::List => {
            let all = works.list()?;
            if json {
                print_json(&all)?;
            } else {
                let rows = all
                    .iter()
                    .map(|w| {
                        vec![
                            w.id.to_string(),
                            w.name.clone(),
                            w.work_type.to_string(),
                            w.status.to_string(),
                        ]
                    })
                    .collect();
                print_table(&["ID", "NAME", "TYPE", "STATUS"], rows);
            }
        }
        WorkSubcommand::Show { id } => {
            let Some(work) = works.get(id)? else {
                bail!("work not found: {id}");
            };
            let files = works.files_for_work(id)?;
            if json {
                print_json(&serde_json::json!({ "work": work, "files": files }))?;
            } else {
                println!("{} ({}) — {}", work.name, work.work_type, work.status);
                if let Some(path) = &work.export_path {
                    println!("exported to: {path}");
                }
                for file in &files {
                    let marker = if file.edited_content.is_some() {
                        " (edited)"
                    } else {
                        ""
                    };
                    println!("  {}{marker}", file.file_path);
                }
            }
        }
        WorkSubcommand::Delete { id } => {
            if !works.delete(id)? {
                bail!("work not found: {id}");
            }
            println!("deleted work {id}");
        }
    }
    Ok(())
}
