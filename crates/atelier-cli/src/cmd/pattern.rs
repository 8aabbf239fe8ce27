use std::path::PathBuf;

use anyhow::bail;
use atelier_core::{discovery, Database};
use clap::Subcommand;

use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum PatternSubcommand {
    /// List the pattern library
    List,
    /// Show one pattern
    Show { id: i64 },
    /// Scan a directory with an external tool and import what it finds
    Import {
        dir: PathBuf,
        /// Scanner executable
        #[arg(long, default_value = "pattern-scan")]
        tool: String,
    },
}

pub async fn run(db: &Database, subcommand: PatternSubcommand, json: bool) -> anyhow::Result<()> {
    let patterns = db.patterns();
    match subcommand {
        PatternSubcommand::List => {
            let all = patterns.list()?;
            if json {
                print_json(&all)?;
            } else {
                let rows = all
                    .iter()
                    .map(|p| {
                        vec![
                            p.id.to_string(),
                            p.name.clone(),
                            p.pattern_type.to_string(),
                            p.tags.join(","),
                        ]
                    })
                    .collect();
                print_table(&["ID", "NAME", "TYPE", "TAGS"], rows);
            }
        }
        PatternSubcommand::Show { id } => {
            let Some(pattern) = patterns.get(id)? else {
                bail!("pattern not found: {id}");
            };
            if json {
                print_json(&pattern)?;
            } else {
                println!("{} ({})", pattern.name, pattern.pattern_type);
                println!("{}", pattern.description);
                if !pattern.tags.is_empty() {
                    println!("tags: {}", pattern.tags.join(", "));
                }
            }
        }
        PatternSubcommand::Import { dir, tool } => {
            let discovered = discovery::scan(&tool, &dir).await?;
            let created = discovery::import(&patterns, &discovered)?;
            if json {
                print_json(&created)?;
            } else {
                println!("imported {} pattern(s)", created.len());
                for p in &created {
                    println!("  {} {}", p.id, p.name);
                }
            }
        }
    }
    Ok(())
}
