use std::path::Path;

use atelier_core::export::{export_work, FsWriter};
use atelier_core::Database;

use crate::output::print_json;

pub fn run(db: &Database, work_id: i64, dest: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let dest = export_work(&db.works(), &FsWriter, work_id, dest)?;
    if json {
        print_json(&serde_json::json!({
            "work_id": work_id,
            "dest": dest,
        }))?;
    } else {
        println!("exported work {work_id} to {}", dest.display());
    }
    Ok(())
}
