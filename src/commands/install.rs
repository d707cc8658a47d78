use super::BatchOutcome;
use anyhow::Result;
use hbget::{Error, ProgressCallback, Repository};
use std::sync::Arc;

pub fn run(repo: &Repository, names: &[String]) -> Result<BatchOutcome> {
    if !repo.check_if_get_init() {
        repo.init_get()?;
    }

    let progress: ProgressCallback = Arc::new(|msg, _current, _total| {
        println!("  {}", msg);
    });

    let mut outcome = BatchOutcome::new();
    for name in names {
        match repo.install(name, Some(Arc::clone(&progress))) {
            Ok(record) => {
                println!(
                    "✓ Installed {} {} ({} file{})",
                    name,
                    record.version,
                    record.files.len(),
                    if record.files.len() == 1 { "" } else { "s" }
                );
                outcome.succeeded.push(name.clone());
            }
            Err(Error::PackageNotFound(_)) => {
                println!("Failed to find {} in repo. Skipping.", name);
                outcome.failed.push(name.clone());
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(outcome)
}
