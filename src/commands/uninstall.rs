use super::BatchOutcome;
use anyhow::Result;
use hbget::{Error, Repository};

pub fn run(repo: &Repository, names: &[String]) -> Result<BatchOutcome> {
    if !repo.check_if_get_init() {
        repo.init_get()?;
    }

    let mut outcome = BatchOutcome::new();
    for name in names {
        match repo.uninstall(name) {
            Ok(()) => {
                println!("✓ Uninstalled {}", name);
                outcome.succeeded.push(name.clone());
            }
            Err(Error::NotInstalled(_)) => {
                println!("{} not installed. Skipping uninstall.", name);
                outcome.failed.push(name.clone());
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(outcome)
}
