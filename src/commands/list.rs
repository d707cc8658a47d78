use anyhow::Result;
use hbget::Repository;

pub fn run(repo: &Repository) -> Result<()> {
    if !repo.check_if_get_init() {
        println!("No packages installed (install path is not initialized).");
        return Ok(());
    }

    let names = repo.list_installed()?;
    if names.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    println!("Installed packages:");
    for name in &names {
        match repo.get_installed(name)? {
            Some(record) => println!("  {} @ {}", name, record.version),
            None => println!("  {}", name),
        }
    }
    println!(
        "\nTotal: {} package{}",
        names.len(),
        if names.len() == 1 { "" } else { "s" }
    );

    Ok(())
}
