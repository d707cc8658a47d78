use anyhow::Result;
use hbget::Repository;
use indexmap::IndexMap;

/// Download icons for the named packages, returning name -> local path.
pub fn icons(repo: &Repository, names: &[String]) -> Result<IndexMap<String, String>> {
    let mut downloaded = IndexMap::new();
    for name in names {
        let path = repo.get_icon(name)?;
        downloaded.insert(name.clone(), path.display().to_string());
    }
    Ok(downloaded)
}

/// Download screenshots for the named packages, returning name -> local path.
pub fn screenshots(repo: &Repository, names: &[String]) -> Result<IndexMap<String, String>> {
    let mut downloaded = IndexMap::new();
    for name in names {
        let path = repo.get_screenshot(name)?;
        downloaded.insert(name.clone(), path.display().to_string());
    }
    Ok(downloaded)
}
