//! `nvkit paths` command

use anyhow::Result;

use nvkit::ToolkitGate;

pub fn execute() -> Result<()> {
    let desc = ToolkitGate::global().descriptor()?;

    for (name, path) in desc.paths() {
        match path {
            Some(path) => println!("{:<10} {}", name, path.display()),
            None => println!("{:<10} not found", name),
        }
    }

    Ok(())
}
