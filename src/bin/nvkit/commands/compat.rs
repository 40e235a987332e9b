//! `nvkit compat` command

use anyhow::Result;

use nvkit::core::version::version_list;
use nvkit::ToolkitGate;

pub fn execute() -> Result<()> {
    let gate = ToolkitGate::global();
    let release = gate.toolkit_release()?;
    let backend = gate.codegen();

    println!(
        "CUDA {} with {} {}",
        release,
        backend.name(),
        backend.version()
    );
    println!(
        "  Devices:  {}",
        version_list(gate.supported_device_capabilities()?)
    );
    println!(
        "  PTX ISA:  {}",
        version_list(gate.supported_instruction_set_versions()?)
    );

    Ok(())
}
