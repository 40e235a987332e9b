//! `nvkit status` command

use anyhow::Result;
use serde::Serialize;

use crate::cli::StatusArgs;
use nvkit::{CompatibilityRange, ResolutionState, ToolkitDescriptor, ToolkitGate, ToolkitVersion};

#[derive(Serialize)]
struct StatusReport<'a> {
    functional: bool,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    driver_version: Option<ToolkitVersion>,
    backend: String,
    backend_version: ToolkitVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    toolkit: Option<&'a ToolkitDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compatibility: Option<&'a CompatibilityRange>,
}

pub fn execute(args: StatusArgs, verbose: bool) -> Result<()> {
    let gate = ToolkitGate::global();
    let functional = gate.functional(verbose && !args.json);

    let ready = gate.ensure_ready();
    let report = StatusReport {
        functional,
        state: match gate.state() {
            ResolutionState::Unresolved => "unresolved",
            ResolutionState::Failed => "failed",
            ResolutionState::Ready => "ready",
        },
        error: ready.as_ref().err().map(|e| e.to_string()),
        driver_version: gate.driver_version().ok(),
        backend: gate.codegen().name().to_string(),
        backend_version: gate.codegen().version(),
        toolkit: ready.as_ref().ok().map(|r| &r.descriptor),
        compatibility: ready.as_ref().ok().map(|r| &r.compatibility),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !functional {
        std::process::exit(1);
    }

    Ok(())
}

fn print_report(report: &StatusReport<'_>) {
    if report.functional {
        println!("CUDA toolkit: functional");
    } else {
        println!("CUDA toolkit: not functional");
    }

    if let Some(desc) = report.toolkit {
        println!("  Version:  {} ({})", desc.version, desc.origin);
        for root in &desc.roots {
            println!("  Root:     {}", root.display());
        }
    }

    match report.driver_version {
        Some(v) => println!("  Driver:   CUDA {}", v),
        None => println!("  Driver:   not available"),
    }
    println!("  Backend:  {} {}", report.backend, report.backend_version);

    if let Some(error) = &report.error {
        println!();
        println!("  {}", error);
    }
}
