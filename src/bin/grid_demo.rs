use staff_grid::config::load_config;
use staff_grid::diagnostics::GridReport;
use staff_grid::image::io::{load_binary_image, write_json_file};
use staff_grid::GridBuilder;
use std::env;
use std::path::PathBuf;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "grid_demo".to_string());
    let config_path = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| format!("Usage: {program} <config.json>"))?;
    let config = load_config(&config_path).map_err(|e| e.to_string())?;

    let image = load_binary_image(&config.input_path, config.threshold).map_err(|e| e.to_string())?;
    let builder = GridBuilder::new(config.grid_params);
    let grid = builder
        .process(&image, config.scale.to_scale())
        .map_err(|e| e.to_string())?;
    let report = GridReport::from_grid(&grid);
    print_text_summary(&report);

    match &config.output.json_out {
        Some(path) => {
            write_json_file(path, &report).map_err(|e| e.to_string())?;
            println!("\nJSON report written to {}", path.display());
        }
        None => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| format!("Failed to serialize JSON: {e}"))?;
            println!("\nJSON report:\n{json}");
        }
    }
    Ok(())
}

fn print_text_summary(report: &GridReport) {
    println!("Grid summary");
    println!("  image: {}x{}", report.input.width, report.input.height);
    println!("  skew slope: {:.5}", report.skew_slope);
    println!("  staves: {}", report.staves.len());
    for staff in &report.staves {
        println!(
            "    staff#{} x:{:.0}..{:.0} lines:{} peaks:{}{}",
            staff.id,
            staff.left,
            staff.right,
            staff.line_count,
            staff.peaks.len(),
            if staff.brace.is_some() { " braced" } else { "" }
        );
    }
    println!("  systems: {}", report.systems.len());
    for system in &report.systems {
        let parts: Vec<String> = system.parts.iter().map(ToString::to_string).collect();
        println!(
            "    system#{} staves:{:?} parts:[{}] groups:{} columns:{}",
            system.id,
            system.staves,
            parts.join(" "),
            system.groups.len(),
            system.column_count
        );
    }
    println!("  latency_ms: {:.3}", report.timings.total_ms);
    for phase in &report.timings.phases {
        println!("    {:<32} {:>8.3} ms", phase.label, phase.elapsed_ms);
    }
}
