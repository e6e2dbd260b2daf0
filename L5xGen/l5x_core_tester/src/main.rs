use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use l5x_core::domain::rung::ExecutionStep;
use l5x_core::{Controller, HasRoutines, L5xConfig, ProjectService, TreeObject};
use serde::Serialize;

const DEFAULT_CASE_DIR: &str = "../Docs/l5x_cases";
const CONFIG_FILE: &str = "l5x_config.json";

#[derive(Serialize)]
struct RungReport {
    number: i64,
    text: String,
    max_branch_depth: usize,
    branch_ids: Vec<String>,
    sequence: Vec<ExecutionStep>,
}

#[derive(Serialize)]
struct RoutineReport {
    program: String,
    routine: String,
    rungs: Vec<RungReport>,
}

#[derive(Serialize)]
struct ControllerReport {
    name: String,
    profile: Option<String>,
    processor_type: String,
    software_revision: String,
    datatypes: Vec<String>,
    tags: Vec<String>,
    modules: Vec<String>,
    aois: Vec<String>,
    routines: Vec<RoutineReport>,
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let case_dir = args.get(1).map(String::as_str).unwrap_or(DEFAULT_CASE_DIR);
    let case_dir = Path::new(case_dir);

    if !case_dir.exists() {
        anyhow::bail!("case dir not found: {}", case_dir.display());
    }

    let config = L5xConfig::load_from_file(&case_dir.join(CONFIG_FILE))?;
    let service = ProjectService::from_config(&config);

    let out_dir = case_dir.join("parsed_out");
    fs::create_dir_all(&out_dir)?;

    let mut entries: Vec<PathBuf> = fs::read_dir(case_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("l5x"))
                    .unwrap_or(false)
        })
        .collect();
    entries.sort();

    if entries.is_empty() {
        println!("No .L5X files found in {}", case_dir.display());
        return Ok(());
    }

    for path in entries {
        let file_name = path.file_name().unwrap_or_default().to_string_lossy();
        let size = fs::metadata(&path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        if size == 0 {
            println!("[skip] {} is empty", file_name);
            continue;
        }

        match service.load_file(&path) {
            Ok(controller) => {
                let report = build_report(&controller);
                let out_path = out_dir.join(format!("{}.json", file_name));
                write_json(&out_path, &report)?;
                print_summary(&file_name, &report, &out_path);

                let resaved = out_dir.join(&*file_name);
                match service.save_file(&controller, &resaved) {
                    Ok(written) => println!("  re-exported -> {}", written.display()),
                    Err(err) => println!("[fail] {} re-export: {:#}", file_name, err),
                }
            }
            Err(err) => {
                println!("[fail] {}: {:#}", file_name, err);
            }
        }
    }

    Ok(())
}

fn build_report(controller: &Controller) -> ControllerReport {
    let mut routines = Vec::new();
    for program in controller.programs() {
        for routine in program.routines() {
            if !routine.is_rll() {
                continue;
            }
            routines.push(RoutineReport {
                program: program.name().to_string(),
                routine: routine.name().to_string(),
                rungs: routine
                    .rungs()
                    .iter()
                    .map(|rung| RungReport {
                        number: rung.number(),
                        text: rung.text().to_string(),
                        max_branch_depth: rung.get_max_branch_depth(),
                        branch_ids: owned(rung.branches().ids()),
                        sequence: rung.get_execution_sequence(),
                    })
                    .collect(),
            });
        }
    }

    ControllerReport {
        name: controller.name().to_string(),
        profile: controller.profile().map(str::to_string),
        processor_type: controller.processor_type().to_string(),
        software_revision: controller.software_revision().to_string(),
        datatypes: controller
            .user_datatypes()
            .map(|d| d.name().to_string())
            .collect(),
        tags: owned(controller.tags().names()),
        modules: owned(controller.modules().names()),
        aois: owned(controller.aois().names()),
        routines,
    }
}

fn owned(items: Vec<&str>) -> Vec<String> {
    items.into_iter().map(str::to_string).collect()
}

fn write_json(path: &Path, report: &ControllerReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

fn print_summary(file_name: &str, report: &ControllerReport, out_path: &Path) {
    println!("[ok] {} -> {}", file_name, out_path.display());
    println!(
        "  controller='{}' profile={} processor='{}' revision={} datatypes={} tags={} modules={} aois={}",
        report.name,
        report.profile.as_deref().unwrap_or("-"),
        report.processor_type,
        report.software_revision,
        report.datatypes.len(),
        report.tags.len(),
        report.modules.len(),
        report.aois.len()
    );

    for routine in &report.routines {
        let instructions: usize = routine
            .rungs
            .iter()
            .map(|r| r.sequence.iter().filter(|s| s.instruction.is_some()).count())
            .sum();
        let depth = routine
            .rungs
            .iter()
            .map(|r| r.max_branch_depth)
            .max()
            .unwrap_or(0);
        println!(
            "  - routine {}/{} rungs={} instructions={} max_depth={}",
            routine.program,
            routine.routine,
            routine.rungs.len(),
            instructions,
            depth
        );
    }
}
