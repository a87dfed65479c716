//! # Dungeon Tool
//!
//! Command-line front end: build a definition into world-object files,
//! inspect an existing file set, or export room coordinates.
//!
//! Reports go to stdout. The banner, warnings and errors go to stderr, so
//! `export` without `--out` can be piped straight into a JSON consumer.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use delve_dungeon::{
    read, BuildConfig, CoordinateExport, Diagnostic, DungeonAssembly, DungeonBuilder,
    DungeonDefinition, DungeonError, DungeonResult, DungeonWriter,
};

fn main() -> ExitCode {
    eprintln!("╔══════════════════════════════════════════════════════════════════╗");
    eprintln!("║         DELVE DUNGEON TOOL                                       ║");
    eprintln!("╚══════════════════════════════════════════════════════════════════╝");
    eprintln!();

    let args: Vec<String> = std::env::args().collect();
    let result = match args.get(1).map(String::as_str) {
        Some("build") if args.len() >= 4 => build(&args[2], &args[3], option(&args, "--config")),
        Some("inspect") if args.len() >= 3 => inspect(&args[2]),
        Some("export") if args.len() >= 3 => export(&args[2], option(&args, "--out")),
        _ => {
            usage();
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn usage() {
    eprintln!("Usage:");
    eprintln!("  dungeon_tool build <definition.toml|json> <out_dir> [--config <build.toml>]");
    eprintln!("  dungeon_tool inspect <root_file>");
    eprintln!("  dungeon_tool export <definition|root_file> [--out <coords.json>]");
}

fn option<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn build(definition: &str, out_dir: &str, config: Option<&str>) -> DungeonResult<()> {
    let config = match config {
        Some(path) => BuildConfig::load(path)?,
        None => BuildConfig::default(),
    };
    println!("Loading definition: {definition}");
    let definition = DungeonDefinition::load(definition)?;

    let output = DungeonBuilder::new(config.clone()).build(&definition)?;
    report_diagnostics(&output.diagnostics);

    let written = DungeonWriter::from_config(&config).write(&output.assembly, out_dir)?;
    print_assembly(&output.assembly);

    println!("Root:   {}", written.root.display());
    for group in &written.groups {
        println!("Group:  {}", group.display());
    }
    println!();
    println!("✓ Wrote {} files ({} bytes)", written.groups.len() + 1, written.bytes);
    Ok(())
}

fn inspect(root: &str) -> DungeonResult<()> {
    println!("Reading: {root}");
    let output = read(root)?;
    report_diagnostics(&output.diagnostics);
    print_assembly(&output.assembly);

    println!("┌─ ROOMS ──────────────────────────────────────────────────────────┐");
    for (i, room) in output.assembly.rooms.iter().enumerate() {
        println!(
            "│ {:>3} {:<28} tris {:>6}  bsp nodes {:>5}  depth {:>2}",
            i,
            room.id,
            room.mesh.triangle_count(),
            room.collision.tree.nodes.len(),
            room.collision.tree.depth()
        );
    }
    println!("└──────────────────────────────────────────────────────────────────┘");

    if output.diagnostics.is_empty() {
        println!("✓ File set is consistent");
    } else {
        println!("⚠ {} warnings - see above", output.diagnostics.len());
    }
    Ok(())
}

fn export(input: &str, out: Option<&str>) -> DungeonResult<()> {
    let is_definition = Path::new(input)
        .extension()
        .is_some_and(|ext| ext == "toml" || ext == "json");
    let assembly = if is_definition {
        let output = DungeonBuilder::default().build(&DungeonDefinition::load(input)?)?;
        report_diagnostics(&output.diagnostics);
        output.assembly
    } else {
        let output = read(input)?;
        report_diagnostics(&output.diagnostics);
        output.assembly
    };

    let coordinates = CoordinateExport::from_assembly(&assembly);
    match out {
        Some(path) => {
            coordinates.write_json(path)?;
            println!("✓ Exported {} rooms to {}", coordinates.rooms.len(), path);
        }
        None => {
            let json = coordinates.to_json().map_err(|e| DungeonError::Serialization {
                path: PathBuf::from("<stdout>"),
                source: e.into(),
            })?;
            println!("{json}");
        }
    }
    Ok(())
}

fn report_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("⚠ {diagnostic}");
    }
}

fn print_assembly(assembly: &DungeonAssembly) {
    let bounds = assembly.bounds();
    println!();
    println!("┌─ DUNGEON ────────────────────────────────────────────────────────┐");
    println!("│ Name:               {}", assembly.name);
    println!("│ Map ID:             {}", assembly.map_id);
    println!("│ Category:           {:?}", assembly.category);
    println!("│ Rooms:              {}", assembly.rooms.len());
    println!("│ Portals:            {}", assembly.portals.len());
    println!("│ Materials:          {}", assembly.materials.len());
    println!("│ Lights / Doodads:   {} / {}", assembly.lights.len(), assembly.doodads.len());
    println!("│ Triangles:          {}", assembly.triangle_count());
    println!(
        "│ Bounds:             ({:.1}, {:.1}, {:.1}) .. ({:.1}, {:.1}, {:.1})",
        bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
    );
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();
}
