/// Catalog Linter: validates fragment catalog coverage and quality.
///
/// Usage: catalog_linter <catalog.ron | dir> [--standalone]
///
/// By default the catalog is checked as an override layered over the
/// builtin tables. With `--standalone` it must cover every pool by itself.

use infinite_story::core::catalog::{MergeTone, TemplateCatalog};
use infinite_story::core::template::Template;
use infinite_story::schema::story::{Genre, Mood, NarrativePhase};
use std::path::Path;
use std::process;

const MIN_VARIETY: usize = 3;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: catalog_linter <catalog.ron | dir> [--standalone]");
        process::exit(0);
    }

    let catalog_path = Path::new(&args[1]);
    let standalone = args[2..].iter().any(|a| a == "--standalone");

    let mut errors = Vec::new();
    let mut loaded = TemplateCatalog::default();

    if catalog_path.is_file() {
        match TemplateCatalog::load_from_ron(catalog_path) {
            Ok(catalog) => loaded.merge(catalog),
            Err(e) => {
                eprintln!("ERROR: Failed to load catalog file: {}", e);
                process::exit(1);
            }
        }
    } else if catalog_path.is_dir() {
        load_catalogs_recursive(catalog_path, &mut loaded, &mut errors);
    } else {
        eprintln!("ERROR: Path '{}' does not exist", args[1]);
        process::exit(1);
    }

    let catalog = if standalone {
        loaded
    } else {
        match TemplateCatalog::builtin() {
            Ok(mut base) => {
                base.merge(loaded);
                base
            }
            Err(e) => {
                eprintln!("ERROR: Builtin catalog failed to load: {}", e);
                process::exit(1);
            }
        }
    };

    let (lint_errors, warnings) = lint_catalog(&catalog);
    errors.extend(lint_errors);

    println!("\n=== Catalog Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!("\nSummary: {} errors, {} warnings", errors.len(), warnings.len());

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn load_catalogs_recursive(dir: &Path, catalog: &mut TemplateCatalog, errors: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<_> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            load_catalogs_recursive(&path, catalog, errors);
        } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            match TemplateCatalog::load_from_ron(&path) {
                Ok(layer) => {
                    println!("  Loaded: {}", path.display());
                    catalog.merge(layer);
                }
                Err(e) => errors.push(format!("{}: {}", path.display(), e)),
            }
        }
    }
}

fn lint_catalog(catalog: &TemplateCatalog) -> (Vec<String>, Vec<String>) {
    let mut warnings = Vec::new();

    // Coverage: every key of every pool needs at least one fragment
    let errors: Vec<String> = catalog
        .missing_pools()
        .into_iter()
        .map(|pool| format!("Pool '{}' has no fragments", pool))
        .collect();

    // Variety
    for genre in Genre::ALL {
        check_variety(&mut warnings, "openings", genre.name(), catalog.openings(genre).len());
        check_variety(&mut warnings, "location_clauses", genre.name(), catalog.location_clauses(genre).len());
        check_variety(&mut warnings, "character_names", genre.name(), catalog.character_names(genre).len());
        check_variety(&mut warnings, "location_names", genre.name(), catalog.location_names(genre).len());
    }
    for mood in Mood::ALL {
        check_variety(&mut warnings, "transitions", mood.name(), catalog.transitions(mood).len());
        check_variety(&mut warnings, "actions", mood.name(), catalog.actions(mood).len());
    }
    for phase in NarrativePhase::ALL {
        check_variety(&mut warnings, "phase_phrases", phase.name(), catalog.phase_phrases(phase).len());
    }
    for tone in MergeTone::ALL {
        check_variety(&mut warnings, "merge_transitions", tone.name(), catalog.merge_transitions(tone).len());
    }

    // Fragments that never mention the element they are drawn for
    for genre in Genre::ALL {
        check_mentions(&mut warnings, "openings", genre.name(), catalog.openings(genre), "character");
        check_mentions(&mut warnings, "location_clauses", genre.name(), catalog.location_clauses(genre), "location");
    }
    for mood in Mood::ALL {
        check_mentions(&mut warnings, "actions", mood.name(), catalog.actions(mood), "character");
    }
    check_mentions(&mut warnings, "introductions", "*", catalog.introductions(), "character");
    check_mentions(&mut warnings, "discoveries", "*", catalog.discoveries(), "location");

    // Merge transitions introduce quoted source text and must end in a colon
    for tone in MergeTone::ALL {
        for template in catalog.merge_transitions(tone) {
            let text = template.text();
            if !text.trim_end().ends_with(':') {
                warnings.push(format!(
                    "merge_transitions[{}]: '{}' does not end with ':'",
                    tone.name(),
                    text
                ));
            }
        }
    }

    (errors, warnings)
}

fn check_variety(warnings: &mut Vec<String>, pool: &str, key: &str, len: usize) {
    if len > 0 && len < MIN_VARIETY {
        warnings.push(format!(
            "{}[{}] has only {} entries (minimum {} recommended)",
            pool, key, len, MIN_VARIETY
        ));
    }
}

fn check_mentions(warnings: &mut Vec<String>, pool: &str, key: &str, templates: &[Template], slot: &str) {
    for template in templates {
        if !template.slots().any(|s| s == slot) {
            warnings.push(format!(
                "{}[{}]: '{}' never uses {{{}}}",
                pool,
                key,
                template.text(),
                slot
            ));
        }
    }
}
