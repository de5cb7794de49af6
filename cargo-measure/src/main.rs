//! CLI entry point for the cargo-measure tool.
use cargo_measure::{analyze_workspace, read_package, Config, Context, Measurement, Metric};
use clap::{Arg, ArgAction, Command};
use log::info;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const METRICS_HELP: &[&str] = &[
    "Metrics:",
    "  cyclomatic_complexity - 1 + decision points per method, averaged per type",
    "  response_for_class    - own methods plus distinct methods they invoke",
    "  lcom4                 - connected groups of methods sharing fields or calls",
];

const VERIFICATION_HELP: &[&str] = &[
    "Verification:",
    "  max   - violated when value > max (default)",
    "  min   - violated when value < min",
    "  range - violated outside [min, max]",
];

const CONFIG_TEMPLATE: &str = "# Configuration for cargo-measure\n\n\
[metrics]\n\
  [metrics.cyclomatic_complexity]\n\
  enabled = true\n\
  # Average paths per method above this are violations\n\
  verification = \"max\"\n\
  max = 10.0\n\
\n\
  [metrics.response_for_class]\n\
  enabled = true\n\
  verification = \"max\"\n\
  max = 50.0\n\
\n\
  [metrics.lcom4]\n\
  enabled = true\n\
  # More than one component means the type could be split\n\
  verification = \"max\"\n\
  max = 1.0\n";

const DEFAULT_CONFIG: &str = ".measure.toml";

fn init_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let p = path.as_ref();
    if p.exists() {
        eprintln!("{} already exists", p.display());
        return Ok(());
    }
    std::fs::write(p, CONFIG_TEMPLATE)?;
    println!("created {}", p.display());
    Ok(())
}

fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    info!("loading config {}", path.display());
    let s = cargo_measure::loc_try!(std::fs::read_to_string(path));
    Ok(cargo_measure::loc_try!(toml::from_str::<Config>(&s)))
}

#[derive(Serialize, Clone)]
struct ToolInfo {
    version: &'static str,
    target: String,
}

#[derive(Serialize, Clone)]
struct Meta {
    #[serde(rename = "cargo-measure")]
    cargo_measure: ToolInfo,
    metrics: Vec<Metric>,
}

#[derive(Serialize)]
struct OutputRoot {
    meta: Meta,
    project: Measurement,
    errors: Vec<String>,
}

mod text {
    use super::OutputRoot;
    use cargo_measure::{Measurement, Scope};
    use std::fmt::Write;

    fn scope_label(scope: Scope) -> &'static str {
        match scope {
            Scope::Method => "method",
            Scope::Class => "type",
            Scope::Package => "package",
            Scope::Project => "project",
        }
    }

    fn write_measurement(out: &mut String, m: &Measurement, depth: usize) -> std::fmt::Result {
        write!(
            out,
            "{:indent$}{} {}",
            "",
            scope_label(m.scope),
            m.name,
            indent = depth * 2
        )?;
        for mv in m.metric_values() {
            write!(out, " {}={:.2}", mv.name, mv.value)?;
            if mv.violated {
                out.push('!');
            }
        }
        out.push('\n');
        for child in m.children() {
            write_measurement(out, child, depth + 1)?;
        }
        Ok(())
    }

    pub(super) fn to_string(root: &OutputRoot) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        write_measurement(&mut out, &root.project, 0)?;
        if !root.errors.is_empty() {
            writeln!(out, "errors:")?;
            for err in &root.errors {
                writeln!(out, "  {}", err)?;
            }
        }
        Ok(out.trim_end().to_string())
    }
}

fn emit_results(root: &OutputRoot, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let out_str = match format {
        "json" => cargo_measure::loc_try!(serde_json::to_string(root)),
        "yaml" => cargo_measure::loc_try!(serde_yaml::to_string(root)),
        "text" => cargo_measure::loc_try!(text::to_string(root)),
        other => {
            eprintln!("unknown output format: {}", other);
            return Ok(());
        }
    };
    println!("{}", out_str);
    Ok(())
}

fn project_name(metadata: &cargo_metadata::Metadata) -> String {
    metadata
        .workspace_root
        .file_name()
        .map(|s| s.to_string())
        .unwrap_or_else(|| metadata.workspace_root.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .format_source_path(true)
        .format_line_number(true)
        .init();

    // When invoked as a cargo subcommand ("cargo measure"), cargo passes
    // "measure" as the first argument to this binary.
    let mut args: Vec<std::ffi::OsString> = std::env::args_os().collect();
    if args.get(1).map(|a| a == "measure").unwrap_or(false) {
        args.remove(1);
    }

    let matches = Command::new("cargo-measure")
        .version(env!("CARGO_PKG_VERSION"))
        .disable_help_flag(true)
        .after_help(format!(
            "{}\n\n{}",
            METRICS_HELP.join("\n"),
            VERIFICATION_HELP.join("\n")
        ))
        .subcommand(
            Command::new("init")
                .about("Generate a template metrics config")
                .arg(
                    Arg::new("path")
                        .value_name("PATH")
                        .help("Where to create the config file")
                        .required(false),
                ),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Output format: json, yaml or text")
                .value_name("FORMAT")
                .default_value("json"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to metrics config file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("parallel")
                .short('j')
                .long("parallel")
                .help("Measure the files of each package in parallel")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("fail-on-violation")
                .long("fail-on-violation")
                .help("Exit with status 1 when any metric is violated")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("help")
                .short('h')
                .action(ArgAction::Help)
                .long("help")
                .visible_short_alias('?')
                .help("Show this help message"),
        )
        .get_matches_from(args);

    if let Some(("init", sub_m)) = matches.subcommand() {
        let path = sub_m
            .get_one::<String>("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
        return init_config(path);
    }

    let format = matches
        .get_one::<String>("output")
        .map(|s| s.as_str())
        .unwrap_or("json");
    let parallel = matches.get_flag("parallel");
    let fail_on_violation = matches.get_flag("fail-on-violation");

    let mut cmd = cargo_metadata::MetadataCommand::new();
    cmd.no_deps();
    let metadata = cargo_measure::loc_try!(cmd.exec());

    let config_path: Option<PathBuf> = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .or_else(|| {
            let default = Path::new(&metadata.workspace_root).join(DEFAULT_CONFIG);
            if default.exists() {
                Some(default)
            } else {
                None
            }
        });
    let config = match config_path {
        Some(ref path) => load_config(path)?,
        None => Config::default(),
    };
    let ctx = cargo_measure::loc_try!(Context::from_config(&config));
    info!(
        "found {} workspace members",
        metadata.workspace_members.len()
    );

    let mut packages = Vec::new();
    let mut seen = HashSet::new();
    for id in &metadata.workspace_members {
        let package = &metadata[id];
        let name = package.name.to_string();
        if !seen.insert(name.clone()) {
            continue;
        }
        let units = cargo_measure::loc_try!(read_package(package));
        packages.push((name, units));
    }

    let project = cargo_measure::loc_try!(analyze_workspace(
        &ctx,
        &project_name(&metadata),
        &packages,
        parallel
    ));
    let violated = project.any_violated();
    let root = OutputRoot {
        meta: Meta {
            cargo_measure: ToolInfo {
                version: env!("CARGO_PKG_VERSION"),
                target: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
            },
            metrics: ctx.metrics().to_vec(),
        },
        project,
        errors: ctx.errors(),
    };
    cargo_measure::loc_try!(emit_results(&root, format));

    if fail_on_violation && violated {
        let mut summary = String::new();
        for package in root.project.children() {
            if package.any_violated() {
                let _ = write!(summary, " {}", package.name);
            }
        }
        eprintln!("metric violations in:{}", summary);
        std::process::exit(1);
    }
    Ok(())
}
