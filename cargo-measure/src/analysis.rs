use crate::cohesion::CohesionParser;
use crate::context::Context;
use crate::cyclomatic::CyclomaticParser;
use crate::error::{Error, Result};
use crate::frontend::{FrontEnd, RustFrontEnd, SourceUnit};
use crate::measurement::{Measurement, MetricValue, Scope};
use crate::metrics::{Metric, CYCLOMATIC_COMPLEXITY, LCOM4, RESPONSE_FOR_CLASS};
use crate::parser::MetricParser;
use crate::response::ResponseParser;
use log::{debug, info};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The parser of one configured metric.
#[derive(Debug, Clone)]
pub enum AnyParser {
    Cyclomatic(CyclomaticParser),
    Response(ResponseParser),
    Cohesion(CohesionParser),
}

macro_rules! dispatch {
    ($self:expr, $parser:ident => $body:expr) => {
        match $self {
            AnyParser::Cyclomatic($parser) => $body,
            AnyParser::Response($parser) => $body,
            AnyParser::Cohesion($parser) => $body,
        }
    };
}

impl AnyParser {
    pub fn for_metric(ctx: &Context, name: &str) -> Result<Self> {
        match name {
            CYCLOMATIC_COMPLEXITY => Ok(AnyParser::Cyclomatic(CyclomaticParser::new(ctx)?)),
            RESPONSE_FOR_CLASS => Ok(AnyParser::Response(ResponseParser::new(ctx)?)),
            LCOM4 => Ok(AnyParser::Cohesion(CohesionParser::new(ctx)?)),
            other => Err(Error::InvalidConfiguration(format!(
                "no parser measures `{other}`"
            ))),
        }
    }

    /// One parser per metric registered in `ctx`.
    pub fn all(ctx: &Context) -> Result<Vec<Self>> {
        ctx.metrics()
            .iter()
            .map(|m| Self::for_metric(ctx, &m.name))
            .collect()
    }

    pub fn metric(&self) -> &Metric {
        dispatch!(self, p => p.metric())
    }

    pub fn measure_tree<F: FrontEnd>(
        &self,
        frontend: &F,
        tree: &F::Tree,
    ) -> Result<Vec<Measurement>> {
        dispatch!(self, p => p.measure_tree(frontend, tree))
    }

    pub fn fold(&self, parent: &mut Measurement, child: Measurement) -> Result<()> {
        dispatch!(self, p => p.fold(parent, child))
    }

    pub fn accumulate_into(
        &self,
        parent: &mut Measurement,
        incoming: &MetricValue,
    ) -> Result<()> {
        dispatch!(self, p => p.accumulate_into(parent, incoming))
    }

    pub fn finalize(&self, parent: &mut Measurement) -> Result<()> {
        dispatch!(self, p => p.finalize(parent))
    }
}

type Measured = Vec<(usize, Vec<Measurement>)>;

/// Build the tree of a unit once and let every parser measure it.
fn measure_unit<F: FrontEnd>(
    ctx: &Context,
    frontend: &F,
    parsers: &[AnyParser],
    unit: &SourceUnit,
) -> Result<Measured> {
    debug!("measuring {}", unit.name);
    let tree = match frontend.build_syntax_tree(unit) {
        Ok(tree) => tree,
        Err(err) if err.is_parse_failure() => {
            ctx.record_error(&err);
            return Ok(Vec::new());
        }
        Err(err) => return Err(err),
    };
    parsers
        .iter()
        .enumerate()
        .map(|(i, p)| p.measure_tree(frontend, &tree).map(|classes| (i, classes)))
        .collect()
}

fn fold_unit(parsers: &[AnyParser], package: &mut Measurement, measured: Measured) -> Result<()> {
    for (i, classes) in measured {
        for class in classes {
            parsers[i].fold(package, class)?;
        }
    }
    Ok(())
}

fn finalize_all(parsers: &[AnyParser], measurement: &mut Measurement) -> Result<()> {
    for parser in parsers {
        parser.finalize(measurement)?;
    }
    Ok(())
}

/// Measure the units of one package, one after another.
pub fn analyze_units(
    ctx: &Context,
    package_name: &str,
    units: &[SourceUnit],
) -> Result<Measurement> {
    let parsers = AnyParser::all(ctx)?;
    let mut package = Measurement::new(Scope::Package, package_name);
    for unit in units {
        let measured = measure_unit(ctx, &RustFrontEnd, &parsers, unit)?;
        fold_unit(&parsers, &mut package, measured)?;
    }
    finalize_all(&parsers, &mut package)?;
    Ok(package)
}

/// Measure the units of one package concurrently. Units are walked in
/// parallel and folded in unit order, so the result matches
/// [`analyze_units`] child for child.
pub fn analyze_units_parallel(
    ctx: &Context,
    package_name: &str,
    units: &[SourceUnit],
) -> Result<Measurement> {
    let parsers = AnyParser::all(ctx)?;
    let measured = units
        .par_iter()
        .map(|unit| measure_unit(ctx, &RustFrontEnd, &parsers, unit))
        .collect::<Result<Vec<_>>>()?;
    let mut package = Measurement::new(Scope::Package, package_name);
    for unit in measured {
        fold_unit(&parsers, &mut package, unit)?;
    }
    finalize_all(&parsers, &mut package)?;
    Ok(package)
}

/// Fold finalized package measurements into one project measurement.
pub fn analyze_project(
    ctx: &Context,
    project_name: &str,
    packages: Vec<Measurement>,
) -> Result<Measurement> {
    let parsers = AnyParser::all(ctx)?;
    let mut project = Measurement::new(Scope::Project, project_name);
    for package in packages {
        let values = package.metric_values().to_vec();
        project.add_or_merge_child(package)?;
        for parser in &parsers {
            if let Some(value) = values.iter().find(|v| v.name == parser.metric().name) {
                parser.accumulate_into(&mut project, value)?;
            }
        }
    }
    finalize_all(&parsers, &mut project)?;
    Ok(project)
}

/// Measure every package and roll the results up to the project.
///
/// Each entry is a package name paired with its source units.
pub fn analyze_workspace(
    ctx: &Context,
    project_name: &str,
    packages: &[(String, Vec<SourceUnit>)],
    parallel: bool,
) -> Result<Measurement> {
    debug!("analysing {} packages", packages.len());
    let mut measured = Vec::new();
    for (name, units) in packages {
        info!("measuring package {} ({} units)", name, units.len());
        let package = if parallel {
            analyze_units_parallel(ctx, name, units)?
        } else {
            analyze_units(ctx, name, units)?
        };
        measured.push(package);
    }
    analyze_project(ctx, project_name, measured)
}

fn package_source_dirs(package: &cargo_metadata::Package) -> BTreeSet<PathBuf> {
    let mut dirs = BTreeSet::new();
    for target in &package.targets {
        if target.kind.iter().any(|k| {
            matches!(
                k,
                cargo_metadata::TargetKind::Lib | cargo_metadata::TargetKind::Bin
            )
        }) {
            if let Some(parent) = Path::new(&target.src_path).parent() {
                dirs.insert(parent.to_path_buf());
            }
        }
    }
    if dirs.is_empty() {
        if let Some(manifest_dir) = package.manifest_path.parent() {
            dirs.insert(manifest_dir.join("src").into());
        }
    }
    dirs
}

/// Module path a file defines, from its location under the source dir:
/// `lib.rs` is the crate root, `a/mod.rs` and `a.rs` are `a`.
pub(crate) fn module_path(relative: &Path) -> Vec<String> {
    let mut path: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if let Some(last) = path.pop() {
        let stem = last.strip_suffix(".rs").unwrap_or(&last);
        let root = path.is_empty() && (stem == "lib" || stem == "main");
        if stem != "mod" && !root {
            path.push(stem.to_string());
        }
    }
    path
}

fn read_dir(
    dir: &Path,
    seen: &mut BTreeSet<PathBuf>,
) -> std::result::Result<Vec<SourceUnit>, Box<dyn std::error::Error>> {
    let mut units = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = crate::loc_try!(entry);
        if entry.file_type().is_file()
            && entry.path().extension().map(|s| s == "rs").unwrap_or(false)
        {
            let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
            if relative.components().any(|c| c.as_os_str() == "tests")
                || entry.file_name() == "tests.rs"
            {
                continue;
            }
            if !seen.insert(entry.path().to_path_buf()) {
                continue;
            }
            debug!("reading {}", entry.path().display());
            let source = crate::loc_try!(fs::read_to_string(entry.path()));
            let mut unit = SourceUnit::new(entry.path().display().to_string(), source);
            unit.module = module_path(relative);
            units.push(unit);
        }
    }
    Ok(units)
}

/// Read all Rust source files belonging to the given package.
///
/// Every library or binary target's source directory is scanned (or `src/`
/// when no targets declare a path). Test modules kept in `tests.rs` files or
/// under a `tests` directory are skipped.
pub fn read_package(
    package: &cargo_metadata::Package,
) -> std::result::Result<Vec<SourceUnit>, Box<dyn std::error::Error>> {
    info!("reading crate {}", package.name);
    let mut seen = BTreeSet::new();
    let mut units = Vec::new();
    for dir in package_source_dirs(package) {
        units.extend(read_dir(&dir, &mut seen)?);
    }
    Ok(units)
}
