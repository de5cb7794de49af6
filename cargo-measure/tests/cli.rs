use assert_cmd::Command;

fn create_workspace(crates: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, src) in crates {
        std::fs::create_dir_all(dir.path().join(name).join("src")).unwrap();
        std::fs::write(
            dir.path().join(format!("{}/Cargo.toml", name)),
            format!("[package]\nname = \"{}\"\nversion = \"0.1.0\"\n", name),
        )
        .unwrap();
        std::fs::write(dir.path().join(format!("{}/src/lib.rs", name)), src).unwrap();
    }
    let members = crates
        .iter()
        .map(|(n, _)| format!("\"{}\"", n))
        .collect::<Vec<_>>()
        .join(", ");
    std::fs::write(
        dir.path().join("Cargo.toml"),
        format!("[workspace]\nmembers = [{}]\n", members),
    )
    .unwrap();
    dir
}

const COHESIVE: &str = "pub struct Counter { n: u32 }\n\
impl Counter {\n\
    pub fn inc(&mut self) { self.n += 1; }\n\
    pub fn get(&self) -> u32 { self.n }\n\
}\n";

const SCATTERED: &str = "pub struct Grab { a: u8, b: u8 }\n\
impl Grab {\n\
    pub fn a(&self) -> u8 { self.a }\n\
    pub fn b(&self) -> u8 { self.b }\n\
}\n";

fn run_json(dir: &tempfile::TempDir, args: &[&str]) -> serde_json::Value {
    let mut cmd = Command::cargo_bin("cargo-measure").unwrap();
    cmd.args(args).current_dir(dir.path());
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

#[test]
fn prints_version() {
    let mut cmd = Command::cargo_bin("cargo-measure").unwrap();
    cmd.arg("-V");
    let output = cmd.assert().get_output().stdout.clone();
    assert!(!output.is_empty());
}

#[test]
fn prints_help() {
    let mut cmd = Command::cargo_bin("cargo-measure").unwrap();
    cmd.arg("-?");
    let out = cmd.assert().get_output().stdout.clone();
    let s = String::from_utf8_lossy(&out);
    assert!(s.contains("Usage:"));
    assert!(s.contains("lcom4"));
    assert!(s.contains("Verification:"));
}

#[test]
fn outputs_json() {
    let dir = create_workspace(&[("pkg", COHESIVE)]);
    let v = run_json(&dir, &[]);
    assert!(v["meta"]["cargo-measure"]["target"].is_string());
    assert_eq!(v["meta"]["metrics"].as_array().unwrap().len(), 3);
    assert_eq!(v["project"]["scope"], "project");
    let package = &v["project"]["children"][0];
    assert_eq!(package["name"], "pkg");
    assert_eq!(package["children"][0]["name"], "Counter");
    assert_eq!(v["errors"].as_array().unwrap().len(), 0);
}

#[test]
fn outputs_yaml() {
    let dir = create_workspace(&[("pkg", COHESIVE)]);
    let mut cmd = Command::cargo_bin("cargo-measure").unwrap();
    cmd.args(["-o", "yaml"]).current_dir(dir.path());
    let out = cmd.assert().success().get_output().stdout.clone();
    let s = String::from_utf8_lossy(&out);
    assert!(s.contains("project:"));
    assert!(s.contains("scope: package"));
    assert!(s.contains("name: pkg"));
}

#[test]
fn outputs_text() {
    let dir = create_workspace(&[("pkg", COHESIVE)]);
    let mut cmd = Command::cargo_bin("cargo-measure").unwrap();
    cmd.args(["-o", "text"]).current_dir(dir.path());
    let out = cmd.assert().success().get_output().stdout.clone();
    let s = String::from_utf8_lossy(&out);
    assert!(s.contains("  package pkg"));
    assert!(s.contains("    type Counter"));
    assert!(s.contains("      method inc"));
    assert!(s.contains("lcom4=1.00"));
}

#[test]
fn accepts_cargo_subcommand_token() {
    let dir = create_workspace(&[("pkg", COHESIVE)]);
    let v = run_json(&dir, &["measure", "-o", "json"]);
    assert_eq!(v["project"]["children"][0]["name"], "pkg");
}

#[test]
fn parallel_output_matches() {
    let dir = create_workspace(&[("pkg", COHESIVE), ("other", SCATTERED)]);
    let sequential = run_json(&dir, &[]);
    let parallel = run_json(&dir, &["--parallel"]);
    assert_eq!(
        sequential["project"]["metric_values"],
        parallel["project"]["metric_values"]
    );
}

#[test]
fn scattered_type_is_violated() {
    let dir = create_workspace(&[("pkg", SCATTERED)]);
    let v = run_json(&dir, &[]);
    let grab = &v["project"]["children"][0]["children"][0];
    let lcom4 = grab["metric_values"]
        .as_array()
        .unwrap()
        .iter()
        .find(|mv| mv["name"] == "lcom4")
        .unwrap();
    assert_eq!(lcom4["value"], 2.0);
    assert_eq!(lcom4["violated"], true);
}

#[test]
fn same_named_types_in_module_files_are_measured_apart() {
    let dir = create_workspace(&[("pkg", "mod a;\nmod b;\n")]);
    let src = dir.path().join("pkg/src");
    std::fs::write(
        src.join("a.rs"),
        "pub struct Config { x: u8 }\nimpl Config { pub fn x(&self) -> u8 { self.x } }\n",
    )
    .unwrap();
    std::fs::create_dir_all(src.join("b")).unwrap();
    std::fs::write(
        src.join("b/mod.rs"),
        "pub struct Config { y: u8 }\nimpl Config { pub fn y(&self) -> u8 { self.y } }\n",
    )
    .unwrap();
    let v = run_json(&dir, &[]);
    let mut names: Vec<&str> = v["project"]["children"][0]["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["a::Config", "b::Config"]);

    let mut cmd = Command::cargo_bin("cargo-measure").unwrap();
    cmd.arg("--fail-on-violation").current_dir(dir.path());
    cmd.assert().success();
}

#[test]
fn fails_on_violation() {
    let dir = create_workspace(&[("pkg", SCATTERED)]);
    let mut cmd = Command::cargo_bin("cargo-measure").unwrap();
    cmd.arg("--fail-on-violation").current_dir(dir.path());
    cmd.assert().failure();
}

#[test]
fn passes_without_violation() {
    let dir = create_workspace(&[("pkg", COHESIVE)]);
    let mut cmd = Command::cargo_bin("cargo-measure").unwrap();
    cmd.arg("--fail-on-violation").current_dir(dir.path());
    cmd.assert().success();
}

#[test]
fn reports_unparsable_files() {
    let dir = create_workspace(&[("pkg", COHESIVE)]);
    std::fs::write(dir.path().join("pkg/src/broken.rs"), "struct {\n").unwrap();
    let v = run_json(&dir, &[]);
    let errors = v["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().contains("broken.rs"));
    assert_eq!(v["project"]["children"][0]["children"][0]["name"], "Counter");
}

#[test]
fn custom_config() {
    let dir = create_workspace(&[("pkg", SCATTERED)]);
    let config = r#"
[metrics]
  [metrics.lcom4]
  max = 2.0

  [metrics.response_for_class]
  enabled = false
"#;
    std::fs::write(dir.path().join("measure.toml"), config).unwrap();

    let v = run_json(&dir, &["-c", "measure.toml"]);
    let metrics = v["meta"]["metrics"].as_array().unwrap();
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[1]["name"], "lcom4");
    assert_eq!(metrics[1]["verification"]["kind"], "max");
    assert_eq!(metrics[1]["verification"]["max"], 2.0);

    let mut cmd = Command::cargo_bin("cargo-measure").unwrap();
    cmd.args(["-c", "measure.toml", "--fail-on-violation"])
        .current_dir(dir.path());
    cmd.assert().success();
}

#[test]
fn dotfile_used_as_default_config() {
    let dir = create_workspace(&[("pkg", SCATTERED)]);
    std::fs::write(
        dir.path().join(".measure.toml"),
        "[metrics.lcom4]\nenabled = false\n",
    )
    .unwrap();
    let v = run_json(&dir, &[]);
    assert_eq!(v["meta"]["metrics"].as_array().unwrap().len(), 2);
}

#[test]
fn invalid_config_fails() {
    let dir = create_workspace(&[("pkg", COHESIVE)]);
    std::fs::write(
        dir.path().join(".measure.toml"),
        "[metrics.lcom4]\nverification = \"range\"\n",
    )
    .unwrap();
    let mut cmd = Command::cargo_bin("cargo-measure").unwrap();
    cmd.current_dir(dir.path());
    cmd.assert().failure();
}

#[test]
fn init_creates_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("cargo-measure").unwrap();
    cmd.arg("init").current_dir(dir.path());
    cmd.assert().success();
    let path = dir.path().join(".measure.toml");
    assert!(path.exists());
    let contents = std::fs::read_to_string(path).unwrap();
    assert!(contents.contains("[metrics.cyclomatic_complexity]"));
    assert!(contents.contains("[metrics.lcom4]"));
}

#[test]
fn init_template_is_loadable() {
    let dir = create_workspace(&[("pkg", COHESIVE)]);
    let mut cmd = Command::cargo_bin("cargo-measure").unwrap();
    cmd.arg("init").current_dir(dir.path());
    cmd.assert().success();
    let v = run_json(&dir, &[]);
    assert_eq!(v["meta"]["metrics"].as_array().unwrap().len(), 3);
}
