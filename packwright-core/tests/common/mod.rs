#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use packwright_core::{
    CommandOutcome, CommandRunner, Invocation, PackwrightConfig, ProcessRunner, Result,
};
use tempfile::TempDir;

pub const ASSEMBLY_INFO: &str = "using System.Reflection;\n\n[assembly: AssemblyTitle(\"{name}\")]\n[assembly: AssemblyVersion(\"1.0.0\")]\n";

/// Runs git in `dir`, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git should be installed");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Creates a committed repository on `main`, optionally with a bare origin.
pub fn init_repo(dir: &Path, remote: Option<&Path>) {
    git(dir, &["init", "--quiet"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(dir, &["config", "user.email", "release@example.com"]);
    git(dir, &["config", "user.name", "Release Bot"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    git(dir, &["config", "tag.gpgsign", "false"]);
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "--quiet", "-m", "initial"]);

    if let Some(remote) = remote {
        fs::create_dir_all(remote).unwrap();
        git(remote, &["init", "--quiet", "--bare"]);
        let remote = remote.to_string_lossy().to_string();
        git(dir, &["remote", "add", "origin", &remote]);
        git(dir, &["push", "--quiet", "-u", "origin", "main"]);
    }
}

pub fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{}", body)).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

/// Two single-project repositories, Core and Extensions (depends on Core),
/// plus a hub solution listing both and fake build/package tools.
pub struct Fixture {
    pub dir: TempDir,
    pub hub: PathBuf,
    pub log: PathBuf,
    pub fail_file: PathBuf,
    pub config: PackwrightConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();

        for name in ["Core", "Extensions"] {
            Self::create_unit_repo(&root, name);
        }

        let hub_dir = root.join("Hub");
        fs::create_dir_all(&hub_dir).unwrap();
        let hub = hub_dir.join("Hub.sln");
        fs::write(
            &hub,
            r#"
[[project]]
name = "Extensions"
path = "../Extensions/Extensions/Extensions.csproj"
dependencies = ["Core"]

[[project]]
name = "Core"
path = "../Core/Core/Core.csproj"
"#,
        )
        .unwrap();

        let tools_dir = root.join("tools");
        fs::create_dir_all(&tools_dir).unwrap();
        let log = root.join("commands.log");
        let fail_file = root.join("fail-on");

        let body = |tool: &str| {
            format!(
                "echo \"{tool} $(basename \"$PWD\") $*\" >> \"{log}\"\n\
                 if [ -f \"{fail}\" ] && [ \"$*\" = \"$(cat \"{fail}\")\" ]; then\n\
                 echo \"error: simulated {tool} failure\" >&2\n\
                 exit 1\n\
                 fi\n\
                 echo \"{tool} ok\"\n",
                tool = tool,
                log = log.display(),
                fail = fail_file.display(),
            )
        };
        write_script(&tools_dir.join("fake-build"), &body("build"));
        write_script(&tools_dir.join("fake-package"), &body("package"));

        let mut config = PackwrightConfig::default();
        config.tools.build = tools_dir.join("fake-build").to_string_lossy().to_string();
        config.tools.package = tools_dir.join("fake-package").to_string_lossy().to_string();
        config.tools.registry_url = "https://packages.example.com/v2".to_string();
        config.pipeline.branch = Some("main".to_string());

        Self {
            dir,
            hub,
            log,
            fail_file,
            config,
        }
    }

    fn create_unit_repo(root: &Path, name: &str) {
        let repo = root.join(name);
        let project_dir = repo.join(name);
        fs::create_dir_all(project_dir.join("Properties")).unwrap();
        fs::write(
            repo.join(format!("{}.sln", name)),
            format!("[[project]]\nname = \"{0}\"\npath = \"{0}/{0}.csproj\"\n", name),
        )
        .unwrap();
        fs::write(project_dir.join(format!("{}.csproj", name)), "<Project />\n").unwrap();
        fs::write(
            project_dir.join("Properties").join("AssemblyInfo.cs"),
            ASSEMBLY_INFO.replace("{name}", name),
        )
        .unwrap();
        init_repo(&repo, Some(&root.join("remotes").join(format!("{}.git", name))));
    }

    pub fn root(&self) -> PathBuf {
        fs::canonicalize(self.dir.path()).unwrap()
    }

    pub fn repo(&self, name: &str) -> PathBuf {
        self.root().join(name)
    }

    pub fn remote(&self, name: &str) -> PathBuf {
        self.root().join("remotes").join(format!("{}.git", name))
    }

    pub fn assembly_info(&self, name: &str) -> PathBuf {
        self.repo(name).join(name).join("Properties").join("AssemblyInfo.cs")
    }

    /// Makes the fake tools fail when invoked with exactly `args`.
    pub fn fail_on(&self, args: &str) {
        fs::write(&self.fail_file, args).unwrap();
    }

    /// Lines written by the fake tools, in call order.
    pub fn tool_calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn commit_count(&self, name: &str) -> usize {
        git(&self.repo(name), &["rev-list", "--count", "HEAD"])
            .trim()
            .parse()
            .unwrap()
    }
}

/// Wraps a real runner and remembers every invocation.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    inner: ProcessRunner,
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutcome> {
        self.calls.lock().unwrap().push(invocation.clone());
        self.inner.run(invocation)
    }
}
