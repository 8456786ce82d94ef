#![cfg(unix)]

mod common;

use std::fs;

use common::{git, Fixture, RecordingRunner};
use packwright_core::{
    ErrorKind, PackagingPipeline, Stage, TerminalMode, UnresolvedDependencyPolicy,
};

#[test]
fn test_commit_mode_stamps_builds_packs_and_tags() {
    let fixture = Fixture::new();
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();

    let summary = pipeline.run(&fixture.hub, "2.3.0").unwrap();

    let order: Vec<&str> = summary.units.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(order, vec!["Core", "Extensions"]);
    assert_eq!(summary.packaged, vec!["Core", "Extensions"]);
    assert_eq!(
        summary.published,
        vec!["Core.2.3.0.nupkg", "Extensions.2.3.0.nupkg"]
    );

    for name in ["Core", "Extensions"] {
        let info = fs::read_to_string(fixture.assembly_info(name)).unwrap();
        assert!(info.contains("[assembly: AssemblyVersion(\"2.3.0\")]"));
        assert!(info.contains(&format!("[assembly: AssemblyTitle(\"{}\")]", name)));

        assert_eq!(fixture.commit_count(name), 2);
        let repo = fixture.repo(name);
        assert_eq!(git(&repo, &["log", "-1", "--format=%s"]).trim(), "version 2.3.0");
        assert_eq!(git(&repo, &["cat-file", "-t", "v2.3.0"]).trim(), "tag");
        assert!(git(&repo, &["status", "--porcelain"]).trim().is_empty());
        assert!(git(&fixture.remote(name), &["tag", "--list"]).contains("v2.3.0"));
    }

    let calls = fixture.tool_calls();
    let builds: Vec<&String> = calls.iter().filter(|c| c.contains("/t:Build")).collect();
    assert_eq!(
        builds,
        vec![
            "build Core Core.sln /t:Build /p:Configuration=Release",
            "build Extensions Extensions.sln /t:Build /p:Configuration=Release",
        ]
    );
    assert!(calls.contains(
        &"package Core pack Core.csproj -IncludeReferencedProjects -Prop Configuration=Release"
            .to_string()
    ));
    assert!(calls.contains(
        &"package Extensions push Extensions.2.3.0.nupkg -Source https://packages.example.com/v2"
            .to_string()
    ));
}

#[test]
fn test_stages_run_in_order_across_all_units() {
    let fixture = Fixture::new();
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();
    pipeline.run(&fixture.hub, "2.3.0").unwrap();

    let calls = fixture.tool_calls();
    let position = |needle: &str| calls.iter().position(|c| c.contains(needle)).unwrap();

    assert!(position("Extensions.sln /t:Clean") < position("restore Core.sln"));
    assert!(position("restore Extensions.sln") < position("Core.sln /t:Build"));
    assert!(position("pack Extensions.csproj") < position("push Core.2.3.0.nupkg"));
}

#[test]
fn test_dirty_repository_blocks_every_mutation() {
    let fixture = Fixture::new();
    fs::write(fixture.repo("Extensions").join("notes.txt"), "wip").unwrap();
    let before = fs::read(fixture.assembly_info("Core")).unwrap();

    let runner = RecordingRunner::new();
    let pipeline = PackagingPipeline::new(fixture.config.clone())
        .unwrap()
        .with_runner(runner.clone());

    let err = pipeline.run(&fixture.hub, "2.3.0").unwrap_err();

    assert_eq!(err.stage, Stage::Precondition);
    assert_eq!(err.kind(), ErrorKind::Expectation);
    assert!(err.to_string().contains("is not clean and up to date"));
    assert_eq!(fs::read(fixture.assembly_info("Core")).unwrap(), before);
    assert!(fixture.tool_calls().is_empty());
    assert!(runner.programs().iter().all(|p| p == "git"));
    assert!(runner
        .calls()
        .iter()
        .all(|c| c.args[0] == "rev-parse" || c.args[0] == "status"));
}

#[test]
fn test_wrong_branch_is_rejected() {
    let mut fixture = Fixture::new();
    fixture.config.pipeline.branch = Some("release".to_string());
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();

    let err = pipeline.run(&fixture.hub, "2.3.0").unwrap_err();

    assert_eq!(err.stage, Stage::Precondition);
    assert!(err.to_string().contains("is checked out to main, expected release"));
    assert!(fixture.tool_calls().is_empty());
}

#[test]
fn test_missing_repository_metadata_is_rejected() {
    let fixture = Fixture::new();
    fs::remove_dir_all(fixture.repo("Core").join(".git")).unwrap();
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();

    let err = pipeline.run(&fixture.hub, "2.3.0").unwrap_err();

    assert_eq!(err.stage, Stage::Precondition);
    assert!(err.to_string().contains("is not a git repo"));
}

#[test]
fn test_build_failure_reports_exact_command() {
    let fixture = Fixture::new();
    fixture.fail_on("Extensions.sln /t:Build /p:Configuration=Release");
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();

    let err = pipeline.run(&fixture.hub, "2.3.0").unwrap_err();

    assert_eq!(err.stage, Stage::Package);
    assert_eq!(err.kind(), ErrorKind::CommandExited);
    let outcome = err.source.outcome().unwrap();
    assert_eq!(outcome.command, fixture.config.tools.build);
    assert_eq!(
        outcome.arguments,
        vec!["Extensions.sln", "/t:Build", "/p:Configuration=Release"]
    );
    assert_eq!(outcome.exit_code, Some(1));
    assert!(outcome.stderr.contains("simulated build failure"));

    // Commit mode keeps partial progress: Core was fully packaged and staged.
    let core = fs::read_to_string(fixture.assembly_info("Core")).unwrap();
    assert!(core.contains("AssemblyVersion(\"2.3.0\")"));
    let staged = git(&fixture.repo("Core"), &["diff", "--cached", "--name-only"]);
    assert!(staged.contains("AssemblyInfo.cs"));
    assert_eq!(fixture.commit_count("Core"), 1);
    assert!(!fixture.tool_calls().iter().any(|c| c.contains("push")));
}

#[test]
fn test_rollback_on_failure_restores_sources() {
    let mut fixture = Fixture::new();
    fixture.config.pipeline.rollback_on_failure = true;
    fixture.fail_on("Extensions.sln /t:Build /p:Configuration=Release");
    let before = fs::read(fixture.assembly_info("Core")).unwrap();
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();

    let err = pipeline.run(&fixture.hub, "2.3.0").unwrap_err();

    assert_eq!(err.stage, Stage::Package);
    assert_eq!(fs::read(fixture.assembly_info("Core")).unwrap(), before);
    for name in ["Core", "Extensions"] {
        assert!(git(&fixture.repo(name), &["status", "--porcelain"]).trim().is_empty());
    }
}

#[test]
fn test_revert_mode_restores_original_bytes() {
    let mut fixture = Fixture::new();
    fixture.config.pipeline.terminal_mode = TerminalMode::Revert;
    let originals: Vec<Vec<u8>> = ["Core", "Extensions"]
        .iter()
        .map(|name| fs::read(fixture.assembly_info(name)).unwrap())
        .collect();
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();

    let summary = pipeline.run(&fixture.hub, "2.3.0").unwrap();

    assert_eq!(summary.terminal_mode, TerminalMode::Revert);
    for (name, original) in ["Core", "Extensions"].iter().zip(originals) {
        assert_eq!(fs::read(fixture.assembly_info(name)).unwrap(), original);
        assert_eq!(fixture.commit_count(name), 1);
        assert!(git(&fixture.repo(name), &["tag", "--list"]).trim().is_empty());
    }
    assert!(fixture
        .tool_calls()
        .iter()
        .any(|c| c.contains("Extensions.sln /t:Build")));
}

#[test]
fn test_revert_mode_restores_stamps_after_package_failure() {
    let mut fixture = Fixture::new();
    fixture.config.pipeline.terminal_mode = TerminalMode::Revert;
    fixture.fail_on("Extensions.sln /t:Build /p:Configuration=Release");
    let core_before = fs::read(fixture.assembly_info("Core")).unwrap();
    let extensions_before = fs::read(fixture.assembly_info("Extensions")).unwrap();
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();

    let err = pipeline.run(&fixture.hub, "2.3.0").unwrap_err();

    assert_eq!(err.stage, Stage::Package);
    assert!(!fixture.config.pipeline.rollback_on_failure);
    assert_eq!(fs::read(fixture.assembly_info("Core")).unwrap(), core_before);
    assert_eq!(
        fs::read(fixture.assembly_info("Extensions")).unwrap(),
        extensions_before
    );
    let status = git(&fixture.repo("Core"), &["status", "--porcelain"]);
    assert!(status.trim().is_empty());
    assert_eq!(fixture.commit_count("Core"), 1);
}

#[test]
fn test_skip_policy_leaves_dependent_units_alone() {
    let mut fixture = Fixture::new();
    fixture.config.pipeline.unresolved_dependencies = UnresolvedDependencyPolicy::Skip;
    let before = fs::read(fixture.assembly_info("Extensions")).unwrap();
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();

    let summary = pipeline.run(&fixture.hub, "2.3.0").unwrap();

    assert_eq!(summary.packaged, vec!["Core"]);
    assert_eq!(summary.skipped, vec!["Extensions"]);
    assert_eq!(summary.published, vec!["Core.2.3.0.nupkg"]);
    assert_eq!(fs::read(fixture.assembly_info("Extensions")).unwrap(), before);
    assert_eq!(fixture.commit_count("Core"), 2);
    assert_eq!(fixture.commit_count("Extensions"), 1);
}

#[test]
fn test_fail_policy_aborts_on_local_references() {
    let mut fixture = Fixture::new();
    fixture.config.pipeline.unresolved_dependencies = UnresolvedDependencyPolicy::Fail;
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();

    let err = pipeline.run(&fixture.hub, "2.3.0").unwrap_err();

    assert_eq!(err.stage, Stage::Package);
    assert_eq!(err.kind(), ErrorKind::Expectation);
    assert!(err.to_string().contains("Extensions references local projects (Core)"));
}

#[test]
fn test_publish_and_clean_can_be_disabled() {
    let mut fixture = Fixture::new();
    fixture.config.pipeline.publish = false;
    fixture.config.pipeline.clean = false;
    fixture.config.tools.include_referenced_projects = false;
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();

    let summary = pipeline.run(&fixture.hub, "2.3.0").unwrap();

    assert!(summary.published.is_empty());
    let calls = fixture.tool_calls();
    assert!(!calls.iter().any(|c| c.contains("/t:Clean") || c.contains(" push ")));
    assert!(calls.contains(
        &"package Core pack Core.csproj -Prop Configuration=Release".to_string()
    ));
}

#[test]
fn test_missing_sibling_solution_fails_resolution() {
    let fixture = Fixture::new();
    fs::remove_file(fixture.repo("Core").join("Core.sln")).unwrap();
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();

    let err = pipeline.run(&fixture.hub, "2.3.0").unwrap_err();

    assert_eq!(err.stage, Stage::Resolve);
    assert!(err.to_string().contains("Solution for project Core does not exist"));
    assert!(fixture.tool_calls().is_empty());
}

#[test]
fn test_unit_missing_from_its_own_solution() {
    let fixture = Fixture::new();
    fs::write(
        fixture.repo("Core").join("Core.sln"),
        "[[project]]\nname = \"Other\"\npath = \"Other/Other.csproj\"\n",
    )
    .unwrap();
    git(&fixture.repo("Core"), &["commit", "--quiet", "-am", "break solution"]);
    git(&fixture.repo("Core"), &["push", "--quiet"]);
    let pipeline = PackagingPipeline::new(fixture.config.clone()).unwrap();

    let err = pipeline.run(&fixture.hub, "2.3.0").unwrap_err();

    assert_eq!(err.stage, Stage::Package);
    assert!(err.to_string().contains("does not contain a project named Core"));
}

#[test]
fn test_plan_does_not_touch_repositories() {
    let fixture = Fixture::new();
    let runner = RecordingRunner::new();
    let pipeline = PackagingPipeline::new(fixture.config.clone())
        .unwrap()
        .with_runner(runner.clone());

    let units = pipeline.plan(&fixture.hub).unwrap();

    assert_eq!(units.len(), 2);
    assert_eq!(units[1].dependencies, vec!["Core"]);
    assert!(units[1].has_local_references);
    assert!(runner.calls().is_empty());
}
