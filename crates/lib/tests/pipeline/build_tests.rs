//! Tests for BuildOrchestrator::build.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use gamepack_lib::codegen::{EventsCodeGenerator, RuntimeCodeGenerator};
use gamepack_lib::consts::{CONTAINER_FILE, DESCRIPTOR_ENCRYPTED};
use gamepack_lib::crypto;
use gamepack_lib::diagnostics::{Completion, RecordingDiagnostics};
use gamepack_lib::extensions::{ExtensionRegistry, PlatformExtension, RuntimeCapability};
use gamepack_lib::package::DatFile;
use gamepack_lib::platform::{TargetPlatform, TargetSet};
use gamepack_lib::project::{ExternalEvents, Project, Resource, SourceFile};
use gamepack_lib::queue::{JobKind, PreWorkError};
use gamepack_lib::unit::UnitId;
use gamepack_lib::{BuildError, BuildOptions, BuildStage};
use tokio_util::sync::CancellationToken;

use super::common::*;

fn linux_options(fixture: &Fixture) -> BuildOptions {
  BuildOptions::new(&fixture.out_dir).with_targets(TargetSet::only(TargetPlatform::Linux))
}

fn two_scene_project(fixture: &Fixture) -> Project {
  let mut project = fixture.project("Demo");
  project.scenes = vec![scene("Menu", vec![]), scene("Level", vec![])];
  project
}

mod successful_builds {
  use super::*;

  #[tokio::test]
  async fn two_scenes_for_linux() {
    let fixture = Fixture::new();
    let backend = FakeBackend::new();
    let orchestrator = fixture.orchestrator(backend.clone());
    let mut project = two_scene_project(&fixture);
    project.editor = Some([("zoom".to_string(), serde_json::json!(3))].into_iter().collect());

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &linux_options(&fixture), &mut sink, &CancellationToken::new())
      .await;

    assert!(report.is_success(), "unexpected report: {:?}", report);
    assert_eq!(report.stage, BuildStage::Done);
    assert_eq!(report.jobs_submitted, 3);
    for name in ["ExeLinux", "libGDCpp.so", CONTAINER_FILE, "Code.so", "GameLinux"] {
      assert!(fixture.out_file(name).exists(), "{} missing from output", name);
    }

    assert!(sink.percents_strictly_increase(), "percents: {:?}", sink.percents);
    assert_eq!(sink.percents.first(), Some(&0.0));
    assert_eq!(sink.percents.last(), Some(&100.0));
    assert_eq!(sink.completions, vec![Completion::Succeeded]);
    assert!(sink.errors.is_empty());

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    let link = calls.last().unwrap();
    assert_eq!(link.kind, JobKind::Link);
    assert_eq!(link.extra_object_files.len(), 2);
    assert!(link.output_file.ends_with("Code.so"));
  }

  #[tokio::test]
  async fn mac_launcher_takes_project_name() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator(FakeBackend::new());
    let project = two_scene_project(&fixture);
    let options = BuildOptions::new(&fixture.out_dir).with_targets(TargetSet::only(TargetPlatform::Mac));

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &options, &mut sink, &CancellationToken::new())
      .await;

    assert!(report.is_success(), "unexpected report: {:?}", report);
    for name in ["GameMac", "libGDCpp.dylib", CONTAINER_FILE] {
      assert!(fixture.out_file(name).exists(), "{} missing from output", name);
    }
    assert!(!fixture.out_file("MacExe").exists());
  }

  #[tokio::test]
  async fn container_holds_encrypted_stripped_descriptor() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator(FakeBackend::new());
    let mut project = two_scene_project(&fixture);
    project.scenes[0].events = vec![link("Shared")];
    project.external_events = vec![ExternalEvents {
      name: "Shared".to_string(),
      events: vec![nested(vec![])],
      ..Default::default()
    }];
    project.editor = Some([("grid".to_string(), serde_json::json!(true))].into_iter().collect());

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &linux_options(&fixture), &mut sink, &CancellationToken::new())
      .await;
    assert!(report.is_success(), "unexpected report: {:?}", report);

    let container = DatFile::open(&fixture.out_file(CONTAINER_FILE)).unwrap();
    let ciphertext = container.read(DESCRIPTOR_ENCRYPTED).expect("descriptor packed");
    let plaintext = crypto::strip_padding(crypto::decrypt(ciphertext).unwrap());
    let shipped: Project = serde_json::from_slice(&plaintext).unwrap();

    assert_eq!(shipped.name, "Demo");
    assert_eq!(shipped.scenes.len(), 2);
    assert!(shipped.scenes.iter().all(|s| s.events.is_empty()));
    assert!(shipped.external_events.is_empty());
    assert!(shipped.editor.is_none());
  }

  #[tokio::test]
  async fn caller_project_is_left_untouched() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator(FakeBackend::new());
    let file = fixture.project_file("images/hero.png", b"png");
    let mut project = two_scene_project(&fixture);
    project.scenes[0].profiler_enabled = true;
    project.resources = vec![Resource {
      name: "hero".to_string(),
      kind: "image".to_string(),
      file: file.clone(),
      use_file: true,
    }];
    let before = project.clone();

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &linux_options(&fixture), &mut sink, &CancellationToken::new())
      .await;

    assert!(report.is_success(), "unexpected report: {:?}", report);
    assert_eq!(project, before);
    assert_eq!(project.resources[0].file, "images/hero.png");
  }

  #[tokio::test]
  async fn resources_are_shipped_in_the_container() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator(FakeBackend::new());
    let file = fixture.project_file("images/hero.png", b"png bytes");
    let mut project = two_scene_project(&fixture);
    project.resources = vec![Resource {
      name: "hero".to_string(),
      kind: "image".to_string(),
      file,
      use_file: true,
    }];

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &linux_options(&fixture), &mut sink, &CancellationToken::new())
      .await;
    assert!(report.is_success(), "unexpected report: {:?}", report);

    let container = DatFile::open(&fixture.out_file(CONTAINER_FILE)).unwrap();
    assert_eq!(container.read("hero.png"), Some(&b"png bytes"[..]));
    assert!(!fixture.out_file("hero.png").exists());
    assert!(sink.percents_strictly_increase(), "percents: {:?}", sink.percents);
  }

  #[tokio::test]
  async fn source_file_and_owned_sheet_compile_before_scene() {
    let fixture = Fixture::new();
    let backend = FakeBackend::new();
    let orchestrator = fixture.orchestrator(backend.clone());
    let util = fixture.project_file("src/util.cpp", b"int util() { return 1; }");

    let mut project = fixture.project("Demo");
    project.source_files = vec![SourceFile {
      name: "Util".to_string(),
      file: util,
      language: "C++".to_string(),
    }];
    project.external_events = vec![ExternalEvents {
      name: "Shared".to_string(),
      events: vec![code(&["Util"])],
      ..Default::default()
    }];
    project.scenes = vec![scene("Main", vec![link("Shared")])];

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &linux_options(&fixture), &mut sink, &CancellationToken::new())
      .await;
    assert!(report.is_success(), "unexpected report: {:?}", report);

    assert_eq!(
      backend.outputs(),
      vec![
        "GDSrcUtilRuntimeObjectFile.o",
        "GDExtSharedRuntimeObjectFile.o",
        "GDSceneMainRuntimeObjectFile.o",
        "Code.so",
      ]
    );
    let util_call = &backend.calls()[0];
    assert!(!util_call.events_generated_code);
    assert_eq!(util_call.input_file.as_deref(), Some(fixture.project_dir.join("src/util.cpp").as_path()));

    let scene_source =
      std::fs::read_to_string(fixture.generated_dir().join("GDSceneMainRuntimeEventsSource.cpp")).unwrap();
    assert!(scene_source.contains("GDExtSharedRun(ctx);"), "{}", scene_source);
  }

  #[tokio::test]
  async fn sheet_included_by_two_scenes_is_inlined() {
    let fixture = Fixture::new();
    let backend = FakeBackend::new();
    let orchestrator = fixture.orchestrator(backend.clone());

    let mut project = fixture.project("Demo");
    project.external_events = vec![ExternalEvents {
      name: "Shared".to_string(),
      events: vec![nested(vec![])],
      ..Default::default()
    }];
    project.scenes = vec![scene("A", vec![link("Shared")]), scene("B", vec![link("Shared")])];

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &linux_options(&fixture), &mut sink, &CancellationToken::new())
      .await;
    assert!(report.is_success(), "unexpected report: {:?}", report);

    assert_eq!(
      backend.outputs(),
      vec!["GDSceneARuntimeObjectFile.o", "GDSceneBRuntimeObjectFile.o", "Code.so"]
    );
  }

  #[tokio::test]
  async fn extension_libraries_are_linked() {
    let fixture = Fixture::new();
    let backend = FakeBackend::new();
    std::fs::write(fixture.config.extensions_dir().join("libPhysics.a"), b"archive").unwrap();

    let extensions: ExtensionRegistry = [
      PlatformExtension::new("Physics", "Physics").with_runtime(RuntimeCapability::default()),
      PlatformExtension::new("Missing", "Missing").with_runtime(RuntimeCapability::default()),
      PlatformExtension::new("Editorial", "Editorial"),
    ]
    .into_iter()
    .collect();
    let orchestrator = fixture.orchestrator_with_extensions(backend.clone(), extensions);

    let mut project = two_scene_project(&fixture);
    project.used_extensions = vec!["Physics".to_string(), "Missing".to_string(), "Editorial".to_string()];

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &linux_options(&fixture), &mut sink, &CancellationToken::new())
      .await;

    // Runtime files of Physics and Missing are absent: optional, so recorded only.
    assert!(report.succeeded_with_warnings(), "unexpected report: {:?}", report);
    let link = backend.link_calls().pop().unwrap();
    assert_eq!(link.extra_lib_files, vec!["Physics"]);
    assert_eq!(link.lib_dirs, vec![fixture.config.extensions_dir()]);
  }

  #[tokio::test]
  async fn compressed_windows_build_is_one_executable() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator(FakeBackend::new());
    let project = two_scene_project(&fixture);
    let options = BuildOptions::new(&fixture.out_dir)
      .with_targets(TargetSet::only(TargetPlatform::Windows))
      .with_compression(true);

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &options, &mut sink, &CancellationToken::new())
      .await;
    assert!(report.is_success(), "unexpected report: {:?}", report);

    let executable = fixture.out_file("GameWin.exe");
    assert_eq!(report.artifacts, vec![executable.clone()]);
    let bytes = std::fs::read(&executable).unwrap();
    let (stub, rest) = bytes.split_at(SFX_STUB_BYTES.len());
    assert_eq!(stub, SFX_STUB_BYTES);
    let (config, archive) = rest.split_at(SFX_CONFIG_BYTES.len());
    assert_eq!(config, SFX_CONFIG_BYTES);
    assert!(archive.starts_with(b"PK"));

    assert!(fixture.working_dir().join("Code.dll").exists());
    assert!(fixture.working_dir().join("internalstart.exe").exists());
  }

  #[tokio::test]
  async fn compression_ignored_without_windows() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator(FakeBackend::new());
    let project = two_scene_project(&fixture);
    let options = linux_options(&fixture).with_compression(true);

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &options, &mut sink, &CancellationToken::new())
      .await;

    assert!(report.is_success(), "unexpected report: {:?}", report);
    assert!(fixture.out_file("GameLinux").exists());
    assert!(!fixture.out_file("GameWin.exe").exists());
  }

  #[tokio::test]
  async fn mixed_targets_are_copied_uncompressed() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator(FakeBackend::new());
    let project = two_scene_project(&fixture);
    let mut targets = TargetSet::only(TargetPlatform::Windows);
    targets.insert(TargetPlatform::Linux);
    let options = BuildOptions::new(&fixture.out_dir)
      .with_targets(targets)
      .with_compression(true);

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &options, &mut sink, &CancellationToken::new())
      .await;

    assert!(report.is_success(), "unexpected report: {:?}", report);
    for name in ["GameWin.exe", "GDCpp.dll", "ExeLinux", "libGDCpp.so", CONTAINER_FILE] {
      assert!(fixture.out_file(name).exists(), "{} missing from output", name);
    }
    assert!(!fixture.out_file("internalstart.exe").exists());
    let executable = std::fs::read(fixture.out_file("GameWin.exe")).unwrap();
    assert!(!executable.starts_with(SFX_STUB_BYTES));
    assert!(sink.messages.iter().any(|(text, _)| text == "Compression skipped"));
  }

  #[tokio::test]
  async fn concurrent_builds_are_serialized() {
    let fixture = Fixture::new();
    let backend = FakeBackend::new();
    let orchestrator = fixture.orchestrator(backend.clone());
    let project = two_scene_project(&fixture);
    let first = linux_options(&fixture);
    let second = BuildOptions::new(fixture.temp.path().join("out2")).with_targets(TargetSet::only(TargetPlatform::Linux));

    let mut sink_a = RecordingDiagnostics::new();
    let mut sink_b = RecordingDiagnostics::new();
    let cancel = CancellationToken::new();
    let (a, b) = tokio::join!(
      orchestrator.build(&project, &first, &mut sink_a, &cancel),
      orchestrator.build(&project, &second, &mut sink_b, &cancel),
    );

    assert!(a.is_success(), "unexpected report: {:?}", a);
    assert!(b.is_success(), "unexpected report: {:?}", b);
    assert!(fixture.out_file(CONTAINER_FILE).exists());
    assert!(second.out_dir.join(CONTAINER_FILE).exists());
    assert_eq!(backend.link_calls().len(), 2);
    assert_eq!(orchestrator.queue().submitted_count(), 6);
  }
}

mod failed_builds {
  use super::*;

  #[tokio::test]
  async fn no_target_selected() {
    let fixture = Fixture::new();
    let backend = FakeBackend::new();
    let orchestrator = fixture.orchestrator(backend.clone());
    let options = BuildOptions::new(&fixture.out_dir).with_targets(TargetSet::default());

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&two_scene_project(&fixture), &options, &mut sink, &CancellationToken::new())
      .await;

    assert!(matches!(report.error(), Some(BuildError::NoTargetSelected)));
    assert_eq!(report.stage, BuildStage::ValidateTargets);
    assert_eq!(report.jobs_submitted, 0);
    assert!(backend.calls().is_empty());
    assert_eq!(sink.completion(), Some(Completion::Failed));
    assert_eq!(sink.errors.len(), 1);
  }

  #[tokio::test]
  async fn compile_failure_stops_before_link() {
    let fixture = Fixture::new();
    let backend = FakeBackend::new();
    backend.fail_output("GDSceneLevelRuntimeObjectFile.o");
    let orchestrator = fixture.orchestrator(backend.clone());

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(
        &two_scene_project(&fixture),
        &linux_options(&fixture),
        &mut sink,
        &CancellationToken::new(),
      )
      .await;

    match report.error() {
      Some(BuildError::CompileFailed { unit, log }) => {
        assert_eq!(unit.name(), "Level");
        let log = std::fs::read_to_string(log).unwrap();
        assert!(log.contains("cannot build"), "{}", log);
      }
      other => panic!("expected CompileFailed, got {:?}", other),
    }
    assert_eq!(report.stage, BuildStage::CompileUnits);
    assert!(backend.link_calls().is_empty());
    assert!(!fixture.out_dir.exists());
    assert_eq!(sink.completion(), Some(Completion::Failed));
  }

  struct CrashingGenerator;

  impl EventsCodeGenerator for CrashingGenerator {
    fn generate(&self, _: &Project, unit: &UnitId, _: &BTreeSet<String>) -> Result<String, PreWorkError> {
      panic!("generator crashed on {}", unit);
    }
  }

  #[tokio::test]
  async fn crashing_generator_fails_the_scene() {
    let fixture = Fixture::new();
    let backend = FakeBackend::new();
    let orchestrator = fixture
      .orchestrator(backend.clone())
      .with_code_generator(CrashingGenerator);

    let mut sink = RecordingDiagnostics::new();
    let report = tokio::time::timeout(
      Duration::from_secs(10),
      orchestrator.build(
        &two_scene_project(&fixture),
        &linux_options(&fixture),
        &mut sink,
        &CancellationToken::new(),
      ),
    )
    .await
    .expect("build hung after the generator panicked");

    match report.error() {
      Some(BuildError::CompileFailed { unit, .. }) => assert_eq!(unit.name(), "Menu"),
      other => panic!("expected CompileFailed, got {:?}", other),
    }
    assert_eq!(report.stage, BuildStage::CompileUnits);
    assert!(backend.calls().is_empty());
    assert!(!orchestrator.queue().is_busy());
    assert_eq!(sink.completion(), Some(Completion::Failed));
  }

  /// Occupies the encrypted descriptor's path with a directory while generating code.
  struct DescriptorBlocker {
    descriptor: PathBuf,
  }

  impl EventsCodeGenerator for DescriptorBlocker {
    fn generate(&self, project: &Project, unit: &UnitId, sheets: &BTreeSet<String>) -> Result<String, PreWorkError> {
      std::fs::create_dir_all(&self.descriptor).unwrap();
      RuntimeCodeGenerator.generate(project, unit, sheets)
    }
  }

  #[tokio::test]
  async fn unwritable_descriptor_is_fatal() {
    let fixture = Fixture::new();
    let backend = FakeBackend::new();
    let descriptor = fixture.working_dir().join(DESCRIPTOR_ENCRYPTED);
    let orchestrator = fixture
      .orchestrator(backend.clone())
      .with_code_generator(DescriptorBlocker {
        descriptor: descriptor.clone(),
      });

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(
        &two_scene_project(&fixture),
        &linux_options(&fixture),
        &mut sink,
        &CancellationToken::new(),
      )
      .await;

    match report.error() {
      Some(BuildError::Encryption(crypto::CryptoError::Write { path, .. })) => assert_eq!(path, &descriptor),
      other => panic!("expected an encryption error, got {:?}", other),
    }
    assert_eq!(report.stage, BuildStage::StripAndEncrypt);
    assert!(backend.link_calls().is_empty());
    assert!(!fixture.out_dir.exists());
    assert_eq!(sink.completion(), Some(Completion::Failed));
  }

  #[tokio::test]
  async fn circular_inclusion() {
    let fixture = Fixture::new();
    let backend = FakeBackend::new();
    let orchestrator = fixture.orchestrator(backend.clone());

    let mut project = fixture.project("Demo");
    project.external_events = vec![
      ExternalEvents {
        name: "A".to_string(),
        events: vec![link("B")],
        ..Default::default()
      },
      ExternalEvents {
        name: "B".to_string(),
        events: vec![link("A")],
        ..Default::default()
      },
    ];
    project.scenes = vec![scene("Main", vec![link("A")])];

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &linux_options(&fixture), &mut sink, &CancellationToken::new())
      .await;

    match report.error() {
      Some(BuildError::CircularDependency { cycle, .. }) => {
        assert_eq!(cycle, &vec!["external events 'A'".to_string(), "external events 'B'".to_string()]);
      }
      other => panic!("expected CircularDependency, got {:?}", other),
    }
    assert!(backend.link_calls().is_empty());
  }

  #[tokio::test]
  async fn missing_resource_is_recorded_not_fatal() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator(FakeBackend::new());
    let mut project = two_scene_project(&fixture);
    project.resources = vec![Resource {
      name: "ghost".to_string(),
      kind: "image".to_string(),
      file: "ghost.png".to_string(),
      use_file: true,
    }];

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&project, &linux_options(&fixture), &mut sink, &CancellationToken::new())
      .await;

    assert!(report.succeeded_with_warnings(), "unexpected report: {:?}", report);
    assert!(matches!(report.warnings.as_slice(), [BuildError::ResourceCopyFailed { .. }]));
    assert!(fixture.out_file("Code.so").exists());
    assert_eq!(sink.errors.len(), 1);
    assert_eq!(sink.completion(), Some(Completion::Failed));
  }

  #[tokio::test]
  async fn missing_required_runtime_file() {
    let fixture = Fixture::new();
    std::fs::remove_file(fixture.config.runtime_dir().join("ExeLinux")).unwrap();
    let orchestrator = fixture.orchestrator(FakeBackend::new());

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(
        &two_scene_project(&fixture),
        &linux_options(&fixture),
        &mut sink,
        &CancellationToken::new(),
      )
      .await;

    assert!(matches!(
      report.error(),
      Some(BuildError::PlatformFileCopyFailed { required: true, .. })
    ));
    assert_eq!(report.stage, BuildStage::CopyPlatformFiles);
    assert!(!fixture.out_dir.exists());
  }

  #[tokio::test]
  async fn missing_optional_launcher_is_recorded() {
    let fixture = Fixture::new();
    std::fs::remove_file(fixture.config.runtime_dir().join("PlayLinux")).unwrap();
    let orchestrator = fixture.orchestrator(FakeBackend::new());

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(
        &two_scene_project(&fixture),
        &linux_options(&fixture),
        &mut sink,
        &CancellationToken::new(),
      )
      .await;

    assert!(report.succeeded_with_warnings(), "unexpected report: {:?}", report);
    assert!(fixture.out_file("ExeLinux").exists());
    assert!(!fixture.out_file("GameLinux").exists());
  }

  #[tokio::test]
  async fn cancelled_before_compiling() {
    let fixture = Fixture::new();
    let backend = FakeBackend::new();
    let orchestrator = fixture.orchestrator(backend.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(&two_scene_project(&fixture), &linux_options(&fixture), &mut sink, &cancel)
      .await;

    assert!(matches!(report.error(), Some(BuildError::Cancelled)));
    assert_eq!(report.stage, BuildStage::CompileUnits);
    assert_eq!(report.jobs_submitted, 0);
    assert!(backend.calls().is_empty());
    assert_eq!(sink.completion(), Some(Completion::Failed));
  }

  #[tokio::test]
  async fn slow_compiler_times_out() {
    let mut fixture = Fixture::new();
    fixture.config.job_timeout_secs = Some(1);
    let backend = FakeBackend::with_delay(Duration::from_secs(5));
    let orchestrator = fixture.orchestrator(backend.clone());

    let mut sink = RecordingDiagnostics::new();
    let report = orchestrator
      .build(
        &two_scene_project(&fixture),
        &linux_options(&fixture),
        &mut sink,
        &CancellationToken::new(),
      )
      .await;

    assert!(
      matches!(report.error(), Some(BuildError::Timeout { after }) if *after == Duration::from_secs(1)),
      "unexpected report: {:?}",
      report
    );
    assert_eq!(report.jobs_submitted, 1);
    assert!(backend.calls().is_empty());
    assert!(sink.idle_ticks > 0);
  }
}
