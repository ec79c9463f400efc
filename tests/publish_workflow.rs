//! End-to-end publish runs through the public API with a scripted npm

use async_trait::async_trait;
use npm_publish_plugin::{
    CommandError, CommandRunner, Config, MemoryFileSystem, OsFileSystem, PackagePublisher,
    PublishError, RunPhase, StaticEnvironment,
};
use secrecy::SecretString;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const VERSION_JSON: &str = r#"{"npm":"10.2.4","node":"20.11.0"}"#;

/// Fake npm: fixed replies per subcommand, every call recorded
struct FakeNpm {
    view: Result<&'static str, &'static str>,
    publish: Result<&'static str, &'static str>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeNpm {
    fn new() -> Self {
        Self {
            view: Ok(r#"["0.1.0"]"#),
            publish: Ok(r#"{"name":"my-package","version":"1.0.0"}"#),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    fn call(&self, subcommand: &str) -> Option<Vec<String>> {
        self.calls().into_iter().find(|c| c[0] == subcommand)
    }
}

#[async_trait]
impl CommandRunner for FakeNpm {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>, CommandError> {
        self.calls
            .lock()
            .unwrap()
            .push(args.iter().map(|a| a.to_string()).collect());

        let reply = match args.first().copied() {
            Some("version") => Ok(VERSION_JSON),
            Some("view") => self.view,
            Some("publish") => self.publish,
            _ => Ok(""),
        };

        reply
            .map(|out| out.as_bytes().to_vec())
            .map_err(|out| CommandError::Failed {
                program: program.to_string(),
                status: Some(1),
                output: out.as_bytes().to_vec(),
            })
    }
}

fn user_config() -> Config {
    Config {
        username: Some("u".to_string()),
        password: Some(SecretString::new("p".into())),
        registry: "http://r".to_string(),
        audit_level: "none".to_string(),
        ..Default::default()
    }
}

fn memory_project() -> Arc<MemoryFileSystem> {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.insert(
        "package.json",
        r#"{"name":"my-package","version":"1.0.0"}"#,
    );
    fs
}

#[tokio::test]
async fn basic_auth_config_file() {
    let fs = memory_project();
    let npm = Arc::new(FakeNpm::new());

    let mut publisher = PackagePublisher::with_collaborators(
        user_config(),
        npm.clone(),
        fs.clone(),
        Arc::new(StaticEnvironment::new("/home/ci")),
    );
    let report = publisher.exec().await.unwrap();

    let content = fs.contents("/home/ci/.npmrc").unwrap();
    assert!(content.starts_with(
        "json=true\ncolor=false\nloglevel=silent\nupdate-notifier=false\n_auth=dTpw\nregistry=http://r\n"
    ));
    assert!(!content.contains("_authToken"));
    assert_eq!(report.published[0].name, "my-package");
    assert_eq!(publisher.state_machine().current(), RunPhase::Success);
}

#[tokio::test]
async fn unresolved_home_falls_back_to_root() {
    let fs = memory_project();
    let npm = Arc::new(FakeNpm::new());

    let mut publisher = PackagePublisher::with_collaborators(
        user_config(),
        npm,
        fs.clone(),
        Arc::new(StaticEnvironment::unresolved()),
    );
    publisher.exec().await.unwrap();

    assert!(fs.contents("/root/.npmrc").is_some());
}

#[tokio::test]
async fn publish_arguments_with_every_option() {
    let fs = memory_project();
    fs.insert(
        "packages/a/package.json",
        r#"{"name":"@s/a","version":"1.0.0"}"#,
    );
    let npm = Arc::new(FakeNpm::new());
    let config = Config {
        dry_run: true,
        tag: Some("next".to_string()),
        access: Some("restricted".to_string()),
        workspaces: true,
        workspace: Some("packages/a".to_string()),
        ..user_config()
    };

    // run() skips validation, which would reject both workspace selectors
    let mut publisher = PackagePublisher::with_collaborators(
        config,
        npm.clone(),
        fs,
        Arc::new(StaticEnvironment::new("/home/ci")),
    );
    let report = publisher.run().await.unwrap();

    assert_eq!(
        npm.call("publish").unwrap(),
        vec![
            "publish",
            "--quiet",
            "--dry-run",
            "--tag",
            "next",
            "--access",
            "restricted",
            "--workspaces",
            "--workspace",
            "packages/a",
            "--registry",
            "http://r",
        ]
    );
    assert!(report.dry_run);
}

#[tokio::test]
async fn first_publish_is_not_an_error() {
    let fs = memory_project();
    let npm = Arc::new(FakeNpm {
        view: Err(r#"{"error":{"code":"E404","summary":"Not Found - GET http://r/my-package","detail":""}}"#),
        ..FakeNpm::new()
    });

    let mut publisher = PackagePublisher::with_collaborators(
        user_config(),
        npm.clone(),
        fs,
        Arc::new(StaticEnvironment::new("/home/ci")),
    );

    assert!(publisher.exec().await.is_ok());
    assert!(npm.call("publish").is_some());
}

#[tokio::test]
async fn unreachable_registry_is_fatal() {
    let fs = memory_project();
    let npm = Arc::new(FakeNpm {
        view: Err(r#"{"error":{"code":"ENOTFOUND","summary":"request to http://r failed","detail":""}}"#),
        ..FakeNpm::new()
    });

    let mut publisher = PackagePublisher::with_collaborators(
        user_config(),
        npm.clone(),
        fs,
        Arc::new(StaticEnvironment::new("/home/ci")),
    );
    let error = publisher.exec().await.unwrap_err();

    assert_eq!(error.code(), "REGISTRY_LOOKUP_FAILED");
    assert!(error.to_string().contains("request to http://r failed"));
    assert!(npm.call("publish").is_none());
    assert_eq!(
        publisher.state_machine().failed_phase(),
        Some(RunPhase::VersionConflictCheck)
    );
}

#[tokio::test]
async fn existing_config_files_survive_on_disk() {
    for publish in [Ok("{}"), Err("E403 forbidden")] {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        std::fs::create_dir_all(&home).unwrap();

        let user_npmrc = b"//registry.npmjs.org/:_authToken=\"keep\"\n".to_vec();
        let project_npmrc = b"registry=http://project.local\n".to_vec();
        std::fs::write(home.join(".npmrc"), &user_npmrc).unwrap();
        std::fs::write(dir.path().join(".npmrc"), &project_npmrc).unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name":"my-package","version":"1.0.0"}"#,
        )
        .unwrap();

        let npm = Arc::new(FakeNpm {
            publish,
            ..FakeNpm::new()
        });
        let mut publisher = PackagePublisher::with_collaborators(
            user_config(),
            npm,
            Arc::new(OsFileSystem::new(dir.path())),
            Arc::new(StaticEnvironment::new(&home)),
        );

        let result = publisher.exec().await;
        assert_eq!(result.is_ok(), publish.is_ok());
        if let Err(error) = result {
            assert!(matches!(error, PublishError::PublishFailed { .. }));
        }

        assert_eq!(std::fs::read(home.join(".npmrc")).unwrap(), user_npmrc);
        assert_eq!(std::fs::read(dir.path().join(".npmrc")).unwrap(), project_npmrc);
        assert!(!home.join(".npmrc.orig").exists());
        assert!(!dir.path().join(".tmp-npmrc").exists());
    }
}

#[tokio::test]
async fn configuration_errors_stop_before_npm() {
    let npm = Arc::new(FakeNpm::new());
    let config = Config {
        tag: Some("1.0.0".to_string()),
        ..user_config()
    };

    let mut publisher = PackagePublisher::with_collaborators(
        config,
        npm.clone(),
        memory_project(),
        Arc::new(StaticEnvironment::new("/home/ci")),
    );
    let error = publisher.exec().await.unwrap_err();

    assert!(error.is_configuration_error());
    assert!(npm.calls().is_empty());
}
