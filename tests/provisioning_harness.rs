//! End-to-end provisioning scenarios: real scaffold and git against
//! temporary directories, remote APIs mocked with wiremock. Pushes land in
//! a local bare repository so the git half runs for real.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bot_foundry::{
    BotSpec, Credentials, Endpoints, GitHubCredentials, Orchestrator, ProvisionError,
    RenderCredentials, Scaffolder, StageOutcome, TemplateSet,
};

fn jaguar() -> BotSpec {
    BotSpec::new(
        "jaguar".to_string(),
        "1".to_string(),
        "BTC/USDT".to_string(),
        "combo",
        "1m".to_string(),
    )
    .unwrap()
}

fn orchestrator(output_dir: &Path, credentials: Credentials, endpoints: Endpoints) -> Orchestrator {
    Orchestrator::new(
        Scaffolder::new(TemplateSet::builtin(), output_dir),
        credentials,
        endpoints,
        true,
    )
}

fn github_credentials() -> GitHubCredentials {
    GitHubCredentials {
        username: "acct".to_string(),
        token: "gh-token".to_string(),
    }
}

fn render_credentials() -> RenderCredentials {
    RenderCredentials {
        api_key: "rk-token".to_string(),
        owner_id: "own-1".to_string(),
    }
}

/// Mount a create-repository mock whose clone URL points at `push_target`.
async fn mount_github_mock(server: &MockServer, push_target: &str) {
    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .and(header("authorization", "Bearer gh-token"))
        .and(body_partial_json(json!({
            "name": "jaguar",
            "private": true,
            "auto_init": false,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "html_url": "https://github.com/acct/jaguar",
            "clone_url": push_target,
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn init_bare_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    let status = Command::new("git")
        .args(["init", "--bare"])
        .arg(dir.path())
        .status()
        .unwrap();
    assert!(status.success());
    dir
}

fn read_tree(result: &bot_foundry::ScaffoldResult) -> BTreeMap<String, Vec<u8>> {
    result
        .files_written
        .iter()
        .map(|rel| {
            let bytes = std::fs::read(result.root.join(rel)).unwrap();
            (rel.to_string_lossy().to_string(), bytes)
        })
        .collect()
}

#[tokio::test]
async fn no_credentials_scaffolds_and_skips_remote_stages() {
    let out = TempDir::new().unwrap();
    let report = orchestrator(out.path(), Credentials::none(), Endpoints::default())
        .run(&jaguar())
        .await;

    assert!(report.succeeded());

    let scaffold = match &report.scaffold {
        StageOutcome::Succeeded(scaffold) => scaffold,
        other => panic!("scaffold outcome: {:?}", other),
    };
    assert_eq!(scaffold.root, out.path().join("jaguar"));
    assert_eq!(scaffold.files_written.len(), 10);

    let env = std::fs::read_to_string(scaffold.root.join(".env")).unwrap();
    assert!(env.lines().any(|line| line == "PAIR=BTC/USDT"));
    assert!(env.lines().any(|line| line == "BOT_ID=1"));

    let main_rs = std::fs::read_to_string(scaffold.root.join("src/main.rs")).unwrap();
    assert!(main_rs.contains("BTC/USDT"));
    assert!(main_rs.contains("combo"));
    assert!(main_rs.contains("1m"));

    assert!(
        matches!(&report.repository, StageOutcome::Skipped { reason } if reason == "missing VCS credentials")
    );
    assert!(
        matches!(&report.service, StageOutcome::Skipped { reason } if reason == "no repository to publish")
    );
}

#[tokio::test]
async fn scaffold_twice_is_byte_identical() {
    let out = TempDir::new().unwrap();
    let scaffolder = Scaffolder::new(TemplateSet::builtin(), out.path());
    let spec = jaguar();

    let first = scaffolder.scaffold(&spec).await.unwrap();
    let first_tree = read_tree(&first);

    let second = scaffolder.scaffold(&spec).await.unwrap();
    let second_tree = read_tree(&second);

    assert_eq!(first.files_written, second.files_written);
    assert_eq!(first_tree, second_tree);
}

#[tokio::test]
async fn full_run_pushes_and_registers_service() {
    let out = TempDir::new().unwrap();
    let bare = init_bare_repo();

    let github = MockServer::start().await;
    mount_github_mock(&github, &bare.path().to_string_lossy()).await;

    let render = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services"))
        .and(header("authorization", "Bearer rk-token"))
        .and(body_partial_json(json!({
            "ownerId": "own-1",
            "name": "jaguar",
            "type": "web_service",
            "repo": "https://github.com/acct/jaguar",
            "branch": "main",
            "autoDeploy": true,
            "serviceDetails": {
                "env": "docker",
                "healthCheckPath": "/status",
            },
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "srv-42",
            "status": "created",
        })))
        .expect(1)
        .mount(&render)
        .await;

    let credentials = Credentials {
        github: Some(github_credentials()),
        render: Some(render_credentials()),
    };
    let endpoints = Endpoints {
        github_api: github.uri(),
        render_api: render.uri(),
    };

    let report = orchestrator(out.path(), credentials, endpoints)
        .run(&jaguar())
        .await;

    assert!(report.succeeded());

    let repository = match &report.repository {
        StageOutcome::Succeeded(handle) => handle,
        other => panic!("repository outcome: {:?}", other),
    };
    assert_eq!(repository.web_url, "https://github.com/acct/jaguar");

    let service = match &report.service {
        StageOutcome::Succeeded(handle) => handle,
        other => panic!("service outcome: {:?}", other),
    };
    assert_eq!(service.id, "srv-42");
    assert_eq!(service.status, "created");

    // The push actually landed in the bare repository.
    let verified = Command::new("git")
        .args(["rev-parse", "--verify", "main"])
        .current_dir(bare.path())
        .status()
        .unwrap();
    assert!(verified.success());
}

#[tokio::test]
async fn push_failure_is_stage_local() {
    let out = TempDir::new().unwrap();
    let missing = out.path().join("not-a-repo");

    let github = MockServer::start().await;
    mount_github_mock(&github, &missing.to_string_lossy()).await;

    let credentials = Credentials {
        github: Some(github_credentials()),
        render: Some(render_credentials()),
    };
    let endpoints = Endpoints {
        github_api: github.uri(),
        render_api: MockServer::start().await.uri(),
    };

    let report = orchestrator(out.path(), credentials, endpoints)
        .run(&jaguar())
        .await;

    // Repository creation succeeded but the push failed: the stage is a
    // failure, the service is skipped, and the run still counts as success.
    assert!(report.succeeded());
    assert!(matches!(
        &report.repository,
        StageOutcome::Failed(ProvisionError::VcsCommand { .. })
    ));
    assert!(
        matches!(&report.service, StageOutcome::Skipped { reason } if reason == "no repository to publish")
    );

    // The scaffolded tree is left on disk untouched.
    let scaffold = report.scaffold.value().unwrap();
    for rel in &scaffold.files_written {
        assert!(scaffold.root.join(rel).is_file(), "missing {:?}", rel);
    }
}

#[tokio::test]
async fn remote_rejection_is_stage_local() {
    let out = TempDir::new().unwrap();

    let github = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .respond_with(
            ResponseTemplate::new(422).set_body_string("name already exists on this account"),
        )
        .expect(1)
        .mount(&github)
        .await;

    let credentials = Credentials {
        github: Some(github_credentials()),
        render: None,
    };
    let endpoints = Endpoints {
        github_api: github.uri(),
        render_api: MockServer::start().await.uri(),
    };

    let report = orchestrator(out.path(), credentials, endpoints)
        .run(&jaguar())
        .await;

    assert!(report.succeeded());
    match &report.repository {
        StageOutcome::Failed(ProvisionError::RemoteRejected { status, body, .. }) => {
            assert_eq!(*status, 422);
            assert!(body.contains("already exists"));
        }
        other => panic!("repository outcome: {:?}", other),
    }
    assert!(
        matches!(&report.service, StageOutcome::Skipped { reason } if reason == "no repository to publish")
    );
}

#[tokio::test]
async fn missing_render_credentials_skip_service_after_push() {
    let out = TempDir::new().unwrap();
    let bare = init_bare_repo();

    let github = MockServer::start().await;
    mount_github_mock(&github, &bare.path().to_string_lossy()).await;

    let credentials = Credentials {
        github: Some(github_credentials()),
        render: None,
    };
    let endpoints = Endpoints {
        github_api: github.uri(),
        render_api: MockServer::start().await.uri(),
    };

    let report = orchestrator(out.path(), credentials, endpoints)
        .run(&jaguar())
        .await;

    assert!(matches!(&report.repository, StageOutcome::Succeeded(_)));
    assert!(
        matches!(&report.service, StageOutcome::Skipped { reason } if reason == "missing deployment credentials")
    );
}
