//! Integration tests for quarry-db.
//!
//! Run with: `cargo test -p quarry-db --features integration` (needs docker).

#![cfg(feature = "integration")]

use quarry_core::build::{Axis, Build, BuildEvent, Job};
use quarry_core::ids::{RepoId, SecretId, UserId};
use quarry_core::ports::Store;
use quarry_core::repo::{Repo, RepoKind, User};
use quarry_core::secrets::{Secret, SecretScope};
use quarry_db::{Database, PgStore};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

struct Fixture {
    _container: ContainerAsync<Postgres>,
    store: PgStore,
    repo: Repo,
}

async fn setup() -> Fixture {
    let container = Postgres::default()
        .with_tag("16-alpine")
        .start()
        .await
        .expect("start postgres");
    let host = container.get_host().await.expect("host");
    let port = container.get_host_port_ipv4(5432).await.expect("port");
    let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

    let db = Database::connect(&url, 5).await.expect("connect");
    db.migrate().await.expect("migrate");
    let store = db.store();

    let user = User {
        id: UserId::new(),
        login: "octocat".to_string(),
        email: None,
        avatar: None,
        token: "t0k3n".to_string(),
    };
    let repo = Repo {
        id: RepoId::new(),
        user_id: user.id,
        owner: "octo".to_string(),
        name: "hello".to_string(),
        full_name: "octo/hello".to_string(),
        default_branch: "main".to_string(),
        kind: RepoKind::Git,
        clone_url: None,
        link: None,
        is_private: false,
        is_trusted: false,
        hash: "h4sh".to_string(),
    };
    store.repos.create_user(&user).await.expect("user");
    store.repos.create_repo(&repo).await.expect("repo");

    Fixture {
        _container: container,
        store,
        repo,
    }
}

fn pending_build(repo: &Repo, branch: &str) -> Build {
    let mut build = Build::new(BuildEvent::Push, branch, "9fceb02");
    build.repo_id = repo.id;
    build
}

#[tokio::test]
async fn test_lookup_repo_and_owner() {
    let f = setup().await;

    let repo = f.store.find_repo("octo", "hello").await.unwrap().unwrap();
    assert_eq!(repo.hash, "h4sh");
    assert!(f.store.find_repo("octo", "missing").await.unwrap().is_none());

    let user = f.store.find_user(repo.user_id).await.unwrap().unwrap();
    assert_eq!(user.login, "octocat");
}

#[tokio::test]
async fn test_build_numbers_increment() {
    let f = setup().await;

    let first = pending_build(&f.repo, "main");
    let jobs = vec![
        Job::pending(first.id, 1, [("RUST", "stable")].into_iter().collect()),
        Job::pending(first.id, 2, [("RUST", "beta")].into_iter().collect()),
    ];
    let stored = f.store.create_build_with_jobs(&first, &jobs).await.unwrap();
    assert_eq!(stored.number, 1);

    let persisted = f.store.builds.jobs(stored.id).await.unwrap();
    assert_eq!(persisted.len(), 2);
    assert_eq!(persisted[1].environment.get("RUST"), Some("beta"));

    let second = pending_build(&f.repo, "main");
    let jobs = vec![Job::pending(second.id, 1, Axis::new())];
    let stored_second = f.store.create_build_with_jobs(&second, &jobs).await.unwrap();
    assert_eq!(stored_second.number, 2);

    let last = f
        .store
        .find_last_build_before(&f.repo, "main", &stored_second)
        .await
        .unwrap();
    assert_eq!(last.map(|b| b.id), Some(stored.id));
    assert!(
        f.store
            .find_last_build_before(&f.repo, "develop", &stored_second)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_failed_job_insert_rolls_back_build() {
    let f = setup().await;

    let build = pending_build(&f.repo, "main");
    // Duplicate job numbers violate the unique constraint.
    let jobs = vec![
        Job::pending(build.id, 1, Axis::new()),
        Job::pending(build.id, 1, Axis::new()),
    ];
    assert!(f.store.create_build_with_jobs(&build, &jobs).await.is_err());
    assert!(f.store.builds.get(build.id).await.unwrap().is_none());

    // The counter increment rolled back too.
    let retry = pending_build(&f.repo, "main");
    let stored = f
        .store
        .create_build_with_jobs(&retry, &[Job::pending(retry.id, 1, Axis::new())])
        .await
        .unwrap();
    assert_eq!(stored.number, 1);
}

#[tokio::test]
async fn test_secrets_merge() {
    let f = setup().await;

    let secret = |name: &str, value: &str, scope| Secret {
        id: SecretId::new(),
        name: name.to_string(),
        value: value.to_string(),
        images: vec!["plugins/docker".to_string()],
        events: vec![BuildEvent::Push],
        skip_verify: false,
        scope,
    };
    f.store
        .secrets
        .create(&f.repo, &secret("DOCKER_PASSWORD", "team", SecretScope::Team))
        .await
        .unwrap();
    f.store
        .secrets
        .create(&f.repo, &secret("SLACK_WEBHOOK", "team", SecretScope::Team))
        .await
        .unwrap();
    f.store
        .secrets
        .create(&f.repo, &secret("DOCKER_PASSWORD", "repo", SecretScope::Repo))
        .await
        .unwrap();

    let secrets = f.store.resolve_secrets(&f.repo).await.unwrap();
    assert_eq!(secrets.len(), 2);
    assert_eq!(secrets[0].name, "DOCKER_PASSWORD");
    assert_eq!(secrets[0].value, "repo");
    assert_eq!(secrets[0].events, vec![BuildEvent::Push]);
    assert_eq!(secrets[1].scope, SecretScope::Team);
}
