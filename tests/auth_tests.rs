//! Basic auth tests

use sitectl::config::Config;
use sitectl::error::Error;
use sitectl::task::TaskRegistry;
use sitectl::website::auth::{AuthBasicUpdate, AuthOperate, PathAuthUpdate};
use sitectl::website::service::{CreateWebsiteRequest, WebsiteService};
use sitectl::website::WebsiteType;
use tempfile::TempDir;

fn test_service(tmp: &TempDir) -> WebsiteService {
    let mut config = Config::default();
    config.nginx.sites_dir = tmp.path().join("sites");
    config.nginx.sites_prefix = tmp.path().join("sites").to_string_lossy().to_string();
    config.nginx.rewrite_dir = tmp.path().join("rewrite");
    config.nginx.check_command = Some("true".to_string());
    config.nginx.reload_command = Some("true".to_string());
    WebsiteService::new(config, None, TaskRegistry::new())
}

async fn create_site(service: &WebsiteService, domain: &str) -> String {
    service
        .create_website(CreateWebsiteRequest {
            primary_domain: domain.to_string(),
            alias: None,
            website_type: WebsiteType::Static,
            proxy: String::new(),
            domains: vec![],
            default_server: false,
            parent: None,
        })
        .await
        .unwrap()
        .alias
}

fn user(operate: AuthOperate, username: &str, password: &str) -> AuthBasicUpdate {
    AuthBasicUpdate {
        operate,
        username: username.to_string(),
        password: password.to_string(),
        remark: String::new(),
    }
}

#[tokio::test]
async fn create_user_stores_a_bcrypt_hash() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "auth.example.com").await;

    service
        .update_auth_basic(&alias, user(AuthOperate::Create, "alice", "secret"))
        .await
        .unwrap();

    let content = std::fs::read_to_string(service.store().auth_pass_path(&alias)).unwrap();
    let hash = content.trim().strip_prefix("alice:").unwrap();
    assert!(bcrypt::verify("secret", hash).unwrap());

    let info = service.get_auth_basics(&alias).unwrap();
    assert_eq!(info.items.len(), 1);
    assert_eq!(info.items[0].username, "alice");
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "dupuser.example.com").await;

    service
        .update_auth_basic(&alias, user(AuthOperate::Create, "alice", "one"))
        .await
        .unwrap();
    let err = service
        .update_auth_basic(&alias, user(AuthOperate::Create, "alice", "two"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UsernameExists(_)));
}

#[tokio::test]
async fn edit_and_delete_require_the_user_to_exist() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "ghost.example.com").await;

    let err = service
        .update_auth_basic(&alias, user(AuthOperate::Edit, "nobody", "pw"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UsernameNotFound(_)));

    let err = service
        .update_auth_basic(&alias, user(AuthOperate::Delete, "nobody", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UsernameNotFound(_)));
}

#[tokio::test]
async fn enable_adds_directives_and_disable_removes_them() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "toggle-auth.example.com").await;

    service
        .update_auth_basic(&alias, user(AuthOperate::Create, "alice", "pw"))
        .await
        .unwrap();
    service
        .update_auth_basic(&alias, user(AuthOperate::Enable, "", ""))
        .await
        .unwrap();

    let conf = service.get_website_config(&alias).unwrap();
    assert!(conf.contains("auth_basic \"Authentication\";"));
    assert!(conf.contains("auth_basic/auth.pass"));
    assert!(service.get_auth_basics(&alias).unwrap().enable);

    service
        .update_auth_basic(&alias, user(AuthOperate::Disable, "", ""))
        .await
        .unwrap();
    let conf = service.get_website_config(&alias).unwrap();
    assert!(!conf.contains("auth_basic"));
    assert!(!service.get_auth_basics(&alias).unwrap().enable);

    // disabling never touches the credential file
    let info = service.get_auth_basics(&alias).unwrap();
    assert_eq!(info.items.len(), 1);
}

#[tokio::test]
async fn deleting_the_last_user_disables_auth() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "lastuser.example.com").await;

    service
        .update_auth_basic(&alias, user(AuthOperate::Create, "alice", "pw"))
        .await
        .unwrap();
    service
        .update_auth_basic(&alias, user(AuthOperate::Enable, "", ""))
        .await
        .unwrap();
    service
        .update_auth_basic(&alias, user(AuthOperate::Delete, "alice", ""))
        .await
        .unwrap();

    let conf = service.get_website_config(&alias).unwrap();
    assert!(!conf.contains("auth_basic"));
}

#[tokio::test]
async fn path_auth_creates_location_and_pass_files() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "pathauth.example.com").await;

    service
        .update_path_auth(
            &alias,
            PathAuthUpdate {
                operate: AuthOperate::Create,
                name: "admin".to_string(),
                path: "/admin".to_string(),
                username: "alice".to_string(),
                password: "pw".to_string(),
                remark: "staff".to_string(),
            },
        )
        .await
        .unwrap();

    assert!(service.store().path_auth_dir(&alias).join("admin.conf").exists());
    assert!(service.store().path_auth_pass_dir(&alias).join("admin.pass").exists());

    let conf = service.get_website_config(&alias).unwrap();
    assert!(conf.contains("path_auth/*.conf"));

    let auths = service.get_path_auth_basics(&alias).unwrap();
    assert_eq!(auths.len(), 1);
    assert_eq!(auths[0].name, "admin");
    assert_eq!(auths[0].path, "/admin");
    assert_eq!(auths[0].username, "alice");
    assert_eq!(auths[0].remark, "staff");
}

#[tokio::test]
async fn path_auth_create_rejects_existing_name() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "pathdup.example.com").await;

    let req = PathAuthUpdate {
        operate: AuthOperate::Create,
        name: "admin".to_string(),
        path: "/admin".to_string(),
        username: "alice".to_string(),
        password: "pw".to_string(),
        remark: String::new(),
    };
    service.update_path_auth(&alias, req.clone()).await.unwrap();
    let err = service.update_path_auth(&alias, req).await.unwrap_err();
    assert!(matches!(err, Error::NameExists(_)));
}

#[tokio::test]
async fn path_auth_delete_removes_conf_and_pass() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "pathdel.example.com").await;

    let mut req = PathAuthUpdate {
        operate: AuthOperate::Create,
        name: "admin".to_string(),
        path: "/admin".to_string(),
        username: "alice".to_string(),
        password: "pw".to_string(),
        remark: String::new(),
    };
    service.update_path_auth(&alias, req.clone()).await.unwrap();

    req.operate = AuthOperate::Delete;
    service.update_path_auth(&alias, req).await.unwrap();
    assert!(!service.store().path_auth_dir(&alias).join("admin.conf").exists());
    assert!(!service.store().path_auth_pass_dir(&alias).join("admin.pass").exists());
    assert!(service.get_path_auth_basics(&alias).unwrap().is_empty());
}
