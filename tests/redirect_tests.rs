//! Redirect rule tests

use sitectl::config::Config;
use sitectl::error::Error;
use sitectl::task::TaskRegistry;
use sitectl::website::proxy::Operate;
use sitectl::website::redirect::{RedirectType, WebsiteRedirect};
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

fn redirect_request(name: &str, redirect_type: RedirectType) -> WebsiteRedirect {
    WebsiteRedirect {
        operate: Operate::Create,
        name: name.to_string(),
        redirect_type,
        domains: vec![],
        path: String::new(),
        target: "https://target.example.com".to_string(),
        keep_path: true,
        redirect: "301".to_string(),
        redirect_root: false,
        enable: false,
        content: String::new(),
    }
}

#[tokio::test]
async fn path_redirect_round_trips() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "redir.example.com").await;

    let mut req = redirect_request("old-path", RedirectType::Path);
    req.path = "/old".to_string();
    service.operate_redirect(&alias, req).await.unwrap();

    let conf = service.get_website_config(&alias).unwrap();
    assert!(conf.contains("redirect/*.conf"));

    let redirects = service.get_redirects(&alias).unwrap();
    assert_eq!(redirects.len(), 1);
    assert_eq!(redirects[0].name, "old-path");
    assert_eq!(redirects[0].redirect_type, RedirectType::Path);
    assert_eq!(redirects[0].path, "/old");
    assert_eq!(redirects[0].target, "https://target.example.com");
    assert!(redirects[0].keep_path);
    assert_eq!(redirects[0].redirect, "301");
    assert!(redirects[0].enable);
}

#[tokio::test]
async fn domain_redirect_round_trips() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "domredir.example.com").await;

    let mut req = redirect_request("www", RedirectType::Domain);
    req.domains = vec!["www.domredir.example.com".to_string()];
    req.redirect = "302".to_string();
    service.operate_redirect(&alias, req).await.unwrap();

    let redirects = service.get_redirects(&alias).unwrap();
    assert_eq!(redirects[0].redirect_type, RedirectType::Domain);
    assert_eq!(redirects[0].domains, vec!["www.domredir.example.com"]);
    assert_eq!(redirects[0].redirect, "302");
}

#[tokio::test]
async fn not_found_redirect_round_trips() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "nf.example.com").await;

    let mut req = redirect_request("notfound", RedirectType::NotFound);
    req.keep_path = false;
    req.redirect_root = true;
    service.operate_redirect(&alias, req).await.unwrap();

    let redirects = service.get_redirects(&alias).unwrap();
    assert_eq!(redirects[0].redirect_type, RedirectType::NotFound);
    assert!(redirects[0].redirect_root);
}

#[tokio::test]
async fn disable_keeps_the_rule_but_marks_it_off() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "offredir.example.com").await;

    let mut req = redirect_request("r", RedirectType::Path);
    req.path = "/x".to_string();
    service.operate_redirect(&alias, req.clone()).await.unwrap();

    req.operate = Operate::Disable;
    service.operate_redirect(&alias, req.clone()).await.unwrap();
    let redirects = service.get_redirects(&alias).unwrap();
    assert_eq!(redirects.len(), 1);
    assert!(!redirects[0].enable);

    // the name stays reserved while disabled
    req.operate = Operate::Create;
    let err = service.operate_redirect(&alias, req).await.unwrap_err();
    assert!(matches!(err, Error::NameExists(_)));
}

#[tokio::test]
async fn delete_removes_both_states() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "delredir.example.com").await;

    let mut req = redirect_request("r", RedirectType::Path);
    req.path = "/x".to_string();
    service.operate_redirect(&alias, req.clone()).await.unwrap();

    req.operate = Operate::Delete;
    service.operate_redirect(&alias, req).await.unwrap();
    assert!(service.get_redirects(&alias).unwrap().is_empty());
}

#[tokio::test]
async fn toggling_a_missing_rule_returns_not_found() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "ghost-redir.example.com").await;

    let mut req = redirect_request("missing", RedirectType::Path);
    req.operate = Operate::Disable;
    let err = service.operate_redirect(&alias, req).await;
    assert!(matches!(err, Err(Error::NotFound(_))));

    let mut req = redirect_request("missing", RedirectType::Path);
    req.operate = Operate::Enable;
    let err = service.operate_redirect(&alias, req).await;
    assert!(matches!(err, Err(Error::NotFound(_))));
}
