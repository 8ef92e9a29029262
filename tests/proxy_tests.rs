//! Reverse-proxy rule tests

use sitectl::config::Config;
use sitectl::error::Error;
use sitectl::task::TaskRegistry;
use sitectl::website::proxy::{Operate, WebsiteProxyConfig};
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

fn proxy_request(name: &str, operate: Operate) -> WebsiteProxyConfig {
    WebsiteProxyConfig {
        operate,
        name: name.to_string(),
        modifier: "^~".to_string(),
        match_path: "/api".to_string(),
        proxy_pass: "http://127.0.0.1:8080".to_string(),
        proxy_host: "$host".to_string(),
        cache: false,
        server_cache_time: 0,
        server_cache_unit: String::new(),
        cache_time: 0,
        cache_unit: String::new(),
        replaces: vec![],
        sni: false,
        proxy_ssl_name: String::new(),
        cors: false,
        allow_origins: String::new(),
        allow_methods: String::new(),
        allow_headers: String::new(),
        allow_credentials: false,
        preflight: false,
        enable: false,
        content: String::new(),
    }
}

#[tokio::test]
async fn create_proxy_writes_rule_and_include() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "proxy.example.com").await;

    service
        .operate_proxy(&alias, proxy_request("api", Operate::Create))
        .await
        .unwrap();

    let rule = service.store().proxy_dir(&alias).join("api.conf");
    assert!(rule.exists());

    let conf = service.get_website_config(&alias).unwrap();
    assert!(conf.contains("proxy/*.conf"));

    let proxies = service.get_proxies(&alias).unwrap();
    assert_eq!(proxies.len(), 1);
    assert_eq!(proxies[0].name, "api");
    assert_eq!(proxies[0].match_path, "/api");
    assert_eq!(proxies[0].modifier, "^~");
    assert_eq!(proxies[0].proxy_pass, "http://127.0.0.1:8080");
    assert!(proxies[0].enable);
}

#[tokio::test]
async fn create_rejects_existing_name_even_when_disabled() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "dupname.example.com").await;

    service
        .operate_proxy(&alias, proxy_request("api", Operate::Create))
        .await
        .unwrap();
    service
        .operate_proxy(&alias, proxy_request("api", Operate::Disable))
        .await
        .unwrap();

    // only the .bak remains, the name is still taken
    assert!(service.store().proxy_dir(&alias).join("api.bak").exists());
    let err = service
        .operate_proxy(&alias, proxy_request("api", Operate::Create))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NameExists(_)));
}

#[tokio::test]
async fn disable_and_enable_toggle_the_extension() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "toggle.example.com").await;

    service
        .operate_proxy(&alias, proxy_request("api", Operate::Create))
        .await
        .unwrap();
    service
        .operate_proxy(&alias, proxy_request("api", Operate::Disable))
        .await
        .unwrap();

    let proxies = service.get_proxies(&alias).unwrap();
    assert_eq!(proxies.len(), 1);
    assert!(!proxies[0].enable);

    service
        .operate_proxy(&alias, proxy_request("api", Operate::Enable))
        .await
        .unwrap();
    let proxies = service.get_proxies(&alias).unwrap();
    assert!(proxies[0].enable);
}

#[tokio::test]
async fn delete_removes_rule_files() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "delrule.example.com").await;

    service
        .operate_proxy(&alias, proxy_request("api", Operate::Create))
        .await
        .unwrap();
    service
        .operate_proxy(&alias, proxy_request("api", Operate::Delete))
        .await
        .unwrap();

    assert!(service.get_proxies(&alias).unwrap().is_empty());
    assert!(!service.store().proxy_dir(&alias).join("api.conf").exists());
}

#[tokio::test]
async fn cors_options_round_trip() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "cors.example.com").await;

    let mut req = proxy_request("api", Operate::Create);
    req.cors = true;
    req.allow_origins = "*".to_string();
    req.allow_methods = "GET,POST".to_string();
    req.allow_headers = "Content-Type".to_string();
    req.allow_credentials = true;
    req.preflight = true;
    service.operate_proxy(&alias, req).await.unwrap();

    let proxies = service.get_proxies(&alias).unwrap();
    let rule = &proxies[0];
    assert!(rule.cors);
    assert_eq!(rule.allow_origins, "*");
    assert_eq!(rule.allow_methods, "GET,POST");
    assert!(rule.allow_credentials);
    assert!(rule.preflight);

    // removing cors strips every header and the preflight block
    let mut req = proxy_request("api", Operate::Edit);
    req.cors = false;
    service.operate_proxy(&alias, req).await.unwrap();
    let proxies = service.get_proxies(&alias).unwrap();
    assert!(!proxies[0].cors);
    assert!(!proxies[0].preflight);
}

#[tokio::test]
async fn sub_filters_round_trip() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "subf.example.com").await;

    let mut req = proxy_request("api", Operate::Create);
    req.replaces = vec![sitectl::nginx::SubFilter {
        find: "http://old".to_string(),
        replace: "https://new".to_string(),
    }];
    service.operate_proxy(&alias, req).await.unwrap();

    let proxies = service.get_proxies(&alias).unwrap();
    assert_eq!(proxies[0].replaces.len(), 1);
    assert_eq!(proxies[0].replaces[0].find, "http://old");
    assert_eq!(proxies[0].replaces[0].replace, "https://new");
}

#[tokio::test]
async fn server_cache_settings_round_trip() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "cache.example.com").await;

    let mut req = proxy_request("api", Operate::Create);
    req.cache = true;
    req.server_cache_time = 5;
    req.server_cache_unit = "m".to_string();
    service.operate_proxy(&alias, req).await.unwrap();

    let proxies = service.get_proxies(&alias).unwrap();
    assert!(proxies[0].cache);
    assert_eq!(proxies[0].server_cache_time, 5);
    assert_eq!(proxies[0].server_cache_unit, "m");

    // the http-scope proxy_cache_path was provisioned as well
    let cache = service.get_proxy_cache(&alias).unwrap();
    assert!(cache.open);
}

#[tokio::test]
async fn update_proxy_file_rejects_malformed_content() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "raw.example.com").await;

    service
        .operate_proxy(&alias, proxy_request("api", Operate::Create))
        .await
        .unwrap();
    let before = std::fs::read_to_string(service.store().proxy_dir(&alias).join("api.conf")).unwrap();

    let err = service
        .update_proxy_file(&alias, "api", "location / { proxy_pass")
        .await;
    assert!(err.is_err());

    let after = std::fs::read_to_string(service.store().proxy_dir(&alias).join("api.conf")).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn disable_and_enable_of_missing_rule_return_not_found() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let alias = create_site(&service, "ghost.example.com").await;

    let err = service
        .operate_proxy(&alias, proxy_request("missing", Operate::Disable))
        .await;
    assert!(matches!(err, Err(Error::NotFound(_))));

    let err = service
        .operate_proxy(&alias, proxy_request("missing", Operate::Enable))
        .await;
    assert!(matches!(err, Err(Error::NotFound(_))));
}
