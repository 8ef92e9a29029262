//! Website lifecycle tests

use sitectl::config::Config;
use sitectl::error::Error;
use sitectl::task::TaskRegistry;
use sitectl::website::service::{
    CorsConfig, CreateWebsiteRequest, UpdateWebsiteRequest, WebsiteRealIp, WebsiteService,
};
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

fn create_request(domain: &str) -> CreateWebsiteRequest {
    CreateWebsiteRequest {
        primary_domain: domain.to_string(),
        alias: None,
        website_type: WebsiteType::Static,
        proxy: String::new(),
        domains: vec![],
        default_server: false,
        parent: None,
    }
}

#[tokio::test]
async fn create_website_renders_valid_config() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);

    let website = service.create_website(create_request("example.com")).await.unwrap();
    assert_eq!(website.alias, "example.com");
    assert_eq!(website.domains.len(), 1);
    assert_eq!(website.domains[0].port, 80);

    let content = service.get_website_config("example.com").unwrap();
    assert!(content.contains("listen 80;"));
    assert!(content.contains("server_name example.com;"));

    // the generated config must parse with the same engine that mutates it
    let root = sitectl::nginx::parse(&content).unwrap();
    assert_eq!(root.find_servers().len(), 1);
}

#[tokio::test]
async fn create_website_sets_up_site_tree() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);

    service.create_website(create_request("tree.example.com")).await.unwrap();
    let site = service.store().site_dir("tree.example.com");
    for sub in ["proxy", "upstream", "redirect", "rewrite", "auth_basic", "path_auth/pass", "cache", "log"] {
        assert!(site.join(sub).is_dir(), "missing {}", sub);
    }
    assert!(site.join("log/access.log").exists());
    assert!(site.join("website.toml").exists());
}

#[tokio::test]
async fn create_rejects_duplicate_alias() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);

    service.create_website(create_request("dup.example.com")).await.unwrap();
    let err = service
        .create_website(create_request("dup.example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WebsiteExists(_)));
}

#[tokio::test]
async fn failed_check_rolls_back_creation() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.nginx.sites_dir = tmp.path().join("sites");
    config.nginx.sites_prefix = tmp.path().join("sites").to_string_lossy().to_string();
    config.nginx.check_command = Some("false".to_string());
    let service = WebsiteService::new(config, None, TaskRegistry::new());

    let err = service.create_website(create_request("bad.example.com")).await;
    assert!(err.is_err());
    assert!(!service.store().site_dir("bad.example.com").exists());
}

#[tokio::test]
async fn failed_reload_restores_previous_config() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let website = service.create_website(create_request("roll.example.com")).await.unwrap();
    let before = service.get_website_config("roll.example.com").unwrap();

    // rebuild the service with a failing reload and attempt a mutation
    let mut config = Config::default();
    config.nginx.sites_dir = tmp.path().join("sites");
    config.nginx.sites_prefix = tmp.path().join("sites").to_string_lossy().to_string();
    config.nginx.check_command = Some("true".to_string());
    config.nginx.reload_command = Some("false".to_string());
    let failing = WebsiteService::new(config, None, TaskRegistry::new());

    let result = failing
        .update_nginx_config(
            sitectl::website::service::NginxScope::Server,
            &[sitectl::nginx::NginxParam {
                name: "client_max_body_size".to_string(),
                params: vec!["10m".to_string()],
            }],
            &website,
        )
        .await;
    assert!(result.is_err());

    let after = failing.get_website_config("roll.example.com").unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn update_website_toggles_logs_and_default_server() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    service.create_website(create_request("logs.example.com")).await.unwrap();

    let updated = service
        .update_website(UpdateWebsiteRequest {
            alias: "logs.example.com".to_string(),
            access_log: false,
            error_log: false,
            default_server: true,
        })
        .await
        .unwrap();
    assert!(!updated.access_log);
    assert!(updated.default_server);

    let content = service.get_website_config("logs.example.com").unwrap();
    assert!(content.contains("access_log off;"));
    assert!(!content.contains("error_log"));
    assert!(content.contains("default_server"));
}

#[tokio::test]
async fn delete_website_removes_everything() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    service.create_website(create_request("gone.example.com")).await.unwrap();

    service.delete_website("gone.example.com").await.unwrap();
    assert!(!service.store().site_dir("gone.example.com").exists());
    assert!(matches!(
        service.store().get("gone.example.com"),
        Err(Error::WebsiteNotFound(_))
    ));
}

#[tokio::test]
async fn stream_website_uses_stream_template() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);

    let mut req = create_request("tcp.example.com:9000");
    req.website_type = WebsiteType::Stream;
    req.proxy = "127.0.0.1:9001".to_string();
    let website = service.create_website(req).await.unwrap();
    assert!(website.is_stream());

    let content = service.get_website_config(&website.alias).unwrap();
    assert!(content.contains("listen 9000;"));
    assert!(content.contains("proxy_pass 127.0.0.1:9001;"));
    assert!(!content.contains("server_name"));
}

#[tokio::test]
async fn scoped_update_is_idempotent_for_repeatable_directives() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    let website = service.create_website(create_request("rep.example.com")).await.unwrap();

    let params = [sitectl::nginx::NginxParam {
        name: "add_header".to_string(),
        params: vec!["X-Frame-Options".to_string(), "DENY".to_string()],
    }];
    for _ in 0..2 {
        service
            .update_nginx_config(sitectl::website::service::NginxScope::Server, &params, &website)
            .await
            .unwrap();
    }

    let content = service.get_website_config("rep.example.com").unwrap();
    assert_eq!(content.matches("X-Frame-Options").count(), 1);
}

#[tokio::test]
async fn real_ip_config_round_trips() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    service.create_website(create_request("realip.example.com")).await.unwrap();

    service
        .set_real_ip_config(
            "realip.example.com",
            WebsiteRealIp {
                open: true,
                ip_from: vec!["10.0.0.0/8".to_string(), "192.168.1.5".to_string()],
                ip_header: "X-Forwarded-For".to_string(),
                ip_other: String::new(),
            },
        )
        .await
        .unwrap();

    let content = service.get_website_config("realip.example.com").unwrap();
    assert!(content.contains("set_real_ip_from 10.0.0.0/8;"));
    assert!(content.contains("set_real_ip_from 192.168.1.5;"));
    assert!(content.contains("real_ip_header X-Forwarded-For;"));
    assert!(content.contains("real_ip_recursive on;"));

    let info = service.get_real_ip_config("realip.example.com").unwrap();
    assert!(info.open);
    assert_eq!(info.ip_from, vec!["10.0.0.0/8", "192.168.1.5"]);
    assert_eq!(info.ip_header, "X-Forwarded-For");

    service
        .set_real_ip_config(
            "realip.example.com",
            WebsiteRealIp {
                open: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let content = service.get_website_config("realip.example.com").unwrap();
    assert!(!content.contains("set_real_ip_from"));
    assert!(!service.get_real_ip_config("realip.example.com").unwrap().open);
}

#[tokio::test]
async fn real_ip_custom_header_reads_back_as_other() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    service.create_website(create_request("cdnip.example.com")).await.unwrap();

    service
        .set_real_ip_config(
            "cdnip.example.com",
            WebsiteRealIp {
                open: true,
                ip_from: vec!["172.16.0.0/12".to_string()],
                ip_header: "other".to_string(),
                ip_other: "CF-Connecting-IP".to_string(),
            },
        )
        .await
        .unwrap();

    let info = service.get_real_ip_config("cdnip.example.com").unwrap();
    assert_eq!(info.ip_header, "other");
    assert_eq!(info.ip_other, "CF-Connecting-IP");
}

#[tokio::test]
async fn real_ip_rejects_invalid_addresses() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    service.create_website(create_request("badip.example.com")).await.unwrap();

    let err = service
        .set_real_ip_config(
            "badip.example.com",
            WebsiteRealIp {
                open: true,
                ip_from: vec!["not-an-ip".to_string()],
                ip_header: "X-Real-IP".to_string(),
                ip_other: String::new(),
            },
        )
        .await;
    assert!(matches!(err, Err(Error::InvalidIp(_))));
    let content = service.get_website_config("badip.example.com").unwrap();
    assert!(!content.contains("set_real_ip_from"));
}

#[tokio::test]
async fn server_cors_round_trips() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    service.create_website(create_request("cors.example.com")).await.unwrap();

    service
        .update_cors(
            "cors.example.com",
            CorsConfig {
                cors: true,
                allow_origins: "https://app.example.com".to_string(),
                allow_methods: "GET,POST".to_string(),
                allow_headers: "Authorization".to_string(),
                allow_credentials: true,
                preflight: true,
            },
        )
        .await
        .unwrap();

    let content = service.get_website_config("cors.example.com").unwrap();
    assert!(content.contains("add_header Access-Control-Allow-Origin https://app.example.com always;"));
    assert!(content.contains("if ($request_method = 'OPTIONS') {"));
    assert!(content.contains("return 204;"));

    let cors = service.get_cors("cors.example.com").unwrap();
    assert!(cors.cors);
    assert_eq!(cors.allow_origins, "https://app.example.com");
    assert_eq!(cors.allow_methods, "GET,POST");
    assert!(cors.allow_credentials);
    assert!(cors.preflight);

    service
        .update_cors(
            "cors.example.com",
            CorsConfig {
                cors: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let content = service.get_website_config("cors.example.com").unwrap();
    assert!(!content.contains("Access-Control"));
    assert!(!service.get_cors("cors.example.com").unwrap().cors);
}

#[tokio::test]
async fn default_server_moves_between_websites() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    service.create_website(create_request("first.example.com")).await.unwrap();
    service.create_website(create_request("second.example.com")).await.unwrap();

    for alias in ["first.example.com", "second.example.com"] {
        service
            .update_website(UpdateWebsiteRequest {
                alias: alias.to_string(),
                access_log: true,
                error_log: true,
                default_server: true,
            })
            .await
            .unwrap();
    }

    let first = service.get_website_config("first.example.com").unwrap();
    let second = service.get_website_config("second.example.com").unwrap();
    assert!(!first.contains("default_server"));
    assert!(second.contains("default_server"));
    assert!(!service.store().get("first.example.com").unwrap().default_server);
    assert!(service.store().get("second.example.com").unwrap().default_server);
}

#[tokio::test]
async fn subsite_requires_existing_parent() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);

    let mut req = create_request("blog.example.com");
    req.website_type = WebsiteType::Subsite;
    let err = service.create_website(req).await;
    assert!(matches!(err, Err(Error::NotFound(_))));

    let mut req = create_request("blog.example.com");
    req.website_type = WebsiteType::Subsite;
    req.parent = Some("nope.example.com".to_string());
    let err = service.create_website(req).await;
    assert!(matches!(err, Err(Error::WebsiteNotFound(_))));
}

#[tokio::test]
async fn subsite_roots_under_parent_and_blocks_parent_deletion() {
    let tmp = TempDir::new().unwrap();
    let service = test_service(&tmp);
    service.create_website(create_request("main.example.com")).await.unwrap();

    let mut req = create_request("blog.example.com");
    req.website_type = WebsiteType::Subsite;
    req.parent = Some("main.example.com".to_string());
    let subsite = service.create_website(req).await.unwrap();
    assert_eq!(subsite.parent.as_deref(), Some("main.example.com"));

    let content = service.get_website_config("blog.example.com").unwrap();
    assert!(content.contains("root"));
    assert!(content.contains("main.example.com/index/blog.example.com"));

    assert!(service.delete_website("main.example.com").await.is_err());
    service.delete_website("blog.example.com").await.unwrap();
    service.delete_website("main.example.com").await.unwrap();
}
