//! Domain and listen management
//!
//! Adding a domain opens newly-introduced ports, reconciles the WAF
//! registry and adds `listen`/`server_name` directives. Deleting one only
//! drops a `listen` when no other domain still uses the port and only drops
//! the `server_name` token when no other domain uses the exact string.

use crate::config::NginxConfig;
use crate::error::{Error, Result};
use crate::firewall;

use super::service::WebsiteService;
use super::{waf, WebsiteDomain};

/// Parse a `domain[:port]` binding
pub(crate) fn parse_domain(input: &str, config: &NginxConfig) -> Result<WebsiteDomain> {
    let input = input.trim();
    let (name, port) = match input.rsplit_once(':') {
        Some((name, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| Error::Other(format!("invalid port in domain '{}'", input)))?;
            (name, port)
        }
        None => (input, config.http_port),
    };

    let valid = !name.is_empty()
        && name.chars().all(|c| {
            c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '*' || c == '_'
        });
    if !valid {
        return Err(Error::Other(format!("invalid domain '{}'", input)));
    }

    Ok(WebsiteDomain {
        domain: name.to_string(),
        port,
        ssl: port == config.https_port,
    })
}

impl WebsiteService {
    /// Bind additional domains to a website
    pub async fn create_website_domain(
        &self,
        alias: &str,
        inputs: &[String],
    ) -> Result<Vec<WebsiteDomain>> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let mut website = self.store().get(alias)?;

        let mut added = Vec::new();
        for input in inputs {
            let domain = parse_domain(input, &self.config().nginx)?;
            if website.domains.contains(&domain) || added.contains(&domain) {
                return Err(Error::DomainExists(domain.domain));
            }
            added.push(domain);
        }
        if added.is_empty() {
            return Ok(Vec::new());
        }

        // only ports nothing listens on yet need a firewall opening
        let new_ports: Vec<u16> = added
            .iter()
            .map(|d| d.port)
            .filter(|port| !website.domains.iter().any(|d| d.port == *port))
            .collect();
        if self.config().nginx.manage_firewall && !new_ports.is_empty() {
            let tasks = self.tasks().clone();
            tokio::spawn(async move {
                let id = tasks.start("open firewall ports").await;
                let result = firewall::open_ports(&new_ports)
                    .await
                    .map(|_| format!("opened ports {:?}", new_ports))
                    .map_err(|e| e.to_string());
                tasks.finish(id, result).await;
            });
        }

        waf::add_domains(&self.config().nginx, &website.alias, &added)?;

        let default_server = website.default_server;
        let to_add = added.clone();
        self.apply_server(&website, |server| {
            for domain in &to_add {
                let existing_ports = server.listen_ports();
                if !existing_ports.iter().any(|p| p == &domain.port.to_string()) {
                    server.update_listen(&domain.port.to_string(), default_server, domain.ssl);
                }
                server.add_server_name(&domain.domain);
            }
            Ok(())
        })
        .await?;

        website.domains.extend(added.clone());
        self.store().save(&website)?;
        Ok(added)
    }

    pub fn get_website_domains(&self, alias: &str) -> Result<Vec<WebsiteDomain>> {
        Ok(self.store().get(alias)?.domains)
    }

    /// Remove one (domain, port) binding; the last binding of a website
    /// cannot be removed
    pub async fn delete_website_domain(
        &self,
        alias: &str,
        domain_name: &str,
        port: u16,
    ) -> Result<()> {
        let lock = self.alias_lock(alias).await;
        let _guard = lock.lock().await;

        let mut website = self.store().get(alias)?;

        if website.domains.len() == 1 {
            return Err(Error::LastDomain);
        }
        let target = website
            .domains
            .iter()
            .find(|d| d.domain == domain_name && d.port == port)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{}:{}", domain_name, port)))?;

        let port_still_used = website
            .domains
            .iter()
            .any(|d| d.port == port && *d != target);
        let name_still_used = website
            .domains
            .iter()
            .any(|d| d.domain == domain_name && *d != target);

        self.apply_server(&website, |server| {
            if !port_still_used {
                server.remove_listen(&port.to_string());
            }
            if !name_still_used {
                server.remove_server_name(domain_name);
            }
            Ok(())
        })
        .await?;

        waf::remove_binding(&self.config().nginx, &website.alias, &target, !name_still_used)?;

        website.domains.retain(|d| *d != target);
        self.store().save(&website)?;
        Ok(())
    }
}
