//! Browser tab focus through the BroTab command line (`bt`)

use crate::process;
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Browser instance known to the tab broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserClient {
    /// Tab id prefix of this instance, e.g. `a`
    pub prefix: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserTab {
    /// `<prefix>.<window>.<tab>`
    pub id: String,
    pub title: String,
    pub url: String,
}

/// External tab listing and activation
///
/// Failures are not errors: an unavailable broker lists nothing and activates
/// nothing.
#[async_trait]
pub trait TabBroker: Send + Sync {
    async fn list_clients(&self) -> Vec<BrowserClient>;

    async fn list_tabs(&self, client: &BrowserClient) -> Vec<BrowserTab>;

    async fn activate(&self, tab: &BrowserTab) -> bool;
}

/// Parse `bt clients` output (`a.<TAB>localhost:4625<TAB>1234<TAB>firefox`)
pub fn parse_clients(output: &str) -> Vec<BrowserClient> {
    output
        .lines()
        .filter_map(|line| {
            let (prefix, rest) = line.trim().split_once(char::is_whitespace)?;
            let prefix = prefix.trim_end_matches('.');
            if prefix.is_empty() {
                return None;
            }
            Some(BrowserClient {
                prefix: prefix.to_string(),
                name: rest.split_whitespace().collect::<Vec<_>>().join(" "),
            })
        })
        .collect()
}

/// Parse `bt list` output (`a.1.2<TAB>title<TAB>url`)
pub fn parse_tabs(output: &str) -> Vec<BrowserTab> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, '\t');
            let id = fields.next()?.trim();
            if id.is_empty() {
                return None;
            }
            Some(BrowserTab {
                id: id.to_string(),
                title: fields.next().unwrap_or_default().to_string(),
                url: fields.next().unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

/// `bt`-backed tab broker
#[derive(Debug, Clone, Default)]
pub struct Brotab;

impl Brotab {
    async fn bt(&self, args: &[&str]) -> Option<String> {
        match process::output("bt", args).await {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                warn!(
                    "bt {} failed ({}): {}",
                    args.join(" "),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(e) => {
                warn!("{:#}", e);
                None
            }
        }
    }
}

#[async_trait]
impl TabBroker for Brotab {
    async fn list_clients(&self) -> Vec<BrowserClient> {
        self.bt(&["clients"]).await.map(|out| parse_clients(&out)).unwrap_or_default()
    }

    async fn list_tabs(&self, client: &BrowserClient) -> Vec<BrowserTab> {
        let prefix = format!("{}.", client.prefix);
        self.bt(&["list"])
            .await
            .map(|out| parse_tabs(&out))
            .unwrap_or_default()
            .into_iter()
            .filter(|tab| tab.id.starts_with(&prefix))
            .collect()
    }

    async fn activate(&self, tab: &BrowserTab) -> bool {
        self.bt(&["activate", &tab.id]).await.is_some()
    }
}

/// Bring a browser tab to the foreground
#[derive(Clone)]
pub struct BrowserTabFocus {
    browser: Regex,
    tab: Regex,
    broker: Arc<dyn TabBroker>,
}

impl BrowserTabFocus {
    pub fn new(browser: Regex, tab: Regex, broker: Arc<dyn TabBroker>) -> Self {
        Self { browser, tab, broker }
    }

    /// Activate the first tab whose title matches, in the first matching browser
    pub async fn focus(&self) -> bool {
        let clients = self.broker.list_clients().await;
        let Some(client) = clients.iter().find(|c| self.browser.is_match(&c.name)) else {
            warn!("Could not find browser matching /{}/", self.browser);
            return false;
        };

        let tabs = self.broker.list_tabs(client).await;
        let Some(tab) = tabs.iter().find(|t| self.tab.is_match(&t.title)) else {
            warn!("Could not find tab matching /{}/ in {}", self.tab, client.name);
            return false;
        };

        debug!("Activating tab {} '{}'", tab.id, tab.title);
        self.broker.activate(tab).await
    }
}

impl fmt::Display for BrowserTabFocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab /{}/ in browser /{}/", self.tab, self.browser)
    }
}
