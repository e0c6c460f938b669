//! Scripted stand-in for a real browser.
//!
//! A [`FakePage`] answers `evaluate` calls by substring: the first rule whose
//! needle occurs in the script wins, unmatched scripts evaluate to `null`
//! (the "element absent" answer every page script uses). Page sources are
//! served per navigated URL. A [`FakeLauncher`] hands out clones of one page
//! and records every open, navigation and close.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bibharvest_core::browser::BrowserCookie;
use bibharvest_core::{BrowserError, BrowserSession, SessionLauncher};
use serde_json::Value;

/// What the launcher and its sessions did.
#[derive(Debug, Default)]
pub struct Activity {
    pub opened: Vec<String>,
    pub navigated: Vec<String>,
    pub scripts: Vec<String>,
    pub closed: usize,
}

#[derive(Debug, Clone)]
enum Reply {
    Value(Value),
    Fail(String),
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    rules: Vec<(String, Reply)>,
    sources: HashMap<String, String>,
    cookies: Vec<BrowserCookie>,
    user_agent: Option<String>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts containing `needle` evaluate to `value`.
    pub fn on(mut self, needle: &str, value: Value) -> Self {
        self.rules.push((needle.to_string(), Reply::Value(value)));
        self
    }

    /// Scripts containing `needle` fail with a script error.
    pub fn fail_on(mut self, needle: &str, reason: &str) -> Self {
        self.rules
            .push((needle.to_string(), Reply::Fail(reason.to_string())));
        self
    }

    /// Page source served after navigating to `url`.
    pub fn source(mut self, url: &str, html: &str) -> Self {
        self.sources.insert(url.to_string(), html.to_string());
        self
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push(BrowserCookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: "example.test".to_string(),
        });
        self
    }

    pub fn user_agent(mut self, agent: &str) -> Self {
        self.user_agent = Some(agent.to_string());
        self
    }
}

pub struct FakeSession {
    page: FakePage,
    current: String,
    activity: Arc<Mutex<Activity>>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.activity.lock().unwrap().navigated.push(url.to_string());
        self.current = url.to_string();
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, BrowserError> {
        self.activity
            .lock()
            .unwrap()
            .scripts
            .push(script.to_string());
        if script == "navigator.userAgent" {
            if let Some(agent) = &self.page.user_agent {
                return Ok(Value::String(agent.clone()));
            }
        }
        for (needle, reply) in &self.page.rules {
            if script.contains(needle.as_str()) {
                return match reply {
                    Reply::Value(value) => Ok(value.clone()),
                    Reply::Fail(reason) => Err(BrowserError::script(reason.clone())),
                };
            }
        }
        Ok(Value::Null)
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        Ok(self
            .page
            .sources
            .get(&self.current)
            .cloned()
            .unwrap_or_default())
    }

    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, BrowserError> {
        Ok(self.page.cookies.clone())
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.activity.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Launcher whose sessions all show the same [`FakePage`].
pub struct FakeLauncher {
    page: Option<FakePage>,
    activity: Arc<Mutex<Activity>>,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page: Some(page),
            activity: Arc::default(),
        }
    }

    /// A launcher whose every open fails.
    pub fn broken() -> Self {
        Self {
            page: None,
            activity: Arc::default(),
        }
    }

    pub fn activity(&self) -> Arc<Mutex<Activity>> {
        Arc::clone(&self.activity)
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn open(&self, url: &str) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.activity.lock().unwrap().opened.push(url.to_string());
        let Some(page) = self.page.clone() else {
            return Err(BrowserError::launch("no browser available"));
        };
        Ok(Box::new(FakeSession {
            page,
            current: url.to_string(),
            activity: Arc::clone(&self.activity),
        }))
    }
}
