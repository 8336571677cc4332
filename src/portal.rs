// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use crate::config::{Config, Location};
use crate::error::{CheckinError, CheckinResult, ConfigError};
use crate::task::TaskId;
use reqwest::header::{self, HeaderMap, HeaderValue};

/// User agent of the WeChat in-app browser, which the site expects.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 MicroMessenger/7.0.20.1781(0x6700143B) NetType/WIFI MiniProgramEnv/Windows WindowsWechat/WMPF WindowsWechat(0x63090a13)";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/wxpic,image/webp,image/apng,*/*;q=0.8";

/// Maximum number of characters of a response body written to the debug log.
const LOG_BODY_MAX: usize = 200;

/// Client builder with `timeout`, bypassing proxies for loopback targets.
pub(crate) fn client_builder(timeout: std::time::Duration, target: &str) -> reqwest::ClientBuilder {
    let builder = reqwest::Client::builder().timeout(timeout);
    let loopback = reqwest::Url::parse(target)
        .ok()
        .and_then(|url| {
            url.host_str().map(|host| {
                host == "localhost"
                    || host
                        .parse::<std::net::IpAddr>()
                        .is_ok_and(|ip| ip.is_loopback())
            })
        })
        .unwrap_or(false);
    if loopback {
        builder.no_proxy()
    } else {
        builder
    }
}

/// The check-in site, as seen by the runner.
#[async_trait::async_trait]
pub trait Portal: Send + Sync {
    /// Retrieve the markup of the course listing page.
    async fn fetch_task_page(&self) -> CheckinResult<String>;

    /// Submit a check-in for the task `id` from `location`.
    ///
    /// Success only means that the request was delivered: the outcome is
    /// decided by fetching the listing again.
    async fn submit_checkin(&self, id: &TaskId, location: &Location) -> CheckinResult<()>;
}

/// Portal reached over HTTP with the session cookie of the student.
pub struct HttpPortal {
    client: reqwest::Client,
    listing_url: String,
    config: Config,
}

impl HttpPortal {
    pub fn new(config: &Config) -> CheckinResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        headers.insert(
            header::REFERER,
            HeaderValue::from_str(&config.referer_url()).map_err(|e| ConfigError::Invalid {
                field: "class_id",
                reason: e.to_string(),
            })?,
        );
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&config.cookie).map_err(|e| ConfigError::Invalid {
                field: "cookie",
                reason: e.to_string(),
            })?,
        );
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );

        let client = client_builder(config.request_timeout, &config.base_url)
            .default_headers(headers)
            .build()?;

        log::debug!(
            "created portal for {}, timeout {:?}",
            config.base_url,
            config.request_timeout
        );

        Ok(Self {
            client,
            listing_url: config.listing_url(),
            config: config.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Portal for HttpPortal {
    async fn fetch_task_page(&self) -> CheckinResult<String> {
        log::debug!("GET {}", self.listing_url);
        let response = self.client.get(&self.listing_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CheckinError::Status {
                status: status.as_u16(),
                url: self.listing_url.clone(),
            });
        }
        Ok(response.text().await?)
    }

    async fn submit_checkin(&self, id: &TaskId, location: &Location) -> CheckinResult<()> {
        let url = self.config.submit_url(id);
        let form = [
            ("id", id.as_str()),
            ("lat", location.lat.as_str()),
            ("lng", location.lng.as_str()),
            ("acc", location.acc.as_str()),
            ("res", ""),
            ("gps_addr", ""),
        ];
        log::debug!("POST {} {:?}", url, form);
        let response = self.client.post(&url).form(&form).send().await?;

        let status = response.status();
        match response.text().await {
            Ok(body) => log::debug!(
                "submit response {}: {}",
                status,
                body.chars().take(LOG_BODY_MAX).collect::<String>()
            ),
            Err(err) => log::debug!("submit response {}, unreadable body: {}", status, err),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{serve, test_config};

    #[tokio::test]
    async fn test_fetch_task_page() -> anyhow::Result<()> {
        let server = serve(vec![(200, "<div id=\"punchcard_1\"></div>".to_string())]).await?;
        let config = test_config(&server.base_url);
        let portal = HttpPortal::new(&config)?;

        let markup = portal.fetch_task_page().await?;
        assert_eq!("<div id=\"punchcard_1\"></div>", markup);

        let requests = server.requests();
        assert_eq!(1, requests.len());
        let request = &requests[0];
        assert_eq!("GET", request.method.as_str());
        assert_eq!("/student/course/114514/punchs", request.path);
        assert_eq!(Some("remember_student_abc=xyz"), request.header("cookie"));
        assert_eq!(
            Some(format!("{}/student/course/114514", server.base_url).as_str()),
            request.header("referer")
        );
        assert_eq!(Some("1"), request.header("upgrade-insecure-requests"));
        assert!(request
            .header("user-agent")
            .is_some_and(|x| x.to_lowercase().contains("micromessenger")));
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_task_page_bad_status() -> anyhow::Result<()> {
        let server = serve(vec![(500, "oops".to_string())]).await?;
        let portal = HttpPortal::new(&test_config(&server.base_url))?;

        match portal.fetch_task_page().await {
            Err(CheckinError::Status { status, url }) => {
                assert_eq!(500, status);
                assert!(url.ends_with("/student/course/114514/punchs"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(1, server.requests().len());
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_task_page_unreachable() -> anyhow::Result<()> {
        // bind and release a port, so that nothing is listening on it
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        drop(listener);

        let portal = HttpPortal::new(&test_config(&base_url))?;
        assert!(matches!(
            portal.fetch_task_page().await,
            Err(CheckinError::Transport(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_checkin() -> anyhow::Result<()> {
        let server = serve(vec![(200, "{\"ok\":1}".to_string())]).await?;
        let config = test_config(&server.base_url);
        let portal = HttpPortal::new(&config)?;

        portal.submit_checkin(&TaskId::from(42), &config.location).await?;

        let requests = server.requests();
        assert_eq!(1, requests.len());
        let request = &requests[0];
        assert_eq!("POST", request.method.as_str());
        assert_eq!("/student/punchs/course/114514/42", request.path);
        assert_eq!(
            Some("application/x-www-form-urlencoded"),
            request.header("content-type")
        );
        assert_eq!(
            "id=42&lat=34.114873&lng=108.942932&acc=10&res=&gps_addr=",
            request.body
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_checkin_keeps_identifier_text() -> anyhow::Result<()> {
        let server = serve(vec![(200, String::new())]).await?;
        let config = test_config(&server.base_url);
        let portal = HttpPortal::new(&config)?;

        let id = "007".parse::<TaskId>()?;
        portal.submit_checkin(&id, &config.location).await?;

        let requests = server.requests();
        assert_eq!("/student/punchs/course/114514/007", requests[0].path);
        assert!(requests[0].body.starts_with("id=007&"));
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_checkin_ignores_status() -> anyhow::Result<()> {
        let server = serve(vec![(404, "not here".to_string())]).await?;
        let config = test_config(&server.base_url);
        let portal = HttpPortal::new(&config)?;

        portal.submit_checkin(&TaskId::from(1), &config.location).await?;
        assert_eq!(1, server.requests().len());
        Ok(())
    }

    #[test]
    fn test_invalid_cookie() {
        let mut config = test_config("http://localhost");
        config.cookie = "bad\ncookie".to_string();
        assert!(matches!(
            HttpPortal::new(&config),
            Err(CheckinError::Config(ConfigError::Invalid { field: "cookie", .. }))
        ));
    }
}
