use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::{COOKIE, SET_COOKIE, USER_AGENT};

use crate::application::{AppError, AppResult, Authenticator, PageReader, ReadError};
use crate::domain::SlotSet;

/// Element id of the specialty dropdown; only rendered after login.
pub const LOGGED_IN_MARKER: &str = "Especialidade";
/// Field id of the login form.
const LOGIN_FORM_MARKER: &str = "PacienteMatricula";

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static SELECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<select[^>]*\bid\s*=\s*["']Especialidade["'][^>]*>(.*?)</select>"#)
        .expect("static regex")
});
static OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<option[^>]*>(.*?)</option>").expect("static regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));

#[derive(Clone, Debug)]
pub struct Credentials {
    pub user: String,
    pub birth_date: String,
}

/// Reads the specialty dropdown straight from the portal's HTML.
///
/// The session is a cookie header value. This reader is always headless and
/// cannot take screenshots.
pub struct HttpPageReader {
    client: reqwest::Client,
    url: String,
    credentials: Option<Credentials>,
    session: RwLock<Option<String>>,
    read_timeout: Duration,
}

impl HttpPageReader {
    pub fn new(url: String, credentials: Option<Credentials>, read_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            credentials,
            session: RwLock::new(None),
            read_timeout,
        }
    }

    fn session_cookie(&self) -> Option<String> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    fn set_session(&self, token: &str) {
        if let Ok(mut s) = self.session.write() {
            *s = Some(token.to_string());
        }
    }

    async fn fetch(&self, cookie: Option<&str>, timeout: Duration) -> reqwest::Result<reqwest::Response> {
        let mut req = self
            .client
            .get(&self.url)
            .header(USER_AGENT, BROWSER_UA)
            .timeout(timeout);
        if let Some(c) = cookie {
            req = req.header(COOKIE, c);
        }
        req.send().await
    }
}

#[async_trait]
impl PageReader for HttpPageReader {
    async fn read_current_options(&self) -> Result<SlotSet, ReadError> {
        let cookie = self.session_cookie();
        let resp = self
            .fetch(cookie.as_deref(), self.read_timeout)
            .await
            .map_err(|e| ReadError::Transient(e.to_string()))?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ReadError::SessionInvalid);
            }
            s if !s.is_success() => return Err(ReadError::Transient(format!("http {s}"))),
            _ => {}
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ReadError::Transient(e.to_string()))?;
        classify_page(&body)
    }

    async fn take_screenshot(&self, path: &Path) -> Option<PathBuf> {
        tracing::debug!(path = %path.display(), "html reader cannot take screenshots");
        None
    }
}

#[async_trait]
impl Authenticator for HttpPageReader {
    async fn try_session(&self, token: &str, timeout: Duration) -> AppResult<bool> {
        self.set_session(token);
        let resp = self
            .fetch(Some(token), timeout)
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;
        if !resp.status().is_success() {
            return Ok(false);
        }
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;
        Ok(SELECT_RE.is_match(&body))
    }

    async fn login_with_credentials(&self, timeout: Duration) -> AppResult<Option<String>> {
        let Some(creds) = &self.credentials else {
            return Ok(None);
        };

        let resp = self
            .client
            .post(&self.url)
            .header(USER_AGENT, BROWSER_UA)
            .timeout(timeout)
            .form(&[
                (LOGIN_FORM_MARKER, creds.user.as_str()),
                ("PacienteDataNascimento", creds.birth_date.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        let cookie = cookie_header(resp.headers().get_all(SET_COOKIE).iter().filter_map(|v| v.to_str().ok()));
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        match cookie {
            Some(c) if SELECT_RE.is_match(&body) => {
                self.set_session(&c);
                Ok(Some(c))
            }
            _ => Ok(None),
        }
    }
}

/// Decide what the fetched page is: the slot list, the login form, or junk.
pub fn classify_page(html: &str) -> Result<SlotSet, ReadError> {
    if let Some(select) = SELECT_RE.captures(html) {
        let inner = select.get(1).map(|m| m.as_str()).unwrap_or_default();
        let labels = OPTION_RE
            .captures_iter(inner)
            .filter_map(|c| c.get(1))
            .map(|m| decode_entities(&TAG_RE.replace_all(m.as_str(), "")));
        return Ok(SlotSet::from_labels(labels));
    }
    if html.contains(LOGIN_FORM_MARKER) {
        return Err(ReadError::SessionInvalid);
    }
    Err(ReadError::Transient(format!("#{LOGGED_IN_MARKER} not found")))
}

/// `name=value` pairs from Set-Cookie headers joined into a Cookie header.
fn cookie_header<'a>(set_cookies: impl Iterator<Item = &'a str>) -> Option<String> {
    let pairs: Vec<&str> = set_cookies
        .filter_map(|c| c.split(';').next())
        .map(str::trim)
        .filter(|p| p.contains('='))
        .collect();
    (!pairs.is_empty()).then(|| pairs.join("; "))
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_options_from_dropdown() {
        let html = r#"
            <form><select name="data[Especialidade]" id="Especialidade" class="x">
              <option value="">Selecione a Especialidade...</option>
              <option value="1">CARDIOLOGIA</option>
              <option value="2"> CLÍNICA &amp; CIRURGIA </option>
              <option value="3"><span>DERMATOLOGIA</span></option>
            </select></form>"#;
        let set = classify_page(html).unwrap();
        assert_eq!(
            set.to_sorted_vec(),
            vec!["CARDIOLOGIA", "CLÍNICA & CIRURGIA", "DERMATOLOGIA"]
        );
    }

    #[test]
    fn login_form_means_session_invalid() {
        let html = r#"<input id="PacienteMatricula" name="x">"#;
        assert_eq!(classify_page(html), Err(ReadError::SessionInvalid));
    }

    #[test]
    fn anything_else_is_transient() {
        assert!(matches!(
            classify_page("<html>maintenance</html>"),
            Err(ReadError::Transient(_))
        ));
    }

    #[test]
    fn builds_cookie_header_from_set_cookie() {
        let got = cookie_header(
            ["CAKEPHP=abc; path=/; HttpOnly", "lang=pt; Secure"].into_iter(),
        );
        assert_eq!(got.as_deref(), Some("CAKEPHP=abc; lang=pt"));
    }
}
